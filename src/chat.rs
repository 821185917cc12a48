// 🩺 Chat Engine - one request through resolve → normalize → match → compose → persist
// The DB mutex is only taken for the resolve and persist steps, never around a translation.

use crate::composer::{ReplyKind, ResponseComposer};
use crate::config::AppConfig;
use crate::conversation::{ConversationHistory, ConversationStore};
use crate::db::{Sender, StoreError};
use crate::knowledge::KnowledgeBase;
use crate::matcher::Matcher;
use crate::normalizer::Normalizer;
use crate::session::{Session, SessionResolver};
use crate::translation::{resolve_output_language, Translator};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message is {length} characters, the limit is {max}")]
    MessageTooLong { length: usize, max: usize },
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Identity claim (username); absent means guest
    #[serde(default, alias = "identity")]
    pub user: Option<String>,
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub language: crate::translation::Language,
    pub kind: ReplyKind,
    pub score: f64,
    pub session: Session,
    /// False for guests and for registered users whose turns could not be stored
    pub persisted: bool,
}

pub struct ChatEngine {
    resolver: SessionResolver,
    normalizer: Normalizer,
    matcher: Matcher,
    composer: ResponseComposer,
    store: ConversationStore,
    max_message_chars: usize,
}

impl ChatEngine {
    pub fn new(config: &AppConfig, translator: Arc<dyn Translator>) -> Result<Self, config::ConfigError> {
        let language = config.knowledge_language()?;

        Ok(ChatEngine {
            resolver: SessionResolver::new(language, config.session.guest_label.clone()),
            normalizer: Normalizer::new(language, translator.clone()),
            matcher: Matcher::new(config.knowledge.match_threshold),
            composer: ResponseComposer::new(language, translator),
            store: ConversationStore::new(config.history.clone()),
            max_message_chars: config.chat.max_message_chars,
        })
    }

    /// Handle one chat message. Only oversized messages and lookup failures
    /// abort the request; translation and history writes degrade instead.
    /// An empty message is matched like any other and gets a fallback reply.
    pub fn handle(
        &self,
        db: &Mutex<Connection>,
        knowledge: &KnowledgeBase,
        request: &ChatRequest,
    ) -> Result<ChatReply, ChatError> {
        let message = request.message.trim();
        let length = message.chars().count();
        if length > self.max_message_chars {
            return Err(ChatError::MessageTooLong {
                length,
                max: self.max_message_chars,
            });
        }

        let session = {
            let conn = db.lock().map_err(|_| ChatError::LockPoisoned)?;
            self.resolver
                .resolve(&conn, request.user.as_deref(), request.language.as_deref())?
        };
        tracing::debug!(
            session = session.display_name(),
            guest = session.is_guest(),
            "identity resolved"
        );

        let conversation_language = resolve_output_language(
            request.language.as_deref(),
            session.language(),
            self.normalizer.knowledge_language(),
        );
        let query = self.normalizer.normalize(message, conversation_language);
        tracing::debug!(%query, language = %conversation_language, "normalized");

        let outcome = self.matcher.match_query(&query, knowledge.entries());
        tracing::debug!(score = outcome.score(), found = outcome.entry().is_some(), "matched");

        let reply = self
            .composer
            .compose(&outcome, request.language.as_deref(), session.language());
        tracing::debug!(kind = ?reply.kind, translated = reply.translated, "composed");

        let persisted = match session {
            Session::Guest { .. } => false,
            Session::Registered(_) => self.persist_exchange(db, &session, message, &reply.text),
        };

        Ok(ChatReply {
            response: reply.text,
            language: reply.language,
            kind: reply.kind,
            score: outcome.score(),
            session,
            persisted,
        })
    }

    /// Store the user turn then the bot turn; stops at the first failure
    fn persist_exchange(
        &self,
        db: &Mutex<Connection>,
        session: &Session,
        message: &str,
        reply: &str,
    ) -> bool {
        let conn = match db.lock() {
            Ok(conn) => conn,
            Err(_) => {
                tracing::error!(user_id = session.id(), "database lock poisoned, turns not stored");
                return false;
            }
        };

        let result = self
            .store
            .append(&conn, session, Sender::User, message)
            .and_then(|_| self.store.append(&conn, session, Sender::Bot, reply));

        match result {
            Ok(_) => {
                tracing::debug!(user_id = session.id(), "persisted");
                true
            }
            Err(e) => {
                tracing::error!(user_id = session.id(), error = %e, "failed to store chat turns");
                false
            }
        }
    }

    pub fn history(
        &self,
        conn: &Connection,
        username: &str,
        limit: Option<usize>,
    ) -> Result<ConversationHistory, StoreError> {
        self.store.history(conn, username, limit)
    }
}
