// 🗂️ Conversation Store - append-only turns for registered sessions
// Guest sessions are never written.

use crate::config::HistoryConfig;
use crate::db::{
    find_user_by_id, find_user_by_username, get_recent_turns, insert_turn, ConversationTurn,
    Sender, StoreError, User,
};
use crate::session::Session;
use chrono::Utc;
use rusqlite::Connection;

/// Ordered slice of one user's conversation
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub user: User,
    pub turns: Vec<ConversationTurn>,
}

pub struct ConversationStore {
    limits: HistoryConfig,
}

impl ConversationStore {
    pub fn new(limits: HistoryConfig) -> Self {
        ConversationStore { limits }
    }

    /// Insert a turn for a registered session. Guests are a no-op (`Ok(None)`).
    pub fn append(
        &self,
        conn: &Connection,
        session: &Session,
        sender: Sender,
        message: &str,
    ) -> Result<Option<i64>, StoreError> {
        match session {
            Session::Guest { .. } => Ok(None),
            Session::Registered(user) => {
                let id = insert_turn(conn, user.id, sender, message, Utc::now())?;
                Ok(Some(id))
            }
        }
    }

    /// Most recent turns of `username`, oldest first.
    /// `limit` defaults to and is clamped by the configured bounds.
    pub fn history(
        &self,
        conn: &Connection,
        username: &str,
        limit: Option<usize>,
    ) -> Result<ConversationHistory, StoreError> {
        let user = find_user_by_username(conn, username)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", username)))?;

        let turns = get_recent_turns(conn, user.id, self.limits.clamp_limit(limit))?;
        Ok(ConversationHistory { user, turns })
    }

    /// Same as `history`, keyed by user id
    pub fn history_for_user(
        &self,
        conn: &Connection,
        user_id: i64,
        limit: Option<usize>,
    ) -> Result<ConversationHistory, StoreError> {
        let user = find_user_by_id(conn, user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("user id {}", user_id)))?;

        let turns = get_recent_turns(conn, user.id, self.limits.clamp_limit(limit))?;
        Ok(ConversationHistory { user, turns })
    }
}
