// 💬 Response Composer - match outcome → reply text in the user's language

use crate::matcher::MatchOutcome;
use crate::translation::{resolve_output_language, Language, Translator};
use serde::Serialize;
use std::sync::Arc;

pub const NO_MATCH_REPLY: &str =
    "Sorry, I couldn't find an answer to that. Please try rephrasing your question.";

pub const EMPTY_KNOWLEDGE_BASE_REPLY: &str =
    "My knowledge base is empty right now, so I can't answer questions yet. Please try again later.";

/// Which branch of the fallback policy produced the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answer,
    NoMatch,
    KnowledgeBaseEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub language: Language,
    pub kind: ReplyKind,
    /// False when the text stayed in the knowledge-base language
    pub translated: bool,
}

pub struct ResponseComposer {
    knowledge_language: Language,
    translator: Arc<dyn Translator>,
}

impl ResponseComposer {
    pub fn new(knowledge_language: Language, translator: Arc<dyn Translator>) -> Self {
        ResponseComposer {
            knowledge_language,
            translator,
        }
    }

    /// Never fails: a translation error returns the untranslated base reply.
    pub fn compose(
        &self,
        outcome: &MatchOutcome,
        requested_language: Option<&str>,
        user_default_language: Option<Language>,
    ) -> Reply {
        let (base, kind) = match outcome {
            MatchOutcome::Found { entry, .. } => (entry.answer.as_str(), ReplyKind::Answer),
            MatchOutcome::NoMatch { .. } => (NO_MATCH_REPLY, ReplyKind::NoMatch),
            MatchOutcome::KnowledgeBaseEmpty => {
                (EMPTY_KNOWLEDGE_BASE_REPLY, ReplyKind::KnowledgeBaseEmpty)
            }
        };

        let language = resolve_output_language(
            requested_language,
            user_default_language,
            self.knowledge_language,
        );

        if language == self.knowledge_language {
            return Reply {
                text: base.to_string(),
                language,
                kind,
                translated: false,
            };
        }

        match self
            .translator
            .translate(base, self.knowledge_language, language)
        {
            Ok(text) => Reply {
                text,
                language,
                kind,
                translated: true,
            },
            Err(e) => {
                tracing::warn!(
                    target_language = %language,
                    error = %e,
                    "reply translation failed, sending untranslated reply"
                );
                Reply {
                    text: base.to_string(),
                    language,
                    kind,
                    translated: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::KnowledgeEntry;
    use crate::translation::testing::{FailingTranslator, TaggingTranslator};
    use crate::translation::DisabledTranslator;
    use std::sync::atomic::Ordering;

    fn found(answer: &str) -> MatchOutcome {
        MatchOutcome::Found {
            entry: KnowledgeEntry {
                id: 1,
                question: "what is diabetes".to_string(),
                answer: answer.to_string(),
            },
            score: 1.0,
        }
    }

    fn english_composer(translator: Arc<dyn Translator>) -> ResponseComposer {
        ResponseComposer::new(Language::English, translator)
    }

    #[test]
    fn test_found_uses_entry_answer() {
        let composer = english_composer(Arc::new(DisabledTranslator));
        let reply = composer.compose(&found("Diabetes is high blood sugar."), None, None);

        assert_eq!(reply.text, "Diabetes is high blood sugar.");
        assert_eq!(reply.kind, ReplyKind::Answer);
        assert_eq!(reply.language, Language::English);
        assert!(!reply.translated);
    }

    #[test]
    fn test_no_match_and_empty_replies_differ() {
        let composer = english_composer(Arc::new(DisabledTranslator));

        let no_match = composer.compose(&MatchOutcome::NoMatch { best_score: 0.2 }, None, None);
        let empty = composer.compose(&MatchOutcome::KnowledgeBaseEmpty, None, None);

        assert_eq!(no_match.text, NO_MATCH_REPLY);
        assert_eq!(empty.text, EMPTY_KNOWLEDGE_BASE_REPLY);
        assert_ne!(no_match.text, empty.text);
        assert_eq!(empty.kind, ReplyKind::KnowledgeBaseEmpty);
    }

    #[test]
    fn test_requested_language_wins() {
        let composer = english_composer(Arc::new(TaggingTranslator));
        let reply = composer.compose(&found("Drink water."), Some("es"), Some(Language::French));

        assert_eq!(reply.text, "[es] Drink water.");
        assert_eq!(reply.language, Language::Spanish);
        assert!(reply.translated);
    }

    #[test]
    fn test_unrecognized_request_uses_user_default() {
        let composer = english_composer(Arc::new(TaggingTranslator));
        let reply = composer.compose(&found("Drink water."), Some("tlh"), Some(Language::Hindi));

        assert_eq!(reply.text, "[hi] Drink water.");
    }

    #[test]
    fn test_no_preferences_stay_in_knowledge_language() {
        let translator = Arc::new(FailingTranslator::default());
        let composer = english_composer(translator.clone());

        let reply = composer.compose(&found("Drink water."), None, None);

        assert_eq!(reply.text, "Drink water.");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_translator_returns_base_reply() {
        let translator = Arc::new(FailingTranslator::default());
        let composer = english_composer(translator.clone());

        let answer = composer.compose(&found("Drink water."), Some("fr"), None);
        let no_match = composer.compose(&MatchOutcome::NoMatch { best_score: 0.1 }, Some("hi"), None);

        assert_eq!(answer.text, "Drink water.");
        assert!(!answer.translated);
        assert_eq!(answer.language, Language::French);
        assert_eq!(no_match.text, NO_MATCH_REPLY);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
    }
}
