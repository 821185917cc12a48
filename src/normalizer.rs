// 🧹 Normalizer - canonical comparison form for queries
// trim + lowercase, then translate into the knowledge-base language when needed.
// No stemming, no punctuation stripping.

use crate::translation::{Language, Translator};
use std::sync::Arc;

/// Trim and lowercase. Stored questions and incoming queries both pass through here.
pub fn canonicalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub struct Normalizer {
    knowledge_language: Language,
    translator: Arc<dyn Translator>,
}

impl Normalizer {
    pub fn new(knowledge_language: Language, translator: Arc<dyn Translator>) -> Self {
        Normalizer {
            knowledge_language,
            translator,
        }
    }

    pub fn knowledge_language(&self) -> Language {
        self.knowledge_language
    }

    /// Canonical form of `text` written in `source` language.
    /// A failed translation degrades to the canonical untranslated text.
    pub fn normalize(&self, text: &str, source: Language) -> String {
        let canonical = canonicalize(text);

        if source == self.knowledge_language || canonical.is_empty() {
            return canonical;
        }

        match self
            .translator
            .translate(&canonical, source, self.knowledge_language)
        {
            Ok(translated) => canonicalize(&translated),
            Err(e) => {
                tracing::warn!(
                    source = %source,
                    target = %self.knowledge_language,
                    error = %e,
                    "query translation failed, matching untranslated text"
                );
                canonical
            }
        }
    }
}
