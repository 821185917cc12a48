// Wellness Chat - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod auth;
pub mod chat;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod db;
pub mod knowledge;
pub mod matcher;
pub mod normalizer;
pub mod session;
pub mod translation;
pub mod wellness;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use auth::{authenticate, register, reset_password, AuthError, Credentials, NewUser};
pub use chat::{ChatEngine, ChatError, ChatReply, ChatRequest};
pub use composer::{Reply, ReplyKind, ResponseComposer};
pub use config::AppConfig;
pub use conversation::{ConversationHistory, ConversationStore};
pub use db::{setup_database, ConversationTurn, KnowledgeEntry, Sender, StoreError, User};
pub use knowledge::{load_qna_csv, replace_knowledge_base, ImportStats, KnowledgeBase};
pub use matcher::{similarity, MatchOutcome, Matcher};
pub use normalizer::{canonicalize, Normalizer};
pub use session::{Session, SessionResolver};
pub use translation::{Language, TranslationError, Translator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
