// ⚙️ Configuration - one explicit struct built at process start
// Precedence: defaults < TOML file < WELLNESS__* environment variables

use crate::translation::Language;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an alternate config file
pub const CONFIG_PATH_ENV: &str = "WELLNESS_CONFIG";

/// Config file used when `WELLNESS_CONFIG` is not set (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config/wellness.toml";

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// CSV used by `wellness-chat import` when no path is given
    pub csv_path: String,

    /// Language the questions and answers are written in
    pub language: String,

    /// Minimum similarity for a match to be accepted
    pub match_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl HistoryConfig {
    /// Resolve a requested history size into 1..=max_limit
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longest accepted message, in characters after trimming
    pub max_message_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// LibreTranslate-compatible base URL; translation is disabled when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Display name given to guests that did not supply one
    pub guest_label: String,
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub knowledge: KnowledgeConfig,
    pub history: HistoryConfig,
    pub chat: ChatConfig,
    pub translation: TranslationConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8000".to_string(),
            },
            database: DatabaseConfig {
                path: "chatbot.db".to_string(),
            },
            knowledge: KnowledgeConfig {
                csv_path: "data/medical_qna.csv".to_string(),
                language: "en".to_string(),
                match_threshold: 0.5,
            },
            history: HistoryConfig {
                default_limit: 10,
                max_limit: 100,
            },
            chat: ChatConfig {
                max_message_chars: 2_000,
            },
            translation: TranslationConfig {
                endpoint: None,
                api_key: None,
                timeout_secs: 5,
            },
            auth: AuthConfig {
                pbkdf2_iterations: 600_000,
            },
            session: SessionConfig {
                guest_label: "guest".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load from file and environment.
    /// Only the binaries call this; library code receives the built struct.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load using an explicit config file path (missing file = defaults)
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let config: AppConfig = builder
            .add_source(config::Environment::with_prefix("WELLNESS").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parsed knowledge-base language
    pub fn knowledge_language(&self) -> Result<Language, config::ConfigError> {
        Language::from_claim(&self.knowledge.language).ok_or_else(|| {
            config::ConfigError::Message(format!(
                "unsupported knowledge.language: {}",
                self.knowledge.language
            ))
        })
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        self.knowledge_language()?;

        if !(0.0..=1.0).contains(&self.knowledge.match_threshold) {
            return Err(config::ConfigError::Message(format!(
                "knowledge.match_threshold must be within [0, 1], got {}",
                self.knowledge.match_threshold
            )));
        }

        if self.chat.max_message_chars == 0 {
            return Err(config::ConfigError::Message(
                "chat.max_message_chars must be at least 1".to_string(),
            ));
        }

        if self.history.max_limit == 0 {
            return Err(config::ConfigError::Message(
                "history.max_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_source_behavior() {
        let config = AppConfig::default();

        assert_eq!(config.knowledge.match_threshold, 0.5);
        assert_eq!(config.history.default_limit, 10);
        assert_eq!(config.history.max_limit, 100);
        assert_eq!(config.session.guest_label, "guest");
        assert_eq!(config.chat.max_message_chars, 2_000);
        assert!(config.translation.endpoint.is_none());
        assert_eq!(config.knowledge_language().unwrap(), Language::English);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/wellness.toml")).unwrap();
        assert_eq!(config.database.path, "chatbot.db");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[knowledge]\nlanguage = \"fr\"\nmatch_threshold = 0.6\n\n[history]\ndefault_limit = 5\nmax_limit = 20"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();

        assert_eq!(config.knowledge_language().unwrap(), Language::French);
        assert_eq!(config.knowledge.match_threshold, 0.6);
        assert_eq!(config.history.default_limit, 5);
        // untouched sections keep defaults
        assert_eq!(config.knowledge.csv_path, "data/medical_qna.csv");
        assert_eq!(config.auth.pbkdf2_iterations, 600_000);
    }

    #[test]
    fn test_rejects_unknown_language() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[knowledge]\nlanguage = \"klingon\"").unwrap();

        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_message_limit() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[chat]\nmax_message_chars = 0").unwrap();

        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_clamp_history_limit() {
        let history = AppConfig::default().history;

        assert_eq!(history.clamp_limit(None), 10);
        assert_eq!(history.clamp_limit(Some(0)), 1);
        assert_eq!(history.clamp_limit(Some(42)), 42);
        assert_eq!(history.clamp_limit(Some(1_000)), 100);
    }
}
