// 🌐 Translation - best-effort language alignment
// Every caller decides its own fallback; nothing here swallows errors.

use crate::config::TranslationConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// LANGUAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Spanish,
    French,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hindi,
        Language::Spanish,
        Language::French,
    ];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Spanish => "es",
            Language::French => "fr",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Spanish => "Spanish",
            Language::French => "French",
        }
    }

    /// Parse a code or English name ("es", "Spanish", " FR ")
    pub fn from_claim(claim: &str) -> Option<Language> {
        let claim = claim.trim();
        Language::ALL.into_iter().find(|lang| {
            lang.code().eq_ignore_ascii_case(claim) || lang.name().eq_ignore_ascii_case(claim)
        })
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Pick the reply language: requested, then the user's default, then the
/// knowledge-base language. Unrecognized claims are skipped.
pub fn resolve_output_language(
    requested: Option<&str>,
    user_default: Option<Language>,
    knowledge_language: Language,
) -> Language {
    requested
        .and_then(Language::from_claim)
        .or(user_default)
        .unwrap_or(knowledge_language)
}

// ============================================================================
// TRANSLATOR
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation is not configured")]
    Disabled,
    #[error("translation request failed: {0}")]
    Http(String),
    #[error("translation provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("malformed translation response: {0}")]
    Malformed(String),
}

/// Translation collaborator. Implementations may block on network I/O.
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError>;
}

/// Used when no provider is configured; every call fails with `Disabled`.
pub struct DisabledTranslator;

impl Translator for DisabledTranslator {
    fn translate(&self, _: &str, _: Language, _: Language) -> Result<String, TranslationError> {
        Err(TranslationError::Disabled)
    }
}

/// Build the translator described by the config
pub fn from_config(config: &TranslationConfig) -> Result<Arc<dyn Translator>, TranslationError> {
    match config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(endpoint) => {
            let translator = HttpTranslator::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            tracing::info!(endpoint, "translation enabled");
            Ok(Arc::new(translator))
        }
        None => {
            tracing::info!("translation disabled, replies stay in the knowledge-base language");
            Ok(Arc::new(DisabledTranslator))
        }
    }
}

// ============================================================================
// HTTP TRANSLATOR (LibreTranslate API)
// ============================================================================

/// Blocking client for a LibreTranslate-compatible `/translate` endpoint.
/// Construct outside of any async runtime.
pub struct HttpTranslator {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl HttpTranslator {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Http(e.to_string()))?;

        Ok(HttpTranslator {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout,
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        if source == target || text.is_empty() {
            return Ok(text.to_string());
        }

        let url = format!("{}/translate", self.base_url);
        let body = TranslateRequest {
            q: text,
            source: source.code(),
            target: target.code(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_timeout() {
                TranslationError::Http(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                TranslationError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslationError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranslateResponse = response
            .json()
            .map_err(|e| TranslationError::Malformed(e.to_string()))?;

        Ok(parsed.translated_text)
    }
}

// ============================================================================
// TEST DOUBLES
// ============================================================================
