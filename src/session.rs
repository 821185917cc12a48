// 🪪 Session Resolver - registered user or guest, plus language preference

use crate::db::{find_user_by_username, StoreError, User, GUEST_USER_ID};
use crate::translation::Language;
use rusqlite::Connection;

#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Registered(User),
    Guest {
        display_name: String,
        language: Language,
    },
}

impl Session {
    /// Store id; guests carry `GUEST_USER_ID`
    pub fn id(&self) -> i64 {
        match self {
            Session::Registered(user) => user.id,
            Session::Guest { .. } => GUEST_USER_ID,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Session::Registered(user) => &user.username,
            Session::Guest { display_name, .. } => display_name,
        }
    }

    /// Preferred language; `None` when a registered user's stored code is unsupported
    pub fn language(&self) -> Option<Language> {
        match self {
            Session::Registered(user) => Language::from_claim(&user.language),
            Session::Guest { language, .. } => Some(*language),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Session::Guest { .. })
    }
}

pub struct SessionResolver {
    knowledge_language: Language,
    guest_label: String,
}

impl SessionResolver {
    pub fn new(knowledge_language: Language, guest_label: impl Into<String>) -> Self {
        SessionResolver {
            knowledge_language,
            guest_label: guest_label.into(),
        }
    }

    /// A claim naming a registered user resolves to that user. Anything else,
    /// including an empty or absent claim, becomes a guest.
    pub fn resolve(
        &self,
        conn: &Connection,
        identity_claim: Option<&str>,
        language_claim: Option<&str>,
    ) -> Result<Session, StoreError> {
        let claim = identity_claim.map(str::trim).filter(|c| !c.is_empty());

        if let Some(username) = claim {
            if let Some(user) = find_user_by_username(conn, username)? {
                return Ok(Session::Registered(user));
            }
        }

        let language = language_claim
            .and_then(Language::from_claim)
            .unwrap_or(self.knowledge_language);

        Ok(Session::Guest {
            display_name: claim.unwrap_or(self.guest_label.as_str()).to_string(),
            language,
        })
    }
}
