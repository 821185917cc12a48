// 🔐 Accounts - registration, login, password reset
// Passwords are stored as PBKDF2-HMAC-SHA256 with a random salt.

use crate::config::AuthConfig;
use crate::db::{
    find_user_by_email, find_user_by_username, insert_user, update_password_hash, StoreError,
    User, UserRow,
};
use crate::translation::Language;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const HASH_SCHEME: &str = "pbkdf2_sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("username already registered")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// `login` is an email address or a username
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(alias = "email", alias = "username")]
    pub login: String,
    pub password: String,
}

// ============================================================================
// PASSWORD HASHING
// ============================================================================

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`
pub fn hash_password(password: &str, iterations: u32) -> String {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let hash = derive(password, &salt, iterations);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations,
        STANDARD.encode(salt),
        STANDARD.encode(hash)
    )
}

/// Constant-time check; malformed stored hashes never verify
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return false;
    };

    if *scheme != HASH_SCHEME {
        return false;
    }

    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        STANDARD.decode(salt),
        STANDARD.decode(hash),
    ) else {
        return false;
    };

    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    let actual = derive(password, &salt, iterations);
    actual[..].ct_eq(&expected[..]).into()
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AuthError::InvalidInput(
            "username must be 3 to 50 characters".to_string(),
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidInput(
            "username must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(6..=128).contains(&len) {
        return Err(AuthError::InvalidInput(
            "password must be 6 to 128 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidInput(format!("invalid email address: {}", email)));
    }
    Ok(())
}

// ============================================================================
// OPERATIONS
// ============================================================================

pub fn register(conn: &Connection, config: &AuthConfig, new_user: &NewUser) -> Result<User, AuthError> {
    let username = new_user.username.trim();
    let email = new_user.email.trim().to_lowercase();

    validate_username(username)?;
    validate_email(&email)?;
    validate_password(&new_user.password)?;

    let language = match new_user.language.as_deref().map(str::trim) {
        None | Some("") => Language::English,
        Some(claim) => Language::from_claim(claim).ok_or_else(|| {
            AuthError::InvalidInput(format!("unsupported language: {}", claim))
        })?,
    };

    if find_user_by_username(conn, username)?.is_some() {
        return Err(AuthError::UsernameTaken);
    }
    if find_user_by_email(conn, &email)?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let password_hash = hash_password(&new_user.password, config.pbkdf2_iterations);
    let gender = new_user
        .gender
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());

    let user = insert_user(
        conn,
        &UserRow {
            username,
            email: &email,
            age: new_user.age,
            gender,
            language: language.code(),
            password_hash: &password_hash,
        },
    )
    .map_err(|e| match e {
        // lost a race against a concurrent registration
        StoreError::Duplicate(_) => conflict_for(conn, &email),
        other => AuthError::Store(other),
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Which unique field a rejected insert collided with
fn conflict_for(conn: &Connection, email: &str) -> AuthError {
    match find_user_by_email(conn, email) {
        Ok(Some(_)) => AuthError::EmailTaken,
        Ok(None) => AuthError::UsernameTaken,
        Err(e) => AuthError::Store(e),
    }
}

pub fn authenticate(conn: &Connection, credentials: &Credentials) -> Result<User, AuthError> {
    let login = credentials.login.trim();

    let user = if login.contains('@') {
        find_user_by_email(conn, login)?
    } else {
        find_user_by_username(conn, login)?
    };

    match user {
        Some(user) if verify_password(&credentials.password, &user.password_hash) => Ok(user),
        _ => {
            tracing::debug!(login, "authentication failed");
            Err(AuthError::InvalidCredentials)
        }
    }
}

pub fn reset_password(
    conn: &Connection,
    config: &AuthConfig,
    email: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    validate_password(new_password)?;

    let user = find_user_by_email(conn, email.trim())?
        .ok_or_else(|| StoreError::NotFound(format!("email {}", email.trim())))?;

    let hash = hash_password(new_password, config.pbkdf2_iterations);
    update_password_hash(conn, user.id, &hash)?;

    tracing::info!(user_id = user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    const TEST_CONFIG: AuthConfig = AuthConfig {
        pbkdf2_iterations: 1_000,
    };

    fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            age: Some(28),
            gender: Some("female".to_string()),
            language: Some("es".to_string()),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse", 1_000);

        assert!(hash.starts_with("pbkdf2_sha256$1000$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        assert_ne!(hash_password("pw1234", 1_000), hash_password("pw1234", 1_000));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        for stored in ["", "plain", "md5$1$a$b", "pbkdf2_sha256$0$AAAA$AAAA", "pbkdf2_sha256$10$!!$!!"] {
            assert!(!verify_password("anything", stored), "{:?}", stored);
        }
    }

    #[test]
    fn test_register_and_login_by_email_or_username() {
        let conn = open_test_db();
        let user = register(&conn, &TEST_CONFIG, &new_user("alice", "Alice@Example.com")).unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.language, "es");
        assert_ne!(user.password_hash, "s3cret-pass");

        let by_email = authenticate(
            &conn,
            &Credentials {
                login: "alice@example.com".to_string(),
                password: "s3cret-pass".to_string(),
            },
        )
        .unwrap();
        let by_name = authenticate(
            &conn,
            &Credentials {
                login: "alice".to_string(),
                password: "s3cret-pass".to_string(),
            },
        )
        .unwrap();

        assert_eq!(by_email.id, user.id);
        assert_eq!(by_name.id, user.id);
    }

    #[test]
    fn test_wrong_password_and_unknown_user_look_the_same() {
        let conn = open_test_db();
        register(&conn, &TEST_CONFIG, &new_user("alice", "alice@example.com")).unwrap();

        for (login, password) in [("alice", "nope-nope"), ("nobody", "s3cret-pass")] {
            let result = authenticate(
                &conn,
                &Credentials {
                    login: login.to_string(),
                    password: password.to_string(),
                },
            );
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
    }

    #[test]
    fn test_duplicate_username_and_email() {
        let conn = open_test_db();
        register(&conn, &TEST_CONFIG, &new_user("alice", "alice@example.com")).unwrap();

        let same_name = register(&conn, &TEST_CONFIG, &new_user("alice", "other@example.com"));
        let same_email = register(&conn, &TEST_CONFIG, &new_user("bob", "ALICE@example.com"));

        assert!(matches!(same_name, Err(AuthError::UsernameTaken)));
        assert!(matches!(same_email, Err(AuthError::EmailTaken)));
    }

    #[test]
    fn test_insert_conflict_names_the_colliding_field() {
        let conn = open_test_db();
        register(&conn, &TEST_CONFIG, &new_user("alice", "alice@example.com")).unwrap();

        assert!(matches!(
            conflict_for(&conn, "alice@example.com"),
            AuthError::EmailTaken
        ));
        assert!(matches!(
            conflict_for(&conn, "someone-else@example.com"),
            AuthError::UsernameTaken
        ));
    }

    #[test]
    fn test_register_validation() {
        let conn = open_test_db();

        let mut short_name = new_user("al", "al@example.com");
        let bad_email = new_user("alice", "alice.example.com");
        let mut short_password = new_user("alice", "alice@example.com");
        short_password.password = "12345".to_string();
        let mut bad_language = new_user("alice", "alice@example.com");
        bad_language.language = Some("klingon".to_string());
        short_name.language = None;

        for candidate in [short_name, bad_email, short_password, bad_language] {
            let result = register(&conn, &TEST_CONFIG, &candidate);
            assert!(
                matches!(result, Err(AuthError::InvalidInput(_))),
                "{:?} should be rejected",
                candidate.username
            );
        }
    }

    #[test]
    fn test_missing_language_defaults_to_english() {
        let conn = open_test_db();
        let mut candidate = new_user("carol", "carol@example.com");
        candidate.language = None;

        let user = register(&conn, &TEST_CONFIG, &candidate).unwrap();
        assert_eq!(user.language, "en");
    }

    #[test]
    fn test_reset_password() {
        let conn = open_test_db();
        register(&conn, &TEST_CONFIG, &new_user("alice", "alice@example.com")).unwrap();

        reset_password(&conn, &TEST_CONFIG, "alice@example.com", "brand-new-pass").unwrap();

        let old = authenticate(
            &conn,
            &Credentials {
                login: "alice".to_string(),
                password: "s3cret-pass".to_string(),
            },
        );
        let new = authenticate(
            &conn,
            &Credentials {
                login: "alice".to_string(),
                password: "brand-new-pass".to_string(),
            },
        );

        assert!(old.is_err());
        assert!(new.is_ok());
    }

    #[test]
    fn test_reset_password_unknown_email() {
        let conn = open_test_db();
        let result = reset_password(&conn, &TEST_CONFIG, "ghost@example.com", "whatever1");

        assert!(matches!(result, Err(AuthError::Store(StoreError::NotFound(_)))));
    }
}
