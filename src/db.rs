use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Sentinel user id carried by guest sessions; never written to the store
pub const GUEST_USER_ID: i64 = 0;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Map a UNIQUE violation into `Duplicate`, keep anything else as-is
    fn from_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(what.into())
            }
            other => StoreError::Sqlite(other),
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// Registered account. Owned by `auth`; the chat core only reads
/// id, username and language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub language: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// One question/answer pair. `question` is stored in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn parse(value: &str) -> Option<Sender> {
        match value {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

/// One persisted message. Append-only: never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub user_id: i64,
    pub sender: Sender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // WAL for crash recovery; in-memory databases report "memory" and carry on
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            age INTEGER,
            gender TEXT,
            language TEXT NOT NULL DEFAULT 'en',
            password_hash TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            sender TEXT NOT NULL CHECK (sender IN ('user', 'bot')),
            message TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS medical_qna (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT UNIQUE NOT NULL,
            answer TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(user_id, id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// USERS
// ============================================================================

/// Fields needed to create a user row; the hash is computed by `auth`
pub struct UserRow<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub age: Option<u32>,
    pub gender: Option<&'a str>,
    pub language: &'a str,
    pub password_hash: &'a str,
}

pub fn insert_user(conn: &Connection, row: &UserRow<'_>) -> Result<User, StoreError> {
    conn.execute(
        "INSERT INTO users (username, email, age, gender, language, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.username,
            row.email,
            row.age,
            row.gender,
            row.language,
            row.password_hash,
        ],
    )
    .map_err(|e| StoreError::from_insert(e, format!("user {}", row.username)))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        username: row.username.to_string(),
        email: row.email.to_string(),
        age: row.age,
        gender: row.gender.map(str::to_string),
        language: row.language.to_string(),
        password_hash: row.password_hash.to_string(),
    })
}

const USER_COLUMNS: &str = "id, username, email, age, gender, language, password_hash";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        age: row.get(3)?,
        gender: row.get(4)?,
        language: row.get(5)?,
        password_hash: row.get(6)?,
    })
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
            map_user,
        )
        .optional()?;

    Ok(user)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!(
                "SELECT {} FROM users WHERE lower(email) = lower(?1)",
                USER_COLUMNS
            ),
            [email],
            map_user,
        )
        .optional()?;

    Ok(user)
}

pub fn find_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [user_id],
            map_user,
        )
        .optional()?;

    Ok(user)
}

pub fn update_password_hash(conn: &Connection, user_id: i64, hash: &str) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hash, user_id],
    )?;

    if changed == 0 {
        return Err(StoreError::NotFound(format!("user id {}", user_id)));
    }

    Ok(())
}

// ============================================================================
// KNOWLEDGE ENTRIES
// ============================================================================

/// All entries in insertion order (matching relies on a stable order)
pub fn get_all_knowledge_entries(conn: &Connection) -> Result<Vec<KnowledgeEntry>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, question, answer FROM medical_qna ORDER BY id")?;

    let entries = stmt
        .query_map([], |row| {
            Ok(KnowledgeEntry {
                id: row.get(0)?,
                question: row.get(1)?,
                answer: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn insert_knowledge_entry(
    conn: &Connection,
    question: &str,
    answer: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO medical_qna (question, answer) VALUES (?1, ?2)",
        params![question, answer],
    )
    .map_err(|e| StoreError::from_insert(e, format!("question {:?}", question)))?;

    Ok(conn.last_insert_rowid())
}

pub fn clear_knowledge_entries(conn: &Connection) -> Result<usize, StoreError> {
    Ok(conn.execute("DELETE FROM medical_qna", [])?)
}

pub fn count_knowledge_entries(conn: &Connection) -> Result<i64, StoreError> {
    let count = conn.query_row("SELECT COUNT(*) FROM medical_qna", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// CHAT HISTORY
// ============================================================================

pub fn insert_turn(
    conn: &Connection,
    user_id: i64,
    sender: Sender,
    message: &str,
    timestamp: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO chat_history (user_id, sender, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, sender.as_str(), message, timestamp.to_rfc3339()],
    )?;

    Ok(conn.last_insert_rowid())
}

/// The most recent `limit` turns of a user, oldest first
pub fn get_recent_turns(
    conn: &Connection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<ConversationTurn>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, sender, message, timestamp
         FROM chat_history
         WHERE user_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut turns = rows
        .into_iter()
        .map(|(id, user_id, sender, message, timestamp)| {
            let sender = Sender::parse(&sender)
                .ok_or_else(|| StoreError::Corrupt(format!("turn {} sender {:?}", id, sender)))?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| StoreError::Corrupt(format!("turn {} timestamp: {}", id, e)))?
                .with_timezone(&Utc);

            Ok(ConversationTurn {
                id,
                user_id,
                sender,
                message,
                timestamp,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    turns.reverse();
    Ok(turns)
}

pub fn count_turns(conn: &Connection) -> Result<i64, StoreError> {
    let count = conn.query_row("SELECT COUNT(*) FROM chat_history", [], |row| row.get(0))?;
    Ok(count)
}
