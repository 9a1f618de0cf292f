//! SQLite conversation storage.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Conversation, ConversationId, StorageBackend};
use crate::error::{ParleyError, Result};
use crate::types::{Message, Role};

const PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
"#;

const CONVERSATION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL REFERENCES conversation(id),
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_message_conversation ON message(conversation_id);
CREATE INDEX IF NOT EXISTS idx_message_created_at ON message(created_at);
"#;

/// Shared handle to one SQLite connection.
///
/// All statements run on the blocking pool while holding the connection lock.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch(PRAGMAS)?;
            Ok::<_, ParleyError>(conn)
        })
        .await
        .map_err(join_error)??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(PRAGMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(join_error)?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

fn join_error(e: tokio::task::JoinError) -> ParleyError {
    ParleyError::Io(std::io::Error::other(format!("database task failed: {e}")))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Relational conversation storage: one `conversation` row, many `message` rows.
#[derive(Debug)]
pub struct SqliteBackend {
    db: Database,
    conversation: Option<Conversation>,
}

impl SqliteBackend {
    /// Create the conversation tables if needed.
    pub async fn new(db: Database) -> Result<Self> {
        db.call(|conn| Ok(conn.execute_batch(CONVERSATION_SCHEMA)?))
            .await?;
        Ok(Self {
            db,
            conversation: None,
        })
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Database::open(path).await?).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn insert_conversation(conn: &Connection, id: Option<i64>) -> Result<Conversation> {
    let now = Utc::now();
    let rowid = match id {
        Some(id) => {
            conn.execute(
                "INSERT INTO conversation (id, created_at) VALUES (?1, ?2)",
                params![id, timestamp(now)],
            )?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO conversation (created_at) VALUES (?1)",
                params![timestamp(now)],
            )?;
            conn.last_insert_rowid()
        }
    };
    Ok(Conversation {
        id: ConversationId::new(rowid.to_string()),
        created_at: now,
    })
}

fn read_messages(conn: &Connection, conversation_id: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM message
         WHERE conversation_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![conversation_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(role, content)| -> Result<Message> {
            let role = role.parse::<Role>().map_err(|_| {
                ParleyError::Serialization(serde::de::Error::custom(format!(
                    "unknown role '{role}' in conversation {conversation_id}"
                )))
            })?;
            Ok(Message::from_content_json(role, &content)?)
        })
        .collect()
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn load(&mut self, id: Option<&ConversationId>) -> Result<Vec<Message>> {
        let requested = match id {
            None => None,
            Some(id) => match id.as_str().trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(id = %id, "conversation id is not numeric; starting a new conversation");
                    None
                }
            },
        };

        let (conversation, messages) = self
            .db
            .call(move |conn| {
                let Some(wanted) = requested else {
                    return Ok((insert_conversation(conn, None)?, Vec::new()));
                };
                let existing = conn
                    .query_row(
                        "SELECT id, created_at FROM conversation WHERE id = ?1",
                        params![wanted],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                    )
                    .optional()?;
                match existing {
                    Some((id, created_at)) => {
                        let conversation = Conversation {
                            id: ConversationId::new(id.to_string()),
                            created_at: parse_timestamp(&created_at),
                        };
                        Ok((conversation, read_messages(conn, id)?))
                    }
                    None => Ok((insert_conversation(conn, Some(wanted))?, Vec::new())),
                }
            })
            .await?;

        debug!(conversation = %conversation.id, messages = messages.len(), "loaded conversation");
        self.conversation = Some(conversation);
        Ok(messages)
    }

    async fn add(&mut self, messages: &[Message]) -> Result<()> {
        let conversation = self
            .conversation
            .as_ref()
            .ok_or(ParleyError::ConversationNotEstablished)?;
        let conversation_id: i64 = conversation
            .id
            .as_str()
            .parse()
            .map_err(|_| ParleyError::InvalidState(format!("bad conversation id {}", conversation.id)))?;

        let rows = messages
            .iter()
            .map(|m| Ok((m.role.to_string(), m.content_json()?)))
            .collect::<Result<Vec<_>>>()?;
        let count = rows.len();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let created_at = timestamp(Utc::now());
                    let mut stmt = tx.prepare(
                        "INSERT INTO message (conversation_id, role, content, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (role, content) in &rows {
                        stmt.execute(params![conversation_id, role, content, created_at])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        debug!(conversation_id, count, "appended messages");
        Ok(())
    }

    fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }
}
