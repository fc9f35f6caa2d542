//! SQLite store — schema, connection pool, and row decoding.
//!
//! Three tables:
//! - `tasks` — to-do items with a monotonic pending → completed → archived status
//! - `notes` — saved memories with an optional little-endian f32 embedding blob
//! - `chat_history` — user/assistant turns keyed by session
//!
//! Timestamps are RFC 3339 UTC strings with microsecond precision, so
//! lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use localecho_core::error::StoreError;
use localecho_core::message::{ChatTurn, Role};
use localecho_core::store::{Note, Task, TaskStatus};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// The production persistence backend.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Accepts a file path, a `sqlite:` URL, or `":memory:"` /
    /// `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:" || path == "sqlite::memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else if path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
        } else {
            Ok(SqliteConnectOptions::new().filename(path))
        }
        .map_err(|e| StoreError::Connection(format!("Invalid SQLite path: {e}")))?;

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database lives only as long as its connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "tasks table",
                r#"
                CREATE TABLE IF NOT EXISTS tasks (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    description  TEXT NOT NULL,
                    status       TEXT NOT NULL DEFAULT 'pending',
                    created_at   TEXT NOT NULL,
                    due_date     TEXT,
                    completed_at TEXT,
                    archived_at  TEXT
                )
                "#,
            ),
            (
                "tasks status index",
                "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, created_at DESC)",
            ),
            (
                "notes table",
                r#"
                CREATE TABLE IF NOT EXISTS notes (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    content    TEXT NOT NULL,
                    embedding  BLOB,
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_history table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_history (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    role       TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    timestamp  TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_history session index",
                "CREATE INDEX IF NOT EXISTS idx_chat_session ON chat_history(session_id, timestamp)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }
}

/// The current time in storage format.
pub(crate) fn now_timestamp() -> (DateTime<Utc>, String) {
    let now = Utc::now();
    let text = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    (now, text)
}

pub(crate) fn query_err(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::QueryFailed(format!("{context}: {e}"))
}

fn parse_time(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("{column} '{value}': {e}")))
}

fn parse_optional_time(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| parse_time(column, &v)).transpose()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

pub(crate) fn row_to_task(row: &SqliteRow) -> Result<Task, StoreError> {
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Task {
        id: column(row, "id")?,
        description: column(row, "description")?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown task status '{status}'")))?,
        created_at: parse_time("created_at", &created_at)?,
        due_date: column(row, "due_date")?,
        completed_at: parse_optional_time("completed_at", column(row, "completed_at")?)?,
        archived_at: parse_optional_time("archived_at", column(row, "archived_at")?)?,
    })
}

pub(crate) fn row_to_note(row: &SqliteRow) -> Result<Note, StoreError> {
    let created_at: String = column(row, "created_at")?;
    let embedding: Option<Vec<u8>> = column(row, "embedding")?;

    Ok(Note {
        id: column(row, "id")?,
        content: column(row, "content")?,
        embedding: embedding.map(|blob| blob_to_embedding(&blob)),
        created_at: parse_time("created_at", &created_at)?,
    })
}

pub(crate) fn row_to_turn(row: &SqliteRow) -> Result<ChatTurn, StoreError> {
    let role: String = column(row, "role")?;
    let timestamp: String = column(row, "timestamp")?;

    Ok(ChatTurn {
        session_id: column(row, "session_id")?,
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown role '{role}'")))?,
        content: column(row, "content")?,
        timestamp: parse_time("timestamp", &timestamp)?,
    })
}

/// Serialize an embedding vector to little-endian bytes.
pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
