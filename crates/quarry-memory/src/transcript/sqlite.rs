use std::str::FromStr;

use quarry_llm::Role;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::{SessionSummary, TranscriptEntry, TranscriptStore, now_timestamp, parse_role};
use crate::error::MemoryError;
use crate::vector_store::BoxFuture;

type EntryRow = (String, String, String, String);

fn entry_from_row((chat_id, role, text, timestamp): EntryRow) -> TranscriptEntry {
    TranscriptEntry {
        chat_id,
        role: parse_role(&role),
        text,
        timestamp,
    }
}

/// `SQLite`-backed transcript that survives restarts.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let mut opts = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        if !in_memory {
            opts = opts
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        // Every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        tracing::debug!(path, "transcript store opened");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TranscriptStore for SqliteStore {
    fn append(
        &self,
        chat_id: &str,
        role: Role,
        text: &str,
    ) -> BoxFuture<'_, Result<TranscriptEntry, MemoryError>> {
        let entry = TranscriptEntry {
            chat_id: chat_id.to_owned(),
            role,
            text: text.to_owned(),
            timestamp: now_timestamp(),
        };
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO transcripts (chat_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.chat_id)
            .bind(entry.role.as_str())
            .bind(&entry.text)
            .bind(&entry.timestamp)
            .execute(&self.pool)
            .await?;
            Ok(entry)
        })
    }

    fn recent(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let rows: Vec<EntryRow> = sqlx::query_as(
                "SELECT chat_id, role, content, created_at FROM (\
                    SELECT id, chat_id, role, content, created_at FROM transcripts \
                    WHERE chat_id = ? ORDER BY id DESC LIMIT ?\
                 ) ORDER BY id ASC",
            )
            .bind(&chat_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(entry_from_row).collect())
        })
    }

    fn history(&self, chat_id: &str) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let rows: Vec<EntryRow> = sqlx::query_as(
                "SELECT chat_id, role, content, created_at FROM transcripts \
                 WHERE chat_id = ? ORDER BY id ASC",
            )
            .bind(&chat_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(entry_from_row).collect())
        })
    }

    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionSummary>, MemoryError>> {
        Box::pin(async move {
            let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
                "SELECT chat_id, MIN(created_at), MAX(created_at), COUNT(*) FROM transcripts \
                 GROUP BY chat_id ORDER BY MAX(id) DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|(chat_id, first_at, last_at, count)| SessionSummary {
                    chat_id,
                    first_at,
                    last_at,
                    message_count: u64::try_from(count).unwrap_or(0),
                })
                .collect())
        })
    }

    fn delete_session(&self, chat_id: &str) -> BoxFuture<'_, Result<u64, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM transcripts WHERE chat_id = ?")
                .bind(&chat_id)
                .execute(&self.pool)
                .await?;
            tracing::info!(chat_id = %chat_id, removed = result.rows_affected(), "session deleted");
            Ok(result.rows_affected())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn memory_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.expect("SqliteStore::new")
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let store = SqliteStore::new(path).await.expect("SqliteStore::new");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .expect("PRAGMA query");

        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn append_and_recent_preserve_order() {
        let store = memory_store().await;
        for (role, text) in [
            (Role::User, "one"),
            (Role::Assistant, "two"),
            (Role::User, "three"),
        ] {
            store.append("chat", role, text).await.unwrap();
        }

        let recent = store.recent("chat", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "two");
        assert_eq!(recent[0].role, Role::Assistant);
        assert_eq!(recent[1].text, "three");

        assert_eq!(store.history("chat").await.unwrap().len(), 3);
        assert!(store.recent("other", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_and_delete() {
        let store = memory_store().await;
        store.append("a", Role::User, "hi").await.unwrap();
        store.append("b", Role::User, "hello").await.unwrap();
        store.append("b", Role::Assistant, "hey").await.unwrap();

        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].chat_id, "b");
        assert_eq!(sessions[0].message_count, 2);

        assert_eq!(store.delete_session("b").await.unwrap(), 2);
        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].chat_id, "a");
    }

    #[tokio::test]
    async fn transcript_survives_reopen() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");
        {
            let store = SqliteStore::new(path).await.unwrap();
            store.append("persist", Role::User, "remember me").await.unwrap();
            store.pool().close().await;
        }
        let store = SqliteStore::new(path).await.unwrap();
        let history = store.history("persist").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "remember me");
    }
}
