use async_trait::async_trait;
use localecho_core::error::StoreError;
use localecho_core::message::{ChatTurn, Role};
use localecho_core::store::ChatLog;

use crate::sqlite::{SqliteStore, now_timestamp, query_err, row_to_turn};

#[async_trait]
impl ChatLog for SqliteStore {
    async fn append_turn(&self, session_id: &str, role: Role, content: &str) -> Result<i64, StoreError> {
        let (_, timestamp) = now_timestamp();
        let mut tx = self.pool.begin().await.map_err(query_err("begin append_turn"))?;
        let result = sqlx::query(
            "INSERT INTO chat_history (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await
        .map_err(query_err("insert chat turn"))?;
        tx.commit().await.map_err(query_err("commit append_turn"))?;
        Ok(result.last_insert_rowid())
    }

    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_history WHERE session_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("recent turns"))?;

        let mut turns = rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn all_turns(&self, session_id: Option<&str>) -> Result<Vec<ChatTurn>, StoreError> {
        let rows = match session_id {
            Some(id) => {
                sqlx::query("SELECT * FROM chat_history WHERE session_id = ?1 ORDER BY timestamp, id")
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM chat_history ORDER BY timestamp, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(query_err("all turns"))?;

        rows.iter().map(row_to_turn).collect()
    }

    async fn clear_turns(&self, session_id: Option<&str>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin clear_turns"))?;
        let result = match session_id {
            Some(id) => {
                sqlx::query("DELETE FROM chat_history WHERE session_id = ?1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
            None => sqlx::query("DELETE FROM chat_history").execute(&mut *tx).await,
        }
        .map_err(query_err("clear turns"))?;
        tx.commit().await.map_err(query_err("commit clear_turns"))?;
        Ok(result.rows_affected())
    }
}
