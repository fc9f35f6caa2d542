use async_trait::async_trait;
use localecho_core::error::StoreError;
use localecho_core::store::{Task, TaskStatus, TaskStore};
use tracing::debug;

use crate::sqlite::{SqliteStore, now_timestamp, query_err, row_to_task};

/// Lowercase and collapse whitespace.
fn normalize_query(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `%query%` with LIKE wildcards in the query escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const NEWEST_PENDING_MATCH: &str = r#"
    SELECT * FROM tasks
    WHERE status = 'pending' AND LOWER(description) LIKE ?1 ESCAPE '\'
    ORDER BY created_at DESC, id DESC
    LIMIT 1
"#;

#[async_trait]
impl TaskStore for SqliteStore {
    async fn add_task(&self, description: &str, due_date: Option<&str>) -> Result<i64, StoreError> {
        let (_, created_at) = now_timestamp();
        let mut tx = self.pool.begin().await.map_err(query_err("begin add_task"))?;
        let result = sqlx::query(
            "INSERT INTO tasks (description, status, created_at, due_date) VALUES (?1, 'pending', ?2, ?3)",
        )
        .bind(description.trim())
        .bind(&created_at)
        .bind(due_date)
        .execute(&mut *tx)
        .await
        .map_err(query_err("insert task"))?;
        tx.commit().await.map_err(query_err("commit add_task"))?;

        let id = result.last_insert_rowid();
        debug!(task_id = id, "Added task");
        Ok(id)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("get task"))?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM tasks WHERE status = ?1 ORDER BY created_at DESC, id DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(query_err("list tasks"))?;

        rows.iter().map(row_to_task).collect()
    }

    async fn find_tasks_by_description(
        &self,
        query: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(&query);

        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"SELECT * FROM tasks WHERE status = ?1 AND LOWER(description) LIKE ?2 ESCAPE '\'
                       ORDER BY created_at DESC, id DESC"#,
                )
                .bind(status.as_str())
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"SELECT * FROM tasks WHERE LOWER(description) LIKE ?1 ESCAPE '\'
                       ORDER BY created_at DESC, id DESC"#,
                )
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(query_err("find tasks"))?;

        rows.iter().map(row_to_task).collect()
    }

    async fn complete_task(&self, id: i64) -> Result<bool, StoreError> {
        let (_, now) = now_timestamp();
        let mut tx = self.pool.begin().await.map_err(query_err("begin complete_task"))?;
        let result = sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = ?1 WHERE id = ?2 AND status = 'pending'",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(query_err("complete task"))?;
        tx.commit().await.map_err(query_err("commit complete_task"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin delete_task"))?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND status != 'archived'")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_err("delete task"))?;
        tx.commit().await.map_err(query_err("commit delete_task"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_task_by_description(&self, query: &str) -> Result<Option<Task>, StoreError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await.map_err(query_err("begin complete_by_description"))?;
        let row = sqlx::query(NEWEST_PENDING_MATCH)
            .bind(like_pattern(&query))
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err("match pending task"))?;
        let Some(row) = row else {
            tx.rollback().await.map_err(query_err("rollback"))?;
            return Ok(None);
        };
        let mut task = row_to_task(&row)?;

        let (completed_at, now) = now_timestamp();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = ?1 WHERE id = ?2 AND status = 'pending'",
        )
        .bind(&now)
        .bind(task.id)
        .execute(&mut *tx)
        .await
        .map_err(query_err("complete task"))?;
        tx.commit().await.map_err(query_err("commit complete_by_description"))?;

        if result.rows_affected() != 1 {
            return Ok(None);
        }
        debug!(task_id = task.id, "Completed task by description");
        task.status = TaskStatus::Completed;
        task.completed_at = Some(completed_at);
        Ok(Some(task))
    }

    async fn delete_task_by_description(&self, query: &str) -> Result<Option<Task>, StoreError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await.map_err(query_err("begin delete_by_description"))?;
        let row = sqlx::query(NEWEST_PENDING_MATCH)
            .bind(like_pattern(&query))
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err("match pending task"))?;
        let Some(row) = row else {
            tx.rollback().await.map_err(query_err("rollback"))?;
            return Ok(None);
        };
        let task = row_to_task(&row)?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND status = 'pending'")
            .bind(task.id)
            .execute(&mut *tx)
            .await
            .map_err(query_err("delete task"))?;
        tx.commit().await.map_err(query_err("commit delete_by_description"))?;

        if result.rows_affected() != 1 {
            return Ok(None);
        }
        debug!(task_id = task.id, "Deleted task by description");
        Ok(Some(task))
    }

    async fn complete_all_tasks(&self) -> Result<u64, StoreError> {
        let (_, now) = now_timestamp();
        let mut tx = self.pool.begin().await.map_err(query_err("begin complete_all"))?;
        let result = sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = ?1 WHERE status = 'pending'",
        )
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err("complete all"))?;
        tx.commit().await.map_err(query_err("commit complete_all"))?;

        Ok(result.rows_affected())
    }

    async fn delete_completed_tasks(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin delete_completed"))?;
        let result = sqlx::query("DELETE FROM tasks WHERE status = 'completed'")
            .execute(&mut *tx)
            .await
            .map_err(query_err("delete completed"))?;
        tx.commit().await.map_err(query_err("commit delete_completed"))?;

        Ok(result.rows_affected())
    }

    async fn archive_completed_tasks(&self) -> Result<u64, StoreError> {
        let (_, now) = now_timestamp();
        let mut tx = self.pool.begin().await.map_err(query_err("begin archive"))?;
        let result = sqlx::query(
            "UPDATE tasks SET status = 'archived', archived_at = ?1 WHERE status = 'completed'",
        )
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err("archive completed"))?;
        tx.commit().await.map_err(query_err("commit archive"))?;

        Ok(result.rows_affected())
    }

    async fn list_archived_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status = 'archived' ORDER BY completed_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("list archived"))?;

        rows.iter().map(row_to_task).collect()
    }
}
