use async_trait::async_trait;
use localecho_core::error::StoreError;
use localecho_core::store::{Note, NoteStore, ScoredNote};
use tracing::debug;

use crate::sqlite::{SqliteStore, embedding_to_blob, now_timestamp, query_err, row_to_note};
use crate::vector::rank_notes;

#[async_trait]
impl NoteStore for SqliteStore {
    async fn add_note(&self, content: &str, embedding: Option<&[f32]>) -> Result<i64, StoreError> {
        let (_, created_at) = now_timestamp();
        let blob = embedding.filter(|e| !e.is_empty()).map(embedding_to_blob);

        let mut tx = self.pool.begin().await.map_err(query_err("begin add_note"))?;
        let result = sqlx::query("INSERT INTO notes (content, embedding, created_at) VALUES (?1, ?2, ?3)")
            .bind(content)
            .bind(blob)
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(query_err("insert note"))?;
        tx.commit().await.map_err(query_err("commit add_note"))?;

        let id = result.last_insert_rowid();
        debug!(note_id = id, searchable = embedding.is_some(), "Saved note");
        Ok(id)
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>, StoreError> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err("get note"))?;
        row.as_ref().map(row_to_note).transpose()
    }

    async fn list_notes(&self) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query("SELECT * FROM notes ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("list notes"))?;
        rows.iter().map(row_to_note).collect()
    }

    async fn delete_note(&self, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin delete_note"))?;
        let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_err("delete note"))?;
        tx.commit().await.map_err(query_err("commit delete_note"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn notes_with_embeddings(&self) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query("SELECT * FROM notes WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("notes with embeddings"))?;
        rows.iter().map(row_to_note).collect()
    }

    async fn notes_missing_embedding(&self) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query("SELECT * FROM notes WHERE embedding IS NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("notes missing embedding"))?;
        rows.iter().map(row_to_note).collect()
    }

    async fn set_note_embedding_if_missing(
        &self,
        id: i64,
        embedding: &[f32],
    ) -> Result<bool, StoreError> {
        if embedding.is_empty() {
            return Err(StoreError::InvalidData("empty embedding".into()));
        }

        let mut tx = self.pool.begin().await.map_err(query_err("begin set_embedding"))?;
        let result = sqlx::query("UPDATE notes SET embedding = ?1 WHERE id = ?2 AND embedding IS NULL")
            .bind(embedding_to_blob(embedding))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(query_err("set note embedding"))?;
        tx.commit().await.map_err(query_err("commit set_embedding"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn search_notes(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredNote>, StoreError> {
        let notes = self.notes_with_embeddings().await?;
        Ok(rank_notes(notes, query, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn saved_embedding_survives_storage() {
        let store = store().await;
        let id = store.add_note("door code is 9876", Some(&[0.5, -0.25])).await.unwrap();

        let note = store.get_note(id).await.unwrap().unwrap();
        assert_eq!(note.content, "door code is 9876");
        assert_eq!(note.embedding, Some(vec![0.5, -0.25]));
        assert!(note.is_searchable());
    }

    #[tokio::test]
    async fn search_ranks_the_closer_note_first() {
        let store = store().await;
        let a = store.add_note("A", Some(&[1.0, 0.0, 0.0])).await.unwrap();
        let b = store.add_note("B", Some(&[0.0, 1.0, 0.0])).await.unwrap();

        let hits = store.search_notes(&[0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].note.id, a);
        assert_eq!(hits[1].note.id, b);
    }

    #[tokio::test]
    async fn empty_store_search_is_empty() {
        let store = store().await;
        assert!(store.search_notes(&[1.0, 0.0], 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn note_without_embedding_is_kept_but_not_searchable() {
        let store = store().await;
        let id = store.add_note("no vector yet", None).await.unwrap();

        assert!(store.search_notes(&[1.0], 5).await.unwrap().is_empty());
        let missing = store.notes_missing_embedding().await.unwrap();
        assert_eq!(missing.iter().map(|n| n.id).collect::<Vec<_>>(), vec![id]);
    }

    #[tokio::test]
    async fn embedding_is_write_once() {
        let store = store().await;
        let id = store.add_note("later", None).await.unwrap();

        assert!(store.set_note_embedding_if_missing(id, &[1.0, 0.0]).await.unwrap());
        assert!(!store.set_note_embedding_if_missing(id, &[0.0, 1.0]).await.unwrap());

        let note = store.get_note(id).await.unwrap().unwrap();
        assert_eq!(note.embedding, Some(vec![1.0, 0.0]));
        assert!(store.notes_missing_embedding().await.unwrap().is_empty());
        assert!(store.set_note_embedding_if_missing(id, &[]).await.is_err());
    }

    #[tokio::test]
    async fn delete_note_reports_change() {
        let store = store().await;
        let id = store.add_note("temp", None).await.unwrap();
        assert!(store.delete_note(id).await.unwrap());
        assert!(!store.delete_note(id).await.unwrap());
        assert!(store.list_notes().await.unwrap().is_empty());
    }
}
