//! Persistence traits and records — tasks, notes, and chat history.
//!
//! Every mutating call returns what was actually changed, read after the
//! mutation committed. Query calls return rows in the order the tools
//! expect (pending tasks newest-first, chat turns oldest-first).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{ChatTurn, Role};

type StoreResult<T> = std::result::Result<T, StoreError>;

/// Task lifecycle. Transitions only move forward: pending → completed → archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

/// A saved note. A note without an embedding is stored but not searchable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub content: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn is_searchable(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// A note ranked against a query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNote {
    pub note: Note,
    pub score: f32,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn add_task(&self, description: &str, due_date: Option<&str>) -> StoreResult<i64>;

    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>>;

    /// Tasks with the given status (all when `None`), newest first.
    async fn list_tasks(&self, status: Option<TaskStatus>) -> StoreResult<Vec<Task>>;

    /// Case- and whitespace-insensitive substring match, newest first.
    async fn find_tasks_by_description(
        &self,
        query: &str,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<Task>>;

    /// Complete a pending task. Returns whether a row changed.
    async fn complete_task(&self, id: i64) -> StoreResult<bool>;

    /// Delete a task of any status. Returns whether a row changed.
    async fn delete_task(&self, id: i64) -> StoreResult<bool>;

    /// Complete the newest pending task matching `query`.
    async fn complete_task_by_description(&self, query: &str) -> StoreResult<Option<Task>>;

    /// Delete the newest pending task matching `query`.
    async fn delete_task_by_description(&self, query: &str) -> StoreResult<Option<Task>>;

    async fn complete_all_tasks(&self) -> StoreResult<u64>;

    async fn delete_completed_tasks(&self) -> StoreResult<u64>;

    /// Move every completed task to archived. Never deletes rows.
    async fn archive_completed_tasks(&self) -> StoreResult<u64>;

    /// Archived tasks, most recently completed first.
    async fn list_archived_tasks(&self) -> StoreResult<Vec<Task>>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn add_note(&self, content: &str, embedding: Option<&[f32]>) -> StoreResult<i64>;

    async fn get_note(&self, id: i64) -> StoreResult<Option<Note>>;

    /// All notes, newest first.
    async fn list_notes(&self) -> StoreResult<Vec<Note>>;

    async fn delete_note(&self, id: i64) -> StoreResult<bool>;

    /// Every searchable note.
    async fn notes_with_embeddings(&self) -> StoreResult<Vec<Note>>;

    /// Notes saved while the embedding service was unavailable.
    async fn notes_missing_embedding(&self) -> StoreResult<Vec<Note>>;

    /// Write an embedding only if the note has none. Returns whether a row changed.
    async fn set_note_embedding_if_missing(&self, id: i64, embedding: &[f32])
    -> StoreResult<bool>;

    /// Top `top_k` searchable notes by cosine similarity, ties broken newest first.
    async fn search_notes(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<ScoredNote>>;
}

#[async_trait]
pub trait ChatLog: Send + Sync {
    async fn append_turn(&self, session_id: &str, role: Role, content: &str) -> StoreResult<i64>;

    /// The latest `limit` turns of a session, returned oldest first.
    async fn recent_turns(&self, session_id: &str, limit: usize) -> StoreResult<Vec<ChatTurn>>;

    /// Every turn, optionally restricted to one session, oldest first.
    async fn all_turns(&self, session_id: Option<&str>) -> StoreResult<Vec<ChatTurn>>;

    async fn clear_turns(&self, session_id: Option<&str>) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip() {
        for s in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Archived] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn note_without_embedding_is_not_searchable() {
        let mut note = Note {
            id: 1,
            content: "door code 9876".into(),
            embedding: None,
            created_at: Utc::now(),
        };
        assert!(!note.is_searchable());
        note.embedding = Some(vec![]);
        assert!(!note.is_searchable());
        note.embedding = Some(vec![0.1, 0.2]);
        assert!(note.is_searchable());
    }
}
