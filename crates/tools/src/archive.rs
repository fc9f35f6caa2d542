//! Session archives: plain-text snapshots of completed tasks and the chat log.
//!
//! `archive_session` writes the snapshot, then clears the session history and
//! moves completed tasks to `archived`. [`ArchiveDir`] serves the files back
//! by name; every name goes through the safe-basename check first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use localecho_core::error::ToolError;
use localecho_core::session::SessionContext;
use localecho_core::store::{ChatLog, TaskStatus, TaskStore};
use localecho_core::tool::{Tool, ToolArgs};
use localecho_security::{PathError, resolve_within, safe_basename};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid archive name: {0}")]
    InvalidName(#[from] PathError),

    #[error("Archive '{0}' not found")]
    NotFound(String),

    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// The archive directory, addressed only by sanitised basenames.
#[derive(Debug, Clone)]
pub struct ArchiveDir {
    root: PathBuf,
}

impl ArchiveDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, ArchiveError> {
        let name = safe_basename(name)?;
        Ok(resolve_within(&self.root, &name)?)
    }

    /// Archive files, newest name first.
    pub async fn list(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".txt") {
                continue;
            }
            entries.push(ArchiveEntry {
                name,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(entries)
    }

    pub async fn read(&self, name: &str) -> Result<String, ArchiveError> {
        let path = self.path_of(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<(), ArchiveError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(archive = %name, "Archive deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a new archive file and return its name.
    pub async fn write(&self, name: &str, content: &str) -> Result<String, ArchiveError> {
        let path = self.path_of(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, content).await?;
        Ok(safe_basename(name)?)
    }
}

pub struct ArchiveSessionTool {
    tasks: Arc<dyn TaskStore>,
    chat: Arc<dyn ChatLog>,
    dir: ArchiveDir,
}

impl ArchiveSessionTool {
    pub fn new(tasks: Arc<dyn TaskStore>, chat: Arc<dyn ChatLog>, dir: ArchiveDir) -> Self {
        Self { tasks, chat, dir }
    }

    fn failed(e: ArchiveError) -> ToolError {
        ToolError::failed("archive_session", e.to_string())
    }
}

#[async_trait]
impl Tool for ArchiveSessionTool {
    fn name(&self) -> &'static str {
        "archive_session"
    }

    fn description(&self) -> &'static str {
        "Archive completed tasks and the chat log to a file, then clear the conversation context."
    }

    fn example(&self) -> Option<&'static str> {
        Some("archive_session()")
    }

    async fn execute(&self, _args: ToolArgs, session: &mut SessionContext) -> Result<String, ToolError> {
        let now = Local::now();
        let completed = self.tasks.list_tasks(Some(TaskStatus::Completed)).await?;
        let turns = self.chat.all_turns(Some(session.session_id())).await?;

        let mut content = format!(
            "=== ECHO ARCHIVE [{}] ===\n\n[COMPLETED TASKS]\n",
            now.format("%Y-%m-%d %H:%M")
        );
        for task in &completed {
            let when = task
                .completed_at
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "N/A".into());
            content.push_str(&format!("[x] {} (Completed: {when})\n", task.description));
        }
        content.push_str("\n[CHAT LOG]\n");
        for turn in &turns {
            content.push_str(&format!(
                "{}: {}\n",
                turn.role.as_str().to_uppercase(),
                turn.content
            ));
        }

        let filename = format!("archive_{}.txt", now.format("%Y-%m-%d_%H%M"));
        let filename = self
            .dir
            .write(&filename, &content)
            .await
            .map_err(Self::failed)?;

        let cleared = self.chat.clear_turns(Some(session.session_id())).await?;
        session.clear();
        let archived = self.tasks.archive_completed_tasks().await?;
        if archived as usize != completed.len() {
            warn!(
                expected = completed.len(),
                archived, "Completed task count changed while archiving"
            );
        }

        info!(file = %filename, turns = cleared, tasks = archived, "Session archived");
        Ok(format!(
            "✅ Session archived to {filename}. Context cleared. {archived} tasks moved to archive."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localecho_core::message::Role;
    use localecho_core::tool::{ToolInvocation, ToolRegistry};
    use localecho_store::SqliteStore;

    #[tokio::test]
    async fn archive_writes_file_and_clears_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let done = store.add_task("File taxes", None).await.unwrap();
        store.complete_task(done).await.unwrap();
        store.add_task("Still pending", None).await.unwrap();
        store.append_turn("echo_main", Role::User, "hello").await.unwrap();
        store
            .append_turn("echo_main", Role::Assistant, "hi there")
            .await
            .unwrap();

        let archives = ArchiveDir::new(dir.path().join("archives"));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ArchiveSessionTool::new(
            store.clone(),
            store.clone(),
            archives.clone(),
        )));

        let mut session = SessionContext::restore("echo_main", store.as_ref())
            .await
            .unwrap();
        assert_eq!(session.history().len(), 2);

        let obs = registry
            .execute(&ToolInvocation::new("archive_session"), &mut session)
            .await;
        assert!(!obs.is_error, "{}", obs.text);
        assert!(obs.text.starts_with("✅ Session archived to archive_"));
        assert!(obs.text.ends_with("Context cleared. 1 tasks moved to archive."));
        assert!(session.history().is_empty());
        assert!(store.recent_turns("echo_main", 10).await.unwrap().is_empty());

        let archived = store.list_archived_tasks().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].status, TaskStatus::Archived);

        let listed = archives.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        let text = archives.read(&listed[0].name).await.unwrap();
        assert!(text.starts_with("=== ECHO ARCHIVE ["));
        assert!(text.contains("[x] File taxes (Completed: "));
        assert!(!text.contains("Still pending"));
        assert!(text.contains("USER: hello\nASSISTANT: hi there\n"));
    }

    #[tokio::test]
    async fn traversal_names_are_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let archives = ArchiveDir::new(dir.path());
        assert!(matches!(
            archives.read("../../etc/passwd").await,
            Err(ArchiveError::InvalidName(_))
        ));
        assert!(matches!(
            archives.delete("/etc/passwd").await,
            Err(ArchiveError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archives = ArchiveDir::new(dir.path());
        assert!(matches!(
            archives.read("archive_2020-01-01_0000.txt").await,
            Err(ArchiveError::NotFound(_))
        ));
        assert!(archives.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let archives = ArchiveDir::new(dir.path());
        let name = archives.write("archive_x.txt", "body").await.unwrap();
        archives.delete(&name).await.unwrap();
        assert!(archives.list().await.unwrap().is_empty());
    }
}
