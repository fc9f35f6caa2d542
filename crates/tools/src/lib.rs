//! Built-in tool implementations for localecho.
//!
//! Tools give the agent its hands: tasks, semantic notes, session archives,
//! news, shift calendars, web pages and model sleep/wake. Each tool returns
//! bounded human-readable text, never raw records.

pub mod archive;
pub mod calendar;
pub mod lifecycle;
pub mod news;
pub mod notes;
pub mod tasks;
pub mod text;
pub mod web;

use std::sync::Arc;

use localecho_config::AppConfig;
use localecho_core::lifecycle::ModelLifecycle;
use localecho_core::provider::Embedder;
use localecho_core::store::{ChatLog, NoteStore, TaskStore};
use localecho_core::tool::ToolRegistry;

pub use archive::{ArchiveDir, ArchiveEntry, ArchiveError};
pub use calendar::{BetterShiftClient, CalendarClient};
pub use news::{GoogleNewsRss, NewsFeed, NewsItem};
pub use notes::{ReindexReport, reindex_notes};
pub use text::{truncate_chars, truncate_lines};

/// Collaborators the tools call into.
pub struct ToolDeps {
    pub tasks: Arc<dyn TaskStore>,
    pub notes: Arc<dyn NoteStore>,
    pub chat: Arc<dyn ChatLog>,
    pub embedder: Arc<dyn Embedder>,
    pub lifecycle: Option<Arc<dyn ModelLifecycle>>,
    pub news: Arc<dyn NewsFeed>,
    pub calendar: Arc<dyn CalendarClient>,
    pub web: web::BrowseWebTool,
    pub archives: ArchiveDir,
    pub recall_top_k: usize,
    pub max_context_lines: usize,
}

impl ToolDeps {
    /// Wire the real HTTP collaborators from configuration around one store.
    pub fn from_config<S>(
        config: &AppConfig,
        store: Arc<S>,
        embedder: Arc<dyn Embedder>,
        lifecycle: Option<Arc<dyn ModelLifecycle>>,
    ) -> Self
    where
        S: TaskStore + NoteStore + ChatLog + 'static,
    {
        Self {
            tasks: store.clone(),
            notes: store.clone(),
            chat: store,
            embedder,
            lifecycle,
            news: Arc::new(GoogleNewsRss::from_config(&config.news)),
            calendar: Arc::new(BetterShiftClient::from_config(&config.calendar)),
            web: web::BrowseWebTool::from_config(&config.web),
            archives: ArchiveDir::new(config.resolve_path(&config.storage.archive_dir)),
            recall_top_k: config.agent.recall_top_k,
            max_context_lines: config.agent.max_context_lines,
        }
    }
}

/// Build the registry in advertised order. The prompt schema and dispatch
/// both come from it.
pub fn default_registry(deps: ToolDeps) -> ToolRegistry {
    let ToolDeps {
        tasks,
        notes,
        chat,
        embedder,
        lifecycle,
        news,
        calendar,
        web,
        archives,
        recall_top_k,
        max_context_lines,
    } = deps;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(tasks::AddTaskTool::new(tasks.clone())));
    registry.register(Box::new(tasks::ListTasksTool::new(tasks.clone())));
    registry.register(Box::new(tasks::CompleteTaskTool::new(tasks.clone())));
    registry.register(Box::new(tasks::CompleteTaskByDescriptionTool::new(tasks.clone())));
    registry.register(Box::new(tasks::DeleteTaskTool::new(tasks.clone())));
    registry.register(Box::new(tasks::DeleteTaskByDescriptionTool::new(tasks.clone())));
    registry.register(Box::new(tasks::CompleteAllTasksTool::new(tasks.clone())));
    registry.register(Box::new(tasks::DeleteCompletedTasksTool::new(tasks.clone())));
    registry.register(Box::new(archive::ArchiveSessionTool::new(tasks, chat, archives)));
    registry.register(Box::new(
        news::GetNewsTool::new(news).with_max_lines(max_context_lines),
    ));
    registry.register(Box::new(notes::SaveNoteTool::new(notes.clone(), embedder.clone())));
    registry.register(Box::new(
        notes::RecallNotesTool::new(notes, embedder)
            .with_top_k(recall_top_k)
            .with_max_lines(max_context_lines),
    ));
    registry.register(Box::new(web.with_max_lines(max_context_lines)));
    registry.register(Box::new(calendar::CheckEntityStatusTool::new(calendar.clone())));
    registry.register(Box::new(calendar::ListCalendarsTool::new(calendar.clone())));
    registry.register(Box::new(calendar::ListShiftsTool::new(calendar.clone())));
    registry.register(Box::new(calendar::CreateShiftTool::new(calendar)));
    if let Some(lifecycle) = lifecycle {
        registry.register(Box::new(lifecycle::SleepModeTool::new(lifecycle.clone())));
        registry.register(Box::new(lifecycle::WakeModeTool::new(lifecycle)));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use localecho_core::error::ProviderError;
    use localecho_store::SqliteStore;

    struct NoEmbedder;

    #[async_trait::async_trait]
    impl Embedder for NoEmbedder {
        fn name(&self) -> &str {
            "none"
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::NotConfigured("test".into()))
        }
    }

    #[tokio::test]
    async fn registry_advertises_every_tool_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let mut deps = ToolDeps::from_config(&config, store, Arc::new(NoEmbedder), None);
        deps.archives = ArchiveDir::new(dir.path());

        let registry = default_registry(deps);
        let names = registry.names();
        for expected in [
            "add_task",
            "list_tasks",
            "complete_task",
            "complete_task_by_description",
            "delete_task",
            "delete_task_by_description",
            "complete_all_tasks",
            "delete_completed_tasks",
            "archive_session",
            "get_news",
            "save_note",
            "recall_notes",
            "browse_web",
            "check_entity_status",
            "list_calendars",
            "list_shifts",
            "create_shift",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(!names.contains(&"sleep_mode"), "no lifecycle, no sleep tool");

        let schema = registry.render_schema();
        for name in names {
            assert_eq!(schema.matches(&format!("**{name}(")).count(), 1, "{name}");
        }
    }
}
