//! Process-wide wiring: store, clients, lifecycle manager, tools and agent.
//!
//! Built once per process and shared by the CLI and the HTTP gateway.

use std::sync::Arc;

use localecho_agent::Orchestrator;
use localecho_config::AppConfig;
use localecho_core::error::{Error, LifecycleError};
use localecho_core::event::{DomainEvent, EventBus};
use localecho_core::lifecycle::ModelLifecycle;
use localecho_core::provider::{Embedder, Provider};
use localecho_core::session::SessionContext;
use localecho_core::tool::ToolRegistry;
use localecho_providers::{ModelManager, OpenAiCompatClient};
use localecho_store::SqliteStore;
use localecho_tools::{ArchiveDir, ToolDeps, default_registry};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub embedder: Arc<dyn Embedder>,
    pub lifecycle: Arc<ModelManager>,
    pub events: Arc<EventBus>,
    pub tools: Arc<ToolRegistry>,
    pub agent: Arc<Orchestrator>,
    pub archives: ArchiveDir,
}

impl Runtime {
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let db_path = config.resolve_path(&config.storage.db_path);
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Internal(format!("Cannot create {}: {e}", parent.display())))?;
        }
        let store = Arc::new(SqliteStore::new(&db_path.to_string_lossy()).await?);
        info!(db = %db_path.display(), "Store opened");

        let events = Arc::new(EventBus::new(256));
        let lifecycle = Arc::new(ModelManager::from_config(&config)?.with_events(events.clone()));
        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAiCompatClient::embedder_from_config(&config));
        let provider: Arc<dyn Provider> =
            Arc::new(OpenAiCompatClient::from_inference(&config.inference));

        let model_control: Arc<dyn ModelLifecycle> = lifecycle.clone();
        let deps = ToolDeps::from_config(&config, store.clone(), embedder.clone(), Some(model_control.clone()));
        let archives = deps.archives.clone();
        let tools = Arc::new(default_registry(deps));

        let agent = Arc::new(
            Orchestrator::from_config(&config, provider, tools.clone(), store.clone())
                .with_lifecycle(model_control)
                .with_events(events.clone()),
        );

        Ok(Self {
            config,
            store,
            embedder,
            lifecycle,
            events,
            tools,
            agent,
            archives,
        })
    }

    /// Restore the persisted selection. A missing inference server is logged, not fatal.
    pub async fn start_models(&self) -> Result<(), LifecycleError> {
        restore_models(&self.lifecycle).await
    }

    /// [`Runtime::start_models`] on a background task.
    pub fn spawn_start_models(&self) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            let _ = restore_models(&lifecycle).await;
        })
    }

    /// Write every domain event to the log.
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        log_events(self.events.subscribe())
    }

    /// The single conversation, rebuilt from the chat log.
    pub async fn session(&self) -> SessionContext {
        match SessionContext::restore(self.config.session_id.clone(), self.store.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not restore chat history; starting empty");
                SessionContext::new(self.config.session_id.clone())
            }
        }
    }
}

async fn restore_models(lifecycle: &ModelManager) -> Result<(), LifecycleError> {
    lifecycle.startup().await.inspect_err(|e| {
        warn!(error = %e, "Model startup failed; continuing without a loaded model");
    })
}

/// Drain `rx` into tracing until the bus is dropped.
pub fn log_events(mut rx: Receiver<Arc<DomainEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::MessageReceived {
            session_id,
            content_preview,
            ..
        } => debug!(session = %session_id, preview = %content_preview, "Message received"),
        DomainEvent::ResponseGenerated {
            session_id,
            fast_path,
            turns,
            ..
        } => info!(session = %session_id, fast_path = ?fast_path, turns, "Response generated"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, success, duration_ms, "Tool executed"),
        DomainEvent::ModelStateChanged {
            kind, phase, path, ..
        } => debug!(kind = %kind, phase = ?phase, path = ?path, "Model phase changed"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => warn!(context = %context, error = %error_message, "Error contained"),
    }
}
