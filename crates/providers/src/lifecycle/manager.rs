//! The model lifecycle state machine.
//!
//! One `watch` channel holds the authoritative [`LifecycleSnapshot`]. Every
//! reader (health, model listing, readiness waits) borrows from it, so two
//! views of "the current model" can never disagree. Load, swap and wake for
//! a kind run under that kind's mutex and queue behind each other.

use async_trait::async_trait;
use chrono::Utc;
use localecho_config::AppConfig;
use localecho_core::error::LifecycleError;
use localecho_core::event::{DomainEvent, EventBus};
use localecho_core::lifecycle::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::backend::HttpModelBackend;
use super::catalog::{ModelDir, scan, validate_model_dir};
use super::process::{ServerProcess, resident_memory_mb};
use super::selection::Selection;

/// Where models live and which ones to fall back to.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub chat_dirs: Vec<PathBuf>,
    pub embed_dirs: Vec<PathBuf>,
    pub default_chat: String,
    pub default_embed: String,
    pub selection_file: PathBuf,
}

impl ModelPaths {
    pub fn from_config(config: &AppConfig) -> Self {
        let resolve = |p: &str| config.resolve_path(p);
        let resolve_str = |p: &str| resolve(p).to_string_lossy().into_owned();
        Self {
            chat_dirs: config.models.chat_dirs.iter().map(|d| resolve(d)).collect(),
            embed_dirs: config.models.embed_dirs.iter().map(|d| resolve(d)).collect(),
            default_chat: resolve_str(&config.models.default_chat),
            default_embed: resolve_str(&config.models.default_embed),
            selection_file: resolve(&config.models.selection_file),
        }
    }

    fn default_for(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Chat => &self.default_chat,
            ModelKind::Embedding => &self.default_embed,
        }
    }
}

pub struct ModelManager {
    backend: Arc<dyn ModelBackend>,
    paths: ModelPaths,
    state: watch::Sender<LifecycleSnapshot>,
    chat_lock: Mutex<()>,
    embed_lock: Mutex<()>,
    selection_lock: Mutex<()>,
    process: Option<ServerProcess>,
    events: Option<Arc<EventBus>>,
    wake_attempts: u32,
    wake_delay: Duration,
}

impl ModelManager {
    pub fn new(backend: Arc<dyn ModelBackend>, paths: ModelPaths) -> Self {
        let (state, _) = watch::channel(LifecycleSnapshot::default());
        Self {
            backend,
            paths,
            state,
            chat_lock: Mutex::new(()),
            embed_lock: Mutex::new(()),
            selection_lock: Mutex::new(()),
            process: None,
            events: None,
            wake_attempts: 10,
            wake_delay: Duration::from_secs(1),
        }
    }

    /// A manager driving the configured inference server over HTTP.
    pub fn from_config(config: &AppConfig) -> Result<Self, LifecycleError> {
        let backend = Arc::new(HttpModelBackend::new(
            &config.inference.base_url,
            Duration::from_secs(config.inference.timeout_secs),
        ));
        let manager = Self::new(backend, ModelPaths::from_config(config));
        match &config.models.server {
            Some(command) => Ok(manager.with_process(ServerProcess::new(command.clone())?)),
            None => Ok(manager),
        }
    }

    /// Supervise the inference server: stopped on sleep, spawned on wake.
    pub fn with_process(mut self, process: ServerProcess) -> Self {
        self.process = Some(process);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// How often a freshly spawned server is polled before giving up.
    pub fn with_wake_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.wake_attempts = attempts.max(1);
        self.wake_delay = delay;
        self
    }

    /// Load the persisted selection (or the defaults) for both kinds.
    pub async fn startup(&self) -> Result<(), LifecycleError> {
        info!(selection = %self.paths.selection_file.display(), "Restoring model selection");
        self.wake().await
    }

    /// The known path for `kind`, whatever its phase.
    pub fn current(&self, kind: ModelKind) -> Option<String> {
        self.state.borrow().get(kind).path.clone()
    }

    fn lock_for(&self, kind: ModelKind) -> &Mutex<()> {
        match kind {
            ModelKind::Chat => &self.chat_lock,
            ModelKind::Embedding => &self.embed_lock,
        }
    }

    fn transition(&self, kind: ModelKind, phase: ModelPhase, path: Option<String>) {
        self.state.send_modify(|snapshot| {
            let handle = snapshot.get_mut(kind);
            handle.phase = phase;
            handle.path = path.clone();
        });
        info!(kind = %kind, phase = ?phase, path = ?path, "Model state changed");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::ModelStateChanged {
                kind,
                phase,
                path,
                timestamp: Utc::now(),
            });
        }
    }

    async fn try_load(&self, kind: ModelKind, path: &str) -> Result<(), LifecycleError> {
        validate_model_dir(path)?;
        self.backend.load(kind, path).await
    }

    /// Like `try_load`, but polls while a freshly spawned server comes up.
    async fn load_with_retry(&self, kind: ModelKind, path: &str) -> Result<(), LifecycleError> {
        let attempts = if self.process.is_some() {
            self.wake_attempts
        } else {
            1
        };
        let mut attempt = 1;
        loop {
            match self.try_load(kind, path).await {
                Err(LifecycleError::LoadFailed { reason, .. }) if attempt < attempts => {
                    debug!(kind = %kind, attempt, %reason, "Server not ready, retrying load");
                    tokio::time::sleep(self.wake_delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn persist(&self, kind: ModelKind, path: &str) {
        let _guard = self.selection_lock.lock().await;
        let mut selection = Selection::load(&self.paths.selection_file).await;
        match kind {
            ModelKind::Chat => selection.chat_model = Some(path.to_string()),
            ModelKind::Embedding => selection.embed_model = Some(path.to_string()),
        }
        if let Err(e) = selection.save(&self.paths.selection_file).await {
            warn!(kind = %kind, error = %e, "Could not persist model selection");
        }
    }

    /// Load the known path for `kind` (else `remembered`, else the default),
    /// falling back to the default. A kind that became ready while this call
    /// waited for the lock is left alone.
    async fn bring_up(&self, kind: ModelKind, remembered: Option<String>) -> Result<(), LifecycleError> {
        let _guard = self.lock_for(kind).lock().await;
        let handle = self.state.borrow().get(kind).clone();
        if handle.phase.is_ready() {
            debug!(kind = %kind, path = ?handle.path, "Model already ready");
            return Ok(());
        }
        let default = self.paths.default_for(kind).to_string();
        let target = handle
            .path
            .or(remembered)
            .unwrap_or_else(|| default.clone());

        self.transition(kind, ModelPhase::Loading, Some(target.clone()));
        let err = match self.load_with_retry(kind, &target).await {
            Ok(()) => {
                self.transition(kind, ModelPhase::Loaded, Some(target.clone()));
                self.persist(kind, &target).await;
                return Ok(());
            }
            Err(e) => e,
        };

        if target != default {
            warn!(kind = %kind, path = %target, error = %err, "Falling back to default model");
            match self.load_with_retry(kind, &default).await {
                Ok(()) => {
                    self.transition(kind, ModelPhase::FallbackLoaded, Some(default.clone()));
                    self.persist(kind, &default).await;
                    return Ok(());
                }
                Err(e) => {
                    self.transition(kind, ModelPhase::Unloaded, None);
                    return Err(LifecycleError::AllTiersFailed {
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.transition(kind, ModelPhase::Unloaded, None);
        Err(LifecycleError::AllTiersFailed {
            kind,
            reason: err.to_string(),
        })
    }
}

fn failure_reason(err: LifecycleError) -> String {
    match err {
        LifecycleError::LoadFailed { reason, .. } | LifecycleError::InvalidPath { reason, .. } => {
            reason
        }
        other => other.to_string(),
    }
}

fn display_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[async_trait]
impl ModelLifecycle for ModelManager {
    fn snapshot(&self) -> LifecycleSnapshot {
        self.state.borrow().clone()
    }

    async fn swap(&self, kind: ModelKind, path: &str) -> SwapOutcome {
        if let Err(e) = validate_model_dir(path) {
            warn!(kind = %kind, path, error = %e, "Rejected swap");
            return SwapOutcome {
                status: SwapStatus::Error,
                message: "Invalid model path".into(),
                active: self.current(kind),
            };
        }

        let _guard = self.lock_for(kind).lock().await;
        let previous = self.current(kind);
        self.transition(kind, ModelPhase::Swapping, previous.clone());

        let reason = match self.try_load(kind, path).await {
            Ok(()) => {
                self.transition(kind, ModelPhase::Loaded, Some(path.to_string()));
                self.persist(kind, path).await;
                return SwapOutcome {
                    status: SwapStatus::Ok,
                    message: format!("Loaded {}", display_name(path)),
                    active: Some(path.to_string()),
                };
            }
            Err(e) => failure_reason(e),
        };
        warn!(kind = %kind, path, %reason, "Swap failed, trying fallbacks");

        if let Some(prev) = previous.as_deref().filter(|p| *p != path) {
            match self.try_load(kind, prev).await {
                Ok(()) => {
                    self.transition(kind, ModelPhase::FallbackLoaded, Some(prev.to_string()));
                    self.persist(kind, prev).await;
                    return SwapOutcome {
                        status: SwapStatus::Error,
                        message: format!("Swap failed ({reason}). Restored previous model."),
                        active: Some(prev.to_string()),
                    };
                }
                Err(e) => warn!(kind = %kind, path = prev, error = %e, "Restore of previous model failed"),
            }
        }

        let default = self.paths.default_for(kind);
        if default != path && previous.as_deref() != Some(default) {
            match self.try_load(kind, default).await {
                Ok(()) => {
                    self.transition(kind, ModelPhase::FallbackLoaded, Some(default.to_string()));
                    self.persist(kind, default).await;
                    return SwapOutcome {
                        status: SwapStatus::Error,
                        message: format!("Swap failed ({reason}). Reverted to default model."),
                        active: Some(default.to_string()),
                    };
                }
                Err(e) => warn!(kind = %kind, path = default, error = %e, "Default model failed"),
            }
        }

        self.transition(kind, ModelPhase::Unloaded, None);
        error!(kind = %kind, %reason, "Every fallback tier failed");
        SwapOutcome {
            status: SwapStatus::Error,
            message: format!("Swap failed ({reason}). No model could be restored."),
            active: None,
        }
    }

    async fn sleep(&self) -> Result<(), LifecycleError> {
        for kind in ModelKind::ALL {
            let _guard = self.lock_for(kind).lock().await;
            if let Err(e) = self.backend.unload(kind).await {
                warn!(kind = %kind, error = %e, "Unload failed");
            }
            let path = self.current(kind);
            self.transition(kind, ModelPhase::Unloaded, path);
        }
        if let Some(process) = &self.process {
            process.stop().await?;
        }
        info!("Models released");
        Ok(())
    }

    async fn wake(&self) -> Result<(), LifecycleError> {
        if let Some(process) = &self.process {
            process.start().await?;
        }

        let selection = Selection::load(&self.paths.selection_file).await;
        let mut first_error = None;
        for kind in ModelKind::ALL {
            let remembered = match kind {
                ModelKind::Chat => selection.chat_model.clone(),
                ModelKind::Embedding => selection.embed_model.clone(),
            };
            if let Err(e) = self.bring_up(kind, remembered).await {
                error!(kind = %kind, error = %e, "Could not load model");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn health(&self) -> HealthReport {
        let snapshot = self.snapshot();

        let server_pid = match &self.process {
            Some(process) => process.pid().await,
            None => None,
        };
        let memory_mb = resident_memory_mb(server_pid.unwrap_or_else(std::process::id));

        let status = if snapshot.chat.phase.is_transitioning()
            || snapshot.embedding.phase.is_transitioning()
        {
            "switching"
        } else if snapshot.chat.phase.is_ready() {
            "ok"
        } else {
            "unloaded"
        };

        HealthReport {
            status: status.into(),
            chat_model: snapshot.chat.path,
            embed_model: snapshot.embedding.path,
            chat_phase: snapshot.chat.phase,
            embed_phase: snapshot.embedding.phase,
            memory_mb: memory_mb.map(|mb| round_to(mb, 1)),
            memory_gb: memory_mb.map(|mb| round_to(mb / 1024.0, 2)),
        }
    }

    async fn list_models(&self) -> ModelListing {
        let snapshot = self.snapshot();
        let chat_dirs = self.paths.chat_dirs.clone();
        let embed_dirs = self.paths.embed_dirs.clone();

        let scanned = tokio::task::spawn_blocking(move || {
            (
                scan(&chat_dirs, ModelKind::Chat),
                scan(&embed_dirs, ModelKind::Embedding),
            )
        })
        .await;
        let (chat, embed) = scanned.unwrap_or_else(|e| {
            warn!(error = %e, "Model scan failed");
            (Vec::new(), Vec::new())
        });

        let entries = |dirs: Vec<ModelDir>, kind: ModelKind| -> Vec<ModelEntry> {
            let selected = snapshot.get(kind).path.as_deref();
            dirs.into_iter()
                .map(|m| ModelEntry {
                    selected: selected == Some(m.id.as_str()),
                    id: m.id,
                    name: m.name,
                })
                .collect()
        };

        ModelListing {
            chat: entries(chat, ModelKind::Chat),
            embed: entries(embed, ModelKind::Embedding),
        }
    }

    async fn wait_ready(&self, kind: ModelKind, timeout: Duration) -> Result<(), LifecycleError> {
        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|snapshot| !snapshot.get(kind).phase.is_transitioning()),
        )
        .await
        .map(|result| result.is_ok());

        match settled {
            Ok(_) => Ok(()),
            Err(_) => {
                debug!(kind = %kind, ?timeout, "Model still switching");
                Err(LifecycleError::Busy { kind })
            }
        }
    }
}
