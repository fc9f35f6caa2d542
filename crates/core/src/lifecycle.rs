//! Model lifecycle domain — which local model is active per backend kind.
//!
//! Per kind the state machine is
//! `Unloaded → Loading → Loaded → Swapping → (Loaded | FallbackLoaded) → Unloaded`.
//! Implementations keep one authoritative [`LifecycleSnapshot`]; every view
//! (health, listing, readiness) is derived from a single read of it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    #[serde(alias = "embed")]
    Embedding,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Chat, ModelKind::Embedding];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Chat => "chat",
            ModelKind::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPhase {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Swapping,
    /// A swap failed and a previous or default model was restored.
    FallbackLoaded,
}

impl ModelPhase {
    /// A model is resident and may serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelPhase::Loaded | ModelPhase::FallbackLoaded)
    }

    /// A load or swap is in flight; readers must not use the backend.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, ModelPhase::Loading | ModelPhase::Swapping)
    }
}

/// The logical handle of one backend kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub kind: ModelKind,
    /// The resolved model path; kept while unloaded so wake can restore it.
    pub path: Option<String>,
    pub phase: ModelPhase,
}

impl ModelHandle {
    pub fn unloaded(kind: ModelKind) -> Self {
        Self {
            kind,
            path: None,
            phase: ModelPhase::Unloaded,
        }
    }

    /// The path of the resident model, if one is ready.
    pub fn active_path(&self) -> Option<&str> {
        if self.phase.is_ready() {
            self.path.as_deref()
        } else {
            None
        }
    }
}

/// The whole lifecycle state, one handle per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub chat: ModelHandle,
    pub embedding: ModelHandle,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self {
            chat: ModelHandle::unloaded(ModelKind::Chat),
            embedding: ModelHandle::unloaded(ModelKind::Embedding),
        }
    }
}

impl LifecycleSnapshot {
    pub fn get(&self, kind: ModelKind) -> &ModelHandle {
        match kind {
            ModelKind::Chat => &self.chat,
            ModelKind::Embedding => &self.embedding,
        }
    }

    pub fn get_mut(&mut self, kind: ModelKind) -> &mut ModelHandle {
        match kind {
            ModelKind::Chat => &mut self.chat,
            ModelKind::Embedding => &mut self.embedding,
        }
    }
}

/// An installed model found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Full path, used as the identifier for swaps
    pub id: String,
    /// Directory name
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListing {
    pub chat: Vec<ModelEntry>,
    pub embed: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Ok,
    Error,
}

/// Structured swap result. A failed swap is reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub status: SwapStatus,
    pub message: String,
    /// The model resident after the swap attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

impl SwapOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == SwapStatus::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub chat_model: Option<String>,
    pub embed_model: Option<String>,
    pub chat_phase: ModelPhase,
    pub embed_phase: ModelPhase,
    pub memory_mb: Option<f64>,
    pub memory_gb: Option<f64>,
}

/// The resource that actually holds model weights.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, kind: ModelKind, path: &str) -> std::result::Result<(), LifecycleError>;

    async fn unload(&self, kind: ModelKind) -> std::result::Result<(), LifecycleError>;
}

/// The lifecycle operations exposed to the agent, tools and gateway.
#[async_trait]
pub trait ModelLifecycle: Send + Sync {
    /// One consistent read of the authoritative state.
    fn snapshot(&self) -> LifecycleSnapshot;

    /// Swap with fallback tiers: requested → previous → default.
    async fn swap(&self, kind: ModelKind, path: &str) -> SwapOutcome;

    /// Release every loaded model.
    async fn sleep(&self) -> std::result::Result<(), LifecycleError>;

    /// Reload the last-known selection.
    async fn wake(&self) -> std::result::Result<(), LifecycleError>;

    async fn health(&self) -> HealthReport;

    async fn list_models(&self) -> ModelListing;

    /// Wait until `kind` is no longer mid-transition.
    async fn wait_ready(
        &self,
        kind: ModelKind,
        timeout: Duration,
    ) -> std::result::Result<(), LifecycleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_path_requires_ready_phase() {
        let mut handle = ModelHandle::unloaded(ModelKind::Chat);
        handle.path = Some("/models/chat/llama".into());
        assert_eq!(handle.active_path(), None);
        handle.phase = ModelPhase::Swapping;
        assert_eq!(handle.active_path(), None);
        handle.phase = ModelPhase::FallbackLoaded;
        assert_eq!(handle.active_path(), Some("/models/chat/llama"));
    }

    #[test]
    fn kind_accepts_embed_alias() {
        let kind: ModelKind = serde_json::from_str("\"embed\"").unwrap();
        assert_eq!(kind, ModelKind::Embedding);
        let kind: ModelKind = serde_json::from_str("\"chat\"").unwrap();
        assert_eq!(kind, ModelKind::Chat);
    }

    #[test]
    fn swap_outcome_serializes_status_lowercase() {
        let outcome = SwapOutcome {
            status: SwapStatus::Error,
            message: "Swap failed (bad path). Restored previous model.".into(),
            active: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("active").is_none());
    }
}
