//! The persisted model selection (`user_config.json`).
//!
//! Only `chat_model` and `embed_model` are owned here. Any other keys in the
//! file are preserved on write.

use localecho_core::error::LifecycleError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Selection {
    /// Read the selection. A missing or unreadable file yields the empty selection.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read model selection");
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring malformed model selection");
            Self::default()
        })
    }

    /// Write the selection through a temporary file and rename.
    pub async fn save(&self, path: &Path) -> Result<(), LifecycleError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LifecycleError::SelectionFile(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LifecycleError::SelectionFile(e.to_string()))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| LifecycleError::SelectionFile(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| LifecycleError::SelectionFile(e.to_string()))?;

        debug!(path = %path.display(), "Saved model selection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let selection = Selection::load(&dir.path().join("user_config.json")).await;
        assert_eq!(selection, Selection::default());
    }

    #[tokio::test]
    async fn save_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_config.json");
        tokio::fs::write(&path, r#"{"theme": "dark", "chat_model": "/old"}"#)
            .await
            .unwrap();

        let mut selection = Selection::load(&path).await;
        assert_eq!(selection.chat_model.as_deref(), Some("/old"));
        selection.chat_model = Some("/models/chat/qwen".into());
        selection.embed_model = Some("/models/embeddings/minilm".into());
        selection.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["chat_model"], "/models/chat/qwen");
        assert_eq!(raw["embed_model"], "/models/embeddings/minilm");
    }

    #[tokio::test]
    async fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_config.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert_eq!(Selection::load(&path).await, Selection::default());
    }
}
