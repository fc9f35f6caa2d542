use async_trait::async_trait;
use localecho_core::error::LifecycleError;
use localecho_core::lifecycle::{ModelBackend, ModelKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Drives an inference server that exposes `POST /models/swap`.
pub struct HttpModelBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SwapRequest<'a> {
    model_path: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct SwapReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

impl HttpModelBackend {
    /// `base_url` is the server's API root, e.g. `http://127.0.0.1:1234/v1`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn wire_kind(kind: ModelKind) -> &'static str {
        match kind {
            ModelKind::Chat => "chat",
            ModelKind::Embedding => "embed",
        }
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&self, kind: ModelKind, path: &str) -> Result<(), LifecycleError> {
        let url = format!("{}/models/swap", self.base_url);
        let load_failed = |reason: String| LifecycleError::LoadFailed {
            kind,
            path: path.to_string(),
            reason,
        };

        debug!(kind = %kind, path, "Requesting model load");
        let response = self
            .client
            .post(&url)
            .json(&SwapRequest {
                model_path: path,
                kind: Self::wire_kind(kind),
            })
            .send()
            .await
            .map_err(|e| load_failed(e.to_string()))?;

        let status = response.status();
        let reply: SwapReply = response
            .json()
            .await
            .map_err(|e| load_failed(format!("unreadable reply ({status}): {e}")))?;

        if status.is_success() && reply.status == "ok" {
            info!(kind = %kind, path, "Model loaded");
            Ok(())
        } else {
            Err(load_failed(if reply.message.is_empty() {
                format!("server answered {status}")
            } else {
                reply.message
            }))
        }
    }

    async fn unload(&self, kind: ModelKind) -> Result<(), LifecycleError> {
        // The server frees model memory when its process stops.
        debug!(kind = %kind, "Unload deferred to server shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{Json, Router, routing::post};

    async fn serve() -> String {
        let router = Router::new().route(
            "/v1/models/swap",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["model_path"] == "/models/good" {
                    assert_eq!(body["type"], "embed");
                    (StatusCode::OK, Json(serde_json::json!({"status": "ok", "message": "Loaded"})))
                } else {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"status": "error", "message": "Invalid model path"})),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn load_reports_server_message() {
        let backend = HttpModelBackend::new(serve().await, Duration::from_secs(5));

        backend.load(ModelKind::Embedding, "/models/good").await.unwrap();

        match backend.load(ModelKind::Chat, "/models/bad").await {
            Err(LifecycleError::LoadFailed { reason, kind, .. }) => {
                assert_eq!(kind, ModelKind::Chat);
                assert_eq!(reason, "Invalid model path");
            }
            other => panic!("expected LoadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_load_failure() {
        let backend = HttpModelBackend::new("http://127.0.0.1:9/v1", Duration::from_secs(1));
        assert!(matches!(
            backend.load(ModelKind::Chat, "/models/x").await,
            Err(LifecycleError::LoadFailed { .. })
        ));
    }
}
