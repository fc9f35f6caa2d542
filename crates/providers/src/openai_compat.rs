//! OpenAI-compatible inference and embedding client.
//!
//! Works with any local server exposing `/chat/completions` and
//! `/embeddings` (llama.cpp server, LM Studio, Ollama, vLLM, an MLX server).

use async_trait::async_trait;
use localecho_config::{AppConfig, InferenceConfig};
use localecho_core::error::ProviderError;
use localecho_core::message::Message;
use localecho_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A client for an OpenAI-compatible endpoint.
///
/// One value serves as both the [`Provider`] and, via its configured
/// embedding model, the [`Embedder`].
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: Option<String>,
    embed_model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            embed_model: String::new(),
            timeout,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// The chat completion client described by `[inference]`.
    pub fn from_inference(config: &InferenceConfig) -> Self {
        Self::new(
            "inference",
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
        .with_api_key(config.api_key.clone())
    }

    /// The embedding client described by `[embedding]`.
    pub fn embedder_from_config(config: &AppConfig) -> Self {
        Self::new(
            "embedding",
            config.embedding_url(),
            Duration::from_secs(config.embedding.timeout_secs),
        )
        .with_api_key(config.inference.api_key.clone())
        .with_embed_model(&config.embedding.model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(format!("{} after {:?}", self.name, self.timeout))
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "Service returned error");
        Err(ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        })
    }
}

/// Remove `<|...|>` control tags that some chat templates leak into output.
pub fn strip_control_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<|") {
        match rest[start + 2..].find("|>") {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + 2 + end + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[async_trait]
impl Provider for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        debug!(provider = %self.name, model = %request.model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parse_completion(api_response, &request.model)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        if self.embed_model.is_empty() {
            return Err(ProviderError::NotConfigured("embedding model".into()));
        }
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.embed_model,
            "input": text,
            "encoding_format": "float",
        });

        debug!(provider = %self.name, model = %self.embed_model, chars = text.len(), "Sending embedding request");

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let api_resp: EmbeddingApiResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse embedding response: {e}"))
        })?;

        parse_embedding(api_resp)
    }
}

fn parse_completion(
    api_response: ApiResponse,
    requested_model: &str,
) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        content: strip_control_tags(&choice.message.content.unwrap_or_default()),
        model: api_response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        stop_reason: choice.finish_reason,
        usage,
    })
}

fn parse_embedding(api_resp: EmbeddingApiResponse) -> Result<Vec<f32>, ProviderError> {
    let embedding = api_resp
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::InvalidResponse("No embedding in response".into()))?;
    if embedding.is_empty() {
        return Err(ProviderError::InvalidResponse("Empty embedding vector".into()));
    }
    Ok(embedding)
}

// --- API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("You are Echo"),
            Message::user("Hello"),
            Message::observation("No pending tasks."),
        ];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 3);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[2].role, "user");
        assert_eq!(
            api_messages[2].content.as_deref(),
            Some("Observation: No pending tasks.")
        );
    }

    #[test]
    fn control_tags_are_removed() {
        assert_eq!(
            strip_control_tags("<|im_start|>Answer: hi<|im_end|>"),
            "Answer: hi"
        );
        assert_eq!(strip_control_tags("a <| b"), "a <| b");
        assert_eq!(strip_control_tags("plain"), "plain");
    }

    #[test]
    fn completion_parsing_keeps_metadata() {
        let data = r#"{
            "model": "llama-3.2",
            "choices": [{"message": {"role": "assistant", "content": "Tool: list_tasks()<|eot_id|>"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 5, "total_tokens": 45}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = parse_completion(parsed, "local").unwrap();
        assert_eq!(response.content, "Tool: list_tasks()");
        assert_eq!(response.model, "llama-3.2");
        assert_eq!(response.stop_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 45);
    }

    #[test]
    fn completion_without_choices_is_invalid() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parse_completion(parsed, "local"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{"data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}], "model": "minilm"}"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parse_embedding(parsed).unwrap(), vec![0.1, 0.2, 0.3]);

        let empty: EmbeddingApiResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parse_embedding(empty).is_err());
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stop"][0], "Observation:");
                assert_eq!(body["max_tokens"], 600);
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "Answer: hello"}}]
                }))
            }),
        );
        let base = serve(router).await;
        let client = OpenAiCompatClient::new("test", base, Duration::from_secs(5));

        let response = client
            .complete(ProviderRequest {
                model: "local".into(),
                messages: vec![Message::user("hi")],
                temperature: 0.1,
                max_tokens: Some(600),
                stop: vec!["Observation:".into()],
            })
            .await
            .unwrap();
        assert_eq!(response.content, "Answer: hello");
        assert_eq!(response.model, "local");
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "loading") }),
        );
        let base = serve(router).await;
        let client =
            OpenAiCompatClient::new("test", base, Duration::from_secs(5)).with_embed_model("minilm");

        match client.embed("hello").await {
            Err(ProviderError::ApiError { status_code, .. }) => assert_eq!(status_code, 503),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn embedder_without_model_is_not_configured() {
        let client = OpenAiCompatClient::new("test", "http://127.0.0.1:9", Duration::from_secs(1));
        assert!(matches!(
            client.embed("x").await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
