//! Provider traits — the abstraction over the inference and embedding services.
//!
//! A [`Provider`] sends an ordered list of role/content turns to a chat
//! completion backend and returns the generated text. An [`Embedder`] turns
//! text into a fixed-length vector. Both are opaque external services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// A chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model identifier passed through to the backend
    pub model: String,

    /// The prompt messages, in order
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.1
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,

    /// Which model actually responded
    pub model: String,

    /// Why generation stopped, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The chat completion boundary.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// The embedding boundary: text in, fixed-length vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_temperature_defaults_low() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"local","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert!(req.stop.is_empty());
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn response_omits_missing_metadata() {
        let resp = ProviderResponse {
            content: "Answer: hi".into(),
            model: "llama".into(),
            stop_reason: None,
            usage: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("usage"));
        assert!(!json.contains("stop_reason"));
    }
}
