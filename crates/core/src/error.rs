//! Error types for the localecho domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

use crate::lifecycle::ModelKind;

/// The top-level error type for all localecho operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model lifecycle errors ---
    #[error("Model lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the inference or embedding service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found.")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ToolError {
    pub fn invalid(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the model lifecycle state machine.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("Invalid model path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to load {kind} model {path}: {reason}")]
    LoadFailed {
        kind: ModelKind,
        path: String,
        reason: String,
    },

    #[error("The {kind} model is switching, try again shortly")]
    Busy { kind: ModelKind },

    #[error("No {kind} model could be loaded: {reason}")]
    AllTiersFailed { kind: ModelKind, reason: String },

    #[error("Server process error: {0}")]
    Process(String),

    #[error("Selection file error: {0}")]
    SelectionFile(String),
}

impl LifecycleError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 503,
            message: "model loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model loading"));
    }

    #[test]
    fn unknown_tool_message_names_the_tool() {
        let err = ToolError::NotFound("fly_to_moon".into());
        assert_eq!(err.to_string(), "Tool 'fly_to_moon' not found.");
    }

    #[test]
    fn invalid_arguments_displays_tool_and_reason() {
        let err = ToolError::invalid("add_task", "missing required argument 'description'");
        assert!(err.to_string().contains("add_task"));
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn only_busy_is_retryable() {
        assert!(LifecycleError::Busy { kind: ModelKind::Chat }.is_retryable());
        assert!(!LifecycleError::Process("boom".into()).is_retryable());
        assert!(
            !LifecycleError::AllTiersFailed {
                kind: ModelKind::Embedding,
                reason: "x".into()
            }
            .is_retryable()
        );
    }
}
