//! Shared test helpers for agent tests.

use std::sync::Mutex;

use async_trait::async_trait;
use localecho_core::error::{ProviderError, ToolError};
use localecho_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use localecho_core::session::SessionContext;
use localecho_core::tool::{Tool, ToolArgs, ToolRegistry};

/// A provider that replays scripted replies in order and records every request.
///
/// Panics if called more times than it has replies.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        let replies = self.replies.lock().unwrap();
        let reply = replies.get(index).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no reply for call #{index} (have {})",
                replies.len()
            )
        });
        reply.map(|content| ProviderResponse {
            content,
            model: "scripted-model".into(),
            stop_reason: Some("stop".into()),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// A tool that always answers with the same text.
pub struct FakeTool {
    name: &'static str,
    reply: String,
}

impl FakeTool {
    pub fn new(name: &'static str, reply: &str) -> Self {
        Self {
            name,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Test double."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        Ok(self.reply.clone())
    }
}

pub fn registry_of(tools: Vec<FakeTool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Box::new(tool));
    }
    registry
}
