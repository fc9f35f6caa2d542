//! `sleep_mode` / `wake_mode` — free model memory and bring it back.

use std::sync::Arc;

use async_trait::async_trait;
use localecho_core::error::ToolError;
use localecho_core::lifecycle::ModelLifecycle;
use localecho_core::session::SessionContext;
use localecho_core::tool::{Tool, ToolArgs};

pub struct SleepModeTool {
    lifecycle: Arc<dyn ModelLifecycle>,
}

impl SleepModeTool {
    pub fn new(lifecycle: Arc<dyn ModelLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl Tool for SleepModeTool {
    fn name(&self) -> &'static str {
        "sleep_mode"
    }

    fn description(&self) -> &'static str {
        "Unload all models and stop the inference server to free memory."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        self.lifecycle
            .sleep()
            .await
            .map_err(|e| ToolError::failed("sleep_mode", e.to_string()))?;
        Ok("✅ Sleep Mode Activated. Server stopped.".into())
    }
}

pub struct WakeModeTool {
    lifecycle: Arc<dyn ModelLifecycle>,
}

impl WakeModeTool {
    pub fn new(lifecycle: Arc<dyn ModelLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl Tool for WakeModeTool {
    fn name(&self) -> &'static str {
        "wake_mode"
    }

    fn description(&self) -> &'static str {
        "Start the inference server and reload the last selected models."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        self.lifecycle
            .wake()
            .await
            .map_err(|e| ToolError::failed("wake_mode", e.to_string()))?;
        Ok("✅ Wake Mode Initiated. Warming up...".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localecho_core::error::LifecycleError;
    use localecho_core::lifecycle::{
        HealthReport, LifecycleSnapshot, ModelKind, ModelListing, ModelPhase, SwapOutcome,
    };
    use localecho_core::tool::{ToolInvocation, ToolRegistry};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeLifecycle {
        calls: Mutex<Vec<&'static str>>,
        fail_wake: bool,
    }

    #[async_trait]
    impl ModelLifecycle for FakeLifecycle {
        fn snapshot(&self) -> LifecycleSnapshot {
            LifecycleSnapshot::default()
        }

        async fn swap(&self, _kind: ModelKind, _path: &str) -> SwapOutcome {
            unreachable!("not used")
        }

        async fn sleep(&self) -> Result<(), LifecycleError> {
            self.calls.lock().unwrap().push("sleep");
            Ok(())
        }

        async fn wake(&self) -> Result<(), LifecycleError> {
            self.calls.lock().unwrap().push("wake");
            if self.fail_wake {
                return Err(LifecycleError::Process("spawn failed".into()));
            }
            Ok(())
        }

        async fn health(&self) -> HealthReport {
            HealthReport {
                status: "unloaded".into(),
                chat_model: None,
                embed_model: None,
                chat_phase: ModelPhase::Unloaded,
                embed_phase: ModelPhase::Unloaded,
                memory_mb: None,
                memory_gb: None,
            }
        }

        async fn list_models(&self) -> ModelListing {
            ModelListing::default()
        }

        async fn wait_ready(&self, _kind: ModelKind, _timeout: Duration) -> Result<(), LifecycleError> {
            Ok(())
        }
    }

    fn registry(fail_wake: bool) -> (Arc<FakeLifecycle>, ToolRegistry) {
        let lifecycle = Arc::new(FakeLifecycle {
            calls: Mutex::new(Vec::new()),
            fail_wake,
        });
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SleepModeTool::new(lifecycle.clone())));
        registry.register(Box::new(WakeModeTool::new(lifecycle.clone())));
        (lifecycle, registry)
    }

    #[tokio::test]
    async fn sleep_then_wake() {
        let (lifecycle, registry) = registry(false);
        let mut session = SessionContext::new("t");
        let slept = registry
            .execute(&ToolInvocation::new("sleep_mode"), &mut session)
            .await;
        assert_eq!(slept.text, "✅ Sleep Mode Activated. Server stopped.");
        let woke = registry
            .execute(&ToolInvocation::new("wake_mode"), &mut session)
            .await;
        assert_eq!(woke.text, "✅ Wake Mode Initiated. Warming up...");
        assert_eq!(*lifecycle.calls.lock().unwrap(), vec!["sleep", "wake"]);
    }

    #[tokio::test]
    async fn wake_failure_is_reported() {
        let (_lifecycle, registry) = registry(true);
        let mut session = SessionContext::new("t");
        let obs = registry
            .execute(&ToolInvocation::new("wake_mode"), &mut session)
            .await;
        assert!(obs.is_error);
        assert!(obs.text.contains("spawn failed"));
    }
}
