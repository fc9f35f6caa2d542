//! Domain events — decoupled notifications between subsystems.
//!
//! The agent publishes what it does; the gateway and CLI may subscribe to
//! log or display it without the loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::lifecycle::{ModelKind, ModelPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user utterance entered the orchestrator
    MessageReceived {
        session_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// An answer was produced, by a fast path or the reasoning loop
    ResponseGenerated {
        session_id: String,
        fast_path: Option<String>,
        turns: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool ran
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model backend changed phase
    ModelStateChanged {
        kind: ModelKind,
        phase: ModelPhase,
        path: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An error was contained and turned into a user-visible answer
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "save_note".into(),
            success: true,
            duration_ms: 12,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted {
                tool_name, success, ..
            } => {
                assert_eq!(tool_name, "save_note");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(DomainEvent::ModelStateChanged {
            kind: ModelKind::Chat,
            phase: ModelPhase::Loaded,
            path: None,
            timestamp: Utc::now(),
        });
    }
}
