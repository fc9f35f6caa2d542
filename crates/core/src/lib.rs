//! # localecho core
//!
//! Domain types, traits, and error definitions for the localecho assistant.
//! This crate has no framework dependencies: it defines the model that the
//! store, providers, tools, agent and gateway crates implement against.
//!
//! Every subsystem boundary is a trait here:
//! - [`Provider`] / [`Embedder`] for the inference and embedding services
//! - [`TaskStore`], [`NoteStore`], [`ChatLog`] for persistence
//! - [`Tool`] for side-effecting operations the model may request
//! - [`ModelLifecycle`] / [`ModelBackend`] for local model management

pub mod error;
pub mod event;
pub mod lifecycle;
pub mod message;
pub mod provider;
pub mod session;
pub mod store;
pub mod tool;

pub use error::{Error, LifecycleError, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use lifecycle::{
    HealthReport, LifecycleSnapshot, ModelBackend, ModelEntry, ModelHandle, ModelKind,
    ModelLifecycle, ModelListing, ModelPhase, SwapOutcome, SwapStatus,
};
pub use message::{ChatTurn, Message, Role};
pub use provider::{Embedder, Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::SessionContext;
pub use store::{ChatLog, Note, NoteStore, ScoredNote, Task, TaskStatus, TaskStore};
pub use tool::{
    ArgValue, Observation, ParamKind, ParamSpec, Tool, ToolArgs, ToolInvocation, ToolRegistry,
};
