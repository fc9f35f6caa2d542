//! Inference, embedding and model lifecycle implementations for localecho.
//!
//! The inference and embedding services implement the
//! `localecho_core::Provider` and `localecho_core::Embedder` traits; the
//! lifecycle manager implements `localecho_core::ModelLifecycle`.

pub mod lifecycle;
pub mod openai_compat;

pub use lifecycle::{HttpModelBackend, ModelManager, ModelPaths, ServerProcess};
pub use openai_compat::{OpenAiCompatClient, strip_control_tags};
