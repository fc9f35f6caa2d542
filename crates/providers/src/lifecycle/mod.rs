//! Local model lifecycle: discovery, loading, swapping with fallback, sleep/wake.

pub mod backend;
pub mod catalog;
pub mod manager;
pub mod process;
pub mod selection;

pub use backend::HttpModelBackend;
pub use manager::{ModelManager, ModelPaths};
pub use process::ServerProcess;
pub use selection::Selection;
