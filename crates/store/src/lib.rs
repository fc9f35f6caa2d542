//! Persistence layer for localecho.
//!
//! A single SQLite database holds tasks, notes (with embedding blobs) and
//! chat history. Every mutation runs in its own transaction and reports the
//! rows it changed only after the commit succeeded.

mod chat;
mod notes;
pub mod sqlite;
mod tasks;
pub mod vector;

pub use sqlite::SqliteStore;
pub use vector::{cosine_similarity, rank_notes};
