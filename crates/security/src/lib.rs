//! Filesystem guards for localecho.
//!
//! Anything that turns an externally supplied name into a path on disk goes
//! through [`resolve_within`].

pub mod path;

pub use path::{PathError, resolve_within, safe_basename};
