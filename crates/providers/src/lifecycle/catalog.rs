//! Model directory discovery.
//!
//! A model is any directory containing a `config.json`. Discovery walks the
//! configured roots recursively.

use localecho_core::error::LifecycleError;
use localecho_core::lifecycle::ModelKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const MARKER: &str = "config.json";

/// A discovered model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDir {
    pub id: String,
    pub name: String,
}

/// Check that `path` names a loadable model directory.
pub fn validate_model_dir(path: &str) -> Result<PathBuf, LifecycleError> {
    let invalid = |reason: &str| LifecycleError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }
    let dir = Path::new(path);
    if !dir.is_dir() {
        return Err(invalid("not a directory"));
    }
    if !dir.join(MARKER).is_file() {
        return Err(invalid("missing config.json"));
    }
    Ok(dir.to_path_buf())
}

/// Whether a directory name belongs in the listing for `kind`.
pub fn matches_kind(name: &str, kind: ModelKind) -> bool {
    let name = name.to_lowercase();
    match kind {
        ModelKind::Chat => !name.contains("embed") && !name.contains("bert"),
        ModelKind::Embedding => {
            name.contains("embed") || name.contains("bert") || name.contains("minilm")
        }
    }
}

/// Walk `roots` and return every model directory that fits `kind`, sorted by id.
pub fn scan(roots: &[PathBuf], kind: ModelKind) -> Vec<ModelDir> {
    let mut found = Vec::new();
    for root in roots {
        walk(root, &mut found);
    }
    found.retain(|m| matches_kind(&m.name, kind));
    found.sort_by(|a, b| a.id.cmp(&b.id));
    found.dedup_by(|a, b| a.id == b.id);
    debug!(kind = %kind, count = found.len(), "Scanned model directories");
    found
}

fn walk(dir: &Path, found: &mut Vec<ModelDir>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    if dir.join(MARKER).is_file() {
        found.push(ModelDir {
            id: dir.to_string_lossy().into_owned(),
            name: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            walk(&entry.path(), found);
        }
    }
}
