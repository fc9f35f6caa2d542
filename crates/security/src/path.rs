//! Path sanitisation for user- and model-supplied file names.
//!
//! Archive names arrive over HTTP and from tool arguments. They must name a
//! single file directly inside a known directory: no separators, no parent
//! references, no absolute paths.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Error returned when path validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("File name is empty")]
    Empty,

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("'{path}' must be a plain file name, not a path")]
    NotABasename { path: String },

    #[error("'{path}' contains a forbidden character")]
    ForbiddenCharacter { path: String },

    #[error("Path '{path}' is outside '{root}'")]
    OutsideRoot { path: String, root: String },
}

/// Validate that `name` is a bare file name and return it trimmed.
pub fn safe_basename(name: &str) -> Result<String, PathError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PathError::Empty);
    }

    let normalized = name.replace('\\', "/");
    if normalized == "." || normalized == ".." || normalized.split('/').any(|part| part == "..") {
        warn!(path = %name, "Rejected path traversal");
        return Err(PathError::PathTraversal { path: name.into() });
    }

    if normalized.contains('/') || Path::new(name).is_absolute() {
        return Err(PathError::NotABasename { path: name.into() });
    }

    if name.chars().any(|c| c.is_control() || c == ':') {
        return Err(PathError::ForbiddenCharacter { path: name.into() });
    }

    Ok(name.to_string())
}

/// Join a sanitised basename onto `root`.
///
/// The result is checked lexically to have `root` as its only parent, so it
/// is safe to use for files that do not exist yet.
pub fn resolve_within(root: &Path, name: &str) -> Result<PathBuf, PathError> {
    let name = safe_basename(name)?;
    let joined = root.join(&name);

    let relative = joined
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            path: name.clone(),
            root: root.display().to_string(),
        })?;
    let mut components = relative.components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(joined),
        _ => Err(PathError::OutsideRoot {
            path: name,
            root: root.display().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass() {
        assert_eq!(
            safe_basename(" archive_2026-10-18_0930.txt ").unwrap(),
            "archive_2026-10-18_0930.txt"
        );
    }

    #[test]
    fn traversal_is_rejected() {
        for bad in ["../../etc/passwd", "..", "a/../b", "..\\windows\\system32"] {
            assert!(
                matches!(safe_basename(bad), Err(PathError::PathTraversal { .. })),
                "{bad} should be traversal"
            );
        }
    }

    #[test]
    fn paths_and_separators_are_rejected() {
        assert!(matches!(
            safe_basename("/etc/passwd"),
            Err(PathError::NotABasename { .. })
        ));
        assert!(matches!(
            safe_basename("dir/file.txt"),
            Err(PathError::NotABasename { .. })
        ));
        assert!(matches!(
            safe_basename("C:evil.txt"),
            Err(PathError::ForbiddenCharacter { .. })
        ));
        assert_eq!(safe_basename("   "), Err(PathError::Empty));
    }

    #[test]
    fn resolve_within_stays_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_within(dir.path(), "notes.txt").unwrap();
        assert_eq!(path.parent(), Some(dir.path()));

        assert!(resolve_within(dir.path(), "../../etc/passwd").is_err());
        assert!(resolve_within(dir.path(), "/etc/passwd").is_err());
    }
}
