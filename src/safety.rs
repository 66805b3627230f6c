//! Filesystem traversal safety applied before any inbox file is opened.
//!
//! Both checks are mandatory: a candidate path must resolve to a descendant
//! of the trusted root (symlink escapes and `..` components fail the same
//! way), and its size must stay under the configured ceiling. The size check
//! never reads the file body.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

/// Resolve `path` and require it to be contained in `root`.
pub fn contained_path(path: &Path, root: &Path) -> Result<PathBuf> {
    let canonical_root = root.canonicalize()?;
    let canonical = path.canonicalize()?;
    if !canonical.starts_with(&canonical_root) {
        return Err(IngestError::PathEscapesRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    Ok(canonical)
}

/// Validate a candidate file for reading: containment plus size ceiling.
///
/// Returns the canonicalized path on success.
pub fn guard(path: &Path, root: &Path, max_file_size_bytes: u64) -> Result<PathBuf> {
    let canonical = contained_path(path, root)?;
    let metadata = fs::metadata(&canonical)?;
    if metadata.len() > max_file_size_bytes {
        return Err(IngestError::FileTooLarge {
            path: path.to_path_buf(),
            limit: max_file_size_bytes,
            actual: metadata.len(),
        });
    }
    Ok(canonical)
}
