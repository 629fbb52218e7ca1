//! Flat JSON history file
//!
//! The file is a single JSON object mapping stringified conversation ids to
//! arrays of `{role, content}`. Writes go to a temporary sibling file that is
//! then renamed over the target, so readers see either the old or the new
//! contents and never a partial write.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::PersistenceError;
use crate::domain::entities::{ConversationId, ConversationLog};

/// Full store contents as written to disk
pub type Snapshot = BTreeMap<ConversationId, ConversationLog>;

/// Read a snapshot from `path`
pub fn read(path: &Path) -> Result<Snapshot, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace `path` with `snapshot`
pub fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes =
        serde_json::to_vec_pretty(snapshot).map_err(|source| PersistenceError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
