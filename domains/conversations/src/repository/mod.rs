//! Durable storage for the Conversations domain

pub mod history_file;

use std::path::PathBuf;

use thiserror::Error;

/// Durable store errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("History file {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path} is malformed: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("History save task failed: {0}")]
    Background(String),
}

impl PersistenceError {
    /// True when the history file simply does not exist yet
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistenceError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
