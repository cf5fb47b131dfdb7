//! Error types for history persistence
//!
//! Analysis itself never fails; only reading and writing the on-disk
//! history can, and callers degrade those errors to warnings.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to access history file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("history file {path:?} is locked by another writer")]
    Locked { path: PathBuf },
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
