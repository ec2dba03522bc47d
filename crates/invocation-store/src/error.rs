//! Error types for invocation-store

use std::path::PathBuf;

use invocation_core::PersistError;
use uuid::Uuid;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] invocation_core::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Snapshot at {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("No {kind} with id {id}")]
    UnknownRecord { kind: &'static str, id: Uuid },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unknown(kind: &'static str, id: Uuid) -> Self {
        Self::UnknownRecord { kind, id }
    }
}

impl From<Error> for PersistError {
    fn from(error: Error) -> Self {
        match error {
            Error::Io { path, source } => PersistError::Io { path, source },
            Error::Json(e) => PersistError::Serialize {
                message: e.to_string(),
            },
            other => PersistError::Rejected {
                reason: other.to_string(),
            },
        }
    }
}
