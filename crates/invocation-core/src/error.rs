//! Error types for invocation-core

use std::path::PathBuf;

use crate::source::{FetchError, PersistError};

/// Result type for invocation-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in invocation-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A recurrence descriptor is outside its valid range
    #[error("Invalid recurrence: {reason}")]
    InvalidRecurrence { reason: String },

    /// Configuration file could not be parsed
    #[error("Invalid configuration at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record source could not enumerate records
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The persistence layer rejected a commit
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
