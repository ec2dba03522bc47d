//! Interfaces consumed from the record store
//!
//! The store is an external collaborator. It provides ordered fetches, a
//! push-based change feed per record type, a distinguished merge signal and a
//! conditional commit. Nothing in this crate assumes a particular backend.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::record::Record;

/// Which records a fetch should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<Id> {
    /// Every record of the type
    All,
    /// Direct children of one parent
    ChildrenOf(Id),
}

impl<Id: fmt::Debug> fmt::Display for Scope<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all records"),
            Scope::ChildrenOf(parent) => write!(f, "children of {:?}", parent),
        }
    }
}

impl<Id: PartialEq> Scope<Id> {
    /// Whether a record with the given parent falls inside this scope
    pub fn admits(&self, parent: Option<&Id>) -> bool {
        match self {
            Scope::All => true,
            Scope::ChildrenOf(expected) => parent == Some(expected),
        }
    }
}

/// Kind of change reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Delete,
    Update,
}

/// A single change notification
pub struct ChangeEvent<R> {
    pub kind: ChangeKind,
    /// Snapshot of the record after the change (before it, for deletes)
    pub record: Arc<R>,
}

impl<R> ChangeEvent<R> {
    pub fn new(kind: ChangeKind, record: Arc<R>) -> Self {
        Self { kind, record }
    }

    pub fn inserted(record: Arc<R>) -> Self {
        Self::new(ChangeKind::Insert, record)
    }

    pub fn deleted(record: Arc<R>) -> Self {
        Self::new(ChangeKind::Delete, record)
    }

    pub fn updated(record: Arc<R>) -> Self {
        Self::new(ChangeKind::Update, record)
    }
}

impl<R> Clone for ChangeEvent<R> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            record: Arc::clone(&self.record),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for ChangeEvent<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("kind", &self.kind)
            .field("record", &self.record)
            .finish()
    }
}

/// Notification that a bulk merge from another replica was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSignal {
    /// Replica the merged records came from
    pub origin: String,
    /// Number of records the merge touched
    pub records: usize,
}

impl MergeSignal {
    pub fn new(origin: impl Into<String>, records: usize) -> Self {
        Self {
            origin: origin.into(),
            records,
        }
    }

    /// Signal for a reconciliation requested by hand rather than by a merge
    pub fn manual() -> Self {
        Self::new("manual", 0)
    }
}

/// The record source could not enumerate records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch {scope}: {message}")]
pub struct FetchError {
    pub scope: String,
    pub message: String,
}

impl FetchError {
    pub fn new(scope: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            message: message.into(),
        }
    }
}

/// The persistence layer could not commit pending changes
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize records: {message}")]
    Serialize { message: String },

    #[error("Commit rejected: {reason}")]
    Rejected { reason: String },
}

/// Ordered access to one record type
pub trait RecordSource<R: Record> {
    /// Records inside `scope`, ordered by sibling index ascending
    fn fetch(&self, scope: &Scope<R::Id>) -> Result<Vec<R>, FetchError>;

    /// Stage a sibling index write
    ///
    /// Returns `false` when the record no longer exists. Staged writes become
    /// durable on the next [`Persistence::commit_if_changed`].
    fn write_sibling_index(&mut self, id: &R::Id, index: i64) -> bool;
}

/// Conditional commit of staged changes
pub trait Persistence {
    /// Whether anything was modified since the last commit
    fn has_changes(&self) -> bool;

    /// Commit staged changes
    ///
    /// Returns `Ok(false)` without touching storage when nothing changed.
    fn commit_if_changed(&mut self) -> Result<bool, PersistError>;
}

/// Push-based change notifications for one record type
pub trait ChangeFeed<R: Record> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<R>>;
}

/// Notifications of applied remote merges
pub trait MergeFeed {
    fn subscribe_merges(&self) -> broadcast::Receiver<MergeSignal>;
}
