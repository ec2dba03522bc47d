//! The record capability shared by every entity in an ordered collection
//!
//! Checklists, items, projects and tasks all participate in parent/child
//! collections. The algorithms in this crate only see them through the
//! [`Record`] trait: a stable identity, an optional parent, a persisted
//! sibling index and a set of named, possibly absent sort keys.

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sortable value extracted from a record
///
/// Variants of different kinds never meet within one comparator, so the
/// derived cross-variant order is only there to make the type totally ordered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SortKey {
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SortKey {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for SortKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SortKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for SortKey {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// An entity participating in an ordered parent/child collection
pub trait Record: Send + Sync + 'static {
    /// Stable identifier; never reused once assigned
    type Id: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static;

    /// Identity used for equality and lookup
    fn id(&self) -> Self::Id;

    /// Identity of the parent record, `None` for top-level records
    fn parent_id(&self) -> Option<Self::Id>;

    /// Persisted position among siblings sharing the same parent
    fn sibling_index(&self) -> i64;

    fn set_sibling_index(&mut self, index: i64);

    /// Look up a named sort key
    ///
    /// Returns `None` both for unknown names and for keys that are absent on
    /// this record.
    fn sort_key(&self, _name: &str) -> Option<SortKey> {
        None
    }
}
