//! Core model and algorithms for Invocation
//!
//! Invocation turns reusable checklists into independent task lists
//! ("projects"). This crate holds the parts of that which have to stay
//! correct while records are mutated locally and merged in from other
//! replicas:
//!
//! - **Comparators and ordered projections**: live sorted views over a record
//!   collection, maintained incrementally from store change events
//! - **Index reconciliation**: restores dense, zero-based sibling indices after
//!   a remote merge without writing records that are already correct
//! - **Recurrence**: computes the next concrete due date of a recurring task
//!   relative to the instant its checklist was invoked
//!
//! # Architecture
//!
//! ```text
//!   record store (invocation-store)
//!        |  change events          merge signals
//!        v                              v
//!   ChangeListener              ReconcileWorker
//!        |                              |
//!   OrderedProjection           IndexReconciler --> commit_if_changed
//!        |
//!   observers (rendering layer)
//! ```
//!
//! The store itself is an external collaborator, reached only through the
//! traits in [`source`].

pub mod clock;
pub mod comparator;
pub mod config;
pub mod error;
pub mod listener;
pub mod model;
pub mod projection;
pub mod reconcile;
pub mod record;
pub mod recurrence;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use comparator::{Comparator, SortPolicy};
pub use config::{FormatStyle, Preferences, ProjectSort, ReconcilerConfig};
pub use error::{Error, Result};
pub use listener::{Applied, ChangeListener};
pub use model::{Checklist, Invocation, Item, Project, Task, invoke, normalize_link};
pub use projection::{
    ObservableSortedSequence, ObserverId, OrderedProjection, SequenceChange, UpdateOutcome,
};
pub use reconcile::{
    ChildIndexPass, IndexReconciler, PassReport, ReconcileHandle, ReconcilePass, ReconcileReport,
    ReconcileWorker, RequestOutcome, RootIndexPass, dense_assignments, move_assignments,
};
pub use record::{Record, SortKey};
pub use recurrence::{DueTime, Recurrence, next_due_date};
pub use source::{
    ChangeEvent, ChangeFeed, ChangeKind, FetchError, MergeFeed, MergeSignal, PersistError,
    Persistence, RecordSource, Scope,
};
