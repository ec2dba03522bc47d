//! Change Listener Adapter
//!
//! Translates store change events into [`OrderedProjection`] operations. A
//! listener is scoped: a projection of one project's tasks ignores tasks of
//! other projects, and treats a task re-parented into or out of its scope as
//! an insert or a removal.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::projection::{OrderedProjection, UpdateOutcome};
use crate::record::Record;
use crate::source::{ChangeEvent, ChangeKind, RecordSource, Scope};

/// What a single event did to the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The record is outside the listener's scope
    Ignored,
    Inserted { index: usize },
    Removed { index: usize },
    Updated(UpdateOutcome),
    /// The event referred to a record the projection does not hold
    Stale,
}

/// Feeds change events into an ordered projection
#[derive(Debug, Clone)]
pub struct ChangeListener<R: Record> {
    scope: Scope<R::Id>,
}

impl<R: Record> ChangeListener<R> {
    pub fn new(scope: Scope<R::Id>) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &Scope<R::Id> {
        &self.scope
    }

    /// Apply one event to the projection
    pub fn apply(&self, projection: &mut OrderedProjection<R>, event: &ChangeEvent<R>) -> Applied {
        let record = Arc::clone(&event.record);
        let in_scope = self.scope.admits(record.parent_id().as_ref());

        match event.kind {
            ChangeKind::Insert if in_scope => Applied::Inserted {
                index: projection.on_inserted(record),
            },
            ChangeKind::Insert => Applied::Ignored,
            ChangeKind::Delete => match projection.on_removed(&record.id()) {
                Some(index) => Applied::Removed { index },
                None if in_scope => Applied::Stale,
                None => Applied::Ignored,
            },
            ChangeKind::Update if in_scope => match projection.on_updated(record) {
                UpdateOutcome::Stale => Applied::Stale,
                outcome => Applied::Updated(outcome),
            },
            // Re-parented away from this scope
            ChangeKind::Update => match projection.on_removed(&record.id()) {
                Some(index) => Applied::Removed { index },
                None => Applied::Ignored,
            },
        }
    }

    /// Consume a change feed until it closes
    ///
    /// If the receiver lags behind and events are lost, the projection is
    /// rebuilt from a fresh fetch of the listener's scope.
    pub async fn run<S>(
        self,
        projection: Arc<Mutex<OrderedProjection<R>>>,
        mut events: broadcast::Receiver<ChangeEvent<R>>,
        source: Arc<Mutex<S>>,
    ) where
        S: RecordSource<R>,
    {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let mut projection = projection.lock().await;
                    self.apply(&mut projection, &event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, scope = %self.scope, "Change feed lagged, refetching");
                    let fetched = source.lock().await.fetch(&self.scope);
                    match fetched {
                        Ok(records) => {
                            projection
                                .lock()
                                .await
                                .replace_all(records.into_iter().map(Arc::new));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Refetch after lag failed");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(scope = %self.scope, "Change feed closed");
    }
}
