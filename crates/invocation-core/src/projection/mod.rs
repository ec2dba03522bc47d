//! Ordered projections over a mutable record collection
//!
//! An [`OrderedProjection`] owns a sorted sequence of record snapshots. It is
//! built once with a full sort and then kept current from store change events:
//! inserts binary-search their position, removals splice by identity and
//! updates relocate a single record. A full re-sort only happens when the
//! sort policy itself changes.
//!
//! Incremental maintenance is observably equivalent to re-sorting the current
//! record set, because [`SortPolicy::compare`] is a total order.

mod observer;

pub use observer::{ObservableSortedSequence, Observer, ObserverId, SequenceChange};

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::comparator::{Comparator, SortPolicy};
use crate::record::{Record, SortKey};
use observer::Observers;

/// Result of [`OrderedProjection::on_updated`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record is not in the projection; nothing was changed
    Stale,
    /// The record kept its position; observers were not notified
    Unchanged { index: usize },
    /// The record was relocated
    Moved { from: usize, to: usize },
}

impl UpdateOutcome {
    /// Position of the record after the update, if it is in the projection
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Stale => None,
            Self::Unchanged { index } => Some(*index),
            Self::Moved { to, .. } => Some(*to),
        }
    }
}

/// A live, sorted view over a record collection
pub struct OrderedProjection<R: Record> {
    records: Vec<Arc<R>>,
    /// Cached sort keys, parallel to `records`
    keys: Vec<Option<SortKey>>,
    policy: SortPolicy<R>,
    observers: Observers<R>,
}

impl<R: Record> OrderedProjection<R> {
    /// Build a projection with a full sort of `records`
    ///
    /// Duplicate identities keep their first occurrence.
    pub fn initialize<I>(
        records: I,
        comparator: Comparator<R>,
        ascending: bool,
        empty_first: bool,
    ) -> Self
    where
        I: IntoIterator<Item = Arc<R>>,
    {
        Self::with_policy(records, SortPolicy::new(comparator, ascending, empty_first))
    }

    pub fn with_policy<I>(records: I, policy: SortPolicy<R>) -> Self
    where
        I: IntoIterator<Item = Arc<R>>,
    {
        let mut projection = Self {
            records: Vec::new(),
            keys: Vec::new(),
            policy,
            observers: Observers::default(),
        };
        projection.rebuild(records.into_iter().collect());
        projection
    }

    /// Change the sort policy and fully re-sort
    pub fn reconfigure(&mut self, comparator: Comparator<R>, ascending: bool, empty_first: bool) {
        self.set_policy(SortPolicy::new(comparator, ascending, empty_first));
    }

    pub fn set_policy(&mut self, policy: SortPolicy<R>) {
        tracing::debug!(
            comparator = policy.comparator.name(),
            ascending = policy.ascending,
            empty_first = policy.empty_first,
            "Re-sorting projection"
        );
        self.policy = policy;
        let records = std::mem::take(&mut self.records);
        self.rebuild(records);
        self.notify(SequenceChange::Reset);
    }

    /// Replace the whole record set under the current policy
    pub fn replace_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Arc<R>>,
    {
        self.rebuild(records.into_iter().collect());
        self.notify(SequenceChange::Reset);
    }

    /// Splice a new record in at its sorted position
    ///
    /// A record whose identity is already present is relocated instead, so a
    /// duplicated insert notification cannot duplicate the record.
    pub fn on_inserted(&mut self, record: Arc<R>) -> usize {
        let id = record.id();
        if let Some(from) = self.position(&id) {
            tracing::debug!(?id, "Insert for a record already in the projection");
            return self.relocate(from, record).index().unwrap_or(from);
        }

        let key = self.policy.comparator.key(&record);
        let index = self.insertion_point(key.as_ref(), &record);
        self.keys.insert(index, key);
        self.records.insert(index, record);
        tracing::trace!(?id, index, "Inserted into projection");
        self.notify(SequenceChange::Inserted { index });
        index
    }

    /// Remove a record by identity
    ///
    /// Returns the index it occupied, or `None` for a stale notification.
    pub fn on_removed(&mut self, id: &R::Id) -> Option<usize> {
        let Some(index) = self.position(id) else {
            tracing::debug!(?id, "Removal for a record not in the projection");
            return None;
        };
        self.keys.remove(index);
        self.records.remove(index);
        self.notify(SequenceChange::Removed { index });
        Some(index)
    }

    /// Re-evaluate an updated record's position
    pub fn on_updated(&mut self, record: Arc<R>) -> UpdateOutcome {
        let id = record.id();
        match self.position(&id) {
            Some(from) => self.relocate(from, record),
            None => {
                tracing::debug!(?id, "Update for a record not in the projection");
                UpdateOutcome::Stale
            }
        }
    }

    /// Current sort policy
    pub fn policy(&self) -> &SortPolicy<R> {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the sorted sequence
    pub fn as_slice(&self) -> &[Arc<R>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<R>> {
        self.records.iter()
    }

    /// Position of a record by identity
    pub fn position(&self, id: &R::Id) -> Option<usize> {
        self.records.iter().position(|record| record.id() == *id)
    }

    pub fn contains(&self, id: &R::Id) -> bool {
        self.position(id).is_some()
    }

    /// Number of subscribed observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn rebuild(&mut self, records: Vec<Arc<R>>) {
        let mut seen = HashSet::with_capacity(records.len());
        let mut keyed: Vec<(Option<SortKey>, Arc<R>)> = records
            .into_iter()
            .filter(|record| seen.insert(record.id()))
            .map(|record| (self.policy.comparator.key(&record), record))
            .collect();

        let policy = &self.policy;
        keyed.sort_by(|(a_key, a), (b_key, b)| policy.compare(a_key.as_ref(), a, b_key.as_ref(), b));

        (self.keys, self.records) = keyed.into_iter().unzip();
    }

    fn relocate(&mut self, from: usize, record: Arc<R>) -> UpdateOutcome {
        self.keys.remove(from);
        self.records.remove(from);

        let key = self.policy.comparator.key(&record);
        let to = self.insertion_point(key.as_ref(), &record);
        self.keys.insert(to, key);
        self.records.insert(to, record);

        if to == from {
            UpdateOutcome::Unchanged { index: to }
        } else {
            tracing::trace!(from, to, "Relocated record in projection");
            self.notify(SequenceChange::Moved { from, to });
            UpdateOutcome::Moved { from, to }
        }
    }

    /// Index of the first element that sorts after `record`
    fn insertion_point(&self, key: Option<&SortKey>, record: &R) -> usize {
        let mut low = 0;
        let mut high = self.records.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let ordering = self
                .policy
                .compare(self.keys[mid].as_ref(), &self.records[mid], key, record);
            if ordering == Ordering::Greater {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        low
    }

    fn notify(&mut self, change: SequenceChange) {
        self.observers.notify(&change, &self.records);
    }
}

impl<R: Record> ObservableSortedSequence<R> for OrderedProjection<R> {
    fn get(&self) -> Vec<Arc<R>> {
        self.records.clone()
    }

    fn subscribe(&mut self, observer: Observer<R>) -> ObserverId {
        self.observers.add(observer)
    }

    fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }
}
