//! Read-only observation of an ordered projection

use std::sync::Arc;

use crate::record::Record;

/// A change applied to a sorted sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceChange {
    /// The whole sequence was rebuilt (initial sort or policy change)
    Reset,
    Inserted { index: usize },
    Removed { index: usize },
    /// A record's sort position changed after an update
    Moved { from: usize, to: usize },
}

/// Callback invoked with each change and the sequence after it was applied
pub type Observer<R> = Box<dyn FnMut(&SequenceChange, &[Arc<R>]) + Send>;

/// Handle returned by [`ObservableSortedSequence::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// The output side of an ordered projection, as seen by consumers
///
/// Consumers read snapshots and receive change callbacks; they never mutate
/// the sequence themselves.
pub trait ObservableSortedSequence<R: Record> {
    /// Snapshot of the current order
    fn get(&self) -> Vec<Arc<R>>;

    fn subscribe(&mut self, observer: Observer<R>) -> ObserverId;

    /// Returns `false` if the observer was already gone
    fn unsubscribe(&mut self, id: ObserverId) -> bool;
}

pub(crate) struct Observers<R> {
    next: u64,
    entries: Vec<(ObserverId, Observer<R>)>,
}

impl<R> Default for Observers<R> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }
}

impl<R> Observers<R> {
    pub(crate) fn add(&mut self, observer: Observer<R>) -> ObserverId {
        let id = ObserverId(self.next);
        self.next += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&mut self, change: &SequenceChange, sequence: &[Arc<R>]) {
        for (_, observer) in &mut self.entries {
            observer(change, sequence);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
