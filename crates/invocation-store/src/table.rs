//! Per-type record tables with change feeds

use std::collections::BTreeMap;
use std::sync::Arc;

use invocation_core::{ChangeEvent, ChangeKind, Checklist, Item, Project, Record, Scope, Task};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::MemoryStore;

const FEED_CAPACITY: usize = 256;

/// Records of one type keyed by identity
pub struct Table<R> {
    records: BTreeMap<Uuid, R>,
    events: broadcast::Sender<ChangeEvent<R>>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            records: BTreeMap::new(),
            events,
        }
    }
}

impl<R> Table<R>
where
    R: Record<Id = Uuid> + Clone + PartialEq,
{
    pub fn get(&self, id: &Uuid) -> Option<&R> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records inside `scope`, ordered by sibling index then identity
    pub fn select(&self, scope: &Scope<Uuid>) -> Vec<R> {
        let mut selected: Vec<R> = self
            .records
            .values()
            .filter(|record| scope.admits(record.parent_id().as_ref()))
            .cloned()
            .collect();
        selected.sort_by_key(|record| (record.sibling_index(), record.id()));
        selected
    }

    /// Index one past the highest sibling index in `scope`
    pub fn next_index(&self, scope: &Scope<Uuid>) -> i64 {
        self.records
            .values()
            .filter(|record| scope.admits(record.parent_id().as_ref()))
            .map(|record| record.sibling_index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Insert or replace a record
    ///
    /// Returns the kind of change emitted, or `None` when the stored record
    /// was already identical.
    pub fn upsert(&mut self, record: R) -> Option<ChangeKind> {
        let kind = match self.records.get(&record.id()) {
            Some(existing) if *existing == record => return None,
            Some(_) => ChangeKind::Update,
            None => ChangeKind::Insert,
        };
        let snapshot = Arc::new(record.clone());
        self.records.insert(record.id(), record);
        self.emit(ChangeEvent::new(kind, snapshot));
        Some(kind)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<R> {
        let removed = self.records.remove(id)?;
        self.emit(ChangeEvent::deleted(Arc::new(removed.clone())));
        Some(removed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<R>> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChangeEvent<R>) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

/// A record type held by [`MemoryStore`]
pub trait Stored: Record<Id = Uuid> + Clone + PartialEq {
    /// Human-readable record kind for errors and logs
    const KIND: &'static str;

    fn table(store: &MemoryStore) -> &Table<Self>;

    fn table_mut(store: &mut MemoryStore) -> &mut Table<Self>;
}

macro_rules! stored {
    ($record:ty, $kind:literal, $field:ident) => {
        impl Stored for $record {
            const KIND: &'static str = $kind;

            fn table(store: &MemoryStore) -> &Table<Self> {
                &store.$field
            }

            fn table_mut(store: &mut MemoryStore) -> &mut Table<Self> {
                &mut store.$field
            }
        }
    };
}

stored!(Checklist, "checklist", checklists);
stored!(Item, "item", items);
stored!(Project, "project", projects);
stored!(Task, "task", tasks);
