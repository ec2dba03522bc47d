//! The in-process record store
//!
//! [`MemoryStore`] keeps every record in memory, publishes a change feed per
//! record type and persists to a JSON snapshot on commit. It implements the
//! collaborator traits the projection, listener and reconciler are written
//! against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use invocation_core::{
    ChangeEvent, ChangeFeed, ChangeKind, Checklist, FetchError, Invocation, Item, MergeFeed,
    MergeSignal, PersistError, Persistence, Preferences, Project, RecordSource, Scope, Task,
    move_assignments,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::snapshot::StoreSnapshot;
use crate::table::{Stored, Table};
use crate::{Error, Result};

const MERGE_CAPACITY: usize = 16;

/// Records of every type plus their change feeds
pub struct MemoryStore {
    pub(crate) checklists: Table<Checklist>,
    pub(crate) items: Table<Item>,
    pub(crate) projects: Table<Project>,
    pub(crate) tasks: Table<Task>,
    merges: broadcast::Sender<MergeSignal>,
    path: Option<PathBuf>,
    replica: String,
    dirty: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (merges, _) = broadcast::channel(MERGE_CAPACITY);
        Self {
            checklists: Table::default(),
            items: Table::default(),
            projects: Table::default(),
            tasks: Table::default(),
            merges,
            path: None,
            replica: "local".to_string(),
            dirty: false,
        }
    }
}

impl MemoryStore {
    /// An empty store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file
    ///
    /// A missing file yields an empty store; it is created on first commit.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if path.exists() {
            let snapshot = StoreSnapshot::load(path)?;
            tracing::debug!(path = %path.display(), records = snapshot.len(), "Opened store");
            store.restore(snapshot);
        }
        Ok(store)
    }

    /// Name this replica; used as the origin of merges it produces
    pub fn with_replica(mut self, replica: impl Into<String>) -> Self {
        self.replica = replica.into();
        self
    }

    pub fn replica(&self) -> &str {
        &self.replica
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<R: Stored>(&self, id: &Uuid) -> Option<&R> {
        R::table(self).get(id)
    }

    /// Every record of a type, ordered by sibling index
    pub fn all<R: Stored>(&self) -> Vec<R> {
        R::table(self).select(&Scope::All)
    }

    pub fn children<R: Stored>(&self, parent: Uuid) -> Vec<R> {
        R::table(self).select(&Scope::ChildrenOf(parent))
    }

    /// Insert or replace a record, emitting the matching change event
    pub fn put<R: Stored>(&mut self, record: R) -> Option<ChangeKind> {
        let change = R::table_mut(self).upsert(record);
        if change.is_some() {
            self.dirty = true;
        }
        change
    }

    fn take<R: Stored>(&mut self, id: &Uuid) -> Result<R> {
        let removed = R::table_mut(self)
            .remove(id)
            .ok_or_else(|| Error::unknown(R::KIND, *id))?;
        self.dirty = true;
        Ok(removed)
    }

    fn require<R: Stored>(&self, id: &Uuid) -> Result<R> {
        self.get::<R>(id)
            .cloned()
            .ok_or_else(|| Error::unknown(R::KIND, *id))
    }

    pub fn add_checklist(&mut self, title: impl Into<String>, created: DateTime<Utc>) -> Checklist {
        let index = self.checklists.next_index(&Scope::All);
        let checklist = Checklist::new(title, index, created);
        self.put(checklist.clone());
        checklist
    }

    /// Append an item to a checklist
    pub fn add_item(&mut self, mut item: Item) -> Result<Item> {
        self.require::<Checklist>(&item.checklist)?;
        item.index = self.items.next_index(&Scope::ChildrenOf(item.checklist));
        self.put(item.clone());
        Ok(item)
    }

    pub fn update_item(&mut self, item: Item) -> Result<()> {
        self.require::<Item>(&item.id)?;
        self.put(item);
        Ok(())
    }

    /// Invoke a checklist, storing the new project and its tasks
    pub fn invoke<Tz: TimeZone>(
        &mut self,
        checklist: Uuid,
        invoked: DateTime<Utc>,
        calendar: &Tz,
        preferences: &Preferences,
    ) -> Result<Invocation> {
        let checklist = self.require::<Checklist>(&checklist)?;
        let items = self.children::<Item>(checklist.id);
        let index = self.projects.next_index(&Scope::ChildrenOf(checklist.id));

        let invocation =
            invocation_core::invoke(&checklist, &items, invoked, calendar, preferences, index);
        self.put(invocation.project.clone());
        for task in &invocation.tasks {
            self.put(task.clone());
        }
        Ok(invocation)
    }

    /// Toggle a task's completion and keep its project's due date current
    pub fn toggle_task(&mut self, id: &Uuid, now: DateTime<Utc>) -> Result<Task> {
        let mut task = self.require::<Task>(id)?;
        task.toggle(now);
        self.put(task.clone());
        self.refresh_project_due(&task.project);
        Ok(task)
    }

    /// Set a task's due date by hand
    pub fn set_task_due(&mut self, id: &Uuid, due: Option<DateTime<Utc>>) -> Result<Task> {
        let mut task = self.require::<Task>(id)?;
        task.due = due;
        self.put(task.clone());
        self.refresh_project_due(&task.project);
        Ok(task)
    }

    /// Recompute a task's due date from its recurrence
    pub fn reset_task_due<Tz: TimeZone>(&mut self, id: &Uuid, calendar: &Tz) -> Result<Task> {
        let mut task = self.require::<Task>(id)?;
        let project = self.require::<Project>(&task.project)?;
        task.reset_due_date(project.invoked, calendar);
        self.put(task.clone());
        self.refresh_project_due(&task.project);
        Ok(task)
    }

    /// Recompute a project's due date from its tasks
    ///
    /// Emits an update for the project only when the value changed.
    fn refresh_project_due(&mut self, project: &Uuid) -> bool {
        let Some(mut record) = self.get::<Project>(project).cloned() else {
            return false;
        };
        let tasks = self.children::<Task>(*project);
        if !record.refresh_due(&tasks) {
            return false;
        }
        tracing::debug!(project = %project, due = ?record.due, "Project due date changed");
        self.put(record);
        true
    }

    /// Move a record to `position` among its siblings
    ///
    /// Siblings between the old and new position shift by one; only records
    /// whose index actually changed are written. Returns the number written.
    pub fn reorder<R: Stored>(&mut self, id: &Uuid, position: usize) -> Result<usize> {
        let record = self.require::<R>(id)?;
        let siblings = match record.parent_id() {
            Some(parent) => self.children::<R>(parent),
            None => self.all::<R>(),
        };
        let assignments =
            move_assignments(&siblings, id, position).ok_or_else(|| Error::unknown(R::KIND, *id))?;

        let mut written = 0;
        for (sibling, index) in assignments {
            if RecordSource::<R>::write_sibling_index(self, &sibling, index) {
                written += 1;
            }
        }
        tracing::debug!(kind = R::KIND, id = %id, position, written, "Reordered");
        Ok(written)
    }

    /// Delete a checklist with its items, projects and tasks
    ///
    /// Returns the number of records removed.
    pub fn delete_checklist(&mut self, id: &Uuid) -> Result<usize> {
        let checklist = self.require::<Checklist>(id)?;
        let mut removed = 0;
        for item in self.children::<Item>(checklist.id) {
            self.take::<Item>(&item.id)?;
            removed += 1;
        }
        for project in self.children::<Project>(checklist.id) {
            removed += self.delete_project(&project.id)?;
        }
        self.take::<Checklist>(id)?;
        tracing::info!(checklist = %id, removed = removed + 1, "Deleted checklist");
        Ok(removed + 1)
    }

    /// Delete a project with its tasks
    pub fn delete_project(&mut self, id: &Uuid) -> Result<usize> {
        let project = self.require::<Project>(id)?;
        let mut removed = 0;
        for task in self.children::<Task>(project.id) {
            self.take::<Task>(&task.id)?;
            removed += 1;
        }
        self.take::<Project>(id)?;
        Ok(removed + 1)
    }

    /// Delete an item; tasks already created from it are kept
    pub fn delete_item(&mut self, id: &Uuid) -> Result<Item> {
        self.take::<Item>(id)
    }

    pub fn delete_task(&mut self, id: &Uuid) -> Result<Task> {
        let task = self.take::<Task>(id)?;
        self.refresh_project_due(&task.project);
        Ok(task)
    }

    /// Every record currently held
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            checklists: self.all(),
            items: self.all(),
            projects: self.all(),
            tasks: self.all(),
            ..StoreSnapshot::default()
        }
    }

    /// Apply another replica's records, remote side winning
    ///
    /// Each record that differs from the local copy is written and emits its
    /// change event. Projects whose tasks were touched get their due date
    /// recomputed. One [`MergeSignal`] is published at the end, after every
    /// record event.
    pub fn merge_remote(&mut self, origin: &str, remote: StoreSnapshot) -> MergeSignal {
        let mut applied = 0;
        let mut touched_projects = Vec::new();

        for checklist in remote.checklists {
            applied += usize::from(self.put(checklist).is_some());
        }
        for item in remote.items {
            applied += usize::from(self.put(item).is_some());
        }
        for project in remote.projects {
            applied += usize::from(self.put(project).is_some());
        }
        for task in remote.tasks {
            let project = task.project;
            if self.put(task).is_some() {
                applied += 1;
                touched_projects.push(project);
            }
        }

        touched_projects.sort();
        touched_projects.dedup();
        for project in &touched_projects {
            self.refresh_project_due(project);
        }

        let signal = MergeSignal::new(origin, applied);
        tracing::info!(origin, records = applied, "Merged remote records");
        // Nobody listening is fine
        let _ = self.merges.send(signal.clone());
        signal
    }

    fn restore(&mut self, snapshot: StoreSnapshot) {
        for checklist in snapshot.checklists {
            self.put(checklist);
        }
        for item in snapshot.items {
            self.put(item);
        }
        for project in snapshot.projects {
            self.put(project);
        }
        for task in snapshot.tasks {
            self.put(task);
        }
        self.dirty = false;
    }
}

impl<R: Stored> RecordSource<R> for MemoryStore {
    fn fetch(&self, scope: &Scope<Uuid>) -> std::result::Result<Vec<R>, FetchError> {
        if let Scope::ChildrenOf(parent) = scope {
            if !self.parent_exists(parent) {
                return Err(FetchError::new(scope, format!("unknown parent for {}", R::KIND)));
            }
        }
        Ok(R::table(self).select(scope))
    }

    fn write_sibling_index(&mut self, id: &Uuid, index: i64) -> bool {
        let Some(mut record) = self.get::<R>(id).cloned() else {
            return false;
        };
        record.set_sibling_index(index);
        self.put(record);
        true
    }
}

impl MemoryStore {
    fn parent_exists(&self, id: &Uuid) -> bool {
        self.checklists.get(id).is_some() || self.projects.get(id).is_some()
    }
}

impl Persistence for MemoryStore {
    fn has_changes(&self) -> bool {
        self.dirty
    }

    fn commit_if_changed(&mut self) -> std::result::Result<bool, PersistError> {
        if !self.dirty {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            self.snapshot().save(path)?;
        }
        self.dirty = false;
        Ok(true)
    }
}

impl<R: Stored> ChangeFeed<R> for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<R>> {
        R::table(self).subscribe()
    }
}

impl MergeFeed for MemoryStore {
    fn subscribe_merges(&self) -> broadcast::Receiver<MergeSignal> {
        self.merges.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()
    }

    #[test]
    fn new_items_append_after_existing_siblings() {
        let mut store = MemoryStore::in_memory();
        let checklist = store.add_checklist("Packing", now());

        let first = store.add_item(Item::new(checklist.id, "Passport", 0)).unwrap();
        let second = store.add_item(Item::new(checklist.id, "Charger", 0)).unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
    }

    #[test]
    fn item_for_missing_checklist_is_rejected() {
        let mut store = MemoryStore::in_memory();
        let orphan = Item::new(Uuid::new_v4(), "Nowhere", 0);

        let result = store.add_item(orphan);

        assert!(matches!(result, Err(Error::UnknownRecord { kind: "checklist", .. })));
    }

    #[test]
    fn identical_put_emits_nothing_and_stays_clean() {
        let mut store = MemoryStore::in_memory();
        let checklist = store.add_checklist("Chores", now());
        store.commit_if_changed().unwrap();

        assert_eq!(store.put(checklist), None);
        assert!(!store.has_changes());
    }

    #[test]
    fn reorder_writes_only_shifted_siblings() {
        let mut store = MemoryStore::in_memory();
        let checklist = store.add_checklist("Morning", now());
        let items: Vec<Item> = ["Stretch", "Coffee", "Email", "Plan"]
            .into_iter()
            .map(|name| store.add_item(Item::new(checklist.id, name, 0)).unwrap())
            .collect();
        let mut feed = ChangeFeed::<Item>::subscribe(&store);

        let written = store.reorder::<Item>(&items[2].id, 0).unwrap();

        let names: Vec<String> = store.children::<Item>(checklist.id).into_iter().map(|item| item.name).collect();
        assert_eq!(names, vec!["Email", "Stretch", "Coffee", "Plan"]);
        assert_eq!(written, 3);
        let mut events = 0;
        while feed.try_recv().is_ok() {
            events += 1;
        }
        assert_eq!(events, 3);
    }

    #[test]
    fn reorder_of_unknown_record_fails() {
        let mut store = MemoryStore::in_memory();

        let result = store.reorder::<Task>(&Uuid::new_v4(), 0);

        assert!(matches!(result, Err(Error::UnknownRecord { kind: "task", .. })));
    }

    #[test]
    fn fetch_of_unknown_parent_fails() {
        let store = MemoryStore::in_memory();

        let result = RecordSource::<Item>::fetch(&store, &Scope::ChildrenOf(Uuid::new_v4()));

        assert!(result.is_err());
    }
}
