//! Index reconciliation against an in-memory store

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use invocation_core::{
    ChildIndexPass, FetchError, IndexReconciler, MergeSignal, PersistError, Persistence, Record,
    RecordSource, ReconcileWorker, ReconcilerConfig, RequestOutcome, RootIndexPass, Scope,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Folder {
    id: u32,
    index: i64,
}

impl Record for Folder {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn parent_id(&self) -> Option<u32> {
        None
    }

    fn sibling_index(&self) -> i64 {
        self.index
    }

    fn set_sibling_index(&mut self, index: i64) {
        self.index = index;
    }
}

#[derive(Debug, Clone)]
struct Note {
    id: u32,
    folder: u32,
    index: i64,
}

impl Record for Note {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn parent_id(&self) -> Option<u32> {
        Some(self.folder)
    }

    fn sibling_index(&self) -> i64 {
        self.index
    }

    fn set_sibling_index(&mut self, index: i64) {
        self.index = index;
    }
}

#[derive(Default)]
struct FakeStore {
    folders: Vec<Folder>,
    notes: BTreeMap<u32, Note>,
    unreadable: BTreeSet<u32>,
    reject_commits: bool,
    dirty: bool,
    commits: usize,
    writes: usize,
}

impl FakeStore {
    fn with_notes(notes: &[(u32, u32, i64)]) -> Self {
        let folder_ids: BTreeSet<u32> = notes.iter().map(|&(_, folder, _)| folder).collect();
        Self {
            folders: folder_ids
                .into_iter()
                .zip(0..)
                .map(|(id, index)| Folder { id, index })
                .collect(),
            notes: notes
                .iter()
                .map(|&(id, folder, index)| (id, Note { id, folder, index }))
                .collect(),
            ..Self::default()
        }
    }

    fn indices(&self, folder: u32) -> Vec<(u32, i64)> {
        let mut notes: Vec<_> = self
            .notes
            .values()
            .filter(|note| note.folder == folder)
            .map(|note| (note.id, note.index))
            .collect();
        notes.sort_by_key(|&(id, index)| (index, id));
        notes
    }
}

impl RecordSource<Folder> for FakeStore {
    fn fetch(&self, _scope: &Scope<u32>) -> Result<Vec<Folder>, FetchError> {
        Ok(self.folders.clone())
    }

    fn write_sibling_index(&mut self, id: &u32, index: i64) -> bool {
        match self.folders.iter_mut().find(|folder| folder.id == *id) {
            Some(folder) => {
                folder.index = index;
                self.dirty = true;
                true
            }
            None => false,
        }
    }
}

impl RecordSource<Note> for FakeStore {
    fn fetch(&self, scope: &Scope<u32>) -> Result<Vec<Note>, FetchError> {
        if let Scope::ChildrenOf(folder) = scope {
            if self.unreadable.contains(folder) {
                return Err(FetchError::new(scope, "corrupt folder"));
            }
        }
        let mut notes: Vec<Note> = self
            .notes
            .values()
            .filter(|note| scope.admits(note.parent_id().as_ref()))
            .cloned()
            .collect();
        notes.sort_by_key(|note| note.index);
        Ok(notes)
    }

    fn write_sibling_index(&mut self, id: &u32, index: i64) -> bool {
        match self.notes.get_mut(id) {
            Some(note) => {
                note.index = index;
                self.dirty = true;
                self.writes += 1;
                true
            }
            None => false,
        }
    }
}

impl Persistence for FakeStore {
    fn has_changes(&self) -> bool {
        self.dirty
    }

    fn commit_if_changed(&mut self) -> Result<bool, PersistError> {
        if !self.dirty {
            return Ok(false);
        }
        if self.reject_commits {
            return Err(PersistError::Rejected {
                reason: "read-only replica".to_string(),
            });
        }
        self.dirty = false;
        self.commits += 1;
        Ok(true)
    }
}

fn reconciler() -> IndexReconciler<FakeStore> {
    IndexReconciler::new().with_pass(ChildIndexPass::<Folder, Note>::new("folder notes"))
}

#[test]
fn test_dense_store_is_left_alone() {
    let mut store = FakeStore::with_notes(&[(1, 10, 0), (2, 10, 1), (3, 20, 0)]);

    let report = reconciler().reconcile(&mut store, &MergeSignal::new("laptop", 3));

    assert_eq!(report.writes(), 0);
    assert!(!report.committed);
    assert!(report.is_clean());
    assert_eq!(store.commits, 0);
}

#[test]
fn test_merge_damage_is_repaired_and_committed_once() {
    let mut store = FakeStore::with_notes(&[(1, 10, 4), (2, 10, 4), (3, 10, -1), (4, 20, 7)]);

    let report = reconciler().reconcile(&mut store, &MergeSignal::new("phone", 4));

    assert_eq!(store.indices(10), vec![(3, 0), (1, 1), (2, 2)]);
    assert_eq!(store.indices(20), vec![(4, 0)]);
    assert_eq!(report.writes(), 4);
    assert!(report.committed);
    assert_eq!(store.commits, 1);
    assert_eq!(report.passes[0].parents, 2);
}

#[test]
fn test_second_pass_is_a_no_op() {
    let mut store = FakeStore::with_notes(&[(1, 10, 9), (2, 10, 3), (3, 20, 5)]);
    let reconciler = reconciler();

    reconciler.reconcile(&mut store, &MergeSignal::manual());
    let writes_after_first = store.writes;
    let second = reconciler.reconcile(&mut store, &MergeSignal::manual());

    assert_eq!(second.writes(), 0);
    assert!(!second.committed);
    assert_eq!(store.writes, writes_after_first);
    assert_eq!(store.commits, 1);
}

#[test]
fn test_fetch_failure_abandons_only_that_parent() {
    let mut store = FakeStore::with_notes(&[(1, 10, 5), (2, 20, 5), (3, 30, 5)]);
    store.unreadable.insert(20);

    let report = reconciler().reconcile(&mut store, &MergeSignal::manual());

    assert_eq!(store.indices(10), vec![(1, 0)]);
    assert_eq!(store.indices(20), vec![(2, 5)]);
    assert_eq!(store.indices(30), vec![(3, 0)]);
    assert_eq!(report.failures().count(), 1);
    assert!(report.committed);
}

#[test]
fn test_commit_failure_is_reported_not_raised() {
    let mut store = FakeStore::with_notes(&[(1, 10, 3)]);
    store.reject_commits = true;

    let report = reconciler().reconcile(&mut store, &MergeSignal::manual());

    assert!(!report.committed);
    assert!(report.commit_error.as_deref().unwrap().contains("read-only replica"));
    // The correction stays staged for a later commit
    assert!(store.has_changes());
    assert_eq!(store.indices(10), vec![(1, 0)]);
}

#[test]
fn test_corrections_from_failed_commit_are_committed_next_time() {
    let mut store = FakeStore::with_notes(&[(1, 10, 3)]);
    store.reject_commits = true;
    let reconciler = reconciler();

    let first = reconciler.reconcile(&mut store, &MergeSignal::manual());
    assert!(first.commit_error.is_some());
    assert!(reconciler.has_pending());

    store.reject_commits = false;
    let second = reconciler.reconcile(&mut store, &MergeSignal::manual());

    assert_eq!(second.writes(), 0);
    assert!(second.committed);
    assert!(second.is_clean());
    assert_eq!(store.commits, 1);
    assert!(!store.has_changes());
    assert!(!reconciler.has_pending());
}

#[test]
fn test_unrelated_changes_are_not_committed_by_a_dense_pass() {
    let mut store = FakeStore::with_notes(&[(1, 10, 0)]);
    store.dirty = true;

    let report = reconciler().reconcile(&mut store, &MergeSignal::manual());

    assert!(!report.committed);
    assert_eq!(store.commits, 0);
    assert!(store.has_changes());
}

#[test]
fn test_root_pass_compacts_top_level_records() {
    let mut store = FakeStore::with_notes(&[(1, 10, 0), (2, 20, 0), (3, 30, 0)]);
    store.folders = vec![
        Folder { id: 10, index: 0 },
        Folder { id: 20, index: 0 },
        Folder { id: 30, index: 5 },
    ];
    let reconciler = IndexReconciler::new()
        .with_pass(RootIndexPass::<Folder>::new("folders"))
        .with_pass(ChildIndexPass::<Folder, Note>::new("folder notes"));

    let report = reconciler.reconcile(&mut store, &MergeSignal::manual());

    let indices: Vec<(u32, i64)> = store.folders.iter().map(|folder| (folder.id, folder.index)).collect();
    assert_eq!(indices, vec![(10, 0), (20, 1), (30, 2)]);
    assert_eq!(report.passes[0].writes, 2);
    assert_eq!(report.passes[1].writes, 0);
    assert!(report.committed);
}

#[test]
fn test_checklist_reconciler_covers_every_level() {
    struct Nothing;

    impl<R: Record> RecordSource<R> for Nothing {
        fn fetch(&self, _scope: &Scope<R::Id>) -> Result<Vec<R>, FetchError> {
            Ok(Vec::new())
        }

        fn write_sibling_index(&mut self, _id: &R::Id, _index: i64) -> bool {
            false
        }
    }

    let reconciler = IndexReconciler::<Nothing>::for_checklists();
    assert_eq!(
        reconciler.pass_names(),
        vec!["checklists", "checklist items", "checklist projects", "project tasks"]
    );
}

proptest! {
    #[test]
    fn reconciled_siblings_are_dense_and_keep_their_order(
        notes in proptest::collection::btree_map(0u32..40, (0u32..4, -10i64..10), 0..30)
    ) {
        let rows: Vec<(u32, u32, i64)> =
            notes.iter().map(|(&id, &(folder, index))| (id, folder, index)).collect();
        let mut store = FakeStore::with_notes(&rows);
        let before: Vec<Vec<u32>> = (0..4)
            .map(|folder| store.indices(folder).into_iter().map(|(id, _)| id).collect())
            .collect();

        let reconciler = reconciler();
        reconciler.reconcile(&mut store, &MergeSignal::manual());

        for folder in 0..4u32 {
            let after = store.indices(folder);
            let ids: Vec<u32> = after.iter().map(|&(id, _)| id).collect();
            let indices: Vec<i64> = after.iter().map(|&(_, index)| index).collect();
            let dense: Vec<i64> = (0..after.len() as i64).collect();
            prop_assert_eq!(&ids, &before[folder as usize]);
            prop_assert_eq!(indices, dense);
        }

        let writes = store.writes;
        let again = reconciler.reconcile(&mut store, &MergeSignal::manual());
        prop_assert_eq!(again.writes(), 0);
        prop_assert_eq!(store.writes, writes);
    }
}

#[tokio::test]
async fn test_worker_coalesces_requests_behind_a_waiting_pass() {
    let store = Arc::new(Mutex::new(FakeStore::with_notes(&[(1, 10, 2)])));
    let handle = ReconcileWorker::spawn(reconciler(), Arc::clone(&store), &ReconcilerConfig::default());
    let mut reports = handle.reports();

    // The worker cannot run until this task yields
    assert_eq!(handle.request(MergeSignal::new("a", 1)), RequestOutcome::Queued);
    assert_eq!(handle.request(MergeSignal::new("b", 1)), RequestOutcome::Coalesced);

    let report = reports.recv().await.unwrap();
    assert_eq!(report.trigger, Some(MergeSignal::new("a", 1)));
    assert_eq!(report.writes(), 1);

    assert_eq!(handle.request(MergeSignal::new("c", 1)), RequestOutcome::Queued);
    let report = reports.recv().await.unwrap();
    assert_eq!(report.writes(), 0);

    handle.shutdown().await;
    assert_eq!(store.lock().await.commits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_keeps_serving_after_failed_commit() {
    let mut failing = FakeStore::with_notes(&[(1, 10, 2)]);
    failing.reject_commits = true;
    let store = Arc::new(Mutex::new(failing));
    let handle = ReconcileWorker::spawn(reconciler(), Arc::clone(&store), &ReconcilerConfig::default());
    let mut reports = handle.reports();

    handle.request(MergeSignal::manual());
    let first = reports.recv().await.unwrap();
    assert!(!first.is_clean());

    store.lock().await.reject_commits = false;
    store.lock().await.notes.get_mut(&1).unwrap().index = 6;
    handle.request(MergeSignal::manual());
    let second = reports.recv().await.unwrap();
    assert!(second.committed);

    handle.shutdown().await;
    assert!(!store.lock().await.has_changes());
}

#[tokio::test(start_paused = true)]
async fn test_worker_commits_staged_corrections_once_commits_succeed() {
    let mut failing = FakeStore::with_notes(&[(1, 10, 2)]);
    failing.reject_commits = true;
    let store = Arc::new(Mutex::new(failing));
    let handle = ReconcileWorker::spawn(reconciler(), Arc::clone(&store), &ReconcilerConfig::default());
    let mut reports = handle.reports();

    handle.request(MergeSignal::manual());
    let first = reports.recv().await.unwrap();
    assert_eq!(first.writes(), 1);
    assert!(!first.is_clean());

    // Nothing new to repair; only the earlier correction is outstanding
    store.lock().await.reject_commits = false;
    handle.request(MergeSignal::manual());
    let second = reports.recv().await.unwrap();
    assert_eq!(second.writes(), 0);
    assert!(second.committed);

    handle.shutdown().await;
    let store = store.lock().await;
    assert_eq!(store.commits, 1);
    assert_eq!(store.indices(10), vec![(1, 0)]);
    assert!(!store.has_changes());
}

#[tokio::test]
async fn test_attached_merge_feed_drives_the_worker() {
    let store = Arc::new(Mutex::new(FakeStore::with_notes(&[(1, 10, 3), (2, 10, 8)])));
    let handle = ReconcileWorker::spawn(reconciler(), Arc::clone(&store), &ReconcilerConfig::default());
    let mut reports = handle.reports();

    let (merges, merge_rx) = tokio::sync::broadcast::channel(4);
    let forwarder = handle.attach(merge_rx);
    merges.send(MergeSignal::new("tablet", 2)).unwrap();

    let report = reports.recv().await.unwrap();
    assert_eq!(report.trigger.unwrap().origin, "tablet");
    assert_eq!(store.lock().await.indices(10), vec![(1, 0), (2, 1)]);

    drop(merges);
    forwarder.await.unwrap();
    handle.shutdown().await;
}

#[tokio::test]
async fn test_report_feed_closes_on_shutdown() {
    let store = Arc::new(Mutex::new(FakeStore::default()));
    let handle = ReconcileWorker::spawn(reconciler(), store, &ReconcilerConfig::default());
    let mut reports = handle.reports();

    handle.shutdown().await;

    assert!(reports.recv().await.is_err());
}
