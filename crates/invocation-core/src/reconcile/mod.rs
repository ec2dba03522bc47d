//! Index reconciliation
//!
//! After a bulk merge from another replica, siblings can end up with gaps,
//! duplicates or negative indices. The [`IndexReconciler`] walks every
//! parent, orders its children by their current index and rewrites only the
//! indices that differ from their dense position. Writes generate change
//! notifications of their own, so a pass over already-dense data must write
//! nothing and must not commit.

mod worker;

pub use worker::{ReconcileHandle, ReconcileWorker, RequestOutcome};

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::model::{Checklist, Item, Project, Task};
use crate::record::Record;
use crate::source::{MergeSignal, Persistence, RecordSource, Scope};

/// Outcome of one reconciliation pass over a parent/child relationship
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub name: String,
    /// Parents whose children were examined
    pub parents: usize,
    /// Sibling index writes staged
    pub writes: usize,
    /// Fetch failures; the affected parents were skipped
    pub failures: Vec<String>,
}

impl PassReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a full reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// The merge that triggered this run
    pub trigger: Option<MergeSignal>,
    pub passes: Vec<PassReport>,
    /// Whether staged writes were committed
    pub committed: bool,
    /// Commit failure, if the commit was attempted and failed
    pub commit_error: Option<String>,
}

impl ReconcileReport {
    /// Total writes across passes
    pub fn writes(&self) -> usize {
        self.passes.iter().map(|pass| pass.writes).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.passes
            .iter()
            .flat_map(|pass| pass.failures.iter().map(String::as_str))
            .chain(self.commit_error.as_deref())
    }

    /// No fetch failed and no commit failed
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// One parent/child relationship to reconcile against a store `S`
pub trait ReconcilePass<S>: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, store: &mut S) -> PassReport;
}

/// Dense re-indexing of `C` children under each `P` parent
pub struct ChildIndexPass<P, C> {
    name: String,
    _records: PhantomData<fn() -> (P, C)>,
}

impl<P, C> ChildIndexPass<P, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _records: PhantomData,
        }
    }
}

impl<S, P, C> ReconcilePass<S> for ChildIndexPass<P, C>
where
    P: Record,
    C: Record<Id = P::Id>,
    S: RecordSource<P> + RecordSource<C>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, store: &mut S) -> PassReport {
        let mut report = PassReport::new(self.name.as_str());

        let parents = match RecordSource::<P>::fetch(&*store, &Scope::All) {
            Ok(parents) => parents,
            Err(e) => {
                tracing::warn!(pass = %self.name, error = %e, "Could not enumerate parents");
                report.failures.push(e.to_string());
                return report;
            }
        };

        for parent in parents {
            let parent_id = parent.id();
            let scope = Scope::ChildrenOf(parent_id.clone());
            let children = match RecordSource::<C>::fetch(&*store, &scope) {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(
                        pass = %self.name,
                        parent = ?parent_id,
                        error = %e,
                        "Abandoning reconciliation for parent"
                    );
                    report.failures.push(e.to_string());
                    continue;
                }
            };

            report.parents += 1;
            for (id, index) in dense_assignments(&children) {
                if RecordSource::<C>::write_sibling_index(store, &id, index) {
                    report.writes += 1;
                }
            }
        }

        tracing::debug!(
            pass = %self.name,
            parents = report.parents,
            writes = report.writes,
            "Reconciliation pass finished"
        );
        report
    }
}

/// Dense re-indexing of top-level `R` records, which are siblings of each other
pub struct RootIndexPass<R> {
    name: String,
    _records: PhantomData<fn() -> R>,
}

impl<R> RootIndexPass<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _records: PhantomData,
        }
    }
}

impl<S, R> ReconcilePass<S> for RootIndexPass<R>
where
    R: Record,
    S: RecordSource<R>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, store: &mut S) -> PassReport {
        let mut report = PassReport::new(self.name.as_str());

        let roots: Vec<R> = match store.fetch(&Scope::All) {
            Ok(records) => records
                .into_iter()
                .filter(|record| record.parent_id().is_none())
                .collect(),
            Err(e) => {
                tracing::warn!(pass = %self.name, error = %e, "Could not enumerate top-level records");
                report.failures.push(e.to_string());
                return report;
            }
        };

        report.parents = 1;
        for (id, index) in dense_assignments(&roots) {
            if store.write_sibling_index(&id, index) {
                report.writes += 1;
            }
        }

        tracing::debug!(pass = %self.name, writes = report.writes, "Reconciliation pass finished");
        report
    }
}

/// Children as `(current index, id)`, in sibling order
fn sibling_order<R: Record>(children: &[R]) -> Vec<(i64, R::Id)> {
    let mut ordered: Vec<(i64, R::Id)> = children
        .iter()
        .map(|child| (child.sibling_index(), child.id()))
        .collect();
    ordered.sort();
    ordered
}

fn changed_indices<Id>(ordered: Vec<(i64, Id)>) -> Vec<(Id, i64)> {
    ordered
        .into_iter()
        .zip(0_i64..)
        .filter(|((current, _), expected)| current != expected)
        .map(|((_, id), expected)| (id, expected))
        .collect()
}

/// Index writes needed to make `children` dense
///
/// Children are ordered by their current sibling index (identity breaks
/// ties) and assigned `0..n`. Only assignments that differ from the stored
/// index are returned.
pub fn dense_assignments<R: Record>(children: &[R]) -> Vec<(R::Id, i64)> {
    changed_indices(sibling_order(children))
}

/// Index writes that move `id` to `position` among `children`
///
/// The remaining children keep their relative order and the result is dense.
/// A position past the end moves the child last. Returns `None` when `id` is
/// not one of `children`.
pub fn move_assignments<R: Record>(
    children: &[R],
    id: &R::Id,
    position: usize,
) -> Option<Vec<(R::Id, i64)>> {
    let mut ordered = sibling_order(children);
    let from = ordered.iter().position(|(_, child)| child == id)?;
    let moved = ordered.remove(from);
    ordered.insert(position.min(ordered.len()), moved);
    Some(changed_indices(ordered))
}

/// Runs a fixed list of passes and commits only when something changed
pub struct IndexReconciler<S> {
    passes: Vec<Box<dyn ReconcilePass<S>>>,
    /// Corrections were staged but their commit failed
    pending: AtomicBool,
}

impl<S> Default for IndexReconciler<S> {
    fn default() -> Self {
        Self {
            passes: Vec::new(),
            pending: AtomicBool::new(false),
        }
    }
}

impl<S> IndexReconciler<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass; passes run in insertion order
    pub fn with_pass(mut self, pass: impl ReconcilePass<S> + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Whether an earlier run left corrections uncommitted
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl<S> IndexReconciler<S>
where
    S: RecordSource<Checklist> + RecordSource<Item> + RecordSource<Project> + RecordSource<Task>,
{
    /// Passes for every parent/child level of the checklist model
    pub fn for_checklists() -> Self {
        Self::new()
            .with_pass(RootIndexPass::<Checklist>::new("checklists"))
            .with_pass(ChildIndexPass::<Checklist, Item>::new("checklist items"))
            .with_pass(ChildIndexPass::<Checklist, Project>::new("checklist projects"))
            .with_pass(ChildIndexPass::<Project, Task>::new("project tasks"))
    }
}

impl<S: Persistence> IndexReconciler<S> {
    /// Run every pass, then commit if any index was written
    ///
    /// Failures are recorded in the report and never propagated: a failed
    /// parent is retried on the next merge. A failed commit leaves the staged
    /// corrections in place, and the next run commits them even when it has
    /// nothing new to write.
    pub fn reconcile(&self, store: &mut S, trigger: &MergeSignal) -> ReconcileReport {
        tracing::debug!(origin = %trigger.origin, records = trigger.records, "Reconciling indices");

        let mut report = ReconcileReport {
            trigger: Some(trigger.clone()),
            ..ReconcileReport::default()
        };
        for pass in &self.passes {
            report.passes.push(pass.run(store));
        }

        let retry = self.has_pending() && store.has_changes();
        if report.writes() == 0 && !retry {
            return report;
        }

        match store.commit_if_changed() {
            Ok(committed) => {
                self.pending.store(false, Ordering::Release);
                report.committed = committed;
                tracing::info!(writes = report.writes(), committed, retry, "Reconciled sibling indices");
            }
            Err(e) => {
                self.pending.store(true, Ordering::Release);
                tracing::error!(error = %e, "Failed to commit reconciled indices");
                report.commit_error = Some(e.to_string());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Child {
        id: u32,
        index: i64,
    }

    impl Record for Child {
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

    fn children(indices: &[(u32, i64)]) -> Vec<Child> {
        indices.iter().map(|&(id, index)| Child { id, index }).collect()
    }

    #[test]
    fn dense_children_need_no_writes() {
        assert!(dense_assignments(&children(&[(1, 0), (2, 1), (3, 2)])).is_empty());
    }

    #[test]
    fn gaps_and_negatives_are_compacted_in_order() {
        let writes = dense_assignments(&children(&[(1, 7), (2, -3), (3, 2)]));
        assert_eq!(writes, vec![(2, 0), (3, 1), (1, 2)]);
    }

    #[test]
    fn duplicates_are_split_by_identity() {
        let writes = dense_assignments(&children(&[(9, 0), (4, 0), (5, 1)]));
        assert_eq!(writes, vec![(9, 1), (5, 2)]);
    }

    #[test]
    fn only_changed_children_are_written() {
        let writes = dense_assignments(&children(&[(1, 0), (2, 5), (3, 6)]));
        assert_eq!(writes, vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn moving_down_shifts_the_children_in_between() {
        let writes = move_assignments(&children(&[(1, 0), (2, 1), (3, 2), (4, 3)]), &1, 2).unwrap();
        assert_eq!(writes, vec![(2, 0), (3, 1), (1, 2)]);
    }

    #[test]
    fn moving_up_past_the_end_lands_last() {
        let writes = move_assignments(&children(&[(1, 0), (2, 1), (3, 2)]), &2, 10).unwrap();
        assert_eq!(writes, vec![(3, 1), (2, 2)]);
    }

    #[test]
    fn moving_in_place_writes_nothing() {
        let writes = move_assignments(&children(&[(1, 0), (2, 1)]), &2, 1).unwrap();
        assert!(writes.is_empty());
    }

    #[test]
    fn moving_also_compacts_damaged_indices() {
        let writes = move_assignments(&children(&[(1, 4), (2, 9)]), &2, 0).unwrap();
        assert_eq!(writes, vec![(2, 0), (1, 1)]);
    }

    #[test]
    fn moving_a_stranger_is_refused() {
        assert_eq!(move_assignments(&children(&[(1, 0)]), &7, 0), None);
    }

    #[test]
    fn report_is_clean_without_failures() {
        let mut report = ReconcileReport::default();
        report.passes.push(PassReport::new("items"));
        assert!(report.is_clean());

        report.commit_error = Some("disk full".to_string());
        assert!(!report.is_clean());
        assert_eq!(report.failures().collect::<Vec<_>>(), vec!["disk full"]);
    }
}
