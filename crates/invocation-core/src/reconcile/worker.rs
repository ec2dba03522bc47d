//! Serialized background reconciliation
//!
//! At most one pass runs at a time and at most one request waits behind it.
//! Merges arriving while a request is already waiting are coalesced into it,
//! since the waiting pass will see their records anyway.

use std::sync::Arc;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use super::{IndexReconciler, ReconcileReport};
use crate::config::ReconcilerConfig;
use crate::source::{MergeSignal, Persistence};

/// Result of [`ReconcileHandle::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request took the free slot
    Queued,
    /// A request was already waiting; this one was folded into it
    Coalesced,
    /// The worker has stopped
    Closed,
}

/// Spawns the background reconciliation task
pub struct ReconcileWorker;

impl ReconcileWorker {
    /// Start a worker on the current tokio runtime
    ///
    /// The worker holds the store lock for the duration of each pass, so no
    /// other writer interleaves with it. After a pass with failures it waits
    /// for an exponentially growing delay before serving the next request.
    pub fn spawn<S>(
        reconciler: IndexReconciler<S>,
        store: Arc<Mutex<S>>,
        config: &ReconcilerConfig,
    ) -> ReconcileHandle
    where
        S: Persistence + Send + 'static,
    {
        let (requests, mut queue) = mpsc::channel::<MergeSignal>(1);
        let (reports, _) = broadcast::channel(16);
        let report_tx = reports.clone();

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(config.initial_backoff())
            .with_max_interval(config.max_backoff())
            .with_max_elapsed_time(None)
            .build();

        let task = tokio::spawn(async move {
            while let Some(signal) = queue.recv().await {
                let report = {
                    let mut store = store.lock().await;
                    reconciler.reconcile(&mut store, &signal)
                };

                let clean = report.is_clean();
                // No subscribers is fine
                let _ = report_tx.send(report);

                if clean {
                    backoff.reset();
                } else if let Some(delay) = backoff.next_backoff() {
                    tracing::warn!(?delay, "Reconciliation incomplete, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
            tracing::debug!("Reconcile worker stopped");
        });

        ReconcileHandle {
            requests,
            reports,
            task,
        }
    }
}

/// Handle to a running reconcile worker
pub struct ReconcileHandle {
    requests: mpsc::Sender<MergeSignal>,
    reports: broadcast::Sender<ReconcileReport>,
    task: JoinHandle<()>,
}

impl ReconcileHandle {
    /// Ask for a reconciliation pass
    pub fn request(&self, signal: MergeSignal) -> RequestOutcome {
        match self.requests.try_send(signal) {
            Ok(()) => RequestOutcome::Queued,
            Err(TrySendError::Full(signal)) => {
                tracing::debug!(origin = %signal.origin, "Reconciliation already pending, coalescing");
                RequestOutcome::Coalesced
            }
            Err(TrySendError::Closed(_)) => RequestOutcome::Closed,
        }
    }

    /// Receive a report after every completed pass
    pub fn reports(&self) -> broadcast::Receiver<ReconcileReport> {
        self.reports.subscribe()
    }

    /// Forward a store's merge signals into this worker
    ///
    /// The forwarder stops when either the merge feed closes or the worker
    /// shuts down.
    pub fn attach(&self, mut merges: broadcast::Receiver<MergeSignal>) -> JoinHandle<()> {
        let requests = self.requests.downgrade();
        tokio::spawn(async move {
            loop {
                let signal = match merges.recv().await {
                    Ok(signal) => signal,
                    // Dropped signals are covered by a single pass
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        MergeSignal::new("lagged", missed as usize)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(requests) = requests.upgrade() else {
                    break;
                };
                if let Err(TrySendError::Closed(_)) = requests.try_send(signal) {
                    break;
                }
            }
        })
    }

    /// Stop accepting requests and wait for the in-flight pass to finish
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconcile worker panicked");
        }
    }
}
