//! Reconcile and merge commands

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use invocation_core::{
    IndexReconciler, MergeFeed, MergeSignal, ReconcileReport, ReconcileWorker,
};
use invocation_store::StoreSnapshot;
use tokio::sync::Mutex;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run one reconciliation pass over the whole store
pub fn run_reconcile(ctx: &Context, json: bool) -> Result<()> {
    let mut store = ctx.open_store()?;
    let report = IndexReconciler::for_checklists().reconcile(&mut store, &MergeSignal::manual());
    print_report(&report, json)?;

    if let Some(error) = &report.commit_error {
        return Err(CliError::user(format!("Commit failed: {}", error)));
    }
    Ok(())
}

/// Merge a snapshot from another replica
///
/// The merge is applied to the local store and its merge signal is handed to
/// a background reconcile worker, the same path a live sync would take.
pub fn run_merge(ctx: &Context, snapshot: &Path, origin: &str, json: bool) -> Result<()> {
    let remote = StoreSnapshot::load(snapshot)?;
    let store = ctx.open_store()?;
    let merges = store.subscribe_merges();
    let store = Arc::new(Mutex::new(store));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let report = runtime.block_on(async {
        let handle = ReconcileWorker::spawn(
            IndexReconciler::for_checklists(),
            Arc::clone(&store),
            &ctx.preferences.reconciler,
        );
        let mut reports = handle.reports();
        let forwarder = handle.attach(merges);

        let signal = store.lock().await.merge_remote(origin, remote);
        tracing::debug!(origin, records = signal.records, "Waiting for reconciliation");
        let report = reports.recv().await;

        handle.shutdown().await;
        forwarder.abort();

        // Merged records need committing even when no index was rewritten
        ctx.commit(&mut *store.lock().await)?;
        report.map_err(|_| CliError::user("Reconcile worker stopped before reporting"))
    })?;

    if !json {
        let merged = report.trigger.as_ref().map(|signal| signal.records).unwrap_or(0);
        println!("{} {} records from {}", "Merged".green().bold(), merged, origin.cyan());
    }
    print_report(&report, json)
}

fn print_report(report: &ReconcileReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.writes() == 0 && report.is_clean() {
        println!("{}", "Indices already dense".dimmed());
        return Ok(());
    }
    for pass in &report.passes {
        if pass.writes > 0 {
            println!("  {} {}: {} writes", "+".green(), pass.name, pass.writes);
        }
    }
    for failure in report.failures() {
        println!("  {} {}", "!".red(), failure);
    }
    if report.committed {
        println!("{} {} index writes", "Reconciled".green().bold(), report.writes());
    }
    Ok(())
}
