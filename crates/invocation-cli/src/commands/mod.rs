//! Command implementations for invocation-cli

pub mod checklist;
pub mod due;
pub mod invoke;
pub mod projects;
pub mod reconcile;
pub mod reorder;
pub mod task;

pub use checklist::{run_checklist_add, run_checklist_delete, run_checklist_list, run_item_add, run_item_delete};
pub use due::run_due;
pub use invoke::run_invoke;
pub use projects::{ProjectListing, run_projects, run_tasks};
pub use reconcile::{run_merge, run_reconcile};
pub use reorder::run_move;
pub use task::{run_task_reset_due, run_task_toggle};

use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use invocation_core::{DueTime, Recurrence};

use crate::cli::RecurrenceArgs;
use crate::error::{CliError, Result};

/// Build a recurrence from command-line flags
///
/// Returns `None` when no recurrence flag was given. Without `--at` or
/// `--after` the task is due at the invocation time of day.
pub fn recurrence_from_args(args: &RecurrenceArgs) -> Result<Option<Recurrence>> {
    if args.is_empty() {
        return Ok(None);
    }

    let weekday = args
        .weekday
        .as_deref()
        .map(|raw| {
            raw.parse::<Weekday>()
                .map_err(|_| CliError::user(format!("Unknown weekday: {}", raw)))
        })
        .transpose()?;

    let time = match (&args.at, args.after) {
        (Some(at), _) => {
            let time = NaiveTime::parse_from_str(at, "%H:%M")
                .map_err(|_| CliError::user(format!("Expected HH:MM, got {}", at)))?;
            DueTime::Fixed(time)
        }
        (None, Some(minutes)) => DueTime::AfterInvocation(Duration::from_secs(minutes.saturating_mul(60))),
        (None, None) => DueTime::AfterInvocation(Duration::ZERO),
    };

    Ok(Some(Recurrence::new(args.offset.unwrap_or(0), weekday, time)?))
}
