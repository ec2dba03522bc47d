//! Due date calculator

use chrono::{DateTime, Local};
use invocation_core::next_due_date;

use super::recurrence_from_args;
use crate::cli::RecurrenceArgs;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Print the next due instant for a recurrence
///
/// With `--from` the computation runs in the offset of the given instant, so
/// the output does not depend on the machine's zone.
pub fn run_due(ctx: &Context, args: &RecurrenceArgs, from: Option<&str>) -> Result<()> {
    let recurrence = recurrence_from_args(args)?
        .ok_or_else(|| CliError::user("Give at least one of --offset, --weekday, --at, --after"))?;

    let due = match from {
        Some(raw) => {
            let invocation = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| CliError::user(format!("Invalid --from instant {}: {}", raw, e)))?;
            next_due_date(&recurrence, &invocation).to_rfc3339()
        }
        None => next_due_date(&recurrence, &ctx.now().with_timezone(&Local)).to_rfc3339(),
    };

    println!("{}", due);
    Ok(())
}
