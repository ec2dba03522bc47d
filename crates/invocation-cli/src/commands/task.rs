//! Task commands

use chrono::Local;
use colored::Colorize;
use invocation_core::Project;

use crate::context::{Context, parse_id};
use crate::error::Result;

pub fn run_task_toggle(ctx: &Context, id: &str) -> Result<()> {
    let id = parse_id("task", id)?;
    let mut store = ctx.open_store()?;
    let task = store.toggle_task(&id, ctx.now())?;
    ctx.commit(&mut store)?;

    if task.is_complete() {
        println!("{} {}", "Completed".green().bold(), task.name);
    } else {
        println!("{} {}", "Reopened".yellow().bold(), task.name);
    }
    if let Some(project) = store.get::<Project>(&task.project) {
        match &project.due {
            Some(due) => println!("Project now due {}", ctx.format(due).yellow()),
            None => println!("Project has no open due dates"),
        }
    }
    Ok(())
}

pub fn run_task_reset_due(ctx: &Context, id: &str) -> Result<()> {
    let id = parse_id("task", id)?;
    let mut store = ctx.open_store()?;
    let task = store.reset_task_due(&id, &Local)?;
    ctx.commit(&mut store)?;

    match &task.due {
        Some(due) => println!("{} {} due {}", "Reset".green().bold(), task.name, ctx.format(due)),
        None => println!("{} {} has no recurrence", "Cleared".yellow().bold(), task.name),
    }
    Ok(())
}
