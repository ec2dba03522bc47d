//! Invoke command implementation

use chrono::Local;
use colored::Colorize;
use invocation_core::{Checklist, Project, Task};
use serde::Serialize;

use crate::context::{Context, parse_id};
use crate::error::Result;

#[derive(Serialize)]
struct InvocationOutput<'a> {
    project: &'a Project,
    tasks: &'a [Task],
}

/// Create a project from a checklist, evaluating recurrences in the local zone
pub fn run_invoke(ctx: &Context, checklist: &str, json: bool) -> Result<()> {
    let checklist = parse_id("checklist", checklist)?;
    let mut store = ctx.open_store()?;
    let invocation = store.invoke(checklist, ctx.now(), &Local, &ctx.preferences)?;
    ctx.commit(&mut store)?;

    if json {
        let output = InvocationOutput {
            project: &invocation.project,
            tasks: &invocation.tasks,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let title = invocation
        .project
        .display_title(store.get::<Checklist>(&checklist));
    println!(
        "{} {} ({})",
        "Invoked".green().bold(),
        title.bold(),
        invocation.project.id
    );
    for task in &invocation.tasks {
        match &task.due {
            Some(due) => println!("  {} {}  {}", "-".cyan(), task.name, ctx.format(due).yellow()),
            None => println!("  {} {}", "-".cyan(), task.name),
        }
    }
    Ok(())
}
