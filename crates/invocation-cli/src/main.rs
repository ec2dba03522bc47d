//! Invocation CLI
//!
//! Author checklists, invoke them into projects and keep the record store
//! consistent across replicas.

mod cli;
mod commands;
mod context;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;
use invocation_core::{Checklist, Item, Task};

use cli::{ChecklistAction, Cli, Commands, ItemAction, TaskAction};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: logging unavailable: {}", "warning".yellow(), e);
    }
    tracing::debug!(store = %cli.store.display(), "Starting");

    let Some(command) = cli.command else {
        println!("{} Checklists you can invoke", "invocation".green().bold());
        println!();
        println!("Run {} for available commands.", "invocation --help".cyan());
        return Ok(());
    };

    let ctx = Context::load(cli.store, cli.config.as_deref(), cli.now.as_deref())?;
    execute_command(&ctx, command)
}

fn execute_command(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Checklist { action } => match action {
            ChecklistAction::Add { title, json } => commands::run_checklist_add(ctx, &title, json),
            ChecklistAction::List { json } => commands::run_checklist_list(ctx, json),
            ChecklistAction::Delete { id } => commands::run_checklist_delete(ctx, &id),
            ChecklistAction::Move { id, position } => commands::run_move::<Checklist>(ctx, &id, position),
        },
        Commands::Item { action } => match action {
            ItemAction::Add {
                checklist,
                name,
                notes,
                link,
                recurrence,
                json,
            } => commands::run_item_add(
                ctx,
                &checklist,
                &name,
                notes.as_deref(),
                link.as_deref(),
                &recurrence,
                json,
            ),
            ItemAction::Delete { id } => commands::run_item_delete(ctx, &id),
            ItemAction::Move { id, position } => commands::run_move::<Item>(ctx, &id, position),
        },
        Commands::Invoke { checklist, json } => commands::run_invoke(ctx, &checklist, json),
        Commands::Projects {
            sort,
            asc,
            desc,
            empty_first,
            checklist,
            json,
        } => commands::run_projects(
            ctx,
            commands::ProjectListing {
                sort: sort.as_deref(),
                ascending: sort_direction(asc, desc),
                empty_first,
                checklist: checklist.as_deref(),
                json,
            },
        ),
        Commands::Tasks { project, json } => commands::run_tasks(ctx, &project, json),
        Commands::Task { action } => match action {
            TaskAction::Toggle { id } => commands::run_task_toggle(ctx, &id),
            TaskAction::ResetDue { id } => commands::run_task_reset_due(ctx, &id),
            TaskAction::Move { id, position } => commands::run_move::<Task>(ctx, &id, position),
        },
        Commands::Due { recurrence, from } => commands::run_due(ctx, &recurrence, from.as_deref()),
        Commands::Reconcile { json } => commands::run_reconcile(ctx, json),
        Commands::Merge {
            snapshot,
            origin,
            json,
        } => commands::run_merge(ctx, &snapshot, &origin, json),
    }
}

/// `Some(true)` for `--asc`, `Some(false)` for `--desc`, otherwise the preference
fn sort_direction(asc: bool, desc: bool) -> Option<bool> {
    match (asc, desc) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
