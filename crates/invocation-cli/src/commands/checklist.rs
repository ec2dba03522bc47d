//! Checklist and item authoring

use colored::Colorize;
use invocation_core::{Checklist, Item};

use super::recurrence_from_args;
use crate::cli::RecurrenceArgs;
use crate::context::{Context, parse_id};
use crate::error::Result;

pub fn run_checklist_add(ctx: &Context, title: &str, json: bool) -> Result<()> {
    let mut store = ctx.open_store()?;
    let checklist = store.add_checklist(title, ctx.now());
    ctx.commit(&mut store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checklist)?);
    } else {
        println!("{} {} ({})", "Created".green().bold(), checklist.title.bold(), checklist.id);
    }
    Ok(())
}

pub fn run_checklist_list(ctx: &Context, json: bool) -> Result<()> {
    let store = ctx.open_store()?;
    let checklists = store.all::<Checklist>();

    if json {
        println!("{}", serde_json::to_string_pretty(&checklists)?);
        return Ok(());
    }

    if checklists.is_empty() {
        println!("{} (use {} to add)", "No checklists".dimmed(), "invocation checklist add".cyan());
        return Ok(());
    }
    for checklist in &checklists {
        let items = store.children::<Item>(checklist.id);
        println!(
            "{}  {}  {}",
            checklist.id.to_string().dimmed(),
            checklist.title.bold(),
            format!("{} items", items.len()).dimmed()
        );
        for item in items {
            let marker = if item.recurrence.is_some() { "↻" } else { "-" };
            println!("    {} {}", marker.cyan(), item.name);
        }
    }
    Ok(())
}

pub fn run_checklist_delete(ctx: &Context, id: &str) -> Result<()> {
    let id = parse_id("checklist", id)?;
    let mut store = ctx.open_store()?;
    let removed = store.delete_checklist(&id)?;
    ctx.commit(&mut store)?;

    println!("{} {} records", "Deleted".red().bold(), removed);
    Ok(())
}

pub fn run_item_add(
    ctx: &Context,
    checklist: &str,
    name: &str,
    notes: Option<&str>,
    link: Option<&str>,
    recurrence: &RecurrenceArgs,
    json: bool,
) -> Result<()> {
    let checklist = parse_id("checklist", checklist)?;
    let mut item = Item::new(checklist, name, 0);
    if let Some(notes) = notes {
        item.notes = notes.to_string();
    }
    if let Some(link) = link {
        item.set_link(link);
    }
    item.recurrence = recurrence_from_args(recurrence)?;

    let mut store = ctx.open_store()?;
    let item = store.add_item(item)?;
    ctx.commit(&mut store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("{} {} at position {}", "Added".green().bold(), item.name.bold(), item.index);
    }
    Ok(())
}

pub fn run_item_delete(ctx: &Context, id: &str) -> Result<()> {
    let id = parse_id("item", id)?;
    let mut store = ctx.open_store()?;
    let item = store.delete_item(&id)?;
    ctx.commit(&mut store)?;

    println!("{} {}", "Deleted".red().bold(), item.name);
    Ok(())
}
