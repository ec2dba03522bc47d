//! Project and task listings

use std::sync::Arc;

use colored::Colorize;
use invocation_core::{
    Checklist, OrderedProjection, Project, ProjectSort, SortPolicy, Task,
};

use crate::context::{Context, parse_id};
use crate::error::{CliError, Result};

/// Options for [`run_projects`]; unset values fall back to preferences
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectListing<'a> {
    pub sort: Option<&'a str>,
    /// Direction override; `None` keeps the preference
    pub ascending: Option<bool>,
    pub empty_first: bool,
    pub checklist: Option<&'a str>,
    pub json: bool,
}

impl ProjectListing<'_> {
    fn policy(&self, ctx: &Context) -> Result<SortPolicy<Project>> {
        let preferences = &ctx.preferences;
        let sort = match self.sort {
            Some(raw) => raw
                .parse::<ProjectSort>()
                .map_err(|_| CliError::user(format!("Unknown sort method: {}", raw)))?,
            None => preferences.project_sort,
        };
        let ascending = self.ascending.unwrap_or(preferences.project_sort_ascending);
        let empty_first = self.empty_first || preferences.empty_first;
        Ok(SortPolicy::new(sort.comparator(), ascending, empty_first))
    }
}

pub fn run_projects(ctx: &Context, listing: ProjectListing<'_>) -> Result<()> {
    let store = ctx.open_store()?;
    let projects = match listing.checklist {
        Some(raw) => store.children::<Project>(parse_id("checklist", raw)?),
        None => store.all::<Project>(),
    };
    let policy = listing.policy(ctx)?;
    tracing::debug!(sort = policy.comparator.name(), ascending = policy.ascending, "Listing projects");
    let projection = OrderedProjection::with_policy(projects.into_iter().map(Arc::new), policy);

    if listing.json {
        let ordered: Vec<&Project> = projection.iter().map(|project| project.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    if projection.is_empty() {
        println!("{} (use {} to create one)", "No projects".dimmed(), "invocation invoke".cyan());
        return Ok(());
    }
    let show_dates = ctx.preferences.show_date_on_list;
    for project in projection.iter() {
        let checklist = store.get::<Checklist>(&project.checklist);
        let mut line = format!(
            "{}  {}  invoked {}",
            project.id.to_string().dimmed(),
            project.display_title(checklist).bold(),
            ctx.format(&project.invoked)
        );
        if show_dates {
            let due = match &project.due {
                Some(due) => ctx.format(due).yellow(),
                None => "no due date".dimmed(),
            };
            line = format!("{}  {}", line, due);
        }
        println!("{}", line);
    }
    Ok(())
}

pub fn run_tasks(ctx: &Context, project: &str, json: bool) -> Result<()> {
    let project = parse_id("project", project)?;
    let store = ctx.open_store()?;
    if store.get::<Project>(&project).is_none() {
        return Err(CliError::user(format!("No project with id {}", project)));
    }
    let tasks = store.children::<Task>(project);

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    let show_dates = ctx.preferences.show_date_on_project;
    for task in &tasks {
        let check = if task.is_complete() { "[x]".green() } else { "[ ]".normal() };
        let date = match (&task.completed, &task.due) {
            _ if !show_dates => String::new(),
            (Some(completed), _) => format!("completed {}", ctx.format(completed)),
            (None, Some(due)) => format!("due {}", ctx.format(due)),
            (None, None) => String::new(),
        };
        println!("{} {}  {}  {}", check, task.name, date.yellow(), task.id.to_string().dimmed());
    }
    Ok(())
}
