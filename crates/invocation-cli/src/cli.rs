//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Invocation - Turn reusable checklists into independent task lists
#[derive(Parser, Debug)]
#[command(name = "invocation")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Snapshot file holding all records
    #[arg(long, global = true, env = "INVOCATION_STORE", default_value = "invocation.json")]
    pub store: PathBuf,

    /// Preferences file (TOML)
    #[arg(long, global = true, env = "INVOCATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Treat this RFC 3339 instant as the current time
    #[arg(long, global = true, env = "INVOCATION_NOW", hide = true)]
    pub now: Option<String>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Manage checklists
    Checklist {
        #[command(subcommand)]
        action: ChecklistAction,
    },

    /// Manage checklist items
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },

    /// Create a project from a checklist
    Invoke {
        /// Checklist id
        checklist: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List projects in sorted order
    ///
    /// Sort settings default to the preferences file.
    ///
    /// Examples:
    ///   invocation projects --sort due
    ///   invocation projects --sort title --desc --empty-first
    Projects {
        /// Sort method (title, invoked or due)
        #[arg(long)]
        sort: Option<String>,

        /// Sort ascending, overriding the preference
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        /// Sort descending, overriding the preference
        #[arg(long)]
        desc: bool,

        /// Put projects without a sort value first
        #[arg(long)]
        empty_first: bool,

        /// Only projects invoked from this checklist
        #[arg(long)]
        checklist: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List a project's tasks
    Tasks {
        /// Project id
        project: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Change a task
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Compute the next due date of a recurrence
    Due {
        #[command(flatten)]
        recurrence: RecurrenceArgs,

        /// Invocation instant (RFC 3339); defaults to the current local time
        #[arg(long)]
        from: Option<String>,
    },

    /// Restore dense sibling indices and commit if anything changed
    Reconcile {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Merge another replica's snapshot, then reconcile in the background
    Merge {
        /// Snapshot file from the other replica
        snapshot: PathBuf,

        /// Name of the replica the snapshot came from
        #[arg(long, default_value = "remote")]
        origin: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Checklist actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ChecklistAction {
    /// Create a checklist
    Add {
        title: String,

        #[arg(long)]
        json: bool,
    },

    /// List checklists
    List {
        #[arg(long)]
        json: bool,
    },

    /// Delete a checklist with its items, projects and tasks
    Delete { id: String },

    /// Move a checklist to a zero-based position
    Move { id: String, position: usize },
}

/// Item actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    /// Append an item to a checklist
    Add {
        /// Checklist id
        checklist: String,

        name: String,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        link: Option<String>,

        #[command(flatten)]
        recurrence: RecurrenceArgs,

        #[arg(long)]
        json: bool,
    },

    /// Delete an item
    Delete { id: String },

    /// Move an item to a zero-based position within its checklist
    Move { id: String, position: usize },
}

/// Task actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Mark a task complete, or incomplete if it already is
    Toggle { id: String },

    /// Recompute a task's due date from its recurrence
    ResetDue { id: String },

    /// Move a task to a zero-based position within its project
    Move { id: String, position: usize },
}

/// Recurrence descriptor flags
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceArgs {
    /// Days after the invocation date (0-365)
    #[arg(long)]
    pub offset: Option<u16>,

    /// Snap forward to this weekday (mon, tue, ...)
    #[arg(long)]
    pub weekday: Option<String>,

    /// Fixed time of day, HH:MM
    #[arg(long, conflicts_with = "after")]
    pub at: Option<String>,

    /// Minutes after the invocation time of day
    #[arg(long)]
    pub after: Option<u64>,
}

impl RecurrenceArgs {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
