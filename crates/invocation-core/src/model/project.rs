//! Projects (invoked checklists) and their tasks

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Checklist, Item, link::normalize_link, text_key, time_key};
use crate::record::{Record, SortKey};
use crate::recurrence::{Recurrence, next_due_date};

/// An independent task list created by invoking a checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Checklist this project was invoked from
    pub checklist: Uuid,
    /// Position among the checklist's projects
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The invocation instant; anchor for every task's recurrence
    pub invoked: DateTime<Utc>,
    /// Earliest due date among incomplete tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(checklist: Uuid, index: i64, invoked: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            checklist,
            index,
            title: None,
            invoked,
            due: None,
        }
    }

    /// Title shown for the project, falling back to its checklist's title
    pub fn display_title<'a>(&'a self, checklist: Option<&'a Checklist>) -> &'a str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => checklist.map(|c| c.title.as_str()).unwrap_or(""),
        }
    }

    /// Earliest due date among incomplete tasks
    pub fn earliest_due<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Option<DateTime<Utc>> {
        tasks
            .into_iter()
            .filter(|task| !task.is_complete())
            .filter_map(|task| task.due)
            .min()
    }

    /// Recompute `due` from the project's tasks
    ///
    /// Returns `true` if the value changed.
    pub fn refresh_due<'a>(&mut self, tasks: impl IntoIterator<Item = &'a Task>) -> bool {
        let due = Self::earliest_due(tasks);
        if due == self.due {
            return false;
        }
        self.due = due;
        true
    }
}

impl Record for Project {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.checklist)
    }

    fn sibling_index(&self) -> i64 {
        self.index
    }

    fn set_sibling_index(&mut self, index: i64) {
        self.index = index;
    }

    fn sort_key(&self, name: &str) -> Option<SortKey> {
        match name {
            "title" => self.title.as_deref().and_then(text_key),
            "invoked" => time_key(Some(self.invoked)),
            "due" => time_key(self.due),
            _ => None,
        }
    }
}

/// A concrete task within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Owning project
    pub project: Uuid,
    /// Item this task was created from, if it still exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Uuid>,
    /// Position within the project
    pub index: i64,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Task {
    pub fn new(project: Uuid, name: impl Into<String>, index: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project,
            item: None,
            index,
            name: name.into(),
            notes: String::new(),
            link: None,
            completed: None,
            due: None,
            recurrence: None,
        }
    }

    /// Create a task from a checklist item at invocation time
    ///
    /// Copies the item's content and recurrence by value; the task's index
    /// starts out as the item's index.
    pub fn from_item<Tz: TimeZone>(
        project: Uuid,
        item: &Item,
        invoked: DateTime<Utc>,
        calendar: &Tz,
    ) -> Self {
        let mut task = Self {
            id: Uuid::new_v4(),
            project,
            item: Some(item.id),
            index: item.index,
            name: item.name.clone(),
            notes: item.notes.clone(),
            link: item.link.clone(),
            completed: None,
            due: None,
            recurrence: item.recurrence,
        };
        task.reset_due_date(invoked, calendar);
        task
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    /// Mark complete at `now`, or clear completion if already complete
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.completed = match self.completed {
            Some(_) => None,
            None => Some(now),
        };
    }

    /// Due date implied by the task's recurrence for a given invocation
    pub fn scheduled_due<Tz: TimeZone>(
        &self,
        invoked: DateTime<Utc>,
        calendar: &Tz,
    ) -> Option<DateTime<Utc>> {
        self.recurrence.as_ref().map(|recurrence| {
            next_due_date(recurrence, &invoked.with_timezone(calendar)).with_timezone(&Utc)
        })
    }

    /// Recompute `due` from the recurrence, discarding manual edits
    pub fn reset_due_date<Tz: TimeZone>(&mut self, invoked: DateTime<Utc>, calendar: &Tz) {
        self.due = self.scheduled_due(invoked, calendar);
    }

    /// Whether `due` still equals the recurrence-derived value
    pub fn due_date_is_unchanged<Tz: TimeZone>(&self, invoked: DateTime<Utc>, calendar: &Tz) -> bool {
        self.due == self.scheduled_due(invoked, calendar)
    }

    /// Set or clear the task's link; non-empty links are normalised
    pub fn set_link(&mut self, link: &str) {
        self.link = if link.trim().is_empty() {
            None
        } else {
            Some(normalize_link(link))
        };
    }
}

impl Record for Task {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.project)
    }

    fn sibling_index(&self) -> i64 {
        self.index
    }

    fn set_sibling_index(&mut self, index: i64) {
        self.index = index;
    }

    fn sort_key(&self, name: &str) -> Option<SortKey> {
        match name {
            "name" => text_key(&self.name),
            "due" => time_key(self.due),
            "completed" => time_key(self.completed),
            _ => None,
        }
    }
}
