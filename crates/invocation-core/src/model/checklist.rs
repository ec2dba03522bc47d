//! Checklists and their reusable items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{link::normalize_link, text_key, time_key};
use crate::record::{Record, SortKey};
use crate::recurrence::Recurrence;

/// A reusable checklist template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: Uuid,
    pub title: String,
    /// Position among all checklists
    pub index: i64,
    pub created: DateTime<Utc>,
}

impl Checklist {
    pub fn new(title: impl Into<String>, index: i64, created: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            index,
            created,
        }
    }
}

impl Record for Checklist {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        None
    }

    fn sibling_index(&self) -> i64 {
        self.index
    }

    fn set_sibling_index(&mut self, index: i64) {
        self.index = index;
    }

    fn sort_key(&self, name: &str) -> Option<SortKey> {
        match name {
            "title" => text_key(&self.title),
            "created" => time_key(Some(self.created)),
            _ => None,
        }
    }
}

/// One step of a checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    /// Owning checklist
    pub checklist: Uuid,
    /// Position within the checklist
    pub index: i64,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Item {
    pub fn new(checklist: Uuid, name: impl Into<String>, index: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            checklist,
            index,
            name: name.into(),
            notes: String::new(),
            link: None,
            recurrence: None,
        }
    }

    /// Attach a recurrence descriptor
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Set or clear the item's link; non-empty links are normalised
    pub fn set_link(&mut self, link: &str) {
        self.link = if link.trim().is_empty() {
            None
        } else {
            Some(normalize_link(link))
        };
    }
}

impl Record for Item {
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
            "name" => text_key(&self.name),
            _ => None,
        }
    }
}
