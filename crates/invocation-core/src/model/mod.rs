//! Domain records
//!
//! A [`Checklist`] owns reusable [`Item`]s. Invoking a checklist creates a
//! [`Project`] holding one [`Task`] per item. Items and tasks carry an
//! optional [`Recurrence`](crate::Recurrence) that determines a task's due
//! date relative to the invocation instant.

mod checklist;
mod invoke;
mod link;
mod project;

pub use checklist::{Checklist, Item};
pub use invoke::{Invocation, invoke};
pub use link::normalize_link;
pub use project::{Project, Task};

use chrono::{DateTime, Utc};

use crate::record::SortKey;

/// Text sort key that is absent for blank text
fn text_key(text: &str) -> Option<SortKey> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(SortKey::Text(trimmed.to_lowercase()))
    }
}

fn time_key(time: Option<DateTime<Utc>>) -> Option<SortKey> {
    time.map(SortKey::Timestamp)
}
