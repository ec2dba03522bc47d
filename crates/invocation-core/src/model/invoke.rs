//! Turning a checklist into a project

use chrono::{DateTime, TimeZone, Utc};

use super::{Checklist, Item, Project, Task};
use crate::config::Preferences;

/// A freshly invoked project and its tasks
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub project: Project,
    pub tasks: Vec<Task>,
}

/// Invoke `checklist` at `invoked`
///
/// Creates one task per item. Recurrence is evaluated in `calendar`, so the
/// same invocation can be computed against the local time zone in the
/// application and against a fixed zone in tests. `index` is the project's
/// position among the checklist's existing projects.
pub fn invoke<Tz: TimeZone>(
    checklist: &Checklist,
    items: &[Item],
    invoked: DateTime<Utc>,
    calendar: &Tz,
    preferences: &Preferences,
    index: i64,
) -> Invocation {
    let mut project = Project::new(checklist.id, index, invoked);
    if preferences.project_name_fill {
        project.title = Some(checklist.title.clone());
    }

    let tasks: Vec<Task> = items
        .iter()
        .map(|item| Task::from_item(project.id, item, invoked, calendar))
        .collect();
    project.refresh_due(&tasks);

    tracing::debug!(
        checklist = %checklist.id,
        project = %project.id,
        tasks = tasks.len(),
        "Invoked checklist"
    );

    Invocation { project, tasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{DueTime, Recurrence};
    use chrono::{NaiveTime, TimeDelta};

    fn invoked() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap()
    }

    #[test]
    fn invoke_creates_one_task_per_item_with_item_index() {
        let checklist = Checklist::new("Trip", 0, invoked());
        let items = vec![
            Item::new(checklist.id, "Pack", 0),
            Item::new(checklist.id, "Book", 1),
        ];

        let invocation = invoke(&checklist, &items, invoked(), &Utc, &Preferences::default(), 2);

        assert_eq!(invocation.project.index, 2);
        assert_eq!(invocation.project.title, None);
        assert_eq!(invocation.tasks.len(), 2);
        assert!(invocation.tasks.iter().all(|t| t.project == invocation.project.id));
        assert_eq!(invocation.tasks[1].index, 1);
    }

    #[test]
    fn name_fill_copies_checklist_title() {
        let checklist = Checklist::new("Trip", 0, invoked());
        let preferences = Preferences {
            project_name_fill: true,
            ..Preferences::default()
        };

        let invocation = invoke(&checklist, &[], invoked(), &Utc, &preferences, 0);
        assert_eq!(invocation.project.title.as_deref(), Some("Trip"));
    }

    #[test]
    fn project_due_is_earliest_task_due() {
        let checklist = Checklist::new("Trip", 0, invoked());
        let twenty_hours = DueTime::AfterInvocation(std::time::Duration::from_secs(20 * 3600));
        let nine = DueTime::Fixed(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let items = vec![
            Item::new(checklist.id, "Later", 0).with_recurrence(Recurrence::new(2, None, nine).unwrap()),
            Item::new(checklist.id, "Sooner", 1)
                .with_recurrence(Recurrence::new(0, None, twenty_hours).unwrap()),
            Item::new(checklist.id, "Whenever", 2),
        ];

        let invocation = invoke(&checklist, &items, invoked(), &Utc, &Preferences::default(), 0);
        assert_eq!(invocation.project.due, Some(invoked() + TimeDelta::hours(20)));
        assert_eq!(invocation.tasks[2].due, None);
    }
}
