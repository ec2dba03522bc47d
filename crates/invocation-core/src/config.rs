//! User preferences and reconciler settings
//!
//! Preferences are passed explicitly to whatever needs them. They are stored
//! as TOML; a missing file means defaults.
//!
//! ```toml
//! project_sort = "due"
//! project_sort_ascending = true
//! empty_first = false
//! project_name_fill = true
//! date_style = "medium"
//! time_style = "short"
//! show_date_on_list = true
//! show_date_on_project = true
//!
//! [reconciler]
//! initial_backoff_ms = 500
//! max_backoff_ms = 60000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::comparator::{Comparator, SortPolicy};
use crate::model::Project;
use crate::{Error, Result};

/// Sort methods offered for the projects list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSort {
    #[default]
    Title,
    Invoked,
    Due,
}

impl ProjectSort {
    /// The fixed comparator list, in menu order
    pub const ALL: [ProjectSort; 3] = [ProjectSort::Title, ProjectSort::Invoked, ProjectSort::Due];

    /// Select by menu index; out-of-range indices fall back to the first method
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(Self::ALL[0])
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProjectSort::Title => "title",
            ProjectSort::Invoked => "invoked",
            ProjectSort::Due => "due",
        }
    }

    pub fn comparator(&self) -> Comparator<Project> {
        Comparator::field(self.name())
    }
}

impl std::str::FromStr for ProjectSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::NotFound(format!("sort method '{}'", s)))
    }
}

/// Date and time presentation styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStyle {
    #[default]
    Short,
    Medium,
    Long,
}

impl FormatStyle {
    fn date_format(&self) -> &'static str {
        match self {
            FormatStyle::Short => "%-m/%-d/%y",
            FormatStyle::Medium => "%b %-d, %Y",
            FormatStyle::Long => "%B %-d, %Y",
        }
    }

    fn time_format(&self) -> &'static str {
        match self {
            FormatStyle::Short => "%-I:%M %p",
            FormatStyle::Medium => "%-I:%M:%S %p",
            FormatStyle::Long => "%-I:%M:%S %p %:z",
        }
    }
}

/// Backoff applied by the background reconciler after a failed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 60_000,
        }
    }
}

impl ReconcilerConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

/// User-facing preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub project_sort: ProjectSort,
    pub project_sort_ascending: bool,
    /// Place projects without a sort key before the others
    pub empty_first: bool,
    /// Copy a checklist's title onto projects invoked from it
    pub project_name_fill: bool,
    pub date_style: FormatStyle,
    pub time_style: FormatStyle,
    /// Show due dates in the projects list
    pub show_date_on_list: bool,
    /// Show due and completion dates in a project's task list
    pub show_date_on_project: bool,
    pub reconciler: ReconcilerConfig,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            project_sort: ProjectSort::Title,
            project_sort_ascending: true,
            empty_first: false,
            project_name_fill: false,
            date_style: FormatStyle::Short,
            time_style: FormatStyle::Short,
            show_date_on_list: true,
            show_date_on_project: true,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl Preferences {
    /// Load preferences from a TOML file
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "No preferences file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save preferences atomically (write to temp, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Sort policy for the projects list
    pub fn projection_policy(&self) -> SortPolicy<Project> {
        SortPolicy::new(
            self.project_sort.comparator(),
            self.project_sort_ascending,
            self.empty_first,
        )
    }

    /// Render a timestamp with the configured date and time styles
    pub fn format_timestamp<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let format = format!(
            "{} {}",
            self.date_style.date_format(),
            self.time_style.time_format()
        );
        timestamp.format(&format).to_string()
    }
}
