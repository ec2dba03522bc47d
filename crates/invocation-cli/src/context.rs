//! Shared state for a single command run

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use invocation_core::{Clock, FixedClock, Persistence, Preferences, SystemClock};
use invocation_store::MemoryStore;
use uuid::Uuid;

use crate::error::{CliError, Result};

/// Store location, preferences and clock resolved from the command line
pub struct Context {
    pub store_path: PathBuf,
    pub preferences: Preferences,
    clock: Arc<dyn Clock>,
}

impl Context {
    pub fn load(store_path: PathBuf, config: Option<&Path>, now: Option<&str>) -> Result<Self> {
        let preferences = match config {
            Some(path) => Preferences::load(path)?,
            None => Preferences::default(),
        };
        let clock: Arc<dyn Clock> = match now {
            Some(raw) => {
                let instant = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| CliError::user(format!("Invalid --now instant {}: {}", raw, e)))?;
                Arc::new(FixedClock(instant.with_timezone(&Utc)))
            }
            None => Arc::new(SystemClock),
        };
        Ok(Self {
            store_path,
            preferences,
            clock,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn open_store(&self) -> Result<MemoryStore> {
        Ok(MemoryStore::open(&self.store_path)?)
    }

    /// Write the store back if the command changed anything
    pub fn commit(&self, store: &mut MemoryStore) -> Result<()> {
        if store.commit_if_changed()? {
            tracing::debug!(path = %self.store_path.display(), "Committed store");
        }
        Ok(())
    }

    /// Render an instant in the local zone using the configured styles
    pub fn format(&self, instant: &DateTime<Utc>) -> String {
        self.preferences
            .format_timestamp(&instant.with_timezone(&Local))
    }
}

/// Parse a record id given on the command line
pub fn parse_id(kind: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| CliError::user(format!("Invalid {} id: {}", kind, raw)))
}
