//! JSON snapshots of the full record set
//!
//! A snapshot is both the on-disk format of a [`crate::MemoryStore`] and the
//! payload of a replica merge.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use invocation_core::{Checklist, Item, Project, Task};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Every record in a store at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Format version for forward compatibility
    pub version: u32,
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            checklists: Vec::new(),
            items: Vec::new(),
            projects: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    pub const VERSION: u32 = 1;

    /// Total number of records of every type
    pub fn len(&self) -> usize {
        self.checklists.len() + self.items.len() + self.projects.len() + self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a snapshot under a shared lock
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        file.lock_shared()
            .map_err(|_| Error::LockFailed { path: path.to_path_buf() })?;

        // Read through the locked handle
        let mut content = String::new();
        (&file)
            .read_to_string(&mut content)
            .map_err(|e| Error::io(path, e))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;

        if snapshot.version > Self::VERSION {
            return Err(Error::UnsupportedVersion {
                path: path.to_path_buf(),
                version: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Write the snapshot atomically
    ///
    /// The JSON is staged in a hidden sibling of `path` and renamed over it
    /// once synced. A failed save removes the staging file and leaves any
    /// previous snapshot untouched.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }

        let staging = staging_path(path);
        let outcome = stage(&staging, &content)
            .and_then(|()| fs::rename(&staging, path).map_err(|e| Error::io(path, e)));
        if let Err(e) = outcome {
            if let Err(cleanup) = fs::remove_file(&staging) {
                tracing::debug!(path = %staging.display(), error = %cleanup, "Staging file not removed");
            }
            return Err(e);
        }

        tracing::debug!(path = %path.display(), records = self.len(), "Saved snapshot");
        Ok(())
    }
}

/// `.store.json.<pid>.tmp` next to `store.json`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Write and sync `content` while holding an exclusive lock on `staging`
fn stage(staging: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(staging).map_err(|e| Error::io(staging, e))?;
    file.lock_exclusive()
        .map_err(|_| Error::LockFailed { path: staging.to_path_buf() })?;
    file.write_all(content).map_err(|e| Error::io(staging, e))?;
    file.sync_all().map_err(|e| Error::io(staging, e))?;
    // Closing the handle releases the lock
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let checklist = Checklist::new("Weekly review", 0, created);
        let snapshot = StoreSnapshot {
            items: vec![Item::new(checklist.id, "Inbox zero", 0)],
            checklists: vec![checklist],
            ..StoreSnapshot::default()
        };

        snapshot.save(&path).unwrap();
        let loaded = StoreSnapshot::load(&path).unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.len(), 2);
        // No temp files left behind
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn failed_save_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        // A directory in the way makes the final rename fail
        let path = dir.path().join("store.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();

        let result = StoreSnapshot::default().save(&path);

        assert!(matches!(result, Err(Error::Io { .. })));
        assert!(!staging_path(&path).exists());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn newer_versions_are_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"version": 99}"#).unwrap();

        let result = StoreSnapshot::load(&path);

        assert!(matches!(result, Err(Error::UnsupportedVersion { version: 99, .. })));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(StoreSnapshot::load(&path), Err(Error::Json(_))));
    }
}
