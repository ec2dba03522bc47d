//! Record store for Invocation
//!
//! An in-process store of checklists, items, projects and tasks. It provides
//! ordered fetches, a change feed per record type, replica merges with a merge
//! signal, and a conditional commit to a JSON snapshot file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use chrono::Utc;
//! use invocation_core::{Item, Persistence, Preferences};
//! use invocation_store::MemoryStore;
//!
//! let mut store = MemoryStore::open(Path::new("invocation.json"))?;
//! let checklist = store.add_checklist("Morning", Utc::now());
//! store.add_item(Item::new(checklist.id, "Stretch", 0))?;
//! store.invoke(checklist.id, Utc::now(), &chrono::Local, &Preferences::default())?;
//! store.commit_if_changed()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod snapshot;
pub mod store;
pub mod table;

pub use error::{Error, Result};
pub use snapshot::StoreSnapshot;
pub use store::MemoryStore;
pub use table::{Stored, Table};
