//! Snapshot store: the folder-per-unit migrations directory.
//!
//! ```text
//! migrations/
//!   1700000000000_init/
//!     up.sql
//!     snapshot.json
//!   1700000001000_add_posts/
//!     up.sql
//!     snapshot.json
//!   bundle.json        (optional, derived)
//! ```

use crate::chain::{resolve_chain, Chain, ChainLink};
use crate::error::{CoreError, CoreResult};
use crate::journal::{JOURNAL_FILE, META_DIR};
use crate::reader::load_ordered;
use crate::snapshot::{set_breakpoints, ROOT_ID, SCRIPT_FILE, SNAPSHOT_FILE};
use crate::unit::{folder_name, parse_created_at};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the derived bundle artifact
pub const BUNDLE_FILE: &str = "bundle.json";

/// Which migration formats a directory contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Nothing recognizable
    Empty,
    /// Only unit folders
    Folders,
    /// Only the flat journal format
    Legacy,
    /// Both formats side by side
    Hybrid,
}

/// Derived, ordered manifest of a migrations directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub units: Vec<BundleEntry>,
}

/// One unit inside [`Bundle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub folder: String,
    pub id: String,
    pub created_at: i64,
    pub hash: String,
    pub breakpoints: bool,
}

/// A migrations directory laid out as one folder per unit
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of subdirectories that hold a snapshot document, sorted.
    pub fn unit_dirs(&self) -> CoreResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| CoreError::io(&self.root, e))? {
            let entry = entry.map_err(|e| CoreError::io(&self.root, e))?;
            if !entry.path().join(SNAPSHOT_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                dirs.push(name.to_string());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Resolve the current chain.
    pub fn chain(&self) -> Chain {
        resolve_chain(&self.root)
    }

    /// Report which layouts are present.
    pub fn detect_layout(&self) -> CoreResult<Layout> {
        let legacy = self.root.join(META_DIR).join(JOURNAL_FILE).is_file();
        let folders = !self.unit_dirs()?.is_empty();
        Ok(match (legacy, folders) {
            (false, false) => Layout::Empty,
            (false, true) => Layout::Folders,
            (true, false) => Layout::Legacy,
            (true, true) => Layout::Hybrid,
        })
    }

    /// Write a unit folder with the given artifacts.
    ///
    /// The snapshot document is written as-is; it must already carry `id`
    /// and `prevId`. Existing folders are never overwritten.
    pub fn write_unit(&self, folder: &str, sql: &str, snapshot: &Value) -> CoreResult<PathBuf> {
        let path = self.root.join(folder);
        if path.exists() {
            return Err(CoreError::io(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "migration folder already exists",
                ),
            ));
        }
        fs::create_dir_all(&path).map_err(|e| CoreError::io(&path, e))?;

        let script_path = path.join(SCRIPT_FILE);
        fs::write(&script_path, sql).map_err(|e| CoreError::io(&script_path, e))?;

        let snapshot_path = path.join(SNAPSHOT_FILE);
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&snapshot_path, json).map_err(|e| CoreError::io(&snapshot_path, e))?;

        Ok(path)
    }

    /// Append a freshly authored unit after the current chain tail.
    ///
    /// Stamps the folder with the current time, assigns a new id and points
    /// `prevId` at the last chained unit (or ROOT). Returns the folder name.
    pub fn create_unit(
        &self,
        label: &str,
        sql: &str,
        snapshot: Value,
        breakpoints: bool,
    ) -> CoreResult<String> {
        let prev_id = self
            .chain()
            .last()
            .map_or_else(|| ROOT_ID.to_string(), |l| l.id.clone());

        let mut doc = match snapshot {
            Value::Object(_) => snapshot,
            _ => Value::Object(Default::default()),
        };
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            obj.insert("prevId".into(), Value::String(prev_id));
        }
        set_breakpoints(&mut doc, breakpoints);

        let mut created_at = Utc::now().timestamp_millis();
        if let Some(latest) = self.latest_timestamp()? {
            created_at = created_at.max(latest + 1);
        }
        let mut folder = folder_name(created_at, label);
        while self.root.join(&folder).exists() {
            created_at += 1;
            folder = folder_name(created_at, label);
        }

        self.write_unit(&folder, sql, &doc)?;
        log::info!("Created migration {}", folder);
        Ok(folder)
    }

    /// Remove the most recent unit of the chain.
    ///
    /// Regenerates the bundle when one exists. Returns the dropped unit, or
    /// `None` for an empty chain.
    pub fn drop_latest(&self) -> CoreResult<Option<ChainLink>> {
        let Some(last) = self.chain().last().cloned() else {
            return Ok(None);
        };

        let path = self.root.join(&last.folder);
        fs::remove_dir_all(&path).map_err(|e| CoreError::io(&path, e))?;
        log::info!("Dropped migration {}", last.folder);

        if self.root.join(BUNDLE_FILE).exists() {
            self.write_bundle()?;
        }
        Ok(Some(last))
    }

    /// Write `bundle.json` from the current chain.
    pub fn write_bundle(&self) -> CoreResult<PathBuf> {
        let units = load_ordered(&self.root)?
            .into_iter()
            .map(|u| BundleEntry {
                folder: u.tag,
                id: u.id,
                created_at: u.created_at_millis,
                hash: u.hash,
                breakpoints: u.breakpoints,
            })
            .collect();
        let bundle = Bundle { units };

        let path = self.root.join(BUNDLE_FILE);
        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&bundle)?;
        fs::write(&temp_path, json).map_err(|e| CoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| CoreError::io(&path, e))?;
        Ok(path)
    }

    /// Load the bundle, if one was written.
    pub fn read_bundle(&self) -> CoreResult<Option<Bundle>> {
        let path = self.root.join(BUNDLE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Timestamp of the newest unit folder, chained or not.
    pub fn latest_timestamp(&self) -> CoreResult<Option<i64>> {
        Ok(self
            .unit_dirs()?
            .iter()
            .filter_map(|d| parse_created_at(d))
            .max())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
