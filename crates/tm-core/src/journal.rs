//! Legacy journal conversion.
//!
//! Older releases kept migrations in a flat layout indexed by a journal:
//!
//! ```text
//! migrations/
//!   meta/_journal.json          {"entries": [{"idx", "when", "tag", "breakpoints"}]}
//!   meta/0000_snapshot.json
//!   meta/0001_snapshot.json
//!   0000_cool_name.sql
//!   0001_other_name.sql
//! ```
//!
//! [`convert`] copies every journal entry forward into the folder-per-unit
//! layout (`<when>_<name>/{up.sql, snapshot.json}`). Sources are never
//! modified, and entries already present at the destination are skipped, so
//! a conversion can be re-run at any time.

use crate::chain::resolve_chain;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{set_breakpoints, SnapshotHeader};
use crate::store::{Layout, SnapshotStore};
use crate::unit::{folder_name, strip_numeric_prefix};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Metadata folder of the legacy layout
pub const META_DIR: &str = "meta";

/// Index document inside [`META_DIR`]
pub const JOURNAL_FILE: &str = "_journal.json";

/// The legacy index document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub dialect: Option<String>,

    pub entries: Vec<JournalEntry>,
}

/// One entry of the legacy journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal
    pub idx: u32,

    /// Creation time in milliseconds
    pub when: i64,

    /// Script name without extension, e.g. `0003_brave_wolf`
    pub tag: String,

    #[serde(default = "default_true")]
    pub breakpoints: bool,
}

fn default_true() -> bool {
    true
}

impl JournalEntry {
    /// Legacy snapshot file name: the tag's numeric prefix, or the zero-padded index.
    pub fn snapshot_file_name(&self) -> String {
        let prefix = match self.tag.split_once('_') {
            Some((p, _)) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                p.to_string()
            }
            _ => format!("{:04}", self.idx),
        };
        format!("{prefix}_snapshot.json")
    }

    /// Destination folder name in the folder-per-unit layout.
    pub fn folder_name(&self) -> String {
        folder_name(self.when, strip_numeric_prefix(&self.tag))
    }
}

/// A validated legacy entry with its artifacts loaded
#[derive(Debug, Clone)]
pub struct LegacyUnit {
    pub entry: JournalEntry,
    pub folder: String,
    pub id: String,
    pub sql: String,
    pub snapshot: Value,
}

/// Outcome of a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertReport {
    /// Entries written (or that would be written, on a dry run)
    pub migrated: usize,

    /// Entries already present at the destination
    pub skipped: usize,

    /// Destination folders, in journal order, of the migrated entries
    pub folders: Vec<String>,

    /// The source held both layouts at once
    pub hybrid: bool,
}

/// Read and validate the legacy layout under `source`.
///
/// Every missing file is collected before failing, so the error names all
/// of them at once. Nothing is written.
pub fn read_legacy(source: &Path) -> CoreResult<Vec<LegacyUnit>> {
    let meta = source.join(META_DIR);
    let journal_path = meta.join(JOURNAL_FILE);
    let invalid = |missing: Vec<String>| CoreError::LegacyStructureInvalid {
        dir: source.display().to_string(),
        missing,
    };

    if !journal_path.is_file() {
        return Err(invalid(vec![journal_path.display().to_string()]));
    }
    let content = std::fs::read_to_string(&journal_path)
        .map_err(|e| invalid(vec![format!("{} (unreadable: {e})", journal_path.display())]))?;
    let mut journal: Journal = serde_json::from_str(&content)
        .map_err(|e| invalid(vec![format!("{} (malformed: {e})", journal_path.display())]))?;
    journal.entries.sort_by_key(|e| e.idx);

    let mut missing = Vec::new();
    for entry in &journal.entries {
        let snapshot_path = meta.join(entry.snapshot_file_name());
        if !snapshot_path.is_file() {
            missing.push(snapshot_path.display().to_string());
        }
        let sql_path = sql_path(source, entry);
        if !sql_path.is_file() {
            missing.push(sql_path.display().to_string());
        }
    }
    if !missing.is_empty() {
        return Err(invalid(missing));
    }

    journal
        .entries
        .into_iter()
        .map(|entry| {
            let snapshot_path = meta.join(entry.snapshot_file_name());
            let raw = std::fs::read_to_string(&snapshot_path)
                .map_err(|e| CoreError::io(&snapshot_path, e))?;
            let header = SnapshotHeader::parse(&raw, &snapshot_path)?;
            let mut snapshot: Value =
                serde_json::from_str(&raw).map_err(|e| CoreError::MalformedSnapshot {
                    path: snapshot_path.display().to_string(),
                    message: e.to_string(),
                })?;
            set_breakpoints(&mut snapshot, entry.breakpoints);

            let sql_path = sql_path(source, &entry);
            let sql =
                std::fs::read_to_string(&sql_path).map_err(|e| CoreError::io(&sql_path, e))?;

            Ok(LegacyUnit {
                folder: entry.folder_name(),
                id: header.id,
                entry,
                sql,
                snapshot,
            })
        })
        .collect()
}

fn sql_path(source: &Path, entry: &JournalEntry) -> PathBuf {
    source.join(format!("{}.sql", entry.tag))
}

/// Convert the legacy layout in `source` into unit folders under `dest`.
///
/// `source` and `dest` may be the same directory. With `dry_run` every read
/// and validation runs and the report is identical, but nothing is written.
pub fn convert(source: &Path, dest: &Path, dry_run: bool) -> CoreResult<ConvertReport> {
    let units = read_legacy(source)?;

    let hybrid = SnapshotStore::new(source).detect_layout()? == Layout::Hybrid;
    if hybrid {
        log::warn!(
            "{} contains both a legacy journal and migration folders",
            source.display()
        );
    }

    let existing = resolve_chain(dest);
    let store = SnapshotStore::new(dest);
    let mut planned: HashMap<String, String> = HashMap::new();
    let mut report = ConvertReport {
        hybrid,
        ..ConvertReport::default()
    };

    for unit in units {
        if let Some(earlier) = planned.insert(unit.folder.clone(), unit.entry.tag.clone()) {
            log::warn!(
                "Skipping {}: it maps to folder {} which {} already claims; its SQL is not converted",
                unit.entry.tag,
                unit.folder,
                earlier
            );
            report.skipped += 1;
            continue;
        }

        if dest.join(&unit.folder).exists() || existing.contains(&unit.id) {
            log::info!("Skipping {}: already converted", unit.entry.tag);
            report.skipped += 1;
            continue;
        }

        if dry_run {
            log::info!("Would convert {} -> {}", unit.entry.tag, unit.folder);
        } else {
            store.write_unit(&unit.folder, &unit.sql, &unit.snapshot)?;
            log::info!("Converted {} -> {}", unit.entry.tag, unit.folder);
        }
        report.migrated += 1;
        report.folders.push(unit.folder);
    }

    Ok(report)
}

#[cfg(test)]
#[path = "journal_test.rs"]
mod tests;
