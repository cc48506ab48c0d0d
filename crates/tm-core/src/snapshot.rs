//! Snapshot documents: the `snapshot.json` stored next to every unit's script.
//!
//! Only the header fields are interpreted here (`id`, `prevId` and
//! `_meta.breakpoints`); the schema body produced by the diff generator is
//! carried through untouched.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// `prevId` of the first unit in a lineage.
pub const ROOT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// File name of the snapshot document inside a unit folder.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// File name of the SQL script inside a unit folder.
pub const SCRIPT_FILE: &str = "up.sql";

/// Header fields of a snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Unique unit identifier
    pub id: String,

    /// Identifier of the preceding unit, or [`ROOT_ID`]
    #[serde(rename = "prevId")]
    pub prev_id: String,

    /// Optional generator metadata
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
}

/// The subset of `_meta` the reader cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Whether statement boundaries must be executed one at a time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<bool>,
}

impl SnapshotHeader {
    /// Whether this unit starts a lineage.
    pub fn is_root(&self) -> bool {
        is_root_id(&self.prev_id)
    }

    /// Breakpoint flag, defaulting to `true` when the document does not say.
    pub fn breakpoints(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.breakpoints)
            .unwrap_or(true)
    }

    /// Parse a header from raw JSON text.
    pub fn parse(content: &str, path: &Path) -> CoreResult<Self> {
        serde_json::from_str(content).map_err(|e| CoreError::MalformedSnapshot {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse the header of the snapshot document at `path`.
    pub fn read(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(&content, path)
    }
}

/// Both the ROOT sentinel and the empty string mark a lineage start.
pub fn is_root_id(prev_id: &str) -> bool {
    prev_id.is_empty() || prev_id == ROOT_ID
}

/// Set `_meta.breakpoints` on a full snapshot document, creating `_meta` if needed.
///
/// Returns `false` when the document is not a JSON object.
pub fn set_breakpoints(doc: &mut Value, breakpoints: bool) -> bool {
    let Some(obj) = doc.as_object_mut() else {
        return false;
    };
    let meta = obj
        .entry("_meta")
        .or_insert_with(|| Value::Object(Default::default()));
    if !meta.is_object() {
        *meta = Value::Object(Default::default());
    }
    if let Some(meta) = meta.as_object_mut() {
        meta.insert("breakpoints".to_string(), Value::Bool(breakpoints));
    }
    true
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
