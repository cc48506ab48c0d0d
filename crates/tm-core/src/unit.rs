//! Migration units: one immutable script plus its snapshot header.

use serde::Serialize;

/// Separator written by the diff generator between statements.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// One irreducible schema change, materialized from its unit folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationUnit {
    /// Unique identifier from the snapshot document
    pub id: String,

    /// Identifier of the preceding unit (or the ROOT sentinel)
    pub prev_id: String,

    /// Folder name, recorded in the ledger as the human-readable tag
    pub tag: String,

    /// Timestamp taken from the folder-name prefix
    pub created_at_millis: i64,

    /// Raw script text, exactly as stored on disk
    pub sql: String,

    /// Script split on [`STATEMENT_BREAKPOINT`], trimmed, empties removed
    pub statements: Vec<String>,

    /// Whether statements must be executed one at a time
    pub breakpoints: bool,

    /// SHA-256 of the raw script
    pub hash: String,
}

/// Parse the numeric timestamp prefix of a unit folder name.
///
/// `1700000000000_add_users` yields `Some(1700000000000)`; names without a
/// leading run of digits yield `None`.
pub fn parse_created_at(folder_name: &str) -> Option<i64> {
    let prefix = folder_name.split('_').next().unwrap_or_default();
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// Strip a leading `<digits>_` from a name, keeping the remainder.
///
/// Names without such a prefix are returned unchanged.
pub fn strip_numeric_prefix(name: &str) -> &str {
    match name.split_once('_') {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => name,
    }
}

/// Build a unit folder name from its timestamp and label.
pub fn folder_name(created_at_millis: i64, label: &str) -> String {
    if label.is_empty() {
        created_at_millis.to_string()
    } else {
        format!("{created_at_millis}_{label}")
    }
}

/// Split a script into statements on the explicit breakpoint marker.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(STATEMENT_BREAKPOINT)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "unit_test.rs"]
mod tests;
