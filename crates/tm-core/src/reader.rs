//! Materialize the resolved chain into executable migration units.

use crate::chain::{resolve_chain, ChainLink};
use crate::checksum::compute_checksum;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::{SnapshotHeader, SCRIPT_FILE, SNAPSHOT_FILE};
use crate::unit::{parse_created_at, split_statements, MigrationUnit};
use std::path::Path;

/// Load every chained unit under `dir`, in application order.
///
/// Unlike chain resolution this is strict: a unit that made it into the chain
/// must have both artifacts and a timestamped folder name.
pub fn load_ordered(dir: &Path) -> CoreResult<Vec<MigrationUnit>> {
    if !dir.is_dir() {
        return Err(CoreError::MissingDirectory {
            path: dir.display().to_string(),
        });
    }

    resolve_chain(dir)
        .links()
        .iter()
        .map(|link| load_unit(dir, link))
        .collect()
}

/// Read one unit folder.
fn load_unit(dir: &Path, link: &ChainLink) -> CoreResult<MigrationUnit> {
    let folder = dir.join(&link.folder);

    let created_at_millis =
        parse_created_at(&link.folder).ok_or_else(|| CoreError::MalformedUnitName {
            name: link.folder.clone(),
        })?;

    let snapshot_path = folder.join(SNAPSHOT_FILE);
    if !snapshot_path.is_file() {
        return Err(CoreError::MissingArtifact {
            unit: link.folder.clone(),
            artifact: "snapshot",
            path: snapshot_path.display().to_string(),
        });
    }
    let header = SnapshotHeader::read(&snapshot_path)?;

    let script_path = folder.join(SCRIPT_FILE);
    if !script_path.is_file() {
        return Err(CoreError::MissingArtifact {
            unit: link.folder.clone(),
            artifact: "SQL script",
            path: script_path.display().to_string(),
        });
    }
    let sql = std::fs::read_to_string(&script_path).map_err(|e| CoreError::io(&script_path, e))?;

    Ok(MigrationUnit {
        statements: split_statements(&sql),
        hash: compute_checksum(&sql),
        breakpoints: header.breakpoints(),
        id: header.id,
        prev_id: header.prev_id,
        tag: link.folder.clone(),
        created_at_millis,
        sql,
    })
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod tests;
