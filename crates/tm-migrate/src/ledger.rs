//! Bookkeeping table manager.
//!
//! The ledger records one row per applied unit: `hash`, `created_at` (the
//! unit's timestamp, used as the high-water mark) and `tag` (the folder name,
//! for operators only). Rows are only ever appended.

use crate::dialect::{Dialect, LedgerDialect};
use crate::error::{MigrateError, MigrateResult};
use serde::Serialize;
use tm_core::{LedgerLocation, MigrationUnit};
use tm_db::Database;

/// One applied unit as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub hash: String,
    pub created_at: i64,
    pub tag: Option<String>,
}

/// What [`Ledger::reconcile_legacy_ledger`] found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    /// Old and new location are the same table
    SameTable,
    /// The new ledger already has rows
    AlreadyPopulated,
    /// No legacy table to copy from
    NoLegacyTable,
    /// The legacy table exists but is empty
    LegacyEmpty,
    /// Legacy rows were copied into the new ledger
    Copied { rows: usize, tag_column: bool },
}

/// The applied-units table of one target database
#[derive(Debug, Clone)]
pub struct Ledger {
    dialect: Dialect,
    location: LedgerLocation,
}

impl Ledger {
    pub fn new(dialect: Dialect, location: LedgerLocation) -> Self {
        Self { dialect, location }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn location(&self) -> &LedgerLocation {
        &self.location
    }

    fn strategy(&self) -> &'static dyn LedgerDialect {
        self.dialect.strategy()
    }

    /// Quoted, qualified table name.
    pub fn table_name(&self) -> String {
        self.strategy().qualified(&self.location)
    }

    /// Create the schema (where supported) and the ledger table if missing.
    pub async fn ensure(&self, db: &dyn Database) -> MigrateResult<()> {
        let strategy = self.strategy();
        strategy
            .create_schema(db, &self.location)
            .await
            .map_err(|e| MigrateError::Ledger(format!("failed to create schema: {e}")))?;
        strategy
            .create_ledger_table(db, &self.location)
            .await
            .map_err(|e| {
                MigrateError::Ledger(format!(
                    "failed to create ledger table {}: {e}",
                    self.table_name()
                ))
            })?;
        Ok(())
    }

    /// The most recent `created_at` recorded, or `None` for an empty ledger.
    pub async fn high_water_mark(&self, db: &dyn Database) -> MigrateResult<Option<i64>> {
        let sql = format!("SELECT MAX(created_at) AS hwm FROM {}", self.table_name());
        let rows = db
            .query_rows(&sql)
            .await
            .map_err(|e| MigrateError::Ledger(format!("failed to read high-water mark: {e}")))?;
        Ok(rows.first().and_then(|r| r.get_i64("hwm")))
    }

    /// Every recorded entry, oldest first.
    pub async fn entries(&self, db: &dyn Database) -> MigrateResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT id, hash, created_at, tag FROM {} ORDER BY id",
            self.table_name()
        );
        let rows = db
            .query_rows(&sql)
            .await
            .map_err(|e| MigrateError::Ledger(format!("failed to read ledger: {e}")))?;

        rows.iter()
            .map(|row| {
                let id = row.get_i64("id");
                let hash = row.get_str("hash");
                let created_at = row.get_i64("created_at");
                match (id, hash, created_at) {
                    (Some(id), Some(hash), Some(created_at)) => Ok(LedgerEntry {
                        id,
                        hash: hash.to_string(),
                        created_at,
                        tag: row.get_str("tag").map(str::to_string),
                    }),
                    _ => Err(MigrateError::Ledger(format!(
                        "unexpected row in {}: {:?}",
                        self.table_name(),
                        row.values()
                    ))),
                }
            })
            .collect()
    }

    /// Append the row for a successfully applied unit.
    pub async fn record(&self, db: &dyn Database, unit: &MigrationUnit) -> MigrateResult<()> {
        let strategy = self.strategy();
        let sql = format!(
            "INSERT INTO {} (hash, created_at, tag) VALUES ({}, {}, {})",
            self.table_name(),
            strategy.quote_literal(&unit.hash),
            unit.created_at_millis,
            strategy.quote_literal(&unit.tag)
        );
        db.execute(&sql).await.map_err(|e| {
            MigrateError::Ledger(format!("failed to record migration {}: {e}", unit.tag))
        })?;
        Ok(())
    }

    /// Copy a ledger written under an older table/schema name into this one.
    ///
    /// Safe to call on every run. A populated new ledger always wins, and a
    /// missing or empty legacy table leaves the database untouched. The
    /// legacy table is never modified. Probe failures count as "missing" or
    /// "empty"; only the copy itself can fail.
    pub async fn reconcile_legacy_ledger(
        &self,
        db: &dyn Database,
        legacy: &LedgerLocation,
    ) -> MigrateResult<ReconcileOutcome> {
        let strategy = self.strategy();
        if strategy.qualified(legacy) == self.table_name() {
            return Ok(ReconcileOutcome::SameTable);
        }

        if self.is_populated(db).await {
            log::debug!("Ledger {} already populated", self.table_name());
            return Ok(ReconcileOutcome::AlreadyPopulated);
        }

        if !self.probe_exists(db, legacy).await {
            return Ok(ReconcileOutcome::NoLegacyTable);
        }

        let legacy_rows = self.probe_row_count(db, legacy).await;
        if legacy_rows == 0 {
            return Ok(ReconcileOutcome::LegacyEmpty);
        }

        self.ensure(db).await?;

        let tag_column = match strategy.has_column(db, legacy, "tag").await {
            Ok(found) => found,
            Err(e) => {
                log::debug!("Column probe on {} failed: {e}", strategy.qualified(legacy));
                false
            }
        };
        let rows = strategy
            .copy_rows(db, &self.location, legacy, tag_column)
            .await
            .map_err(|e| {
                MigrateError::Ledger(format!(
                    "failed to copy legacy ledger {} into {}: {e}",
                    strategy.qualified(legacy),
                    self.table_name()
                ))
            })?;

        log::info!(
            "Copied {} row(s) from legacy ledger {} into {}{}",
            rows,
            strategy.qualified(legacy),
            self.table_name(),
            if tag_column { "" } else { " (no tag column)" }
        );
        Ok(ReconcileOutcome::Copied { rows, tag_column })
    }

    /// Whether the table exists and holds at least one row. Probe failures
    /// count as "no".
    pub async fn is_populated(&self, db: &dyn Database) -> bool {
        self.probe_exists(db, &self.location).await
            && self.probe_row_count(db, &self.location).await > 0
    }

    async fn probe_exists(&self, db: &dyn Database, location: &LedgerLocation) -> bool {
        let strategy = self.strategy();
        match strategy.table_exists(db, location).await {
            Ok(exists) => exists,
            Err(e) => {
                log::debug!("Existence probe on {} failed: {e}", strategy.qualified(location));
                false
            }
        }
    }

    async fn probe_row_count(&self, db: &dyn Database, location: &LedgerLocation) -> i64 {
        let strategy = self.strategy();
        match strategy.row_count(db, location).await {
            Ok(n) => n,
            Err(e) => {
                log::debug!("Row count probe on {} failed: {e}", strategy.qualified(location));
                0
            }
        }
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
