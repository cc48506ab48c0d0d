//! Migration application engine.
//!
//! Applies the units of a resolved chain that are newer than the ledger's
//! high-water mark, the largest `created_at` recorded so far. Applicability
//! is decided by position, not presence: a unit whose timestamp is at or
//! below the mark is never applied, even if the ledger has no row for it.
//!
//! A run moves through [`ApplyPhase`]s:
//!
//! ```text
//! Idle -> LedgerEnsured -> DeltaComputed -> Applying -> Done
//! ```

use crate::dialect::{Dialect, LedgerDialect};
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{Ledger, ReconcileOutcome};
use crate::legacy::LegacyLedgerCache;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tm_core::{load_ordered, MigrateConfig, MigrationUnit, TransactionScope};
use tm_db::Database;

/// Everything a run needs besides the database and the units
#[derive(Debug)]
pub struct ApplyContext {
    pub dialect: Dialect,
    pub config: MigrateConfig,
    pub legacy: LegacyLedgerCache,
}

impl ApplyContext {
    pub fn new(dialect: Dialect, config: MigrateConfig) -> Self {
        Self {
            dialect,
            config,
            legacy: LegacyLedgerCache::new(),
        }
    }

    /// Context whose dialect matches the given backend.
    pub fn for_database(db: &dyn Database, config: MigrateConfig) -> MigrateResult<Self> {
        let dialect: Dialect = db.db_type().parse()?;
        Ok(Self::new(dialect, config))
    }

    /// The ledger this context records into.
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.dialect, self.config.ledger.clone())
    }
}

/// Stage of an apply run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPhase {
    Idle,
    LedgerEnsured,
    DeltaComputed,
    Applying,
    Done,
}

/// Outcome of an apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Tags of the units applied, in order
    pub applied: Vec<String>,

    /// Units at or below the high-water mark
    pub skipped: usize,

    /// High-water mark before the run
    pub high_water_mark: Option<i64>,

    /// Result of the legacy ledger check, when one is configured
    pub legacy: Option<ReconcileOutcome>,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Load the chain under `dir` and apply it.
pub async fn migrate(
    db: &dyn Database,
    dir: &Path,
    ctx: &ApplyContext,
) -> MigrateResult<ApplyReport> {
    let units = load_ordered(dir)?;
    apply(db, &units, ctx).await
}

/// Apply every unit newer than the ledger's high-water mark, in order.
///
/// Each unit's statements run one at a time when it has breakpoints and as a
/// single batch otherwise; one ledger row is appended per unit. The first
/// failing statement aborts the run. Dialects with transactional DDL roll
/// the failing unit (or, with [`TransactionScope::Run`], the whole run) back;
/// on the others, statements that already ran stay applied.
pub async fn apply(
    db: &dyn Database,
    units: &[MigrationUnit],
    ctx: &ApplyContext,
) -> MigrateResult<ApplyReport> {
    let strategy = ctx.dialect.strategy();
    let ledger = ctx.ledger();
    let mut phase = ApplyPhase::Idle;
    let mut report = ApplyReport::default();

    if let Some(legacy) = ctx.legacy.resolve_from_config(&ctx.config) {
        report.legacy = Some(ledger.reconcile_legacy_ledger(db, &legacy).await?);
    }
    ledger.ensure(db).await?;
    advance(&mut phase, ApplyPhase::LedgerEnsured);

    let high_water_mark = ledger.high_water_mark(db).await?;
    let (below, pending) = split_at_mark(units, high_water_mark);
    report.high_water_mark = high_water_mark;
    report.skipped = below.len();
    if !below.is_empty() {
        warn_unrecorded(db, &ledger, &below).await;
    }
    advance(&mut phase, ApplyPhase::DeltaComputed);

    if pending.is_empty() {
        log::info!("No pending migrations ({} already applied)", report.skipped);
        advance(&mut phase, ApplyPhase::Done);
        return Ok(report);
    }

    if !strategy.supports_ddl_transactions() {
        log::warn!(
            "{} does not support transactional DDL: a failing migration cannot be rolled back \
             and may leave earlier statements of that migration applied",
            strategy.name()
        );
    }

    advance(&mut phase, ApplyPhase::Applying);
    log::info!("Applying {} migration(s)", pending.len());

    match ctx.config.transaction {
        TransactionScope::PerUnit => {
            for unit in pending {
                begin(db, strategy).await?;
                if let Err(e) = run_unit(db, &ledger, unit).await {
                    rollback(db, strategy).await;
                    return Err(e);
                }
                commit(db, strategy).await?;
                log::info!("Applied migration {}", unit.tag);
                report.applied.push(unit.tag.clone());
            }
        }
        TransactionScope::Run => {
            begin(db, strategy).await?;
            let mut applied = Vec::with_capacity(pending.len());
            for unit in pending {
                if let Err(e) = run_unit(db, &ledger, unit).await {
                    rollback(db, strategy).await;
                    return Err(e);
                }
                applied.push(unit.tag.clone());
            }
            commit(db, strategy).await?;
            for tag in &applied {
                log::info!("Applied migration {}", tag);
            }
            report.applied = applied;
        }
    }

    advance(&mut phase, ApplyPhase::Done);
    Ok(report)
}

/// The units `apply` would run now, without touching the database.
///
/// Follows the same rule as the legacy copy in `apply`: while the ledger is
/// missing or empty, the mark is taken from the legacy ledger, if one is
/// configured and has rows.
pub async fn pending<'a>(
    db: &dyn Database,
    units: &'a [MigrationUnit],
    ctx: &ApplyContext,
) -> MigrateResult<Vec<&'a MigrationUnit>> {
    let ledger = ctx.ledger();

    let mut source = None;
    if ledger.is_populated(db).await {
        source = Some(ledger);
    } else if let Some(legacy) = ctx.legacy.resolve_from_config(&ctx.config) {
        let legacy = Ledger::new(ctx.dialect, legacy);
        if legacy.is_populated(db).await {
            source = Some(legacy);
        }
    }

    let high_water_mark = match source {
        Some(ledger) => ledger.high_water_mark(db).await?,
        None => None,
    };
    Ok(split_at_mark(units, high_water_mark).1)
}

/// Split units into those at or below the mark and those beyond it.
fn split_at_mark(
    units: &[MigrationUnit],
    high_water_mark: Option<i64>,
) -> (Vec<&MigrationUnit>, Vec<&MigrationUnit>) {
    units
        .iter()
        .partition(|u| high_water_mark.is_some_and(|mark| u.created_at_millis <= mark))
}

/// Warn about units that the mark hides although the ledger never saw them.
async fn warn_unrecorded(db: &dyn Database, ledger: &Ledger, below: &[&MigrationUnit]) {
    let entries = match ledger.entries(db).await {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Could not read ledger entries: {e}");
            return;
        }
    };
    let recorded: HashSet<i64> = entries.iter().map(|e| e.created_at).collect();
    for unit in below {
        if !recorded.contains(&unit.created_at_millis) {
            log::warn!(
                "Migration {} is older than the latest applied migration and will not be applied",
                unit.tag
            );
        }
    }
}

fn advance(phase: &mut ApplyPhase, next: ApplyPhase) {
    log::debug!("Apply phase: {:?} -> {:?}", phase, next);
    *phase = next;
}

/// Execute one unit and record it.
async fn run_unit(db: &dyn Database, ledger: &Ledger, unit: &MigrationUnit) -> MigrateResult<()> {
    execute_unit(db, unit).await?;
    ledger.record(db, unit).await
}

async fn execute_unit(db: &dyn Database, unit: &MigrationUnit) -> MigrateResult<()> {
    if unit.statements.is_empty() {
        log::debug!("Migration {} has no statements", unit.tag);
        return Ok(());
    }

    let failure = |statement: &str, source| MigrateError::ApplyFailure {
        unit: unit.tag.clone(),
        statement: statement.to_string(),
        source,
    };

    if unit.breakpoints {
        for statement in &unit.statements {
            db.execute_batch(statement)
                .await
                .map_err(|e| failure(statement, e))?;
        }
    } else {
        // Breakpoint markers are SQL comments, so the raw script runs as-is
        let script = unit.sql.trim();
        db.execute_batch(script)
            .await
            .map_err(|e| failure(script, e))?;
    }
    Ok(())
}

async fn begin(db: &dyn Database, strategy: &dyn LedgerDialect) -> MigrateResult<()> {
    db.execute_batch(strategy.begin_sql())
        .await
        .map_err(|e| MigrateError::Transaction(format!("BEGIN failed: {e}")))
}

async fn commit(db: &dyn Database, strategy: &dyn LedgerDialect) -> MigrateResult<()> {
    if let Err(e) = db.execute_batch(strategy.commit_sql()).await {
        rollback(db, strategy).await;
        return Err(MigrateError::Transaction(format!("COMMIT failed: {e}")));
    }
    Ok(())
}

async fn rollback(db: &dyn Database, strategy: &dyn LedgerDialect) {
    if let Err(e) = db.execute_batch(strategy.rollback_sql()).await {
        log::warn!("ROLLBACK failed: {e}");
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
