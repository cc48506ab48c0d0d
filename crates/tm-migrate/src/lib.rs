//! tm-migrate - Migration engine for Tidemark
//!
//! Applies a resolved chain of migration units to a target database and
//! keeps the ledger of applied units, including upgrading a ledger written
//! under an older table or schema name.

pub mod dialect;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod legacy;

pub use dialect::{Dialect, LedgerDialect};
pub use engine::{apply, migrate, pending, ApplyContext, ApplyPhase, ApplyReport};
pub use error::{MigrateError, MigrateResult};
pub use ledger::{Ledger, LedgerEntry, ReconcileOutcome};
pub use legacy::LegacyLedgerCache;
