//! Error types for tm-migrate

use thiserror::Error;
use tm_core::CoreError;
use tm_db::DbError;

/// Migration engine errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// A statement of a unit failed while applying (M001)
    #[error("[M001] Migration '{unit}' failed at statement `{statement}`: {source}")]
    ApplyFailure {
        unit: String,
        statement: String,
        #[source]
        source: DbError,
    },

    /// Ledger table could not be created, read or written (M002)
    #[error("[M002] Migration ledger error: {0}")]
    Ledger(String),

    /// BEGIN/COMMIT/ROLLBACK failed (M003)
    #[error("[M003] Migration transaction failed: {0}")]
    Transaction(String),

    /// Unrecognized dialect name (M004)
    #[error("[M004] Unknown SQL dialect '{0}' (expected postgres, duckdb, sqlite or mysql)")]
    UnknownDialect(String),

    /// Reading migrations from disk failed (M005)
    #[error("[M005] {0}")]
    Core(#[from] CoreError),

    /// Driver error outside of a unit (M006)
    #[error("[M006] {0}")]
    Db(#[from] DbError),
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;
