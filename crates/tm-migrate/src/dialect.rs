//! SQL dialect strategies for the ledger table.
//!
//! The four supported engines differ in how a table's existence and columns
//! are probed, how the auto-increment key is declared, whether schema
//! namespaces exist, and whether DDL can be rolled back. Each engine is one
//! [`LedgerDialect`] implementation; everything else talks to the trait.

use crate::error::MigrateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tm_core::LedgerLocation;
use tm_db::{Database, DbResult, Row};

/// Supported target engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// DuckDB
    DuckDb,
    /// SQLite
    Sqlite,
    /// MySQL / MariaDB
    MySql,
}

impl Dialect {
    /// The strategy implementing this dialect.
    pub fn strategy(self) -> &'static dyn LedgerDialect {
        match self {
            Dialect::Postgres => &PostgresDialect,
            Dialect::DuckDb => &DuckDbDialect,
            Dialect::Sqlite => &SqliteDialect,
            Dialect::MySql => &MySqlDialect,
        }
    }

    /// Dialect matching a [`Database::db_type`] identifier.
    pub fn from_db_type(db_type: &str) -> Option<Self> {
        db_type.parse().ok()
    }

    pub fn name(self) -> &'static str {
        self.strategy().name()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "duckdb" => Ok(Dialect::DuckDb),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            _ => Err(MigrateError::UnknownDialect(s.to_string())),
        }
    }
}

/// Dialect-specific SQL and probes for the ledger table.
///
/// Implementors only supply the statements that differ between engines;
/// the probes themselves are provided on top of them.
#[async_trait]
pub trait LedgerDialect: Send + Sync {
    /// Dialect name
    fn name(&self) -> &'static str;

    /// Whether tables live in schema namespaces
    fn supports_schemas(&self) -> bool;

    /// Whether DDL statements take part in transactions
    fn supports_ddl_transactions(&self) -> bool;

    /// Schema a table lands in when none is given
    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    /// Quote an identifier for this dialect
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal for this dialect
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Query with one `n` column that is non-zero when the table exists
    fn table_exists_sql(&self, location: &LedgerLocation) -> String;

    /// Query with one `n` column that is non-zero when the column exists
    fn has_column_sql(&self, location: &LedgerLocation, column: &str) -> String;

    /// Statements creating the ledger table if it is missing
    fn create_ledger_table_sql(&self, location: &LedgerLocation) -> Vec<String>;

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Schema a location resolves to, `None` for dialects without namespaces.
    fn effective_schema<'a>(&self, location: &'a LedgerLocation) -> Option<&'a str> {
        if !self.supports_schemas() {
            return None;
        }
        location.schema.as_deref().or(self.default_schema())
    }

    /// Fully qualified, quoted table name.
    ///
    /// A location without a schema is qualified with the dialect default,
    /// so it names the same table the existence probes look at.
    fn qualified(&self, location: &LedgerLocation) -> String {
        match self.effective_schema(location) {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&location.table)
            ),
            None => self.quote_ident(&location.table),
        }
    }

    fn row_count_sql(&self, location: &LedgerLocation) -> String {
        format!("SELECT COUNT(*) AS n FROM {}", self.qualified(location))
    }

    fn create_schema_sql(&self, schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote_ident(schema))
    }

    /// Bulk copy of every legacy row, in `created_at` order.
    ///
    /// Without a `tag` column in the source, NULL is copied in its place.
    fn copy_rows_sql(&self, new: &LedgerLocation, old: &LedgerLocation, has_tag: bool) -> String {
        let tag = if has_tag { "tag" } else { "NULL" };
        format!(
            "INSERT INTO {} (hash, created_at, tag) SELECT hash, created_at, {} FROM {} ORDER BY created_at",
            self.qualified(new),
            tag,
            self.qualified(old)
        )
    }

    async fn table_exists(&self, db: &dyn Database, location: &LedgerLocation) -> DbResult<bool> {
        let rows = db.query_rows(&self.table_exists_sql(location)).await?;
        Ok(count(&rows) > 0)
    }

    async fn row_count(&self, db: &dyn Database, location: &LedgerLocation) -> DbResult<i64> {
        let rows = db.query_rows(&self.row_count_sql(location)).await?;
        Ok(count(&rows))
    }

    async fn has_column(
        &self,
        db: &dyn Database,
        location: &LedgerLocation,
        column: &str,
    ) -> DbResult<bool> {
        let rows = db.query_rows(&self.has_column_sql(location, column)).await?;
        Ok(count(&rows) > 0)
    }

    /// Create the location's schema; a no-op without namespaces or schema.
    async fn create_schema(&self, db: &dyn Database, location: &LedgerLocation) -> DbResult<()> {
        match (self.supports_schemas(), location.schema.as_deref()) {
            (true, Some(schema)) => db.execute_batch(&self.create_schema_sql(schema)).await,
            _ => Ok(()),
        }
    }

    async fn create_ledger_table(
        &self,
        db: &dyn Database,
        location: &LedgerLocation,
    ) -> DbResult<()> {
        for sql in self.create_ledger_table_sql(location) {
            db.execute_batch(&sql).await?;
        }
        Ok(())
    }

    async fn copy_rows(
        &self,
        db: &dyn Database,
        new: &LedgerLocation,
        old: &LedgerLocation,
        has_tag: bool,
    ) -> DbResult<usize> {
        db.execute(&self.copy_rows_sql(new, old, has_tag)).await
    }
}

/// First column of the first row as an integer, 0 when absent.
fn count(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|r| r.get_index(0))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

/// `information_schema.tables` probe shared by the schema-aware dialects.
fn information_schema_table_sql(dialect: &dyn LedgerDialect, location: &LedgerLocation) -> String {
    let schema = dialect.effective_schema(location).unwrap_or_default();
    format!(
        "SELECT COUNT(*) AS n FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
        dialect.quote_literal(schema),
        dialect.quote_literal(&location.table)
    )
}

fn information_schema_column_sql(
    dialect: &dyn LedgerDialect,
    location: &LedgerLocation,
    column: &str,
) -> String {
    let schema = dialect.effective_schema(location).unwrap_or_default();
    format!(
        "SELECT COUNT(*) AS n FROM information_schema.columns WHERE table_schema = {} AND table_name = {} AND column_name = {}",
        dialect.quote_literal(schema),
        dialect.quote_literal(&location.table),
        dialect.quote_literal(column)
    )
}

/// PostgreSQL: schemas, transactional DDL, `SERIAL` key
pub struct PostgresDialect;

#[async_trait]
impl LedgerDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn supports_schemas(&self) -> bool {
        true
    }

    fn supports_ddl_transactions(&self) -> bool {
        true
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("public")
    }

    fn table_exists_sql(&self, location: &LedgerLocation) -> String {
        information_schema_table_sql(self, location)
    }

    fn has_column_sql(&self, location: &LedgerLocation, column: &str) -> String {
        information_schema_column_sql(self, location, column)
    }

    fn create_ledger_table_sql(&self, location: &LedgerLocation) -> Vec<String> {
        vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (id SERIAL PRIMARY KEY, hash text NOT NULL, created_at bigint, tag text)",
            self.qualified(location)
        )]
    }
}

/// DuckDB: schemas, transactional DDL, sequence-backed key
pub struct DuckDbDialect;

impl DuckDbDialect {
    /// Sequence feeding the ledger's `id` column, as `(quoted, bare)` names.
    ///
    /// `nextval` takes the bare dotted name inside a string literal.
    fn sequence_names(&self, location: &LedgerLocation) -> (String, String) {
        let seq = format!("{}_id_seq", location.table);
        match self.effective_schema(location) {
            Some(schema) => (
                format!("{}.{}", self.quote_ident(schema), self.quote_ident(&seq)),
                format!("{schema}.{seq}"),
            ),
            None => (self.quote_ident(&seq), seq),
        }
    }
}

#[async_trait]
impl LedgerDialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn supports_schemas(&self) -> bool {
        true
    }

    fn supports_ddl_transactions(&self) -> bool {
        true
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("main")
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn table_exists_sql(&self, location: &LedgerLocation) -> String {
        information_schema_table_sql(self, location)
    }

    fn has_column_sql(&self, location: &LedgerLocation, column: &str) -> String {
        information_schema_column_sql(self, location, column)
    }

    fn create_ledger_table_sql(&self, location: &LedgerLocation) -> Vec<String> {
        let (quoted, bare) = self.sequence_names(location);
        vec![
            format!("CREATE SEQUENCE IF NOT EXISTS {quoted}"),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (id BIGINT PRIMARY KEY DEFAULT nextval({}), hash VARCHAR NOT NULL, created_at BIGINT, tag VARCHAR)",
                self.qualified(location),
                self.quote_literal(&bare)
            ),
        ]
    }
}

/// SQLite: no schemas, transactional DDL, `AUTOINCREMENT` key
pub struct SqliteDialect;

#[async_trait]
impl LedgerDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    fn supports_ddl_transactions(&self) -> bool {
        true
    }

    fn table_exists_sql(&self, location: &LedgerLocation) -> String {
        format!(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = {}",
            self.quote_literal(&location.table)
        )
    }

    fn has_column_sql(&self, location: &LedgerLocation, column: &str) -> String {
        format!(
            "SELECT COUNT(*) AS n FROM pragma_table_info({}) WHERE name = {}",
            self.quote_literal(&location.table),
            self.quote_literal(column)
        )
    }

    fn create_ledger_table_sql(&self, location: &LedgerLocation) -> Vec<String> {
        vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, hash text NOT NULL, created_at numeric, tag text)",
            self.qualified(location)
        )]
    }
}

/// MySQL: no schemas (a schema is a database), DDL commits implicitly
pub struct MySqlDialect;

#[async_trait]
impl LedgerDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    fn supports_ddl_transactions(&self) -> bool {
        false
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn table_exists_sql(&self, location: &LedgerLocation) -> String {
        format!(
            "SELECT COUNT(*) AS n FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = {}",
            self.quote_literal(&location.table)
        )
    }

    fn has_column_sql(&self, location: &LedgerLocation, column: &str) -> String {
        format!(
            "SELECT COUNT(*) AS n FROM information_schema.columns WHERE table_schema = DATABASE() AND table_name = {} AND column_name = {}",
            self.quote_literal(&location.table),
            self.quote_literal(column)
        )
    }

    fn create_ledger_table_sql(&self, location: &LedgerLocation) -> Vec<String> {
        vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (id SERIAL PRIMARY KEY, hash text NOT NULL, created_at bigint, tag text)",
            self.qualified(location)
        )]
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;
