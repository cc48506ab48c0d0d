//! Database trait definition

use crate::error::DbResult;
use crate::row::Row;
use async_trait::async_trait;

/// The driver boundary Tidemark needs: run raw SQL and read rows back.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a single statement, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute one or more statements in a single call
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Run a query and collect every row
    async fn query_rows(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
