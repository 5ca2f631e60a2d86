//! Connection, transaction and prepared statement traits
//!
//! Bulk operations only ever talk to a [`StatementScope`]. Both a
//! [`Connection`] and an open [`Transaction`] are statement scopes, so the
//! executor never needs to know which one it was handed.

use crate::{Dialect, ParamBinding, ParamMap, QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// Anything that can run statements against one database session.
#[async_trait]
pub trait StatementScope: Send + Sync {
    /// SQL dialect spoken by the underlying session
    fn dialect(&self) -> Dialect;

    /// Hard cap on values per prepared execution imposed by the driver's
    /// wire path, if tighter than the configured ceiling
    fn param_limit(&self) -> Option<usize> {
        None
    }

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Prepare `sql` on the server with one input binding per parameter.
    ///
    /// The returned statement is tied to this scope's session and must be
    /// closed before another statement is prepared on it.
    async fn prepare(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>>;
}

/// A database connection
#[async_trait]
pub trait Connection: StatementScope {
    /// Get the driver name (e.g., "mssql", "postgresql")
    fn driver_name(&self) -> &str;

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
///
/// Statements executed through the transaction's scope become visible to
/// other sessions only after [`Transaction::commit`].
#[async_trait]
pub trait Transaction: StatementScope {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A server-side prepared statement
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// Execute with concrete values, returning every result set the statement produced
    async fn query(&self, params: &ParamMap) -> Result<Vec<QueryResult>>;

    /// Release (unprepare) the statement on the server
    async fn close(self: Box<Self>) -> Result<()>;

    /// Release without awaiting.
    ///
    /// Called when the future driving the statement is dropped before
    /// `close` could run. Drivers that need a round trip to release should
    /// schedule it in the background.
    fn abandon(self: Box<Self>) {}
}
