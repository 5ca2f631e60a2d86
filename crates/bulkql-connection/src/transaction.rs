//! Scoped transactions
//!
//! `BEGIN`, run the caller's operations, then `COMMIT` on success or
//! `ROLLBACK` on failure.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bulkql_core::{
    BulkqlError, Connection, Dialect, ParamBinding, PreparedStatement, QueryResult, Result,
    StatementResult, StatementScope, Transaction, Value,
};
use tokio::sync::RwLock;

use crate::pool::ConnectionPool;

/// Statement scope bound to an open transaction
///
/// Handed to the operations passed to [`with_transaction`]. Clones share
/// one slot holding the transaction; once the operations return the slot is
/// emptied and every remaining clone fails with a `Query` error. A clone
/// still alive at that point makes the whole transaction roll back.
#[derive(Clone)]
pub struct TransactionScope {
    slot: Arc<RwLock<Option<Box<dyn Transaction>>>>,
    dialect: Dialect,
    param_limit: Option<usize>,
}

impl TransactionScope {
    fn new(transaction: Box<dyn Transaction>) -> Self {
        Self {
            dialect: transaction.dialect(),
            param_limit: transaction.param_limit(),
            slot: Arc::new(RwLock::new(Some(transaction))),
        }
    }

    /// Whether another clone of this scope is still alive
    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.slot) > 1
    }

    /// Take the transaction out, waiting for statements still in flight
    async fn finish(&self) -> Option<Box<dyn Transaction>> {
        self.slot.write().await.take()
    }
}

fn finished_error() -> BulkqlError {
    BulkqlError::Query("transaction already finished".into())
}

#[async_trait]
impl StatementScope for TransactionScope {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn param_limit(&self) -> Option<usize> {
        self.param_limit
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let slot = self.slot.read().await;
        let transaction = slot.as_ref().ok_or_else(finished_error)?;
        transaction.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let slot = self.slot.read().await;
        let transaction = slot.as_ref().ok_or_else(finished_error)?;
        transaction.query(sql, params).await
    }

    async fn prepare(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        let slot = self.slot.read().await;
        let transaction = slot.as_ref().ok_or_else(finished_error)?;
        transaction.prepare(sql, bindings).await
    }
}

/// Run `operations` inside a transaction on `conn`.
///
/// Commits when they return `Ok`. On `Err` the transaction is rolled back
/// and the error comes back as `TransactionFailed`; a failing rollback is
/// logged and does not replace the original error. Operations that keep a
/// clone of their scope past their return are treated as failed and rolled
/// back as well.
///
/// When the commit or rollback itself fails the state of the server-side
/// transaction is unknown, so `conn` is closed and a pool will not hand it
/// out again.
pub async fn with_transaction<T, F, Fut>(conn: &dyn Connection, operations: F) -> Result<T>
where
    F: FnOnce(TransactionScope) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let transaction = conn.begin_transaction().await?;
    tracing::debug!(driver = conn.driver_name(), "transaction started");

    let scope = TransactionScope::new(transaction);
    let outcome = operations(scope.clone()).await;
    let leaked = scope.is_shared();

    let Some(transaction) = scope.finish().await else {
        discard(conn).await;
        return Err(BulkqlError::transaction_failed(finished_error()));
    };

    let outcome = if leaked {
        tracing::error!("transaction scope still in use after its operations finished");
        outcome.and(Err(BulkqlError::Query(
            "transaction scope outlived its operations".into(),
        )))
    } else {
        outcome
    };

    match outcome {
        Ok(value) => match transaction.commit().await {
            Ok(()) => {
                tracing::debug!("transaction committed");
                Ok(value)
            }
            Err(e) => {
                tracing::error!(error = %e, "commit failed, discarding connection");
                discard(conn).await;
                Err(BulkqlError::transaction_failed(e))
            }
        },
        Err(cause) => {
            tracing::error!(error = %cause, "rolling back transaction");
            if let Err(e) = transaction.rollback().await {
                tracing::error!(error = %e, "rollback failed, discarding connection");
                discard(conn).await;
            }
            Err(BulkqlError::transaction_failed(cause))
        }
    }
}

/// Close a connection left in an unknown transaction state
async fn discard(conn: &dyn Connection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

impl ConnectionPool {
    /// Acquire a connection and run `operations` in a transaction on it.
    ///
    /// The connection goes back to the pool on every path.
    pub async fn transaction<T, F, Fut>(&self, operations: F) -> Result<T>
    where
        F: FnOnce(TransactionScope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let conn = self.get().await?;
        with_transaction(&*conn, operations).await
    }
}
