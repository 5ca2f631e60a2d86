//! Prepared statements on a PostgreSQL session

use crate::connection::PgSession;
use async_trait::async_trait;
use bulkql_core::{BulkqlError, ParamMap, PreparedStatement, QueryResult, Result};
use tokio_postgres::Statement;

/// A statement prepared with its parameter types declared up front
///
/// Dropping the last handle to the statement makes the client send a
/// `Close` message, so releasing it never needs a round trip of its own.
pub struct PgPrepared {
    session: PgSession,
    statement: Statement,
}

impl PgPrepared {
    pub(crate) fn new(session: PgSession, statement: Statement) -> Self {
        Self { session, statement }
    }

    pub fn param_count(&self) -> usize {
        self.statement.params().len()
    }
}

#[async_trait]
impl PreparedStatement for PgPrepared {
    async fn query(&self, params: &ParamMap) -> Result<Vec<QueryResult>> {
        if params.len() != self.param_count() {
            return Err(BulkqlError::Query(format!(
                "statement was prepared for {} parameters, got {}",
                self.param_count(),
                params.len()
            )));
        }

        let result = self
            .session
            .query_statement(&self.statement, &params.values())
            .await?;
        Ok(vec![result])
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if self.session.is_closed() {
            return Err(BulkqlError::Connection(
                "Connection closed before statement was released".into(),
            ));
        }
        tracing::debug!(params = self.param_count(), "statement released");
        Ok(())
    }
}
