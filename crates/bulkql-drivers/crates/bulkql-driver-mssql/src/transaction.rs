use crate::connection::{MSSQL_EXECUTE_PARAM_LIMIT, MssqlSession};
use async_trait::async_trait;
use bulkql_core::{
    Dialect, ParamBinding, PreparedStatement, QueryResult, Result, StatementResult,
    StatementScope, Transaction, Value,
};

const ROLLBACK_SQL: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION";

/// An open `BEGIN TRANSACTION` on a SQL Server session
///
/// Dropping it without a successful commit or rollback schedules a
/// rollback on the current runtime.
pub struct MssqlTransaction {
    session: MssqlSession,
    finished: bool,
}

impl MssqlTransaction {
    pub(crate) fn new(session: MssqlSession) -> Self {
        Self {
            session,
            finished: false,
        }
    }
}

#[async_trait]
impl StatementScope for MssqlTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn param_limit(&self) -> Option<usize> {
        Some(MSSQL_EXECUTE_PARAM_LIMIT)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.session.execute_values(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.session.query_values(sql, params).await
    }

    async fn prepare(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        self.session.prepare_statement(sql, bindings).await
    }
}

#[async_trait]
impl Transaction for MssqlTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.session.simple("COMMIT TRANSACTION").await?;
        self.finished = true;
        tracing::debug!("transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.session.simple(ROLLBACK_SQL).await?;
        self.finished = true;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for MssqlTransaction {
    fn drop(&mut self) {
        if self.finished || self.session.is_closed() {
            return;
        }
        tracing::warn!("transaction dropped while open, rolling back");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let session = self.session.clone();
            runtime.spawn(async move {
                if let Err(e) = session.simple(ROLLBACK_SQL).await {
                    tracing::error!(error = %e, "failed to roll back dropped transaction");
                }
            });
        }
    }
}
