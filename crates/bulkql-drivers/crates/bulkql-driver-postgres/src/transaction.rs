use crate::connection::PgSession;
use async_trait::async_trait;
use bulkql_core::{
    Dialect, ParamBinding, PreparedStatement, QueryResult, Result, StatementResult,
    StatementScope, Transaction, Value,
};

/// PostgreSQL transaction wrapper
///
/// Statements run on the session that issued `BEGIN`. Dropping the
/// transaction before a `COMMIT` or `ROLLBACK` succeeds schedules a
/// `ROLLBACK`.
pub struct PostgresTransaction {
    session: PgSession,
    finished: bool,
}

impl PostgresTransaction {
    pub(crate) fn new(session: PgSession) -> Self {
        Self {
            session,
            finished: false,
        }
    }
}

#[async_trait]
impl StatementScope for PostgresTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.session.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.session.query(sql, params).await
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
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.session.simple("COMMIT").await?;
        self.finished = true;
        tracing::debug!("PostgreSQL transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.session.simple("ROLLBACK").await?;
        self.finished = true;
        tracing::debug!("PostgreSQL transaction rolled back");
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.finished || self.session.is_closed() {
            return;
        }
        tracing::warn!("PostgreSQL transaction dropped without commit or rollback, rolling back");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let session = self.session.clone();
            runtime.spawn(async move {
                if let Err(e) = session.simple("ROLLBACK").await {
                    tracing::error!(error = %e, "failed to roll back dropped transaction");
                }
            });
        }
    }
}
