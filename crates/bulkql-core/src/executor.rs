//! Prepared statement lifecycle for one batch
//!
//! allocate → register input types → prepare → execute → release. Release
//! always runs, including when execution fails; if the executing future is
//! dropped midway, [`PreparedGuard`] hands the statement to
//! [`PreparedStatement::abandon`] instead.

use crate::{
    BulkqlError, ParamBinding, ParamMap, PreparedStatement, QueryResult, RenderedStatement,
    Result, SqlType, StatementScope,
};
use std::time::Instant;

/// A prepared-statement request bound to a statement scope, collecting input bindings
pub struct PreparedRequest<'s, S: StatementScope + ?Sized> {
    scope: &'s S,
    bindings: Vec<ParamBinding>,
}

impl<'s, S: StatementScope + ?Sized> PreparedRequest<'s, S> {
    pub fn new(scope: &'s S) -> Self {
        Self {
            scope,
            bindings: Vec::new(),
        }
    }

    /// Register the declared type of one parameter
    pub fn input(mut self, key: impl Into<String>, sql_type: SqlType) -> Self {
        self.bindings.push(ParamBinding {
            key: key.into(),
            sql_type,
        });
        self
    }

    /// Register every parameter of `params` in positional order
    pub fn inputs(mut self, params: &ParamMap) -> Self {
        self.bindings.extend(params.bindings());
        self
    }

    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    /// Prepare `sql` on the scope's session.
    pub async fn prepare(self, sql: &str) -> Result<PreparedGuard> {
        let statement = self.scope.prepare(sql, &self.bindings).await?;
        Ok(PreparedGuard {
            statement: Some(statement),
        })
    }
}

/// Owns a prepared statement until it is released.
pub struct PreparedGuard {
    statement: Option<Box<dyn PreparedStatement>>,
}

impl PreparedGuard {
    /// Execute with concrete values
    pub async fn execute(&self, params: &ParamMap) -> Result<Vec<QueryResult>> {
        match &self.statement {
            Some(statement) => statement.query(params).await,
            None => Err(BulkqlError::Query(
                "prepared statement already released".to_string(),
            )),
        }
    }

    /// Unprepare on the server
    pub async fn release(mut self) -> Result<()> {
        match self.statement.take() {
            Some(statement) => statement.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for PreparedGuard {
    fn drop(&mut self) {
        if let Some(statement) = self.statement.take() {
            tracing::warn!("prepared statement dropped before release, abandoning");
            statement.abandon();
        }
    }
}

/// Prepare, execute and release `statement` on `scope`.
///
/// Prepare and execute failures surface as
/// [`BulkqlError::StatementExecutionFailed`] once the release has run. A
/// release failure after a failed execution is logged and the execution
/// error is returned.
pub async fn execute_prepared<S>(scope: &S, statement: &RenderedStatement) -> Result<Vec<QueryResult>>
where
    S: StatementScope + ?Sized,
{
    let start = Instant::now();

    let guard = PreparedRequest::new(scope)
        .inputs(&statement.params)
        .prepare(&statement.sql)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to prepare statement");
            BulkqlError::statement_failed(e)
        })?;

    let outcome = guard.execute(&statement.params).await;
    let released = guard.release().await;

    match (outcome, released) {
        (Ok(results), Ok(())) => {
            tracing::debug!(
                params = statement.params.len(),
                result_sets = results.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "prepared statement executed"
            );
            Ok(results)
        }
        (Ok(_), Err(release_error)) => {
            tracing::error!(error = %release_error, "failed to release prepared statement");
            Err(BulkqlError::statement_failed(release_error))
        }
        (Err(e), Ok(())) => {
            tracing::error!(error = %e, "prepared statement execution failed");
            Err(BulkqlError::statement_failed(e))
        }
        (Err(e), Err(release_error)) => {
            tracing::error!(error = %e, "prepared statement execution failed");
            tracing::warn!(error = %release_error, "failed to release prepared statement after error");
            Err(BulkqlError::statement_failed(e))
        }
    }
}
