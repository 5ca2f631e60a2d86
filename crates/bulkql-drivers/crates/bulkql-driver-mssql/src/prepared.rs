//! Server-side prepared statements over `sp_prepare` / `sp_execute` / `sp_unprepare`

use crate::connection::MssqlSession;
use crate::types::value_to_param;
use async_trait::async_trait;
use bulkql_core::{BulkqlError, ParamMap, PreparedStatement, QueryResult, Result};

/// `EXEC sp_execute <handle>, @P1, ..., @Pn`
///
/// The handle is an integer issued by the server and is written into the
/// batch text; values are always bound.
pub(crate) fn execute_sql(handle: i32, param_count: usize) -> String {
    let mut sql = format!("EXEC sp_execute {}", handle);
    for position in 1..=param_count {
        sql.push_str(&format!(", @P{}", position));
    }
    sql
}

pub(crate) fn unprepare_sql(handle: i32) -> String {
    format!("EXEC sp_unprepare {}", handle)
}

/// A statement prepared on one TDS session
pub struct MssqlPrepared {
    session: MssqlSession,
    handle: i32,
    param_count: usize,
}

impl MssqlPrepared {
    pub(crate) fn new(session: MssqlSession, handle: i32, param_count: usize) -> Self {
        Self {
            session,
            handle,
            param_count,
        }
    }

    pub fn handle(&self) -> i32 {
        self.handle
    }
}

#[async_trait]
impl PreparedStatement for MssqlPrepared {
    async fn query(&self, params: &ParamMap) -> Result<Vec<QueryResult>> {
        if params.len() != self.param_count {
            return Err(BulkqlError::Query(format!(
                "statement was prepared for {} parameters, got {}",
                self.param_count,
                params.len()
            )));
        }

        let values = params
            .iter()
            .map(|param| value_to_param(&param.value, param.sql_type))
            .collect::<Result<Vec<_>>>()?;

        self.session
            .query_all(&execute_sql(self.handle, values.len()), &values)
            .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.session.simple(&unprepare_sql(self.handle)).await?;
        tracing::debug!(handle = self.handle, "statement unprepared");
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(handle = self.handle, "no runtime to unprepare abandoned statement");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = self.session.simple(&unprepare_sql(self.handle)).await {
                tracing::warn!(handle = self.handle, error = %e, "failed to unprepare abandoned statement");
            }
        });
    }
}
