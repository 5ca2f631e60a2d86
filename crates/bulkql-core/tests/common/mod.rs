//! Common test utilities and mocks

use async_trait::async_trait;
use bulkql_core::{
    BulkqlError, Dialect, ParamBinding, ParamMap, PreparedStatement, QueryResult, Result, Row,
    StatementResult, StatementScope, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Something the mock engine was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Prepare {
        sql: String,
        bindings: Vec<ParamBinding>,
    },
    Execute {
        params: ParamMap,
    },
    Release,
    Abandon,
}

#[derive(Default)]
struct EngineState {
    events: Vec<EngineEvent>,
    executions: usize,
    open_statements: usize,
    max_open_statements: usize,
    next_id: i64,
}

/// Statement scope backed by an in-memory log instead of a database.
///
/// Inserts with an output projection return one row per record with a
/// generated `id` plus the record's `row` index inside its batch. Updates
/// return one empty result set per statement.
#[derive(Clone)]
pub struct MockScope {
    dialect: Dialect,
    param_limit: Option<usize>,
    fail_on_execution: Option<usize>,
    fail_prepare: bool,
    fail_release: bool,
    state: Arc<Mutex<EngineState>>,
}

impl MockScope {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            param_limit: None,
            fail_on_execution: None,
            fail_prepare: false,
            fail_release: false,
            state: Arc::new(Mutex::new(EngineState {
                next_id: 1,
                ..Default::default()
            })),
        }
    }

    pub fn mssql() -> Self {
        Self::new(Dialect::Mssql)
    }

    pub fn with_param_limit(mut self, limit: usize) -> Self {
        self.param_limit = Some(limit);
        self
    }

    /// Fail the n-th execution (1-based)
    pub fn failing_on_execution(mut self, n: usize) -> Self {
        self.fail_on_execution = Some(n);
        self
    }

    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.state.lock().events.clone()
    }

    pub fn prepared_sql(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Prepare { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: fn(&EngineEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| matcher(e)).count()
    }

    pub fn prepares(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Prepare { .. }))
    }

    pub fn releases(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Release))
    }

    pub fn executions(&self) -> usize {
        self.state.lock().executions
    }

    pub fn max_open_statements(&self) -> usize {
        self.state.lock().max_open_statements
    }
}

#[async_trait]
impl StatementScope for MockScope {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn param_limit(&self) -> Option<usize> {
        self.param_limit
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult { affected_rows: 0 })
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn prepare(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        let mut state = self.state.lock();
        state.events.push(EngineEvent::Prepare {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        if self.fail_prepare {
            return Err(BulkqlError::Driver("Incorrect syntax near 'VALUES'".into()));
        }
        state.open_statements += 1;
        state.max_open_statements = state.max_open_statements.max(state.open_statements);
        drop(state);

        Ok(Box::new(MockPrepared {
            sql: sql.to_string(),
            fail_on_execution: self.fail_on_execution,
            fail_release: self.fail_release,
            state: self.state.clone(),
        }))
    }
}

struct MockPrepared {
    sql: String,
    fail_on_execution: Option<usize>,
    fail_release: bool,
    state: Arc<Mutex<EngineState>>,
}

#[async_trait]
impl PreparedStatement for MockPrepared {
    async fn query(&self, params: &ParamMap) -> Result<Vec<QueryResult>> {
        let mut state = self.state.lock();
        state.executions += 1;
        state.events.push(EngineEvent::Execute {
            params: params.clone(),
        });
        if self.fail_on_execution == Some(state.executions) {
            return Err(BulkqlError::Driver("deadlock victim".into()));
        }

        if self.sql.starts_with("UPDATE") {
            let statements = self.sql.matches("UPDATE ").count();
            return Ok((0..statements)
                .map(|_| QueryResult {
                    affected_rows: 1,
                    ..QueryResult::empty()
                })
                .collect());
        }

        if !(self.sql.contains(" OUTPUT ") || self.sql.contains(" RETURNING ")) {
            return Ok(vec![QueryResult::empty()]);
        }

        let mut record_rows: Vec<usize> = params.iter().map(|p| p.row).collect();
        record_rows.dedup();

        let rows = record_rows
            .into_iter()
            .map(|row| {
                let id = state.next_id;
                state.next_id += 1;
                Row::new(
                    vec!["id".into(), "row".into()],
                    vec![Value::Int64(id), Value::Int64(row as i64)],
                )
            })
            .collect();
        Ok(vec![QueryResult::from_rows(rows)])
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock();
        state.events.push(EngineEvent::Release);
        state.open_statements -= 1;
        if self.fail_release {
            return Err(BulkqlError::Connection("connection reset".into()));
        }
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        let mut state = self.state.lock();
        state.events.push(EngineEvent::Abandon);
        state.open_statements -= 1;
    }
}
