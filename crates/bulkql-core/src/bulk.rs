//! Batched bulk insert and update
//!
//! Each call validates identifiers and record shapes up front, splits the
//! records into batches that fit the parameter ceiling and runs the batches
//! one after another on the supplied scope. Results come back flattened in
//! batch order. A failing batch aborts the call; batches that already ran
//! stay applied unless the scope is a transaction that the caller rolls back.

use std::collections::HashSet;

use crate::{
    BatchPlan, BulkConfig, BulkqlError, ColumnSpec, QueryResult, Record, Result, Row, SqlType,
    StatementScope, ensure_identifiers, execute_prepared, render_insert, render_update,
};

/// A bulk insert: target table, column types, output projection and records
#[derive(Debug, Clone)]
pub struct InsertRequest {
    table: String,
    columns: Vec<ColumnSpec>,
    output: Vec<String>,
    records: Vec<Record>,
}

impl InsertRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            output: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Declare an inserted column and its type
    pub fn column(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.columns.push(ColumnSpec::new(name, sql_type));
        self
    }

    /// Project a column of each inserted row back to the caller
    pub fn output(mut self, column: impl Into<String>) -> Self {
        self.output.push(column.into());
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn output_columns(&self) -> &[String] {
        &self.output
    }

    pub fn records_ref(&self) -> &[Record] {
        &self.records
    }
}

/// A bulk update: one `UPDATE` per record, keyed by the conditional columns
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    table: String,
    columns: Vec<ColumnSpec>,
    records: Vec<Record>,
    allow_unconditional: bool,
}

impl UpdateRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            records: Vec::new(),
            allow_unconditional: false,
        }
    }

    /// Column assigned in the SET clause
    pub fn set(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.columns.push(ColumnSpec::new(name, sql_type));
        self
    }

    /// Column assigned through a custom expression around its placeholder
    pub fn set_with<F>(mut self, name: impl Into<String>, sql_type: SqlType, expression: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.columns
            .push(ColumnSpec::new(name, sql_type).with_expression(expression));
        self
    }

    /// Column matched in the WHERE clause
    pub fn condition(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.columns
            .push(ColumnSpec::new(name, sql_type).conditional());
        self
    }

    /// Add a fully specified column
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Permit updates without a WHERE clause, which rewrite every row of the table
    pub fn allow_unconditional(mut self) -> Self {
        self.allow_unconditional = true;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn records_ref(&self) -> &[Record] {
        &self.records
    }
}

/// Configured ceiling, lowered to the scope's own limit when that is tighter.
fn effective_ceiling<S: StatementScope + ?Sized>(scope: &S, config: &BulkConfig) -> usize {
    match scope.param_limit() {
        Some(limit) if limit < config.param_ceiling => {
            tracing::debug!(
                configured = config.param_ceiling,
                limit,
                "clamping parameter ceiling to driver limit"
            );
            limit
        }
        _ => config.param_ceiling,
    }
}

/// Column names must be unique ignoring ASCII case; unquoted identifiers
/// fold case on both engines.
fn check_unique_columns(columns: &[ColumnSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if !seen.insert(column.name().to_ascii_lowercase()) {
            return Err(BulkqlError::DuplicateColumn(column.name().to_string()));
        }
    }
    Ok(())
}

/// Every record must carry exactly the declared columns.
fn check_record_shape(records: &[Record], columns: &[ColumnSpec]) -> Result<()> {
    for (row, record) in records.iter().enumerate() {
        if let Some(missing) = columns.iter().find(|c| !record.contains_key(c.name())) {
            return Err(BulkqlError::RecordShape {
                row,
                reason: format!("missing column {}", missing.name()),
            });
        }
        if let Some(extra) = record
            .keys()
            .find(|key| !columns.iter().any(|c| c.name() == key.as_str()))
        {
            return Err(BulkqlError::RecordShape {
                row,
                reason: format!("undeclared column {}", extra),
            });
        }
    }
    Ok(())
}

/// Insert `request`'s records in parameter-bounded batches.
///
/// Returns the output-projected rows, one per inserted record, in input
/// order. Without output columns the result is empty.
#[tracing::instrument(skip_all, fields(table = %request.table, records = request.records.len()))]
pub async fn bulk_insert<S>(scope: &S, request: &InsertRequest, config: &BulkConfig) -> Result<Vec<Row>>
where
    S: StatementScope + ?Sized,
{
    ensure_identifiers(
        std::iter::once(request.table.as_str())
            .chain(request.columns.iter().map(ColumnSpec::name))
            .chain(request.output.iter().map(String::as_str)),
    )?;
    check_unique_columns(&request.columns)?;
    check_record_shape(&request.records, &request.columns)?;

    let plan = BatchPlan::new(request.columns.len(), effective_ceiling(scope, config))?;
    if request.records.is_empty() {
        return Ok(Vec::new());
    }

    let dialect = scope.dialect();
    let batch_count = plan.batch_count(request.records.len());
    let mut rows = Vec::with_capacity(if request.output.is_empty() {
        0
    } else {
        request.records.len()
    });

    for (index, batch) in plan.batches(&request.records).enumerate() {
        let statement = render_insert(
            dialect,
            &request.table,
            &request.columns,
            &request.output,
            batch,
        )?;

        tracing::info!(
            table = %request.table,
            batch = index + 1,
            batch_count,
            rows = batch.len(),
            params = statement.params.len(),
            "executing bulk insert batch"
        );

        let results = execute_prepared(scope, &statement).await.inspect_err(|e| {
            tracing::error!(
                table = %request.table,
                batch = index + 1,
                batch_count,
                error = %e,
                "bulk insert batch failed"
            );
        })?;

        rows.extend(results.into_iter().flat_map(|result| result.rows));
    }

    Ok(rows)
}

/// Update `request`'s records in parameter-bounded batches.
///
/// Each batch is a single prepared statement holding one `UPDATE` per
/// record. Returns every result set the statements produced, in statement
/// order across batches.
#[tracing::instrument(skip_all, fields(table = %request.table, records = request.records.len()))]
pub async fn bulk_update<S>(
    scope: &S,
    request: &UpdateRequest,
    config: &BulkConfig,
) -> Result<Vec<QueryResult>>
where
    S: StatementScope + ?Sized,
{
    ensure_identifiers(
        std::iter::once(request.table.as_str())
            .chain(request.columns.iter().map(ColumnSpec::name)),
    )?;
    check_unique_columns(&request.columns)?;

    if request.columns.is_empty() {
        return Err(BulkqlError::NoColumns);
    }
    if request.columns.iter().all(ColumnSpec::is_conditional) {
        return Err(BulkqlError::NoSettableColumns);
    }
    if !request.allow_unconditional && !request.columns.iter().any(ColumnSpec::is_conditional) {
        tracing::error!(table = %request.table, "refusing update without conditional columns");
        return Err(BulkqlError::UnconditionalUpdate);
    }

    let dialect = scope.dialect();
    if !dialect.supports_multi_statement_prepare() {
        return Err(BulkqlError::NotSupported(format!(
            "batched multi-statement update is not available for {}",
            dialect
        )));
    }

    check_record_shape(&request.records, &request.columns)?;

    let plan = BatchPlan::new(request.columns.len(), effective_ceiling(scope, config))?;
    if request.records.is_empty() {
        return Ok(Vec::new());
    }

    let batch_count = plan.batch_count(request.records.len());
    let mut results = Vec::with_capacity(request.records.len());

    for (index, batch) in plan.batches(&request.records).enumerate() {
        let statement = render_update(dialect, &request.table, &request.columns, batch)?;

        tracing::info!(
            table = %request.table,
            batch = index + 1,
            batch_count,
            rows = batch.len(),
            params = statement.params.len(),
            "executing bulk update batch"
        );

        let batch_results = execute_prepared(scope, &statement).await.inspect_err(|e| {
            tracing::error!(
                table = %request.table,
                batch = index + 1,
                batch_count,
                error = %e,
                "bulk update batch failed"
            );
        })?;

        results.extend(batch_results);
    }

    Ok(results)
}
