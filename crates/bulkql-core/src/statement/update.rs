use super::{ColumnSpec, ParamMap, RenderedStatement, bind_column};
use crate::{BulkqlError, Dialect, Record, Result};

/// Split declared columns into `(set, where)` groups, keeping declaration order.
pub fn split_update_columns(columns: &[ColumnSpec]) -> (Vec<&ColumnSpec>, Vec<&ColumnSpec>) {
    columns.iter().partition(|column| !column.is_conditional())
}

/// Render one `UPDATE` per record, joined into a single `;`-separated batch.
///
/// With no conditional columns the statements carry no `WHERE` clause and
/// touch every row of the table; callers are expected to have opted in.
pub fn render_update(
    dialect: Dialect,
    table: &str,
    columns: &[ColumnSpec],
    batch: &[Record],
) -> Result<RenderedStatement> {
    let (set_columns, where_columns) = split_update_columns(columns);
    if set_columns.is_empty() {
        return Err(BulkqlError::NoSettableColumns);
    }

    let mut params = ParamMap::with_capacity(columns.len() * batch.len());
    let mut statements = Vec::with_capacity(batch.len());

    for (row, record) in batch.iter().enumerate() {
        let mut assignments = Vec::with_capacity(set_columns.len());
        for column in &set_columns {
            let placeholder = bind_column(dialect, &mut params, column, record, row)?;
            assignments.push(format!(
                "{} = {}",
                column.name(),
                column.render_value(&placeholder)
            ));
        }

        let mut statement = format!("UPDATE {} SET {}", table, assignments.join(", "));

        if !where_columns.is_empty() {
            let mut predicates = Vec::with_capacity(where_columns.len());
            for column in &where_columns {
                let placeholder = bind_column(dialect, &mut params, column, record, row)?;
                predicates.push(format!("{} = {}", column.name(), placeholder));
            }
            statement.push_str(" WHERE ");
            statement.push_str(&predicates.join(" AND "));
        }

        statements.push(statement);
    }

    let mut sql = statements.join("; ");
    sql.push(';');

    Ok(RenderedStatement { sql, params })
}
