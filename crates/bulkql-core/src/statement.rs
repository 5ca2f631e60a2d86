//! Rendering of batched INSERT and UPDATE statements
//!
//! Identifiers are interpolated into the SQL text; values never are. Every
//! value travels as a [`BoundParam`] in the statement's [`ParamMap`], and the
//! placeholder written into the text is derived from the position the map
//! assigned to it, so SQL text and value order cannot drift apart.

mod column;
mod insert;
mod params;
mod update;


pub use column::{ColumnSpec, CustomExpression};
pub use insert::render_insert;
pub use params::{BoundParam, ParamBinding, ParamMap, RenderedStatement};
pub use update::{render_update, split_update_columns};

use crate::{BulkqlError, Dialect, Record, Result, Value};

/// Synthesized parameter key: `<column>_<row index within batch>`
pub fn param_key(column: &str, row: usize) -> String {
    format!("{}_{}", column, row)
}

/// Bind one column of one record and return its placeholder text.
fn bind_column(
    dialect: Dialect,
    params: &mut ParamMap,
    column: &ColumnSpec,
    record: &Record,
    row: usize,
) -> Result<String> {
    let value = record
        .get(column.name())
        .ok_or_else(|| BulkqlError::RecordShape {
            row,
            reason: format!("missing column {}", column.name()),
        })?;
    let key = param_key(column.name(), row);
    let position = params.push(BoundParam {
        key: key.clone(),
        column: column.name().to_string(),
        row,
        sql_type: column.sql_type(),
        value: Value::clone(value),
    })?;
    Ok(dialect.placeholder_style().render(&key, position))
}
