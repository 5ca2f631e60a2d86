use super::{ColumnSpec, ParamMap, RenderedStatement, bind_column};
use crate::{Dialect, Record, Result};

/// Render one multi-row INSERT for a batch.
///
/// SQL Server projects output columns with `OUTPUT inserted.<col>` ahead of
/// `VALUES`; Postgres appends `RETURNING <col>`.
pub fn render_insert(
    dialect: Dialect,
    table: &str,
    columns: &[ColumnSpec],
    output: &[String],
    batch: &[Record],
) -> Result<RenderedStatement> {
    let mut params = ParamMap::with_capacity(columns.len() * batch.len());
    let mut tuples = Vec::with_capacity(batch.len());

    for (row, record) in batch.iter().enumerate() {
        let placeholders = columns
            .iter()
            .map(|column| bind_column(dialect, &mut params, column, record, row))
            .collect::<Result<Vec<_>>>()?;
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let column_list = columns
        .iter()
        .map(ColumnSpec::name)
        .collect::<Vec<_>>()
        .join(",");

    let mut sql = format!("INSERT INTO {} ({})", table, column_list);
    if !output.is_empty() && dialect == Dialect::Mssql {
        let projection = output
            .iter()
            .map(|col| format!("inserted.{}", col))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" OUTPUT ");
        sql.push_str(&projection);
    }
    sql.push_str(" VALUES ");
    sql.push_str(&tuples.join(", "));
    if !output.is_empty() && dialect == Dialect::Postgres {
        sql.push_str(" RETURNING ");
        sql.push_str(&output.join(", "));
    }

    Ok(RenderedStatement { sql, params })
}
