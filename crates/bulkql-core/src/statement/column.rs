use crate::SqlType;
use std::sync::Arc;

/// Wraps a placeholder in caller-supplied SQL, e.g. `COALESCE(@p, col)`.
///
/// The function receives the rendered placeholder and must return a SQL
/// fragment that contains it.
pub type CustomExpression = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// One declared column of a bulk operation
#[derive(Clone)]
pub struct ColumnSpec {
    name: String,
    sql_type: SqlType,
    conditional: bool,
    expression: Option<CustomExpression>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            conditional: false,
            expression: None,
        }
    }

    /// Mark the column as part of the WHERE clause of an update
    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    /// Render the column's SET value through `expression`
    pub fn with_expression<F>(mut self, expression: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.expression = Some(Arc::new(expression));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    /// SQL fragment assigned to this column for a given placeholder
    pub fn render_value(&self, placeholder: &str) -> String {
        match &self.expression {
            Some(expression) => expression(placeholder),
            None => placeholder.to_string(),
        }
    }
}

impl std::fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("conditional", &self.conditional)
            .field("expression", &self.expression.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
