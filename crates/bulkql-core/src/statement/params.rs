use crate::{BulkqlError, Result, SqlType, Value};
use indexmap::IndexMap;
use indexmap::map::Entry;

/// A value bound to one placeholder of a rendered statement
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Parameter key, unique within the statement
    pub key: String,
    /// Column the value belongs to
    pub column: String,
    /// Record index within the batch (0-based)
    pub row: usize,
    /// Declared type of the column
    pub sql_type: SqlType,
    pub value: Value,
}

/// Input-type registration handed to [`crate::StatementScope::prepare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub key: String,
    pub sql_type: SqlType,
}

/// Insertion-ordered parameters of one statement
///
/// Iteration order is the positional order: the first parameter is `$1`
/// on positional dialects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    params: IndexMap<String, BoundParam>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            params: IndexMap::with_capacity(capacity),
        }
    }

    /// Append a parameter, returning its 0-based position.
    pub fn push(&mut self, param: BoundParam) -> Result<usize> {
        match self.params.entry(param.key.clone()) {
            Entry::Occupied(entry) => Err(BulkqlError::DuplicateParameter(entry.key().clone())),
            Entry::Vacant(entry) => {
                let position = entry.index();
                entry.insert(param);
                Ok(position)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&BoundParam> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParam> {
        self.params.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// One input binding per parameter, in positional order
    pub fn bindings(&self) -> Vec<ParamBinding> {
        self.params
            .values()
            .map(|param| ParamBinding {
                key: param.key.clone(),
                sql_type: param.sql_type,
            })
            .collect()
    }

    /// Values in positional order
    pub fn values(&self) -> Vec<Value> {
        self.params.values().map(|param| param.value.clone()).collect()
    }
}

/// SQL text together with the parameters its placeholders refer to
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub params: ParamMap,
}
