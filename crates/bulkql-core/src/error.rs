//! Error types for bulkql

use thiserror::Error;

/// Core error type for bulkql operations
#[derive(Error, Debug)]
pub enum BulkqlError {
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Batch size too small: a record needs {params_per_record} parameters but the ceiling is {ceiling}")]
    BatchSizeTooSmall {
        params_per_record: usize,
        ceiling: usize,
    },

    #[error("Bulk operation declares no columns")]
    NoColumns,

    #[error("Update declares no settable columns")]
    NoSettableColumns,

    #[error("Update declares no conditional columns and would touch every row; call allow_unconditional() to opt in")]
    UnconditionalUpdate,

    #[error("Record {row} does not match the declared columns: {reason}")]
    RecordShape { row: usize, reason: String },

    #[error("Column declared more than once: {0}")]
    DuplicateColumn(String),

    #[error("Duplicate parameter key: {0}")]
    DuplicateParameter(String),

    #[error("Statement execution failed: {0}")]
    StatementExecutionFailed(#[source] Box<BulkqlError>),

    #[error("Transaction failed and was rolled back: {0}")]
    TransactionFailed(#[source] Box<BulkqlError>),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl BulkqlError {
    /// Wrap an engine failure raised while preparing or executing a statement.
    ///
    /// Already-wrapped errors are passed through so the cause is never nested twice.
    pub fn statement_failed(cause: BulkqlError) -> Self {
        match cause {
            already @ BulkqlError::StatementExecutionFailed(_) => already,
            other => BulkqlError::StatementExecutionFailed(Box::new(other)),
        }
    }

    /// Wrap the error that caused a transaction to roll back.
    pub fn transaction_failed(cause: BulkqlError) -> Self {
        match cause {
            already @ BulkqlError::TransactionFailed(_) => already,
            other => BulkqlError::TransactionFailed(Box::new(other)),
        }
    }

    /// Whether retrying the same call might succeed.
    ///
    /// Usage errors (bad identifiers, impossible batch sizes, malformed
    /// records) are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            BulkqlError::Connection(_)
            | BulkqlError::Io(_)
            | BulkqlError::Timeout(_)
            | BulkqlError::StatementExecutionFailed(_) => true,
            BulkqlError::TransactionFailed(cause) => cause.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for bulkql operations
pub type Result<T> = std::result::Result<T, BulkqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_failed_does_not_double_wrap() {
        let once = BulkqlError::statement_failed(BulkqlError::Driver("deadlock".into()));
        let twice = BulkqlError::statement_failed(once);
        match twice {
            BulkqlError::StatementExecutionFailed(cause) => {
                assert!(matches!(*cause, BulkqlError::Driver(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_usage_errors_are_not_transient() {
        assert!(!BulkqlError::InvalidIdentifier("a b".into()).is_transient());
        assert!(
            !BulkqlError::BatchSizeTooSmall {
                params_per_record: 3000,
                ceiling: 2099
            }
            .is_transient()
        );
        assert!(!BulkqlError::NoSettableColumns.is_transient());
        assert!(!BulkqlError::DuplicateColumn("email".into()).is_transient());
    }

    #[test]
    fn test_engine_errors_are_transient() {
        assert!(BulkqlError::Timeout("pool".into()).is_transient());
        assert!(
            BulkqlError::statement_failed(BulkqlError::Driver("lock timeout".into()))
                .is_transient()
        );
        assert!(
            BulkqlError::transaction_failed(BulkqlError::Connection("reset".into()))
                .is_transient()
        );
        assert!(
            !BulkqlError::transaction_failed(BulkqlError::InvalidIdentifier("x;".into()))
                .is_transient()
        );
    }

    #[test]
    fn test_error_messages_carry_cause() {
        let err = BulkqlError::statement_failed(BulkqlError::Driver("syntax error".into()));
        assert_eq!(
            err.to_string(),
            "Statement execution failed: Driver error: syntax error"
        );
    }
}
