//! Unit tests for MS SQL Server driver

use crate::connection::MssqlConnectionError;
use crate::prepared::{execute_sql, unprepare_sql};
use crate::*;
use bulkql_core::{BulkqlError, ConnectionConfig, DatabaseDriver, Dialect};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn test_mssql_driver_metadata() {
    let driver = MssqlDriver::new();
    assert_eq!(driver.id(), "mssql");
    assert_eq!(driver.display_name(), "MS SQL Server");
    assert_eq!(driver.default_port(), 1433);
    assert_eq!(driver.dialect(), Dialect::Mssql);
}

#[test]
fn test_execute_param_limit_leaves_room_for_sp_executesql() {
    assert_eq!(MSSQL_EXECUTE_PARAM_LIMIT, 2098);
    assert!(MSSQL_EXECUTE_PARAM_LIMIT < bulkql_core::MSSQL_PROTOCOL_PARAM_LIMIT);
}

#[test]
fn test_execute_sql_lists_positional_params() {
    assert_eq!(execute_sql(7, 3), "EXEC sp_execute 7, @P1, @P2, @P3");
    assert_eq!(execute_sql(12, 0), "EXEC sp_execute 12");
}

#[test]
fn test_unprepare_sql() {
    assert_eq!(unprepare_sql(42), "EXEC sp_unprepare 42");
}

#[test]
fn test_error_mapping() {
    let err: BulkqlError = MssqlConnectionError::ConnectionFailed("refused".into()).into();
    assert!(matches!(err, BulkqlError::Connection(_)));

    let err: BulkqlError = MssqlConnectionError::ConnectionClosed.into();
    assert!(matches!(err, BulkqlError::Connection(_)));

    let err: BulkqlError = MssqlConnectionError::Timeout(Duration::from_secs(3)).into();
    assert!(matches!(err, BulkqlError::Timeout(_)));
    assert!(err.is_transient());

    let err: BulkqlError = MssqlConnectionError::AuthenticationFailed("bad login".into()).into();
    assert!(matches!(err, BulkqlError::Driver(_)));
    assert!(err.to_string().contains("bad login"));
}

#[tokio::test]
async fn test_connect_without_username_fails_before_dialing() {
    let driver = MssqlDriver::new();
    let config = ConnectionConfig::new(Dialect::Mssql, "localhost", 1433);

    let err = match driver.connect(&config).await {
        Ok(_) => panic!("connect should fail without a username"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("requires a username"));
}
