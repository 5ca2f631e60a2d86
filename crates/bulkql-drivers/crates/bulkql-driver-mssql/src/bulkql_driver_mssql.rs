//! MS SQL Server driver for bulkql
//!
//! Connections run over tiberius. Batched statements are prepared with
//! `sp_prepare`, executed with `sp_execute` and released with
//! `sp_unprepare` on the same session.

mod connection;
mod driver;
mod prepared;
mod transaction;
mod types;

#[cfg(test)]
mod driver_tests;
#[cfg(test)]
mod types_tests;

pub use connection::{MSSQL_EXECUTE_PARAM_LIMIT, MssqlConnection, MssqlConnectionError};
pub use driver::MssqlDriver;
pub use prepared::MssqlPrepared;
pub use transaction::MssqlTransaction;
pub use types::{mssql_declaration, parameter_declarations};
