//! bulkql drivers
//!
//! Concrete implementations of the driver traits defined in `bulkql-core`,
//! selected by cargo feature.

#[cfg(feature = "mssql")]
pub use bulkql_driver_mssql as mssql;
#[cfg(feature = "postgres")]
pub use bulkql_driver_postgres as postgres;

mod registry;

pub use registry::{DriverRegistry, connect};

pub use bulkql_core::{
    BulkqlError, Connection, ConnectionConfig, DatabaseDriver, Dialect, QueryResult, Result, Row,
    Transaction, Value,
};
