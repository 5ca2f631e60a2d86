//! PostgreSQL driver for bulkql

mod connection;
mod driver;
mod numeric;
mod prepared;
mod tls;
mod transaction;
mod types;

#[cfg(test)]
mod driver_tests;
#[cfg(test)]
mod types_tests;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use numeric::PgNumeric;
pub use prepared::PgPrepared;
pub use tls::{SslMode, TlsError, build_connector};
pub use transaction::PostgresTransaction;
pub use types::pg_type;
