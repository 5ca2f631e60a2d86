//! Connection pooling for database connections
//!
//! ```ignore
//! use bulkql_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let pool = ConnectionPool::new(PoolConfig::serverless(), factory);
//! let conn = pool.get().await?;
//! bulk_insert(&*conn, &request, &BulkConfig::default()).await?;
//! // Connection returned to pool on drop
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use stats::PoolStats;
