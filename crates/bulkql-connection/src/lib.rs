//! bulkql connection management
//!
//! Pooling, the process-wide lazily created pool, scoped transactions and
//! the generic retry wrapper.

mod factory;
mod global;
pub mod pool;
pub mod retry;
mod transaction;

pub use factory::DriverConnectionFactory;
pub use global::{LazyPool, global_pool};
pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use retry::{
    BackoffStrategy, ConstantDelay, DelayStrategy, RetryConfig, attempt_with_retry, retry,
    retry_if, retry_with,
};
pub use transaction::{TransactionScope, with_transaction};
