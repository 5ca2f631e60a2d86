//! Process-wide connection pool, created on first use

use std::future::Future;

use bulkql_core::{ConnectionConfig, Result};
use tokio::sync::OnceCell;

use crate::factory::DriverConnectionFactory;
use crate::pool::{ConnectionPool, PoolConfig};

/// A pool slot that can live in a `static`
///
/// The first `get_or_init` runs the initializer; concurrent first callers
/// wait for it instead of building pools of their own. If the initializer
/// fails the slot stays empty and the next call tries again.
pub struct LazyPool {
    cell: OnceCell<ConnectionPool>,
}

impl LazyPool {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<&ConnectionPool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ConnectionPool>>,
    {
        self.cell
            .get_or_try_init(|| async move {
                tracing::info!("initializing process-wide connection pool");
                init().await
            })
            .await
    }

    pub fn get(&self) -> Option<&ConnectionPool> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl Default for LazyPool {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_POOL: LazyPool = LazyPool::new();

/// The process-wide pool, sized with [`PoolConfig::serverless`]
///
/// `config` is only read by the call that creates the pool; later calls
/// get the existing pool whatever they pass.
pub async fn global_pool(config: &ConnectionConfig) -> Result<&'static ConnectionPool> {
    GLOBAL_POOL
        .get_or_init(|| async {
            let pool = ConnectionPool::new(
                PoolConfig::serverless(),
                DriverConnectionFactory::new(config.clone()),
            );
            pool.warm_up().await?;
            let stats = pool.stats();
            tracing::info!(
                idle = stats.idle(),
                max_size = stats.max_size(),
                "process-wide connection pool ready"
            );
            Ok(pool)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ConnectionFactory;
    use async_trait::async_trait;
    use bulkql_core::{BulkqlError, Connection};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverConnects;

    #[async_trait]
    impl ConnectionFactory for NeverConnects {
        async fn create(&self) -> Result<Arc<dyn Connection>> {
            Err(BulkqlError::Connection("unreachable".into()))
        }
    }

    fn pool() -> ConnectionPool {
        ConnectionPool::new(PoolConfig::new(0, 1), NeverConnects)
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        static POOL: LazyPool = LazyPool::new();
        static INITS: AtomicUsize = AtomicUsize::new(0);

        let init = || async {
            INITS.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(pool())
        };

        let (a, b, c) = tokio::join!(
            POOL.get_or_init(init),
            POOL.get_or_init(init),
            POOL.get_or_init(init)
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(INITS.load(Ordering::SeqCst), 1);
        assert!(std::ptr::eq(a, b) && std::ptr::eq(b, c));
        assert!(POOL.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialization_can_be_retried() {
        let lazy = LazyPool::new();

        let err = lazy
            .get_or_init(|| async { Err(BulkqlError::Configuration("missing host".into())) })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BulkqlError::Configuration(_)));
        assert!(!lazy.is_initialized());
        assert!(lazy.get().is_none());

        lazy.get_or_init(|| async { Ok(pool()) }).await.unwrap();
        assert!(lazy.is_initialized());
    }
}
