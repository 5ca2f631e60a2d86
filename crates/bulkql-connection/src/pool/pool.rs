//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use bulkql_core::{BulkqlError, Connection, Result};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Whether an idle connection may be handed out again
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

struct IdleConnection {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
}

/// A pool of database connections shared by concurrent callers
///
/// Each `get` hands out one connection exclusively; it goes back to the
/// idle queue when the `PooledConnection` guard is dropped.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<VecDeque<IdleConnection>>,
    /// One permit per connection that may be handed out
    semaphore: Arc<Semaphore>,
    active_count: AtomicUsize,
    waiting_count: AtomicUsize,
}

impl ConnectionPool {
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
        }
    }

    /// Get a connection from the pool
    ///
    /// Reuses a valid idle connection when there is one, otherwise opens a
    /// new one. Waits for a free slot when `max_size` connections are out,
    /// failing with `Timeout` once the acquire timeout passes.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);

        let result = tokio::time::timeout(self.config.acquire_timeout(), async {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BulkqlError::Connection("Pool semaphore closed".into()))?;

            let (connection, created_at) = match self.try_get_idle().await {
                Some(idle) => idle,
                None => {
                    tracing::debug!("opening new pooled connection");
                    (self.factory.create().await?, Instant::now())
                }
            };
            Ok::<_, BulkqlError>((connection, created_at, permit))
        })
        .await;

        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(Ok((connection, created_at, permit))) => {
                self.active_count.fetch_add(1, Ordering::SeqCst);
                Ok(PooledConnection {
                    connection,
                    created_at,
                    pool: self,
                    _permit: permit,
                })
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to acquire pooled connection");
                Err(e)
            }
            Err(_) => Err(BulkqlError::Timeout(format!(
                "Timed out waiting for connection (timeout: {:?}, pool: {})",
                self.config.acquire_timeout(),
                self.stats()
            ))),
        }
    }

    /// Pop idle connections until one passes the lifetime, idle and
    /// validation checks; rejected ones are closed
    async fn try_get_idle(&self) -> Option<(Arc<dyn Connection>, Instant)> {
        loop {
            let idle = { self.idle.lock().pop_front() }?;

            let expired = self
                .config
                .max_lifetime()
                .is_some_and(|max| idle.created_at.elapsed() > max);
            let stale = idle.last_used_at.elapsed() > self.config.idle_timeout();

            if expired || stale || !self.factory.validate(&*idle.connection).await {
                tracing::debug!(expired, stale, "discarding idle connection");
                if let Err(e) = idle.connection.close().await {
                    tracing::warn!(error = %e, "failed to close discarded connection");
                }
                continue;
            }

            return Some((idle.connection, idle.created_at));
        }
    }

    fn return_connection(&self, connection: Arc<dyn Connection>, created_at: Instant) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        if connection.is_closed() {
            return;
        }

        self.idle.lock().push_back(IdleConnection {
            connection,
            created_at,
            last_used_at: Instant::now(),
        });
    }

    /// Open connections until `min_size` are available; returns how many
    /// were opened
    pub async fn warm_up(&self) -> Result<usize> {
        let mut opened = 0;
        while self.stats().total() < self.config.min_size() {
            let connection = self.factory.create().await?;
            let now = Instant::now();
            self.idle.lock().push_back(IdleConnection {
                connection,
                created_at: now,
                last_used_at: now,
            });
            opened += 1;
        }
        if opened > 0 {
            tracing::info!(opened, stats = %self.stats(), "connection pool warmed up");
        }
        Ok(opened)
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle, active, waiting, self.config.max_size())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let connections = { self.idle.lock().drain(..).collect::<Vec<_>>() };

        for idle in connections {
            if let Err(e) = idle.connection.close().await {
                tracing::warn!(error = %e, "failed to close idle connection");
            }
        }
    }
}

/// A connection borrowed from the pool
///
/// Dereferences to the connection, which is also a statement scope. When
/// dropped, the connection is returned to the pool.
pub struct PooledConnection<'a> {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    pool: &'a ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool
            .return_connection(self.connection.clone(), self.created_at);
    }
}

impl PooledConnection<'_> {
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
