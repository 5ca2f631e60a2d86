//! Database driver trait definition

use crate::{Connection, ConnectionConfig, Dialect, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A database driver that opens connections from a [`ConnectionConfig`]
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique driver identifier (e.g., "mssql", "postgresql")
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn display_name(&self) -> &'static str;

    fn dialect(&self) -> Dialect;

    fn default_port(&self) -> u16;

    /// Create a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;

    /// Open a connection, run a trivial query and close it again
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let connection = self.connect(config).await?;
        connection.query("SELECT 1", &[]).await?;
        connection.close().await
    }
}
