//! MS SQL Server driver implementation

use crate::connection::MssqlConnection;
use async_trait::async_trait;
use bulkql_core::{
    Connection, ConnectionConfig, DEFAULT_MSSQL_PORT, DatabaseDriver, Dialect, Result,
};
use std::sync::Arc;

/// MS SQL Server database driver
pub struct MssqlDriver;

impl MssqlDriver {
    /// Create a new MS SQL Server driver instance
    pub fn new() -> Self {
        tracing::debug!("MS SQL Server driver initialized");
        Self
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn id(&self) -> &'static str {
        "mssql"
    }

    fn display_name(&self) -> &'static str {
        "MS SQL Server"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn default_port(&self) -> u16 {
        DEFAULT_MSSQL_PORT
    }

    #[tracing::instrument(skip(self, config), fields(host = %config.host, database = ?config.database))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let connection = MssqlConnection::from_config(config).await?;
        Ok(Arc::new(connection))
    }
}
