//! PostgreSQL driver implementation

use crate::connection::PostgresConnection;
use async_trait::async_trait;
use bulkql_core::{
    Connection, ConnectionConfig, DEFAULT_POSTGRES_PORT, DatabaseDriver, Dialect, Result,
};
use std::sync::Arc;

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn id(&self) -> &'static str {
        "postgresql"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn default_port(&self) -> u16 {
        DEFAULT_POSTGRES_PORT
    }

    #[tracing::instrument(skip(self, config), fields(host = %config.host, database = ?config.database))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let connection = PostgresConnection::from_config(config).await?;
        Ok(Arc::new(connection))
    }
}
