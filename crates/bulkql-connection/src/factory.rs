//! Connection factory backed by the driver registry

use std::sync::Arc;

use async_trait::async_trait;
use bulkql_core::{Connection, ConnectionConfig, Result};
use bulkql_drivers::DriverRegistry;

use crate::pool::ConnectionFactory;

/// Opens connections for one `ConnectionConfig` through the built-in drivers
pub struct DriverConnectionFactory {
    registry: DriverRegistry,
    config: ConnectionConfig,
}

impl DriverConnectionFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_registry(DriverRegistry::with_defaults(), config)
    }

    pub fn with_registry(registry: DriverRegistry, config: ConnectionConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        tracing::debug!(
            dialect = %self.config.dialect,
            host = %self.config.host,
            "opening connection"
        );
        self.registry.connect(&self.config).await
    }
}
