//! Driver registry for managing available database drivers

use bulkql_core::{BulkqlError, Connection, ConnectionConfig, DatabaseDriver, Dialect, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers, keyed by driver id
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "mssql")]
        registry.register(Arc::new(crate::mssql::MssqlDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));

        registry
    }

    /// Register a new driver, replacing any driver with the same id
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let id = driver.id().to_string();
        tracing::info!(driver = %id, "registering database driver");
        self.drivers.insert(id, driver);
    }

    /// Get a driver by id or alias (`sqlserver`, `postgres`, ...)
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(name).cloned().or_else(|| {
            let dialect = Dialect::from_driver_name(name)?;
            self.for_dialect(dialect)
        });
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// Get the driver that speaks `dialect`
    pub fn for_dialect(&self, dialect: Dialect) -> Option<Arc<dyn DatabaseDriver>> {
        self.drivers
            .values()
            .find(|driver| driver.dialect() == dialect)
            .cloned()
    }

    /// List all registered driver ids
    pub fn list(&self) -> Vec<&str> {
        let mut ids = self.drivers.keys().map(|s| s.as_str()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Open a connection with the driver matching `config.dialect`
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let driver = self.for_dialect(config.dialect).ok_or_else(|| {
            BulkqlError::NotSupported(format!("no driver registered for {}", config.dialect))
        })?;
        driver.connect(config).await
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Open a connection using the built-in drivers
pub async fn connect(config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
    DriverRegistry::with_defaults().connect(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct NullDriver;

    #[async_trait]
    impl DatabaseDriver for NullDriver {
        fn id(&self) -> &'static str {
            "null"
        }

        fn display_name(&self) -> &'static str {
            "Null"
        }

        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn default_port(&self) -> u16 {
            0
        }

        async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
            Err(BulkqlError::Connection("null driver never connects".into()))
        }
    }

    #[cfg(all(feature = "mssql", feature = "postgres"))]
    #[test]
    fn test_defaults_register_both_drivers() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.list(), vec!["mssql", "postgresql"]);
        assert!(registry.has("mssql"));
    }

    #[cfg(feature = "mssql")]
    #[test]
    fn test_get_resolves_aliases() {
        let registry = DriverRegistry::with_defaults();
        let driver = registry.get("sqlserver").expect("alias resolves");
        assert_eq!(driver.id(), "mssql");
        assert!(registry.get("oracle").is_none());
    }

    #[tokio::test]
    async fn test_connect_dispatches_on_dialect() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(NullDriver));

        let config = ConnectionConfig::new(Dialect::Postgres, "localhost", 5432);
        let err = registry.connect(&config).await.err().unwrap();
        assert!(err.to_string().contains("null driver"));

        let config = ConnectionConfig::new(Dialect::Mssql, "localhost", 1433);
        let err = registry.connect(&config).await.err().unwrap();
        assert!(matches!(err, BulkqlError::NotSupported(_)));
    }
}
