//! Bulk operation and connection configuration

use crate::{BulkqlError, Dialect, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter ceiling used against SQL Server (one below its 2100 limit)
pub const MSSQL_PARAM_CEILING: usize = 2099;

/// Parameter ceiling used against Postgres (one below its 65535 limit)
pub const POSTGRES_PARAM_CEILING: usize = 65534;

pub const DEFAULT_MSSQL_PORT: u16 = 1433;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_MSSQL_REQUEST_TIMEOUT_MS: u64 = 180_000;
pub const DEFAULT_MSSQL_CONNECT_TIMEOUT_MS: u64 = 60_000;

/// Tuning for bulk insert and update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum bound parameters per prepared statement
    pub param_ceiling: usize,
}

impl BulkConfig {
    /// # Panics
    ///
    /// Panics if `param_ceiling` is 0.
    pub fn new(param_ceiling: usize) -> Self {
        assert!(param_ceiling > 0, "param_ceiling must be > 0");
        Self { param_ceiling }
    }

    /// Default ceiling for a dialect
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self::new(dialect.default_param_ceiling())
    }

    pub fn with_param_ceiling(mut self, param_ceiling: usize) -> Self {
        assert!(param_ceiling > 0, "param_ceiling must be > 0");
        self.param_ceiling = param_ceiling;
        self
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self::new(MSSQL_PARAM_CEILING)
    }
}

/// Connection parameters for one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Driver-specific options (`encrypt`, `trust_cert`, `sslmode`, timeouts)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(dialect: Dialect, host: &str, port: u16) -> Self {
        Self {
            dialect,
            host: host.to_string(),
            port,
            database: None,
            username: None,
            password: None,
            params: HashMap::new(),
        }
    }

    /// Create a SQL Server configuration
    pub fn new_mssql(host: &str, port: u16, database: &str, username: &str) -> Self {
        let mut config = Self::new(Dialect::Mssql, host, port);
        config.database = Some(database.to_string());
        config.username = Some(username.to_string());
        config
    }

    /// Create a PostgreSQL configuration
    pub fn new_postgres(host: &str, port: u16, database: &str, username: &str) -> Self {
        let mut config = Self::new(Dialect::Postgres, host, port);
        config.database = Some(database.to_string());
        config.username = Some(username.to_string());
        config
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let str_val = match value.into() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.params.insert(key.to_string(), str_val);
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Boolean parameter; accepts `true/false`, `1/0`, `yes/no`
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_param(key)
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            })
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_param(key).and_then(|v| v.parse().ok())
    }

    /// Build from the process environment.
    ///
    /// SQL Server reads `MSSQL_HOST`, `MSSQL_PORT`, `MSSQL_NAME`, `MSSQL_USER`,
    /// `MSSQL_PASSWORD`, `MSSQL_ENCRYPT`, `MSSQL_TRUST_CERT`,
    /// `MSSQL_REQUEST_TIMEOUT_MS` and `MSSQL_CONNECT_TIMEOUT_MS`. Postgres
    /// reads `DATABASE_HOST`, `DATABASE_PORT`, `DATABASE_NAME`,
    /// `DATABASE_USER`, `DATABASE_PASSWORD` and `DATABASE_SSLMODE`.
    pub fn from_env(dialect: Dialect) -> Result<Self> {
        Self::from_lookup(dialect, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(dialect: Dialect, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (prefix, default_port) = match dialect {
            Dialect::Mssql => ("MSSQL", DEFAULT_MSSQL_PORT),
            Dialect::Postgres => ("DATABASE", DEFAULT_POSTGRES_PORT),
        };
        let var = |name: &str| {
            lookup(&format!("{}_{}", prefix, name)).filter(|value| !value.trim().is_empty())
        };

        let host = var("HOST").ok_or_else(|| {
            BulkqlError::Configuration(format!("{}_HOST is not set", prefix))
        })?;
        let port = match var("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                BulkqlError::Configuration(format!("{}_PORT is not a valid port: {}", prefix, raw))
            })?,
            None => default_port,
        };

        let mut config = Self::new(dialect, &host, port);
        config.database = var("NAME");
        config.username = var("USER");
        config.password = var("PASSWORD");

        match dialect {
            Dialect::Mssql => {
                config.params.insert(
                    "encrypt".into(),
                    var("ENCRYPT").unwrap_or_else(|| "false".into()),
                );
                config.params.insert(
                    "trust_cert".into(),
                    var("TRUST_CERT").unwrap_or_else(|| "false".into()),
                );
                config.params.insert(
                    "request_timeout_ms".into(),
                    var("REQUEST_TIMEOUT_MS")
                        .unwrap_or_else(|| DEFAULT_MSSQL_REQUEST_TIMEOUT_MS.to_string()),
                );
                config.params.insert(
                    "connect_timeout_ms".into(),
                    var("CONNECT_TIMEOUT_MS")
                        .unwrap_or_else(|| DEFAULT_MSSQL_CONNECT_TIMEOUT_MS.to_string()),
                );
            }
            Dialect::Postgres => {
                config.params.insert(
                    "sslmode".into(),
                    var("SSLMODE").unwrap_or_else(|| "require".into()),
                );
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_bulk_config_defaults() {
        assert_eq!(BulkConfig::default().param_ceiling, 2099);
        assert_eq!(BulkConfig::for_dialect(Dialect::Postgres).param_ceiling, 65534);
        assert_eq!(BulkConfig::default().with_param_ceiling(10).param_ceiling, 10);
    }

    #[test]
    #[should_panic(expected = "param_ceiling must be > 0")]
    fn test_bulk_config_rejects_zero() {
        BulkConfig::new(0);
    }

    #[test]
    fn test_bulk_config_serde() {
        let config: BulkConfig = serde_json::from_str(r#"{"param_ceiling": 500}"#).unwrap();
        assert_eq!(config, BulkConfig::new(500));
    }

    #[test]
    fn test_mssql_from_lookup_applies_defaults() {
        let config = ConnectionConfig::from_lookup(
            Dialect::Mssql,
            lookup_from(&[
                ("MSSQL_HOST", "sql.internal"),
                ("MSSQL_NAME", "orders"),
                ("MSSQL_USER", "svc"),
                ("MSSQL_PASSWORD", "secret"),
            ]),
        )
        .unwrap();

        assert_eq!(config.host, "sql.internal");
        assert_eq!(config.port, 1433);
        assert_eq!(config.database.as_deref(), Some("orders"));
        assert_eq!(config.get_bool("encrypt"), Some(false));
        assert_eq!(config.get_u64("request_timeout_ms"), Some(180_000));
        assert_eq!(config.get_u64("connect_timeout_ms"), Some(60_000));
    }

    #[test]
    fn test_postgres_from_lookup() {
        let config = ConnectionConfig::from_lookup(
            Dialect::Postgres,
            lookup_from(&[("DATABASE_HOST", "pg"), ("DATABASE_PORT", "6543")]),
        )
        .unwrap();
        assert_eq!(config.port, 6543);
        assert_eq!(config.get_param("sslmode"), Some("require"));
        assert_eq!(config.username, None);
    }

    #[test]
    fn test_missing_host_is_configuration_error() {
        let err = ConnectionConfig::from_lookup(Dialect::Postgres, lookup_from(&[])).unwrap_err();
        assert!(matches!(err, BulkqlError::Configuration(msg) if msg.contains("DATABASE_HOST")));
    }

    #[test]
    fn test_invalid_port_is_configuration_error() {
        let err = ConnectionConfig::from_lookup(
            Dialect::Mssql,
            lookup_from(&[("MSSQL_HOST", "h"), ("MSSQL_PORT", "99999")]),
        )
        .unwrap_err();
        assert!(matches!(err, BulkqlError::Configuration(_)));
    }

    #[test]
    fn test_with_param_stringifies() {
        let config = ConnectionConfig::new_mssql("h", 1433, "db", "u")
            .with_param("encrypt", true)
            .with_param("request_timeout_ms", 5000);
        assert_eq!(config.get_bool("encrypt"), Some(true));
        assert_eq!(config.get_u64("request_timeout_ms"), Some(5000));
    }
}
