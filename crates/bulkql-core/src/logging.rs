//! Tracing subscriber setup
//!
//! Development builds get pretty console output; production emits one JSON
//! object per line on stdout, which is what serverless log collectors ingest.
//! `RUST_LOG` overrides the configured filter in both modes.

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON lines on stdout
    pub enable_json_logs: bool,

    /// Human-readable console output
    pub enable_console_logs: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close events
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,bulkql_core=debug,bulkql_connection=debug,bulkql_drivers=debug,bulkql_driver_mssql=debug,bulkql_driver_postgres=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON only, info and above
    pub fn production() -> Self {
        Self {
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,bulkql_core=info,bulkql_connection=info,bulkql_driver_mssql=info,bulkql_driver_postgres=info".to_string(),
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, everything
    pub fn testing() -> Self {
        Self {
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: false,
            default_filter: "debug".to_string(),
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW/CLOSE only: ENTER fires on every re-poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();

        layers.push(console_layer);
    }

    if config.enable_json_logs {
        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stdout)
            .with_filter(env_filter)
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );

    Ok(())
}

/// Initialize with the development or production preset depending on build profile
pub fn init_default() -> anyhow::Result<()> {
    let config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };

    init(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_preset_is_json_only() {
        let config = LoggingConfig::production();
        assert!(config.enable_json_logs);
        assert!(!config.enable_console_logs);
        assert!(config.default_filter.contains("bulkql_core=info"));
    }

    #[test]
    fn test_second_init_fails() {
        // First call may fail if another test already installed a subscriber;
        // the second one must fail either way.
        let _ = init(LoggingConfig::testing());
        assert!(init(LoggingConfig::testing()).is_err());
    }
}
