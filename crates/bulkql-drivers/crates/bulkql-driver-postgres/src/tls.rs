//! PostgreSQL TLS support
//!
//! Maps the `sslmode` connection option onto a native-tls connector for
//! tokio-postgres.

use native_tls::{Certificate, TlsConnector as NativeTlsConnector};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Error types for TLS operations
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CA certificate format: {0}")]
    InvalidCaCert(String),

    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),

    #[error("Unknown sslmode {0:?}")]
    UnknownMode(String),

    #[error("sslmode {mode} does not use TLS")]
    UnsupportedMode { mode: SslMode },
}

/// Value of the `sslmode` option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Prefer,
    /// Encrypt without validating the server certificate
    Require,
    /// Validate the certificate chain but not the host name
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }

    pub fn uses_tls(&self) -> bool {
        *self != SslMode::Disable
    }

    pub(crate) fn to_postgres(self) -> tokio_postgres::config::SslMode {
        match self {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        }
    }
}

impl FromStr for SslMode {
    type Err = TlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" | "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" | "verify_ca" => Ok(SslMode::VerifyCa),
            "verify-full" | "verify_full" => Ok(SslMode::VerifyFull),
            other => Err(TlsError::UnknownMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a connector for `mode`, optionally trusting an extra root certificate
pub fn build_connector(
    mode: SslMode,
    ca_cert: Option<&Path>,
) -> Result<MakeTlsConnector, TlsError> {
    if !mode.uses_tls() {
        return Err(TlsError::UnsupportedMode { mode });
    }

    let ca_cert = ca_cert.map(load_ca_cert).transpose()?;

    let mut builder = NativeTlsConnector::builder();
    match mode {
        SslMode::Prefer | SslMode::Require if ca_cert.is_none() => {
            warn!(sslmode = %mode, "certificate verification disabled");
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::Prefer | SslMode::Require | SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyFull | SslMode::Disable => {}
    }
    if let Some(cert) = ca_cert {
        builder.add_root_certificate(cert);
    }

    let connector = builder
        .build()
        .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;
    debug!(sslmode = %mode, "TLS connector built");
    Ok(MakeTlsConnector::new(connector))
}

fn load_ca_cert(path: &Path) -> Result<Certificate, TlsError> {
    let pem = fs::read(path).map_err(|e| TlsError::CaCertLoadFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidCaCert(e.to_string()))
}
