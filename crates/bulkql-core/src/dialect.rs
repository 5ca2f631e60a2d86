//! SQL dialect differences that matter to statement rendering

use serde::{Deserialize, Serialize};

/// Bound-parameter limit SQL Server enforces per request.
pub const MSSQL_PROTOCOL_PARAM_LIMIT: usize = 2100;

/// Bound-parameter limit of the Postgres extended query protocol.
pub const POSTGRES_PROTOCOL_PARAM_LIMIT: usize = 65535;

/// Supported database engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQL Server family (T-SQL, TDS protocol)
    Mssql,
    /// Postgres family
    Postgres,
}

/// How placeholders appear in rendered SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `@<key>`
    Named,
    /// `$<1-based position>`
    Positional,
}

impl PlaceholderStyle {
    /// Render the placeholder for a parameter.
    ///
    /// `position` is the parameter's 0-based index in its statement's
    /// parameter map; named placeholders ignore it.
    pub fn render(&self, key: &str, position: usize) -> String {
        match self {
            PlaceholderStyle::Named => format!("@{}", key),
            PlaceholderStyle::Positional => format!("${}", position + 1),
        }
    }
}

impl Dialect {
    /// Driver identifier
    pub fn id(&self) -> &'static str {
        match self {
            Dialect::Mssql => "mssql",
            Dialect::Postgres => "postgresql",
        }
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Dialect::Mssql => PlaceholderStyle::Named,
            Dialect::Postgres => PlaceholderStyle::Positional,
        }
    }

    /// Default parameter ceiling: one below the protocol limit.
    ///
    /// On SQL Server the spare slot carries the prepared-statement handle
    /// passed to `sp_execute`.
    pub fn default_param_ceiling(&self) -> usize {
        match self {
            Dialect::Mssql => MSSQL_PROTOCOL_PARAM_LIMIT - 1,
            Dialect::Postgres => POSTGRES_PROTOCOL_PARAM_LIMIT - 1,
        }
    }

    /// Whether several `;`-joined statements can share one prepared statement
    pub fn supports_multi_statement_prepare(&self) -> bool {
        matches!(self, Dialect::Mssql)
    }

    /// Parse a driver name as used in configuration
    pub fn from_driver_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" | "tds" => Some(Dialect::Mssql),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_rendering() {
        assert_eq!(PlaceholderStyle::Named.render("name_3", 7), "@name_3");
        assert_eq!(PlaceholderStyle::Positional.render("name_3", 7), "$8");
    }

    #[test]
    fn test_default_ceilings_leave_headroom() {
        assert_eq!(Dialect::Mssql.default_param_ceiling(), 2099);
        assert_eq!(Dialect::Postgres.default_param_ceiling(), 65534);
    }

    #[test]
    fn test_from_driver_name() {
        assert_eq!(Dialect::from_driver_name("SQLServer"), Some(Dialect::Mssql));
        assert_eq!(Dialect::from_driver_name("postgres"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_driver_name("sqlite"), None);
    }
}
