//! Guard for table and column names that are spliced into SQL text
//!
//! Identifiers cannot travel as bound parameters, so every table, column and
//! output-column name is checked here before any statement is rendered. Only
//! ASCII letters, digits and underscores are accepted: no quoting, no schema
//! dots, no whitespace.

use crate::{BulkqlError, Result};

/// Check a single identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true iff every name is a safe identifier.
pub fn validate_identifiers<I, S>(names: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().all(|name| is_valid_identifier(name.as_ref()))
}

/// Like [`validate_identifiers`], but reports the first offending name.
pub fn ensure_identifiers<I, S>(names: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for name in names {
        let name = name.as_ref();
        if !is_valid_identifier(name) {
            tracing::error!(identifier = %name, "rejected SQL identifier");
            return Err(BulkqlError::InvalidIdentifier(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("users")]
    #[case::snake("user_id")]
    #[case::mixed_case_digits("Table2")]
    #[case::leading_underscore("_tmp")]
    #[case::digits_only("2024")]
    fn test_accepts_word_identifiers(#[case] name: &str) {
        assert!(is_valid_identifier(name));
    }

    #[rstest]
    #[case::injection("users; DROP TABLE x")]
    #[case::hyphen("tbl-name")]
    #[case::dotted("tbl.name")]
    #[case::space("user id")]
    #[case::bracketed("[users]")]
    #[case::quoted("\"users\"")]
    #[case::comment("users--")]
    #[case::empty("")]
    #[case::non_ascii_letter("usérs")]
    #[case::trailing_newline("users\n")]
    fn test_rejects_unsafe_identifiers(#[case] name: &str) {
        assert!(!is_valid_identifier(name));
    }

    #[test]
    fn test_validate_identifiers_requires_all() {
        assert!(validate_identifiers(["users", "id", "email"]));
        assert!(!validate_identifiers(["users", "id", "e-mail"]));
        assert!(validate_identifiers(Vec::<String>::new()));
    }

    #[test]
    fn test_ensure_identifiers_names_offender() {
        let err = ensure_identifiers(["users", "bad name", "worse;"]).unwrap_err();
        match err {
            BulkqlError::InvalidIdentifier(name) => assert_eq!(name, "bad name"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
