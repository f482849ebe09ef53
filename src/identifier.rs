//! Validation and quoting of caller-supplied table and column names.
//!
//! Oracle statements are assembled as text, so every dynamic name must match a strict
//! grammar before it is quoted. Postgres names go through [`quote_postgres_identifier`],
//! which composes a quoted identifier the way the driver's identifier primitive does:
//! embedded quotes are doubled, so no input can escape the quoted context.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SqlWarehouseError;

/// Letter-led name with an optional single schema qualifier.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_#$]*(\.[A-Za-z][A-Za-z0-9_#$]*)?$";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("static identifier pattern"));

/// Check `raw` against the identifier grammar.
///
/// # Examples
///
/// ```
/// use sql_warehouse::identifier::validate_identifier;
///
/// assert!(validate_identifier("STAGE.ITEMS").is_ok());
/// assert!(validate_identifier("col_1#$").is_ok());
///
/// assert!(validate_identifier("1abc").is_err());
/// assert!(validate_identifier("a;DROP TABLE x").is_err());
/// assert!(validate_identifier("").is_err());
/// ```
///
/// # Errors
/// Returns `SqlWarehouseError::InvalidIdentifier` when `raw` is empty or does not match.
pub fn validate_identifier(raw: &str) -> Result<(), SqlWarehouseError> {
    if raw.is_empty() {
        return Err(SqlWarehouseError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }
    if !IDENTIFIER.is_match(raw) {
        return Err(SqlWarehouseError::InvalidIdentifier(format!(
            "'{raw}' is not a valid identifier"
        )));
    }
    Ok(())
}

/// Validate `raw`, upper-case each dot-separated part and wrap it in double quotes.
///
/// `STAGE.items` becomes `"STAGE"."ITEMS"`.
///
/// # Errors
/// Returns `SqlWarehouseError::InvalidIdentifier` when `raw` fails validation.
pub fn quote_oracle_identifier(raw: &str) -> Result<String, SqlWarehouseError> {
    validate_identifier(raw)?;
    Ok(raw
        .split('.')
        .map(|part| format!("\"{}\"", part.to_uppercase()))
        .collect::<Vec<_>>()
        .join("."))
}

/// Compose a case-preserving quoted Postgres identifier, `schema.table` or `name`.
///
/// # Errors
/// Returns `SqlWarehouseError::InvalidIdentifier` for empty names, empty parts, more than
/// one qualifier, or NUL bytes.
pub fn quote_postgres_identifier(raw: &str) -> Result<String, SqlWarehouseError> {
    if raw.is_empty() {
        return Err(SqlWarehouseError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }
    if raw.contains('\0') {
        return Err(SqlWarehouseError::InvalidIdentifier(format!(
            "'{}' contains a NUL byte",
            raw.escape_debug()
        )));
    }
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(SqlWarehouseError::InvalidIdentifier(format!(
            "'{raw}' must be `name` or `schema.name`"
        )));
    }
    Ok(parts
        .iter()
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_grammar() {
        for ok in ["A", "items", "STAGE.ITEMS", "a1_#$", "s.t_2"] {
            assert!(validate_identifier(ok).is_ok(), "{ok} should be valid");
        }
    }

    #[test]
    fn rejects_outside_grammar() {
        for bad in [
            "",
            "1abc",
            "a;DROP TABLE x",
            "_lead",
            "a.b.c",
            "a.",
            ".a",
            "a b",
            "a\"b",
            "a.1b",
        ] {
            let err = validate_identifier(bad).expect_err(bad);
            assert!(matches!(err, SqlWarehouseError::InvalidIdentifier(_)));
        }
    }

    #[test]
    fn oracle_quoting_upper_cases_each_part() {
        assert_eq!(
            quote_oracle_identifier("stage.Items").unwrap(),
            "\"STAGE\".\"ITEMS\""
        );
        assert_eq!(quote_oracle_identifier("ID").unwrap(), "\"ID\"");
        assert!(quote_oracle_identifier("x\"; --").is_err());
    }

    #[test]
    fn oracle_quoting_is_stable_under_revalidation() {
        for raw in ["stage.items", "ID", "Col#1"] {
            let quoted = quote_oracle_identifier(raw).unwrap();
            let unquoted = quoted.replace('"', "");
            assert_eq!(quote_oracle_identifier(&unquoted).unwrap(), quoted);
        }
    }

    #[test]
    fn postgres_quoting_escapes_quotes() {
        assert_eq!(
            quote_postgres_identifier("public.Items").unwrap(),
            "\"public\".\"Items\""
        );
        assert_eq!(
            quote_postgres_identifier("we\"ird").unwrap(),
            "\"we\"\"ird\""
        );
        assert!(quote_postgres_identifier("").is_err());
        assert!(quote_postgres_identifier("a..b").is_err());
        assert!(quote_postgres_identifier("a.b.c").is_err());
        assert!(quote_postgres_identifier("nul\0").is_err());
    }
}
