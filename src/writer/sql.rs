//! Statement text for the bulk writers. Every name is quoted by the dialect, which
//! rejects anything unsafe before a statement is built.

use crate::dialect::Dialect;
use crate::error::SqlWarehouseError;

/// `INSERT INTO <table> (<columns>) VALUES (<binds>)`
///
/// # Errors
/// Returns `InvalidIdentifier` when a name fails quoting.
pub fn insert_sql(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[String],
) -> Result<String, SqlWarehouseError> {
    let table = dialect.quote_identifier(table)?;
    let quoted = dialect.quote_all(columns)?;
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        quoted.join(", "),
        dialect.placeholders(columns)
    ))
}

/// `DELETE FROM <table> WHERE <c1> = <b1> AND ...`
///
/// # Errors
/// Returns `InvalidIdentifier` when a name fails quoting.
pub fn delete_matching_sql(
    dialect: &dyn Dialect,
    table: &str,
    match_columns: &[String],
) -> Result<String, SqlWarehouseError> {
    let table = dialect.quote_identifier(table)?;
    let predicates = match_columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            Ok(format!(
                "{} = {}",
                dialect.quote_identifier(column)?,
                dialect.placeholder(column, i + 1)
            ))
        })
        .collect::<Result<Vec<_>, SqlWarehouseError>>()?;
    Ok(format!(
        "DELETE FROM {table} WHERE {}",
        predicates.join(" AND ")
    ))
}

/// # Errors
/// Returns `InvalidIdentifier` when the table name fails quoting.
pub fn truncate_sql(dialect: &dyn Dialect, table: &str) -> Result<String, SqlWarehouseError> {
    Ok(format!("TRUNCATE TABLE {}", dialect.quote_identifier(table)?))
}

/// # Errors
/// Returns `InvalidIdentifier` when the table name fails quoting.
pub fn empty_sql(dialect: &dyn Dialect, table: &str) -> Result<String, SqlWarehouseError> {
    Ok(format!("DELETE FROM {}", dialect.quote_identifier(table)?))
}
