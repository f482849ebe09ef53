//! Per-backend SQL construction behind one capability trait.
//!
//! Bulk writers never branch on the backend: quoting, bind placeholders, the upsert form
//! and the transient error list all come from a [`Dialect`].

mod oracle;
mod postgres;

pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;

use crate::error::SqlWarehouseError;
use crate::types::DatabaseType;

pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    /// Quote a table or column name, rejecting anything unsafe to splice into SQL.
    ///
    /// # Errors
    /// Returns `SqlWarehouseError::InvalidIdentifier` for names the dialect refuses.
    fn quote_identifier(&self, raw: &str) -> Result<String, SqlWarehouseError>;

    /// Bind placeholder for `column` at 1-based `position`.
    fn placeholder(&self, column: &str, position: usize) -> String;

    /// Insert-or-update statement keyed on `match_columns`, one bind per entry of `columns`
    /// in order.
    ///
    /// Callers check that both lists are non-empty and that `match_columns` is a subset of
    /// `columns`.
    ///
    /// # Errors
    /// Returns `SqlWarehouseError::InvalidIdentifier` if any name fails quoting.
    fn upsert_sql(
        &self,
        table: &str,
        columns: &[String],
        match_columns: &[String],
    ) -> Result<String, SqlWarehouseError>;

    /// Driver error codes that indicate a transient connectivity condition.
    fn retry_error_codes(&self) -> &'static [&'static str];

    /// Quote every name in `columns`.
    ///
    /// # Errors
    /// Fails on the first name that does not quote.
    fn quote_all(&self, columns: &[String]) -> Result<Vec<String>, SqlWarehouseError> {
        columns.iter().map(|c| self.quote_identifier(c)).collect()
    }

    /// Comma-separated placeholders for `columns`, numbered from 1.
    fn placeholders(&self, columns: &[String]) -> String {
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| self.placeholder(c, i + 1))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn database_type_maps_to_dialect() {
        assert_eq!(
            DatabaseType::Oracle.dialect().database_type(),
            DatabaseType::Oracle
        );
        assert_eq!(
            DatabaseType::Postgres.dialect().database_type(),
            DatabaseType::Postgres
        );
    }

    #[test]
    fn placeholder_lists() {
        let columns = cols(&["ID", "NAME"]);
        assert_eq!(OracleDialect.placeholders(&columns), ":ID, :NAME");
        assert_eq!(PostgresDialect.placeholders(&columns), "$1, $2");
    }

    #[test]
    fn transient_code_lists() {
        let oracle = OracleDialect.retry_error_codes();
        for code in [
            "ORA-01033",
            "ORA-08103",
            "ORA-04021",
            "ORA-01652",
            "ORA-12541",
            "ORA-03113",
            "DPI-1080",
        ] {
            assert!(oracle.contains(&code), "{code}");
        }
        let postgres = PostgresDialect.retry_error_codes();
        for code in ["08001", "08003", "08004", "40001"] {
            assert!(postgres.contains(&code), "{code}");
        }
    }
}
