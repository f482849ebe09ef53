use super::Dialect;
use crate::error::SqlWarehouseError;
use crate::identifier::quote_postgres_identifier;
use crate::types::DatabaseType;

/// SQLSTATEs: unable to connect, connection does not exist, connection rejected,
/// serialization failure.
const RETRY_ERROR_CODES: &[&str] = &["08001", "08003", "08004", "40001"];

/// Case-preserving quoted identifiers, `$n` binds, `ON CONFLICT` upserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn quote_identifier(&self, raw: &str) -> Result<String, SqlWarehouseError> {
        quote_postgres_identifier(raw)
    }

    fn placeholder(&self, _column: &str, position: usize) -> String {
        format!("${position}")
    }

    fn upsert_sql(
        &self,
        table: &str,
        columns: &[String],
        match_columns: &[String],
    ) -> Result<String, SqlWarehouseError> {
        let table = self.quote_identifier(table)?;
        let quoted = self.quote_all(columns)?;
        let conflict = self.quote_all(match_columns)?;

        let updates: Vec<String> = columns
            .iter()
            .zip(&quoted)
            .filter(|(column, _)| !match_columns.contains(column))
            .map(|(_, q)| format!("{q} = EXCLUDED.{q}"))
            .collect();

        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) {action}",
            quoted.join(", "),
            self.placeholders(columns),
            conflict.join(", ")
        ))
    }

    fn retry_error_codes(&self) -> &'static [&'static str] {
        RETRY_ERROR_CODES
    }
}
