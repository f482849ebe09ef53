use super::Dialect;
use crate::error::SqlWarehouseError;
use crate::identifier::quote_oracle_identifier;
use crate::types::DatabaseType;

/// Startup/shutdown in progress, object or library-cache contention, temp-space
/// exhaustion, then the codes ODPI-C reports when a connection is refused, times out or
/// drops (no listener, connect timeout, end-of-file on channel, not connected, session
/// closed underneath the client).
const RETRY_ERROR_CODES: &[&str] = &[
    "ORA-01033",
    "ORA-08103",
    "ORA-04021",
    "ORA-01652",
    "ORA-12541",
    "ORA-12170",
    "ORA-03113",
    "ORA-03114",
    "DPI-1080",
];

/// Uppercased quoted identifiers, `:NAME` binds, `MERGE` upserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn quote_identifier(&self, raw: &str) -> Result<String, SqlWarehouseError> {
        quote_oracle_identifier(raw)
    }

    fn placeholder(&self, column: &str, _position: usize) -> String {
        format!(":{column}")
    }

    fn upsert_sql(
        &self,
        table: &str,
        columns: &[String],
        match_columns: &[String],
    ) -> Result<String, SqlWarehouseError> {
        let table = self.quote_identifier(table)?;

        let mut source = Vec::with_capacity(columns.len());
        let mut quoted = Vec::with_capacity(columns.len());
        let mut updates = Vec::new();
        for (i, column) in columns.iter().enumerate() {
            let q = self.quote_identifier(column)?;
            source.push(format!("{} AS {q}", self.placeholder(column, i + 1)));
            if !match_columns.contains(column) {
                updates.push(format!("tgt.{q} = src.{q}"));
            }
            quoted.push(q);
        }
        let on = self
            .quote_all(match_columns)?
            .iter()
            .map(|q| format!("tgt.{q} = src.{q}"))
            .collect::<Vec<_>>()
            .join(" AND ");

        let mut sql = format!(
            "MERGE INTO {table} tgt USING (SELECT {} FROM dual) src ON ({on})",
            source.join(", ")
        );
        if !updates.is_empty() {
            sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            quoted.join(", "),
            quoted
                .iter()
                .map(|q| format!("src.{q}"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        Ok(sql)
    }

    fn retry_error_codes(&self) -> &'static [&'static str] {
        RETRY_ERROR_CODES
    }
}
