//! Bulk writes from a [`Table`]: insert, upsert, matched delete, truncate and empty.
//!
//! Names and column lists are checked before anything touches the network, and an empty
//! table short-circuits to `Ok(0)` without a statement. Each write is one
//! `execute_batch`, so it commits once and retries as a whole.

pub mod sql;

use crate::driver::Driver;
use crate::error::SqlWarehouseError;
use crate::manager::ConnectionManager;
use crate::table::{Table, normalize_nulls};

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

fn row_count(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

impl<D: Driver> ConnectionManager<D> {
    /// Insert the selected `columns` of every row of `data` into `table`.
    ///
    /// With `remove_nulls`, NaN and empty-string cells are sent as NULL. Returns the
    /// number of rows inserted.
    ///
    /// # Errors
    /// `InvalidIdentifier`/`ValidationError` for bad names or column lists, otherwise the
    /// batch error.
    pub async fn export(
        &self,
        data: &Table,
        table: &str,
        columns: &[&str],
        remove_nulls: bool,
    ) -> Result<u64, SqlWarehouseError> {
        let columns = owned(columns);
        let indices = data.column_indices(&columns, "columns")?;
        let statement = sql::insert_sql(self.dialect(), table, &columns)?;

        if data.is_empty() {
            tracing::debug!(table, "no rows to export");
            return Ok(0);
        }

        let mut rows = data.project(&indices);
        if remove_nulls {
            normalize_nulls(&mut rows);
        }
        self.execute_batch(&statement, &rows).await?;
        Ok(row_count(rows.len()))
    }

    /// Insert rows, updating the non-match columns of rows whose `match_columns` already
    /// exist. When every column is a match column, existing rows are left untouched.
    ///
    /// Returns the number of rows processed.
    ///
    /// # Errors
    /// `ValidationError` when `match_columns` is empty or not a subset of `columns`, plus
    /// everything [`export`](Self::export) can return.
    pub async fn upsert(
        &self,
        data: &Table,
        table: &str,
        columns: &[&str],
        match_columns: &[&str],
        remove_nulls: bool,
    ) -> Result<u64, SqlWarehouseError> {
        let columns = owned(columns);
        let match_columns = owned(match_columns);
        let indices = data.column_indices(&columns, "columns")?;
        if match_columns.is_empty() {
            return Err(SqlWarehouseError::validation(
                "match_columns cannot be empty",
            ));
        }
        if let Some(stray) = match_columns.iter().find(|m| !columns.contains(m)) {
            return Err(SqlWarehouseError::validation(format!(
                "match_columns must be a subset of columns; '{stray}' is not selected"
            )));
        }
        let statement = self.dialect().upsert_sql(table, &columns, &match_columns)?;

        if data.is_empty() {
            tracing::debug!(table, "no rows to upsert");
            return Ok(0);
        }

        let mut rows = data.project(&indices);
        if remove_nulls {
            normalize_nulls(&mut rows);
        }
        self.execute_batch(&statement, &rows).await?;
        Ok(row_count(rows.len()))
    }

    /// Delete the rows of `table` whose `match_columns` equal those of any row in `data`.
    ///
    /// Duplicate keys in `data` are collapsed first, so one delete runs per distinct key.
    /// Returns the number of distinct keys, not the number of rows the database removed.
    ///
    /// # Errors
    /// `InvalidIdentifier`/`ValidationError` for bad names or column lists, otherwise the
    /// batch error.
    pub async fn remove_matching(
        &self,
        data: &Table,
        table: &str,
        match_columns: &[&str],
    ) -> Result<u64, SqlWarehouseError> {
        let match_columns = owned(match_columns);
        let indices = data.column_indices(&match_columns, "match_columns")?;
        let statement = sql::delete_matching_sql(self.dialect(), table, &match_columns)?;

        if data.is_empty() {
            tracing::debug!(table, "no keys to remove");
            return Ok(0);
        }

        let keys = data.distinct_on(&indices);
        self.execute_batch(&statement, &keys).await?;
        Ok(row_count(keys.len()))
    }

    /// `TRUNCATE TABLE` on a validated name.
    ///
    /// # Errors
    /// `InvalidIdentifier` for a bad name, otherwise the driver error.
    pub async fn truncate(&self, table: &str) -> Result<u64, SqlWarehouseError> {
        let statement = sql::truncate_sql(self.dialect(), table)?;
        self.execute(&statement).await
    }

    /// `DELETE FROM` every row of a validated table name.
    ///
    /// # Errors
    /// `InvalidIdentifier` for a bad name, otherwise the driver error.
    pub async fn empty(&self, table: &str) -> Result<u64, SqlWarehouseError> {
        let statement = sql::empty_sql(self.dialect(), table)?;
        self.execute(&statement).await
    }
}
