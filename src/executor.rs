//! Statement execution on a `ConnectionManager`.
//!
//! Every operation is one retried unit: check out, run, commit, release. A failed attempt
//! is rolled back before its connection goes back, so pooled connections never carry an
//! open transaction to the next caller.

use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;
use crate::manager::ConnectionManager;
use crate::results::ResultSet;
use crate::types::{Params, QueryAndParams, RowValues};

/// Commit a successful attempt or roll back a failed one.
pub(crate) async fn finish<C, T>(
    conn: &mut C,
    result: Result<T, SqlWarehouseError>,
) -> Result<T, SqlWarehouseError>
where
    C: DriverConnection,
{
    match result {
        Ok(value) => match conn.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                rollback_quietly(conn).await;
                Err(err)
            }
        },
        Err(err) => {
            rollback_quietly(conn).await;
            Err(err)
        }
    }
}

async fn rollback_quietly<C: DriverConnection>(conn: &mut C) {
    if let Err(err) = conn.rollback().await {
        tracing::warn!(error = %err, "rollback after failed statement also failed");
    }
}

impl<D: Driver> ConnectionManager<D> {
    /// Run one statement without bind values.
    ///
    /// # Errors
    /// Returns the driver error once retries are exhausted or the code is not transient.
    pub async fn execute(&self, sql: &str) -> Result<u64, SqlWarehouseError> {
        self.safe_execute(sql, Params::None).await
    }

    /// Run one statement with bind values.
    ///
    /// Use this whenever a value comes from outside the program; it is never spliced into
    /// the SQL text.
    ///
    /// # Errors
    /// Returns the driver error once retries are exhausted or the code is not transient.
    pub async fn safe_execute(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<u64, SqlWarehouseError> {
        let params: Params = params.into();
        let params = &params;
        self.retry_policy()
            .run("execute", || async move {
                let mut conn = self.get_connection().await?;
                let result = conn.execute(sql, params).await;
                finish(&mut *conn, result).await
            })
            .await
    }

    /// Run several statements on one connection and commit them together.
    ///
    /// Returns the summed affected row count. A failure rolls back the whole sequence and
    /// the retry restarts it from the first statement.
    ///
    /// # Errors
    /// Returns the first statement error once retries are exhausted.
    pub async fn execute_sequence(
        &self,
        statements: &[QueryAndParams],
    ) -> Result<u64, SqlWarehouseError> {
        self.retry_policy()
            .run("execute_sequence", || async move {
                let mut conn = self.get_connection().await?;
                let mut result = Ok(0u64);
                for statement in statements {
                    match conn.execute(&statement.query, &statement.params).await {
                        Ok(affected) => {
                            result = result.map(|total| total + affected);
                        }
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    }
                }
                finish(&mut *conn, result).await
            })
            .await
    }

    /// Run one positional statement once per row, with a single commit.
    ///
    /// # Errors
    /// Returns the driver error once retries are exhausted or the code is not transient.
    pub async fn execute_batch(
        &self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError> {
        self.retry_policy()
            .run("execute_batch", || async move {
                let mut conn = self.get_connection().await?;
                let result = conn.execute_many(sql, rows).await;
                finish(&mut *conn, result).await
            })
            .await
    }

    /// Run a query and return every row. The implicit transaction is committed afterwards.
    ///
    /// # Errors
    /// Returns the driver error once retries are exhausted or the code is not transient.
    pub async fn fetch(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<ResultSet, SqlWarehouseError> {
        let params: Params = params.into();
        let params = &params;
        self.retry_policy()
            .run("fetch", || async move {
                let mut conn = self.get_connection().await?;
                let result = conn.query(sql, params).await;
                finish(&mut *conn, result).await
            })
            .await
    }
}
