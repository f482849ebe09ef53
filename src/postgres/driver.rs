use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use super::config::pg_config;
use super::params::{Params as PgParams, resolve_binds};
use super::query::build_result_set_from_statement;
use crate::config::Credentials;
use crate::dialect::{Dialect, PostgresDialect};
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::types::{Params, RowValues};

/// SQLSTATE reported by libpq when a connection cannot be established.
const UNABLE_TO_CONNECT: &str = "08001";
/// SQLSTATE for a connection that no longer exists.
const CONNECTION_DOES_NOT_EXIST: &str = "08003";

static DIALECT: PostgresDialect = PostgresDialect;

/// Opens tokio-postgres sessions without TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Give client-side failures the SQLSTATE a server would have used, so the retry policy
/// can tell a refused or dropped connection from a bad statement.
fn coded(err: tokio_postgres::Error, connecting: bool) -> SqlWarehouseError {
    if err.code().is_some() {
        return SqlWarehouseError::PostgresError(err);
    }
    let code = if connecting {
        UNABLE_TO_CONNECT
    } else if err.is_closed() {
        CONNECTION_DOES_NOT_EXIST
    } else {
        return SqlWarehouseError::PostgresError(err);
    };
    SqlWarehouseError::DatabaseError {
        code: code.to_string(),
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    type Connection = PostgresSession;

    fn dialect(&self) -> &'static dyn Dialect {
        &DIALECT
    }

    async fn connect(&self, credentials: &Credentials) -> Result<PostgresSession, SqlWarehouseError> {
        let config = pg_config(credentials)?;
        let (client, connection) = config.connect(NoTls).await.map_err(|e| coded(e, true))?;
        let connection_task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection ended with an error");
            }
        });
        Ok(PostgresSession {
            client,
            connection_task,
            in_transaction: false,
        })
    }
}

/// One Postgres session. The first statement after a commit or rollback opens a
/// transaction, mirroring a driver without autocommit.
pub struct PostgresSession {
    client: Client,
    connection_task: JoinHandle<()>,
    in_transaction: bool,
}

impl PostgresSession {
    async fn begin_if_needed(&mut self) -> Result<(), SqlWarehouseError> {
        if !self.in_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(|e| coded(e, false))?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn end_transaction(&mut self, statement: &str) -> Result<(), SqlWarehouseError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute(statement)
            .await
            .map_err(|e| coded(e, false))
    }
}

#[async_trait]
impl DriverConnection for PostgresSession {
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, SqlWarehouseError> {
        let (sql, values) = resolve_binds(sql, params)?;
        self.begin_if_needed().await?;
        let converted = PgParams::convert(&values);
        self.client
            .execute(&*sql, converted.as_refs())
            .await
            .map_err(|e| coded(e, false))
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError> {
        self.begin_if_needed().await?;
        let stmt = self.client.prepare(sql).await.map_err(|e| coded(e, false))?;
        let mut total = 0;
        for row in rows {
            let converted = PgParams::convert(row);
            total += self
                .client
                .execute(&stmt, converted.as_refs())
                .await
                .map_err(|e| coded(e, false))?;
        }
        Ok(total)
    }

    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, SqlWarehouseError> {
        let (sql, values) = resolve_binds(sql, params)?;
        self.begin_if_needed().await?;
        let stmt = self
            .client
            .prepare(&*sql)
            .await
            .map_err(|e| coded(e, false))?;
        let converted = PgParams::convert(&values);
        let rows = self
            .client
            .query(&stmt, converted.as_refs())
            .await
            .map_err(|e| coded(e, false))?;
        build_result_set_from_statement(&stmt, &rows)
    }

    async fn commit(&mut self) -> Result<(), SqlWarehouseError> {
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlWarehouseError> {
        self.end_transaction("ROLLBACK").await
    }

    async fn is_healthy(&mut self) -> bool {
        !self.client.is_closed() && self.client.simple_query("SELECT 1").await.is_ok()
    }

    async fn close(&mut self) -> Result<(), SqlWarehouseError> {
        if self.in_transaction && !self.client.is_closed() {
            self.rollback().await?;
        }
        self.connection_task.abort();
        Ok(())
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        self.connection_task.abort();
    }
}
