use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oracle::Connection;

use super::config::connect_descriptor;
use super::params::{NamedParams, Params as OracleParams};
use super::query::build_result_set;
use crate::config::Credentials;
use crate::dialect::{Dialect, OracleDialect};
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::types::{Params, RowValues};

static DIALECT: OracleDialect = OracleDialect;

/// Opens Oracle sessions through ODPI-C. The client is blocking, so every call runs on
/// tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDriver;

impl OracleDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for OracleDriver {
    type Connection = OracleSession;

    fn dialect(&self) -> &'static dyn Dialect {
        &DIALECT
    }

    async fn connect(&self, credentials: &Credentials) -> Result<OracleSession, SqlWarehouseError> {
        let descriptor = connect_descriptor(credentials)?;
        let username = credentials.username.clone();
        let password = credentials.password.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(username, password, descriptor)
        })
        .await??;
        Ok(OracleSession {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// One Oracle session. Autocommit is off, so statements stay pending until `commit`.
pub struct OracleSession {
    conn: Arc<Mutex<Connection>>,
}

impl OracleSession {
    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, SqlWarehouseError>
    where
        F: FnOnce(&Connection) -> Result<T, SqlWarehouseError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| {
                SqlWarehouseError::ConnectionError("oracle connection lock poisoned".to_string())
            })?;
            f(&*guard)
        })
        .await?
    }
}

#[async_trait]
impl DriverConnection for OracleSession {
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, SqlWarehouseError> {
        let sql = sql.to_string();
        let params = params.clone();
        self.with_conn(move |conn| {
            let stmt = match &params {
                Params::None => conn.execute(&sql, &[])?,
                Params::Positional(values) => {
                    let binds = OracleParams::convert(values);
                    conn.execute(&sql, &binds.as_refs())?
                }
                Params::Named(pairs) => {
                    let binds = NamedParams::convert(pairs);
                    conn.execute_named(&sql, &binds.as_refs())?
                }
            };
            Ok(stmt.row_count()?)
        })
        .await
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError> {
        let sql = sql.to_string();
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.statement(&sql).build()?;
            let mut total = 0;
            for row in &rows {
                let binds = OracleParams::convert(row);
                stmt.execute(&binds.as_refs())?;
                total += stmt.row_count()?;
            }
            Ok(total)
        })
        .await
    }

    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, SqlWarehouseError> {
        let sql = sql.to_string();
        let params = params.clone();
        self.with_conn(move |conn| match &params {
            Params::None => build_result_set(conn.query(&sql, &[])?),
            Params::Positional(values) => {
                let binds = OracleParams::convert(values);
                build_result_set(conn.query(&sql, &binds.as_refs())?)
            }
            Params::Named(pairs) => {
                let binds = NamedParams::convert(pairs);
                build_result_set(conn.query_named(&sql, &binds.as_refs())?)
            }
        })
        .await
    }

    async fn commit(&mut self) -> Result<(), SqlWarehouseError> {
        self.with_conn(|conn| Ok(conn.commit()?)).await
    }

    async fn rollback(&mut self) -> Result<(), SqlWarehouseError> {
        self.with_conn(|conn| Ok(conn.rollback()?)).await
    }

    async fn is_healthy(&mut self) -> bool {
        self.with_conn(|conn| Ok(conn.ping().is_ok()))
            .await
            .unwrap_or(false)
    }

    async fn close(&mut self) -> Result<(), SqlWarehouseError> {
        self.with_conn(|conn| Ok(conn.close()?)).await
    }
}
