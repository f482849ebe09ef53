//! The seam between connection management and a concrete database client.
//!
//! Pooling, retry and the bulk writers only ever talk to these traits. Each backend
//! module provides one implementation; `test_utils::mock` provides a scripted one.

use async_trait::async_trait;

use crate::config::Credentials;
use crate::dialect::Dialect;
use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::types::{Params, RowValues};

/// Opens connections to one kind of database.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Connection: DriverConnection;

    fn dialect(&self) -> &'static dyn Dialect;

    /// Open one connection to the target named by `credentials`.
    ///
    /// # Errors
    /// Returns the driver error, with its code intact, when the connection is refused.
    async fn connect(&self, credentials: &Credentials)
    -> Result<Self::Connection, SqlWarehouseError>;
}

/// One open database session.
///
/// Statements run inside an implicit transaction that stays open until `commit` or
/// `rollback`.
#[async_trait]
pub trait DriverConnection: Send + Sync + 'static {
    /// Run one statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, SqlWarehouseError>;

    /// Run one positional statement once per row.
    async fn execute_many(
        &mut self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError>;

    /// Run a statement and collect every row it returns.
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, SqlWarehouseError>;

    async fn commit(&mut self) -> Result<(), SqlWarehouseError>;

    async fn rollback(&mut self) -> Result<(), SqlWarehouseError>;

    /// Cheap liveness probe; `false` means the connection must be replaced.
    async fn is_healthy(&mut self) -> bool;

    async fn close(&mut self) -> Result<(), SqlWarehouseError>;
}
