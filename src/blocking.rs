//! Blocking front end over the async [`crate::manager::ConnectionManager`].
//!
//! Each call drives the async operation with `Runtime::block_on` on the caller's thread,
//! and retry waits use [`ThreadSleeper`], so pool checkouts, commits and retry delays all
//! block the caller. Behaviour is otherwise identical to the async manager.
//!
//! Do not call these methods from inside a tokio runtime; `block_on` panics there.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::config::{Credentials, ManagerConfig};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::SqlWarehouseError;
use crate::manager::{ConnectionManager as AsyncConnectionManager, ConnectionMode, ManagerStatus};
use crate::pool::Checkout;
use crate::results::ResultSet;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::table::Table;
use crate::types::{Params, QueryAndParams, RowValues};

#[cfg(feature = "oracle")]
use crate::oracle::OracleDriver;
#[cfg(feature = "postgres")]
use crate::postgres::PostgresDriver;

/// Blocking manager for a Postgres target.
#[cfg(feature = "postgres")]
pub type PostgresConnection = ConnectionManager<PostgresDriver>;

/// Blocking manager for an Oracle target.
#[cfg(feature = "oracle")]
pub type OracleConnection = ConnectionManager<OracleDriver>;

/// A [`crate::manager::ConnectionManager`] with its own runtime.
///
/// ```rust,no_run
/// use sql_warehouse::blocking::PostgresConnection;
/// use sql_warehouse::prelude::*;
///
/// let db = PostgresConnection::postgres(ManagerConfig::default())?;
/// db.set_user(Credentials::new("svc", "x", "db1", 5432).with_database("warehouse"))?;
/// let rows = db.fetch("SELECT id FROM items WHERE id = :id", Params::named([("id", 1)]))?;
/// db.close()?;
/// # let _ = rows;
/// # Ok::<(), SqlWarehouseError>(())
/// ```
pub struct ConnectionManager<D: Driver> {
    inner: AsyncConnectionManager<D>,
    runtime: Runtime,
}

impl<D: Driver> ConnectionManager<D> {
    /// # Errors
    /// Returns `ConfigError` when `config` fails validation, or `ConnectionError` when the
    /// runtime cannot be started.
    pub fn new(driver: D, config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        let inner = AsyncConnectionManager::new(driver, config)?
            .with_sleeper(Arc::new(ThreadSleeper));
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("sql-warehouse")
            .build()
            .map_err(|e| {
                SqlWarehouseError::ConnectionError(format!("failed to start runtime: {e}"))
            })?;
        Ok(Self { inner, runtime })
    }

    /// Build a manager and connect it in one step.
    ///
    /// # Errors
    /// Anything [`new`](Self::new) or [`set_user`](Self::set_user) returns.
    pub fn connect(
        driver: D,
        config: ManagerConfig,
        credentials: Credentials,
    ) -> Result<Self, SqlWarehouseError> {
        let manager = Self::new(driver, config)?;
        manager.set_user(credentials)?;
        Ok(manager)
    }

    /// Replace how retry waits are performed. The default blocks the calling thread.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.inner = self.inner.with_sleeper(sleeper);
        self
    }

    /// The async manager this front end drives.
    #[must_use]
    pub fn as_async(&self) -> &AsyncConnectionManager<D> {
        &self.inner
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        self.inner.config()
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.inner.dialect()
    }

    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        self.inner.mode()
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::set_user`].
    pub fn set_user(&self, credentials: Credentials) -> Result<(), SqlWarehouseError> {
        self.runtime.block_on(self.inner.set_user(credentials))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::reconnect`].
    pub fn reconnect(&self) -> Result<(), SqlWarehouseError> {
        self.runtime.block_on(self.inner.reconnect())
    }

    /// Check out a connection, blocking while the pool is saturated.
    ///
    /// # Errors
    /// See [`crate::manager::ConnectionManager::get_connection`].
    pub fn get_connection(&self) -> Result<Checkout<D>, SqlWarehouseError> {
        self.runtime.block_on(self.inner.get_connection())
    }

    pub fn release(&self, checkout: Checkout<D>) {
        self.inner.release(checkout);
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::close`].
    pub fn close(&self) -> Result<(), SqlWarehouseError> {
        self.runtime.block_on(self.inner.close())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.runtime.block_on(self.inner.is_connected())
    }

    #[must_use]
    pub fn status(&self) -> ManagerStatus {
        self.runtime.block_on(self.inner.status())
    }

    /// Run `f`, then close the manager whether or not `f` succeeded.
    ///
    /// # Errors
    /// Returns the error from `f`, or from closing when `f` succeeded.
    pub fn scoped<F, T>(&self, f: F) -> Result<T, SqlWarehouseError>
    where
        F: FnOnce(&Self) -> Result<T, SqlWarehouseError>,
    {
        let result = f(self);
        let closed = self.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::execute`].
    pub fn execute(&self, sql: &str) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.execute(sql))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::safe_execute`].
    pub fn safe_execute(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.safe_execute(sql, params))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::execute_sequence`].
    pub fn execute_sequence(
        &self,
        statements: &[QueryAndParams],
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.execute_sequence(statements))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::execute_batch`].
    pub fn execute_batch(
        &self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.execute_batch(sql, rows))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::fetch`].
    pub fn fetch(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<ResultSet, SqlWarehouseError> {
        self.runtime.block_on(self.inner.fetch(sql, params))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::export`].
    pub fn export(
        &self,
        data: &Table,
        table: &str,
        columns: &[&str],
        remove_nulls: bool,
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime
            .block_on(self.inner.export(data, table, columns, remove_nulls))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::upsert`].
    pub fn upsert(
        &self,
        data: &Table,
        table: &str,
        columns: &[&str],
        match_columns: &[&str],
        remove_nulls: bool,
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(
            self.inner
                .upsert(data, table, columns, match_columns, remove_nulls),
        )
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::remove_matching`].
    pub fn remove_matching(
        &self,
        data: &Table,
        table: &str,
        match_columns: &[&str],
    ) -> Result<u64, SqlWarehouseError> {
        self.runtime
            .block_on(self.inner.remove_matching(data, table, match_columns))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::truncate`].
    pub fn truncate(&self, table: &str) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.truncate(table))
    }

    /// # Errors
    /// See [`crate::manager::ConnectionManager::empty`].
    pub fn empty(&self, table: &str) -> Result<u64, SqlWarehouseError> {
        self.runtime.block_on(self.inner.empty(table))
    }
}

#[cfg(feature = "postgres")]
impl ConnectionManager<PostgresDriver> {
    /// # Errors
    /// See [`ConnectionManager::new`].
    pub fn postgres(config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        Self::new(PostgresDriver::new(), config)
    }
}

#[cfg(feature = "oracle")]
impl ConnectionManager<OracleDriver> {
    /// # Errors
    /// See [`ConnectionManager::new`].
    pub fn oracle(config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        Self::new(OracleDriver::new(), config)
    }
}

impl<D: Driver> std::fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::ConnectionManager")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
