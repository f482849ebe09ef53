use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::config::{Credentials, ManagerConfig};
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;
use crate::pool::{Checkout, ConnectionHandle};
use crate::retry::{RetryPolicy, Sleeper};

/// Whether a manager shares a pool or owns one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Pooled,
    Single,
}

/// Point-in-time view of a manager's connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStatus {
    pub mode: ConnectionMode,
    pub connected: bool,
    /// Connections currently held by the pool (pooled mode only).
    pub pool_size: Option<usize>,
    /// Idle connections ready for checkout (pooled mode only).
    pub pool_available: Option<usize>,
    pub pool_max_size: Option<usize>,
}

struct ManagerState<D: Driver> {
    credentials: Option<Credentials>,
    handle: ConnectionHandle<D>,
}

/// Owns the credentials and the connection handle for one database target.
///
/// The handle is a pool when [`ManagerConfig::use_pool`] is set, otherwise one lazily
/// health-checked connection. Nothing connects until [`set_user`](Self::set_user); after
/// [`close`](Self::close) every operation fails with `NotConnected` until `set_user` or
/// [`reconnect`](Self::reconnect) is called again.
pub struct ConnectionManager<D: Driver> {
    driver: Arc<D>,
    config: ManagerConfig,
    retry: RetryPolicy,
    state: RwLock<ManagerState<D>>,
}

impl<D: Driver> ConnectionManager<D> {
    /// # Errors
    /// Returns `SqlWarehouseError::ConfigError` when `config` fails validation.
    pub fn new(driver: D, config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        config.validate()?;
        let retry = RetryPolicy::from_config(&config, driver.dialect());
        Ok(Self {
            driver: Arc::new(driver),
            config,
            retry,
            state: RwLock::new(ManagerState {
                credentials: None,
                handle: ConnectionHandle::Closed,
            }),
        })
    }

    /// Replace how retry waits are performed.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry = self.retry.with_sleeper(sleeper);
        self
    }

    /// Build a manager and connect it in one step.
    ///
    /// # Errors
    /// Anything [`new`](Self::new) or [`set_user`](Self::set_user) returns.
    pub async fn connect(
        driver: D,
        config: ManagerConfig,
        credentials: Credentials,
    ) -> Result<Self, SqlWarehouseError> {
        let manager = Self::new(driver, config)?;
        manager.set_user(credentials).await?;
        Ok(manager)
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.driver.dialect()
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        if self.config.use_pool {
            ConnectionMode::Pooled
        } else {
            ConnectionMode::Single
        }
    }

    /// Store `credentials` and connect with them, replacing any previous handle.
    ///
    /// # Errors
    /// Returns `ConfigError` before any network call when the credentials do not name a
    /// database, otherwise the connect error once retries are exhausted.
    pub async fn set_user(&self, credentials: Credentials) -> Result<(), SqlWarehouseError> {
        credentials.validate(self.dialect().database_type())?;

        let previous = {
            let mut state = self.state.write().await;
            state.credentials = Some(credentials.clone());
            std::mem::replace(&mut state.handle, ConnectionHandle::Closed)
        };
        previous.close().await;

        self.open(credentials).await
    }

    /// Re-establish connectivity with the stored credentials.
    ///
    /// # Errors
    /// Returns `NotConnected` if `set_user` was never called, otherwise the connect error.
    pub async fn reconnect(&self) -> Result<(), SqlWarehouseError> {
        let (credentials, previous) = {
            let mut state = self.state.write().await;
            let credentials = state.credentials.clone().ok_or_else(|| {
                SqlWarehouseError::NotConnected("no credentials have been set".to_string())
            })?;
            let previous = std::mem::replace(&mut state.handle, ConnectionHandle::Closed);
            (credentials, previous)
        };
        previous.close().await;

        self.open(credentials).await
    }

    async fn open(&self, credentials: Credentials) -> Result<(), SqlWarehouseError> {
        let handle = self
            .retry
            .run("connect", || {
                let credentials = credentials.clone();
                async move {
                    if self.config.use_pool {
                        ConnectionHandle::open_pool(
                            Arc::clone(&self.driver),
                            credentials,
                            self.config.min_connections,
                            self.config.max_connections,
                        )
                        .await
                    } else {
                        ConnectionHandle::open_single(self.driver.as_ref(), &credentials).await
                    }
                }
            })
            .await?;

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut state.handle, handle)
        };
        // A concurrent set_user may have won the race; keep the newest handle only.
        previous.close().await;
        Ok(())
    }

    /// Check out a connection for one operation.
    ///
    /// Pooled mode waits while all `max_connections` are checked out. Single mode hands out
    /// the cached connection after a health check, reconnecting first if the check fails.
    ///
    /// # Errors
    /// Returns `NotConnected` when the manager is closed, or the connect error when a
    /// replacement connection cannot be opened.
    pub async fn get_connection(&self) -> Result<Checkout<D>, SqlWarehouseError> {
        let (handle, credentials) = {
            let state = self.state.read().await;
            (state.handle.clone(), state.credentials.clone())
        };

        match handle {
            ConnectionHandle::Closed => Err(SqlWarehouseError::NotConnected(
                "connection manager is closed; call set_user or reconnect".to_string(),
            )),
            ConnectionHandle::Pooled(pool) => Ok(Checkout::Pooled(pool.get().await?)),
            ConnectionHandle::Single(slot) => {
                let mut guard = slot.lock_owned().await;
                let healthy = match guard.as_mut() {
                    Some(conn) => conn.is_healthy().await,
                    // Emptied by a concurrent close.
                    None => {
                        return Err(SqlWarehouseError::NotConnected(
                            "connection manager is closed; call set_user or reconnect".to_string(),
                        ));
                    }
                };
                if !healthy {
                    let credentials = credentials.ok_or_else(|| {
                        SqlWarehouseError::NotConnected("no credentials have been set".to_string())
                    })?;
                    tracing::debug!("cached connection failed health check, reconnecting");
                    let fresh = self.driver.connect(&credentials).await?;
                    if let Some(mut stale) = guard.replace(fresh) {
                        if let Err(err) = stale.close().await {
                            tracing::warn!(error = %err, "failed to close stale connection");
                        }
                    }
                }
                OwnedMutexGuard::try_map(guard, |slot| slot.as_mut())
                    .map(Checkout::Single)
                    .map_err(|_| {
                        SqlWarehouseError::NotConnected("connection was closed".to_string())
                    })
            }
        }
    }

    /// Give a checkout back. Pooled connections return to the pool; the single
    /// connection stays open.
    pub fn release(&self, checkout: Checkout<D>) {
        drop(checkout);
    }

    /// Close the pool or the cached connection. Credentials are kept for `reconnect`.
    ///
    /// # Errors
    /// Currently infallible; close failures are logged.
    pub async fn close(&self) -> Result<(), SqlWarehouseError> {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut state.handle, ConnectionHandle::Closed)
        };
        previous.close().await;
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.handle.is_open()
    }

    pub async fn status(&self) -> ManagerStatus {
        let state = self.state.read().await;
        let mut status = ManagerStatus {
            mode: self.mode(),
            connected: state.handle.is_open(),
            pool_size: None,
            pool_available: None,
            pool_max_size: None,
        };
        if let ConnectionHandle::Pooled(pool) = &state.handle {
            let pool_status = pool.status();
            status.pool_size = Some(pool_status.size);
            status.pool_available = Some(pool_status.available);
            status.pool_max_size = Some(pool_status.max_size);
        }
        status
    }

    /// Run `f` with the manager, then close it whether or not `f` succeeded.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use sql_warehouse::prelude::*;
    /// # async fn demo(manager: Arc<PostgresConnection>) -> Result<(), SqlWarehouseError> {
    /// let rows = manager
    ///     .scoped(|db| async move { db.fetch("SELECT 1", Params::None).await })
    ///     .await?;
    /// # let _ = rows;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the error from `f`, or from closing when `f` succeeded.
    pub async fn scoped<F, Fut, T>(self: Arc<Self>, f: F) -> Result<T, SqlWarehouseError>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, SqlWarehouseError>>,
    {
        let result = f(Arc::clone(&self)).await;
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

impl<D: Driver> std::fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("database_type", &self.dialect().database_type())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
