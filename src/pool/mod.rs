//! Connection handles: a deadpool-managed pool or one cached connection.

mod checkout;

pub use checkout::Checkout;

use std::fmt;
use std::sync::Arc;

use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use tokio::sync::Mutex;

use crate::config::Credentials;
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;

/// deadpool manager that opens connections through a [`Driver`].
pub struct DriverManager<D: Driver> {
    driver: Arc<D>,
    credentials: Credentials,
}

impl<D: Driver> DriverManager<D> {
    pub fn new(driver: Arc<D>, credentials: Credentials) -> Self {
        Self {
            driver,
            credentials,
        }
    }
}

impl<D: Driver> fmt::Debug for DriverManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverManager")
            .field("host", &self.credentials.host)
            .field("port", &self.credentials.port)
            .finish()
    }
}

impl<D: Driver> Manager for DriverManager<D> {
    type Type = D::Connection;
    type Error = SqlWarehouseError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.driver.connect(&self.credentials).await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        if conn.is_healthy().await {
            Ok(())
        } else {
            tracing::debug!("discarding pooled connection that failed its health check");
            Err(RecycleError::Backend(SqlWarehouseError::ConnectionError(
                "pooled connection failed health check".to_string(),
            )))
        }
    }
}

pub type DriverPool<D> = Pool<DriverManager<D>>;

/// The one live connection handle a manager owns.
pub(crate) enum ConnectionHandle<D: Driver> {
    Closed,
    Pooled(DriverPool<D>),
    Single(Arc<Mutex<Option<D::Connection>>>),
}

impl<D: Driver> ConnectionHandle<D> {
    /// Build a pool capped at `max_connections` and open `min_connections` up front.
    pub(crate) async fn open_pool(
        driver: Arc<D>,
        credentials: Credentials,
        min_connections: usize,
        max_connections: usize,
    ) -> Result<Self, SqlWarehouseError> {
        let pool = Pool::builder(DriverManager::new(driver, credentials))
            .max_size(max_connections)
            .build()
            .map_err(|e| {
                SqlWarehouseError::ConfigError(format!("failed to build connection pool: {e}"))
            })?;

        let mut warm = Vec::with_capacity(min_connections);
        for _ in 0..min_connections {
            match pool.get().await {
                Ok(conn) => warm.push(conn),
                Err(err) => {
                    pool.close();
                    return Err(err.into());
                }
            }
        }
        drop(warm);

        tracing::debug!(
            min_connections,
            max_connections,
            "created connection pool"
        );
        Ok(ConnectionHandle::Pooled(pool))
    }

    pub(crate) async fn open_single(
        driver: &D,
        credentials: &Credentials,
    ) -> Result<Self, SqlWarehouseError> {
        let conn = driver.connect(credentials).await?;
        tracing::debug!("created single connection");
        Ok(ConnectionHandle::Single(Arc::new(Mutex::new(Some(conn)))))
    }

    pub(crate) fn is_open(&self) -> bool {
        !matches!(self, ConnectionHandle::Closed)
    }

    /// Close the handle. A single connection is only closed if it still answers.
    pub(crate) async fn close(self) {
        match self {
            ConnectionHandle::Closed => {}
            ConnectionHandle::Pooled(pool) => {
                pool.close();
                tracing::debug!("closed connection pool");
            }
            ConnectionHandle::Single(slot) => {
                let mut guard = slot.lock().await;
                if let Some(mut conn) = guard.take() {
                    if conn.is_healthy().await {
                        if let Err(err) = conn.close().await {
                            tracing::warn!(error = %err, "failed to close connection");
                        }
                    }
                    tracing::debug!("closed single connection");
                }
            }
        }
    }
}

impl<D: Driver> Clone for ConnectionHandle<D> {
    fn clone(&self) -> Self {
        match self {
            ConnectionHandle::Closed => ConnectionHandle::Closed,
            ConnectionHandle::Pooled(pool) => ConnectionHandle::Pooled(pool.clone()),
            ConnectionHandle::Single(slot) => ConnectionHandle::Single(Arc::clone(slot)),
        }
    }
}
