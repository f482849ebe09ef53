// Postgres backend over tokio-postgres.
//
// - config: credentials to `tokio_postgres::Config`
// - params: `RowValues` binding and `:name` resolution
// - query: row extraction into `ResultSet`
// - driver: `Driver`/`DriverConnection` implementation

pub mod config;
pub mod driver;
pub mod params;
pub mod query;

pub use driver::{PostgresDriver, PostgresSession};
pub use params::Params as PgParams;
pub use query::build_result_set_from_statement;

use crate::config::ManagerConfig;
use crate::error::SqlWarehouseError;
use crate::manager::ConnectionManager;

/// Async connection manager for a Postgres target.
pub type PostgresConnection = ConnectionManager<PostgresDriver>;

impl ConnectionManager<PostgresDriver> {
    /// # Errors
    /// Returns `ConfigError` when `config` fails validation.
    pub fn postgres(config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        Self::new(PostgresDriver::new(), config)
    }
}
