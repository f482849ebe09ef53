// Oracle backend over the blocking `oracle` (ODPI-C) client.
//
// - config: credentials to a connect descriptor
// - params: `RowValues` binding
// - query: row extraction into `ResultSet`
// - driver: `Driver`/`DriverConnection` implementation, calls moved onto the blocking pool

pub mod config;
pub mod driver;
pub mod params;
pub mod query;

pub use config::connect_descriptor;
pub use driver::{OracleDriver, OracleSession};

use crate::config::ManagerConfig;
use crate::error::SqlWarehouseError;
use crate::manager::ConnectionManager;

/// Async connection manager for an Oracle target.
pub type OracleConnection = ConnectionManager<OracleDriver>;

impl ConnectionManager<OracleDriver> {
    /// # Errors
    /// Returns `ConfigError` when `config` fails validation.
    pub fn oracle(config: ManagerConfig) -> Result<Self, SqlWarehouseError> {
        Self::new(OracleDriver::new(), config)
    }
}
