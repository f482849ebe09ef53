//! Pooled or single-connection access to Postgres and Oracle with transient-error retry,
//! transactional execution and bulk writes from tabular data.
//!
//! The async [`ConnectionManager`] is the core; [`blocking::ConnectionManager`] drives the
//! same code from synchronous callers.

pub mod blocking;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod manager;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod retry;
pub mod table;
pub mod translation;
pub mod types;
pub mod writer;

#[cfg(feature = "oracle")]
pub mod oracle;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{Credentials, ManagerConfig};
pub use error::SqlWarehouseError;
pub use manager::{ConnectionManager, ConnectionMode, ManagerStatus};
pub use results::{CustomDbRow, ResultSet};
pub use table::Table;
pub use types::{DatabaseType, Params, QueryAndParams, RowValues};

#[cfg(feature = "oracle")]
pub use oracle::OracleConnection;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
