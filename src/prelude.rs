//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{Credentials, ManagerConfig, OracleTarget};
pub use crate::dialect::{Dialect, OracleDialect, PostgresDialect};
pub use crate::driver::{Driver, DriverConnection};
pub use crate::error::SqlWarehouseError;
pub use crate::identifier::{quote_oracle_identifier, quote_postgres_identifier, validate_identifier};
pub use crate::manager::{ConnectionManager, ConnectionMode, ManagerStatus};
pub use crate::pool::Checkout;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::retry::{RetryDecision, RetryPolicy, Sleeper, ThreadSleeper, TokioSleeper};
pub use crate::table::Table;
pub use crate::translation::translate_named_binds;
pub use crate::types::{DatabaseType, Params, QueryAndParams, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnection, PostgresDriver};

#[cfg(feature = "oracle")]
pub use crate::oracle::{OracleConnection, OracleDriver};
