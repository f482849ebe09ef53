use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[cfg(feature = "postgres")]
use tokio_postgres;

/// First `ORA-01033` / `DPI-1080` / `DPY-6005` style code in an Oracle driver message.
static ORACLE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:ORA|DPY|DPI)-\d{4,5})\b").expect("static oracle code pattern")
});

#[derive(Debug, Error)]
pub enum SqlWarehouseError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "oracle")]
    #[error(transparent)]
    OracleError(#[from] oracle::Error),

    /// A driver error that carries its structured code as data. `source` holds the
    /// driver error the code was assigned to, when there is one.
    #[error("Database error {code}: {message}")]
    DatabaseError {
        code: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlWarehouseError {
    /// Structured error code reported by the driver, if any.
    ///
    /// Postgres errors yield their SQLSTATE (`08004`), Oracle errors the leading
    /// `ORA-`/`DPY-`/`DPI-` code. Errors without a code (client-side I/O failures,
    /// validation, configuration) return `None`; the retry policy treats those as fatal.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        match self {
            #[cfg(feature = "postgres")]
            SqlWarehouseError::PostgresError(err) => err.code().map(|state| state.code().to_string()),
            #[cfg(feature = "oracle")]
            SqlWarehouseError::OracleError(err) => oracle_code_from_message(&err.to_string()),
            SqlWarehouseError::DatabaseError { code, .. } => Some(code.clone()),
            _ => None,
        }
    }

    /// `true` for errors raised by input checks before any network call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SqlWarehouseError::InvalidIdentifier(_)
                | SqlWarehouseError::ValidationError(_)
                | SqlWarehouseError::ConfigError(_)
        )
    }

    /// A coded error with no underlying driver error.
    #[must_use]
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        SqlWarehouseError::DatabaseError {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SqlWarehouseError::ValidationError(message.into())
    }
}

/// Extract the first Oracle error code from a driver message.
#[must_use]
pub fn oracle_code_from_message(message: &str) -> Option<String> {
    ORACLE_CODE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl From<deadpool::managed::PoolError<SqlWarehouseError>> for SqlWarehouseError {
    fn from(err: deadpool::managed::PoolError<SqlWarehouseError>) -> Self {
        match err {
            // Keep the driver error intact so its code stays visible to the retry policy.
            deadpool::managed::PoolError::Backend(inner) => inner,
            deadpool::managed::PoolError::Closed => {
                SqlWarehouseError::NotConnected("connection pool is closed".to_string())
            }
            other => SqlWarehouseError::ConnectionError(format!("pool checkout failed: {other}")),
        }
    }
}

impl From<tokio::task::JoinError> for SqlWarehouseError {
    fn from(err: tokio::task::JoinError) -> Self {
        SqlWarehouseError::Other(format!("blocking driver task failed: {err}"))
    }
}
