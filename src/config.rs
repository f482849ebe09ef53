use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SqlWarehouseError;
use crate::retry::{DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT};
use crate::types::DatabaseType;

/// Login details for one database target.
///
/// Deserializes from the credential-vault record layout:
/// ```rust
/// use sql_warehouse::prelude::*;
///
/// let creds = Credentials::from_json_str(
///     r#"{"UserName": "svc", "Password": "x", "Host": "db1", "Port": "1521", "Service": "ORCL"}"#,
/// )?;
/// assert_eq!(creds.port, 1521);
/// assert!(creds.validate(DatabaseType::Oracle).is_ok());
/// # Ok::<(), SqlWarehouseError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "UserName")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    /// Oracle service name.
    #[serde(rename = "Service", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Legacy Oracle instance identifier, used when no service name is given.
    #[serde(rename = "SID", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Postgres database name.
    #[serde(rename = "Database", default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            port,
            service: None,
            sid: None,
            database: None,
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Parse a JSON credential record.
    ///
    /// # Errors
    /// Returns `SqlWarehouseError::ConfigError` when the JSON is malformed or a field is
    /// missing.
    pub fn from_json_str(json: &str) -> Result<Self, SqlWarehouseError> {
        serde_json::from_str(json)
            .map_err(|e| SqlWarehouseError::ConfigError(format!("invalid credentials: {e}")))
    }

    /// Check that the credentials name a target the backend can connect to.
    ///
    /// Oracle needs a service name or a SID; Postgres needs a database name.
    ///
    /// # Errors
    /// Returns `SqlWarehouseError::ConfigError` naming the first missing field.
    pub fn validate(&self, database_type: DatabaseType) -> Result<(), SqlWarehouseError> {
        if self.username.trim().is_empty() {
            return Err(SqlWarehouseError::ConfigError(
                "UserName is required".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(SqlWarehouseError::ConfigError("Host is required".to_string()));
        }
        match database_type {
            DatabaseType::Oracle => {
                if non_blank(self.service.as_deref()).is_none()
                    && non_blank(self.sid.as_deref()).is_none()
                {
                    return Err(SqlWarehouseError::ConfigError(
                        "Service or SID is required".to_string(),
                    ));
                }
            }
            DatabaseType::Postgres => {
                if non_blank(self.database.as_deref()).is_none() {
                    return Err(SqlWarehouseError::ConfigError(
                        "Database is required".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Service name when present, otherwise the SID.
    #[must_use]
    pub fn oracle_target(&self) -> Option<OracleTarget<'_>> {
        non_blank(self.service.as_deref())
            .map(OracleTarget::ServiceName)
            .or_else(|| non_blank(self.sid.as_deref()).map(OracleTarget::Sid))
    }
}

/// How an Oracle listener identifies the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleTarget<'a> {
    ServiceName(&'a str),
    Sid(&'a str),
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service", &self.service)
            .field("sid", &self.sid)
            .field("database", &self.database)
            .finish()
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'"))),
    }
}

/// Connection and retry settings for a `ConnectionManager`.
///
/// Every field has a default, so `{}` is a valid JSON config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Pooled mode when `true`, one cached connection otherwise.
    pub use_pool: bool,
    /// Connections opened eagerly when the pool is created.
    pub min_connections: usize,
    /// Upper bound on simultaneous pool checkouts.
    pub max_connections: usize,
    /// Retries allowed per call before the error is returned.
    pub retry_limit: u32,
    /// Fixed wait between attempts.
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
    /// Replaces the dialect's transient code list when set.
    pub retry_error_codes: Option<Vec<String>>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            use_pool: false,
            min_connections: 2,
            max_connections: 5,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_error_codes: None,
        }
    }
}

impl ManagerConfig {
    /// Defaults with pooled mode switched on.
    #[must_use]
    pub fn pooled() -> Self {
        Self {
            use_pool: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pool(mut self, use_pool: bool) -> Self {
        self.use_pool = use_pool;
        self
    }

    #[must_use]
    pub fn with_min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry_error_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retry_error_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// # Errors
    /// Returns `SqlWarehouseError::ConfigError` for a zero-sized pool or `min > max`.
    pub fn validate(&self) -> Result<(), SqlWarehouseError> {
        if self.use_pool {
            if self.max_connections == 0 {
                return Err(SqlWarehouseError::ConfigError(
                    "max_connections must be at least 1".to_string(),
                ));
            }
            if self.min_connections > self.max_connections {
                return Err(SqlWarehouseError::ConfigError(format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                )));
            }
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_accept_numeric_and_string_ports() {
        let a = Credentials::from_json_str(
            r#"{"UserName":"svc","Password":"x","Host":"db1","Port":1521,"Service":"ORCL"}"#,
        )
        .unwrap();
        let b = Credentials::from_json_str(
            r#"{"UserName":"svc","Password":"x","Host":"db1","Port":"1521","Service":"ORCL"}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert!(
            Credentials::from_json_str(
                r#"{"UserName":"svc","Password":"x","Host":"db1","Port":"abc"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn validation_per_backend() {
        let base = Credentials::new("svc", "x", "db1", 1521);
        assert!(base.validate(DatabaseType::Oracle).is_err());
        assert!(base.validate(DatabaseType::Postgres).is_err());
        assert!(base.clone().with_sid("ORCL").validate(DatabaseType::Oracle).is_ok());
        assert!(
            base.clone()
                .with_database("warehouse")
                .validate(DatabaseType::Postgres)
                .is_ok()
        );
        assert!(
            Credentials::new("", "x", "db1", 5432)
                .with_database("w")
                .validate(DatabaseType::Postgres)
                .is_err()
        );
    }

    #[test]
    fn service_takes_precedence_over_sid() {
        let creds = Credentials::new("svc", "x", "db1", 1521)
            .with_sid("LEGACY")
            .with_service("ORCL");
        assert_eq!(creds.oracle_target(), Some(OracleTarget::ServiceName("ORCL")));
        let creds = Credentials::new("svc", "x", "db1", 1521).with_sid("LEGACY");
        assert_eq!(creds.oracle_target(), Some(OracleTarget::Sid("LEGACY")));
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("svc", "hunter2", "db1", 1521);
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn manager_config_defaults_and_checks() {
        let config: ManagerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert!(!config.use_pool);
        assert_eq!((config.min_connections, config.max_connections), (2, 5));
        assert_eq!(config.retry_limit, 50);
        assert_eq!(config.retry_delay, Duration::from_secs(300));

        let config: ManagerConfig =
            serde_json::from_str(r#"{"use_pool": true, "retry_delay": 1}"#).unwrap();
        assert!(config.use_pool);
        assert_eq!(config.retry_delay, Duration::from_secs(1));

        assert!(ManagerConfig::pooled().with_max_connections(0).validate().is_err());
        assert!(
            ManagerConfig::pooled()
                .with_min_connections(6)
                .validate()
                .is_err()
        );
        assert!(ManagerConfig::pooled().validate().is_ok());
    }
}
