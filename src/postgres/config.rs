use crate::config::Credentials;
use crate::error::SqlWarehouseError;

/// Translate credentials into a tokio-postgres connection config.
///
/// # Errors
/// Returns `SqlWarehouseError::ConfigError` if the database name is missing.
pub fn pg_config(credentials: &Credentials) -> Result<tokio_postgres::Config, SqlWarehouseError> {
    let dbname = credentials
        .database
        .as_deref()
        .filter(|db| !db.trim().is_empty())
        .ok_or_else(|| SqlWarehouseError::ConfigError("Database is required".to_string()))?;

    let mut config = tokio_postgres::Config::new();
    config
        .host(&credentials.host)
        .port(credentials.port)
        .user(&credentials.username)
        .password(&credentials.password)
        .dbname(dbname)
        .application_name("sql-warehouse");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_credentials() {
        let creds = Credentials::new("svc", "x", "db1", 5433).with_database("warehouse");
        let config = pg_config(&creds).unwrap();
        assert_eq!(config.get_user(), Some("svc"));
        assert_eq!(config.get_dbname(), Some("warehouse"));
        assert_eq!(config.get_ports(), &[5433]);
        assert!(pg_config(&Credentials::new("svc", "x", "db1", 5432)).is_err());
    }
}
