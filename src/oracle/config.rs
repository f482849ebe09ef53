use crate::config::{Credentials, OracleTarget};
use crate::error::SqlWarehouseError;

/// Build a TCP connect descriptor for the listener named by `credentials`.
///
/// The service name wins when both a service and a SID are present.
///
/// ```rust
/// use sql_warehouse::prelude::*;
/// use sql_warehouse::oracle::connect_descriptor;
///
/// let creds = Credentials::new("svc", "x", "db1", 1521).with_sid("LEGACY");
/// assert_eq!(
///     connect_descriptor(&creds)?,
///     "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=db1)(PORT=1521))(CONNECT_DATA=(SID=LEGACY)))"
/// );
/// # Ok::<(), SqlWarehouseError>(())
/// ```
///
/// # Errors
/// Returns `SqlWarehouseError::ConfigError` when neither a service nor a SID is set.
pub fn connect_descriptor(credentials: &Credentials) -> Result<String, SqlWarehouseError> {
    let connect_data = match credentials.oracle_target() {
        Some(OracleTarget::ServiceName(service)) => format!("SERVICE_NAME={}", service.trim()),
        Some(OracleTarget::Sid(sid)) => format!("SID={}", sid.trim()),
        None => {
            return Err(SqlWarehouseError::ConfigError(
                "Service or SID is required".to_string(),
            ));
        }
    };
    Ok(format!(
        "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST={})(PORT={}))(CONNECT_DATA=({connect_data})))",
        credentials.host.trim(),
        credentials.port
    ))
}
