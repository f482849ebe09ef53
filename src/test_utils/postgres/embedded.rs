use postgresql_embedded::PostgreSQL;

use super::super::SHARED_RUNTIME;
use crate::config::{Credentials, ManagerConfig};
use crate::postgres::PostgresConnection;
use crate::types::Params;

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    /// Credentials that log into `database` on the running server
    pub credentials: Credentials,
}

/// Start an embedded `PostgreSQL` server and create `db_name` on it.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, if the database cannot be
/// created, or if the post-start connectivity check fails.
pub fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();

        // Bundled binaries, no download
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(db_name).await?;

        let settings = postgresql.settings();
        let credentials = Credentials::new(
            settings.username.clone(),
            settings.password.clone(),
            settings.host.clone(),
            settings.port,
        )
        .with_database(db_name);

        let probe = PostgresConnection::postgres(ManagerConfig::default().with_retry_limit(0))?;
        probe.set_user(credentials.clone()).await?;
        probe.fetch("SELECT 1", Params::None).await?;
        probe.close().await?;
        tracing::info!(port = credentials.port, database = db_name, "embedded postgres ready");

        Ok(EmbeddedPostgres {
            postgresql,
            credentials,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
