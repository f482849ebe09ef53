//! Helpers for tests: tracing setup, a scripted in-memory driver, and (with
//! `test-utils-postgres`) an embedded Postgres server.

use std::sync::Once;
#[cfg(feature = "test-utils-postgres")]
use std::sync::LazyLock;

#[cfg(feature = "test-utils-postgres")]
use tokio::runtime::Runtime;

pub mod mock;

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;

/// Shared tokio runtime for test utilities to avoid creating multiple runtimes
#[cfg(feature = "test-utils-postgres")]
pub(crate) static SHARED_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("Failed to create tokio runtime for test utilities"));

static TRACING: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `warn`). Safe to call from
/// every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
