//! Transient-error retry around one top-level database call.
//!
//! Every executor and writer operation runs through [`RetryPolicy::run`]. The attempt
//! counter lives on the stack of that call, so each operation starts from zero. The wait
//! between attempts is fixed (no backoff) and performed by an injected [`Sleeper`], which
//! is the only difference between the async and blocking managers.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::ManagerConfig;
use crate::dialect::Dialect;
use crate::error::SqlWarehouseError;

/// Default wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(300);
/// Default number of retries per call.
pub const DEFAULT_RETRY_LIMIT: u32 = 50;

/// How a retry wait is performed.
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, delay: Duration);
}

/// Suspends the task on the tokio timer; the worker thread stays free.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Blocks the calling thread for the whole delay.
///
/// Only meaningful when the surrounding future is driven by `Runtime::block_on` on the
/// caller's own thread, which is how [`crate::blocking`] uses it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

#[async_trait]
impl Sleeper for ThreadSleeper {
    async fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Outcome of inspecting one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient code with budget left.
    Retry,
    /// Transient code, but `retry_limit` retries were already spent.
    Exhausted,
    /// No structured code, or a code outside the transient list.
    Fatal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry_limit: u32,
    retry_error_codes: Arc<[String]>,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    pub fn new<I, S>(retry_limit: u32, retry_error_codes: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retry_limit,
            retry_error_codes: retry_error_codes.into_iter().map(Into::into).collect(),
            delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Policy for a manager: the configured override list wins over the dialect's codes.
    #[must_use]
    pub fn from_config(config: &ManagerConfig, dialect: &dyn Dialect) -> Self {
        let codes: Vec<String> = match &config.retry_error_codes {
            Some(codes) => codes.clone(),
            None => dialect
                .retry_error_codes()
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        };
        Self::new(config.retry_limit, codes, config.retry_delay)
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn retry_error_codes(&self) -> &[String] {
        &self.retry_error_codes
    }

    #[must_use]
    pub fn is_retryable_code(&self, code: &str) -> bool {
        self.retry_error_codes.iter().any(|c| c == code)
    }

    /// Decide what to do after a failure, given how many retries were already made.
    #[must_use]
    pub fn classify(&self, err: &SqlWarehouseError, attempts: u32) -> RetryDecision {
        match err.error_code() {
            Some(code) if self.is_retryable_code(&code) => {
                if attempts < self.retry_limit {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Exhausted
                }
            }
            _ => RetryDecision::Fatal,
        }
    }

    /// Run `attempt` until it succeeds or fails with something not worth retrying.
    ///
    /// The error returned is always the one raised by the last attempt.
    ///
    /// # Errors
    /// Returns the last attempt's error on a fatal code or once the limit is spent.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt: F,
    ) -> Result<T, SqlWarehouseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SqlWarehouseError>>,
    {
        let mut attempts: u32 = 0;
        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match self.classify(&err, attempts) {
                RetryDecision::Retry => {
                    attempts += 1;
                    let code = err.error_code().unwrap_or_default();
                    debug!(operation, code = %code, "Database connection error");
                    debug!(operation, message = %err, "Error message");
                    info!(
                        operation,
                        "Retry attempt {attempts}/{}. Waiting {}s before retrying connection",
                        self.retry_limit,
                        self.delay.as_secs()
                    );
                    self.sleeper.sleep(self.delay).await;
                }
                RetryDecision::Exhausted => {
                    error!(
                        operation,
                        code = %err.error_code().unwrap_or_default(),
                        "Retry limit ({}) reached",
                        self.retry_limit
                    );
                    return Err(err);
                }
                RetryDecision::Fatal => {
                    if let Some(code) = err.error_code() {
                        error!(operation, code = %code, "Non-retryable database error");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_LIMIT,
            Vec::<String>::new(),
            DEFAULT_RETRY_DELAY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coded(code: &str) -> SqlWarehouseError {
        SqlWarehouseError::coded(code, "test")
    }

    #[test]
    fn classify_follows_codes_and_budget() {
        let policy = RetryPolicy::new(2, ["08004"], Duration::ZERO);
        assert_eq!(policy.classify(&coded("08004"), 0), RetryDecision::Retry);
        assert_eq!(policy.classify(&coded("08004"), 1), RetryDecision::Retry);
        assert_eq!(policy.classify(&coded("08004"), 2), RetryDecision::Exhausted);
        assert_eq!(policy.classify(&coded("42601"), 0), RetryDecision::Fatal);
        assert_eq!(
            policy.classify(&SqlWarehouseError::ConnectionError("reset".into()), 0),
            RetryDecision::Fatal
        );
        assert_eq!(
            policy.classify(&SqlWarehouseError::validation("empty columns"), 0),
            RetryDecision::Fatal
        );
    }

    #[test]
    fn zero_limit_never_retries() {
        let policy = RetryPolicy::new(0, ["08004"], Duration::ZERO);
        assert_eq!(policy.classify(&coded("08004"), 0), RetryDecision::Exhausted);
    }

    #[test]
    fn config_override_replaces_dialect_codes() {
        use crate::dialect::PostgresDialect;

        let config = ManagerConfig::default();
        let policy = RetryPolicy::from_config(&config, &PostgresDialect);
        assert!(policy.is_retryable_code("08001"));
        assert_eq!(policy.retry_limit(), 50);
        assert_eq!(policy.delay(), Duration::from_secs(300));

        let config = ManagerConfig::default().with_retry_error_codes(["57P01"]);
        let policy = RetryPolicy::from_config(&config, &PostgresDialect);
        assert!(policy.is_retryable_code("57P01"));
        assert!(!policy.is_retryable_code("08001"));
    }
}
