//! A scripted in-memory [`Driver`] that records what the manager asks of it.
//!
//! Clone the driver before handing it to a manager; every clone shares the same script
//! and event log.
//!
//! ```rust
//! use sql_warehouse::prelude::*;
//! use sql_warehouse::test_utils::mock::{MockDriver, MockEvent};
//!
//! let rt = tokio::runtime::Runtime::new()?;
//! rt.block_on(async {
//!     let driver = MockDriver::oracle();
//!     let db = ConnectionManager::new(driver.clone(), ManagerConfig::default())?;
//!     db.set_user(Credentials::new("svc", "x", "db1", 1521).with_service("ORCL")).await?;
//!     db.execute("DELETE FROM ITEMS").await?;
//!     assert!(driver.events().contains(&MockEvent::Commit));
//!     Ok::<(), SqlWarehouseError>(())
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::retry::Sleeper;
use crate::types::{DatabaseType, Params, RowValues};

/// One call the manager made on the driver or a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Connect,
    Execute { sql: String, params: Params },
    ExecuteMany { sql: String, rows: Vec<Vec<RowValues>> },
    Query { sql: String, params: Params },
    Commit,
    Rollback,
    Close,
}

impl MockEvent {
    /// SQL text of a statement event.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            MockEvent::Execute { sql, .. }
            | MockEvent::ExecuteMany { sql, .. }
            | MockEvent::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// A scripted failure. `code: None` produces an error without a structured code.
#[derive(Debug, Clone)]
struct Failure {
    code: Option<String>,
    message: String,
}

impl Failure {
    fn into_error(self) -> SqlWarehouseError {
        match self.code {
            Some(code) => SqlWarehouseError::coded(code, self.message),
            None => SqlWarehouseError::Other(self.message),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<MockEvent>,
    connect_failures: VecDeque<Failure>,
    statement_failures: VecDeque<Failure>,
    close_failures: VecDeque<Failure>,
    columns: Vec<String>,
    rows: Vec<Vec<RowValues>>,
    affected: u64,
    hold: Duration,
    next_id: usize,
    open: HashSet<usize>,
    broken: HashSet<usize>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory driver for either dialect.
#[derive(Debug, Clone)]
pub struct MockDriver {
    database_type: DatabaseType,
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockDriver {
    #[must_use]
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            state: Arc::new(Mutex::new(MockState {
                affected: 1,
                ..MockState::default()
            })),
        }
    }

    #[must_use]
    pub fn oracle() -> Self {
        Self::new(DatabaseType::Oracle)
    }

    #[must_use]
    pub fn postgres() -> Self {
        Self::new(DatabaseType::Postgres)
    }

    /// Fail the next `times` connection attempts with `code`.
    pub fn fail_connects(&self, code: &str, times: usize) {
        let mut state = lock(&self.state);
        for _ in 0..times {
            state.connect_failures.push_back(Failure {
                code: Some(code.to_string()),
                message: format!("{code}: scripted connect failure"),
            });
        }
    }

    /// Fail the next `times` statements (execute, execute_many or query) with `code`.
    pub fn fail_statements(&self, code: &str, times: usize) {
        let mut state = lock(&self.state);
        for _ in 0..times {
            state.statement_failures.push_back(Failure {
                code: Some(code.to_string()),
                message: format!("{code}: scripted statement failure"),
            });
        }
    }

    /// Fail the next statement with an error that carries no code.
    pub fn fail_statement_uncoded(&self, message: &str) {
        lock(&self.state).statement_failures.push_back(Failure {
            code: None,
            message: message.to_string(),
        });
    }

    /// Fail the next `close` with an uncoded error. The connection still counts as closed.
    pub fn fail_next_close(&self, message: &str) {
        lock(&self.state).close_failures.push_back(Failure {
            code: None,
            message: message.to_string(),
        });
    }

    /// Rows returned by every query.
    pub fn set_rows(&self, columns: &[&str], rows: Vec<Vec<RowValues>>) {
        let mut state = lock(&self.state);
        state.columns = columns.iter().map(|c| (*c).to_string()).collect();
        state.rows = rows;
    }

    /// Affected-row count reported by `execute` (default 1).
    pub fn set_affected(&self, affected: u64) {
        lock(&self.state).affected = affected;
    }

    /// Keep each statement in flight for `hold` before it completes.
    pub fn set_hold(&self, hold: Duration) {
        lock(&self.state).hold = hold;
    }

    /// Make every connection open right now fail its health check.
    pub fn break_open_connections(&self) {
        let mut state = lock(&self.state);
        let open: Vec<usize> = state.open.iter().copied().collect();
        state.broken.extend(open);
    }

    #[must_use]
    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// SQL text of every statement attempted, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|e| e.sql().map(str::to_string))
            .collect()
    }

    /// Number of `Connect` events, failed attempts included.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Connect))
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        lock(&self.state).events.iter().filter(|e| predicate(e)).count()
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        lock(&self.state).open.len()
    }

    /// Highest number of statements that were running at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        lock(&self.state).max_in_flight
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Connection = MockConnection;

    fn dialect(&self) -> &'static dyn Dialect {
        self.database_type.dialect()
    }

    async fn connect(&self, _credentials: &Credentials) -> Result<MockConnection, SqlWarehouseError> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Connect);
        if let Some(failure) = state.connect_failures.pop_front() {
            return Err(failure.into_error());
        }
        state.next_id += 1;
        let id = state.next_id;
        state.open.insert(id);
        Ok(MockConnection {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection handed out by [`MockDriver`].
#[derive(Debug)]
pub struct MockConnection {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Record `event`, hold it in flight, then apply the next scripted failure if any.
    async fn statement(&self, event: MockEvent) -> Result<(), SqlWarehouseError> {
        let hold = {
            let mut state = lock(&self.state);
            state.events.push(event);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.hold
        };
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
        let mut state = lock(&self.state);
        state.in_flight -= 1;
        match state.statement_failures.pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, SqlWarehouseError> {
        self.statement(MockEvent::Execute {
            sql: sql.to_string(),
            params: params.clone(),
        })
        .await?;
        Ok(lock(&self.state).affected)
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlWarehouseError> {
        self.statement(MockEvent::ExecuteMany {
            sql: sql.to_string(),
            rows: rows.to_vec(),
        })
        .await?;
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }

    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, SqlWarehouseError> {
        self.statement(MockEvent::Query {
            sql: sql.to_string(),
            params: params.clone(),
        })
        .await?;
        let state = lock(&self.state);
        let mut result = ResultSet::with_capacity(state.rows.len());
        result.set_column_names(Arc::new(state.columns.clone()));
        for row in &state.rows {
            result.add_row_values(row.clone());
        }
        Ok(result)
    }

    async fn commit(&mut self) -> Result<(), SqlWarehouseError> {
        lock(&self.state).events.push(MockEvent::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlWarehouseError> {
        lock(&self.state).events.push(MockEvent::Rollback);
        Ok(())
    }

    async fn is_healthy(&mut self) -> bool {
        let state = lock(&self.state);
        state.open.contains(&self.id) && !state.broken.contains(&self.id)
    }

    async fn close(&mut self) -> Result<(), SqlWarehouseError> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Close);
        state.open.remove(&self.id);
        match state.close_failures.pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        lock(&self.state).open.remove(&self.id);
    }
}

/// Sleeper that records each requested delay and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delay);
    }
}
