use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

use crate::dialect::{Dialect, OracleDialect, PostgresDialect};

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is bound on both backends, so bulk writers and callers never branch on
/// driver types:
/// ```rust
/// use sql_warehouse::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `true` for the cells a bulk write treats as missing: NULL, NaN and the empty string.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            RowValues::Null => true,
            RowValues::Float(f) => f.is_nan(),
            RowValues::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

impl From<&JsonValue> for RowValues {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(RowValues::Int)
                .or_else(|| n.as_f64().map(RowValues::Float))
                .unwrap_or(RowValues::Null),
            JsonValue::String(s) => RowValues::Text(s.clone()),
            other => RowValues::JSON(other.clone()),
        }
    }
}

/// The database backends this crate speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `PostgreSQL`-style backend
    Postgres,
    /// Oracle-style backend
    Oracle,
}

impl DatabaseType {
    /// SQL dialect used to quote identifiers, render binds and classify transient errors.
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        static POSTGRES: PostgresDialect = PostgresDialect;
        static ORACLE: OracleDialect = OracleDialect;
        match self {
            DatabaseType::Postgres => &POSTGRES,
            DatabaseType::Oracle => &ORACLE,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Postgres => f.write_str("postgres"),
            DatabaseType::Oracle => f.write_str("oracle"),
        }
    }
}

/// Bind values for a single statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No bind values.
    #[default]
    None,
    /// Values bound by position (`$1` on Postgres, `:1` on Oracle).
    Positional(Vec<RowValues>),
    /// Values bound by name (`:name` on both backends).
    Named(Vec<(String, RowValues)>),
}

impl Params {
    /// Build named params from `(name, value)` pairs.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(values) => values.is_empty(),
            Params::Named(pairs) => pairs.is_empty(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(pairs) => pairs.len(),
        }
    }
}

impl From<Vec<RowValues>> for Params {
    fn from(values: Vec<RowValues>) -> Self {
        Params::Positional(values)
    }
}

/// A query and its parameters bundled together.
///
/// `execute_sequence` takes a list of these and commits them as one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAndParams {
    /// The SQL query string
    pub query: String,
    /// The parameters to be bound to the query
    pub params: Params,
}

impl QueryAndParams {
    /// Create a new `QueryAndParams` with the given query string and parameters
    pub fn new(query: impl Into<String>, params: impl Into<Params>) -> Self {
        Self {
            query: query.into(),
            params: params.into(),
        }
    }

    /// Create a new `QueryAndParams` with no parameters
    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Params::None,
        }
    }
}
