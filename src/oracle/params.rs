use chrono::NaiveDateTime;
use oracle::sql_type::ToSql;

use crate::types::RowValues;

/// One owned bind value in a form the `oracle` client accepts.
///
/// Booleans go over as `1`/`0` and JSON as its text, since plain SQL has neither type
/// before 23ai.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
    Null(Option<String>),
}

impl Bind {
    #[must_use]
    pub fn as_to_sql(&self) -> &dyn ToSql {
        match self {
            Bind::Int(v) => v,
            Bind::Float(v) => v,
            Bind::Text(v) => v,
            Bind::Timestamp(v) => v,
            Bind::Blob(v) => v,
            Bind::Null(v) => v,
        }
    }
}

impl From<&RowValues> for Bind {
    fn from(value: &RowValues) -> Self {
        match value {
            RowValues::Int(i) => Bind::Int(*i),
            RowValues::Float(f) => Bind::Float(*f),
            RowValues::Text(s) => Bind::Text(s.clone()),
            RowValues::Bool(b) => Bind::Int(i64::from(*b)),
            RowValues::Timestamp(dt) => Bind::Timestamp(*dt),
            RowValues::Null => Bind::Null(None),
            RowValues::JSON(json) => Bind::Text(json.to_string()),
            RowValues::Blob(bytes) => Bind::Blob(bytes.clone()),
        }
    }
}

/// Positional binds for one statement execution.
#[derive(Debug, Clone, Default)]
pub struct Params {
    binds: Vec<Bind>,
}

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Params {
        Params {
            binds: params.iter().map(Bind::from).collect(),
        }
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn ToSql> {
        self.binds.iter().map(Bind::as_to_sql).collect()
    }
}

/// Binds matched to `:name` placeholders by the server.
#[derive(Debug, Clone, Default)]
pub struct NamedParams {
    binds: Vec<(String, Bind)>,
}

impl NamedParams {
    /// A leading `:` on a name is dropped; the client wants bare names.
    #[must_use]
    pub fn convert(pairs: &[(String, RowValues)]) -> NamedParams {
        NamedParams {
            binds: pairs
                .iter()
                .map(|(name, value)| {
                    (name.trim_start_matches(':').to_string(), Bind::from(value))
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<(&str, &dyn ToSql)> {
        self.binds
            .iter()
            .map(|(name, bind)| (name.as_str(), bind.as_to_sql()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_types_without_native_sql_equivalents() {
        let params = Params::convert(&[
            RowValues::Bool(true),
            RowValues::JSON(json!({"a": 1})),
            RowValues::Null,
        ]);
        assert_eq!(
            params.binds,
            vec![
                Bind::Int(1),
                Bind::Text("{\"a\":1}".to_string()),
                Bind::Null(None),
            ]
        );
        assert_eq!(params.as_refs().len(), 3);
    }

    #[test]
    fn named_binds_drop_leading_colon() {
        let named = NamedParams::convert(&[
            (":ID".to_string(), RowValues::Int(1)),
            ("NAME".to_string(), RowValues::from("a")),
        ]);
        let names: Vec<&str> = named.as_refs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ID", "NAME"]);
    }
}
