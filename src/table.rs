//! Rectangular caller data for the bulk writers.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue};

use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Rows of values under uniquely named columns.
///
/// ```rust
/// use sql_warehouse::prelude::*;
///
/// let table = Table::new(
///     ["ID", "NAME"],
///     vec![vec![RowValues::Int(1), RowValues::Text("a".into())]],
/// )?;
/// assert_eq!(table.len(), 1);
/// # Ok::<(), SqlWarehouseError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<RowValues>>,
}

impl Table {
    /// # Errors
    /// Returns `ValidationError` for duplicate column names or a row whose width differs
    /// from the column count.
    pub fn new<I, S>(columns: I, rows: Vec<Vec<RowValues>>) -> Result<Self, SqlWarehouseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SqlWarehouseError::validation(format!(
                    "duplicate column '{column}'"
                )));
            }
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(SqlWarehouseError::validation(format!(
                "row {i} has {} values but the table has {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from JSON objects. Columns appear in first-seen order; keys missing
    /// from a record become NULL.
    ///
    /// # Errors
    /// Currently infallible for any list of objects.
    pub fn from_records(records: &[Map<String, JsonValue>]) -> Result<Self, SqlWarehouseError> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map_or(RowValues::Null, RowValues::from))
                    .collect()
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Parse a JSON array of objects.
    ///
    /// # Errors
    /// Returns `ValidationError` when the text is not an array of objects.
    pub fn from_json(json: &str) -> Result<Self, SqlWarehouseError> {
        let records: Vec<Map<String, JsonValue>> = serde_json::from_str(json).map_err(|e| {
            SqlWarehouseError::validation(format!("expected a JSON array of objects: {e}"))
        })?;
        Self::from_records(&records)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positions of `subset` within the table's columns.
    ///
    /// `label` names the argument in error messages (`columns`, `match_columns`).
    ///
    /// # Errors
    /// Returns `ValidationError` when `subset` is empty, repeats a name, or names a column
    /// the table does not have.
    pub fn column_indices(
        &self,
        subset: &[String],
        label: &str,
    ) -> Result<Vec<usize>, SqlWarehouseError> {
        if subset.is_empty() {
            return Err(SqlWarehouseError::validation(format!(
                "{label} cannot be empty"
            )));
        }
        let mut seen = HashSet::with_capacity(subset.len());
        let mut missing = Vec::new();
        let mut indices = Vec::with_capacity(subset.len());
        for name in subset {
            if !seen.insert(name.as_str()) {
                return Err(SqlWarehouseError::validation(format!(
                    "{label} lists '{name}' more than once"
                )));
            }
            match self.columns.iter().position(|c| c == name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(SqlWarehouseError::validation(format!(
                "{label} must be a subset of the table columns; not found: {}",
                missing.join(", ")
            )));
        }
        Ok(indices)
    }

    /// Every row narrowed to `indices`, in that order.
    #[must_use]
    pub fn project(&self, indices: &[usize]) -> Vec<Vec<RowValues>> {
        self.rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect()
    }

    /// Distinct projections onto `indices`, keeping the first occurrence of each.
    ///
    /// NaN equals NaN and `-0.0` equals `0.0` here, while `Int(1)` differs from `Float(1.0)`.
    #[must_use]
    pub fn distinct_on(&self, indices: &[usize]) -> Vec<Vec<RowValues>> {
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for row in &self.rows {
            let key: Vec<CellKey<'_>> = indices.iter().map(|&i| CellKey::from(&row[i])).collect();
            if seen.insert(key) {
                distinct.push(indices.iter().map(|&i| row[i].clone()).collect());
            }
        }
        distinct
    }
}

/// Hashable view of a cell for duplicate detection.
#[derive(PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Text(&'a str),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Json(String),
    Blob(&'a [u8]),
}

impl<'a> From<&'a RowValues> for CellKey<'a> {
    fn from(value: &'a RowValues) -> Self {
        match value {
            RowValues::Null => CellKey::Null,
            RowValues::Int(i) => CellKey::Int(*i),
            RowValues::Float(f) if f.is_nan() => CellKey::Float(f64::NAN.to_bits()),
            RowValues::Float(f) if *f == 0.0 => CellKey::Float(0.0_f64.to_bits()),
            RowValues::Float(f) => CellKey::Float(f.to_bits()),
            RowValues::Text(s) => CellKey::Text(s),
            RowValues::Bool(b) => CellKey::Bool(*b),
            RowValues::Timestamp(dt) => CellKey::Timestamp(*dt),
            RowValues::JSON(v) => CellKey::Json(v.to_string()),
            RowValues::Blob(bytes) => CellKey::Blob(bytes),
        }
    }
}

/// Replace NaN and empty-string cells with NULL.
pub fn normalize_nulls(rows: &mut [Vec<RowValues>]) {
    for cell in rows.iter_mut().flat_map(|row| row.iter_mut()) {
        if cell.is_missing() {
            *cell = RowValues::Null;
        }
    }
}

impl From<ResultSet> for Table {
    fn from(result: ResultSet) -> Self {
        let columns = result
            .get_column_names()
            .map(|names| names.as_ref().clone())
            .unwrap_or_default();
        Self {
            columns,
            rows: result.into_tuples(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        assert!(Table::new(["A", "A"], vec![]).is_err());
        assert!(Table::new(["A", "B"], vec![vec![RowValues::Int(1)]]).is_err());
        assert!(Table::new(["A"], vec![vec![RowValues::Int(1)]]).is_ok());
    }

    #[test]
    fn records_fill_missing_keys_with_null() {
        let table =
            Table::from_json(r#"[{"ID": 1, "NAME": "a"}, {"ID": 2}, {"ID": 3, "QTY": 1.5}]"#)
                .unwrap();
        assert_eq!(table.columns(), &names(&["ID", "NAME", "QTY"])[..]);
        assert_eq!(
            table.rows()[1],
            vec![RowValues::Int(2), RowValues::Null, RowValues::Null]
        );
        assert_eq!(table.rows()[2][2], RowValues::Float(1.5));
        assert!(Table::from_json(r#"{"ID": 1}"#).is_err());
    }

    #[test]
    fn column_subset_checks() {
        let table = Table::new(["ID", "NAME"], vec![]).unwrap();
        assert_eq!(table.column_indices(&names(&["NAME", "ID"]), "columns").unwrap(), vec![1, 0]);
        assert!(table.column_indices(&[], "columns").is_err());
        assert!(table.column_indices(&names(&["ID", "ID"]), "columns").is_err());
        let err = table
            .column_indices(&names(&["ID", "QTY"]), "match_columns")
            .unwrap_err();
        assert!(err.to_string().contains("match_columns"));
        assert!(err.to_string().contains("QTY"));
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let table = Table::new(
            ["K", "V"],
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(1), RowValues::Text("b".into())],
                vec![RowValues::Float(f64::NAN), RowValues::Null],
                vec![RowValues::Float(f64::NAN), RowValues::Null],
                vec![RowValues::Int(2), RowValues::Null],
            ],
        )
        .unwrap();
        let keys = table.distinct_on(&[0]);
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], vec![RowValues::Int(1)]);
        assert_eq!(keys[2], vec![RowValues::Int(2)]);
    }

    #[test]
    fn distinct_treats_signed_zero_as_one_key() {
        let table = Table::new(
            ["K"],
            vec![
                vec![RowValues::Float(-0.0)],
                vec![RowValues::Float(0.0)],
                vec![RowValues::Int(0)],
                vec![RowValues::Float(1.0)],
            ],
        )
        .unwrap();
        let keys = table.distinct_on(&[0]);
        assert_eq!(keys.len(), 3);
        assert!(matches!(keys[0][0], RowValues::Float(f) if f == 0.0 && f.is_sign_negative()));
        assert_eq!(keys[1], vec![RowValues::Int(0)]);
    }

    #[test]
    fn normalization_targets_nan_and_empty_text() {
        let mut rows = vec![vec![
            RowValues::Float(f64::NAN),
            RowValues::Text(String::new()),
            RowValues::Text(" ".into()),
            RowValues::Float(0.0),
            RowValues::Int(0),
        ]];
        normalize_nulls(&mut rows);
        assert_eq!(
            rows[0],
            vec![
                RowValues::Null,
                RowValues::Null,
                RowValues::Text(" ".into()),
                RowValues::Float(0.0),
                RowValues::Int(0),
            ]
        );
    }
}
