use std::sync::Arc;

use chrono::NaiveDateTime;
use oracle::sql_type::OracleType;
use oracle::{ResultSet as OracleRows, Row};

use crate::error::SqlWarehouseError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// `NUMBER` text as an integer when it has no fractional part, otherwise a float.
fn parse_number(text: &str) -> RowValues {
    if let Ok(i) = text.parse::<i64>() {
        return RowValues::Int(i);
    }
    text.parse::<f64>()
        .map_or_else(|_| RowValues::Text(text.to_string()), RowValues::Float)
}

/// Extracts a `RowValues` from an Oracle row at the given index.
///
/// `NUMBER` is fetched as text so large or unscaled values keep their exact digits until
/// they are classified. Types without a dedicated mapping are read as text.
///
/// # Errors
/// Returns `SqlWarehouseError` if the column cannot be decoded.
pub fn oracle_extract_value(
    row: &Row,
    idx: usize,
    oracle_type: &OracleType,
) -> Result<RowValues, SqlWarehouseError> {
    let value = match oracle_type {
        OracleType::Number(_, _) | OracleType::Float(_) => row
            .get::<_, Option<String>>(idx)?
            .map(|s| parse_number(&s)),
        OracleType::Int64 => row.get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        OracleType::BinaryFloat | OracleType::BinaryDouble => {
            row.get::<_, Option<f64>>(idx)?.map(RowValues::Float)
        }
        OracleType::Boolean => row.get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => row
            .get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            row.get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob)
        }
        OracleType::Json => row.get::<_, Option<String>>(idx)?.map(|s| {
            serde_json::from_str(&s).map_or(RowValues::Text(s), RowValues::JSON)
        }),
        _ => row.get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

/// Drain an Oracle result set. Column names come from the cursor description, so an empty
/// result still reports its columns.
///
/// # Errors
/// Returns fetch or extraction errors.
pub fn build_result_set(rows: OracleRows<'_, Row>) -> Result<ResultSet, SqlWarehouseError> {
    let column_info = rows.column_info();
    let column_names: Vec<String> = column_info.iter().map(|c| c.name().to_string()).collect();
    let column_types: Vec<OracleType> =
        column_info.iter().map(|c| c.oracle_type().clone()).collect();

    let mut result_set = ResultSet::with_capacity(0);
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let row = row?;
        let mut row_values = Vec::with_capacity(column_types.len());
        for (idx, oracle_type) in column_types.iter().enumerate() {
            row_values.push(oracle_extract_value(&row, idx, oracle_type)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_keep_integer_identity() {
        assert_eq!(parse_number("42"), RowValues::Int(42));
        assert_eq!(parse_number("-3"), RowValues::Int(-3));
        assert_eq!(parse_number("1.25"), RowValues::Float(1.25));
        assert!(matches!(
            parse_number("123456789012345678901234567890"),
            RowValues::Float(_)
        ));
        assert_eq!(parse_number("abc"), RowValues::Text("abc".into()));
    }
}
