use std::borrow::Cow;
use std::error::Error;

use chrono::{NaiveDate, NaiveDateTime};
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType, to_sql_checked};
use tokio_util::bytes;

use crate::error::SqlWarehouseError;
use crate::translation::{bind_named, translate_named_binds};
use crate::types::{Params as BindParams, RowValues};

/// Borrowed `ToSql` views over a row of values.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let mut references = Vec::with_capacity(params.len());
        for p in params {
            references.push(p as &(dyn ToSql + Sync));
        }
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

/// Final SQL text and positional values for a statement.
///
/// Named binds are rewritten to `$n`; positional values pass through untouched.
///
/// # Errors
/// Returns `ParameterError` when a `:name` in the SQL has no value.
pub fn resolve_binds<'s>(
    sql: &'s str,
    params: &BindParams,
) -> Result<(Cow<'s, str>, Vec<RowValues>), SqlWarehouseError> {
    match params {
        BindParams::None => Ok((Cow::Borrowed(sql), Vec::new())),
        BindParams::Positional(values) => Ok((Cow::Borrowed(sql), values.clone())),
        BindParams::Named(pairs) => {
            let binds = translate_named_binds(sql);
            let values = bind_named(&binds.names, pairs)?;
            Ok((binds.sql, values))
        }
    }
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

fn wrong_type<T>(ty: &Type) -> Box<dyn Error + Sync + Send> {
    Box::new(WrongType::new::<T>(ty.clone()))
}

/// Whole-number floats bind to integer columns; anything fractional is refused.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64, ty: &Type) -> Result<i64, Box<dyn Error + Sync + Send>> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(wrong_type::<f64>(ty))
    }
}

fn int_to_sql(
    i: i64,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        _ => i.to_sql(ty, out),
    }
}

impl ToSql for RowValues {
    /// Each cell binds only to column types that can hold it. Text parses into numeric,
    /// boolean, date, timestamp and JSON columns; numbers, booleans and JSON render into
    /// text columns. Every other pairing is a `WrongType` error.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (RowValues::Null, _) => Ok(IsNull::Yes),

            (RowValues::Int(i), &(Type::INT2 | Type::INT4 | Type::INT8)) => int_to_sql(*i, ty, out),
            (RowValues::Int(i), &Type::FLOAT4) => (*i as f32).to_sql(ty, out),
            (RowValues::Int(i), &Type::FLOAT8) => (*i as f64).to_sql(ty, out),
            (RowValues::Int(i), t) if is_text(t) => i.to_string().to_sql(ty, out),

            (RowValues::Float(f), &(Type::INT2 | Type::INT4 | Type::INT8)) => {
                int_to_sql(integral(*f, ty)?, ty, out)
            }
            (RowValues::Float(f), &Type::FLOAT4) => (*f as f32).to_sql(ty, out),
            (RowValues::Float(f), &Type::FLOAT8) => (*f).to_sql(ty, out),
            (RowValues::Float(f), t) if is_text(t) => f.to_string().to_sql(ty, out),

            (RowValues::Text(s), t) if is_text(t) => s.to_sql(ty, out),
            (RowValues::Text(s), &(Type::INT2 | Type::INT4 | Type::INT8)) => {
                int_to_sql(s.trim().parse::<i64>()?, ty, out)
            }
            (RowValues::Text(s), &Type::FLOAT4) => s.trim().parse::<f32>()?.to_sql(ty, out),
            (RowValues::Text(s), &Type::FLOAT8) => s.trim().parse::<f64>()?.to_sql(ty, out),
            (RowValues::Text(s), &Type::BOOL) => s.trim().parse::<bool>()?.to_sql(ty, out),
            (RowValues::Text(_), &(Type::TIMESTAMP | Type::TIMESTAMPTZ)) => {
                let dt = self
                    .as_timestamp()
                    .ok_or_else(|| wrong_type::<String>(ty))?;
                RowValues::Timestamp(dt).to_sql(ty, out)
            }
            (RowValues::Text(s), &Type::DATE) => s.trim().parse::<NaiveDate>()?.to_sql(ty, out),
            (RowValues::Text(s), &(Type::JSON | Type::JSONB)) => {
                serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
            }

            (RowValues::Bool(b), &Type::BOOL) => (*b).to_sql(ty, out),
            (RowValues::Bool(b), t) if is_text(t) => b.to_string().to_sql(ty, out),

            (RowValues::Timestamp(dt), &Type::TIMESTAMP) => dt.to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMPTZ) => dt.and_utc().to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::DATE) => dt.date().to_sql(ty, out),

            (RowValues::JSON(value), &(Type::JSON | Type::JSONB)) => value.to_sql(ty, out),
            (RowValues::JSON(value), t) if is_text(t) => value.to_string().to_sql(ty, out),

            (RowValues::Blob(bytes), &Type::BYTEA) => bytes.to_sql(ty, out),

            (RowValues::Int(_), _) => Err(wrong_type::<i64>(ty)),
            (RowValues::Float(_), _) => Err(wrong_type::<f64>(ty)),
            (RowValues::Text(_), _) => Err(wrong_type::<String>(ty)),
            (RowValues::Bool(_), _) => Err(wrong_type::<bool>(ty)),
            (RowValues::Timestamp(_), _) => Err(wrong_type::<NaiveDateTime>(ty)),
            (RowValues::JSON(_), _) => Err(wrong_type::<serde_json::Value>(ty)),
            (RowValues::Blob(_), _) => Err(wrong_type::<Vec<u8>>(ty)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}
