//! `Value` <-> PostgreSQL wire types.
//!
//! Parameters are coerced to the type the server inferred for each
//! placeholder, so a `Value::Int` can fill an `int4` column and a
//! `Value::Text` can fill a `uuid` or `date` one.

use crate::error::{ChainError, ChainResult};
use crate::record::Record;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => rust_decimal::Decimal::from(v).to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(format!("cannot bind an integer to a column of type '{ty}'").into()),
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => v.to_sql(ty, out),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => rust_decimal::Decimal::try_from(v)?.to_sql(ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(format!("cannot bind a float to a column of type '{ty}'").into()),
    }
}

/// Text parameters are parsed into the target type.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let t = s.trim();
    match *ty {
        Type::INT2 => t.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => t.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => t.parse::<i64>()?.to_sql(ty, out),
        Type::OID => t.parse::<u32>()?.to_sql(ty, out),
        Type::FLOAT4 => t.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => t.parse::<f64>()?.to_sql(ty, out),
        Type::BOOL => match t.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" | "yes" | "on" => true.to_sql(ty, out),
            "f" | "false" | "0" | "no" | "off" => false.to_sql(ty, out),
            other => Err(format!("cannot read '{other}' as boolean").into()),
        },
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => t.parse::<rust_decimal::Decimal>()?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(t)?.to_sql(ty, out),
        Type::DATE => t.parse::<NaiveDate>()?.to_sql(ty, out),
        Type::TIMESTAMP => parse_naive_datetime(t)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => t.parse::<DateTime<Utc>>()?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)
            .unwrap_or_else(|_| serde_json::Value::String(s.to_string()))
            .to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| s.parse::<NaiveDateTime>())
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => int_to_sql(*v, ty, out),
            Value::Float(v) => float_to_sql(*v, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
            Value::Bytes(b) => b.as_slice().to_sql_checked(ty, out),
            Value::Json(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) if *ty == Type::TIMESTAMPTZ => v.and_utc().to_sql(ty, out),
            Value::Timestamp(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) if *ty == Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
            Value::TimestampTz(v) if is_text(ty) => v.to_rfc3339().to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Date(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(v) if is_text(ty) => v.to_string().to_sql(ty, out),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Coercion is decided per value in `to_sql`; unsupported targets are
        // reported there instead of being written in the wrong format.
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

pub(crate) fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn cell<'a, T>(row: &'a Row, idx: usize, column: &str) -> ChainResult<Value>
where
    T: tokio_postgres::types::FromSql<'a> + Into<Value>,
{
    row.try_get::<_, Option<T>>(idx)
        .map(|v| v.map_or(Value::Null, Into::into))
        .map_err(|e| ChainError::decode(column, e.to_string()))
}

/// Decode one row by column type.
pub(crate) fn decode_row(columns: &Arc<[String]>, row: &Row) -> ChainResult<Record> {
    let mut values = Vec::with_capacity(columns.len());
    for (idx, col) in row.columns().iter().enumerate() {
        let name = col.name();
        let value = match *col.type_() {
            Type::BOOL => cell::<bool>(row, idx, name)?,
            Type::INT2 => cell::<i16>(row, idx, name)?,
            Type::INT4 => cell::<i32>(row, idx, name)?,
            Type::INT8 => cell::<i64>(row, idx, name)?,
            Type::OID => cell::<u32>(row, idx, name)?,
            Type::FLOAT4 => cell::<f32>(row, idx, name)?,
            Type::FLOAT8 => cell::<f64>(row, idx, name)?,
            #[cfg(feature = "rust_decimal")]
            Type::NUMERIC => cell::<rust_decimal::Decimal>(row, idx, name)?,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                cell::<String>(row, idx, name)?
            }
            Type::BYTEA => cell::<Vec<u8>>(row, idx, name)?,
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<serde_json::Value>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Json))
                .map_err(|e| ChainError::decode(name, e.to_string()))?,
            Type::UUID => cell::<Uuid>(row, idx, name)?,
            Type::DATE => cell::<NaiveDate>(row, idx, name)?,
            Type::TIMESTAMP => cell::<NaiveDateTime>(row, idx, name)?,
            Type::TIMESTAMPTZ => cell::<DateTime<Utc>>(row, idx, name)?,
            ref other => {
                return Err(ChainError::decode(
                    name,
                    format!("unsupported column type '{other}'"),
                ));
            }
        };
        values.push(value);
    }
    Ok(Record::new(Arc::clone(columns), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: &Value, ty: &Type) -> Result<Vec<u8>, BoxError> {
        let mut out = BytesMut::new();
        v.to_sql(ty, &mut out)?;
        Ok(out.to_vec())
    }

    #[test]
    fn ints_narrow_to_the_column_width() {
        assert_eq!(encode(&Value::Int(7), &Type::INT4).unwrap(), 7_i32.to_be_bytes());
        assert_eq!(encode(&Value::Int(7), &Type::INT2).unwrap(), 7_i16.to_be_bytes());
        assert!(encode(&Value::Int(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn text_is_parsed_for_typed_columns() {
        assert_eq!(encode(&Value::from("42"), &Type::INT8).unwrap(), 42_i64.to_be_bytes());
        assert_eq!(encode(&Value::from("true"), &Type::BOOL).unwrap(), [1]);
        assert!(encode(&Value::from("nope"), &Type::INT4).is_err());
        assert_eq!(encode(&Value::from("abc"), &Type::TEXT).unwrap(), b"abc");
    }

    #[test]
    fn numbers_refuse_non_numeric_columns() {
        assert_eq!(encode(&Value::Int(7), &Type::INT8).unwrap(), 7_i64.to_be_bytes());
        assert_eq!(encode(&Value::Float(1.5), &Type::FLOAT8).unwrap(), 1.5_f64.to_be_bytes());
        assert_eq!(encode(&Value::Int(7), &Type::TEXT).unwrap(), b"7");

        let err = encode(&Value::Int(1), &Type::TIMESTAMP).unwrap_err();
        assert!(err.to_string().contains("timestamp"));
        assert!(encode(&Value::Int(1), &Type::UUID).is_err());
        assert!(encode(&Value::Float(1.0), &Type::DATE).is_err());
    }

    #[test]
    fn typed_values_are_checked_against_the_column() {
        assert!(encode(&Value::Bool(true), &Type::INT4).is_err());
        assert!(encode(&Value::Uuid(Uuid::nil()), &Type::INT8).is_err());
        assert_eq!(encode(&Value::Uuid(Uuid::nil()), &Type::UUID).unwrap(), [0; 16]);
    }

    #[test]
    fn null_is_null_for_any_type() {
        let mut out = BytesMut::new();
        assert!(matches!(Value::Null.to_sql(&Type::INT4, &mut out).unwrap(), IsNull::Yes));
        assert!(out.is_empty());
    }
}
