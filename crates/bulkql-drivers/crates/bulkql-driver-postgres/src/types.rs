//! Conversions between bulkql values and PostgreSQL wire types

use crate::numeric::PgNumeric;
use bulkql_core::{BulkqlError, Result, SqlType, Value};
use bytes::BytesMut;
use postgres_types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::Row as PgRow;

/// PostgreSQL parameter type for a declared column type
pub fn pg_type(sql_type: SqlType) -> Type {
    match sql_type {
        SqlType::Bit => Type::BOOL,
        SqlType::TinyInt | SqlType::SmallInt => Type::INT2,
        SqlType::Int => Type::INT4,
        SqlType::BigInt => Type::INT8,
        SqlType::Real => Type::FLOAT4,
        SqlType::Float => Type::FLOAT8,
        SqlType::Decimal { .. } => Type::NUMERIC,
        SqlType::NVarChar(_) | SqlType::VarChar(_) => Type::VARCHAR,
        SqlType::Text => Type::TEXT,
        SqlType::Json => Type::JSONB,
        SqlType::UniqueIdentifier => Type::UUID,
        SqlType::Date => Type::DATE,
        SqlType::Time => Type::TIME,
        SqlType::DateTime2 => Type::TIMESTAMP,
        SqlType::DateTimeOffset => Type::TIMESTAMPTZ,
        SqlType::VarBinary(_) => Type::BYTEA,
    }
}

/// Owned parameter value that tokio-postgres can bind.
///
/// Values are coerced to the width of the prepared parameter type so an
/// `i64` bound to an INT4 slot is written as four bytes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(PgNumeric),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl PgParam {
    pub(crate) fn from_value_for_type(value: &Value, target: &Type) -> Result<Self> {
        let param = match value {
            Value::Null => PgParam::Null,
            Value::Bool(v) => PgParam::Bool(*v),
            Value::Int8(v) => Self::coerce_int(i64::from(*v), target)?,
            Value::Int16(v) => Self::coerce_int(i64::from(*v), target)?,
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target)?,
            Value::Int64(v) => Self::coerce_int(*v, target)?,
            Value::Float32(v) => match *target {
                Type::FLOAT8 => PgParam::Float64(f64::from(*v)),
                _ => PgParam::Float32(*v),
            },
            Value::Float64(v) => match *target {
                Type::FLOAT4 => PgParam::Float32(*v as f32),
                _ => PgParam::Float64(*v),
            },
            Value::Decimal(v) => match *target {
                Type::NUMERIC => PgParam::Numeric(PgNumeric(v.clone())),
                _ => PgParam::String(v.clone()),
            },
            Value::String(v) => Self::coerce_string(v, target),
            Value::Bytes(v) => PgParam::Bytes(v.clone()),
            Value::Uuid(v) => PgParam::Uuid(*v),
            Value::Json(v) => match *target {
                Type::JSON | Type::JSONB => PgParam::Json(v.clone()),
                _ => PgParam::String(v.to_string()),
            },
            Value::DateTimeUtc(v) => PgParam::DateTimeUtc(*v),
            Value::Date(v) => PgParam::Date(*v),
            Value::Time(v) => PgParam::Time(*v),
            Value::DateTime(v) => PgParam::DateTime(*v),
        };
        Ok(param)
    }

    fn coerce_int(value: i64, target: &Type) -> Result<Self> {
        let out_of_range = || {
            BulkqlError::Driver(format!(
                "Type conversion error: {} does not fit in {}",
                value,
                target.name()
            ))
        };
        Ok(match *target {
            Type::INT2 => PgParam::Int16(i16::try_from(value).map_err(|_| out_of_range())?),
            Type::INT4 => PgParam::Int32(i32::try_from(value).map_err(|_| out_of_range())?),
            Type::NUMERIC => PgParam::Numeric(PgNumeric(value.to_string())),
            Type::FLOAT8 => PgParam::Float64(value as f64),
            _ => PgParam::Int64(value),
        })
    }

    fn coerce_string(value: &str, target: &Type) -> Self {
        match *target {
            Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)
                .map(PgParam::Json)
                .unwrap_or_else(|_| PgParam::String(value.to_string())),
            Type::NUMERIC => PgParam::Numeric(PgNumeric(value.to_string())),
            Type::UUID => uuid::Uuid::parse_str(value)
                .map(PgParam::Uuid)
                .unwrap_or_else(|_| PgParam::String(value.to_string())),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgParam::Date)
                .unwrap_or_else(|_| PgParam::String(value.to_string())),
            Type::TIMESTAMP => chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .map(PgParam::DateTime)
                .unwrap_or_else(|_| PgParam::String(value.to_string())),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .map(|ts| PgParam::DateTimeUtc(ts.with_timezone(&chrono::Utc)))
                .unwrap_or_else(|_| PgParam::String(value.to_string())),
            _ => PgParam::String(value.to_string()),
        }
    }

    /// Used when the target type is unknown, e.g. for ad-hoc queries.
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgParam::Null,
            Value::Bool(v) => PgParam::Bool(*v),
            Value::Int8(v) => PgParam::Int16(i16::from(*v)),
            Value::Int16(v) => PgParam::Int16(*v),
            Value::Int32(v) => PgParam::Int32(*v),
            Value::Int64(v) => PgParam::Int64(*v),
            Value::Float32(v) => PgParam::Float32(*v),
            Value::Float64(v) => PgParam::Float64(*v),
            Value::Decimal(v) => PgParam::Numeric(PgNumeric(v.clone())),
            Value::String(v) => PgParam::String(v.clone()),
            Value::Bytes(v) => PgParam::Bytes(v.clone()),
            Value::Uuid(v) => PgParam::Uuid(*v),
            Value::Json(v) => PgParam::Json(v.clone()),
            Value::DateTimeUtc(v) => PgParam::DateTimeUtc(*v),
            Value::Date(v) => PgParam::Date(*v),
            Value::Time(v) => PgParam::Time(*v),
            Value::DateTime(v) => PgParam::DateTime(*v),
        }
    }
}

impl ToSql for PgParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgParam::Null => Ok(IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::Int16(v) => v.to_sql(ty, out),
            PgParam::Int32(v) => v.to_sql(ty, out),
            PgParam::Int64(v) => v.to_sql(ty, out),
            PgParam::Float32(v) => v.to_sql(ty, out),
            PgParam::Float64(v) => v.to_sql(ty, out),
            PgParam::Numeric(v) => v.to_sql(ty, out),
            PgParam::String(v) => v.to_sql(ty, out),
            PgParam::Bytes(v) => v.to_sql(ty, out),
            PgParam::Uuid(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
            PgParam::DateTimeUtc(v) => v.to_sql(ty, out),
            PgParam::Date(v) => v.to_sql(ty, out),
            PgParam::Time(v) => v.to_sql(ty, out),
            PgParam::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Bind untyped values against the parameter types of a prepared statement
pub(crate) fn values_to_params(values: &[Value], types: &[Type]) -> Result<Vec<PgParam>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| match types.get(i) {
            Some(target) => PgParam::from_value_for_type(value, target),
            None => Ok(PgParam::from_value(value)),
        })
        .collect()
}

fn get<'a, T>(row: &'a PgRow, idx: usize) -> Result<Option<T>>
where
    T: postgres_types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| BulkqlError::Driver(format!("Type conversion error: {}", e)))
}

/// Convert a PostgreSQL row value to a bulkql value
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let value = match *row.columns()[idx].type_() {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::Int16),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::Int32),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int64),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::Float32),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float64),
        Type::NUMERIC => get::<PgNumeric>(row, idx)?.map(|n| Value::Decimal(n.into_inner())),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map(Value::String)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::DateTime),
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::DateTimeUtc)
        }
        ref other => {
            return Err(BulkqlError::NotSupported(format!(
                "column type {} in result set",
                other.name()
            )));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
