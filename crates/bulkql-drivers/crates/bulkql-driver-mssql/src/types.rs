//! Conversions between bulkql values and TDS column data

use bulkql_core::{BulkqlError, ParamBinding, Result, SqlType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::borrow::Cow;
use tiberius::{ColumnData, FromSql, ToSql, numeric::Numeric};

/// Longest NVARCHAR that can be declared without `MAX`
const MAX_NVARCHAR_LEN: u16 = 4000;
/// Longest VARCHAR/VARBINARY that can be declared without `MAX`
const MAX_VARCHAR_LEN: u16 = 8000;

/// T-SQL declaration for a parameter of `sql_type`
pub fn mssql_declaration(sql_type: SqlType) -> String {
    fn sized(name: &str, len: Option<u16>, max: u16) -> String {
        match len {
            Some(n) if n > 0 && n <= max => format!("{}({})", name, n),
            _ => format!("{}(MAX)", name),
        }
    }

    match sql_type {
        SqlType::Bit => "BIT".into(),
        SqlType::TinyInt => "TINYINT".into(),
        SqlType::SmallInt => "SMALLINT".into(),
        SqlType::Int => "INT".into(),
        SqlType::BigInt => "BIGINT".into(),
        SqlType::Real => "REAL".into(),
        SqlType::Float => "FLOAT".into(),
        SqlType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        SqlType::NVarChar(len) => sized("NVARCHAR", len, MAX_NVARCHAR_LEN),
        SqlType::VarChar(len) => sized("VARCHAR", len, MAX_VARCHAR_LEN),
        SqlType::Text | SqlType::Json => "NVARCHAR(MAX)".into(),
        SqlType::UniqueIdentifier => "UNIQUEIDENTIFIER".into(),
        SqlType::Date => "DATE".into(),
        SqlType::Time => "TIME".into(),
        SqlType::DateTime2 => "DATETIME2".into(),
        SqlType::DateTimeOffset => "DATETIMEOFFSET".into(),
        SqlType::VarBinary(len) => sized("VARBINARY", len, MAX_VARCHAR_LEN),
    }
}

/// Parameter declaration list handed to `sp_prepare`: `@a_0 INT,@b_0 NVARCHAR(MAX)`
pub fn parameter_declarations(bindings: &[ParamBinding]) -> String {
    bindings
        .iter()
        .map(|binding| format!("@{} {}", binding.key, mssql_declaration(binding.sql_type)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Owned parameter value that tiberius can bind
#[derive(Debug, Clone)]
pub(crate) enum TiberiusParam {
    /// NULL carrying the declared type so the server sees a matching TDS type
    Null(SqlType),
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Numeric(Numeric),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            TiberiusParam::Null(sql_type) => typed_null(*sql_type),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::U8(v) => ColumnData::U8(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::Numeric(v) => ColumnData::Numeric(Some(*v)),
            TiberiusParam::String(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            TiberiusParam::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
            TiberiusParam::Date(v) => v.to_sql(),
            TiberiusParam::Time(v) => v.to_sql(),
            TiberiusParam::DateTime(v) => v.to_sql(),
            TiberiusParam::DateTimeUtc(v) => v.to_sql(),
        }
    }
}

fn typed_null(sql_type: SqlType) -> ColumnData<'static> {
    match sql_type {
        SqlType::Bit => ColumnData::Bit(None),
        SqlType::TinyInt => ColumnData::U8(None),
        SqlType::SmallInt => ColumnData::I16(None),
        SqlType::Int => ColumnData::I32(None),
        SqlType::BigInt => ColumnData::I64(None),
        SqlType::Real => ColumnData::F32(None),
        SqlType::Float => ColumnData::F64(None),
        SqlType::Decimal { .. } => ColumnData::Numeric(None),
        SqlType::NVarChar(_) | SqlType::VarChar(_) | SqlType::Text | SqlType::Json => {
            ColumnData::String(None)
        }
        SqlType::UniqueIdentifier => ColumnData::Guid(None),
        SqlType::Date => ColumnData::Date(None),
        SqlType::Time => ColumnData::Time(None),
        SqlType::DateTime2 => ColumnData::DateTime2(None),
        SqlType::DateTimeOffset => ColumnData::DateTimeOffset(None),
        SqlType::VarBinary(_) => ColumnData::Binary(None),
    }
}

/// Parse a decimal literal (`-12.345`) into TDS numeric form
pub(crate) fn parse_numeric(text: &str) -> Option<Numeric> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    // TDS numerics carry at most 38 digits
    if int_part.len() + frac_part.len() > 38 {
        return None;
    }

    let mut mantissa: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        mantissa = mantissa * 10 + i128::from(c.to_digit(10)?);
    }
    if negative {
        mantissa = -mantissa;
    }
    Some(Numeric::new_with_scale(mantissa, frac_part.len() as u8))
}

/// Convert a value for binding against a parameter declared as `sql_type`.
pub(crate) fn value_to_param(value: &Value, sql_type: SqlType) -> Result<TiberiusParam> {
    let param = match value {
        Value::Null => TiberiusParam::Null(sql_type),
        Value::Bool(b) => TiberiusParam::Bool(*b),
        Value::Int8(i) => TiberiusParam::I16(i16::from(*i)),
        Value::Int16(i) => TiberiusParam::I16(*i),
        Value::Int32(i) => TiberiusParam::I32(*i),
        Value::Int64(i) => TiberiusParam::I64(*i),
        Value::Float32(f) => TiberiusParam::F32(*f),
        Value::Float64(f) => TiberiusParam::F64(*f),
        Value::Decimal(d) => match parse_numeric(d) {
            Some(numeric) => TiberiusParam::Numeric(numeric),
            None => {
                return Err(BulkqlError::Driver(format!(
                    "Type conversion error: {:?} is not a decimal literal",
                    d
                )));
            }
        },
        Value::String(s) => TiberiusParam::String(s.clone()),
        Value::Bytes(b) => TiberiusParam::Bytes(b.clone()),
        Value::Uuid(u) => TiberiusParam::Uuid(*u),
        Value::Date(d) => TiberiusParam::Date(*d),
        Value::Time(t) => TiberiusParam::Time(*t),
        Value::DateTime(dt) => TiberiusParam::DateTime(*dt),
        Value::DateTimeUtc(dt) => TiberiusParam::DateTimeUtc(*dt),
        Value::Json(j) => TiberiusParam::String(j.to_string()),
    };

    // Narrow integer columns still take small literals without a cast on the server
    Ok(match (param, sql_type) {
        (TiberiusParam::I32(v), SqlType::TinyInt) if (0..=255).contains(&v) => {
            TiberiusParam::U8(v as u8)
        }
        (param, _) => param,
    })
}

/// Convert untyped values for plain (non-prepared) queries
pub(crate) fn values_to_params(values: &[Value]) -> Result<Vec<TiberiusParam>> {
    values
        .iter()
        .map(|value| match value {
            Value::Null => Ok(TiberiusParam::Null(SqlType::Int)),
            other => value_to_param(other, SqlType::NVarChar(None)),
        })
        .collect()
}

fn convert<'a, T: FromSql<'a>>(data: &'a ColumnData<'static>) -> Result<Option<T>> {
    T::from_sql(data).map_err(|e| BulkqlError::Driver(format!("Type conversion error: {}", e)))
}

/// Convert tiberius column data to a bulkql value
pub(crate) fn column_data_to_value(data: ColumnData<'static>) -> Result<Value> {
    let value = match data {
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::U8(v) => v.map(|v| Value::Int16(i16::from(v))),
        ColumnData::I16(v) => v.map(Value::Int16),
        ColumnData::I32(v) => v.map(Value::Int32),
        ColumnData::I64(v) => v.map(Value::Int64),
        ColumnData::F32(v) => v.map(Value::Float32),
        ColumnData::F64(v) => v.map(Value::Float64),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(Value::Uuid),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| Value::Decimal(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| Value::String(x.into_owned().into_string())),
        ref data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => convert::<NaiveDateTime>(data)?.map(Value::DateTime),
        ref data @ ColumnData::DateTimeOffset(_) => {
            convert::<DateTime<Utc>>(data)?.map(Value::DateTimeUtc)
        }
        ref data @ ColumnData::Date(_) => convert::<NaiveDate>(data)?.map(Value::Date),
        ref data @ ColumnData::Time(_) => convert::<NaiveTime>(data)?.map(Value::Time),
    };
    Ok(value.unwrap_or(Value::Null))
}
