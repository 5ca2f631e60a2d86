//! Tests for TDS type declarations and value conversion

use crate::types::*;
use bulkql_core::{ParamBinding, SqlType, Value};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tiberius::{ColumnData, ToSql};

#[rstest]
#[case(SqlType::Int, "INT")]
#[case(SqlType::BigInt, "BIGINT")]
#[case(SqlType::Bit, "BIT")]
#[case(SqlType::NVarChar(Some(255)), "NVARCHAR(255)")]
#[case(SqlType::NVarChar(Some(4001)), "NVARCHAR(MAX)")]
#[case(SqlType::NVarChar(None), "NVARCHAR(MAX)")]
#[case(SqlType::VarChar(Some(8000)), "VARCHAR(8000)")]
#[case(SqlType::VarBinary(None), "VARBINARY(MAX)")]
#[case(SqlType::Json, "NVARCHAR(MAX)")]
#[case(SqlType::Decimal { precision: 18, scale: 4 }, "DECIMAL(18,4)")]
#[case(SqlType::DateTime2, "DATETIME2")]
#[case(SqlType::UniqueIdentifier, "UNIQUEIDENTIFIER")]
fn test_mssql_declaration(#[case] sql_type: SqlType, #[case] expected: &str) {
    assert_eq!(mssql_declaration(sql_type), expected);
}

#[test]
fn test_parameter_declarations_follow_binding_order() {
    let bindings = vec![
        ParamBinding {
            key: "name_0".into(),
            sql_type: SqlType::NVarChar(Some(100)),
        },
        ParamBinding {
            key: "age_0".into(),
            sql_type: SqlType::Int,
        },
    ];

    assert_eq!(
        parameter_declarations(&bindings),
        "@name_0 NVARCHAR(100),@age_0 INT"
    );
    assert_eq!(parameter_declarations(&[]), "");
}

#[rstest]
#[case("12.345", 12345, 3)]
#[case("-0.5", -5, 1)]
#[case("+42", 42, 0)]
#[case(".25", 25, 2)]
fn test_parse_numeric(#[case] text: &str, #[case] value: i128, #[case] scale: u8) {
    let numeric = parse_numeric(text).expect("valid decimal literal");
    assert_eq!(numeric.value(), value);
    assert_eq!(numeric.scale(), scale);
}

#[rstest]
#[case("")]
#[case("-")]
#[case("1.2.3")]
#[case("12a")]
#[case("123456789012345678901234567890123456789")]
fn test_parse_numeric_rejects(#[case] text: &str) {
    assert!(parse_numeric(text).is_none());
}

#[test]
fn test_null_is_typed_by_declaration() {
    let param = value_to_param(&Value::Null, SqlType::BigInt).unwrap();
    assert!(matches!(param.to_sql(), ColumnData::I64(None)));

    let param = value_to_param(&Value::Null, SqlType::NVarChar(None)).unwrap();
    assert!(matches!(param.to_sql(), ColumnData::String(None)));

    let param = value_to_param(&Value::Null, SqlType::Date).unwrap();
    assert!(matches!(param.to_sql(), ColumnData::Date(None)));
}

#[test]
fn test_tinyint_narrows_small_integers() {
    let param = value_to_param(&Value::Int32(7), SqlType::TinyInt).unwrap();
    assert!(matches!(param.to_sql(), ColumnData::U8(Some(7))));

    let param = value_to_param(&Value::Int32(300), SqlType::TinyInt).unwrap();
    assert!(matches!(param.to_sql(), ColumnData::I32(Some(300))));
}

#[test]
fn test_decimal_value_binds_as_numeric() {
    let param = value_to_param(&Value::Decimal("19.99".into()), SqlType::Decimal {
        precision: 10,
        scale: 2,
    })
    .unwrap();
    match param.to_sql() {
        ColumnData::Numeric(Some(n)) => assert_eq!(n.value(), 1999),
        other => panic!("unexpected column data: {other:?}"),
    }
}

#[test]
fn test_invalid_decimal_is_a_driver_error() {
    let err = value_to_param(&Value::Decimal("abc".into()), SqlType::Decimal {
        precision: 10,
        scale: 2,
    })
    .unwrap_err();
    assert!(err.to_string().contains("Type conversion error"));
}

#[test]
fn test_json_binds_as_text() {
    let param = value_to_param(&Value::Json(serde_json::json!({"a": 1})), SqlType::Json).unwrap();
    match param.to_sql() {
        ColumnData::String(Some(s)) => assert_eq!(s, r#"{"a":1}"#),
        other => panic!("unexpected column data: {other:?}"),
    }
}

#[test]
fn test_values_to_params_keeps_length() {
    let params = values_to_params(&[Value::Null, Value::Int64(1), Value::String("x".into())]).unwrap();
    assert_eq!(params.len(), 3);
    assert!(matches!(params[0].to_sql(), ColumnData::I32(None)));
}

#[test]
fn test_column_data_to_value() {
    assert_eq!(
        column_data_to_value(ColumnData::I32(Some(5))).unwrap(),
        Value::Int32(5)
    );
    assert_eq!(
        column_data_to_value(ColumnData::U8(Some(200))).unwrap(),
        Value::Int16(200)
    );
    assert_eq!(
        column_data_to_value(ColumnData::String(None)).unwrap(),
        Value::Null
    );
    assert_eq!(
        column_data_to_value(ColumnData::String(Some("abc".into()))).unwrap(),
        Value::String("abc".into())
    );
}

#[test]
fn test_date_round_trips_through_column_data() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let param = value_to_param(&Value::Date(date), SqlType::Date).unwrap();
    let data = match param.to_sql() {
        ColumnData::Date(d) => ColumnData::Date(d),
        other => panic!("unexpected column data: {other:?}"),
    };
    assert_eq!(column_data_to_value(data).unwrap(), Value::Date(date));
}
