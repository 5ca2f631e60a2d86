//! Tests for PostgreSQL parameter typing and coercion

use crate::numeric::PgNumeric;
use crate::types::*;
use bulkql_core::{BulkqlError, SqlType, Value};
use postgres_types::Type;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(SqlType::Bit, Type::BOOL)]
#[case(SqlType::TinyInt, Type::INT2)]
#[case(SqlType::Int, Type::INT4)]
#[case(SqlType::BigInt, Type::INT8)]
#[case(SqlType::Decimal { precision: 12, scale: 2 }, Type::NUMERIC)]
#[case(SqlType::NVarChar(Some(50)), Type::VARCHAR)]
#[case(SqlType::Text, Type::TEXT)]
#[case(SqlType::Json, Type::JSONB)]
#[case(SqlType::UniqueIdentifier, Type::UUID)]
#[case(SqlType::DateTime2, Type::TIMESTAMP)]
#[case(SqlType::DateTimeOffset, Type::TIMESTAMPTZ)]
#[case(SqlType::VarBinary(None), Type::BYTEA)]
fn test_pg_type(#[case] sql_type: SqlType, #[case] expected: Type) {
    assert_eq!(pg_type(sql_type), expected);
}

#[test]
fn test_integers_follow_target_width() {
    assert_eq!(
        PgParam::from_value_for_type(&Value::Int64(7), &Type::INT4).unwrap(),
        PgParam::Int32(7)
    );
    assert_eq!(
        PgParam::from_value_for_type(&Value::Int32(7), &Type::INT8).unwrap(),
        PgParam::Int64(7)
    );
    assert_eq!(
        PgParam::from_value_for_type(&Value::Int16(3), &Type::NUMERIC).unwrap(),
        PgParam::Numeric(PgNumeric("3".into()))
    );
}

#[test]
fn test_integer_overflow_is_rejected() {
    let err = PgParam::from_value_for_type(&Value::Int64(70_000), &Type::INT2).unwrap_err();
    assert!(matches!(err, BulkqlError::Driver(_)));
    assert!(err.to_string().contains("70000"));
}

#[test]
fn test_strings_coerce_to_typed_targets() {
    assert_eq!(
        PgParam::from_value_for_type(&Value::String("{\"a\":1}".into()), &Type::JSONB).unwrap(),
        PgParam::Json(serde_json::json!({"a": 1}))
    );
    assert_eq!(
        PgParam::from_value_for_type(&Value::String("2024-01-31".into()), &Type::DATE).unwrap(),
        PgParam::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
    );
    assert_eq!(
        PgParam::from_value_for_type(&Value::String("not a date".into()), &Type::DATE).unwrap(),
        PgParam::String("not a date".into())
    );
}

#[test]
fn test_decimal_binds_as_numeric_only_for_numeric_targets() {
    assert_eq!(
        PgParam::from_value_for_type(&Value::Decimal("1.50".into()), &Type::NUMERIC).unwrap(),
        PgParam::Numeric(PgNumeric("1.50".into()))
    );
    assert_eq!(
        PgParam::from_value_for_type(&Value::Decimal("1.50".into()), &Type::TEXT).unwrap(),
        PgParam::String("1.50".into())
    );
}

#[test]
fn test_values_to_params_falls_back_past_known_types() {
    let params = values_to_params(&[Value::Int64(1), Value::Int32(2)], &[Type::INT2]).unwrap();
    assert_eq!(params, vec![PgParam::Int16(1), PgParam::Int32(2)]);
}

#[test]
fn test_null_stays_null_for_any_target() {
    for target in [Type::INT4, Type::TEXT, Type::NUMERIC, Type::UUID] {
        assert_eq!(
            PgParam::from_value_for_type(&Value::Null, &target).unwrap(),
            PgParam::Null
        );
    }
}
