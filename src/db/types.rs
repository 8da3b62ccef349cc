//! Row decoding.
//!
//! # Architecture
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract the value for that category
//!
//! SQLite columns are dynamically typed, so its decoder looks at the storage
//! class of each value rather than the declared column type. SQL Server rows
//! come from tiberius already tagged with their wire type, so that decoder
//! works from the cell data alone.

use crate::dialect::Dialect;
use crate::models::query::Record;
use crate::models::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Timestamp,
    Date,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, dialect: Dialect) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if dialect == Dialect::Sqlite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.starts_with("timestamp") || lower.starts_with("datetime") {
        return TypeCategory::Timestamp;
    }

    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") {
        return TypeCategory::Text;
    }

    // time, enum, set, interval and friends decode as text
    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Trait for converting database rows to records.
pub trait RowToValues {
    fn column_names(&self) -> Vec<String>;
    fn to_values(&self) -> Vec<Value>;

    fn to_record(&self) -> Record {
        Record::new(self.column_names(), self.to_values())
    }
}

impl RowToValues for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<Value> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::MySql);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowToValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<Value> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, Dialect::Postgres);
                postgres::decode_column(self, idx, type_name, category)
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<Value> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), Dialect::Sqlite);
                sqlite::decode_column(self, idx, declared)
            })
            .collect()
    }
}

/// Parse text that should hold JSON, keeping it as text when it does not.
fn json_or_text(text: String) -> Value {
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(json) => Value::Json(json),
        Err(_) => Value::Text(text),
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

/// Decode a SQL Server row. Consumes the row: tiberius hands cells out by value.
pub fn tds_row_to_record(row: tiberius::Row) -> Record {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = row.into_iter().map(sqlserver::decode_cell).collect();
    Record::new(columns, values)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Date => decode_date(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => Value::Text(v.0),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        // Check NULL first
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            // out-of-range unsigned values keep their digits
            return i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string()));
        }
        Value::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return Value::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return Value::from(v);
        }
        Value::Null
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_timestamp(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Value::Timestamp(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Value::Timestamp(v.naive_utc());
        }
        Value::Null
    }

    fn decode_date(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(date_value)
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return Value::Text(v);
        }
        // VARBINARY-backed strings and other types sqlx won't hand out as String
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
            return match String::from_utf8(v) {
                Ok(s) => Value::Text(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            };
        }
        Value::Null
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx, type_name),
            TypeCategory::Date => decode_date(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => Value::Text(v.0),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Value {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Value::from(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Int(v);
        }
        Value::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return Value::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return Value::from(v);
        }
        Value::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_timestamp(row: &PgRow, idx: usize, type_name: &str) -> Value {
        let decoded = if type_name.eq_ignore_ascii_case("timestamptz") {
            row.try_get::<Option<DateTime<Utc>>, _>(idx)
                .ok()
                .flatten()
                .map(|v| v.naive_utc())
        } else {
            row.try_get::<Option<NaiveDateTime>, _>(idx).ok().flatten()
        };
        decoded.map(Value::Timestamp).unwrap_or(Value::Null)
    }

    fn decode_date(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(date_value)
            .unwrap_or(Value::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }
}

mod sqlite {
    use super::*;

    /// Decode by storage class, refined by the declared column category.
    pub fn decode_column(row: &SqliteRow, idx: usize, declared: TypeCategory) -> Value {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
            Err(_) => return Value::Null,
        };

        match storage.as_str() {
            "INTEGER" | "BOOLEAN" => decode_integer(row, idx, declared),
            "REAL" => row
                .try_get::<Option<f64>, _>(idx)
                .ok()
                .flatten()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            "BLOB" => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map(Value::Bytes)
                .unwrap_or(Value::Null),
            _ => decode_text(row, idx, declared),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize, declared: TypeCategory) -> Value {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) if declared == TypeCategory::Boolean => Value::Bool(v != 0),
            Ok(Some(v)) => Value::Int(v),
            _ => Value::Null,
        }
    }

    fn decode_text(row: &SqliteRow, idx: usize, declared: TypeCategory) -> Value {
        let Ok(Some(text)) = row.try_get_unchecked::<Option<String>, _>(idx) else {
            return Value::Null;
        };
        match declared {
            TypeCategory::Json => json_or_text(text),
            TypeCategory::Timestamp => NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(Value::Timestamp)
                .unwrap_or(Value::Text(text)),
            _ => Value::Text(text),
        }
    }
}

mod sqlserver {
    use super::*;
    use chrono::NaiveTime;
    use tiberius::{ColumnData, FromSql};

    pub fn decode_cell(data: ColumnData<'static>) -> Value {
        match data {
            ColumnData::U8(v) => v.map(|v| Value::Int(i64::from(v))).unwrap_or(Value::Null),
            ColumnData::I16(v) => v.map(|v| Value::Int(i64::from(v))).unwrap_or(Value::Null),
            ColumnData::I32(v) => v.map(|v| Value::Int(i64::from(v))).unwrap_or(Value::Null),
            ColumnData::I64(v) => v.map(Value::Int).unwrap_or(Value::Null),
            ColumnData::F32(v) => v.map(|v| Value::Float(f64::from(v))).unwrap_or(Value::Null),
            ColumnData::F64(v) => v.map(Value::Float).unwrap_or(Value::Null),
            ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
            ColumnData::String(v) => v
                .map(|s| Value::Text(s.into_owned()))
                .unwrap_or(Value::Null),
            ColumnData::Guid(v) => v
                .map(|g| Value::Text(g.to_string()))
                .unwrap_or(Value::Null),
            ColumnData::Binary(v) => v
                .map(|b| Value::Bytes(b.into_owned()))
                .unwrap_or(Value::Null),
            ColumnData::Numeric(v) => v
                .map(|n| Value::Text(numeric_text(n.value(), n.scale())))
                .unwrap_or(Value::Null),
            ColumnData::Xml(v) => v
                .map(|x| Value::Text(x.into_owned().into_string()))
                .unwrap_or(Value::Null),
            other => decode_temporal(&other),
        }
    }

    /// Date and time cells, through tiberius' chrono conversions.
    fn decode_temporal(data: &ColumnData<'static>) -> Value {
        if let Ok(Some(v)) = NaiveDateTime::from_sql(data) {
            return Value::Timestamp(v);
        }
        if let Ok(Some(v)) = DateTime::<Utc>::from_sql(data) {
            return Value::Timestamp(v.naive_utc());
        }
        if let Ok(Some(v)) = NaiveDate::from_sql(data) {
            return date_value(v);
        }
        if let Ok(Some(v)) = NaiveTime::from_sql(data) {
            return Value::Text(v.to_string());
        }
        Value::Null
    }

    /// Exact decimal text for a scaled integer, e.g. (-12345, 2) -> "-123.45".
    pub fn numeric_text(value: i128, scale: u8) -> String {
        let sign = if value < 0 { "-" } else { "" };
        let digits = value.unsigned_abs().to_string();
        let scale = usize::from(scale);
        if scale == 0 {
            return format!("{sign}{digits}");
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        format!("{sign}{int}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlserver_numeric_text() {
        assert_eq!(sqlserver::numeric_text(-12345, 2), "-123.45");
        assert_eq!(sqlserver::numeric_text(5, 3), "0.005");
        assert_eq!(sqlserver::numeric_text(42, 0), "42");
    }

    #[test]
    fn test_sqlserver_cells_decode_to_values() {
        use std::borrow::Cow;
        use tiberius::ColumnData;

        assert_eq!(sqlserver::decode_cell(ColumnData::I32(Some(7))), Value::Int(7));
        assert_eq!(sqlserver::decode_cell(ColumnData::I64(None)), Value::Null);
        assert_eq!(sqlserver::decode_cell(ColumnData::Bit(Some(true))), Value::Bool(true));
        assert_eq!(
            sqlserver::decode_cell(ColumnData::String(Some(Cow::Borrowed("hi")))),
            Value::Text("hi".into())
        );
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let cell = tiberius::IntoSql::into_sql(ts);
        assert_eq!(sqlserver::decode_cell(cell), Value::Timestamp(ts));
    }

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(categorize_type("INT", Dialect::MySql), TypeCategory::Integer);
        assert_eq!(
            categorize_type("BIGINT", Dialect::Postgres),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", Dialect::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", Dialect::Postgres),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", Dialect::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", Dialect::Postgres),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", Dialect::Sqlite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("DATETIME", Dialect::MySql),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", Dialect::Postgres),
            TypeCategory::Timestamp
        );
        assert_eq!(categorize_type("DATE", Dialect::MySql), TypeCategory::Date);
        assert_eq!(categorize_type("TIME", Dialect::MySql), TypeCategory::Unknown);
    }

    #[test]
    fn test_categorize_type_boolean_before_tinyint() {
        assert_eq!(
            categorize_type("BOOLEAN", Dialect::MySql),
            TypeCategory::Boolean
        );
        assert_eq!(categorize_type("jsonb", Dialect::Postgres), TypeCategory::Json);
        assert_eq!(
            categorize_type("VARCHAR", Dialect::Postgres),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_json_or_text() {
        assert_eq!(
            json_or_text("{\"a\":1}".into()),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(json_or_text("nope".into()), Value::Text("nope".into()));
    }
}
