//! Dynamically typed SQL values.
//!
//! [`Value`] is used both for bound arguments and for decoded result columns.
//! Conversions out of a value go through [`FromValue`], which is lenient in
//! the ways engines differ: SQLite returns booleans as integers and
//! timestamps as text, MySQL returns `TINYINT(1)` for `BOOLEAN`.

use crate::error::{OrmError, OrmResult};
use crate::models::schema::FieldKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(serialize_with = "base64_bytes::serialize")]
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Json(JsonValue),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for NULL and for the zero value of each variant.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(v) => !v,
            Self::Int(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Text(v) => v.is_empty(),
            Self::Bytes(v) => v.is_empty(),
            Self::Timestamp(v) => *v == NaiveDateTime::default(),
            Self::Json(v) => v.is_null(),
        }
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }

    /// Convert into a concrete Rust type.
    pub fn get<T: FromValue>(self) -> OrmResult<T> {
        T::from_value(self)
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }
}

// =============================================================================
// Conversions into Value
// =============================================================================

macro_rules! impl_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Text(v.format("%Y-%m-%d").to_string())
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Conversions out of Value
// =============================================================================

/// Fallible conversion from a decoded column value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> OrmResult<Self>;
}

fn conversion_error(value: &Value, target: &str) -> OrmError {
    OrmError::mapping(
        format!("cannot convert {} value to {}", value.type_name(), target),
        target,
    )
}

impl FromValue for Value {
    fn from_value(value: Value) -> OrmResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            Value::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Ok(true),
                "0" | "false" | "f" | "no" => Ok(false),
                _ => Err(conversion_error(&value, "bool")),
            },
            other => Err(conversion_error(&other, "bool")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Bool(v) => Ok(i64::from(v)),
            Value::Float(v) if v.fract() == 0.0 => Ok(v as i64),
            Value::Text(ref s) => s.trim().parse().map_err(|_| conversion_error(&value, "i64")),
            other => Err(conversion_error(&other, "i64")),
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($($t:ty),+) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> OrmResult<Self> {
                    let wide = i64::from_value(value)?;
                    <$t>::try_from(wide).map_err(|_| {
                        OrmError::mapping(
                            format!("value {} out of range", wide),
                            stringify!($t),
                        )
                    })
                }
            }
        )+
    };
}

impl_from_value_narrow_int!(i8, i16, i32, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            // DECIMAL columns decode as exact text
            Value::Text(ref s) => s.trim().parse().map_err(|_| conversion_error(&value, "f64")),
            other => Err(conversion_error(&other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> OrmResult<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Timestamp(v) => Ok(v.to_string()),
            Value::Json(v) => Ok(v.to_string()),
            Value::Bytes(v) => {
                String::from_utf8(v).map_err(|e| OrmError::mapping(e.to_string(), "String"))
            }
            Value::Null => Err(conversion_error(&Value::Null, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(conversion_error(&other, "Vec<u8>")),
        }
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            Value::Text(ref s) => {
                parse_timestamp(s).ok_or_else(|| conversion_error(&value, "NaiveDateTime"))
            }
            Value::Int(secs) => DateTime::<Utc>::from_timestamp(secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| conversion_error(&value, "NaiveDateTime")),
            other => Err(conversion_error(&other, "NaiveDateTime")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> OrmResult<Self> {
        NaiveDateTime::from_value(value).map(|v| v.and_utc())
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> OrmResult<Self> {
        NaiveDateTime::from_value(value).map(|v| v.date())
    }
}

impl FromValue for JsonValue {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Json(v) => Ok(v),
            Value::Text(ref s) => {
                serde_json::from_str(s).map_err(|_| conversion_error(&value, "JSON"))
            }
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(v) => Ok(JsonValue::Bool(v)),
            Value::Int(v) => Ok(JsonValue::from(v)),
            Value::Float(v) => Ok(JsonValue::from(v)),
            other => Err(conversion_error(&other, "JSON")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// =============================================================================
// Field kind inference
// =============================================================================

/// Rust field types that map onto a column.
///
/// Used by the `model!` macro to infer each column's kind from the
/// struct's field types.
pub trait SqlField {
    const KIND: FieldKind;
    const NULLABLE: bool = false;
}

macro_rules! impl_sql_field {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(
            impl SqlField for $t {
                const KIND: FieldKind = FieldKind::$kind;
            }
        )+
    };
}

impl_sql_field!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    u8 => Int,
    u16 => Int,
    i64 => BigInt,
    u32 => BigInt,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => Timestamp,
    JsonValue => Json,
);

impl<T: SqlField> SqlField for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn test_bool_from_sqlite_integer() {
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert!(!bool::from_value(Value::Int(0)).unwrap());
        assert!(bool::from_value(Value::Text("maybe".into())).is_err());
    }

    #[test]
    fn test_narrow_int_range_checked() {
        assert_eq!(i32::from_value(Value::Int(42)).unwrap(), 42);
        assert!(u8::from_value(Value::Int(300)).is_err());
    }

    #[test]
    fn test_timestamp_from_text() {
        let ts = NaiveDateTime::from_value(Value::Text("2024-03-01 10:20:30.5".into())).unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:20:30.500");

        let ts = NaiveDateTime::from_value(Value::Text("2024-03-01T10:20:30Z".into())).unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:20:30");
    }

    #[test]
    fn test_null_into_non_optional_fails() {
        assert!(String::from_value(Value::Null).is_err());
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn test_is_zero() {
        assert!(Value::Int(0).is_zero());
        assert!(Value::Timestamp(NaiveDateTime::default()).is_zero());
        assert!(!Value::Text("a".into()).is_zero());
    }

    #[test]
    fn test_serialize_bytes_as_base64() {
        let json = serde_json::to_value(Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(json, JsonValue::String("AQID".into()));
    }

    #[test]
    fn test_sql_field_kinds() {
        assert_eq!(<i64 as SqlField>::KIND, FieldKind::BigInt);
        assert_eq!(<Option<String> as SqlField>::KIND, FieldKind::String);
        assert!(<Option<String> as SqlField>::NULLABLE);
        assert!(!<String as SqlField>::NULLABLE);
    }
}
