//! Query result types.

use crate::error::OrmResult;
use crate::models::value::{FromValue, Value};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// One decoded result row: column names in select order with their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column (exact match first, then case-insensitive).
    pub fn value(&self, column: &str) -> Option<&Value> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
            })?;
        self.values.get(idx)
    }

    /// Typed value of the named column; a missing column converts from NULL.
    pub fn get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        T::from_value(self.value(column).cloned().unwrap_or(Value::Null))
    }

    /// Column/value pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Render as a JSON object (bytes base64, timestamps ISO 8601).
    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.iter()
            .map(|(col, value)| {
                let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                (col.to_string(), json)
            })
            .collect()
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Generated key of the last inserted row, when the engine reports one
    pub last_insert_id: Option<i64>,
}
