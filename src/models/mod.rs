//! Data models shared across relmap.
//!
//! This module re-exports the value, row and schema types used by the
//! mapper, the builders and the dialects.

pub mod connection;
pub mod query;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::ConnectionInfo;
pub use query::{ExecResult, Record};
pub use schema::{ColumnDefinition, ColumnType, FieldKind, ForeignKeyRef, IndexDefinition};
pub use value::{FromValue, SqlField, Value};
