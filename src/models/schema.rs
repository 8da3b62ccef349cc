//! Column, index and type descriptions shared by the mapper, the table
//! builder and the dialects.

use serde::{Deserialize, Serialize};

/// Coarse kind of a mapped Rust field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    BigInt,
    Float,
    Double,
    String,
    Bytes,
    Date,
    Timestamp,
    Json,
}

/// Engine-neutral column type, rendered to SQL text by a dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    /// Bounded string; 0 means the dialect default length
    String(u32),
    Text,
    Binary,
    Date,
    DateTime,
    Timestamp,
    Json,
    /// Verbatim SQL type text (tag `type:` override)
    Custom(String),
}

impl ColumnType {
    /// Column type for a field kind, honoring the tag's `size:`.
    pub fn from_kind(kind: FieldKind, size: u32) -> Self {
        match kind {
            FieldKind::Bool => Self::Boolean,
            FieldKind::Int => Self::Integer,
            FieldKind::BigInt => Self::BigInteger,
            FieldKind::Float => Self::Float,
            FieldKind::Double => Self::Double,
            FieldKind::String => Self::String(size),
            FieldKind::Bytes => Self::Binary,
            FieldKind::Date => Self::Date,
            FieldKind::Timestamp => Self::DateTime,
            FieldKind::Json => Self::Json,
        }
    }

    /// True for integer types that can carry an identity/auto-increment.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInteger)
    }
}

/// Target of a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// DDL description of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    /// SQL literal or expression, rendered verbatim after DEFAULT
    pub default: Option<String>,
    pub comment: Option<String>,
    pub references: Option<ForeignKeyRef>,
}

impl ColumnDefinition {
    /// Create a nullable column with no constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            primary: false,
            auto_increment: false,
            unique: false,
            default: None,
            comment: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// DDL description of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Conventional index name: `idx_<table>_<col>_<col>` or `uq_...` when unique.
    pub fn generated_name(table: &str, columns: &[String], unique: bool) -> String {
        let prefix = if unique { "uq" } else { "idx" };
        format!("{}_{}_{}", prefix, table, columns.join("_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_from_kind() {
        assert_eq!(ColumnType::from_kind(FieldKind::String, 64), ColumnType::String(64));
        assert_eq!(ColumnType::from_kind(FieldKind::Timestamp, 0), ColumnType::DateTime);
        assert!(ColumnType::from_kind(FieldKind::BigInt, 0).is_integer());
    }

    #[test]
    fn test_primary_implies_not_null() {
        let col = ColumnDefinition::new("id", ColumnType::BigInteger).primary();
        assert!(col.primary && col.not_null);
    }

    #[test]
    fn test_generated_index_name() {
        let cols = vec!["email".to_string(), "tenant".to_string()];
        assert_eq!(
            IndexDefinition::generated_name("users", &cols, true),
            "uq_users_email_tenant"
        );
    }
}
