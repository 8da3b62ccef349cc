//! PostgreSQL specifics.

use super::Dialect;
use crate::models::schema::{ColumnDefinition, ColumnType};

pub(super) const HAS_TABLE: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1";

pub(super) const HAS_COLUMN: &str = "SELECT COUNT(*) FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2";

pub(super) fn column_type(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Boolean => "BOOLEAN".into(),
        ColumnType::Integer => "INTEGER".into(),
        ColumnType::BigInteger => "BIGINT".into(),
        ColumnType::Float => "REAL".into(),
        ColumnType::Double => "DOUBLE PRECISION".into(),
        ColumnType::Decimal { precision, scale } => format!("NUMERIC({},{})", precision, scale),
        ColumnType::String(0) => "VARCHAR(255)".into(),
        ColumnType::String(n) => format!("VARCHAR({})", n),
        ColumnType::Text => "TEXT".into(),
        ColumnType::Binary => "BYTEA".into(),
        ColumnType::Date => "DATE".into(),
        ColumnType::DateTime | ColumnType::Timestamp => "TIMESTAMP".into(),
        ColumnType::Json => "JSONB".into(),
        ColumnType::Custom(sql) => sql.clone(),
    }
}

/// Comments are not inline in PostgreSQL (`COMMENT ON COLUMN` is a separate
/// statement) and are dropped here.
pub(super) fn column_constraints(
    dialect: &Dialect,
    column: &ColumnDefinition,
    parts: &mut Vec<String>,
) {
    if column.auto_increment {
        parts.push(dialect.auto_increment_fragment().into());
    }
    if column.not_null {
        parts.push("NOT NULL".into());
    }
    if let Some(default) = dialect.default_fragment(column) {
        parts.push(default);
    }
    if column.unique {
        parts.push("UNIQUE".into());
    }
}

pub(super) fn paginate(limit: Option<u64>, offset: Option<u64>) -> String {
    let mut out = String::new();
    if let Some(limit) = limit {
        out.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        out.push_str(&format!(" OFFSET {}", offset));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types() {
        assert_eq!(column_type(&ColumnType::Json), "JSONB");
        assert_eq!(column_type(&ColumnType::String(2000)), "VARCHAR(2000)");
        assert_eq!(
            column_type(&ColumnType::Decimal {
                precision: 10,
                scale: 2
            }),
            "NUMERIC(10,2)"
        );
    }

    #[test]
    fn test_offset_only() {
        assert_eq!(paginate(None, Some(20)), " OFFSET 20");
    }
}
