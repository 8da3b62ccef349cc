//! MySQL / MariaDB specifics.

use super::Dialect;
use crate::models::schema::{ColumnDefinition, ColumnType};

pub(super) const HAS_TABLE: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_name = ?";

pub(super) const HAS_COLUMN: &str = "SELECT COUNT(*) FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?";

/// Largest LIMIT MySQL accepts; used when only an OFFSET is requested.
const MAX_LIMIT: u64 = 18_446_744_073_709_551_615;

pub(super) fn column_type(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Boolean => "BOOLEAN".into(),
        ColumnType::Integer => "INT".into(),
        ColumnType::BigInteger => "BIGINT".into(),
        ColumnType::Float => "FLOAT".into(),
        ColumnType::Double => "DOUBLE".into(),
        ColumnType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        ColumnType::String(0) => "VARCHAR(255)".into(),
        ColumnType::String(n) if *n <= 255 => format!("VARCHAR({})", n),
        ColumnType::String(_) | ColumnType::Text => "TEXT".into(),
        ColumnType::Binary => "BLOB".into(),
        ColumnType::Date => "DATE".into(),
        ColumnType::DateTime => "DATETIME".into(),
        ColumnType::Timestamp => "TIMESTAMP".into(),
        ColumnType::Json => "JSON".into(),
        ColumnType::Custom(sql) => sql.clone(),
    }
}

pub(super) fn column_constraints(
    dialect: &Dialect,
    column: &ColumnDefinition,
    parts: &mut Vec<String>,
) {
    if column.not_null {
        parts.push("NOT NULL".into());
    }
    if let Some(default) = dialect.default_fragment(column) {
        parts.push(default);
    }
    if column.auto_increment {
        parts.push(dialect.auto_increment_fragment().into());
    }
    if column.unique {
        parts.push("UNIQUE".into());
    }
    if let Some(comment) = &column.comment {
        parts.push(format!("COMMENT {}", dialect.quote_string(comment)));
    }
}

pub(super) fn paginate(limit: Option<u64>, offset: Option<u64>) -> String {
    let mut out = format!(" LIMIT {}", limit.unwrap_or(MAX_LIMIT));
    if let Some(offset) = offset {
        out.push_str(&format!(" OFFSET {}", offset));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_is_inline() {
        let mut col = ColumnDefinition::new("name", ColumnType::String(50));
        col.comment = Some("display name".into());
        let def = Dialect::MySql.column_definition(&col, false).unwrap();
        assert_eq!(def, "VARCHAR(50) COMMENT 'display name'");
    }

    #[test]
    fn test_offset_without_limit() {
        assert_eq!(paginate(None, Some(3)), " LIMIT 18446744073709551615 OFFSET 3");
    }
}
