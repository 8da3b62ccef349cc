//! SQLite specifics.

use super::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::models::schema::{ColumnDefinition, ColumnType};

pub(super) const HAS_TABLE: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?";

pub(super) const HAS_COLUMN: &str = "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?";

pub(super) fn column_type(column_type: &ColumnType) -> String {
    match column_type {
        // AUTOINCREMENT is only accepted on a column declared exactly INTEGER
        ColumnType::Boolean | ColumnType::Integer | ColumnType::BigInteger => "INTEGER".into(),
        ColumnType::Float | ColumnType::Double => "REAL".into(),
        ColumnType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        ColumnType::String(_) | ColumnType::Text | ColumnType::Json => "TEXT".into(),
        ColumnType::Binary => "BLOB".into(),
        ColumnType::Date => "DATE".into(),
        ColumnType::DateTime => "DATETIME".into(),
        ColumnType::Timestamp => "TIMESTAMP".into(),
        ColumnType::Custom(sql) => sql.clone(),
    }
}

pub(super) fn column_constraints(
    dialect: &Dialect,
    column: &ColumnDefinition,
    inline_primary: bool,
    parts: &mut Vec<String>,
) -> OrmResult<()> {
    if column.primary && inline_primary {
        parts.push(dialect.primary_key_fragment().into());
        if column.auto_increment {
            parts.push(dialect.auto_increment_fragment().into());
        }
    } else if column.auto_increment {
        return Err(OrmError::unsupported(
            format!(
                "AUTOINCREMENT on '{}' (requires a single INTEGER PRIMARY KEY)",
                column.name
            ),
            dialect.display_name(),
        ));
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
    Ok(())
}

pub(super) fn paginate(limit: Option<u64>, offset: Option<u64>) -> String {
    // SQLite requires LIMIT before OFFSET; -1 means unbounded
    let mut out = match limit {
        Some(limit) => format!(" LIMIT {}", limit),
        None => " LIMIT -1".to_string(),
    };
    if let Some(offset) = offset {
        out.push_str(&format!(" OFFSET {}", offset));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoincrement_outside_primary_key_rejected() {
        let col = ColumnDefinition::new("seq", ColumnType::Integer).auto_increment();
        let err = Dialect::Sqlite.column_definition(&col, false).unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_default_and_unique() {
        let mut col = ColumnDefinition::new("status", ColumnType::String(20)).not_null();
        col.default = Some("'active'".into());
        col.unique = true;
        assert_eq!(
            Dialect::Sqlite.column_definition(&col, false).unwrap(),
            "TEXT NOT NULL DEFAULT 'active' UNIQUE"
        );
    }
}
