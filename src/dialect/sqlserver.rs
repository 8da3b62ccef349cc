//! SQL Server specifics. Statements run through the tiberius driver, which
//! names its parameters `@P1`, `@P2`, ...

use super::Dialect;
use crate::models::schema::{ColumnDefinition, ColumnType};

pub(super) const HAS_TABLE: &str =
    "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = @P1";

pub(super) const HAS_COLUMN: &str =
    "SELECT COUNT(*) FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = @P1 AND COLUMN_NAME = @P2";

pub(super) fn column_type(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Boolean => "BIT".into(),
        ColumnType::Integer => "INT".into(),
        ColumnType::BigInteger => "BIGINT".into(),
        ColumnType::Float => "REAL".into(),
        ColumnType::Double => "FLOAT".into(),
        ColumnType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        ColumnType::String(0) => "NVARCHAR(255)".into(),
        ColumnType::String(n) if *n <= 4000 => format!("NVARCHAR({})", n),
        ColumnType::String(_) | ColumnType::Text | ColumnType::Json => "NVARCHAR(MAX)".into(),
        ColumnType::Binary => "VARBINARY(MAX)".into(),
        ColumnType::Date => "DATE".into(),
        ColumnType::DateTime | ColumnType::Timestamp => "DATETIME2".into(),
        ColumnType::Custom(sql) => sql.clone(),
    }
}

pub(super) fn column_constraints(
    dialect: &Dialect,
    column: &ColumnDefinition,
    parts: &mut Vec<String>,
) {
    if column.auto_increment {
        parts.push(dialect.auto_increment_fragment().into());
    }
    parts.push(if column.not_null { "NOT NULL" } else { "NULL" }.into());
    if let Some(default) = dialect.default_fragment(column) {
        parts.push(default);
    }
    if column.unique {
        parts.push("UNIQUE".into());
    }
}

/// OFFSET/FETCH needs an ORDER BY; `(SELECT NULL)` keeps engine order.
pub(super) fn paginate(limit: Option<u64>, offset: Option<u64>, has_order: bool) -> String {
    let mut out = String::new();
    if !has_order {
        out.push_str(" ORDER BY (SELECT NULL)");
    }
    out.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
    if let Some(limit) = limit {
        out.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
    }
    out
}
