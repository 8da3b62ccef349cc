//! SQL dialects.
//!
//! A [`Dialect`] is selected once from configuration and turns engine-neutral
//! descriptions (columns, indexes, pagination, placeholders) into one
//! engine's SQL text. It holds no state and never touches a connection.
//!
//! # Architecture
//!
//! Engine specifics live in parallel submodules:
//! - `mysql`: MySQL / MariaDB
//! - `postgres`: PostgreSQL
//! - `sqlite`: SQLite
//! - `sqlserver`: SQL Server
//!
//! Each submodule provides the same functions; `Dialect` dispatches to them.

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

use crate::error::{OrmError, OrmResult};
use crate::models::schema::{ColumnDefinition, ColumnType, FieldKind, ForeignKeyRef};
use serde::{Deserialize, Serialize};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Includes MariaDB
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    Sqlite,
    #[serde(alias = "mssql")]
    SqlServer,
}

impl Dialect {
    /// Parse a dialect from a URL scheme or configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "sqlserver" | "mssql" => Some(Self::SqlServer),
            _ => None,
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
            Self::SqlServer => "SQL Server",
        }
    }

    /// Get the default port for this dialect.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
            Self::SqlServer => Some(1433),
        }
    }

    // =========================================================================
    // Quoting
    // =========================================================================

    /// Quote an identifier. Dotted names (`schema.table`) are quoted per part.
    pub fn quote(&self, identifier: &str) -> String {
        let (open, close) = match self {
            Self::MySql | Self::Sqlite => ('`', '`'),
            Self::Postgres => ('"', '"'),
            Self::SqlServer => ('[', ']'),
        };
        identifier
            .split('.')
            .map(|part| {
                let escaped = part.replace(close, &format!("{close}{close}"));
                format!("{open}{escaped}{close}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a string literal.
    pub fn quote_string(&self, literal: &str) -> String {
        let mut escaped = literal.replace('\'', "''");
        if *self == Self::MySql {
            escaped = escaped.replace('\\', "\\\\");
        }
        match self {
            Self::SqlServer => format!("N'{}'", escaped),
            _ => format!("'{}'", escaped),
        }
    }

    fn quote_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // =========================================================================
    // Types and column fragments
    // =========================================================================

    /// SQL type for a field kind and declared size.
    pub fn data_type(&self, kind: FieldKind, size: u32) -> String {
        self.column_type(&ColumnType::from_kind(kind, size))
    }

    /// SQL type text for an engine-neutral column type.
    pub fn column_type(&self, column_type: &ColumnType) -> String {
        if let ColumnType::Custom(sql) = column_type {
            return sql.clone();
        }
        match self {
            Self::MySql => mysql::column_type(column_type),
            Self::Postgres => postgres::column_type(column_type),
            Self::Sqlite => sqlite::column_type(column_type),
            Self::SqlServer => sqlserver::column_type(column_type),
        }
    }

    pub fn auto_increment_fragment(&self) -> &'static str {
        match self {
            Self::MySql => "AUTO_INCREMENT",
            Self::Postgres => "GENERATED BY DEFAULT AS IDENTITY",
            Self::Sqlite => "AUTOINCREMENT",
            Self::SqlServer => "IDENTITY(1,1)",
        }
    }

    pub fn primary_key_fragment(&self) -> &'static str {
        "PRIMARY KEY"
    }

    /// Column definition without the column name: type followed by constraints.
    ///
    /// `inline_primary` declares the primary key on the column itself, which
    /// SQLite needs for `AUTOINCREMENT`.
    pub fn column_definition(
        &self,
        column: &ColumnDefinition,
        inline_primary: bool,
    ) -> OrmResult<String> {
        let mut parts = vec![self.column_type(&column.column_type)];

        // custom type text is trusted as-is
        if column.auto_increment
            && !column.column_type.is_integer()
            && !matches!(column.column_type, ColumnType::Custom(_))
        {
            return Err(OrmError::validation(
                Some(&column.name),
                "auto-increment requires an integer column",
            ));
        }

        match self {
            Self::MySql => mysql::column_constraints(self, column, &mut parts),
            Self::Postgres => postgres::column_constraints(self, column, &mut parts),
            Self::Sqlite => sqlite::column_constraints(self, column, inline_primary, &mut parts)?,
            Self::SqlServer => sqlserver::column_constraints(self, column, &mut parts),
        }

        Ok(parts.join(" "))
    }

    fn default_fragment(&self, column: &ColumnDefinition) -> Option<String> {
        column.default.as_ref().map(|d| format!("DEFAULT {}", d))
    }

    // =========================================================================
    // DDL
    // =========================================================================

    /// CREATE TABLE with columns in declaration order.
    ///
    /// Primary-flagged columns become a trailing `PRIMARY KEY (...)` clause,
    /// except that SQLite declares a single primary key inline.
    pub fn create_table_sql(&self, table: &str, columns: &[ColumnDefinition]) -> OrmResult<String> {
        if columns.is_empty() {
            return Err(OrmError::validation(
                None,
                format!("table '{}' has no columns", table),
            ));
        }

        let primary: Vec<String> = columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect();
        let inline_primary = *self == Self::Sqlite && primary.len() == 1;

        let mut items = Vec::with_capacity(columns.len() + 2);
        for column in columns {
            items.push(format!(
                "{} {}",
                self.quote(&column.name),
                self.column_definition(column, inline_primary)?
            ));
        }

        if !primary.is_empty() && !inline_primary {
            items.push(format!(
                "{} ({})",
                self.primary_key_fragment(),
                self.quote_list(&primary)
            ));
        }

        for column in columns {
            if let Some(fk) = &column.references {
                items.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote(&column.name),
                    self.quote(&fk.table),
                    self.quote(&fk.column)
                ));
            }
        }

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote(table),
            items.join(", ")
        ))
    }

    pub fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table))
    }

    /// ALTER TABLE ... ADD COLUMN. `definition` is the text after the name.
    pub fn add_column_sql(&self, table: &str, column: &str, definition: &str) -> OrmResult<String> {
        let keyword = match self {
            Self::SqlServer => "ADD",
            _ => "ADD COLUMN",
        };
        Ok(format!(
            "ALTER TABLE {} {} {} {}",
            self.quote(table),
            keyword,
            self.quote(column),
            definition
        ))
    }

    /// ALTER TABLE ... DROP COLUMN. Unsupported on SQLite.
    pub fn drop_column_sql(&self, table: &str, column: &str) -> OrmResult<String> {
        match self {
            Self::Sqlite => Err(OrmError::unsupported(
                format!("DROP COLUMN {}.{}", table, column),
                self.display_name(),
            )),
            _ => Ok(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote(table),
                self.quote(column)
            )),
        }
    }

    pub fn create_index_sql(
        &self,
        table: &str,
        index: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        let kind = match (unique, self) {
            (true, Self::SqlServer) => "UNIQUE NONCLUSTERED INDEX",
            (false, Self::SqlServer) => "NONCLUSTERED INDEX",
            (true, _) => "UNIQUE INDEX",
            (false, _) => "INDEX",
        };
        format!(
            "CREATE {} {} ON {} ({})",
            kind,
            self.quote(index),
            self.quote(table),
            self.quote_list(columns)
        )
    }

    pub fn drop_index_sql(&self, table: &str, index: &str) -> String {
        match self {
            Self::MySql | Self::SqlServer => {
                format!("DROP INDEX {} ON {}", self.quote(index), self.quote(table))
            }
            Self::Postgres | Self::Sqlite => format!("DROP INDEX IF EXISTS {}", self.quote(index)),
        }
    }

    /// ALTER TABLE ... ADD FOREIGN KEY. SQLite cannot add constraints to an existing table.
    pub fn add_foreign_key_sql(
        &self,
        table: &str,
        column: &str,
        target: &ForeignKeyRef,
    ) -> OrmResult<String> {
        if *self == Self::Sqlite {
            return Err(OrmError::unsupported(
                format!("ADD FOREIGN KEY on {}.{}", table, column),
                self.display_name(),
            ));
        }
        Ok(format!(
            "ALTER TABLE {} ADD FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(table),
            self.quote(column),
            self.quote(&target.table),
            self.quote(&target.column)
        ))
    }

    // =========================================================================
    // Introspection queries
    // =========================================================================

    /// Query counting tables named by the single bound argument.
    pub fn has_table_sql(&self) -> &'static str {
        match self {
            Self::MySql => mysql::HAS_TABLE,
            Self::Postgres => postgres::HAS_TABLE,
            Self::Sqlite => sqlite::HAS_TABLE,
            Self::SqlServer => sqlserver::HAS_TABLE,
        }
    }

    /// Query counting columns; arguments are table name then column name.
    pub fn has_column_sql(&self) -> &'static str {
        match self {
            Self::MySql => mysql::HAS_COLUMN,
            Self::Postgres => postgres::HAS_COLUMN,
            Self::Sqlite => sqlite::HAS_COLUMN,
            Self::SqlServer => sqlserver::HAS_COLUMN,
        }
    }

    // =========================================================================
    // Placeholders and pagination
    // =========================================================================

    /// Positional placeholder for the 1-based argument `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::MySql | Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${}", index),
            Self::SqlServer => format!("@p{}", index),
        }
    }

    /// Rewrite `?` markers to this dialect's placeholders.
    ///
    /// Markers inside quoted literals and identifiers are left alone.
    pub fn bind_placeholders(&self, sql: &str) -> String {
        if matches!(self, Self::MySql | Self::Sqlite) {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut last = 0;
        for (i, pos) in self.marker_offsets(sql).into_iter().enumerate() {
            out.push_str(&sql[last..pos]);
            out.push_str(&self.placeholder(i + 1));
            last = pos + 1;
        }
        out.push_str(&sql[last..]);
        out
    }

    /// Byte offsets of the `?` markers outside quoted text.
    pub fn marker_offsets(&self, sql: &str) -> Vec<usize> {
        let mut offsets = Vec::new();
        self.scan_unquoted(sql, |pos, ch| {
            if ch == '?' {
                offsets.push(pos);
            }
        });
        offsets
    }

    /// True when `expr` has an OR (or `||`) outside parentheses and quotes.
    /// Such an expression must be grouped before it is AND-joined.
    pub fn has_top_level_or(&self, expr: &str) -> bool {
        let mut depth = 0usize;
        let mut found = false;
        self.scan_unquoted(expr, |pos, ch| match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            'o' | 'O' | '|' if depth == 0 => found |= is_or_at(expr, pos),
            _ => {}
        });
        found
    }

    /// Visit every character of `sql` that is not inside a quoted literal or
    /// identifier.
    ///
    /// `'` and `"` quote on every engine, backticks on MySQL and SQLite, and
    /// `[...]` on SQL Server and SQLite. MySQL also honours backslash escapes
    /// inside quotes. Doubled quote characters need no special case: the
    /// quote closes and immediately reopens.
    fn scan_unquoted(&self, sql: &str, mut visit: impl FnMut(usize, char)) {
        let mut closing: Option<char> = None;
        let mut escaped = false;
        for (pos, ch) in sql.char_indices() {
            if let Some(end) = closing {
                if escaped {
                    escaped = false;
                } else if ch == '\\' && *self == Self::MySql && end != '`' {
                    escaped = true;
                } else if ch == end {
                    closing = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' => closing = Some(ch),
                '`' if matches!(self, Self::MySql | Self::Sqlite) => closing = Some('`'),
                '[' if matches!(self, Self::SqlServer | Self::Sqlite) => closing = Some(']'),
                _ => visit(pos, ch),
            }
        }
    }

    /// LIMIT/OFFSET (or OFFSET/FETCH) suffix, with a leading space when non-empty.
    pub fn paginate(&self, limit: Option<u64>, offset: Option<u64>, has_order: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        match self {
            Self::MySql => mysql::paginate(limit, offset),
            Self::Postgres => postgres::paginate(limit, offset),
            Self::Sqlite => sqlite::paginate(limit, offset),
            Self::SqlServer => sqlserver::paginate(limit, offset, has_order),
        }
    }

    /// Clause that makes an INSERT report its generated key, if the engine
    /// needs one. PostgreSQL's goes after the VALUES list, SQL Server's
    /// before it (see [`Dialect::returning_before_values`]).
    pub fn returning_clause(&self, column: &str) -> Option<String> {
        match self {
            Self::Postgres => Some(format!(" RETURNING {}", self.quote(column))),
            Self::SqlServer => Some(format!(" OUTPUT INSERTED.{}", self.quote(column))),
            _ => None,
        }
    }

    pub fn returning_before_values(&self) -> bool {
        *self == Self::SqlServer
    }

    // =========================================================================
    // Savepoints
    // =========================================================================

    pub fn savepoint_sql(&self, name: &str) -> OrmResult<String> {
        let name = savepoint_name(name)?;
        Ok(match self {
            Self::SqlServer => format!("SAVE TRANSACTION {}", name),
            _ => format!("SAVEPOINT {}", name),
        })
    }

    pub fn rollback_to_savepoint_sql(&self, name: &str) -> OrmResult<String> {
        let name = savepoint_name(name)?;
        Ok(match self {
            Self::SqlServer => format!("ROLLBACK TRANSACTION {}", name),
            _ => format!("ROLLBACK TO SAVEPOINT {}", name),
        })
    }

    pub fn release_savepoint_sql(&self, name: &str) -> OrmResult<String> {
        let name = savepoint_name(name)?;
        match self {
            Self::SqlServer => Err(OrmError::unsupported(
                format!("RELEASE SAVEPOINT {}", name),
                self.display_name(),
            )),
            _ => Ok(format!("RELEASE SAVEPOINT {}", name)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// True for plain identifiers: a letter or underscore followed by letters,
/// digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `OR` as a whole word, or `||`, starting at byte `pos`.
fn is_or_at(expr: &str, pos: usize) -> bool {
    if expr.get(pos..pos + 2) == Some("||") {
        return true;
    }
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    expr.get(pos..pos + 2)
        .is_some_and(|w| w.eq_ignore_ascii_case("or"))
        && !expr[..pos].chars().next_back().is_some_and(word)
        && !expr[pos + 2..].chars().next().is_some_and(word)
}

fn savepoint_name(name: &str) -> OrmResult<&str> {
    if is_identifier(name) {
        Ok(name)
    } else {
        Err(OrmError::validation(
            None,
            format!("invalid savepoint name '{}'", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", ColumnType::BigInteger)
                .primary()
                .auto_increment(),
            ColumnDefinition::new("name", ColumnType::String(0)).not_null(),
        ]
    }

    #[test]
    fn test_quote_per_dialect() {
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote("public.users"), "\"public\".\"users\"");
        assert_eq!(Dialect::SqlServer.quote("users"), "[users]");
        assert_eq!(Dialect::Sqlite.quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(Dialect::Postgres.quote_string("it's"), "'it''s'");
        assert_eq!(Dialect::MySql.quote_string("a\\b"), "'a\\\\b'");
        assert_eq!(Dialect::SqlServer.quote_string("x"), "N'x'");
    }

    #[test]
    fn test_mysql_create_table() {
        let sql = Dialect::MySql
            .create_table_sql("users", &users_columns())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (`id` BIGINT NOT NULL AUTO_INCREMENT, \
             `name` VARCHAR(255) NOT NULL, PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn test_sqlite_inline_primary_key() {
        let sql = Dialect::Sqlite
            .create_table_sql("users", &users_columns())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (`id` INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             `name` TEXT NOT NULL)"
        );
    }

    #[test]
    fn test_sqlite_composite_primary_key_is_trailing() {
        let columns = vec![
            ColumnDefinition::new("a", ColumnType::Integer).primary(),
            ColumnDefinition::new("b", ColumnType::Integer).primary(),
        ];
        let sql = Dialect::Sqlite.create_table_sql("pairs", &columns).unwrap();
        assert!(sql.ends_with("PRIMARY KEY (`a`, `b`))"));
    }

    #[test]
    fn test_postgres_identity_and_sqlserver_identity() {
        let pg = Dialect::Postgres
            .create_table_sql("users", &users_columns())
            .unwrap();
        assert!(pg.contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY NOT NULL"));
        assert!(pg.ends_with("PRIMARY KEY (\"id\"))"));

        let ms = Dialect::SqlServer
            .create_table_sql("users", &users_columns())
            .unwrap();
        assert!(ms.contains("[id] BIGINT IDENTITY(1,1) NOT NULL"));
        assert!(ms.contains("[name] NVARCHAR(255) NOT NULL"));
    }

    #[test]
    fn test_create_table_requires_columns() {
        assert!(Dialect::MySql.create_table_sql("empty", &[]).is_err());
    }

    #[test]
    fn test_foreign_key_clause() {
        let mut col = ColumnDefinition::new("user_id", ColumnType::BigInteger);
        col.references = Some(ForeignKeyRef {
            table: "users".into(),
            column: "id".into(),
        });
        let sql = Dialect::Postgres.create_table_sql("posts", &[col]).unwrap();
        assert!(sql.contains("FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")"));
    }

    #[test]
    fn test_sqlite_drop_column_unsupported() {
        let err = Dialect::Sqlite.drop_column_sql("users", "age").unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedOperation { .. }));
        assert_eq!(
            Dialect::MySql.drop_column_sql("users", "age").unwrap(),
            "ALTER TABLE `users` DROP COLUMN `age`"
        );
    }

    #[test]
    fn test_add_column_keyword() {
        assert_eq!(
            Dialect::SqlServer
                .add_column_sql("users", "age", "INT NULL")
                .unwrap(),
            "ALTER TABLE [users] ADD [age] INT NULL"
        );
        assert_eq!(
            Dialect::Postgres
                .add_column_sql("users", "age", "INTEGER")
                .unwrap(),
            "ALTER TABLE \"users\" ADD COLUMN \"age\" INTEGER"
        );
    }

    #[test]
    fn test_index_sql() {
        let cols = vec!["email".to_string()];
        assert_eq!(
            Dialect::MySql.create_index_sql("users", "uq_email", &cols, true),
            "CREATE UNIQUE INDEX `uq_email` ON `users` (`email`)"
        );
        assert_eq!(
            Dialect::SqlServer.create_index_sql("users", "idx_email", &cols, false),
            "CREATE NONCLUSTERED INDEX [idx_email] ON [users] ([email])"
        );
        assert_eq!(
            Dialect::MySql.drop_index_sql("users", "idx_email"),
            "DROP INDEX `idx_email` ON `users`"
        );
        assert_eq!(
            Dialect::Postgres.drop_index_sql("users", "idx_email"),
            "DROP INDEX IF EXISTS \"idx_email\""
        );
    }

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(Dialect::MySql.data_type(FieldKind::String, 100), "VARCHAR(100)");
        assert_eq!(Dialect::MySql.data_type(FieldKind::String, 1000), "TEXT");
        assert_eq!(Dialect::SqlServer.data_type(FieldKind::String, 5000), "NVARCHAR(MAX)");
        assert_eq!(Dialect::Sqlite.data_type(FieldKind::Bool, 0), "INTEGER");
        assert_eq!(Dialect::Postgres.data_type(FieldKind::Double, 0), "DOUBLE PRECISION");
    }

    #[test]
    fn test_bind_placeholders() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND c IN (?, ?)";
        assert_eq!(Dialect::MySql.bind_placeholders(sql), sql);
        assert_eq!(
            Dialect::Postgres.bind_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND c IN ($2, $3)"
        );
        assert_eq!(
            Dialect::SqlServer.bind_placeholders("x = ? AND [we?rd] = ?"),
            "x = @P1 AND [we?rd] = @P2"
        );
    }

    #[test]
    fn test_marker_scanning_follows_dialect_quoting() {
        // backslash escapes only on MySQL
        assert_eq!(Dialect::MySql.marker_offsets(r"a = 'it\'s' AND b = ?").len(), 1);
        assert_eq!(Dialect::Postgres.marker_offsets(r"a = 'x\' AND b = ?").len(), 1);
        assert_eq!(Dialect::MySql.marker_offsets("a = 'it''s?' AND b = ?").len(), 1);

        // brackets quote on SQL Server and SQLite, not on PostgreSQL arrays
        assert_eq!(Dialect::SqlServer.marker_offsets("[a?b] = ?").len(), 1);
        assert_eq!(Dialect::Sqlite.marker_offsets("[a?b] = ?").len(), 1);
        assert_eq!(
            Dialect::Postgres.bind_placeholders("tags[?] = ?"),
            "tags[$1] = $2"
        );

        // backticks are not quotes on PostgreSQL
        assert_eq!(Dialect::Postgres.marker_offsets("`?` = ?").len(), 2);
        assert_eq!(Dialect::MySql.marker_offsets("`?` = ?").len(), 1);
    }

    #[test]
    fn test_top_level_or_detection() {
        let d = Dialect::Postgres;
        assert!(d.has_top_level_or("a = ? OR b = ?"));
        assert!(d.has_top_level_or("a = 1 or b = 2"));
        assert!(d.has_top_level_or("a = 1 || b = 2"));
        assert!(!d.has_top_level_or("(a = ? OR b = ?)"));
        assert!(!d.has_top_level_or("color = 'red or blue'"));
        assert!(!d.has_top_level_or("orders > ? AND vendor = ?"));
        assert!(!d.has_top_level_or("age > ?"));
    }

    #[test]
    fn test_paginate() {
        assert_eq!(Dialect::MySql.paginate(Some(5), None, false), " LIMIT 5");
        assert_eq!(
            Dialect::Sqlite.paginate(None, Some(10), false),
            " LIMIT -1 OFFSET 10"
        );
        assert_eq!(
            Dialect::SqlServer.paginate(Some(5), Some(10), false),
            " ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
        );
        assert_eq!(Dialect::Postgres.paginate(None, None, true), "");
    }

    #[test]
    fn test_savepoint_names_validated() {
        assert_eq!(
            Dialect::Postgres.savepoint_sql("before_update").unwrap(),
            "SAVEPOINT before_update"
        );
        assert!(Dialect::Postgres.savepoint_sql("x; DROP TABLE t").is_err());
        assert!(Dialect::SqlServer.release_savepoint_sql("sp1").is_err());
    }

    #[test]
    fn test_from_name_and_serde() {
        assert_eq!(Dialect::from_name("PostgreSQL"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("oracle"), None);
        let d: Dialect = serde_json::from_str("\"mssql\"").unwrap();
        assert_eq!(d, Dialect::SqlServer);
    }
}
