//! Fluent table description.
//!
//! A [`TableBuilder`] records column declarations, constraints and alter
//! operations in call order. Modifiers (`nullable`, `default`, ...) apply to
//! the most recently declared column. Misuse (a modifier before any column,
//! a constraint naming an undeclared column) is remembered and reported
//! when statements are rendered.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::models::schema::{ColumnDefinition, ColumnType, ForeignKeyRef, IndexDefinition};

#[derive(Debug, Clone, PartialEq)]
enum TableOp {
    Column(ColumnDefinition),
    Primary(Vec<String>),
    Index(IndexDefinition),
    Foreign { column: String, target: ForeignKeyRef },
    DropColumn(String),
    DropIndex(String),
}

/// Columns, constraints and alterations for one table.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    dialect: Dialect,
    ops: Vec<TableOp>,
    error: Option<String>,
}

impl TableBuilder {
    pub fn new(name: &str, dialect: Dialect) -> Self {
        Self {
            name: name.to_string(),
            dialect,
            ops: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Column declarators
    // =========================================================================

    /// Auto-increment BIGINT primary key named `id`.
    pub fn id(&mut self) -> &mut Self {
        self.column(
            ColumnDefinition::new("id", ColumnType::BigInteger)
                .primary()
                .auto_increment(),
        )
    }

    /// Bounded string; a size of 0 uses the dialect default length.
    pub fn string(&mut self, name: &str, size: u32) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::String(size)))
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Text))
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Integer))
    }

    pub fn big_integer(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::BigInteger))
    }

    pub fn float(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Float))
    }

    pub fn double(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Double))
    }

    pub fn decimal(&mut self, name: &str, precision: u8, scale: u8) -> &mut Self {
        if scale > precision {
            self.fail(format!(
                "decimal '{}' has scale {} greater than precision {}",
                name, scale, precision
            ));
        }
        self.column(ColumnDefinition::new(
            name,
            ColumnType::Decimal { precision, scale },
        ))
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Boolean))
    }

    pub fn date(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Date))
    }

    pub fn date_time(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::DateTime))
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Timestamp))
    }

    pub fn json(&mut self, name: &str) -> &mut Self {
        self.column(ColumnDefinition::new(name, ColumnType::Json))
    }

    fn column(&mut self, column: ColumnDefinition) -> &mut Self {
        if self.declared(&column.name).is_some() {
            self.fail(format!("column '{}' declared twice", column.name));
        }
        self.ops.push(TableOp::Column(column));
        self
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    /// Primary key over the given columns (composite when more than one).
    pub fn primary(&mut self, columns: &[&str]) -> &mut Self {
        if self.require_columns("primary key", columns) {
            self.ops
                .push(TableOp::Primary(columns.iter().map(|c| c.to_string()).collect()));
        }
        self
    }

    pub fn index(&mut self, columns: &[&str]) -> &mut Self {
        self.push_index(columns, false)
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.push_index(columns, true)
    }

    /// `column` references `table(target_column)`.
    pub fn foreign(&mut self, column: &str, table: &str, target_column: &str) -> &mut Self {
        self.ops.push(TableOp::Foreign {
            column: column.to_string(),
            target: ForeignKeyRef {
                table: table.to_string(),
                column: target_column.to_string(),
            },
        });
        self
    }

    fn push_index(&mut self, columns: &[&str], unique: bool) -> &mut Self {
        if columns.is_empty() {
            self.fail("index requires at least one column".to_string());
            return self;
        }
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let name = IndexDefinition::generated_name(&self.name, &columns, unique);
        self.ops.push(TableOp::Index(IndexDefinition {
            name,
            columns,
            unique,
        }));
        self
    }

    // =========================================================================
    // Modifiers (last declared column)
    // =========================================================================

    pub fn nullable(&mut self) -> &mut Self {
        self.modify("nullable", |c| c.not_null = false)
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.modify("not_null", |c| c.not_null = true)
    }

    /// Default value, rendered verbatim (quote string literals yourself).
    pub fn default(&mut self, value: &str) -> &mut Self {
        let value = value.to_string();
        self.modify("default", move |c| c.default = Some(value))
    }

    pub fn comment(&mut self, text: &str) -> &mut Self {
        let text = text.to_string();
        self.modify("comment", move |c| c.comment = Some(text))
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.modify("auto_increment", |c| c.auto_increment = true)
    }

    fn modify(&mut self, modifier: &str, apply: impl FnOnce(&mut ColumnDefinition)) -> &mut Self {
        let last = self.ops.iter_mut().rev().find_map(|op| match op {
            TableOp::Column(column) => Some(column),
            _ => None,
        });
        match last {
            Some(column) => apply(column),
            None => self.fail(format!("{} used before any column was declared", modifier)),
        }
        self
    }

    // =========================================================================
    // Alterations
    // =========================================================================

    pub fn drop_column(&mut self, name: &str) -> &mut Self {
        self.ops.push(TableOp::DropColumn(name.to_string()));
        self
    }

    pub fn drop_index(&mut self, name: &str) -> &mut Self {
        self.ops.push(TableOp::DropIndex(name.to_string()));
        self
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// CREATE TABLE followed by one CREATE INDEX per declared index.
    pub fn create_statements(&self) -> OrmResult<Vec<String>> {
        self.check()?;
        let mut columns = Vec::new();
        let mut indexes = Vec::new();
        for op in &self.ops {
            match op {
                TableOp::Column(column) => columns.push(column.clone()),
                TableOp::Primary(_) | TableOp::Foreign { .. } => {}
                TableOp::Index(index) => indexes.push(index),
                TableOp::DropColumn(_) | TableOp::DropIndex(_) => {
                    return Err(OrmError::validation(
                        None,
                        format!("cannot drop from table '{}' while creating it", self.name),
                    ));
                }
            }
        }

        for op in &self.ops {
            match op {
                TableOp::Primary(names) => {
                    for column in columns.iter_mut() {
                        if names.contains(&column.name) {
                            column.primary = true;
                            column.not_null = true;
                        }
                    }
                }
                TableOp::Foreign { column, target } => {
                    match columns.iter_mut().find(|c| c.name == *column) {
                        Some(def) => def.references = Some(target.clone()),
                        None => {
                            return Err(OrmError::validation(
                                Some(column),
                                format!("foreign key on undeclared column '{}'", column),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        let mut statements = vec![self.dialect.create_table_sql(&self.name, &columns)?];
        statements.extend(indexes.into_iter().map(|index| {
            self.dialect
                .create_index_sql(&self.name, &index.name, &index.columns, index.unique)
        }));
        Ok(statements)
    }

    /// One ALTER/CREATE INDEX/DROP statement per operation, in call order.
    pub fn alter_statements(&self) -> OrmResult<Vec<String>> {
        self.check()?;
        let dialect = self.dialect;
        let mut statements = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let sql = match op {
                TableOp::Column(column) => {
                    let definition = dialect.column_definition(column, false)?;
                    dialect.add_column_sql(&self.name, &column.name, &definition)?
                }
                TableOp::Primary(_) => {
                    return Err(OrmError::unsupported(
                        format!("adding a primary key to existing table '{}'", self.name),
                        dialect,
                    ));
                }
                TableOp::Index(index) => {
                    dialect.create_index_sql(&self.name, &index.name, &index.columns, index.unique)
                }
                TableOp::Foreign { column, target } => {
                    dialect.add_foreign_key_sql(&self.name, column, target)?
                }
                TableOp::DropColumn(column) => dialect.drop_column_sql(&self.name, column)?,
                TableOp::DropIndex(index) => dialect.drop_index_sql(&self.name, index),
            };
            statements.push(sql);
        }
        Ok(statements)
    }

    fn check(&self) -> OrmResult<()> {
        match &self.error {
            Some(message) => Err(OrmError::validation(None, message.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn declared(&self, name: &str) -> Option<&ColumnDefinition> {
        self.ops.iter().find_map(|op| match op {
            TableOp::Column(column) if column.name == name => Some(column),
            _ => None,
        })
    }

    fn require_columns(&mut self, what: &str, columns: &[&str]) -> bool {
        if columns.is_empty() {
            self.fail(format!("{} requires at least one column", what));
            return false;
        }
        if let Some(missing) = columns.iter().find(|c| self.declared(c).is_none()) {
            self.fail(format!("{} names undeclared column '{}'", what, missing));
            return false;
        }
        true
    }
}
