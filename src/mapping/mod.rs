//! Model mapping.
//!
//! A record type implements [`Model`] (normally through the [`model!`](crate::model)
//! macro). The first time a type is used with a dialect its field list and
//! tags are parsed into a [`TableInfo`], which is cached for the life of the
//! process and shared as `Arc<TableInfo>`.
//!
//! Rows are bound back into records by resolving each result column to a
//! field: exact column name first, then snake_case field name, then a
//! case-insensitive field name match. Unknown columns are ignored.

pub mod tag;

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::models::query::Record;
use crate::models::schema::{ColumnDefinition, ColumnType, FieldKind, IndexDefinition};
use crate::models::value::{SqlField, Value};
use chrono::Utc;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tag::{parse_tag, to_snake_case};
use tracing::debug;

/// Column populated with the insert time when left unset.
pub const CREATED_AT: &str = "created_at";
/// Column refreshed on every insert and update.
pub const UPDATED_AT: &str = "updated_at";

/// One mapped struct field, as declared to the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub tag: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldDef {
    pub fn new(name: &'static str, tag: &'static str, kind: FieldKind, nullable: bool) -> Self {
        Self {
            name,
            tag,
            kind,
            nullable,
        }
    }

    /// Build a definition whose kind is inferred from the accessor's return type.
    pub fn of<M, T, F>(name: &'static str, tag: &'static str, _accessor: F) -> Self
    where
        T: SqlField,
        F: Fn(&M) -> &T,
    {
        Self::new(name, tag, T::KIND, T::NULLABLE)
    }
}

/// A record type that maps onto one table.
pub trait Model: Default + Send + Sync + 'static {
    /// Mapped fields in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Explicit table name. Defaults to the snake_case type name.
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Current value of a field, `Value::Null` for unknown names.
    fn field_value(&self, field: &str) -> Value;

    /// Assign a decoded value to a field.
    fn set_field(&mut self, field: &str, value: Value) -> OrmResult<()>;
}

/// Column metadata derived from one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub field: &'static str,
    pub kind: FieldKind,
    pub column_type: ColumnType,
    /// Rendered SQL type for the dialect the table info was built for
    pub sql_type: String,
    pub primary: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub size: u32,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub index: Option<String>,
}

impl ColumnInfo {
    pub fn definition(&self) -> ColumnDefinition {
        ColumnDefinition {
            name: self.name.clone(),
            column_type: self.column_type.clone(),
            not_null: self.not_null || self.primary,
            primary: self.primary,
            auto_increment: self.auto_increment,
            unique: self.unique,
            default: self.default.clone(),
            comment: self.comment.clone(),
            references: None,
        }
    }

    pub fn is_created_at(&self) -> bool {
        self.name == CREATED_AT && self.kind == FieldKind::Timestamp
    }

    pub fn is_updated_at(&self) -> bool {
        self.name == UPDATED_AT && self.kind == FieldKind::Timestamp
    }
}

/// Table metadata for one record type under one dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub type_name: &'static str,
    pub dialect: Dialect,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Build metadata for `T` without consulting the cache.
    pub fn build<T: Model>(dialect: Dialect) -> OrmResult<Self> {
        let type_name = std::any::type_name::<T>();
        let name = T::table_name()
            .map(String::from)
            .unwrap_or_else(|| default_table_name(type_name));

        let mut columns = Vec::new();
        for field in T::fields() {
            let Some(tag) = parse_tag(field.name, field.tag, type_name)? else {
                continue;
            };
            let column_type = match &tag.sql_type {
                Some(sql) => ColumnType::Custom(sql.clone()),
                None => ColumnType::from_kind(field.kind, tag.size),
            };
            if columns.iter().any(|c: &ColumnInfo| c.name == tag.column) {
                return Err(OrmError::mapping(
                    format!("column '{}' is mapped more than once", tag.column),
                    type_name,
                ));
            }
            columns.push(ColumnInfo {
                sql_type: dialect.column_type(&column_type),
                name: tag.column,
                field: field.name,
                kind: field.kind,
                column_type,
                primary: tag.primary,
                auto_increment: tag.auto_increment,
                not_null: tag.not_null,
                unique: tag.unique,
                size: tag.size,
                default: tag.default,
                comment: tag.comment,
                index: tag.index,
            });
        }

        if columns.is_empty() {
            return Err(OrmError::mapping("record type maps no columns", type_name));
        }

        Ok(Self {
            name,
            type_name,
            dialect,
            columns,
        })
    }

    /// The primary column, when exactly one column is flagged primary.
    pub fn primary_key(&self) -> Option<&ColumnInfo> {
        let mut primaries = self.columns.iter().filter(|c| c.primary);
        match (primaries.next(), primaries.next()) {
            (Some(pk), None) => Some(pk),
            _ => None,
        }
    }

    /// All primary-flagged columns in declaration order.
    pub fn primary_keys(&self) -> Vec<&ColumnInfo> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    /// Look up a column by column name or field name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.field == name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Resolve a result column to a mapped column.
    pub fn resolve(&self, result_column: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == result_column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| to_snake_case(c.field) == result_column)
            })
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| c.field.eq_ignore_ascii_case(result_column))
            })
    }

    pub fn create_definitions(&self) -> Vec<ColumnDefinition> {
        self.columns.iter().map(ColumnInfo::definition).collect()
    }

    /// Indexes declared through `index` / `index:<name>` tags, grouped by name.
    pub fn index_definitions(&self) -> Vec<IndexDefinition> {
        let mut indexes: Vec<IndexDefinition> = Vec::new();
        for column in &self.columns {
            let Some(index) = &column.index else {
                continue;
            };
            let name = if index.is_empty() {
                IndexDefinition::generated_name(&self.name, &[column.name.clone()], false)
            } else {
                index.clone()
            };
            match indexes.iter_mut().find(|i| i.name == name) {
                Some(existing) => existing.columns.push(column.name.clone()),
                None => indexes.push(IndexDefinition {
                    name,
                    columns: vec![column.name.clone()],
                    unique: false,
                }),
            }
        }
        indexes
    }

    /// Check required columns before writing.
    ///
    /// A `not_null` column that is not auto-increment must not hold a zero
    /// value: NULL, 0, false, an empty string or byte string, the zero
    /// timestamp, or JSON null. Timestamp columns filled on write are exempt.
    pub fn validate<T: Model>(&self, record: &T) -> OrmResult<()> {
        let required = self.columns.iter().filter(|c| {
            c.not_null && !c.auto_increment && !c.is_created_at() && !c.is_updated_at()
        });
        for column in required {
            if record.field_value(column.field).is_zero() {
                return Err(OrmError::validation(
                    Some(column.field),
                    format!("field '{}' is required", column.field),
                ));
            }
        }
        Ok(())
    }

    /// Column/value pairs for writing `record`.
    ///
    /// Unset auto-increment columns are left out so the engine assigns them.
    /// `updated_at` is always stamped, `created_at` only when unset.
    pub(crate) fn insert_values<T: Model>(&self, record: &T) -> Vec<(&ColumnInfo, Value)> {
        let now = Value::Timestamp(Utc::now().naive_utc());
        self.columns
            .iter()
            .filter_map(|column| {
                let value = record.field_value(column.field);
                if column.auto_increment && (value.is_null() || value == Value::Int(0)) {
                    return None;
                }
                let value = if column.is_updated_at() || (column.is_created_at() && value.is_zero())
                {
                    now.clone()
                } else {
                    value
                };
                Some((column, value))
            })
            .collect()
    }

    /// Column/value pairs for a full-overwrite UPDATE: every column except
    /// primary keys, auto-increment columns and `created_at`.
    pub(crate) fn update_values<T: Model>(&self, record: &T) -> Vec<(&ColumnInfo, Value)> {
        let now = Value::Timestamp(Utc::now().naive_utc());
        self.columns
            .iter()
            .filter(|c| !c.primary && !c.auto_increment && !c.is_created_at())
            .map(|column| {
                let value = if column.is_updated_at() {
                    now.clone()
                } else {
                    record.field_value(column.field)
                };
                (column, value)
            })
            .collect()
    }
}

/// Cached table metadata for `T` under `dialect`.
pub fn table_info<T: Model>(dialect: Dialect) -> OrmResult<Arc<TableInfo>> {
    static CACHE: OnceLock<RwLock<HashMap<(TypeId, Dialect), Arc<TableInfo>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let key = (TypeId::of::<T>(), dialect);

    {
        let entries = cache.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = entries.get(&key) {
            return Ok(Arc::clone(info));
        }
    }

    let info = Arc::new(TableInfo::build::<T>(dialect)?);
    debug!(
        table = %info.name,
        record_type = info.type_name,
        dialect = %dialect,
        columns = info.columns.len(),
        "Registered model"
    );

    let mut entries = cache.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(entries.entry(key).or_insert(info)))
}

/// Check required columns of `record` before writing, using the cached
/// metadata for the default dialect. See [`TableInfo::validate`].
pub fn validate<T: Model>(record: &T) -> OrmResult<()> {
    table_info::<T>(Dialect::default())?.validate(record)
}

/// Binds rows of one result set into records.
///
/// Column resolution happens once per result set, not per row.
pub struct RowBinder<'a> {
    fields: Vec<Option<&'a str>>,
}

impl<'a> RowBinder<'a> {
    pub fn new(info: &'a TableInfo, columns: &[String]) -> Self {
        let fields = columns
            .iter()
            .map(|c| info.resolve(c).map(|col| col.field))
            .collect();
        Self { fields }
    }

    pub fn bind<T: Model>(&self, record: Record) -> OrmResult<T> {
        let mut target = T::default();
        for (field, value) in self.fields.iter().zip(record.values) {
            if let Some(field) = field {
                target.set_field(field, value).map_err(|e| match e {
                    OrmError::Mapping { message, type_name } => OrmError::mapping(
                        format!("field '{}': {}", field, message),
                        type_name,
                    ),
                    other => other,
                })?;
            }
        }
        Ok(target)
    }
}

/// Bind a single row into a record using the same resolution rules as
/// multi-row results.
pub fn bind_row<T: Model>(info: &TableInfo, record: Record) -> OrmResult<T> {
    RowBinder::new(info, &record.columns).bind(record)
}

/// Snake-case of the last path segment, generics stripped.
fn default_table_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let last = base.rsplit("::").next().unwrap_or(base);
    to_snake_case(last)
}
