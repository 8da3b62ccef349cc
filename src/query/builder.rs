//! Fluent query builder.
//!
//! Builder methods take `self` by value and return it, so a chain reads
//! top to bottom. Terminal operations borrow the builder mutably: the same
//! filters can be counted and then fetched.
//!
//! Arguments are collected in the order their markers appear in the
//! rendered statement: SET values, then JOIN/WHERE, then HAVING.

use crate::db::executor::Session;
use crate::dialect::{Dialect, is_identifier};
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ColumnInfo, Model, RowBinder, TableInfo, bind_row, table_info};
use crate::models::query::{ExecResult, Record};
use crate::models::value::Value;
use crate::query::clause::{
    Join, JoinKind, Operator, QueryCondition, count_markers, group_raw, render_conditions,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Accumulates one statement's clauses and runs it on a [`Session`].
pub struct QueryBuilder<'a> {
    session: Session<'a>,
    table: String,
    info: Option<Arc<TableInfo>>,
    columns: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<QueryCondition>,
    groups: Vec<String>,
    havings: Vec<QueryCondition>,
    orders: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    /// First argument-count mismatch, reported by the terminal call
    error: Option<String>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(session: Session<'a>, table: &str) -> Self {
        Self {
            session,
            table: table.to_string(),
            info: None,
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            error: None,
        }
    }

    /// Builder over the table mapped by `T`.
    pub fn for_model<T: Model>(session: Session<'a>) -> OrmResult<Self> {
        let info = table_info::<T>(session.dialect())?;
        let mut builder = Self::new(session, &info.name);
        builder.info = Some(info);
        Ok(builder)
    }

    pub fn dialect(&self) -> Dialect {
        self.session.dialect()
    }

    // =========================================================================
    // Clauses
    // =========================================================================

    /// Replace the selected columns. Expressions are used verbatim.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the target table. Plain names are quoted; anything else
    /// (aliases, schema paths) is used verbatim.
    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Add a raw condition with `?` markers, one per argument.
    pub fn where_<I, V>(mut self, condition: &str, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = args.into_iter().map(Into::into).collect();
        self.check_markers(condition, values.len());
        let condition = group_raw(self.dialect(), condition);
        self.conditions.push(QueryCondition::raw(condition, values));
        self
    }

    pub fn where_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push(QueryCondition::new(column, Operator::In, values));
        self
    }

    pub fn where_not_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push(QueryCondition::new(column, Operator::NotIn, values));
        self
    }

    pub fn where_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.conditions.push(QueryCondition::new(
            column,
            Operator::Between,
            vec![low.into(), high.into()],
        ));
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions
            .push(QueryCondition::new(column, Operator::IsNull, Vec::new()));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.conditions
            .push(QueryCondition::new(column, Operator::IsNotNull, Vec::new()));
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.orders.push(column.to_string());
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.orders.push(format!("{} DESC", column));
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.groups.push(column.to_string());
        self
    }

    /// Add a raw HAVING condition with `?` markers.
    pub fn having<I, V>(mut self, condition: &str, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = args.into_iter().map(Into::into).collect();
        self.check_markers(condition, values.len());
        let condition = group_raw(self.dialect(), condition);
        self.havings.push(QueryCondition::raw(condition, values));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn join(self, table: &str, on: &str) -> Self {
        self.push_join(JoinKind::Join, table, on)
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.push_join(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.push_join(JoinKind::Right, table, on)
    }

    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.push_join(JoinKind::Inner, table, on)
    }

    fn push_join(mut self, kind: JoinKind, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on: on.to_string(),
        });
        self
    }

    fn check_markers(&mut self, expr: &str, args: usize) {
        let markers = count_markers(self.dialect(), expr);
        if markers != args && self.error.is_none() {
            self.error = Some(format!(
                "'{}' has {} placeholder(s) but {} argument(s)",
                expr, markers, args
            ));
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render the SELECT statement and its arguments without executing.
    pub fn to_sql(&self) -> OrmResult<(String, Vec<Value>)> {
        self.render_select(self.limit)
    }

    fn check(&self) -> OrmResult<()> {
        if let Some(message) = &self.error {
            return Err(OrmError::validation(None, message.clone()));
        }
        if self.table.is_empty() {
            return Err(OrmError::validation(None, "no table selected"));
        }
        Ok(())
    }

    fn table_ref(&self) -> String {
        if is_identifier(&self.table) {
            self.dialect().quote(&self.table)
        } else {
            self.table.clone()
        }
    }

    /// `FROM` target, joins and WHERE.
    fn render_source(&self, sql: &mut String, args: &mut Vec<Value>) {
        sql.push_str(&self.table_ref());
        for join in &self.joins {
            sql.push_str(&join.render());
        }
        self.render_where(sql, args);
    }

    fn render_where(&self, sql: &mut String, args: &mut Vec<Value>) {
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            render_conditions(&self.conditions, sql, args);
        }
    }

    fn render_grouping(&self, sql: &mut String, args: &mut Vec<Value>) {
        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            render_conditions(&self.havings, sql, args);
        }
    }

    fn render_select(&self, limit: Option<u64>) -> OrmResult<(String, Vec<Value>)> {
        self.check()?;
        let dialect = self.dialect();
        let mut sql = String::from("SELECT ");
        let mut args = Vec::new();

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        self.render_source(&mut sql, &mut args);
        self.render_grouping(&mut sql, &mut args);

        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(", "));
        }
        sql.push_str(&dialect.paginate(limit, self.offset, !self.orders.is_empty()));

        Ok((dialect.bind_placeholders(&sql), args))
    }

    /// COUNT over the filtered rows; grouped queries count groups.
    fn render_count(&self) -> OrmResult<(String, Vec<Value>)> {
        self.check()?;
        let mut sql = String::new();
        let mut args = Vec::new();

        if self.groups.is_empty() {
            sql.push_str("SELECT COUNT(*) FROM ");
            self.render_source(&mut sql, &mut args);
        } else {
            sql.push_str("SELECT COUNT(*) FROM (SELECT ");
            if self.columns.is_empty() {
                sql.push_str(&self.groups.join(", "));
            } else {
                sql.push_str(&self.columns.join(", "));
            }
            sql.push_str(" FROM ");
            self.render_source(&mut sql, &mut args);
            self.render_grouping(&mut sql, &mut args);
            sql.push_str(") AS grouped");
        }

        Ok((self.dialect().bind_placeholders(&sql), args))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run the SELECT and return undecoded rows.
    pub async fn fetch_records(&mut self) -> OrmResult<Vec<Record>> {
        let (sql, args) = self.to_sql()?;
        self.session.fetch_all(&sql, &args).await
    }

    /// Run the SELECT and bind every row into a `T`.
    pub async fn get<T: Model>(&mut self) -> OrmResult<Vec<T>> {
        let info = table_info::<T>(self.dialect())?;
        let records = self.fetch_records().await?;
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        let binder = RowBinder::new(&info, &first.columns);
        records.into_iter().map(|r| binder.bind(r)).collect()
    }

    /// Alias of [`get`](Self::get).
    pub async fn find<T: Model>(&mut self) -> OrmResult<Vec<T>> {
        self.get::<T>().await
    }

    /// First matching row. The builder's own limit is left untouched.
    pub async fn first<T: Model>(&mut self) -> OrmResult<Option<T>> {
        let info = table_info::<T>(self.dialect())?;
        let (sql, args) = self.render_select(Some(1))?;
        let records = self.session.fetch_all(&sql, &args).await?;
        match records.into_iter().next() {
            Some(record) => bind_row(&info, record).map(Some),
            None => Ok(None),
        }
    }

    pub async fn count(&mut self) -> OrmResult<i64> {
        let (sql, args) = self.render_count()?;
        let records = self.session.fetch_all(&sql, &args).await?;
        records
            .into_iter()
            .next()
            .and_then(|r| r.values.into_iter().next())
            .unwrap_or(Value::Int(0))
            .get::<i64>()
    }

    pub async fn exists(&mut self) -> OrmResult<bool> {
        Ok(self.count().await? > 0)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one record. Unset auto-increment columns are left to the
    /// engine and the generated key is reported in the result.
    pub async fn insert<T: Model>(&mut self, record: &T) -> OrmResult<ExecResult> {
        let dialect = self.dialect();
        let info = table_info::<T>(dialect)?;
        info.validate(record)?;
        self.check()?;
        let (columns, values): (Vec<&ColumnInfo>, Vec<Value>) =
            info.insert_values(record).into_iter().unzip();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

        let returning = generated_key(&info).and_then(|pk| dialect.returning_clause(pk));
        let sql = insert_statement(dialect, &self.table_ref(), &names, 1, returning.as_deref());
        self.run_insert(&sql, values, returning.is_some()).await
    }

    /// Insert a row given as column/value pairs.
    pub async fn insert_values<I, K, V>(&mut self, pairs: I) -> OrmResult<ExecResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (names, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        if names.is_empty() {
            return Err(OrmError::validation(None, "insert requires at least one column"));
        }
        self.check()?;
        let dialect = self.dialect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let returning = self
            .info
            .as_deref()
            .and_then(generated_key)
            .and_then(|pk| dialect.returning_clause(pk));
        let sql = insert_statement(dialect, &self.table_ref(), &names, 1, returning.as_deref());
        self.run_insert(&sql, values, returning.is_some()).await
    }

    /// Insert all records with one multi-row INSERT. The column set comes
    /// from the first record; an empty slice inserts nothing.
    pub async fn insert_batch<T: Model>(&mut self, records: &[T]) -> OrmResult<u64> {
        let Some(head) = records.first() else {
            return Ok(0);
        };
        let dialect = self.dialect();
        let info = table_info::<T>(dialect)?;
        for record in records {
            info.validate(record)?;
        }
        self.check()?;

        let columns: Vec<&ColumnInfo> = info.insert_values(head).into_iter().map(|(c, _)| c).collect();
        if columns.is_empty() {
            return Err(OrmError::validation(None, "batch insert has no columns to write"));
        }

        let mut args = Vec::with_capacity(columns.len() * records.len());
        for record in records {
            let mut row = info.insert_values(record);
            for column in &columns {
                let value = row
                    .iter_mut()
                    .find(|(c, _)| c.name == column.name)
                    .map(|(_, v)| std::mem::replace(v, Value::Null))
                    .unwrap_or(Value::Null);
                args.push(value);
            }
        }

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let sql = insert_statement(dialect, &self.table_ref(), &names, records.len(), None);
        debug!(table = %self.table, rows = records.len(), "Batch insert");
        Ok(self.session.execute(&sql, &args).await?.rows_affected)
    }

    /// Overwrite every mapped column except primary keys, auto-increment
    /// columns and `created_at`. Restricted by the current filters, or by
    /// the record's primary key when none are set.
    pub async fn update<T: Model>(&mut self, record: &T) -> OrmResult<u64> {
        let dialect = self.dialect();
        let info = table_info::<T>(dialect)?;
        info.validate(record)?;
        self.check()?;

        let (columns, mut args): (Vec<&ColumnInfo>, Vec<Value>) =
            info.update_values(record).into_iter().unzip();
        if columns.is_empty() {
            return Err(OrmError::validation(None, "no updatable columns"));
        }
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let mut sql = update_head(dialect, &self.table_ref(), &names);

        if self.conditions.is_empty() {
            let pk = info.primary_key().ok_or_else(|| {
                OrmError::validation(
                    None,
                    format!(
                        "update of '{}' without filters requires a single primary key",
                        info.name
                    ),
                )
            })?;
            sql.push_str(&format!(" WHERE {} = ?", dialect.quote(&pk.name)));
            args.push(record.field_value(pk.field));
        } else {
            self.render_where(&mut sql, &mut args);
        }

        let sql = dialect.bind_placeholders(&sql);
        Ok(self.session.execute(&sql, &args).await?.rows_affected)
    }

    /// Update the given columns, in caller order, on the filtered rows.
    ///
    /// On a model builder an `updated_at` column is stamped unless listed.
    pub async fn update_columns<I, K, V>(&mut self, pairs: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (mut names, mut args): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        if names.is_empty() {
            return Err(OrmError::validation(None, "update requires at least one column"));
        }
        self.check()?;

        if let Some(stamp) = self
            .info
            .as_deref()
            .and_then(|info| info.columns.iter().find(|c| c.is_updated_at()))
            && !names.iter().any(|n| *n == stamp.name)
        {
            names.push(stamp.name.clone());
            args.push(Value::Timestamp(Utc::now().naive_utc()));
        }

        let dialect = self.dialect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut sql = update_head(dialect, &self.table_ref(), &names);
        self.render_where(&mut sql, &mut args);

        let sql = dialect.bind_placeholders(&sql);
        Ok(self.session.execute(&sql, &args).await?.rows_affected)
    }

    /// Delete the filtered rows.
    pub async fn delete(&mut self) -> OrmResult<u64> {
        self.check()?;
        let mut sql = String::from("DELETE FROM ");
        let mut args = Vec::new();
        sql.push_str(&self.table_ref());
        self.render_where(&mut sql, &mut args);

        let sql = self.dialect().bind_placeholders(&sql);
        Ok(self.session.execute(&sql, &args).await?.rows_affected)
    }

    async fn run_insert(
        &mut self,
        sql: &str,
        values: Vec<Value>,
        returning: bool,
    ) -> OrmResult<ExecResult> {
        if !returning {
            return self.session.execute(sql, &values).await;
        }
        let records = self.session.fetch_all(sql, &values).await?;
        let last_insert_id = records
            .first()
            .and_then(|r| r.values.first().cloned())
            .and_then(|v| v.get::<i64>().ok());
        Ok(ExecResult {
            rows_affected: records.len() as u64,
            last_insert_id,
        })
    }
}

/// Name of the auto-increment primary key, if the table has one.
fn generated_key(info: &TableInfo) -> Option<&str> {
    info.primary_key()
        .filter(|pk| pk.auto_increment)
        .map(|pk| pk.name.as_str())
}

/// INSERT with `rows` groups of `?` markers, already rewritten for the dialect.
fn insert_statement(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    rows: usize,
    returning: Option<&str>,
) -> String {
    let mut sql = format!("INSERT INTO {}", table);
    if !columns.is_empty() {
        let quoted: Vec<String> = columns.iter().map(|c| dialect.quote(c)).collect();
        sql.push_str(&format!(" ({})", quoted.join(", ")));
    }
    // OUTPUT INSERTED.x sits between the column list and VALUES
    let (before, after) = match returning {
        Some(clause) if dialect.returning_before_values() => (clause, ""),
        Some(clause) => ("", clause),
        None => ("", ""),
    };
    sql.push_str(before);
    if columns.is_empty() {
        // every column is engine-assigned
        sql.push_str(match dialect {
            Dialect::MySql => " () VALUES ()",
            _ => " DEFAULT VALUES",
        });
    } else {
        let group = format!("({})", vec!["?"; columns.len()].join(", "));
        sql.push_str(&format!(" VALUES {}", vec![group; rows].join(", ")));
    }
    sql.push_str(after);
    dialect.bind_placeholders(&sql)
}

/// `UPDATE t SET a = ?, b = ?` with `?` markers.
fn update_head(dialect: Dialect, table: &str, columns: &[&str]) -> String {
    let sets: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = ?", dialect.quote(c)))
        .collect();
    format!("UPDATE {} SET {}", table, sets.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(dialect: Dialect, table: &str) -> QueryBuilder<'static> {
        QueryBuilder::new(Session::Detached(dialect), table)
    }

    #[test]
    fn test_where_and_in_render_in_order() {
        let (sql, args) = detached(Dialect::MySql, "users")
            .where_("age > ?", [18])
            .where_in("role", ["admin", "user"])
            .limit(5)
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `users` WHERE age > ? AND role IN (?, ?) LIMIT 5"
        );
        assert_eq!(
            args,
            vec![Value::Int(18), Value::from("admin"), Value::from("user")]
        );
    }

    #[test]
    fn test_postgres_numbers_placeholders_across_clauses() {
        let (sql, args) = detached(Dialect::Postgres, "orders")
            .select(["user_id", "COUNT(*) AS n"])
            .where_between("total", 10, 99)
            .group_by("user_id")
            .having("COUNT(*) > ?", [2])
            .order_by_desc("n")
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT user_id, COUNT(*) AS n FROM \"orders\" WHERE total BETWEEN $1 AND $2 \
             GROUP BY user_id HAVING COUNT(*) > $3 ORDER BY n DESC"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_joins_and_verbatim_table() {
        let (sql, _) = detached(Dialect::Sqlite, "users u")
            .left_join("orders o", "o.user_id = u.id")
            .inner_join("roles r", "r.id = u.role_id")
            .where_null("o.id")
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users u LEFT JOIN orders o ON o.user_id = u.id \
             INNER JOIN roles r ON r.id = u.role_id WHERE o.id IS NULL"
        );
    }

    #[test]
    fn test_empty_in_has_no_placeholders() {
        let (sql, args) = detached(Dialect::MySql, "t")
            .where_in("id", Vec::<i64>::new())
            .where_not_in("id", Vec::<i64>::new())
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM `t` WHERE 1=0 AND 1=1");
        assert!(args.is_empty());
    }

    #[test]
    fn test_marker_mismatch_is_reported() {
        let err = detached(Dialect::MySql, "t")
            .where_("a = ? AND b = ?", [1])
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, OrmError::Validation { .. }));
    }

    #[test]
    fn test_sqlserver_pagination() {
        let (sql, _) = detached(Dialect::SqlServer, "t")
            .order_by("id")
            .limit(10)
            .offset(20)
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM [t] ORDER BY id OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_count_wraps_grouped_queries() {
        let (sql, args) = detached(Dialect::Postgres, "orders")
            .where_("status = ?", ["paid"])
            .group_by("user_id")
            .order_by("user_id")
            .limit(3)
            .render_count()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM (SELECT user_id FROM \"orders\" WHERE status = $1 \
             GROUP BY user_id) AS grouped"
        );
        assert_eq!(args, vec![Value::from("paid")]);
    }

    #[test]
    fn test_insert_statement_shapes() {
        assert_eq!(
            insert_statement(Dialect::Postgres, "\"users\"", &["name", "age"], 2, Some(" RETURNING \"id\"")),
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES ($1, $2), ($3, $4) RETURNING \"id\""
        );
        assert_eq!(
            insert_statement(Dialect::MySql, "`t`", &[], 1, None),
            "INSERT INTO `t` () VALUES ()"
        );
        assert_eq!(
            insert_statement(Dialect::Sqlite, "`t`", &[], 1, None),
            "INSERT INTO `t` DEFAULT VALUES"
        );
    }

    #[test]
    fn test_sqlserver_output_precedes_values() {
        let output = Dialect::SqlServer.returning_clause("id");
        assert_eq!(
            insert_statement(Dialect::SqlServer, "[users]", &["name"], 1, output.as_deref()),
            "INSERT INTO [users] ([name]) OUTPUT INSERTED.[id] VALUES (@P1)"
        );
        assert_eq!(
            insert_statement(Dialect::SqlServer, "[t]", &[], 1, output.as_deref()),
            "INSERT INTO [t] OUTPUT INSERTED.[id] DEFAULT VALUES"
        );
    }

    #[test]
    fn test_raw_or_condition_is_grouped() {
        let (sql, args) = detached(Dialect::MySql, "users")
            .where_("role = ? OR role = ?", ["admin", "owner"])
            .where_("active = ?", [true])
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `users` WHERE (role = ? OR role = ?) AND active = ?"
        );
        assert_eq!(args.len(), 3);

        let (sql, _) = detached(Dialect::Postgres, "orders")
            .group_by("user_id")
            .having("COUNT(*) > ? OR SUM(total) > ?", [5, 100])
            .to_sql()
            .unwrap();
        assert!(sql.ends_with("HAVING (COUNT(*) > $1 OR SUM(total) > $2)"), "{}", sql);
    }

    #[test]
    fn test_mysql_escaped_quote_is_not_a_mismatch() {
        let (sql, args) = detached(Dialect::MySql, "t")
            .where_("a = 'it\\'s' AND b = ?", [1])
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM `t` WHERE a = 'it\\'s' AND b = ?");
        assert_eq!(args, vec![Value::Int(1)]);
    }

    #[test]
    fn test_update_head() {
        assert_eq!(
            update_head(Dialect::MySql, "`users`", &["name", "age"]),
            "UPDATE `users` SET `name` = ?, `age` = ?"
        );
    }

    #[tokio::test]
    async fn test_detached_builder_cannot_execute() {
        let err = detached(Dialect::MySql, "t").count().await.unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_empty_writes_are_rejected_or_noop() {
        let mut builder = detached(Dialect::Sqlite, "t");
        let err = builder
            .update_columns(Vec::<(&str, Value)>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Validation { .. }));

        let err = builder
            .insert_values(Vec::<(&str, Value)>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Validation { .. }));
    }
}
