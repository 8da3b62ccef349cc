//! Schema changes.
//!
//! [`Schema`] runs DDL described with a [`TableBuilder`] on a pooled
//! connection or inside a transaction. Multi-statement changes run in
//! order; a failure stops the sequence and leaves earlier statements
//! applied (most engines auto-commit DDL even inside a transaction).

mod table;

pub use table::TableBuilder;

use crate::db::executor::Session;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::models::value::Value;
use tracing::info;

/// DDL runner over one [`Session`].
pub struct Schema<'a> {
    session: Session<'a>,
}

impl<'a> Schema<'a> {
    pub fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    pub fn dialect(&self) -> Dialect {
        self.session.dialect()
    }

    /// Create a table described by `build`, then its indexes.
    pub async fn create_table<F>(&mut self, name: &str, build: F) -> OrmResult<()>
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(name, self.dialect());
        build(&mut table);
        let statements = table.create_statements()?;
        self.run(&statements).await?;
        info!(table = %name, "Created table");
        Ok(())
    }

    /// Apply additions and drops described by `build`, one statement each.
    pub async fn alter_table<F>(&mut self, name: &str, build: F) -> OrmResult<()>
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(name, self.dialect());
        build(&mut table);
        let statements = table.alter_statements()?;
        self.run(&statements).await?;
        info!(table = %name, statements = statements.len(), "Altered table");
        Ok(())
    }

    /// Drop a table if it exists.
    pub async fn drop_table(&mut self, name: &str) -> OrmResult<()> {
        let sql = self.dialect().drop_table_sql(name);
        self.session.execute(&sql, &[]).await?;
        info!(table = %name, "Dropped table");
        Ok(())
    }

    pub async fn has_table(&mut self, name: &str) -> OrmResult<bool> {
        let sql = self.dialect().has_table_sql();
        self.count_matches(sql, vec![Value::from(name)]).await
    }

    pub async fn has_column(&mut self, table: &str, column: &str) -> OrmResult<bool> {
        let sql = self.dialect().has_column_sql();
        self.count_matches(sql, vec![Value::from(table), Value::from(column)])
            .await
    }

    /// Run statements in order, stopping at the first failure.
    pub async fn run(&mut self, statements: &[String]) -> OrmResult<()> {
        for sql in statements {
            self.session.execute(sql, &[]).await?;
        }
        Ok(())
    }

    async fn count_matches(&mut self, sql: &str, args: Vec<Value>) -> OrmResult<bool> {
        let records = self.session.fetch_all(sql, &args).await?;
        let count = records
            .into_iter()
            .next()
            .and_then(|r| r.values.into_iter().next())
            .unwrap_or(Value::Int(0))
            .get::<i64>()?;
        Ok(count > 0)
    }
}
