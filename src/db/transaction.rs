//! Transactions.
//!
//! A [`Transaction`] owns one pooled connection from `begin` until `commit`
//! or `rollback`. Dropping it without either rolls back: sqlx issues the
//! ROLLBACK when the connection returns to the pool, and a SQL Server
//! connection dropped mid-transaction is closed instead of reused.
//!
//! [`with_transaction`] is the scoped form: the closure's `Err` or panic rolls
//! back, anything else commits.
//!
//! [`TransactionOptions`] carries an isolation level and read-only mode. How
//! they are applied differs per engine:
//!
//! - MySQL fixes transaction characteristics before the transaction starts,
//!   so the empty transaction opened by the driver is committed and a new one
//!   started after `SET TRANSACTION`.
//! - PostgreSQL takes `SET TRANSACTION` as the first statement.
//! - SQLite is always serializable; read-only sets `PRAGMA query_only` for
//!   the transaction's lifetime.
//! - SQL Server sets the session isolation level before `BEGIN TRANSACTION`
//!   and has no read-only transactions.

use crate::db::executor::{Session, execute_tx, fetch_tx};
use crate::db::pool::DbPool;
use crate::ddl::Schema;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::mapping::Model;
use crate::models::query::{ExecResult, Record};
use crate::models::value::Value;
use crate::query::QueryBuilder;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use crate::db::mssql::MssqlTransaction;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, Postgres, Sqlite};
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// SQL isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Options applied when a transaction begins. The default is the engine's
/// default isolation level, read-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// `ISOLATION LEVEL ..., READ ONLY` as accepted by `SET TRANSACTION`.
    fn characteristics(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(level) = self.isolation {
            parts.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        if self.read_only {
            parts.push("READ ONLY".to_string());
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Statements run right after the driver opens the transaction.
fn setup_statements(dialect: Dialect, options: &TransactionOptions) -> OrmResult<Vec<String>> {
    Ok(match dialect {
        Dialect::MySql => match options.characteristics() {
            Some(chars) => vec![
                "COMMIT".to_string(),
                format!("SET TRANSACTION {}", chars),
                "START TRANSACTION".to_string(),
            ],
            None => Vec::new(),
        },
        Dialect::Postgres => options
            .characteristics()
            .map(|chars| vec![format!("SET TRANSACTION {}", chars)])
            .unwrap_or_default(),
        Dialect::Sqlite => {
            if let Some(level) = options.isolation {
                debug!(isolation = %level, "SQLite transactions are always serializable");
            }
            if options.read_only {
                vec!["PRAGMA query_only = ON".to_string()]
            } else {
                Vec::new()
            }
        }
        Dialect::SqlServer => {
            if options.read_only {
                return Err(OrmError::unsupported("read-only transactions", dialect));
            }
            Vec::new()
        }
    })
}

/// Statements run before commit or rollback to undo session state set up by
/// [`setup_statements`].
fn cleanup_statements(dialect: Dialect, options: &TransactionOptions) -> Vec<&'static str> {
    match dialect {
        Dialect::Sqlite if options.read_only => vec!["PRAGMA query_only = OFF"],
        _ => Vec::new(),
    }
}

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(sqlx::Transaction<'static, MySql>),
    /// PostgreSQL transaction
    Postgres(sqlx::Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(sqlx::Transaction<'static, Sqlite>),
    /// SQL Server transaction
    SqlServer(MssqlTransaction),
}

impl DbTransaction {
    /// Open a transaction on a pooled connection and apply `options`.
    pub async fn begin(pool: &DbPool, options: &TransactionOptions) -> OrmResult<Self> {
        let setup = setup_statements(pool.dialect(), options)?;
        let mut tx = match pool {
            DbPool::MySql(p) => DbTransaction::MySql(p.begin().await?),
            DbPool::Postgres(p) => DbTransaction::Postgres(p.begin().await?),
            DbPool::SQLite(p) => DbTransaction::SQLite(p.begin().await?),
            DbPool::SqlServer(p) => {
                DbTransaction::SqlServer(MssqlTransaction::begin(p, options.isolation).await?)
            }
        };
        for sql in &setup {
            execute_tx(&mut tx, sql, &[]).await?;
        }
        Ok(tx)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DbTransaction::MySql(_) => Dialect::MySql,
            DbTransaction::Postgres(_) => Dialect::Postgres,
            DbTransaction::SQLite(_) => Dialect::Sqlite,
            DbTransaction::SqlServer(_) => Dialect::SqlServer,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> OrmResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(OrmError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(OrmError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(OrmError::from),
            DbTransaction::SqlServer(tx) => tx.commit().await,
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> OrmResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(OrmError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(OrmError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(OrmError::from),
            DbTransaction::SqlServer(tx) => tx.rollback().await,
        }
    }
}

/// An open transaction.
///
/// Everything created from it (query builders, schema builders, raw
/// statements) runs on the transaction's connection.
pub struct Transaction {
    inner: DbTransaction,
    id: String,
    options: TransactionOptions,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("dialect", &self.dialect())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) async fn begin(pool: &DbPool, options: TransactionOptions) -> OrmResult<Self> {
        let inner = DbTransaction::begin(pool, &options).await?;
        let id = generate_transaction_id();
        info!(
            transaction_id = %id,
            dialect = %inner.dialect(),
            isolation = ?options.isolation,
            read_only = options.read_only,
            "Transaction started"
        );
        Ok(Self { inner, id, options })
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// Identifier used in logs and transaction errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    /// Execute native SQL on the transaction's connection.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        debug!(transaction_id = %self.id, sql = %sql, "Executing in transaction");
        execute_tx(&mut self.inner, sql, params).await
    }

    /// Query native SQL on the transaction's connection.
    pub async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        debug!(transaction_id = %self.id, sql = %sql, "Querying in transaction");
        fetch_tx(&mut self.inner, sql, params).await
    }

    /// Query builder over a named table.
    pub fn table(&mut self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(Session::Tx(&mut self.inner), table)
    }

    /// Query builder over the table mapped by `T`.
    pub fn model<T: Model>(&mut self) -> OrmResult<QueryBuilder<'_>> {
        QueryBuilder::for_model::<T>(Session::Tx(&mut self.inner))
    }

    /// Schema builder running DDL inside the transaction.
    ///
    /// MySQL commits implicitly on most DDL statements.
    pub fn schema(&mut self) -> Schema<'_> {
        Schema::new(Session::Tx(&mut self.inner))
    }

    pub async fn savepoint(&mut self, name: &str) -> OrmResult<()> {
        let sql = self.dialect().savepoint_sql(name)?;
        self.execute(&sql, &[]).await.map(|_| ())
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> OrmResult<()> {
        let sql = self.dialect().rollback_to_savepoint_sql(name)?;
        self.execute(&sql, &[]).await.map(|_| ())
    }

    pub async fn release_savepoint(&mut self, name: &str) -> OrmResult<()> {
        let sql = self.dialect().release_savepoint_sql(name)?;
        self.execute(&sql, &[]).await.map(|_| ())
    }

    async fn cleanup(&mut self) -> OrmResult<()> {
        for sql in cleanup_statements(self.dialect(), &self.options) {
            execute_tx(&mut self.inner, sql, &[]).await?;
        }
        Ok(())
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> OrmResult<()> {
        if let Err(e) = self.cleanup().await {
            // dropping the inner transaction rolls back
            return Err(OrmError::transaction(
                format!("commit failed: {}", e),
                &self.id,
            ));
        }
        let id = self.id;
        self.inner
            .commit()
            .await
            .map_err(|e| OrmError::transaction(format!("commit failed: {}", e), &id))?;
        info!(transaction_id = %id, "Transaction committed");
        Ok(())
    }

    /// Rollback the transaction.
    pub async fn rollback(mut self) -> OrmResult<()> {
        if let Err(e) = self.cleanup().await {
            warn!(transaction_id = %self.id, error = %e, "Session reset before rollback failed");
        }
        let id = self.id;
        self.inner
            .rollback()
            .await
            .map_err(|e| OrmError::transaction(format!("rollback failed: {}", e), &id))?;
        info!(transaction_id = %id, "Transaction rolled back");
        Ok(())
    }
}

/// Run `f` inside a transaction on `pool`.
///
/// Commits when `f` returns `Ok`. When `f` returns `Err` the transaction is
/// rolled back and that error is returned; a failed rollback is logged, not
/// reported. When `f` panics the transaction is rolled back and the panic
/// resumes.
///
/// The closure's future borrows only the transaction, so values it needs
/// must be moved in:
///
/// ```ignore
/// let name = name.to_string();
/// db.with_transaction(move |tx| Box::pin(async move {
///     tx.table("users").insert_values(&[("name", name.into())]).await
/// })).await?;
/// ```
pub async fn with_transaction<T, F>(pool: &DbPool, f: F) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>>,
{
    with_transaction_options(pool, TransactionOptions::default(), f).await
}

/// [`with_transaction`] with an isolation level and/or read-only mode.
pub async fn with_transaction_options<T, F>(
    pool: &DbPool,
    options: TransactionOptions,
    f: F,
) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>>,
{
    let mut tx = Transaction::begin(pool, options).await?;

    let outcome = AssertUnwindSafe(f(&mut tx)).catch_unwind().await;

    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(Err(err)) => {
            let id = tx.id.clone();
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    transaction_id = %id,
                    error = %rollback_err,
                    "Rollback after failure did not complete"
                );
            }
            Err(err)
        }
        Err(panic) => {
            let id = tx.id.clone();
            warn!(transaction_id = %id, "Transaction body panicked, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    transaction_id = %id,
                    error = %rollback_err,
                    "Rollback after panic did not complete"
                );
            }
            std::panic::resume_unwind(panic)
        }
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
