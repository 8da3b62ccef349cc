//! Statement execution.
//!
//! Every statement the crate issues (query builder, schema builder,
//! migrations, raw SQL) runs through a [`Session`]: either the shared pool
//! or an open transaction.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific execute and fetch
//! - `postgres`: PostgreSQL-specific execute and fetch
//! - `sqlite`: SQLite-specific execute and fetch
//!
//! SQL Server runs on tiberius rather than sqlx; its execute and fetch live
//! in [`crate::db::mssql`].
//!
//! Pool connections and transactions both deref to the backend's connection
//! type, so each submodule has one code path for both.

use crate::db::mssql;
use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::{Database, DbPool};
use crate::db::transaction::DbTransaction;
use crate::db::types::RowToValues;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::models::query::{ExecResult, Record};
use crate::models::value::Value;
use tracing::debug;

/// Where a statement runs.
pub enum Session<'a> {
    /// A pooled connection, acquired per statement
    Pool(Database),
    /// The connection held by an open transaction
    Tx(&'a mut DbTransaction),
    /// SQL generation only; executing is an error
    Detached(Dialect),
}

impl Session<'_> {
    pub fn dialect(&self) -> Dialect {
        match self {
            Session::Pool(db) => db.dialect(),
            Session::Tx(tx) => tx.dialect(),
            Session::Detached(dialect) => *dialect,
        }
    }

    /// Run a statement that returns no rows.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        debug!(
            sql = %sql,
            params = params.len(),
            dialect = %self.dialect(),
            "Executing statement"
        );
        match self {
            Session::Pool(db) => execute_pool(&db.pool().await?, sql, params).await,
            Session::Tx(tx) => execute_tx(tx, sql, params).await,
            Session::Detached(dialect) => Err(OrmError::unsupported("statement execution", *dialect)),
        }
    }

    /// Run a statement and decode every row it returns.
    pub async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        debug!(
            sql = %sql,
            params = params.len(),
            dialect = %self.dialect(),
            "Executing query"
        );
        let records = match self {
            Session::Pool(db) => fetch_pool(&db.pool().await?, sql, params).await?,
            Session::Tx(tx) => fetch_tx(tx, sql, params).await?,
            Session::Detached(dialect) => {
                return Err(OrmError::unsupported("query execution", *dialect));
            }
        };
        debug!(row_count = records.len(), "Query returned");
        Ok(records)
    }
}

pub(crate) async fn execute_pool(
    pool: &DbPool,
    sql: &str,
    params: &[Value],
) -> OrmResult<ExecResult> {
    match pool {
        DbPool::MySql(p) => {
            let mut conn = p.acquire().await?;
            mysql::execute(&mut conn, sql, params).await
        }
        DbPool::Postgres(p) => {
            let mut conn = p.acquire().await?;
            postgres::execute(&mut conn, sql, params).await
        }
        DbPool::SQLite(p) => {
            let mut conn = p.acquire().await?;
            sqlite::execute(&mut conn, sql, params).await
        }
        DbPool::SqlServer(p) => {
            let mut conn = p.acquire().await?;
            mssql::execute(&mut conn, sql, params).await
        }
    }
}

pub(crate) async fn fetch_pool(
    pool: &DbPool,
    sql: &str,
    params: &[Value],
) -> OrmResult<Vec<Record>> {
    match pool {
        DbPool::MySql(p) => {
            let mut conn = p.acquire().await?;
            mysql::fetch_all(&mut conn, sql, params).await
        }
        DbPool::Postgres(p) => {
            let mut conn = p.acquire().await?;
            postgres::fetch_all(&mut conn, sql, params).await
        }
        DbPool::SQLite(p) => {
            let mut conn = p.acquire().await?;
            sqlite::fetch_all(&mut conn, sql, params).await
        }
        DbPool::SqlServer(p) => {
            let mut conn = p.acquire().await?;
            mssql::fetch_all(&mut conn, sql, params).await
        }
    }
}

pub(crate) async fn execute_tx(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[Value],
) -> OrmResult<ExecResult> {
    match tx {
        DbTransaction::MySql(tx) => mysql::execute(tx, sql, params).await,
        DbTransaction::Postgres(tx) => postgres::execute(tx, sql, params).await,
        DbTransaction::SQLite(tx) => sqlite::execute(tx, sql, params).await,
        DbTransaction::SqlServer(tx) => mssql::execute(tx.connection(), sql, params).await,
    }
}

pub(crate) async fn fetch_tx(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[Value],
) -> OrmResult<Vec<Record>> {
    match tx {
        DbTransaction::MySql(tx) => mysql::fetch_all(tx, sql, params).await,
        DbTransaction::Postgres(tx) => postgres::fetch_all(tx, sql, params).await,
        DbTransaction::SQLite(tx) => sqlite::fetch_all(tx, sql, params).await,
        DbTransaction::SqlServer(tx) => mssql::fetch_all(tx.connection(), sql, params).await,
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use sqlx::MySqlConnection;

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<ExecResult> {
        // When params is empty, execute raw SQL directly to avoid prepared statement issues
        // (some SQL like CREATE PROCEDURE doesn't support prepared statements)
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        let id = result.last_insert_id();
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: (id != 0).then(|| i64::try_from(id).ok()).flatten(),
        })
    }

    pub async fn fetch_all(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.fetch_all(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        Ok(rows.iter().map(RowToValues::to_record).collect())
    }
}

mod postgres {
    use super::*;
    use sqlx::PgConnection;

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<ExecResult> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        // generated keys come back through RETURNING
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    pub async fn fetch_all(
        conn: &mut PgConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.fetch_all(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        Ok(rows.iter().map(RowToValues::to_record).collect())
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<ExecResult> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        let rowid = result.last_insert_rowid();
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: (rowid > 0).then_some(rowid),
        })
    }

    pub async fn fetch_all(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.fetch_all(&mut *conn).await
        }
        .map_err(|e| OrmError::from_sqlx(e, sql))?;

        Ok(rows.iter().map(RowToValues::to_record).collect())
    }
}
