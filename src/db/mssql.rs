//! SQL Server connections.
//!
//! sqlx has no SQL Server backend, so this engine runs on tiberius behind a
//! bb8 pool. The pool, the per-statement execute/fetch pair and the
//! transaction wrapper mirror what the sqlx engines provide, so the executor
//! and [`DbTransaction`](crate::db::DbTransaction) dispatch to them the same
//! way.
//!
//! Statements with arguments go through `sp_executesql`. Transaction control
//! (`BEGIN`/`COMMIT`/`ROLLBACK TRANSACTION`) is sent as a plain batch instead:
//! changing `@@TRANCOUNT` inside `sp_executesql` fails with error 266.

use crate::config::Config;
use crate::db::transaction::IsolationLevel;
use crate::db::types::tds_row_to_record;
use crate::error::{OrmError, OrmResult};
use crate::models::query::{ExecResult, Record};
use crate::models::value::Value;
use async_trait::async_trait;
use bb8::{Pool, PooledConnection, RunError};
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// One TDS connection.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    /// Set between BEGIN and a completed COMMIT/ROLLBACK. A connection
    /// returned to the pool in this state is discarded, which makes the
    /// server roll the transaction back.
    in_transaction: bool,
}

/// Connection manager for the bb8 pool.
#[derive(Clone)]
pub struct MssqlConnectionManager {
    config: tiberius::Config,
}

impl MssqlConnectionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            config: build_config(config),
        }
    }
}

/// Translate a [`Config`] into tiberius settings.
///
/// `ssl_mode` picks the encryption level: `disable` turns TLS off entirely,
/// `prefer`/`allow` encrypt the login only, anything else requires TLS.
/// `TrustServerCertificate=true` and `ApplicationName=...` are read from the
/// extra connection parameters.
fn build_config(config: &Config) -> tiberius::Config {
    let mut tds = tiberius::Config::new();
    tds.host(&config.host);
    tds.port(config.port_or_default().unwrap_or(1433));
    if !config.database.is_empty() {
        tds.database(&config.database);
    }
    tds.authentication(AuthMethod::sql_server(&config.username, &config.password));

    let ssl_mode = config.ssl_mode.as_deref().map(str::to_ascii_lowercase);
    tds.encryption(match ssl_mode.as_deref() {
        Some("disable") => EncryptionLevel::NotSupported,
        Some("prefer" | "allow") => EncryptionLevel::Off,
        _ => EncryptionLevel::Required,
    });

    let param = |key: &str| {
        config
            .params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    };
    if param("TrustServerCertificate").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        tds.trust_cert();
    }
    if let Some(name) = param("ApplicationName") {
        tds.application_name(name);
    }
    tds
}

#[async_trait]
impl bb8::ManageConnection for MssqlConnectionManager {
    type Connection = MssqlConnection;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = self.config.clone();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(MssqlConnection {
            client,
            in_transaction: false,
        })
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.client.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.in_transaction
    }
}

/// Pool of SQL Server connections.
#[derive(Clone)]
pub struct MssqlPool {
    inner: Pool<MssqlConnectionManager>,
}

impl std::fmt::Debug for MssqlPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("MssqlPool")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl MssqlPool {
    /// Build the pool from the shared pool options and check out one
    /// connection to verify the server answers.
    pub async fn connect(config: &Config) -> Result<Self, tiberius::error::Error> {
        let opts = &config.pool;
        let max_size = opts.max_connections_or_default(false);
        let inner = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(opts.min_connections_or_default().min(max_size)))
            .connection_timeout(opts.acquire_timeout())
            .idle_timeout(Some(opts.idle_timeout()))
            .max_lifetime(Some(opts.max_lifetime()))
            .test_on_check_out(opts.test_before_acquire_or_default())
            .build(MssqlConnectionManager::new(config))
            .await?;

        {
            let mut conn = inner.get().await.map_err(|e| match e {
                RunError::User(e) => e,
                RunError::TimedOut => tiberius::error::Error::Io {
                    kind: std::io::ErrorKind::TimedOut,
                    message: "timed out waiting for a pooled connection".into(),
                },
            })?;
            conn.client.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            host = %config.host,
            database = %config.database,
            max_size,
            "SQL Server pool ready"
        );
        Ok(Self { inner })
    }

    /// Check out a connection for one statement.
    pub async fn acquire(&self) -> OrmResult<PooledConnection<'_, MssqlConnectionManager>> {
        Ok(self.inner.get().await?)
    }

    /// bb8 has no explicit shutdown: connections close once the last pool
    /// handle is dropped.
    pub async fn close(&self) {
        let state = self.inner.state();
        debug!(
            connections = state.connections,
            "SQL Server pool released"
        );
    }
}

/// A `Value` bound as a tiberius parameter.
struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self.0 {
            // NVARCHAR NULL converts implicitly to every column type but binary
            Value::Null => ColumnData::String(None),
            Value::Bool(v) => ColumnData::Bit(Some(*v)),
            Value::Int(v) => ColumnData::I64(Some(*v)),
            Value::Float(v) => ColumnData::F64(Some(*v)),
            Value::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            Value::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            Value::Timestamp(v) => v.to_sql(),
            Value::Json(v) => ColumnData::String(Some(Cow::Owned(v.to_string()))),
        }
    }
}

/// Run a statement that returns no rows.
///
/// Always uses `sp_executesql`: only it reports affected row counts.
pub async fn execute(
    conn: &mut MssqlConnection,
    sql: &str,
    params: &[Value],
) -> OrmResult<ExecResult> {
    let params: Vec<Param<'_>> = params.iter().map(Param).collect();
    let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
    let result = conn
        .client
        .execute(sql, &refs)
        .await
        .map_err(|e| OrmError::from_tiberius(e, sql))?;

    // generated keys come back through OUTPUT INSERTED
    Ok(ExecResult {
        rows_affected: result.total(),
        last_insert_id: None,
    })
}

/// Run a statement and decode the rows of its first result set.
pub async fn fetch_all(
    conn: &mut MssqlConnection,
    sql: &str,
    params: &[Value],
) -> OrmResult<Vec<Record>> {
    // without arguments, send the text as a plain batch
    let stream = if params.is_empty() {
        conn.client.simple_query(sql).await
    } else {
        let params: Vec<Param<'_>> = params.iter().map(Param).collect();
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        conn.client.query(sql, &refs).await
    }
    .map_err(|e| OrmError::from_tiberius(e, sql))?;

    let rows = stream
        .into_first_result()
        .await
        .map_err(|e| OrmError::from_tiberius(e, sql))?;
    Ok(rows.into_iter().map(tds_row_to_record).collect())
}

/// Send `sql` as a plain batch and drain every result.
async fn batch(conn: &mut MssqlConnection, sql: &str) -> OrmResult<()> {
    conn.client
        .simple_query(sql)
        .await
        .map_err(|e| OrmError::from_tiberius(e, sql))?
        .into_results()
        .await
        .map_err(|e| OrmError::from_tiberius(e, sql))?;
    Ok(())
}

/// An open SQL Server transaction holding its pooled connection.
pub struct MssqlTransaction {
    conn: PooledConnection<'static, MssqlConnectionManager>,
    /// Isolation is session state; it is put back to the server default
    /// before the connection returns to the pool.
    reset_isolation: bool,
}

impl MssqlTransaction {
    pub async fn begin(pool: &MssqlPool, isolation: Option<IsolationLevel>) -> OrmResult<Self> {
        let mut conn = pool.inner.get_owned().await?;
        // flag first: a failure below discards the connection
        conn.in_transaction = true;
        if let Some(level) = isolation {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            batch(&mut conn, &sql).await?;
        }
        batch(&mut conn, "BEGIN TRANSACTION").await?;
        Ok(Self {
            conn,
            reset_isolation: isolation.is_some(),
        })
    }

    pub fn connection(&mut self) -> &mut MssqlConnection {
        &mut self.conn
    }

    pub async fn commit(mut self) -> OrmResult<()> {
        self.finish("COMMIT TRANSACTION").await
    }

    pub async fn rollback(mut self) -> OrmResult<()> {
        self.finish("ROLLBACK TRANSACTION").await
    }

    async fn finish(&mut self, sql: &str) -> OrmResult<()> {
        batch(&mut self.conn, sql).await?;
        if self.reset_isolation {
            batch(&mut self.conn, "SET TRANSACTION ISOLATION LEVEL READ COMMITTED").await?;
        }
        self.conn.in_transaction = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample(ssl_mode: Option<&str>, params: &[(&str, &str)]) -> Config {
        Config {
            dialect: crate::Dialect::SqlServer,
            host: "db.internal".into(),
            username: "sa".into(),
            password: "pw".into(),
            database: "app".into(),
            ssl_mode: ssl_mode.map(String::from),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..Config::default()
        }
    }

    #[test]
    fn test_build_config_uses_default_port() {
        let tds = build_config(&sample(None, &[]));
        assert_eq!(tds.get_addr(), "db.internal:1433");
    }

    #[test]
    fn test_build_config_explicit_port() {
        let config = Config {
            port: Some(14330),
            ..sample(Some("disable"), &[("trustservercertificate", "true")])
        };
        assert_eq!(build_config(&config).get_addr(), "db.internal:14330");
    }

    #[test]
    fn test_params_bind_with_matching_tds_types() {
        let text = Value::Text("x".into());
        assert!(matches!(
            Param(&text).to_sql(),
            ColumnData::String(Some(Cow::Borrowed("x")))
        ));
        assert!(matches!(Param(&Value::Int(7)).to_sql(), ColumnData::I64(Some(7))));
        assert!(matches!(Param(&Value::Null).to_sql(), ColumnData::String(None)));
        assert!(matches!(
            Param(&Value::Bool(true)).to_sql(),
            ColumnData::Bit(Some(true))
        ));
    }
}
