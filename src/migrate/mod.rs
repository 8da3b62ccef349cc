//! Versioned migrations.
//!
//! A [`Migrator`] holds the registered [`Migration`]s for one database and
//! records applied versions in the `migrations` table. Each migration's
//! forward (or reverse) action and its bookkeeping write share one
//! transaction; a run stops at the first failure, keeping earlier
//! migrations applied.
//!
//! Versions are compared as strings. Use a sortable scheme such as
//! `20240101_120000_create_users`.

use crate::db::pool::Database;
use crate::db::transaction::Transaction;
use crate::ddl::TableBuilder;
use crate::error::{OrmError, OrmResult};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Bookkeeping table name.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// A reversible schema change.
#[async_trait]
pub trait Migration: Send + Sync {
    fn version(&self) -> &str;

    async fn up(&self, tx: &mut Transaction) -> OrmResult<()>;

    async fn down(&self, tx: &mut Transaction) -> OrmResult<()>;
}

/// Migration made of raw SQL statements.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    version: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    pub fn new<U, D>(version: &str, up: U, down: D) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            version: version.to_string(),
            up: up.into_iter().map(Into::into).collect(),
            down: down.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn version(&self) -> &str {
        &self.version
    }

    async fn up(&self, tx: &mut Transaction) -> OrmResult<()> {
        for sql in &self.up {
            tx.execute(sql, &[]).await?;
        }
        Ok(())
    }

    async fn down(&self, tx: &mut Transaction) -> OrmResult<()> {
        for sql in &self.down {
            tx.execute(sql, &[]).await?;
        }
        Ok(())
    }
}

type Step = Box<dyn for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, OrmResult<()>> + Send + Sync>;

/// Migration built from two closures.
pub struct FnMigration {
    version: String,
    up: Step,
    down: Step,
}

impl FnMigration {
    pub fn new<U, D>(version: &str, up: U, down: D) -> Self
    where
        U: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, OrmResult<()>> + Send + Sync + 'static,
        D: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, OrmResult<()>> + Send + Sync + 'static,
    {
        Self {
            version: version.to_string(),
            up: Box::new(up),
            down: Box::new(down),
        }
    }
}

#[async_trait]
impl Migration for FnMigration {
    fn version(&self) -> &str {
        &self.version
    }

    async fn up(&self, tx: &mut Transaction) -> OrmResult<()> {
        (self.up)(tx).await
    }

    async fn down(&self, tx: &mut Transaction) -> OrmResult<()> {
        (self.down)(tx).await
    }
}

/// One row of the bookkeeping table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationRecord {
    pub version: String,
    pub executed_at: NaiveDateTime,
}

crate::model!(MigrationRecord => "migrations" {
    version: "version,primary,size:255",
    executed_at: "executed_at",
});

/// Whether a registered migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    Applied { at: NaiveDateTime },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// Applies and reverses registered migrations against one database.
pub struct Migrator {
    db: Database,
    migrations: Vec<Arc<dyn Migration>>,
}

impl Migrator {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            migrations: Vec::new(),
        }
    }

    /// Register a migration (builder form).
    pub fn add(mut self, migration: impl Migration + 'static) -> Self {
        self.register(migration);
        self
    }

    pub fn register(&mut self, migration: impl Migration + 'static) {
        self.migrations.push(Arc::new(migration));
    }

    /// Register shared migrations, e.g. a list assembled at startup.
    pub fn extend(&mut self, migrations: impl IntoIterator<Item = Arc<dyn Migration>>) {
        self.migrations.extend(migrations);
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Apply every pending migration in ascending version order.
    ///
    /// Returns the versions applied by this call.
    pub async fn run(&self) -> OrmResult<Vec<String>> {
        self.check_duplicates()?;
        self.ensure_table().await?;

        let applied: HashSet<String> = self
            .applied()
            .await?
            .into_iter()
            .map(|r| r.version)
            .collect();

        let mut pending: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .map(|m| &**m)
            .filter(|m| !applied.contains(m.version()))
            .collect();
        pending.sort_by(|a, b| a.version().cmp(b.version()));

        let mut done = Vec::with_capacity(pending.len());
        for migration in pending {
            let version = migration.version().to_string();
            let mut tx = self.db.begin().await?;
            if let Err(e) = migration.up(&mut tx).await {
                rollback_quietly(tx, &version).await;
                return Err(OrmError::migration_failed(version, e));
            }
            let record = MigrationRecord {
                version: version.clone(),
                executed_at: Utc::now().naive_utc(),
            };
            if let Err(e) = record_applied(&mut tx, &record).await {
                rollback_quietly(tx, &version).await;
                return Err(OrmError::migration_failed(version, e));
            }
            tx.commit().await?;
            info!(version = %version, "Applied migration");
            done.push(version);
        }
        Ok(done)
    }

    /// Reverse the `steps` most recently applied migrations, newest first.
    ///
    /// Returns the versions rolled back.
    pub async fn rollback(&self, steps: usize) -> OrmResult<Vec<String>> {
        self.check_duplicates()?;
        self.ensure_table().await?;

        let mut applied = self.applied().await?;
        applied.sort_by(|a, b| b.version.cmp(&a.version));
        applied.truncate(steps);

        let registered: HashMap<&str, &dyn Migration> = self
            .migrations
            .iter()
            .map(|m| (m.version(), &**m))
            .collect();

        // refuse before touching anything
        let mut targets = Vec::with_capacity(applied.len());
        for record in &applied {
            let migration = registered.get(record.version.as_str()).ok_or_else(|| {
                OrmError::migration(record.version.clone(), "no registered migration to roll back")
            })?;
            targets.push(*migration);
        }

        let mut done = Vec::with_capacity(targets.len());
        for migration in targets {
            let version = migration.version().to_string();
            let mut tx = self.db.begin().await?;
            if let Err(e) = migration.down(&mut tx).await {
                rollback_quietly(tx, &version).await;
                return Err(OrmError::migration_failed(version, e));
            }
            if let Err(e) = remove_applied(&mut tx, &version).await {
                rollback_quietly(tx, &version).await;
                return Err(OrmError::migration_failed(version, e));
            }
            tx.commit().await?;
            info!(version = %version, "Rolled back migration");
            done.push(version);
        }
        Ok(done)
    }

    /// Every registered migration, ascending, as applied or pending.
    pub async fn status(&self) -> OrmResult<Vec<MigrationStatus>> {
        self.ensure_table().await?;
        let applied: HashMap<String, NaiveDateTime> = self
            .applied()
            .await?
            .into_iter()
            .map(|r| (r.version, r.executed_at))
            .collect();

        let mut status: Vec<MigrationStatus> = self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version().to_string(),
                state: match applied.get(m.version()) {
                    Some(at) => MigrationState::Applied { at: *at },
                    None => MigrationState::Pending,
                },
            })
            .collect();
        status.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(status)
    }

    /// Bookkeeping rows in ascending version order. Empty when the table
    /// does not exist yet.
    pub async fn applied(&self) -> OrmResult<Vec<MigrationRecord>> {
        if !self.db.schema().has_table(MIGRATIONS_TABLE).await? {
            return Ok(Vec::new());
        }
        self.db
            .model::<MigrationRecord>()?
            .order_by("version")
            .get::<MigrationRecord>()
            .await
    }

    async fn ensure_table(&self) -> OrmResult<()> {
        let mut schema = self.db.schema();
        if schema.has_table(MIGRATIONS_TABLE).await? {
            return Ok(());
        }
        let mut table = TableBuilder::new(MIGRATIONS_TABLE, schema.dialect());
        table.string("version", 255).not_null();
        table.timestamp("executed_at");
        table.primary(&["version"]);
        schema.run(&table.create_statements()?).await
    }

    fn check_duplicates(&self) -> OrmResult<()> {
        let mut seen = HashSet::new();
        for migration in &self.migrations {
            if !seen.insert(migration.version()) {
                return Err(OrmError::migration(
                    migration.version(),
                    "version registered more than once",
                ));
            }
        }
        Ok(())
    }
}

async fn record_applied(tx: &mut Transaction, record: &MigrationRecord) -> OrmResult<()> {
    tx.model::<MigrationRecord>()?.insert(record).await?;
    Ok(())
}

async fn remove_applied(tx: &mut Transaction, version: &str) -> OrmResult<()> {
    tx.model::<MigrationRecord>()?
        .where_("version = ?", [version])
        .delete()
        .await?;
    Ok(())
}

async fn rollback_quietly(tx: Transaction, version: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(version = %version, error = %e, "Rollback after failed migration also failed");
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let versions: Vec<&str> = self.migrations.iter().map(|m| m.version()).collect();
        f.debug_struct("Migrator")
            .field("db", &self.db)
            .field("migrations", &versions)
            .finish()
    }
}
