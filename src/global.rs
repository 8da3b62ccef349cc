//! Process-wide database handle.
//!
//! [`init`] connects once; every other function here works on that
//! handle. A second `init` after success is a no-op (its configuration is
//! ignored). A failed first `init` is remembered and not retried: later
//! calls report the original failure as a `Connection` error.
//!
//! Migrations passed to [`migrate`] stay registered so that
//! [`rollback_migration`] and [`migration_status`] can see them.

use crate::config::Config;
use crate::db::pool::{AutoMigrate, Database};
use crate::db::transaction::{Transaction, TransactionOptions};
use crate::error::{OrmError, OrmResult};
use crate::mapping::Model;
use crate::migrate::{Migration, MigrationStatus, Migrator};
use crate::query::QueryBuilder;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::info;

static DATABASE: OnceCell<Result<Database, String>> = OnceCell::const_new();

static MIGRATIONS: Mutex<BTreeMap<String, Arc<dyn Migration>>> = Mutex::new(BTreeMap::new());

/// Connect the global handle. Only the first call connects.
pub async fn init(config: Config) -> OrmResult<()> {
    let state = DATABASE
        .get_or_init(|| async move {
            info!(target = %config.masked_connection_string(), "Initializing global database");
            Database::connect(config).await.map_err(|e| e.to_string())
        })
        .await;
    match state {
        Ok(_) => Ok(()),
        Err(message) => Err(init_failed(message)),
    }
}

/// The global handle.
pub fn database() -> OrmResult<Database> {
    match DATABASE.get() {
        Some(Ok(db)) => Ok(db.clone()),
        Some(Err(message)) => Err(init_failed(message)),
        None => Err(OrmError::connection(
            "Global database is not initialized",
            "Call relmap::global::init first",
        )),
    }
}

pub fn model<T: Model>() -> OrmResult<QueryBuilder<'static>> {
    database()?.model::<T>()
}

pub fn table(name: &str) -> OrmResult<QueryBuilder<'static>> {
    Ok(database()?.table(name))
}

/// Auto-migration builder on the global handle; register types with
/// `.model::<T>()` and finish with `.run()`.
pub fn auto_migrate() -> OrmResult<AutoMigrate> {
    Ok(database()?.auto_migrate())
}

pub async fn create_table<T: Model>() -> OrmResult<()> {
    database()?.create_table::<T>().await
}

pub async fn drop_table<T: Model>() -> OrmResult<()> {
    database()?.drop_table::<T>().await
}

pub async fn has_table<T: Model>() -> OrmResult<bool> {
    database()?.has_table::<T>().await
}

pub async fn with_transaction<T, F>(f: F) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>>,
{
    database()?.with_transaction(f).await
}

pub async fn with_transaction_options<T, F>(options: TransactionOptions, f: F) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>>,
{
    database()?.with_transaction_options(options, f).await
}

/// Register `migrations` (replacing any with the same version) and apply
/// every pending registered migration.
pub async fn migrate(migrations: Vec<Arc<dyn Migration>>) -> OrmResult<Vec<String>> {
    {
        let mut registry = MIGRATIONS.lock().unwrap_or_else(PoisonError::into_inner);
        for migration in migrations {
            registry.insert(migration.version().to_string(), migration);
        }
    }
    migrator()?.run().await
}

/// Reverse the `steps` most recent migrations registered through [`migrate`].
pub async fn rollback_migration(steps: usize) -> OrmResult<Vec<String>> {
    migrator()?.rollback(steps).await
}

pub async fn migration_status() -> OrmResult<Vec<MigrationStatus>> {
    migrator()?.status().await
}

fn migrator() -> OrmResult<Migrator> {
    let mut migrator = database()?.migrator();
    let registry = MIGRATIONS.lock().unwrap_or_else(PoisonError::into_inner);
    migrator.extend(registry.values().cloned());
    Ok(migrator)
}

fn init_failed(message: &str) -> OrmError {
    OrmError::connection(
        format!("Global database initialization failed: {}", message),
        "Fix the configuration and restart; initialization is not retried",
    )
}
