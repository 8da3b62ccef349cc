//! relmap: a relational data-access layer.
//!
//! This library maps typed records onto tables across MySQL, PostgreSQL,
//! SQLite and SQL Server, builds queries fluently, runs units of work in
//! transactions and applies versioned migrations.
//!
//! ```ignore
//! use relmap::{Config, Database, model};
//!
//! #[derive(Debug, Default, Clone)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! model!(User => "users" {
//!     id: "id,primary,auto_increment",
//!     name: "name,not_null,size:100",
//! });
//!
//! let db = Database::connect(Config::from_url("sqlite::memory:")?).await?;
//! db.auto_migrate().model::<User>().run().await?;
//! db.model::<User>()?.insert(&User { id: 0, name: "ann".into() }).await?;
//! let others: Vec<User> = db.model::<User>()?.where_("name <> ?", ["bob"]).get().await?;
//! ```

#[macro_use]
mod macros;

pub mod config;
pub mod db;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod global;
pub mod mapping;
pub mod migrate;
pub mod models;
pub mod query;

pub use config::{Config, PoolOptions};
pub use db::{
    AutoMigrate, AutoMigrateReport, Database, IsolationLevel, Transaction, TransactionOptions,
};
pub use ddl::{Schema, TableBuilder};
pub use dialect::Dialect;
pub use error::{OrmError, OrmResult};
pub use mapping::{FieldDef, Model, TableInfo, table_info, validate};
pub use migrate::{FnMigration, Migration, MigrationState, MigrationStatus, Migrator, SqlMigration};
pub use models::{ExecResult, Record, Value};
pub use query::QueryBuilder;
