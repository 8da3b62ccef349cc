//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management and the shared [`Database`] handle
//! - Statement execution against a pool or a transaction
//! - SQL Server connections over tiberius
//! - Row decoding and parameter binding
//! - Transactions
//! - Database dispatch macros for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod mssql;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use executor::Session;
pub use pool::{AutoMigrate, AutoMigrateReport, Database, DbPool};
pub use transaction::{
    DbTransaction, IsolationLevel, Transaction, TransactionOptions, with_transaction,
    with_transaction_options,
};
