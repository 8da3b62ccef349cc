//! Query construction.
//!
//! [`QueryBuilder`] accumulates SELECT/INSERT/UPDATE/DELETE intent and
//! renders SQL plus an ordered argument list for the session's dialect.
//! Obtain one from [`Database::table`](crate::Database::table),
//! [`Database::model`](crate::Database::model) or the same methods on a
//! [`Transaction`](crate::Transaction).

mod builder;
pub mod clause;

pub use builder::QueryBuilder;
pub use clause::{Join, JoinKind, Operator, QueryCondition};
