//! Parameter binding utilities for database queries.
//!
//! Binds [`Value`] arguments to database-specific query objects. Every
//! statement the crate sends goes through one of these.

use crate::models::value::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo};
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// NULL sent with the unspecified type (OID 0), so the server infers the
/// parameter type from context: a NULL bound into a `bigint`, `boolean`,
/// `timestamp` or `jsonb` column is typed as that column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Timestamp(v) => query.bind(*v),
        Value::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Timestamp(v) => query.bind(*v),
        Value::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Timestamp(v) => query.bind(*v),
        // SQLite doesn't have native JSON type, store as string
        Value::Json(v) => query.bind(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Encode, Type};

    #[test]
    fn test_untyped_null_encodes_as_null_with_unspecified_type() {
        assert_eq!(<UntypedNull as Type<Postgres>>::type_info(), PgTypeInfo::with_oid(Oid(0)));

        let mut buf = PgArgumentBuffer::default();
        let is_null = Encode::<Postgres>::encode_by_ref(&UntypedNull, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }
}
