//! Error types for relmap.
//!
//! Every fallible operation returns [`OrmResult`]. Variants carry enough
//! context (failing SQL, migration version, dialect) to act on without
//! re-running the operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Unsupported operation: {operation} is not available on {dialect}")]
    UnsupportedOperation { operation: String, dialect: String },

    #[error("Mapping error for {type_name}: {message}")]
    Mapping { message: String, type_name: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// Statement that failed, when known
        sql: Option<String>,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Migration {version} failed: {message}")]
    Migration {
        version: String,
        message: String,
        #[source]
        source: Option<Box<OrmError>>,
    },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl OrmError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an error for DDL or SQL the dialect cannot express.
    pub fn unsupported(operation: impl Into<String>, dialect: impl std::fmt::Display) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            dialect: dialect.to_string(),
        }
    }

    /// Create a mapping error for a record type.
    pub fn mapping(message: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
            type_name: type_name.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a validation error, optionally naming the offending field.
    pub fn validation(field: Option<&str>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.map(String::from),
            message: message.into(),
        }
    }

    pub fn migration(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Migration {
            version: version.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a failure raised by a migration's forward or reverse action.
    pub fn migration_failed(version: impl Into<String>, source: OrmError) -> Self {
        Self::Migration {
            version: version.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transaction(message: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Convert a driver error and attach the statement that produced it.
    pub fn from_sqlx(err: sqlx::Error, sql: &str) -> Self {
        Self::from(err).with_sql(sql)
    }

    /// Convert a SQL Server driver error and attach the statement that produced it.
    pub fn from_tiberius(err: tiberius::error::Error, sql: &str) -> Self {
        Self::from(err).with_sql(sql)
    }

    /// Attach the failing statement to a query error. Other variants pass through.
    pub fn with_sql(self, statement: &str) -> Self {
        match self {
            Self::Query {
                message,
                sql_state,
                suggestion,
                ..
            } => Self::Query {
                message,
                sql: Some(statement.to_string()),
                sql_state,
                suggestion,
            },
            other => other,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The statement that failed, for query errors.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to OrmError.
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => OrmError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                OrmError::query(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => OrmError::query(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => OrmError::connection(
                "Timed out acquiring a connection from the pool",
                "Raise acquire_timeout or max_connections, or release connections held by open transactions",
            ),
            sqlx::Error::PoolClosed => {
                OrmError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => OrmError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => OrmError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => OrmError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => OrmError::query(
                format!("Column not found: {}", col),
                None,
                "Check the selected column names",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                OrmError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => OrmError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => OrmError::internal("Database worker crashed"),
            _ => OrmError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert SQL Server driver errors to OrmError.
impl From<tiberius::error::Error> for OrmError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;
        match err {
            // server error numbers stand in for SQLSTATE, e.g. "208" for an invalid object name
            TdsError::Server(token) => OrmError::query(
                token.message(),
                Some(token.code().to_string()),
                "Check the SQL syntax and referenced objects",
            ),
            TdsError::Io { message, .. } => OrmError::connection(
                format!("I/O error: {}", message),
                "Check network connectivity and database server status",
            ),
            TdsError::Tls(msg) => OrmError::connection(
                format!("TLS error: {}", msg),
                "Verify TLS configuration, or set TrustServerCertificate=true for self-signed certificates",
            ),
            TdsError::Routing { host, port } => OrmError::connection(
                format!("Server redirected the connection to {}:{}", host, port),
                "Connect to the redirected host directly",
            ),
            TdsError::Protocol(msg) => OrmError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            TdsError::Conversion(msg) => {
                OrmError::internal(format!("Failed to convert value: {}", msg))
            }
            other => OrmError::internal(format!("Unknown database error: {}", other)),
        }
    }
}

/// Convert SQL Server pool checkout failures to OrmError.
impl From<bb8::RunError<tiberius::error::Error>> for OrmError {
    fn from(err: bb8::RunError<tiberius::error::Error>) -> Self {
        match err {
            bb8::RunError::User(e) => OrmError::from(e),
            bb8::RunError::TimedOut => OrmError::connection(
                "Timed out acquiring a connection from the pool",
                "Raise acquire_timeout or max_connections, or release connections held by open transactions",
            ),
        }
    }
}

/// Result type alias for relmap operations.
pub type OrmResult<T> = Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrmError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = OrmError::query("Syntax error", Some("42601".to_string()), "Check SQL syntax");
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert!(OrmError::config("bad").suggestion().is_none());
    }

    #[test]
    fn test_with_sql_annotates_query_errors_only() {
        let err = OrmError::query("boom", None, "x").with_sql("SELECT 1");
        assert_eq!(err.sql(), Some("SELECT 1"));

        let err = OrmError::validation(Some("name"), "required").with_sql("SELECT 1");
        assert!(err.sql().is_none());
    }

    #[test]
    fn test_unsupported_names_dialect() {
        let err = OrmError::unsupported("DROP COLUMN", "SQLite");
        assert_eq!(
            err.to_string(),
            "Unsupported operation: DROP COLUMN is not available on SQLite"
        );
    }

    #[test]
    fn test_migration_failed_keeps_source() {
        use std::error::Error as _;

        let err = OrmError::migration_failed("002", OrmError::internal("disk full"));
        assert!(err.to_string().contains("002"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_pool_timeout_maps_to_connection() {
        let err: OrmError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, OrmError::Connection { .. }));

        let err: OrmError = bb8::RunError::<tiberius::error::Error>::TimedOut.into();
        assert!(matches!(err, OrmError::Connection { .. }));
    }

    #[test]
    fn test_tiberius_io_error_maps_to_connection() {
        let err = OrmError::from_tiberius(
            tiberius::error::Error::Io {
                kind: std::io::ErrorKind::ConnectionRefused,
                message: "refused".into(),
            },
            "SELECT 1",
        );
        assert!(matches!(err, OrmError::Connection { .. }));
        assert!(err.sql().is_none());
    }
}
