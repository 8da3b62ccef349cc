//! Connection-related data models.

use crate::dialect::Dialect;
use serde::Serialize;

/// Information about an open database, as reported by `Database::info`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub dialect: Dialect,
    pub server_version: Option<String>,
    /// Connection target with the password masked
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_serializes_dialect_lowercase() {
        let info = ConnectionInfo {
            dialect: Dialect::Postgres,
            server_version: Some("16.2".into()),
            target: "postgres://app:****@db:5432/app".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["dialect"], "postgres");
        assert_eq!(json["server_version"], "16.2");
    }
}
