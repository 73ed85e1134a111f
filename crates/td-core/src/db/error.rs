//! Store error types.

use thiserror::Error;

/// Failures reported by the incident, audit, BIA, feedback and user stores.
#[derive(Error, Debug)]
pub enum DbError {
    /// The store could not be reached.
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// A row addressed by id does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// A UNIQUE column rejected the write: a second BIA report for one
    /// incident, a reused feedback id, or an email already registered.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A stored value could not be decoded into its domain type.
    #[error("Corrupt stored value: {0}")]
    Serialization(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Invalid database configuration: {0}")]
    Configuration(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Constraint(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) => DbError::Query(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::Configuration(msg) => DbError::Configuration(msg.to_string()),
            sqlx::Error::Io(e) => DbError::Connection(e.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

// Row decoding: ids, timestamps and the JSON id list bound for feedback lookups.

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<uuid::Error> for DbError {
    fn from(err: uuid::Error) -> Self {
        DbError::Serialization(format!("bad id: {}", err))
    }
}

impl From<chrono::ParseError> for DbError {
    fn from(err: chrono::ParseError) -> Self {
        DbError::Serialization(format!("bad timestamp: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Incident", "42");
        assert_eq!(err.to_string(), "Incident 42 not found");
    }

    #[test]
    fn test_decode_errors_are_serialization() {
        let err: DbError = uuid::Uuid::parse_str("not-a-uuid").unwrap_err().into();
        assert!(matches!(err, DbError::Serialization(ref m) if m.starts_with("bad id")));

        let err: DbError = chrono::DateTime::parse_from_rfc3339("yesterday")
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::Serialization(ref m) if m.starts_with("bad timestamp")));
    }
}
