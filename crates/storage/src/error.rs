//! Storage-layer error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),

    #[error("malformed stored JSON in column {column}: {source}")]
    Malformed {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Query(err)
    }
}
