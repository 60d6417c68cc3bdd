//! SQLite storage layer: repository
//! implementations behind the `lp-core` ports, grounded on the teacher's
//! `iqrah-backend-storage`/`iqrah-storage` crates.

pub mod batch_repository;
pub mod content_repository;
pub mod error;
pub mod kb_config_repository;
pub mod record_repository;

pub use batch_repository::SqliteBatchRepository;
pub use content_repository::{init_sqlite, SqliteContentRepository};
pub use error::StorageError;
pub use kb_config_repository::SqliteKbConfigRepository;
pub use record_repository::SqliteRecordRepository;

use sqlx::SqlitePool;

/// Records a user's first contact; learning
/// records and progress key off the opaque `user_id` string directly, so
/// this is a presence row rather than an identity store (auth is an
/// external collaborator).
pub async fn touch_user(pool: &SqlitePool, user_id: &str) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO users (user_id, first_seen_at) VALUES (?, datetime('now'))
        ON CONFLICT(user_id) DO NOTHING",
    )
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(StorageError::from)?;
    Ok(())
}

pub async fn user_exists(pool: &SqlitePool, user_id: &str) -> Result<bool, StorageError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(StorageError::from)?;
    Ok(row.is_some())
}
