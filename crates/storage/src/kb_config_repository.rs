//! SQLite-backed `KbConfigRepository`.

use async_trait::async_trait;
use lp_core::{ChapterKbConfig, KbConfigRepository};
use sqlx::{FromRow, SqlitePool};

use crate::error::StorageError;

pub struct SqliteKbConfigRepository {
    pool: SqlitePool,
}

impl SqliteKbConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ConfigRow {
    max_chunk_size: Option<i64>,
    min_chunk_size: Option<i64>,
    overlap_size: Option<i64>,
    code_block_strategy: Option<String>,
}

impl From<ConfigRow> for ChapterKbConfig {
    fn from(row: ConfigRow) -> Self {
        ChapterKbConfig {
            max_chunk_size: row.max_chunk_size.map(|v| v as usize),
            min_chunk_size: row.min_chunk_size.map(|v| v as usize),
            overlap_size: row.overlap_size.map(|v| v as usize),
            code_block_strategy: row.code_block_strategy,
        }
    }
}

#[async_trait]
impl KbConfigRepository for SqliteKbConfigRepository {
    async fn get_config(
        &self,
        course_id: uuid::Uuid,
        chapter_id: uuid::Uuid,
    ) -> anyhow::Result<Option<ChapterKbConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT max_chunk_size, min_chunk_size, overlap_size, code_block_strategy
            FROM chapter_kb_configs WHERE course_id = ? AND chapter_id = ?",
        )
            .bind(course_id.to_string())
            .bind(chapter_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(ChapterKbConfig::from))
    }

    async fn set_config(
        &self,
        course_id: uuid::Uuid,
        chapter_id: uuid::Uuid,
        config: &ChapterKbConfig,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO chapter_kb_configs
            (course_id, chapter_id, max_chunk_size, min_chunk_size, overlap_size, code_block_strategy)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(course_id, chapter_id) DO UPDATE SET
            max_chunk_size = excluded.max_chunk_size,
            min_chunk_size = excluded.min_chunk_size,
            overlap_size = excluded.overlap_size,
            code_block_strategy = excluded.code_block_strategy",
        )
            .bind(course_id.to_string())
            .bind(chapter_id.to_string())
            .bind(config.max_chunk_size.map(|v| v as i64))
            .bind(config.min_chunk_size.map(|v| v as i64))
            .bind(config.overlap_size.map(|v| v as i64))
            .bind(config.code_block_strategy.clone())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
