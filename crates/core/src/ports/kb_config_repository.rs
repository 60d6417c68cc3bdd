use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-chapter tuning. The three-level merge (request > per-user >
/// per-course > defaults) is implemented as an explicit merge function
/// over this record, never by mutating shared state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterKbConfig {
    pub max_chunk_size: Option<usize>,
    pub min_chunk_size: Option<usize>,
    pub overlap_size: Option<usize>,
    pub code_block_strategy: Option<String>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KbConfigRepository: Send + Sync {
    async fn get_config(
        &self,
        course_id: uuid::Uuid,
        chapter_id: uuid::Uuid,
    ) -> anyhow::Result<Option<ChapterKbConfig>>;

    async fn set_config(
        &self,
        course_id: uuid::Uuid,
        chapter_id: uuid::Uuid,
        config: &ChapterKbConfig,
    ) -> anyhow::Result<()>;
}
