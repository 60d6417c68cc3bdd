use async_trait::async_trait;
use lp_domain::{BatchAnswer, QuizBatch};

/// Quiz batches (practice) / exam sessions and their answers.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn create_batch(&self, batch: &QuizBatch) -> anyhow::Result<()>;
    async fn get_batch(&self, id: uuid::Uuid) -> anyhow::Result<Option<QuizBatch>>;
    async fn update_batch(&self, batch: &QuizBatch) -> anyhow::Result<()>;

    /// Overwrites-in-place semantics before finish.
    async fn upsert_answer(&self, answer: &BatchAnswer) -> anyhow::Result<()>;
    /// Returned in `question_order` order so finish() can apply them
    /// deterministically.
    async fn answers_in_order(
        &self,
        batch_id: uuid::Uuid,
        question_order: &[uuid::Uuid],
    ) -> anyhow::Result<Vec<BatchAnswer>>;
}
