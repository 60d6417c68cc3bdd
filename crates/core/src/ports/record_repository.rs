use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lp_domain::{UserCourseProgress, UserLearningRecord};

/// Per-user learning state: review records on the forgetting curve and
/// per-course round progress.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn get_record(
        &self,
        user_id: &str,
        question_id: uuid::Uuid,
    ) -> anyhow::Result<Option<UserLearningRecord>>;

    async fn upsert_record(&self, record: &UserLearningRecord) -> anyhow::Result<()>;

    /// Tier 1 of the selector: due, wrong, on-curve records for
    /// a course.
    async fn due_reviews(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<UserLearningRecord>>;

    /// All records for a user within a course, keyed by question id.
    async fn records_for_course(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> anyhow::Result<Vec<UserLearningRecord>>;

    /// Resets `completed_in_current_round = false` for every record of the
    /// user in the course.
    async fn reset_round(&self, user_id: &str, course_id: uuid::Uuid) -> anyhow::Result<()>;

    async fn get_progress(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> anyhow::Result<Option<UserCourseProgress>>;

    async fn upsert_progress(&self, progress: &UserCourseProgress) -> anyhow::Result<()>;
}
