use async_trait::async_trait;
use lp_domain::{Chapter, Course, Question, QuestionSet, QuestionType};

/// Read/write access to course content: courses, chapters, question sets,
/// and questions. Kept separate from user-shaped data (learning records,
/// batches) so the two can be backed by different stores if ever needed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn get_course_by_code(&self, code: &str) -> anyhow::Result<Option<Course>>;
    async fn upsert_course(&self, course: &Course) -> anyhow::Result<()>;
    /// Flips `active_kb_version` atomically.
    async fn set_active_kb_version(&self, course_id: uuid::Uuid, version: i64) -> anyhow::Result<()>;

    async fn get_chapter_by_code(
        &self,
        course_id: uuid::Uuid,
        code: &str,
    ) -> anyhow::Result<Option<Chapter>>;
    async fn upsert_chapter(&self, chapter: &Chapter) -> anyhow::Result<()>;
    async fn list_chapters(&self, course_id: uuid::Uuid) -> anyhow::Result<Vec<Chapter>>;

    async fn get_question_set_by_code(
        &self,
        course_id: uuid::Uuid,
        code: &str,
    ) -> anyhow::Result<Option<QuestionSet>>;

    async fn get_question(&self, id: uuid::Uuid) -> anyhow::Result<Option<Question>>;
    async fn get_questions(&self, ids: &[uuid::Uuid]) -> anyhow::Result<Vec<Question>>;
    /// All questions in a course, stably ordered by id.
    async fn list_questions_for_course(&self, course_id: uuid::Uuid) -> anyhow::Result<Vec<Question>>;
    async fn count_questions_by_type(
        &self,
        course_id: uuid::Uuid,
        question_type: QuestionType,
    ) -> anyhow::Result<u32>;
    async fn list_questions_by_type(
        &self,
        course_id: uuid::Uuid,
        question_type: QuestionType,
        limit: u32,
    ) -> anyhow::Result<Vec<Question>>;
    async fn insert_question(&self, question: &Question) -> anyhow::Result<()>;
    /// Duplicate detection key: (content, correct_answer, course_code).
    async fn find_duplicate_question(
        &self,
        course_id: uuid::Uuid,
        content: &str,
        correct_answer: &str,
    ) -> anyhow::Result<Option<Question>>;
}
