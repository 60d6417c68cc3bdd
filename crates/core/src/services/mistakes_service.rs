//! Mistakes service: derives wrong-question views and retry
//! batches from the record store.

use std::sync::Arc;

use lp_domain::{CoreError, Question, UserLearningRecord};

use crate::ports::{ContentRepository, RecordRepository};

pub struct MistakesService {
    content_repo: Arc<dyn ContentRepository>,
    record_repo: Arc<dyn RecordRepository>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MistakeEntry {
    pub question: Question,
    pub record: UserLearningRecord,
}

impl MistakesService {
    pub fn new(content_repo: Arc<dyn ContentRepository>, record_repo: Arc<dyn RecordRepository>) -> Self {
        Self {
            content_repo,
            record_repo,
        }
    }

    /// Wrong-question view: every record in the course whose last answer
    /// was incorrect, i.e. every record currently on the curve.
    pub async fn list_mistakes(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> Result<Vec<MistakeEntry>, CoreError> {
        let records = self
            .record_repo
            .records_for_course(user_id, course_id)
            .await
            .map_err(CoreError::from)?;

        let wrong: Vec<UserLearningRecord> = records
            .into_iter()
            .filter(|r| !r.last_correct || r.is_on_curve())
            .collect();

        if wrong.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<uuid::Uuid> = wrong.iter().map(|r| r.question_id).collect();
        let questions = self
            .content_repo
            .get_questions(&ids)
            .await
            .map_err(CoreError::from)?;
        let by_id: std::collections::HashMap<_, _> =
        questions.into_iter().map(|q| (q.id, q)).collect();

        Ok(wrong
            .into_iter()
            .filter_map(|record| {
                    by_id
                        .get(&record.question_id)
                        .cloned()
                        .map(|question| MistakeEntry { question, record })
            })
                .collect())
    }

    /// Retry batch: the ordered ids of every current mistake, for feeding
    /// into `BatchManager::start_practice`-style immutable ordering. Fails
    /// with `NO_MISTAKES_TO_RETRY` rather than handing back an empty batch.
    pub async fn retry_batch_ids(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> Result<Vec<uuid::Uuid>, CoreError> {
        let mistakes = self.list_mistakes(user_id, course_id).await?;
        if mistakes.is_empty() {
            return Err(CoreError::no_mistakes_to_retry(
                    "no outstanding mistakes for this course",
            ));
        }
        Ok(mistakes.into_iter().map(|m| m.record.question_id).collect())
    }
}
