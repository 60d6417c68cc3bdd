//! Learning record store & answer submission.

use std::sync::Arc;

use chrono::Utc;
use lp_domain::{answers_equal, CoreError, ErrorCode, Question, UserLearningRecord};

use crate::ports::{ContentRepository, RecordRepository};

pub struct LearningRecordService {
    content_repo: Arc<dyn ContentRepository>,
    record_repo: Arc<dyn RecordRepository>,
}

impl LearningRecordService {
    pub fn new(content_repo: Arc<dyn ContentRepository>, record_repo: Arc<dyn RecordRepository>) -> Self {
        Self {
            content_repo,
            record_repo,
        }
    }

    /// `submit(user, question, answer) -> record'`.
    ///
    /// Essay answers are never auto-graded (`answers_equal` returns `None`);
    /// they are recorded but never enter the curve via this path — scoring
    /// for essays is a human/LLM-assist concern outside this contract.
    #[tracing::instrument(skip(self, answer), fields(user_id, question_id = %question_id))]
    pub async fn submit(
        &self,
        user_id: &str,
        question_id: uuid::Uuid,
        answer: &str,
    ) -> Result<UserLearningRecord, CoreError> {
        let question = self
            .content_repo
            .get_question(question_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::new(ErrorCode::ValidationError, "unknown question"))?;

        let correct = answers_equal(question.question_type, answer, &question.correct_answer);

        let mut record = match self
            .record_repo
            .get_record(user_id, question_id)
            .await
            .map_err(CoreError::from)?
        {
            Some(r) => r,
            None => fresh_record(user_id, question_id),
        };

        self.apply_answer(&mut record, answer, correct);
        self.record_repo
            .upsert_record(&record)
            .await
            .map_err(CoreError::from)?;

        Ok(record)
    }

    /// Pure mutation of a record given a graded answer; factored out so the
    /// batch/exam manager can drive it deterministically per
    /// `question_order` without a second round-trip through the content
    /// repository for the same question.
    pub fn apply_answer(&self, record: &mut UserLearningRecord, answer: &str, correct: Option<bool>) {
        let now = Utc::now();
        let is_correct = correct.unwrap_or(false);

        if correct == Some(false) {
            // Wrong: always advance through the scheduler.
            let transition = lp_scheduler::next(record.review_stage, false, now);
            record.review_stage = transition.stage;
            record.next_review_time = transition.next_review_time;
        } else if is_correct && record.is_on_curve() {
            // Correct, already on the curve: advance via scheduler.
            let transition = lp_scheduler::next(record.review_stage, true, now);
            record.review_stage = transition.stage;
            record.next_review_time = transition.next_review_time;
        }
        // Correct and never wrong (stage 0): leave stage/next_review_time
        // untouched — it never enters the curve.

        record.last_answer = answer.to_string();
        record.last_correct = is_correct;
        record.answered_at = now;
        record.completed_in_current_round = true;
    }
}

fn fresh_record(user_id: &str, question_id: uuid::Uuid) -> UserLearningRecord {
    UserLearningRecord {
        user_id: user_id.to_string(),
        question_id,
        last_answer: String::new(),
        last_correct: false,
        answered_at: Utc::now(),
        review_stage: 0,
        next_review_time: None,
        completed_in_current_round: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockContentRepository, MockRecordRepository};
    use lp_domain::QuestionType;
    use std::collections::{BTreeMap, HashSet};

    fn sample_question(id: uuid::Uuid) -> Question {
        Question {
            id,
            course_id: uuid::Uuid::nil(),
            question_type: QuestionType::SingleChoice,
            content: "2+2?".into(),
            options: BTreeMap::from([("A".into(), "4".into()), ("B".into(), "5".into())]),
            correct_answer: "A".into(),
            explanation: String::new(),
            difficulty: 1,
            question_set_memberships: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn wrong_answer_enters_curve_at_stage_one() {
        let qid = uuid::Uuid::new_v4();

        let mut content = MockContentRepository::new();
        content
            .expect_get_question()
            .returning(move |_| Ok(Some(sample_question(qid))));

        let mut records = MockRecordRepository::new();
        records.expect_get_record().returning(|_, _| Ok(None));
        records
            .expect_upsert_record()
            .withf(|r| r.review_stage == 1 && r.next_review_time.is_some())
            .returning(|_| Ok(()));

        let svc = LearningRecordService::new(Arc::new(content), Arc::new(records));
        let record = svc.submit("u1", qid, "B").await.unwrap();
        assert_eq!(record.review_stage, 1);
        assert!(record.next_review_time.is_some());
        assert!(!record.last_correct);
    }

    #[tokio::test]
    async fn correct_never_wrong_stays_off_curve() {
        let qid = uuid::Uuid::new_v4();
        let mut content = MockContentRepository::new();
        content
            .expect_get_question()
            .returning(move |_| Ok(Some(sample_question(qid))));

        let mut records = MockRecordRepository::new();
        records.expect_get_record().returning(|_, _| Ok(None));
        records
            .expect_upsert_record()
            .withf(|r| r.review_stage == 0 && r.next_review_time.is_none() && r.last_correct)
            .returning(|_| Ok(()));

        let svc = LearningRecordService::new(Arc::new(content), Arc::new(records));
        let record = svc.submit("u1", qid, "A").await.unwrap();
        assert_eq!(record.review_stage, 0);
        assert!(record.next_review_time.is_none());
    }
}
