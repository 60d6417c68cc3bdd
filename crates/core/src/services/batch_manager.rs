//! Batch & exam session manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lp_domain::{BatchAnswer, BatchStatus, CoreError, ExamConfig, QuizBatch, SessionMode};

use crate::ports::{BatchRepository, ContentRepository, RecordRepository};
use crate::services::learning_record_service::LearningRecordService;
use crate::services::selector::QuestionSelector;

/// How an exam's question set is assembled.
pub enum ExamMode {
    /// Draw per-question-type counts from an effective config.
    Extraction { config: ExamConfig },
    /// Hydrate an existing `QuestionSet`'s fixed ordered id list.
    FixedSet { question_set_code: String },
}

/// Outcome of finishing a practice batch.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PracticeResult {
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub accuracy: f64,
}

pub struct BatchManager {
    content_repo: Arc<dyn ContentRepository>,
    record_repo: Arc<dyn RecordRepository>,
    batch_repo: Arc<dyn BatchRepository>,
    learning_records: Arc<LearningRecordService>,
    selector: Arc<QuestionSelector>,
}

impl BatchManager {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        record_repo: Arc<dyn RecordRepository>,
        batch_repo: Arc<dyn BatchRepository>,
        learning_records: Arc<LearningRecordService>,
        selector: Arc<QuestionSelector>,
    ) -> Self {
        Self {
            content_repo,
            record_repo,
            batch_repo,
            learning_records,
            selector,
        }
    }

    /// `start_practice(user, course, size)`.
    pub async fn start_practice(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        size: usize,
    ) -> Result<QuizBatch, CoreError> {
        let ids = self.selector.select(user_id, course_id, size, true).await?;
        if ids.is_empty() {
            return Err(CoreError::questions_unavailable(
                    "no questions available for practice session",
            ));
        }

        let batch = QuizBatch {
            id: uuid::Uuid::new_v4(),
            user_id: user_id.to_string(),
            mode: SessionMode::Practice,
            course_id,
            question_order: ids,
            started_at: Utc::now(),
            finished_at: None,
            status: BatchStatus::Active,
            score: None,
        };
        self.batch_repo
            .create_batch(&batch)
            .await
            .map_err(CoreError::from)?;
        Ok(batch)
    }

    /// `start_exam(user, course, mode, config)`.
    pub async fn start_exam(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        mode: ExamMode,
    ) -> Result<QuizBatch, CoreError> {
        let question_order = match mode {
            ExamMode::Extraction { config } => self.extract_exam_questions(course_id, &config).await?,
            ExamMode::FixedSet { question_set_code } => {
                let set = self
                    .content_repo
                    .get_question_set_by_code(course_id, &question_set_code)
                    .await
                    .map_err(CoreError::from)?
                    .ok_or_else(|| {
                        CoreError::question_set_not_found(format!(
                                "question set {question_set_code} not found"
                        ))
                })?;
                set.fixed_question_ids
            }
        };

        let batch = QuizBatch {
            id: uuid::Uuid::new_v4(),
            user_id: user_id.to_string(),
            mode: SessionMode::Exam,
            course_id,
            question_order,
            started_at: Utc::now(),
            finished_at: None,
            status: BatchStatus::Active,
            score: None,
        };
        self.batch_repo
            .create_batch(&batch)
            .await
            .map_err(CoreError::from)?;
        Ok(batch)
    }

    /// Effective exam config merge: request > user-setting > course default
    /// > hard default.
    pub fn effective_exam_config(
        request: Option<ExamConfig>,
        user_setting: Option<ExamConfig>,
        course_default: Option<ExamConfig>,
    ) -> ExamConfig {
        request
            .or(user_setting)
            .or(course_default)
            .unwrap_or_default()
    }

    async fn extract_exam_questions(
        &self,
        course_id: uuid::Uuid,
        config: &ExamConfig,
    ) -> Result<Vec<uuid::Uuid>, CoreError> {
        let mut ordered = Vec::new();
        for (question_type, requested) in &config.counts {
            let available = self
                .content_repo
                .count_questions_by_type(course_id, *question_type)
                .await
                .map_err(CoreError::from)?;
            if available < *requested {
                return Err(CoreError::exam_config_unsatisfiable(format!(
                            "requested {requested} {question_type:?} questions but only {available} exist"
                )));
            }
            let picked = self
                .content_repo
                .list_questions_by_type(course_id, *question_type, *requested)
                .await
                .map_err(CoreError::from)?;
            ordered.extend(picked.into_iter().map(|q| q.id));
        }
        Ok(ordered)
    }

    /// `submit_answer(batch, question, answer)`: records the
    /// answer against the batch only, never the learning record.
    pub async fn submit_answer(
        &self,
        batch_id: uuid::Uuid,
        question_id: uuid::Uuid,
        answer: &str,
    ) -> Result<(), CoreError> {
        let batch = self
            .batch_repo
            .get_batch(batch_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::batch_not_found("unknown batch"))?;
        if batch.status == BatchStatus::Finished {
            return Err(CoreError::batch_already_finished(
                    "cannot submit an answer to a finished batch",
            ));
        }

        self.batch_repo
            .upsert_answer(&BatchAnswer {
                batch_id,
                question_id,
                answer: answer.to_string(),
                answered_at: Utc::now(),
        })
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }

    /// `finish(batch)`: idempotent `active -> finished`
    /// transition. Applies answers in `question_order` and updates the learning record store per answer.
    pub async fn finish(&self, batch_id: uuid::Uuid) -> Result<FinishOutcome, CoreError> {
        let mut batch = self
            .batch_repo
            .get_batch(batch_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::batch_not_found("unknown batch"))?;

        if batch.status == BatchStatus::Finished {
            return Err(CoreError::batch_already_finished("batch already finished"));
        }

        let answers = self
            .batch_repo
            .answers_in_order(batch_id, &batch.question_order)
            .await
            .map_err(CoreError::from)?;
        let answer_by_question: BTreeMap<uuid::Uuid, &BatchAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

        let mut correct = 0u32;
        let mut wrong = 0u32;
        let total = batch.question_order.len() as u32;

        for question_id in &batch.question_order {
            let Some(answer) = answer_by_question.get(question_id) else {
                wrong += 1;
                continue;
            };
            let record = self
                .learning_records
                .submit(&batch.user_id, *question_id, &answer.answer)
                .await?;
            if record.last_correct {
                correct += 1;
            } else {
                wrong += 1;
            }
        }

        batch.finished_at = Some(Utc::now());
        batch.status = BatchStatus::Finished;

        let outcome = match batch.mode {
            SessionMode::Exam => {
                let score = if total == 0 {
                    0.0
                } else {
                    correct as f64 * (100.0 / total as f64)
                };
                batch.score = Some(score);
                FinishOutcome::Exam { score }
            }
            SessionMode::Practice => {
                let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
                FinishOutcome::Practice(PracticeResult {
                        total,
                        correct,
                        wrong,
                        accuracy,
                })
            }
        };

        self.batch_repo
            .update_batch(&batch)
            .await
            .map_err(CoreError::from)?;

        Ok(outcome)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FinishOutcome {
    Exam { score: f64 },
    Practice(PracticeResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockBatchRepository, MockContentRepository, MockRecordRepository};
    use lp_domain::{Question, QuestionType, UserLearningRecord};
    use std::collections::{BTreeMap, HashSet};

    fn question(id: uuid::Uuid, correct_answer: &str) -> Question {
        Question {
            id,
            course_id: uuid::Uuid::nil(),
            question_type: QuestionType::SingleChoice,
            content: String::new(),
            options: BTreeMap::new(),
            correct_answer: correct_answer.to_string(),
            explanation: String::new(),
            difficulty: 1,
            question_set_memberships: HashSet::new(),
        }
    }

    /// Scenario 4: fixed-set exam scoring at 2.5 points/question.
    #[tokio::test]
    async fn fixed_set_exam_scores_two_point_five_per_question() {
        let course_id = uuid::Uuid::new_v4();
        let batch_id = uuid::Uuid::new_v4();
        let ids: Vec<uuid::Uuid> = (0..4).map(|_| uuid::Uuid::new_v4()).collect();

        let mut content = MockContentRepository::new();
        for id in ids.clone() {
            content
                .expect_get_question()
                .withf(move |qid| *qid == id)
                .returning(move |_| Ok(Some(question(id, "A"))));
        }

        let mut records = MockRecordRepository::new();
        records.expect_get_record().returning(|_, _| Ok(None));
        records.expect_upsert_record().returning(|_| Ok(()));

        let mut batches = MockBatchRepository::new();
        let order = ids.clone();
        batches.expect_get_batch().returning(move |_| {
                Ok(Some(QuizBatch {
                            id: batch_id,
                            user_id: "u1".into(),
                            mode: SessionMode::Exam,
                            course_id,
                            question_order: order.clone(),
                            started_at: Utc::now(),
                            finished_at: None,
                            status: BatchStatus::Active,
                            score: None,
                }))
        });
        let order2 = ids.clone();
        batches
            .expect_answers_in_order()
            .returning(move |batch_id, _| {
                Ok(order2
                    .iter()
                    .take(3)
                    .map(|qid| BatchAnswer {
                            batch_id,
                            question_id: *qid,
                            answer: "A".into(),
                            answered_at: Utc::now(),
                    })
                        .collect())
        });
        batches.expect_update_batch().returning(|_| Ok(()));

        let record_repo: Arc<dyn crate::ports::RecordRepository> = Arc::new(records);
        let content_repo: Arc<dyn crate::ports::ContentRepository> = Arc::new(content);
        let batch_repo: Arc<dyn crate::ports::BatchRepository> = Arc::new(batches);
        let learning_records = Arc::new(LearningRecordService::new(
                content_repo.clone(),
                record_repo.clone(),
        ));
        let selector = Arc::new(QuestionSelector::new(content_repo.clone(), record_repo.clone()));
        let manager = BatchManager::new(
            content_repo,
            record_repo,
            batch_repo,
            learning_records,
            selector,
        );

        let outcome = manager.finish(batch_id).await.unwrap();
        assert_eq!(outcome, FinishOutcome::Exam { score: 75.0 });
    }

    #[tokio::test]
    async fn finish_twice_is_rejected() {
        let batch_id = uuid::Uuid::new_v4();
        let mut batches = MockBatchRepository::new();
        batches.expect_get_batch().returning(move |_| {
                Ok(Some(QuizBatch {
                            id: batch_id,
                            user_id: "u1".into(),
                            mode: SessionMode::Practice,
                            course_id: uuid::Uuid::new_v4(),
                            question_order: vec![],
                            started_at: Utc::now(),
                            finished_at: Some(Utc::now()),
                            status: BatchStatus::Finished,
                            score: None,
                }))
        });

        let content = MockContentRepository::new();
        let records = MockRecordRepository::new();
        let content_repo: Arc<dyn crate::ports::ContentRepository> = Arc::new(content);
        let record_repo: Arc<dyn crate::ports::RecordRepository> = Arc::new(records);
        let batch_repo: Arc<dyn crate::ports::BatchRepository> = Arc::new(batches);
        let learning_records = Arc::new(LearningRecordService::new(
                content_repo.clone(),
                record_repo.clone(),
        ));
        let selector = Arc::new(QuestionSelector::new(content_repo.clone(), record_repo.clone()));
        let manager = BatchManager::new(
            content_repo,
            record_repo,
            batch_repo,
            learning_records,
            selector,
        );

        let err = manager.finish(batch_id).await.unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::BatchAlreadyFinished);
    }
}
