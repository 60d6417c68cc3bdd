//! SQLite-backed `RecordRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lp_core::RecordRepository;
use lp_domain::{UserCourseProgress, UserLearningRecord};
use sqlx::{FromRow, SqlitePool};

use crate::error::StorageError;

pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RecordRow {
    user_id: String,
    question_id: String,
    last_answer: String,
    last_correct: bool,
    answered_at: DateTime<Utc>,
    review_stage: i64,
    next_review_time: Option<DateTime<Utc>>,
    completed_in_current_round: bool,
}

impl RecordRow {
    fn into_domain(self) -> anyhow::Result<UserLearningRecord> {
        Ok(UserLearningRecord {
            user_id: self.user_id,
            question_id: uuid::Uuid::parse_str(&self.question_id)?,
            last_answer: self.last_answer,
            last_correct: self.last_correct,
            answered_at: self.answered_at,
            review_stage: self.review_stage as u8,
            next_review_time: self.next_review_time,
            completed_in_current_round: self.completed_in_current_round,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    user_id: String,
    course_id: String,
    current_round: i64,
    total_rounds_completed: i64,
}

impl ProgressRow {
    fn into_domain(self) -> anyhow::Result<UserCourseProgress> {
        Ok(UserCourseProgress {
            user_id: self.user_id,
            course_id: uuid::Uuid::parse_str(&self.course_id)?,
            current_round: self.current_round as u32,
            total_rounds_completed: self.total_rounds_completed as u32,
        })
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn get_record(
        &self,
        user_id: &str,
        question_id: uuid::Uuid,
    ) -> anyhow::Result<Option<UserLearningRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT user_id, question_id, last_answer, last_correct, answered_at,
            review_stage, next_review_time, completed_in_current_round
            FROM user_learning_records WHERE user_id = ? AND question_id = ?",
        )
        .bind(user_id)
        .bind(question_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(RecordRow::into_domain).transpose()
    }

    async fn upsert_record(&self, record: &UserLearningRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_learning_records
            (user_id, question_id, last_answer, last_correct, answered_at,
                review_stage, next_review_time, completed_in_current_round)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, question_id) DO UPDATE SET
            last_answer = excluded.last_answer,
            last_correct = excluded.last_correct,
            answered_at = excluded.answered_at,
            review_stage = excluded.review_stage,
            next_review_time = excluded.next_review_time,
            completed_in_current_round = excluded.completed_in_current_round",
        )
        .bind(&record.user_id)
        .bind(record.question_id.to_string())
        .bind(&record.last_answer)
        .bind(record.last_correct)
        .bind(record.answered_at)
        .bind(record.review_stage as i64)
        .bind(record.next_review_time)
        .bind(record.completed_in_current_round)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn due_reviews(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<UserLearningRecord>> {
        // spec §4.3 tier 1: due, wrong, on-curve records restricted to the
        // course (joined through `questions` for the course scope).
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT r.user_id, r.question_id, r.last_answer, r.last_correct, r.answered_at,
            r.review_stage, r.next_review_time, r.completed_in_current_round
            FROM user_learning_records r
            JOIN questions q ON q.id = r.question_id
            WHERE r.user_id = ? AND q.course_id = ?
            AND r.last_correct = 0 AND r.review_stage > 0
            AND r.next_review_time IS NOT NULL AND r.next_review_time <= ?
            ORDER BY r.next_review_time, r.question_id",
        )
        .bind(user_id)
        .bind(course_id.to_string())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.into_iter().map(RecordRow::into_domain).collect()
    }

    async fn records_for_course(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> anyhow::Result<Vec<UserLearningRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT r.user_id, r.question_id, r.last_answer, r.last_correct, r.answered_at,
            r.review_stage, r.next_review_time, r.completed_in_current_round
            FROM user_learning_records r
            JOIN questions q ON q.id = r.question_id
            WHERE r.user_id = ? AND q.course_id = ?",
        )
        .bind(user_id)
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.into_iter().map(RecordRow::into_domain).collect()
    }

    async fn reset_round(&self, user_id: &str, course_id: uuid::Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE user_learning_records
            SET completed_in_current_round = 0
            WHERE user_id = ? AND question_id IN (
                SELECT id FROM questions WHERE course_id = ?
            )",
        )
        .bind(user_id)
        .bind(course_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
    ) -> anyhow::Result<Option<UserCourseProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT user_id, course_id, current_round, total_rounds_completed
            FROM user_course_progress WHERE user_id = ? AND course_id = ?",
        )
        .bind(user_id)
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(ProgressRow::into_domain).transpose()
    }

    async fn upsert_progress(&self, progress: &UserCourseProgress) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_course_progress
            (user_id, course_id, current_round, total_rounds_completed)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
            current_round = excluded.current_round,
            total_rounds_completed = excluded.total_rounds_completed",
        )
        .bind(&progress.user_id)
        .bind(progress.course_id.to_string())
        .bind(progress.current_round as i64)
        .bind(progress.total_rounds_completed as i64)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}
