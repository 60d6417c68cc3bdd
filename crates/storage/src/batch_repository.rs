//! SQLite-backed `BatchRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lp_core::BatchRepository;
use lp_domain::{BatchAnswer, BatchStatus, QuizBatch, SessionMode};
use sqlx::{FromRow, SqlitePool};

use crate::error::StorageError;

pub struct SqliteBatchRepository {
    pool: SqlitePool,
}

impl SqliteBatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn mode_to_str(m: SessionMode) -> &'static str {
    match m {
        SessionMode::Practice => "practice",
        SessionMode::Exam => "exam",
    }
}

fn mode_from_str(s: &str) -> anyhow::Result<SessionMode> {
    match s {
        "practice" => Ok(SessionMode::Practice),
        "exam" => Ok(SessionMode::Exam),
        other => anyhow::bail!("unknown session mode in storage: {other}"),
    }
}

fn status_to_str(s: BatchStatus) -> &'static str {
    match s {
        BatchStatus::Active => "active",
        BatchStatus::Finished => "finished",
    }
}

fn status_from_str(s: &str) -> anyhow::Result<BatchStatus> {
    match s {
        "active" => Ok(BatchStatus::Active),
        "finished" => Ok(BatchStatus::Finished),
        other => anyhow::bail!("unknown batch status in storage: {other}"),
    }
}

#[derive(FromRow)]
struct BatchRow {
    id: String,
    user_id: String,
    mode: String,
    course_id: String,
    question_order: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    score: Option<f64>,
}

impl BatchRow {
    fn into_domain(self) -> anyhow::Result<QuizBatch> {
        let ids: Vec<String> = serde_json::from_str(&self.question_order)?;
        Ok(QuizBatch {
            id: uuid::Uuid::parse_str(&self.id)?,
            user_id: self.user_id,
            mode: mode_from_str(&self.mode)?,
            course_id: uuid::Uuid::parse_str(&self.course_id)?,
            question_order: ids
                .iter()
                .map(|s| uuid::Uuid::parse_str(s))
                .collect::<Result<Vec<_>, _>>()?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: status_from_str(&self.status)?,
            score: self.score,
    })
}
}

#[derive(FromRow)]
struct AnswerRow {
batch_id: String,
question_id: String,
answer: String,
answered_at: DateTime<Utc>,
}

impl AnswerRow {
fn into_domain(self) -> anyhow::Result<BatchAnswer> {
    Ok(BatchAnswer {
        batch_id: uuid::Uuid::parse_str(&self.batch_id)?,
        question_id: uuid::Uuid::parse_str(&self.question_id)?,
        answer: self.answer,
        answered_at: self.answered_at,
})
}
}

#[async_trait]
impl BatchRepository for SqliteBatchRepository {
async fn create_batch(&self, batch: &QuizBatch) -> anyhow::Result<()> {
let order = serde_json::to_string(
    &batch.question_order.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
)?;
sqlx::query(
    "INSERT INTO quiz_batches
    (id, user_id, mode, course_id, question_order, started_at,
        finished_at, status, score)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
)
    .bind(batch.id.to_string())
    .bind(&batch.user_id)
    .bind(mode_to_str(batch.mode))
    .bind(batch.course_id.to_string())
    .bind(order)
    .bind(batch.started_at)
    .bind(batch.finished_at)
    .bind(status_to_str(batch.status))
    .bind(batch.score)
    .execute(&self.pool)
    .await
    .map_err(StorageError::from)?;
Ok(())
}

async fn get_batch(&self, id: uuid::Uuid) -> anyhow::Result<Option<QuizBatch>> {
let row = sqlx::query_as::<_, BatchRow>(
    "SELECT id, user_id, mode, course_id, question_order, started_at,
    finished_at, status, score
    FROM quiz_batches WHERE id = ?",
)
    .bind(id.to_string())
    .fetch_optional(&self.pool)
    .await
    .map_err(StorageError::from)?;
row.map(BatchRow::into_domain).transpose()
}

async fn update_batch(&self, batch: &QuizBatch) -> anyhow::Result<()> {
sqlx::query(
    "UPDATE quiz_batches SET finished_at = ?, status = ?, score = ? WHERE id = ?",
)
    .bind(batch.finished_at)
    .bind(status_to_str(batch.status))
    .bind(batch.score)
    .bind(batch.id.to_string())
    .execute(&self.pool)
    .await
    .map_err(StorageError::from)?;
Ok(())
}

async fn upsert_answer(&self, answer: &BatchAnswer) -> anyhow::Result<()> {
// Overwrites-in-place before finish.
sqlx::query(
    "INSERT INTO batch_answers (batch_id, question_id, answer, answered_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(batch_id, question_id) DO UPDATE SET
    answer = excluded.answer,
    answered_at = excluded.answered_at",
)
    .bind(answer.batch_id.to_string())
    .bind(answer.question_id.to_string())
    .bind(&answer.answer)
    .bind(answer.answered_at)
    .execute(&self.pool)
    .await
    .map_err(StorageError::from)?;
Ok(())
}

async fn answers_in_order(
&self,
batch_id: uuid::Uuid,
question_order: &[uuid::Uuid],
) -> anyhow::Result<Vec<BatchAnswer>> {
let rows = sqlx::query_as::<_, AnswerRow>(
    "SELECT batch_id, question_id, answer, answered_at
    FROM batch_answers WHERE batch_id = ?",
)
    .bind(batch_id.to_string())
    .fetch_all(&self.pool)
    .await
    .map_err(StorageError::from)?;
let mut by_question: std::collections::HashMap<uuid::Uuid, BatchAnswer> = rows
    .into_iter()
    .map(AnswerRow::into_domain)
    .collect::<Result<Vec<_>, _>>()?
    .into_iter()
    .map(|a| (a.question_id, a))
    .collect();
// Returned in `question_order` order;
// the service layer treats a missing answer as absent, not an error.
Ok(question_order
    .iter()
    .filter_map(|id| by_question.remove(id))
    .collect())
}
}
