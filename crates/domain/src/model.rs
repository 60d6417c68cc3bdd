//! Core data model. Plain, storage-agnostic types: the `storage`
//! crate maps these to/from SQL rows, the `rag` crate maps chunk metadata
//! to/from vector store payloads.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    Exam,
    Learning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    /// question_type -> requested count
    pub counts: BTreeMap<QuestionType, u32>,
}

impl Default for ExamConfig {
    /// The hard default: {single: 30, multi: 10, true_false: 10}.
    fn default() -> Self {
        let mut counts = BTreeMap::new();
        counts.insert(QuestionType::SingleChoice, 30);
        counts.insert(QuestionType::MultipleChoice, 10);
        counts.insert(QuestionType::TrueFalse, 10);
        Self { counts }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: uuid::Uuid,
    pub code: String,
    pub title: String,
    pub course_type: CourseType,
    pub default_exam_config: Option<ExamConfig>,
    /// Invariant: exactly one version is active at any moment.
    pub active_kb_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: uuid::Uuid,
    pub code: String,
    pub course_id: uuid::Uuid,
    pub title: String,
    pub sort_order: i32,
    pub markdown_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: uuid::Uuid,
    pub code: String,
    pub course_id: uuid::Uuid,
    pub name: String,
    /// Closed set; question membership is a static, ordered list.
    pub fixed_question_ids: Vec<uuid::Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Essay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: uuid::Uuid,
    pub course_id: uuid::Uuid,
    pub question_type: QuestionType,
    pub content: String,
    /// key -> text; empty for non-choice types.
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: u8,
    pub question_set_memberships: HashSet<String>,
}

impl Question {
    /// True/false options are always {"A": "对", "B": "错"}
    pub fn true_false_options() -> BTreeMap<String, String> {
        BTreeMap::from([
                ("A".to_string(), "对".to_string()),
                ("B".to_string(), "错".to_string()),
        ])
    }
}

/// Review stage 0..8 on the forgetting curve.
pub type ReviewStage = u8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLearningRecord {
    pub user_id: String,
    pub question_id: uuid::Uuid,
    pub last_answer: String,
    pub last_correct: bool,
    pub answered_at: DateTime<Utc>,
    pub review_stage: ReviewStage,
    pub next_review_time: Option<DateTime<Utc>>,
    pub completed_in_current_round: bool,
}

impl UserLearningRecord {
    /// A record that has never been answered wrong sits at stage 0 with no
    /// review time; it never entered the curve.
    pub fn is_on_curve(&self) -> bool {
        self.review_stage > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCourseProgress {
    pub user_id: String,
    pub course_id: uuid::Uuid,
    pub current_round: u32,
    pub total_rounds_completed: u32,
}

impl Default for UserCourseProgress {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            course_id: uuid::Uuid::nil(),
            current_round: 1,
            total_rounds_completed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Practice,
    Exam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizBatch {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub mode: SessionMode,
    pub course_id: uuid::Uuid,
    pub question_order: Vec<uuid::Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnswer {
    pub batch_id: uuid::Uuid,
    pub question_id: uuid::Uuid,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Paragraph,
    CodeBlock,
    CodeSummary,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenLevel {
    Normal,
    Warning,
    Large,
    Oversized,
}

impl TokenLevel {
    /// Thresholds: normal <512, warning 512-1024, large
    /// 1024-2048, oversized >2048.
    pub fn from_estimated_tokens(tokens: u64) -> Self {
        match tokens {
            t if t < 512 => TokenLevel::Normal,
            t if t < 1024 => TokenLevel::Warning,
            t if t < 2048 => TokenLevel::Large,
            _ => TokenLevel::Oversized,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_code: String,
    pub chapter_code: String,
    pub source_file: String,
    pub position: u32,
    pub content_type: ContentType,
    pub char_count: u64,
    pub estimated_tokens: u64,
    pub token_level: TokenLevel,
    pub strategy_version: String,
    pub indexed_at: DateTime<Utc>,
    pub kb_version: i64,
    /// True when a `summarize`/`hybrid` code processor fell back to
    /// `preserve` because the LLM gateway failed.
    pub summary_failed: bool,
    /// Populated for `code_summary` chunks: the untouched source code, so
    /// retrieval never loses it even when the indexed text is a summary.
    pub original_code: Option<String>,
    /// Backfilled by course import once the owning rows exist. `None` for chunks indexed ahead of import.
    pub db_course_id: Option<uuid::Uuid>,
    pub db_chapter_id: Option<uuid::Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: uuid::Uuid,
    pub agent_kind: String,
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// §4.2/§6 answer-equality rules, used by the learning record store and the
/// batch/exam session manager.
pub fn answers_equal(question_type: QuestionType, given: &str, correct: &str) -> Option<bool> {
    match question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => Some(
            given.trim().to_uppercase() == correct.trim().to_uppercase(),
        ),
        QuestionType::MultipleChoice => {
            let norm = |s: &str| -> HashSet<String> {
                s.split(',').map(|p| p.trim().to_uppercase()).collect()
            };
            Some(norm(given) == norm(correct))
        }
        QuestionType::FillBlank => {
            let given_norm = given.trim();
            Some(
                correct
                    .split('|')
                    .any(|alt| alt.trim() == given_norm),
            )
        }
        QuestionType::Essay => None,
    }
}

/// Normalizes a multiple-choice answer to the persisted form: sorted,
/// comma-joined, uppercased keys.
pub fn normalize_multi_choice_answer(raw: &str) -> String {
    let mut keys: Vec<String> = raw
        .split(',')
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    keys.sort();
    keys.dedup();
    keys.join(",")
}
