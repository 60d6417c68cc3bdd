//! SQLite-backed `ContentRepository`.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use lp_core::ContentRepository;
use lp_domain::{Chapter, Course, CourseType, ExamConfig, Question, QuestionSet, QuestionType};
use sqlx::{FromRow, SqlitePool};

use crate::error::StorageError;

pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn course_type_to_str(t: CourseType) -> &'static str {
    match t {
        CourseType::Exam => "exam",
        CourseType::Learning => "learning",
    }
}

fn course_type_from_str(s: &str) -> anyhow::Result<CourseType> {
    match s {
        "exam" => Ok(CourseType::Exam),
        "learning" => Ok(CourseType::Learning),
        other => anyhow::bail!("unknown course_type in storage: {other}"),
    }
}

fn question_type_to_str(t: QuestionType) -> &'static str {
    match t {
        QuestionType::SingleChoice => "single_choice",
        QuestionType::MultipleChoice => "multiple_choice",
        QuestionType::TrueFalse => "true_false",
        QuestionType::FillBlank => "fill_blank",
        QuestionType::Essay => "essay",
    }
}

fn question_type_from_str(s: &str) -> anyhow::Result<QuestionType> {
    Ok(match s {
        "single_choice" => QuestionType::SingleChoice,
        "multiple_choice" => QuestionType::MultipleChoice,
        "true_false" => QuestionType::TrueFalse,
        "fill_blank" => QuestionType::FillBlank,
        "essay" => QuestionType::Essay,
        other => anyhow::bail!("unknown question_type in storage: {other}"),
    })
}

#[derive(FromRow)]
struct CourseRow {
    id: String,
    code: String,
    title: String,
    course_type: String,
    default_exam_config: Option<String>,
    active_kb_version: i64,
}

impl CourseRow {
    fn into_domain(self) -> anyhow::Result<Course> {
        Ok(Course {
            id: uuid::Uuid::parse_str(&self.id)?,
            code: self.code,
            title: self.title,
            course_type: course_type_from_str(&self.course_type)?,
            default_exam_config: self
                .default_exam_config
                .map(|s| serde_json::from_str::<ExamConfig>(&s))
                .transpose()?,
            active_kb_version: self.active_kb_version,
        })
    }
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    course_id: String,
    code: String,
    title: String,
    sort_order: i64,
    markdown_content: String,
}

impl ChapterRow {
    fn into_domain(self) -> anyhow::Result<Chapter> {
        Ok(Chapter {
            id: uuid::Uuid::parse_str(&self.id)?,
            course_id: uuid::Uuid::parse_str(&self.course_id)?,
            code: self.code,
            title: self.title,
            sort_order: self.sort_order as i32,
            markdown_content: self.markdown_content,
        })
    }
}

#[derive(FromRow)]
struct QuestionSetRow {
    id: String,
    course_id: String,
    code: String,
    name: String,
    fixed_question_ids: String,
}

impl QuestionSetRow {
    fn into_domain(self) -> anyhow::Result<QuestionSet> {
        let ids: Vec<String> = serde_json::from_str(&self.fixed_question_ids)?;
        Ok(QuestionSet {
            id: uuid::Uuid::parse_str(&self.id)?,
            course_id: uuid::Uuid::parse_str(&self.course_id)?,
            code: self.code,
            name: self.name,
            fixed_question_ids: ids
                .iter()
                .map(|s| uuid::Uuid::parse_str(s))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: String,
    course_id: String,
    question_type: String,
    content: String,
    options: String,
    correct_answer: String,
    explanation: String,
    difficulty: i64,
    question_set_memberships: String,
}

impl QuestionRow {
    fn into_domain(self) -> anyhow::Result<Question> {
        let options: BTreeMap<String, String> = serde_json::from_str(&self.options)?;
        let memberships: HashSet<String> = serde_json::from_str(&self.question_set_memberships)?;
        Ok(Question {
            id: uuid::Uuid::parse_str(&self.id)?,
            course_id: uuid::Uuid::parse_str(&self.course_id)?,
            question_type: question_type_from_str(&self.question_type)?,
            content: self.content,
            options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            difficulty: self.difficulty as u8,
            question_set_memberships: memberships,
        })
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn get_course_by_code(&self, code: &str) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            "SELECT id, code, title, course_type, default_exam_config, active_kb_version
            FROM courses WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(CourseRow::into_domain).transpose()
    }

    async fn upsert_course(&self, course: &Course) -> anyhow::Result<()> {
        let config = course
            .default_exam_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO courses (id, code, title, course_type, default_exam_config, active_kb_version)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
            title = excluded.title,
            course_type = excluded.course_type,
            default_exam_config = excluded.default_exam_config",
        )
        .bind(course.id.to_string())
        .bind(&course.code)
        .bind(course.title.clone())
        .bind(course_type_to_str(course.course_type))
        .bind(config)
        .bind(course.active_kb_version)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn set_active_kb_version(&self, course_id: uuid::Uuid, version: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE courses SET active_kb_version = ? WHERE id = ?")
            .bind(version)
            .bind(course_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn get_chapter_by_code(
        &self,
        course_id: uuid::Uuid,
        code: &str,
    ) -> anyhow::Result<Option<Chapter>> {
        let row = sqlx::query_as::<_, ChapterRow>(
            "SELECT id, course_id, code, title, sort_order, markdown_content
            FROM chapters WHERE course_id = ? AND code = ?",
        )
        .bind(course_id.to_string())
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(ChapterRow::into_domain).transpose()
    }

    async fn upsert_chapter(&self, chapter: &Chapter) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO chapters (id, course_id, code, title, sort_order, markdown_content)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(course_id, code) DO UPDATE SET
            title = excluded.title,
            sort_order = excluded.sort_order,
            markdown_content = excluded.markdown_content",
        )
        .bind(chapter.id.to_string())
        .bind(chapter.course_id.to_string())
        .bind(&chapter.code)
        .bind(chapter.title.clone())
        .bind(chapter.sort_order as i64)
        .bind(chapter.markdown_content.clone())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn list_chapters(&self, course_id: uuid::Uuid) -> anyhow::Result<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, ChapterRow>(
            "SELECT id, course_id, code, title, sort_order, markdown_content
            FROM chapters WHERE course_id = ? ORDER BY sort_order",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.into_iter().map(ChapterRow::into_domain).collect()
    }

    async fn get_question_set_by_code(
        &self,
        course_id: uuid::Uuid,
        code: &str,
    ) -> anyhow::Result<Option<QuestionSet>> {
        let row = sqlx::query_as::<_, QuestionSetRow>(
            "SELECT id, course_id, code, name, fixed_question_ids
            FROM question_sets WHERE course_id = ? AND code = ?",
        )
        .bind(course_id.to_string())
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(QuestionSetRow::into_domain).transpose()
    }

    async fn get_question(&self, id: uuid::Uuid) -> anyhow::Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships
            FROM questions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(QuestionRow::into_domain).transpose()
    }

    async fn get_questions(&self, ids: &[uuid::Uuid]) -> anyhow::Result<Vec<Question>> {
        // sqlx's SQLite driver has no array binding; a small IN-clause is
        // built from `?` placeholders instead.
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships
            FROM questions WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, QuestionRow>(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(StorageError::from)?;
        rows.into_iter().map(QuestionRow::into_domain).collect()
    }

    async fn list_questions_for_course(&self, course_id: uuid::Uuid) -> anyhow::Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships
            FROM questions WHERE course_id = ? ORDER BY id",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.into_iter().map(QuestionRow::into_domain).collect()
    }

    async fn count_questions_by_type(
        &self,
        course_id: uuid::Uuid,
        question_type: QuestionType,
    ) -> anyhow::Result<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM questions WHERE course_id = ? AND question_type = ?",
        )
        .bind(course_id.to_string())
        .bind(question_type_to_str(question_type))
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(count as u32)
    }

    async fn list_questions_by_type(
        &self,
        course_id: uuid::Uuid,
        question_type: QuestionType,
        limit: u32,
    ) -> anyhow::Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships
            FROM questions WHERE course_id = ? AND question_type = ?
            ORDER BY id LIMIT ?",
        )
        .bind(course_id.to_string())
        .bind(question_type_to_str(question_type))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.into_iter().map(QuestionRow::into_domain).collect()
    }

    async fn insert_question(&self, question: &Question) -> anyhow::Result<()> {
        let options = serde_json::to_string(&question.options)?;
        let memberships = serde_json::to_string(&question.question_set_memberships)?;
        sqlx::query(
            "INSERT INTO questions
            (id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(question.id.to_string())
        .bind(question.course_id.to_string())
        .bind(question_type_to_str(question.question_type))
        .bind(question.content.clone())
        .bind(options)
        .bind(question.correct_answer.clone())
        .bind(question.explanation.clone())
        .bind(question.difficulty as i64)
        .bind(memberships)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn find_duplicate_question(
        &self,
        course_id: uuid::Uuid,
        content: &str,
        correct_answer: &str,
    ) -> anyhow::Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, course_id, question_type, content, options, correct_answer,
            explanation, difficulty, question_set_memberships
            FROM questions WHERE course_id = ? AND content = ? AND correct_answer = ?",
        )
        .bind(course_id.to_string())
        .bind(content)
        .bind(correct_answer)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        row.map(QuestionRow::into_domain).transpose()
    }
}

/// Opens (creating if missing) a SQLite pool and runs the storage
/// migrations.
pub async fn init_sqlite(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = sqlx::sqlite::SqliteConnectOptions::from_str(database_url)
        .map_err(StorageError::Connection)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(StorageError::Connection)?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(StorageError::Migration)?;
    Ok(pool)
}
