//! Course import pipeline: turns a parsed course manifest plus
//! its chapters' Markdown into `Course`/`Chapter` rows, idempotent on
//! `(course.code, chapter.code)`, and backfills pre-existing vector chunks
//! with the database ids they were indexed ahead of.

use std::sync::Arc;

use lp_domain::{Chapter, Course, CoreError, CourseType, ExamConfig};
use lp_rag::{MetadataFilter, VectorStoreAdapter};
use tracing::instrument;

use crate::ports::ContentRepository;

#[derive(Debug, Clone)]
pub struct ChapterManifest {
    /// Explicit chapter code, if the author supplied one.
    pub code: Option<String>,
    pub title: String,
    /// Relative Markdown path.
    pub file: String,
    pub sort_order: i32,
    pub markdown: String,
}

#[derive(Debug, Clone)]
pub struct CourseManifest {
    pub code: String,
    pub title: String,
    pub course_type: CourseType,
    pub default_exam_config: Option<ExamConfig>,
    pub chapters: Vec<ChapterManifest>,
}

#[derive(Debug, Clone)]
pub struct ChapterImportResult {
    pub chapter_id: uuid::Uuid,
    pub chapter_code: String,
    pub chunks_rebound: u64,
}

#[derive(Debug, Clone)]
pub struct CourseImportReport {
    pub course_id: uuid::Uuid,
    pub chapters: Vec<ChapterImportResult>,
}

/// Derives a chapter code: explicit code > normalized filename stem >
/// `chapter_{sort_order}`.
pub fn derive_chapter_code(manifest: &ChapterManifest) -> String {
    if let Some(code) = &manifest.code {
        if !code.trim().is_empty() {
            return code.clone();
        }
    }

    let stem = std::path::Path::new(&manifest.file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let normalized = normalize_stem(stem);
    if !normalized.is_empty() {
        return normalized;
    }

    format!("chapter_{}", manifest.sort_order)
}

fn normalize_stem(stem: &str) -> String {
    let normalized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
    })
        .collect();
    normalized.trim_matches('_').to_string()
}

pub struct CourseImportService<V: VectorStoreAdapter> {
    content_repo: Arc<dyn ContentRepository>,
    vector_store: Arc<V>,
    /// The `source` half of the `course_{source}_{course_code}` collection
    /// name; course import only ever binds to one
    /// origin's chunks (e.g. "local").
    source: String,
}

impl<V: VectorStoreAdapter> CourseImportService<V> {
    pub fn new(content_repo: Arc<dyn ContentRepository>, vector_store: Arc<V>, source: impl Into<String>) -> Self {
        Self {
            content_repo,
            vector_store,
            source: source.into(),
        }
    }

    /// Imports one course: upserts the `Course` row, then each `Chapter`
    /// row keyed by `(course.code, chapter.code)`, then rebinds any chunks
    /// that were indexed before this chapter's database row existed. Safe to run repeatedly.
    #[instrument(skip(self, manifest), fields(course_code = %manifest.code))]
    pub async fn import(&self, manifest: CourseManifest) -> Result<CourseImportReport, CoreError> {
        let course_id = self.upsert_course(&manifest).await?;

        let mut chapters = Vec::with_capacity(manifest.chapters.len());
        for chapter_manifest in &manifest.chapters {
            let chapter_code = derive_chapter_code(chapter_manifest);
            let chapter_id = self
                .upsert_chapter(course_id, &chapter_code, chapter_manifest)
                .await?;

            let collection = lp_rag::collection_name(&self.source, &manifest.code);
            let filter = MetadataFilter {
                course_code: Some(manifest.code.clone()),
                chapter_code: Some(chapter_code.clone()),
                ..Default::default()
            };
            let chunks_rebound = self
                .vector_store
                .backfill_ids(&collection, &filter, course_id, chapter_id)
                .await
                .map_err(|e| CoreError::new(lp_domain::ErrorCode::InternalError, e.to_string()))?;

            chapters.push(ChapterImportResult {
                    chapter_id,
                    chapter_code,
                    chunks_rebound,
            });
        }

        Ok(CourseImportReport { course_id, chapters })
    }

    async fn upsert_course(&self, manifest: &CourseManifest) -> Result<uuid::Uuid, CoreError> {
        let existing = self
            .content_repo
            .get_course_by_code(&manifest.code)
            .await
            .map_err(CoreError::from)?;

        let course = Course {
            id: existing.as_ref().map(|c| c.id).unwrap_or_else(uuid::Uuid::new_v4),
            code: manifest.code.clone(),
            title: manifest.title.clone(),
            course_type: manifest.course_type,
            default_exam_config: manifest.default_exam_config.clone(),
            active_kb_version: existing.map(|c| c.active_kb_version).unwrap_or(0),
        };
        self.content_repo.upsert_course(&course).await.map_err(CoreError::from)?;
        Ok(course.id)
    }

    async fn upsert_chapter(
        &self,
        course_id: uuid::Uuid,
        chapter_code: &str,
        manifest: &ChapterManifest,
    ) -> Result<uuid::Uuid, CoreError> {
        let existing = self
            .content_repo
            .get_chapter_by_code(course_id, chapter_code)
            .await
            .map_err(CoreError::from)?;

        let chapter = Chapter {
            id: existing.as_ref().map(|c| c.id).unwrap_or_else(uuid::Uuid::new_v4),
            code: chapter_code.to_string(),
            course_id,
            title: manifest.title.clone(),
            sort_order: manifest.sort_order,
            markdown_content: manifest.markdown.clone(),
        };
        self.content_repo.upsert_chapter(&chapter).await.map_err(CoreError::from)?;
        Ok(chapter.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockContentRepository;
    use lp_rag::InMemoryVectorStore;

    fn manifest() -> CourseManifest {
        CourseManifest {
            code: "algebra-101".to_string(),
            title: "Algebra I".to_string(),
            course_type: CourseType::Learning,
            default_exam_config: None,
            chapters: vec![ChapterManifest {
                    code: None,
                    title: "Intro".to_string(),
                    file: "01-Intro Chapter.md".to_string(),
                    sort_order: 1,
                    markdown: "# Intro".to_string(),
            }],
        }
    }

    #[test]
    fn chapter_code_falls_back_to_normalized_filename_stem() {
        let code = derive_chapter_code(&manifest().chapters[0]);
        assert_eq!(code, "01_intro_chapter");
    }

    #[test]
    fn chapter_code_falls_back_to_sort_order_when_stem_is_empty() {
        let m = ChapterManifest {
            code: None,
            title: "x".to_string(),
            file: "___.md".to_string(),
            sort_order: 3,
            markdown: String::new(),
        };
        assert_eq!(derive_chapter_code(&m), "chapter_3");
    }

    #[tokio::test]
    async fn import_is_idempotent_on_course_and_chapter_code() {
        let course_id = uuid::Uuid::new_v4();
        let chapter_id = uuid::Uuid::new_v4();

        let mut content = MockContentRepository::new();
        content
            .expect_get_course_by_code()
            .returning(move |code| {
                Ok(Some(Course {
                            id: course_id,
                            code: code.to_string(),
                            title: "Algebra I".to_string(),
                            course_type: CourseType::Learning,
                            default_exam_config: None,
                            active_kb_version: 2,
                }))
        });
        content.expect_upsert_course().returning(|_| Ok(()));
        content.expect_get_chapter_by_code().returning(move |_, code| {
                Ok(Some(Chapter {
                            id: chapter_id,
                            code: code.to_string(),
                            course_id,
                            title: "old title".to_string(),
                            sort_order: 1,
                            markdown_content: "old".to_string(),
                }))
        });
        content.expect_upsert_chapter().returning(|_| Ok(()));

        let vector_store = Arc::new(InMemoryVectorStore::new());
        let service = CourseImportService::new(Arc::new(content), vector_store, "local");

        let report = service.import(manifest()).await.unwrap();
        assert_eq!(report.course_id, course_id);
        assert_eq!(report.chapters[0].chapter_id, chapter_id);
        assert_eq!(report.chapters[0].chunks_rebound, 0);
    }

    #[tokio::test]
    async fn deferred_chunks_are_rebound_without_reembedding() {
        let course_id = uuid::Uuid::new_v4();
        let chapter_id = uuid::Uuid::new_v4();

        let mut content = MockContentRepository::new();
        content.expect_get_course_by_code().returning(|_| Ok(None));
        content.expect_upsert_course().returning(|_| Ok(()));
        content.expect_get_chapter_by_code().returning(|_, _| Ok(None));
        content.expect_upsert_chapter().returning(|_| Ok(()));

        let vector_store = Arc::new(InMemoryVectorStore::new());
        let pre_chunk = lp_domain::Chunk {
            chunk_id: "c1".to_string(),
            text: "pre-indexed content".to_string(),
            embedding: vec![1.0, 0.0],
            metadata: lp_domain::ChunkMetadata {
                course_code: "algebra-101".to_string(),
                chapter_code: "01_intro_chapter".to_string(),
                source_file: "01-Intro Chapter.md".to_string(),
                position: 0,
                content_type: lp_domain::ContentType::Paragraph,
                char_count: 20,
                estimated_tokens: 10,
                token_level: lp_domain::TokenLevel::Normal,
                strategy_version: lp_rag::CHUNK_STRATEGY_VERSION.to_string(),
                indexed_at: chrono::Utc::now(),
                kb_version: 1,
                summary_failed: false,
                original_code: None,
                db_course_id: None,
                db_chapter_id: None,
            },
        };
        vector_store
            .upsert("course_local_algebra-101", vec![pre_chunk])
            .await
            .unwrap();

        let service = CourseImportService::new(Arc::new(content), vector_store.clone(), "local");
        let report = service.import(manifest()).await.unwrap();
        assert_eq!(report.chapters[0].chunks_rebound, 1);

        let hits = vector_store
            .search(
            "course_local_algebra-101",
            &[1.0, 0.0],
            1,
            None,
            &MetadataFilter::default(),
        )
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.db_course_id, Some(course_id));
        assert_eq!(hits[0].metadata.db_chapter_id, Some(chapter_id));
    }
}
