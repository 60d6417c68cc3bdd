//! Course-level reindex run: the orchestrator that makes §4.7 steps 1-6 an
//! actual product path rather than loose parts. `RagService::reindex_chapter`
//! writes one chapter's chunks at a target `kb_version`; it never touches
//! course activation state. This module drives it across every chapter of a
//! course, flips `Course::active_kb_version` exactly once after all of them
//! succeed, and only then purges the chunks left behind at prior versions.

use std::sync::Arc;

use lp_domain::CoreError;
use lp_rag::{EmbeddingProvider, IndexRequest, RagService, Summarizer, VectorStoreAdapter};
use tracing::instrument;

use crate::ports::ContentRepository;

#[derive(Debug, Clone)]
pub struct ChapterReindexOutcome {
    pub chapter_code: String,
    pub chunks_indexed: usize,
    pub chunks_with_summary_failures: usize,
}

#[derive(Debug, Clone)]
pub struct CourseReindexReport {
    pub course_id: uuid::Uuid,
    pub new_kb_version: i64,
    pub chapters: Vec<ChapterReindexOutcome>,
    pub chunks_purged: u64,
}

/// Drives a full-course reindex: every chapter's Markdown is chunked,
/// embedded, and written at `new_kb_version = course.active_kb_version + 1`;
/// only once every chapter has succeeded does the course's
/// `active_kb_version` flip, and only after the flip are prior-version
/// chunks purged. A failure in any chapter returns early, leaving the old
/// version the only one ever marked active and the vector store untouched
/// beyond the partial write (scenario 5: "if chapter 4 fails, no flip
/// occurs and retrieval continues to see exactly the version-3 corpus").
pub struct ReindexRunner<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> {
    content_repo: Arc<dyn ContentRepository>,
    rag: Arc<RagService<P, S, V>>,
    source: String,
}

impl<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> ReindexRunner<P, S, V> {
    pub fn new(content_repo: Arc<dyn ContentRepository>, rag: Arc<RagService<P, S, V>>, source: impl Into<String>) -> Self {
        Self {
            content_repo,
            rag,
            source: source.into(),
        }
    }

    #[instrument(skip(self), fields(course_code = %course_code))]
    pub async fn run(&self, course_code: &str) -> Result<CourseReindexReport, CoreError> {
        let course = self
            .content_repo
            .get_course_by_code(course_code)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::course_not_found(format!("course {course_code} not found")))?;

        let new_kb_version = course.active_kb_version + 1;
        let chapters = self
            .content_repo
            .list_chapters(course.id)
            .await
            .map_err(CoreError::from)?;

        let mut chapter_reports = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            let report = self
                .rag
                .reindex_chapter(IndexRequest {
                    source: self.source.clone(),
                    course_code: course_code.to_string(),
                    chapter_code: chapter.code.clone(),
                    source_file: format!("{}.md", chapter.code),
                    markdown: chapter.markdown_content.clone(),
                    new_kb_version,
                })
                .await?;
            chapter_reports.push(ChapterReindexOutcome {
                chapter_code: chapter.code.clone(),
                chunks_indexed: report.chunks_indexed,
                chunks_with_summary_failures: report.chunks_with_summary_failures,
            });
        }

        // Every chapter wrote its new-version chunks successfully: flip
        // activation in one step, then purge what the old version left
        // behind. Nothing above this line is allowed to touch
        // `active_kb_version` — an early return via `?` above leaves it
        // untouched and the new chunks simply unreferenced.
        self.content_repo
            .set_active_kb_version(course.id, new_kb_version)
            .await
            .map_err(CoreError::from)?;

        let mut chunks_purged = 0u64;
        for chapter in &chapters {
            chunks_purged += self
                .rag
                .purge_legacy(&self.source, course_code, &chapter.code, new_kb_version)
                .await?;
        }

        Ok(CourseReindexReport {
            course_id: course.id,
            new_kb_version,
            chapters: chapter_reports,
            chunks_purged,
        })
    }
}
