//! On-disk course manifest format: JSON sibling to
//! the chapter Markdown files it lists, turned into the service layer's
//! [`CourseManifest`] once those files are read off disk.

use std::path::Path;

use anyhow::Context;
use lp_core::{ChapterManifest, CourseManifest};
use lp_domain::{CourseType, ExamConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChapterManifestFile {
    pub code: Option<String>,
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct CourseManifestFile {
    pub code: String,
    pub title: String,
    pub course_type: CourseType,
    #[serde(default)]
    pub default_exam_config: Option<ExamConfig>,
    pub chapters: Vec<ChapterManifestFile>,
}

/// Reads `manifest_path` (a `course.json`) and every chapter's Markdown
/// file, resolved relative to the manifest's own directory.
pub fn load(manifest_path: &Path) -> anyhow::Result<CourseManifest> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
    let file: CourseManifestFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing manifest {}", manifest_path.display()))?;

    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut chapters = Vec::with_capacity(file.chapters.len());
    for chapter in file.chapters {
        let chapter_path = base_dir.join(&chapter.file);
        let markdown = std::fs::read_to_string(&chapter_path)
            .with_context(|| format!("reading chapter markdown {}", chapter_path.display()))?;
        chapters.push(ChapterManifest {
                code: chapter.code,
                title: chapter.title,
                file: chapter.file,
                sort_order: chapter.sort_order,
                markdown,
        });
    }

    Ok(CourseManifest {
        code: file.code,
        title: file.title,
        course_type: file.course_type,
        default_exam_config: file.default_exam_config,
        chapters,
})
}
