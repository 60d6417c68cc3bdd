pub mod batch_manager;
pub mod course_import;
pub mod learning_record_service;
pub mod mistakes_service;
pub mod reindex_runner;
pub mod selector;

pub use batch_manager::{BatchManager, ExamMode, FinishOutcome, PracticeResult};
pub use course_import::{
    ChapterImportResult, ChapterManifest, CourseImportReport, CourseImportService, CourseManifest,
    derive_chapter_code,
};
pub use learning_record_service::LearningRecordService;
pub use mistakes_service::{MistakeEntry, MistakesService};
pub use reindex_runner::{ChapterReindexOutcome, CourseReindexReport, ReindexRunner};
pub use selector::QuestionSelector;
