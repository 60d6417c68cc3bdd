//! The one binding point between storage, the service layer, RAG, and the
//! agent runtime: a single struct the external surface (HTTP handlers, the
//! CLI) holds an `Arc` of and never constructs its own service instances
//! from.

use std::sync::Arc;

use lp_agent::AgentRuntime;
use lp_core::{
    BatchManager, BatchRepository, ContentRepository, CourseImportService, KbConfigRepository,
    LearningRecordService, MistakesService, QuestionSelector, ReindexRunner, RecordRepository,
};
use lp_rag::{EmbeddingProvider, RagService, Summarizer, VectorStoreAdapter};

use crate::system_status::SystemStatus;

/// Bound together once at process startup and shared (via `Arc`) across
/// every request/task the process serves.
pub struct AppState<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> {
    pub content_repo: Arc<dyn ContentRepository>,
    pub record_repo: Arc<dyn RecordRepository>,
    pub batch_repo: Arc<dyn BatchRepository>,
    pub kb_config_repo: Arc<dyn KbConfigRepository>,

    pub batch_manager: Arc<BatchManager>,
    pub selector: Arc<QuestionSelector>,
    pub learning_records: Arc<LearningRecordService>,
    pub mistakes: Arc<MistakesService>,
    pub course_import: Arc<CourseImportService<V>>,
    pub rag: Arc<RagService<P, S, V>>,
    pub reindex_runner: Arc<ReindexRunner<P, S, V>>,
    pub agent_runtime: Arc<AgentRuntime>,
}

impl<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> AppState<P, S, V> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        record_repo: Arc<dyn RecordRepository>,
        batch_repo: Arc<dyn BatchRepository>,
        kb_config_repo: Arc<dyn KbConfigRepository>,
        rag: Arc<RagService<P, S, V>>,
        vector_store: Arc<V>,
        import_source: impl Into<String>,
        agent_runtime: Arc<AgentRuntime>,
    ) -> Self {
        let import_source = import_source.into();
        let selector = Arc::new(QuestionSelector::new(content_repo.clone(), record_repo.clone()));
        let learning_records = Arc::new(LearningRecordService::new(
                content_repo.clone(),
                record_repo.clone(),
        ));
        let batch_manager = Arc::new(BatchManager::new(
                content_repo.clone(),
                record_repo.clone(),
                batch_repo.clone(),
                learning_records.clone(),
                selector.clone(),
        ));
        let mistakes = Arc::new(MistakesService::new(content_repo.clone(), record_repo.clone()));
        let course_import = Arc::new(CourseImportService::new(
                content_repo.clone(),
                vector_store,
                import_source.clone(),
        ));
        let reindex_runner = Arc::new(ReindexRunner::new(
                content_repo.clone(),
                rag.clone(),
                import_source,
        ));

        Self {
            content_repo,
            record_repo,
            batch_repo,
            kb_config_repo,
            batch_manager,
            selector,
            learning_records,
            mistakes,
            course_import,
            rag,
            reindex_runner,
            agent_runtime,
        }
    }

    /// Snapshot of the system-status contract. Cheap: reads the
    /// embedding gateway's cached probe result, never re-probes.
    pub fn system_status(&self) -> SystemStatus {
        SystemStatus::new(self.rag.embedding_status(), self.rag.reranker_identity())
    }
}
