//! Operator CLI: course import, reindex, and a review-session dry
//! run, run straight against the storage and RAG crates with no server in
//! front of them, talking to the local stack directly rather than an HTTP
//! API.

mod manifest;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use lp_config::AppConfig;
use lp_core::{ContentRepository, CourseImportService, QuestionSelector, ReindexRunner};
use lp_rag::{
    ChunkingConfig, ChunkingEngine, CodeBlockProcessor, CodeBlockStrategy, EmbeddingGateway,
    InMemoryVectorStore, LocalEmbeddingProvider, PassthroughSummarizer, RagService,
};
use lp_storage::{init_sqlite, SqliteContentRepository, SqliteRecordRepository};

#[derive(Parser)]
#[command(name = "lp")]
#[command(about = "Learning platform operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a course manifest and its chapters' Markdown.
    Import {
        /// Path to the course's `course.json`.
        manifest: std::path::PathBuf,
    },
    /// Reindex every chapter of a course into the next kb_version, flipping
    /// `active_kb_version` and purging legacy chunks only once all chapters
    /// succeed.
    Reindex {
        /// Collection source tag (e.g. "local").
        source: String,
        course_code: String,
    },
    /// Print the selector's tier-1/tier-2 picks without creating a batch.
    ReviewDryRun {
        user_id: String,
        course_code: String,
        size: usize,
    },
    /// Print the system-status contract.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Import { manifest } => run_import(&config, &manifest).await,
        Commands::Reindex { source, course_code } => run_reindex(&config, &source, &course_code).await,
        Commands::ReviewDryRun {
            user_id,
            course_code,
            size,
        } => run_review_dry_run(&config, &user_id, &course_code, size).await,
        Commands::Status => run_status(&config).await,
    }
}

fn build_rag_service() -> RagService<LocalEmbeddingProvider, PassthroughSummarizer, InMemoryVectorStore> {
    let chunking = ChunkingEngine::new(ChunkingConfig::default());
    let code_processor = CodeBlockProcessor::new(CodeBlockStrategy::default(), PassthroughSummarizer::default());
    let embeddings = Arc::new(EmbeddingGateway::new(LocalEmbeddingProvider));
    let vector_store = Arc::new(InMemoryVectorStore::default());
    RagService::new(chunking, code_processor, embeddings, vector_store)
}

async fn run_import(config: &AppConfig, manifest_path: &std::path::Path) -> anyhow::Result<()> {
    let pool = init_sqlite(&config.relational_db_url).await?;
    let content_repo = Arc::new(SqliteContentRepository::new(pool));
    let vector_store = Arc::new(InMemoryVectorStore::default());
    let import = CourseImportService::new(content_repo, vector_store, "local");

    let course_manifest = manifest::load(manifest_path)?;
    let report = import.import(course_manifest).await?;

    println!("imported course {}", report.course_id);
    for chapter in &report.chapters {
        println!(
            " chapter {} ({}) - {} chunks rebound",
            chapter.chapter_code, chapter.chapter_id, chapter.chunks_rebound
        );
    }
    Ok(())
}

async fn run_reindex(config: &AppConfig, source: &str, course_code: &str) -> anyhow::Result<()> {
    let pool = init_sqlite(&config.relational_db_url).await?;
    let content_repo: Arc<dyn ContentRepository> = Arc::new(SqliteContentRepository::new(pool));

    let rag = Arc::new(build_rag_service());
    // The readiness gate inside `reindex_chapter` refuses with `RAG_NOT_READY`
    // until the embedding provider has been probed at least once.
    rag.probe_startup().await;

    let runner = ReindexRunner::new(content_repo, rag, source);
    let report = runner.run(course_code).await.map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "reindexed course {} to kb_version {} ({} chunks purged)",
        report.course_id, report.new_kb_version, report.chunks_purged
    );
    for chapter in &report.chapters {
        println!(
            " chapter {}: {} chunks ({} summary failures)",
            chapter.chapter_code, chapter.chunks_indexed, chapter.chunks_with_summary_failures
        );
    }
    Ok(())
}

async fn run_review_dry_run(
    config: &AppConfig,
    user_id: &str,
    course_code: &str,
    size: usize,
) -> anyhow::Result<()> {
    let pool = init_sqlite(&config.relational_db_url).await?;
    let content_repo = Arc::new(SqliteContentRepository::new(pool.clone()));
    let record_repo = Arc::new(SqliteRecordRepository::new(pool));

    let course = content_repo
        .get_course_by_code(course_code)
        .await?
        .ok_or_else(|| anyhow::anyhow!("unknown course code {course_code}"))?;

    let selector = QuestionSelector::new(content_repo, record_repo);
    let picks = selector
        .select(user_id, course.id, size, false)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("dry run for {user_id} / {course_code}: {} question(s)", picks.len());
    for id in picks {
        println!(" {id}");
    }
    Ok(())
}

async fn run_status(config: &AppConfig) -> anyhow::Result<()> {
    let rag = build_rag_service();
    rag.probe_startup().await;
    let status = lp_api::SystemStatus::new(rag.embedding_status(), rag.reranker_identity());
    println!("{}", serde_json::to_string_pretty(&status)?);
    println!("configured embedding provider: {}", config.embedding_provider);
    println!("configured llm provider: {}", config.llm_provider);
    Ok(())
}
