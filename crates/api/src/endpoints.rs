//! Thin wrapper functions over [`AppState`]: each one calls exactly one
//! service-layer operation and folds its `Result<T, CoreError>` into an
//! [`Envelope<T>`]. No business logic lives here — if a rule
//! needs to change, it changes in `lp-core`/`lp-rag`, not in this module.

use lp_agent::{Agent, AgentEvent};
use lp_core::{CourseReindexReport, ExamMode, FinishOutcome, MistakeEntry};
use lp_domain::{CoreError, Envelope, ExamConfig, QuizBatch};
use lp_rag::{EmbeddingProvider, Summarizer, VectorStoreAdapter};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app_state::AppState;

pub async fn start_practice<P, S, V>(
    state: &AppState<P, S, V>,
    user_id: &str,
    course_id: uuid::Uuid,
    size: usize,
) -> Envelope<QuizBatch>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state
        .batch_manager
        .start_practice(user_id, course_id, size)
        .await
        .into()
}

pub async fn start_exam<P, S, V>(
    state: &AppState<P, S, V>,
    user_id: &str,
    course_id: uuid::Uuid,
    config: Option<ExamConfig>,
) -> Envelope<QuizBatch>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    let mode = ExamMode::Extraction {
        config: config.unwrap_or_default(),
    };
    state
        .batch_manager
        .start_exam(user_id, course_id, mode)
        .await
        .into()
}

pub async fn submit_answer<P, S, V>(
    state: &AppState<P, S, V>,
    batch_id: uuid::Uuid,
    question_id: uuid::Uuid,
    answer: &str,
) -> Envelope<()>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state
        .batch_manager
        .submit_answer(batch_id, question_id, answer)
        .await
        .into()
}

pub async fn finish_batch<P, S, V>(
    state: &AppState<P, S, V>,
    batch_id: uuid::Uuid,
) -> Envelope<FinishOutcome>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state.batch_manager.finish(batch_id).await.into()
}

pub async fn list_mistakes<P, S, V>(
    state: &AppState<P, S, V>,
    user_id: &str,
    course_id: uuid::Uuid,
) -> Envelope<Vec<MistakeEntry>>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state.mistakes.list_mistakes(user_id, course_id).await.into()
}

pub async fn retrieve<P, S, V>(
    state: &AppState<P, S, V>,
    source: &str,
    course_code: &str,
    active_kb_version: i64,
    query: &str,
    top_k: usize,
    score_threshold: Option<f64>,
) -> Envelope<Vec<lp_rag::VectorHit>>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    let ready = state.system_status();
    if let Err(err) = ready.ensure_ready() {
        return Envelope::err(err);
    }
    state
        .rag
        .retrieve(source, course_code, active_kb_version, query, top_k, score_threshold)
        .await
        .into()
}

/// Runs a full course reindex (§4.7): every chapter is reindexed into a new
/// `kb_version`, `active_kb_version` flips only once all chapters succeed,
/// and prior-version chunks are purged after the flip. `reindex_chapter`
/// itself enforces the `RAG_NOT_READY` readiness gate before any chunking
/// or embedding begins, so a single failed chapter is enough to leave the
/// previous version fully active.
pub async fn run_course_reindex<P, S, V>(
    state: &AppState<P, S, V>,
    course_code: &str,
) -> Envelope<CourseReindexReport>
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state.reindex_runner.run(course_code).await.into()
}

/// Starts an agent run and hands back its live event stream plus the
/// cancellation token that stops it. The caller is expected to
/// drain `rx` with [`crate::sse::format_event`] (or read the raw
/// `AgentEvent`s directly) rather than this function buffering them into an
/// `Envelope` — the whole point of a stream is that it is not collected
/// up front.
pub fn run_agent<P, S, V>(
    state: &AppState<P, S, V>,
    agent: Arc<dyn Agent>,
    input: Value,
) -> (mpsc::Receiver<AgentEvent>, CancellationToken)
where
P: EmbeddingProvider,
S: Summarizer,
V: VectorStoreAdapter,
{
    state.agent_runtime.run(agent, input)
}

/// Maps a raw [`CoreError`] to its envelope directly, for call sites that
/// don't go through one of the typed wrappers above (e.g. request
/// validation failures raised before a service call is even made).
pub fn error_envelope<T>(error: CoreError) -> Envelope<T> {
    Envelope::err(error)
}
