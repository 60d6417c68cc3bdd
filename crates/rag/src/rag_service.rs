//! RAG service: binds chunking, code
//! processing, embedding, and the vector store into one versioned pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use lp_domain::{Chunk, CoreError, ErrorCode};
use tracing::instrument;

use crate::chunking::ChunkingEngine;
use crate::code_block::{CodeBlockProcessor, Summarizer};
use crate::embedding::EmbeddingGateway;
use crate::embedding::EmbeddingProvider;
use crate::vector_store::{collection_name, legacy_filter, MetadataFilter, VectorHit, VectorStoreAdapter};
use lp_domain::ContentType;

#[derive(Debug, Clone)]
pub struct RerankerIdentity {
    pub provider: String,
    pub model: String,
}

/// Optional reranking pass over the top `k * 2` retrieval hits. Unlike the embedding provider this is genuinely
/// optional — a `RagService` with no reranker just truncates to `k`.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn identity(&self) -> RerankerIdentity;
    async fn rerank(&self, query: &str, hits: Vec<VectorHit>) -> anyhow::Result<Vec<VectorHit>>;
}

pub struct IndexRequest {
    pub source: String,
    pub course_code: String,
    pub chapter_code: String,
    pub source_file: String,
    pub markdown: String,
    /// The version this reindex will become active as once it completes.
    pub new_kb_version: i64,
}

pub struct IndexReport {
    pub collection: String,
    pub chunks_indexed: usize,
    pub chunks_with_summary_failures: usize,
}

/// Binds the chunking engine, code block processor, embedding gateway, and
/// vector store into one versioned reindex-and-retrieve pipeline.
pub struct RagService<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> {
    chunking: ChunkingEngine,
    code_processor: CodeBlockProcessor<S>,
    embeddings: Arc<EmbeddingGateway<P>>,
    vector_store: Arc<V>,
    /// Absent unless a reranker is configured.
    reranker: Option<Arc<dyn Reranker>>,
}

impl<P: EmbeddingProvider, S: Summarizer, V: VectorStoreAdapter> RagService<P, S, V> {
    pub fn new(
        chunking: ChunkingEngine,
        code_processor: CodeBlockProcessor<S>,
        embeddings: Arc<EmbeddingGateway<P>>,
        vector_store: Arc<V>,
    ) -> Self {
        Self {
            chunking,
            code_processor,
            embeddings,
            vector_store,
            reranker: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn reranker_identity(&self) -> Option<RerankerIdentity> {
        self.reranker.as_ref().map(|r| r.identity())
    }

    /// Runs and caches the embedding provider's startup probe.
    /// Call once at process startup, before the first `system-status` read.
    pub async fn probe_startup(&self) -> crate::embedding::EmbeddingStatus {
        self.embeddings.probe_startup().await
    }

    /// The cached embedding availability; never re-probes.
    pub fn embedding_status(&self) -> crate::embedding::EmbeddingStatus {
        self.embeddings.status()
    }

    /// §6 "All RAG write paths MUST check `ready` and refuse otherwise with
    /// `RAG_NOT_READY`": `ready` is defined as embedding availability, so
    /// every write path (reindex) gates on the same cached probe the
    /// system-status contract reports.
    fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.embeddings.status().available {
            Ok(())
        } else {
            Err(CoreError::rag_not_ready("embedding provider is not available"))
        }
    }

    /// Runs a full reindex of one chapter into a new `kb_version`: chunk, process code blocks, embed, and upsert into the
    /// `course_{source}_{course_code}` collection. Callers flip
    /// `Course::active_kb_version` only after this returns `Ok` — the
    /// service itself never touches course activation state.
    #[instrument(skip(self, request), fields(course_code = %request.course_code, chapter_code = %request.chapter_code))]
    pub async fn reindex_chapter(&self, request: IndexRequest) -> Result<IndexReport, CoreError> {
        self.ensure_ready()?;

        let collection = collection_name(&request.source, &request.course_code);

        let raw_chunks = self.chunking.chunk(&request.markdown);
        let mut summary_failures = 0usize;
        let mut processed = Vec::with_capacity(raw_chunks.len());
        for raw in raw_chunks {
            if raw.content_type == ContentType::CodeBlock {
                let outcome = self.code_processor.process(raw).await;
                if outcome.summary_failed {
                    summary_failures += 1;
                }
                processed.push((outcome.chunk, outcome.original_code, outcome.summary_failed));
            } else {
                processed.push((raw, None, false));
            }
        }

        let texts: Vec<String> = processed.iter().map(|(c, _, _)| c.text.clone()).collect();
        let embeddings = self.embeddings.encode(&texts).await?;

        let chunks: Vec<Chunk> = processed
            .into_iter()
            .zip(embeddings)
            .map(|((raw, original_code, summary_failed), embedding)| {
                let mut metadata = self.chunking.attach_metadata(
                    &raw,
                    &request.course_code,
                    &request.chapter_code,
                    &request.source_file,
                    request.new_kb_version,
                );
                metadata.summary_failed = summary_failed;
                metadata.original_code = original_code;
                self.chunking.build_chunk(&raw, embedding, metadata)
            })
            .collect();

        let chunks_indexed = chunks.len();
        self.vector_store
            .upsert(&collection, chunks)
            .await
            .map_err(|e| CoreError::new(ErrorCode::InternalError, e.to_string()))?;

        Ok(IndexReport {
            collection,
            chunks_indexed,
            chunks_with_summary_failures: summary_failures,
        })
    }

    /// Purges chunks at a version strictly older than `keep_from_version`
    /// for a chapter. Call after activation has
    /// flipped, never before.
    pub async fn purge_legacy(
        &self,
        source: &str,
        course_code: &str,
        chapter_code: &str,
        keep_from_version: i64,
    ) -> Result<u64, CoreError> {
        let collection = collection_name(source, course_code);
        let mut removed = 0u64;
        let stats = self
            .vector_store
            .list_version_stats(&collection)
            .await
            .map_err(|e| CoreError::new(ErrorCode::InternalError, e.to_string()))?;
        for version in stats.keys().filter(|v| **v < keep_from_version) {
            let filter = MetadataFilter {
                chapter_code: Some(chapter_code.to_string()),
                kb_version: Some(*version),
                ..Default::default()
            };
            removed += self
                .vector_store
                .delete_by_metadata(&collection, &filter)
                .await
                .map_err(|e| CoreError::new(ErrorCode::InternalError, e.to_string()))?;
        }
        Ok(removed)
    }

    /// Retrieves the `top_k` chunks most relevant to `query` within a course
    /// at its currently active kb version. `filter_legacy`
    /// defaults to true at the caller: pass the course's
    /// `active_kb_version` to restrict results to the live index.
    #[instrument(skip(self, query), fields(course_code = %course_code))]
    pub async fn retrieve(
        &self,
        source: &str,
        course_code: &str,
        active_kb_version: i64,
        query: &str,
        top_k: usize,
        score_threshold: Option<f64>,
    ) -> Result<Vec<VectorHit>, CoreError> {
        let collection = collection_name(source, course_code);
        let query_vec = self
            .embeddings
            .encode(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::new(ErrorCode::InternalError, "embedding gateway returned no vector"))?;

        let mut filter = legacy_filter(active_kb_version);
        filter.course_code = Some(course_code.to_string());

        // Step 4: with a reranker configured, over-fetch
        // `top_k * 2` and let it re-order before truncating; otherwise
        // search already returns ranked, truncated-to-`top_k` hits.
        let fetch_k = if self.reranker.is_some() { top_k * 2 } else { top_k };

        let hits = self
            .vector_store
            .search(&collection, &query_vec, fetch_k, score_threshold, &filter)
            .await
            .map_err(|e| match e {
                crate::vector_store::VectorStoreError::CollectionEmpty(_) => {
                    CoreError::new(ErrorCode::CollectionEmpty, e.to_string())
                }
                other => CoreError::new(ErrorCode::InternalError, other.to_string()),
            })?;

        let mut hits = match &self.reranker {
            Some(reranker) => reranker
                .rerank(query, hits)
                .await
                .map_err(|e| CoreError::new(ErrorCode::InternalError, e.to_string()))?,
            None => hits,
        };
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::code_block::CodeBlockStrategy;
    use crate::embedding::ProviderIdentity;
    use crate::vector_store::InMemoryVectorStore;
    use async_trait::async_trait;

    struct FixedProvider;
    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn identity(&self) -> ProviderIdentity {
            ProviderIdentity {
                provider: "test".into(),
                model: "test-embed".into(),
            }
        }
        fn batch_limit(&self) -> usize {
            16
        }
        async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        async fn probe(&self) -> bool {
            true
        }
    }

    struct Echo;
    #[async_trait]
    impl Summarizer for Echo {
        async fn summarize_code(&self, code: &str) -> anyhow::Result<String> {
            Ok(format!("summary of {} bytes", code.len()))
        }
    }

    async fn service() -> RagService<FixedProvider, Echo, InMemoryVectorStore> {
        let gateway = Arc::new(EmbeddingGateway::new(FixedProvider));
        gateway.probe_startup().await;
        RagService::new(
            ChunkingEngine::new(ChunkingConfig::default()),
            CodeBlockProcessor::new(CodeBlockStrategy::Preserve, Echo),
            gateway,
            Arc::new(InMemoryVectorStore::new()),
        )
    }

    #[tokio::test]
    async fn reindex_then_retrieve_round_trips() {
        let svc = service().await;
        let report = svc
            .reindex_chapter(IndexRequest {
                source: "local".into(),
                course_code: "algebra-101".into(),
                chapter_code: "ch1".into(),
                source_file: "ch1.md".into(),
                markdown: "# Intro\n\nSome paragraph text about algebra.".into(),
                new_kb_version: 1,
            })
            .await
            .unwrap();
        assert!(report.chunks_indexed >= 1);

        let hits = svc
            .retrieve("local", "algebra-101", 1, "algebra", 5, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn retrieve_is_scoped_to_the_active_version() {
        let svc = service().await;
        svc.reindex_chapter(IndexRequest {
            source: "local".into(),
            course_code: "algebra-101".into(),
            chapter_code: "ch1".into(),
            source_file: "ch1.md".into(),
            markdown: "# Intro\n\nold content here".into(),
            new_kb_version: 1,
        })
        .await
        .unwrap();
        svc.reindex_chapter(IndexRequest {
            source: "local".into(),
            course_code: "algebra-101".into(),
            chapter_code: "ch1".into(),
            source_file: "ch1.md".into(),
            markdown: "# Intro\n\nnew content here".into(),
            new_kb_version: 2,
        })
        .await
        .unwrap();

        let hits = svc
            .retrieve("local", "algebra-101", 2, "content", 10, None)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.metadata.kb_version == 2));
    }

    /// Reverses hit order and records how many hits it was handed, so the
    /// test can assert the over-fetch (`top_k * 2`) happened.
    struct RecordingReranker {
        seen_len: std::sync::atomic::AtomicUsize,
    }
    #[async_trait]
    impl Reranker for RecordingReranker {
        fn identity(&self) -> RerankerIdentity {
            RerankerIdentity {
                provider: "test".into(),
                model: "recording-reranker".into(),
            }
        }
        async fn rerank(&self, _query: &str, mut hits: Vec<VectorHit>) -> anyhow::Result<Vec<VectorHit>> {
            self.seen_len.store(hits.len(), std::sync::atomic::Ordering::SeqCst);
            hits.reverse();
            Ok(hits)
        }
    }

    #[tokio::test]
    async fn configured_reranker_over_fetches_and_truncates_to_k() {
        let reranker = Arc::new(RecordingReranker {
            seen_len: std::sync::atomic::AtomicUsize::new(0),
        });
        let svc = service().await.with_reranker(reranker.clone());
        assert!(svc.reranker_identity().is_some());

        svc.reindex_chapter(IndexRequest {
            source: "local".into(),
            course_code: "algebra-101".into(),
            chapter_code: "ch1".into(),
            source_file: "ch1.md".into(),
            markdown: "# Intro\n\nfirst paragraph here.\n\nsecond paragraph here.\n\nthird paragraph here."
                .into(),
            new_kb_version: 1,
        })
        .await
        .unwrap();

        let top_k = 2;
        let hits = svc
            .retrieve("local", "algebra-101", 1, "paragraph", top_k, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), top_k);
        // The reranker was handed up to `top_k * 2` candidates, not just `top_k`.
        assert!(reranker.seen_len.load(std::sync::atomic::Ordering::SeqCst) > top_k);
    }

    #[tokio::test]
    async fn reindex_refuses_when_embedding_is_not_ready() {
        let gateway = Arc::new(EmbeddingGateway::new(FixedProvider));
        // Deliberately skip `probe_startup`: the gateway starts unavailable.
        let svc = RagService::new(
            ChunkingEngine::new(ChunkingConfig::default()),
            CodeBlockProcessor::new(CodeBlockStrategy::Preserve, Echo),
            gateway,
            Arc::new(InMemoryVectorStore::new()),
        );

        let err = svc
            .reindex_chapter(IndexRequest {
                source: "local".into(),
                course_code: "algebra-101".into(),
                chapter_code: "ch1".into(),
                source_file: "ch1.md".into(),
                markdown: "# Intro\n\nsome text".into(),
                new_kb_version: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, lp_domain::ErrorCode::RagNotReady);
    }
}
