//! System-status contract: `{embedding, rerank, ready}` where
//! `ready = embedding.available`. All RAG write paths check `ready` before
//! proceeding and refuse with `RAG_NOT_READY` otherwise.

use lp_domain::CoreError;
use lp_rag::EmbeddingStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStatusView {
    pub available: bool,
    pub provider: String,
    pub model: String,
    pub message: String,
}

impl From<EmbeddingStatus> for EmbeddingStatusView {
    fn from(s: EmbeddingStatus) -> Self {
        Self {
            available: s.available,
            provider: s.provider,
            model: s.model,
            message: s.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankStatusView {
    pub available: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub embedding: EmbeddingStatusView,
    pub rerank: RerankStatusView,
    pub ready: bool,
}

impl SystemStatus {
    pub fn new(embedding: EmbeddingStatus, reranker: Option<lp_rag::RerankerIdentity>) -> Self {
        let ready = embedding.available;
        let rerank = match reranker {
            Some(identity) => RerankStatusView {
                available: true,
                provider: Some(identity.provider),
                model: Some(identity.model),
                message: "ready".to_string(),
            },
            None => RerankStatusView {
                available: false,
                provider: None,
                model: None,
                message: "no reranker configured".to_string(),
            },
        };
        Self {
            embedding: embedding.into(),
            rerank,
            ready,
        }
    }

    /// Every RAG write path (indexing, reindex) must call this first.
    pub fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.ready {
            Ok(())
        } else {
            Err(CoreError::rag_not_ready(
                    "embedding provider is not available",
            ))
        }
    }
}
