//! RAG pipeline: Markdown chunking, code block processing, embedding
//! gateway, vector store adapter, and the versioned index/retrieve service
//! that binds them.

pub mod chunking;
pub mod code_block;
pub mod embedding;
pub mod local_provider;
pub mod rag_service;
pub mod vector_store;

pub use chunking::{ChunkingConfig, ChunkingEngine, RawChunk, CHUNK_STRATEGY_VERSION};
pub use code_block::{CodeBlockProcessor, CodeBlockStrategy, ProcessedCodeBlock, Summarizer};
pub use embedding::{EmbeddingGateway, EmbeddingProvider, EmbeddingStatus, ProviderIdentity, l2_normalize};
pub use local_provider::{LocalEmbeddingProvider, PassthroughSummarizer};
pub use rag_service::{IndexReport, IndexRequest, RagService, Reranker, RerankerIdentity};
pub use vector_store::{
    collection_name, legacy_filter, sanitize_collection_name, InMemoryVectorStore, MetadataFilter,
    VectorHit, VectorStoreAdapter, VectorStoreError,
};
