//! Deterministic local providers for `EMBEDDING_PROVIDER=local` / dev mode
//!. No network call, no
//! API key — a hash-based embedding and a passthrough summarizer so the
//! pipeline is exercisable offline. Swap in a vendor-backed
//! [`EmbeddingProvider`]/[`Summarizer`] for anything beyond local dev.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::code_block::Summarizer;
use crate::embedding::{EmbeddingProvider, ProviderIdentity};

const LOCAL_EMBEDDING_DIM: usize = 32;

/// Hashes each text into a fixed-width, L2-normalizable float vector.
/// Deterministic and collision-resistant enough for dev/test corpora; not a
/// semantic embedding, so it has no business scoring relevance in anything
/// beyond a smoke test.
pub struct LocalEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            provider: "local".to_string(),
            model: "sha256-hash".to_string(),
        }
    }

    fn batch_limit(&self) -> usize {
        256
    }

    async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }

    async fn probe(&self) -> bool {
        true
    }
}

fn hash_embed(text: &str) -> Vec<f32> {
    let mut vec = Vec::with_capacity(LOCAL_EMBEDDING_DIM);
    let mut block = text.as_bytes().to_vec();
    while vec.len() < LOCAL_EMBEDDING_DIM {
        let digest = Sha256::digest(&block);
        for byte in digest.iter() {
            if vec.len() == LOCAL_EMBEDDING_DIM {
                break;
            }
            vec.push((*byte as f32 / 255.0) * 2.0 - 1.0);
        }
        block = digest.to_vec();
    }
    vec
}

/// Returns the code unmodified, truncated to a fixed length; never fails.
pub struct PassthroughSummarizer {
    pub max_len: usize,
}

impl Default for PassthroughSummarizer {
    fn default() -> Self {
        Self { max_len: 200 }
    }
}

#[async_trait]
impl Summarizer for PassthroughSummarizer {
    async fn summarize_code(&self, code: &str) -> anyhow::Result<String> {
        Ok(code.chars().take(self.max_len).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedding_is_deterministic_and_fixed_width() {
        let provider = LocalEmbeddingProvider;
        let a = provider
            .encode_batch(&["same text".to_string()])
            .await
            .unwrap();
        let b = provider
            .encode_batch(&["same text".to_string()])
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), LOCAL_EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn passthrough_summarizer_never_fails() {
        let summarizer = PassthroughSummarizer::default();
        let out = summarizer.summarize_code("fn main() {}").await.unwrap();
        assert_eq!(out, "fn main() {}");
    }
}
