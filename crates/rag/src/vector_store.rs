//! Vector store adapter.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lp_domain::{Chunk, ContentType};

use crate::chunking::CHUNK_STRATEGY_VERSION;

#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub course_code: Option<String>,
    pub chapter_code: Option<String>,
    pub content_type: Option<ContentType>,
    pub strategy_version: Option<String>,
    pub kb_version: Option<i64>,
}

impl MetadataFilter {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(c) = &self.course_code {
            if &chunk.metadata.course_code != c {
                return false;
            }
        }
        if let Some(c) = &self.chapter_code {
            if &chunk.metadata.chapter_code != c {
                return false;
            }
        }
        if let Some(ct) = self.content_type {
            if chunk.metadata.content_type != ct {
                return false;
            }
        }
        if let Some(v) = &self.strategy_version {
            if &chunk.metadata.strategy_version != v {
                return false;
            }
        }
        if let Some(v) = self.kb_version {
            if chunk.metadata.kb_version != v {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorHit {
    pub chunk_id: String,
    pub text: String,
    pub score: f64,
    pub source_file: String,
    pub metadata: lp_domain::ChunkMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("collection name collision: {requested} sanitizes to the same name as an existing, different collection")]
    CollectionNameCollision { requested: String },
    #[error("collection is empty: {0}")]
    CollectionEmpty(String),
    #[error("vector store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

/// Operations required by the RAG service.
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    async fn upsert(&self, collection: &str, chunks: Vec<Chunk>) -> Result<()>;
    async fn delete_by_metadata(&self, collection: &str, filter: &MetadataFilter) -> Result<u64>;
    #[allow(clippy::too_many_arguments)]
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: Option<f64>,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>>;
    async fn count(&self, collection: &str, filter: Option<&MetadataFilter>) -> Result<u64>;
    async fn list_version_stats(&self, collection: &str) -> Result<HashMap<i64, u64>>;
    /// Backfills `db_course_id`/`db_chapter_id` on chunks matching `filter`
    /// without touching text or embedding. Returns the number of chunks updated.
    async fn backfill_ids(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        db_course_id: uuid::Uuid,
        db_chapter_id: uuid::Uuid,
    ) -> Result<u64>;
}

/// Sanitizes a raw name to `[A-Za-z0-9._-]+`, substituting disallowed runes
/// with `_`. Callers are responsible for collision detection
/// against the registry of names already minted (see
/// `InMemoryVectorStore::collection_name`).
pub fn sanitize_collection_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// `collection name = course_{source}_{course_code}`.
pub fn collection_name(source: &str, course_code: &str) -> String {
    sanitize_collection_name(&format!("course_{source}_{course_code}"))
}

/// Reference implementation backing tests and small deployments: an
/// in-process store behind a single lock, for data that doesn't warrant
/// its own service.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<Chunk>>>,
    /// sanitized name -> the raw name that minted it, for collision
    /// detection.
    name_registry: RwLock<HashMap<String, String>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `raw_name` under its sanitized form, refusing if a
    /// *different* raw name already claims that sanitized slot.
    pub fn register_collection(&self, raw_name: &str) -> Result<String> {
        let sanitized = sanitize_collection_name(raw_name);
        let mut registry = self.name_registry.write().unwrap();
        match registry.get(&sanitized) {
            Some(existing) if existing != raw_name => Err(VectorStoreError::CollectionNameCollision {
                requested: raw_name.to_string(),
            }),
            _ => {
                registry.insert(sanitized.clone(), raw_name.to_string());
                Ok(sanitized)
            }
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    // Map cosine similarity [-1, 1] to a [0, 1] score where 1 is best.
    (((dot / (na * nb)) as f64) + 1.0) / 2.0
}

#[async_trait]
impl VectorStoreAdapter for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, chunks: Vec<Chunk>) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let entry = collections.entry(collection.to_string()).or_default();
        for chunk in chunks {
            if let Some(existing) = entry.iter_mut().find(|c| c.chunk_id == chunk.chunk_id) {
                *existing = chunk;
            } else {
                entry.push(chunk);
            }
        }
        Ok(())
    }

    async fn delete_by_metadata(&self, collection: &str, filter: &MetadataFilter) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entry.len();
        entry.retain(|c| !filter.matches(c));
        Ok((before - entry.len()) as u64)
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: Option<f64>,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>> {
        let collections = self.collections.read().unwrap();
        let Some(entry) = collections.get(collection) else {
            return Err(VectorStoreError::CollectionEmpty(collection.to_string()));
        };
        if entry.is_empty() {
            return Err(VectorStoreError::CollectionEmpty(collection.to_string()));
        }

        let mut scored: Vec<VectorHit> = entry
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| VectorHit {
                chunk_id: c.chunk_id.clone(),
                text: c.text.clone(),
                score: cosine_similarity(query_vector, &c.embedding),
                source_file: c.metadata.source_file.clone(),
                metadata: c.metadata.clone(),
            })
            .filter(|hit| score_threshold.is_none_or(|t| hit.score >= t))
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, collection: &str, filter: Option<&MetadataFilter>) -> Result<u64> {
        let collections = self.collections.read().unwrap();
        let Some(entry) = collections.get(collection) else {
            return Ok(0);
        };
        Ok(match filter {
            Some(f) => entry.iter().filter(|c| f.matches(c)).count() as u64,
            None => entry.len() as u64,
        })
    }

    async fn list_version_stats(&self, collection: &str) -> Result<HashMap<i64, u64>> {
        let collections = self.collections.read().unwrap();
        let mut stats = HashMap::new();
        if let Some(entry) = collections.get(collection) {
            for chunk in entry {
                *stats.entry(chunk.metadata.kb_version).or_insert(0u64) += 1;
            }
        }
        Ok(stats)
    }

    async fn backfill_ids(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        db_course_id: uuid::Uuid,
        db_chapter_id: uuid::Uuid,
    ) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0u64;
        for chunk in entry.iter_mut().filter(|c| filter.matches(c)) {
            chunk.metadata.db_course_id = Some(db_course_id);
            chunk.metadata.db_chapter_id = Some(db_chapter_id);
            updated += 1;
        }
        Ok(updated)
    }
}

/// The default `filter_legacy=true` restriction: only chunks at
/// the current strategy version and a given kb_version survive.
pub fn legacy_filter(kb_version: i64) -> MetadataFilter {
    MetadataFilter {
        strategy_version: Some(CHUNK_STRATEGY_VERSION.to_string()),
        kb_version: Some(kb_version),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(id: &str, kb_version: i64, embedding: Vec<f32>) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            text: "text".into(),
            embedding,
            metadata: lp_domain::ChunkMetadata {
                course_code: "c1".into(),
                chapter_code: "ch1".into(),
                source_file: "ch1.md".into(),
                position: 0,
                content_type: ContentType::Paragraph,
                char_count: 4,
                estimated_tokens: 2,
                token_level: lp_domain::TokenLevel::Normal,
                strategy_version: CHUNK_STRATEGY_VERSION.to_string(),
                indexed_at: Utc::now(),
                kb_version,
                summary_failed: false,
                original_code: None,
                db_course_id: None,
                db_chapter_id: None,
            },
        }
    }

    #[tokio::test]
    async fn search_only_returns_the_filtered_version() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "col",
                vec![chunk("a", 3, vec![1.0, 0.0]), chunk("b", 4, vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let hits = store
            .search("col", &[1.0, 0.0], 10, None, &legacy_filter(4))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "b");
    }

    #[tokio::test]
    async fn backfill_ids_updates_matching_chunks_without_touching_embeddings() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("col", vec![chunk("a", 1, vec![1.0, 0.0])])
            .await
            .unwrap();

        let db_course_id = uuid::Uuid::new_v4();
        let db_chapter_id = uuid::Uuid::new_v4();
        let updated = store
            .backfill_ids("col", &MetadataFilter::default(), db_course_id, db_chapter_id)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let hits = store
            .search("col", &[1.0, 0.0], 10, None, &MetadataFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.db_course_id, Some(db_course_id));
        assert_eq!(hits[0].metadata.db_chapter_id, Some(db_chapter_id));
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn empty_collection_search_fails() {
        let store = InMemoryVectorStore::new();
        let err = store
            .search("missing", &[1.0], 10, None, &MetadataFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionEmpty(_)));
    }

    #[test]
    fn sanitize_replaces_disallowed_runes() {
        assert_eq!(sanitize_collection_name("course/a b"), "course_a_b");
    }

    #[test]
    fn collection_collision_is_refused_not_merged() {
        let store = InMemoryVectorStore::new();
        store.register_collection("course_local_algebra-101").unwrap();
        // A different raw name that happens to sanitize to the same slot.
        let err = store
            .register_collection("course_local_algebra_101")
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNameCollision { .. }));
    }
}
