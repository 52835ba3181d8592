//! In-memory vector index (reference backend).

use crate::embedding::cosine_similarity;
use crate::models::{ChunkId, DocumentChunk, ScoredChunk};
use crate::storage::traits::{VectorFilter, VectorIndex};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Exhaustive cosine-scan vector index.
///
/// Suitable for tests and small corpora; production deployments put an ANN
/// store behind the same trait.
pub struct InMemoryVectorIndex {
    dimensions: usize,
    chunks: RwLock<HashMap<ChunkId, DocumentChunk>>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index for `dimensions`-length embeddings.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    fn read_guard(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ChunkId, DocumentChunk>> {
        self.chunks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_guard(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<ChunkId, DocumentChunk>> {
        self.chunks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, chunk: DocumentChunk) -> Result<()> {
        if chunk.embedding.len() != self.dimensions {
            return Err(Error::OperationFailed {
                operation: "vector_upsert".to_string(),
                cause: format!(
                    "embedding has {} dimensions, index expects {}",
                    chunk.embedding.len(),
                    self.dimensions
                ),
            });
        }
        self.write_guard().insert(chunk.id.clone(), chunk);
        Ok(())
    }

    async fn remove(&self, id: &ChunkId) -> Result<bool> {
        Ok(self.write_guard().remove(id).is_some())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let guard = self.read_guard();
        let mut scored: Vec<ScoredChunk> = guard
            .values()
            .filter(|chunk| filter.matches_domain(chunk.domain.as_ref()))
            .map(|chunk| ScoredChunk {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                domain: chunk.domain.clone(),
                source: chunk.source.clone(),
                entity_refs: chunk.entity_refs.clone(),
                score: cosine_similarity(query_embedding, &chunk.embedding),
            })
            .filter(|hit| filter.min_score.is_none_or(|min| hit.score >= min))
            .collect();
        drop(guard);

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_guard().len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::models::{DomainTag, SourceRef};

    fn chunk(id: &str, text: &str, domain: Option<&str>, embedder: &HashEmbedder) -> DocumentChunk {
        DocumentChunk {
            id: ChunkId::new(id),
            text: text.to_string(),
            domain: domain.map(DomainTag::new),
            source: SourceRef::new("eur-lex"),
            entity_refs: Vec::new(),
            embedding: embedder.embed(text).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_search_roundtrip() {
        let embedder = HashEmbedder::new();
        let index = InMemoryVectorIndex::new(embedder.dimensions());
        index
            .upsert(chunk("c1", "data retention schedule gdpr", Some("gdpr"), &embedder))
            .await
            .unwrap();
        index
            .upsert(chunk("c2", "incident response runbook", Some("soc2"), &embedder))
            .await
            .unwrap();

        let query = embedder.embed("gdpr data retention").unwrap();
        let hits = index.search(&query, &VectorFilter::new(), 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id.as_str(), "c1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_domain_filter() {
        let embedder = HashEmbedder::new();
        let index = InMemoryVectorIndex::new(embedder.dimensions());
        index
            .upsert(chunk("c1", "retention", Some("gdpr"), &embedder))
            .await
            .unwrap();
        index
            .upsert(chunk("c2", "retention", Some("soc2"), &embedder))
            .await
            .unwrap();

        let query = embedder.embed("retention").unwrap();
        let filter = VectorFilter::new().with_domain(DomainTag::new("gdpr"));
        let hits = index.search(&query, &filter, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "c1");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryVectorIndex::new(8);
        let embedder = HashEmbedder::with_dimensions(16);
        let result = index
            .upsert(chunk("c1", "text", None, &embedder))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remove() {
        let embedder = HashEmbedder::new();
        let index = InMemoryVectorIndex::new(embedder.dimensions());
        index
            .upsert(chunk("c1", "text here", None, &embedder))
            .await
            .unwrap();
        assert!(index.remove(&ChunkId::new("c1")).await.unwrap());
        assert!(!index.remove(&ChunkId::new("c1")).await.unwrap());
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
