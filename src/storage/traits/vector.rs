//! Vector index trait.
//!
//! Provides the abstraction over nearest-neighbor search backends. The
//! content-ingestion pipeline populates the index; the engine treats it as a
//! read-mostly store and the memory manager keeps a separate instance for
//! memory-record embeddings.
//!
//! # Implementor Notes
//!
//! - Methods take `&self` to enable sharing via `Arc<dyn VectorIndex>`;
//!   use interior mutability for mutable state.
//! - Every method is async so callers can impose timeouts and cancellation
//!   uniformly; in-process implementations simply compute inline.

use crate::models::{ChunkId, DocumentChunk, DomainTag, ScoredChunk};
use crate::Result;
use async_trait::async_trait;

/// Filter criteria for vector similarity search.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    /// Restrict matches to these domains (empty matches all).
    pub domains: Vec<DomainTag>,
    /// Minimum similarity score (0.0 to 1.0).
    pub min_score: Option<f32>,
}

impl VectorFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            domains: Vec::new(),
            min_score: None,
        }
    }

    /// Adds a domain filter.
    #[must_use]
    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domains.push(domain);
        self
    }

    /// Sets the minimum score threshold.
    #[must_use]
    pub const fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }

    /// Returns `true` when a chunk's domain passes the filter.
    #[must_use]
    pub fn matches_domain(&self, domain: Option<&DomainTag>) -> bool {
        self.domains.is_empty() || domain.is_some_and(|d| self.domains.contains(d))
    }
}

/// Trait for vector index backends.
///
/// Returns chunks with cosine similarity scores (0.0 to 1.0), ordered by
/// descending similarity.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The dimensionality of indexed embeddings.
    fn dimensions(&self) -> usize;

    /// Inserts or updates a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert operation fails.
    async fn upsert(&self, chunk: DocumentChunk) -> Result<()>;

    /// Removes a chunk by ID, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal operation fails.
    async fn remove(&self, id: &ChunkId) -> Result<bool>;

    /// Searches for the `limit` chunks most similar to `query_embedding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search operation fails.
    async fn search(
        &self,
        query_embedding: &[f32],
        filter: &VectorFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Returns the total count of indexed chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    async fn count(&self) -> Result<usize>;
}
