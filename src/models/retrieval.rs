//! Retrieval result types shared by the vector index and the hybrid engine.

use super::graph::{EntityId, Subgraph};
use super::DomainTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an embedded document chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Creates a chunk ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an authoritative source, abstracted as a registered source
/// identifier rather than a raw URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Registered source identifier (e.g. `eur-lex`, `ico-guidance`).
    pub id: String,
    /// Optional human-readable title.
    pub title: Option<String>,
}

impl SourceRef {
    /// Creates a source reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// An embedded document chunk as stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique identifier.
    pub id: ChunkId,
    /// Chunk text.
    pub text: String,
    /// Domain/framework tag for filtering.
    pub domain: Option<DomainTag>,
    /// The source this chunk was ingested from.
    pub source: SourceRef,
    /// Graph entities referenced by this chunk, the bridge between the
    /// vector index and the relationship graph.
    pub entity_refs: Vec<EntityId>,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// A chunk returned from search, with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The matched chunk (embedding omitted from results).
    pub id: ChunkId,
    /// Chunk text.
    pub text: String,
    /// Domain tag.
    pub domain: Option<DomainTag>,
    /// Source reference.
    pub source: SourceRef,
    /// Entities referenced by the chunk.
    pub entity_refs: Vec<EntityId>,
    /// Combined relevance score (0.0 to 1.0).
    pub score: f32,
}

/// Scored context returned by the hybrid retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Reranked chunks, best first.
    pub chunks: Vec<ScoredChunk>,
    /// Graph context reached from the top vector hits.
    pub graph_context: Subgraph,
    /// Retrieval confidence (0.0 to 1.0), reduced when a source degraded.
    pub confidence: f32,
    /// Distinct sources contributing to the result.
    pub sources: Vec<SourceRef>,
    /// Set when one of the two stores was unavailable.
    pub degraded: bool,
    /// Weight mass of the stores that answered: 1.0 when both did, the
    /// surviving store's weight otherwise.
    pub availability: f32,
}

impl Default for RetrievalResult {
    fn default() -> Self {
        Self {
            chunks: Vec::new(),
            graph_context: Subgraph::default(),
            confidence: 0.0,
            sources: Vec::new(),
            degraded: false,
            availability: 1.0,
        }
    }
}

impl RetrievalResult {
    /// Returns `true` when neither store contributed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.graph_context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ref_builder() {
        let source = SourceRef::new("eur-lex").with_title("EUR-Lex");
        assert_eq!(source.id, "eur-lex");
        assert_eq!(source.title.as_deref(), Some("EUR-Lex"));
    }

    #[test]
    fn test_empty_result() {
        let result = RetrievalResult::default();
        assert!(result.is_empty());
        assert!(!result.degraded);
    }
}
