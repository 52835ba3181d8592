//! Hybrid retrieval engine.
//!
//! Combines vector similarity search with bounded relationship-graph
//! traversal into one ranked context set:
//!
//! ```text
//! Query: "data retention obligations under GDPR"
//!     │
//!     ├──▶ VectorIndex.search() → 2×max_results candidates (domain-filtered)
//!     │
//!     └──▶ GraphStore.traverse(entity refs of top hits, 2 hops, whitelist)
//!              │
//!              ▼
//!          Subgraph with degree centrality per entity
//!     │
//!     ▼
//! Merge: combined = 0.6·similarity + 0.4·graph relatedness (configurable)
//!     │
//!     ▼
//! Lexical rerank → max_results chunks + graph context + confidence
//! ```
//!
//! Degradation is explicit: losing one store reduces confidence by that
//! store's weight and sets the `degraded` flag; losing both is a hard
//! [`Error::RetrievalUnavailable`], never an empty result with full
//! confidence.

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::models::graph::{EntityId, RelationType, Subgraph};
use crate::models::{DomainTag, RetrievalResult, ScoredChunk, SourceRef};
use crate::storage::traits::{EntityQuery, GraphStore, VectorFilter, VectorIndex};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Trait for retrieval implementations.
///
/// Callers must treat retrieval as cancellable and timeout-bound; the
/// orchestrator wraps every call in its phase deadline.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieves scored context for a query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetrievalUnavailable`] when both stores are down.
    async fn retrieve(
        &self,
        query: &str,
        domain: Option<&DomainTag>,
        max_results: usize,
    ) -> Result<RetrievalResult>;
}

/// Hybrid vector + graph retrieval engine.
pub struct HybridRetrievalEngine {
    vector: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
    relation_whitelist: Vec<RelationType>,
}

impl HybridRetrievalEngine {
    /// Creates a new engine over the given stores.
    #[must_use]
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            graph,
            embedder,
            config,
            relation_whitelist: RelationType::retrieval_whitelist().to_vec(),
        }
    }

    /// Overrides the traversal relation whitelist.
    #[must_use]
    pub fn with_relation_whitelist(mut self, relations: Vec<RelationType>) -> Self {
        self.relation_whitelist = relations;
        self
    }

    /// Runs the vector leg: over-retrieves `factor × max_results`
    /// candidates filtered by domain.
    async fn vector_candidates(
        &self,
        query: &str,
        domain: Option<&DomainTag>,
        max_results: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed(query)?;
        let mut filter = VectorFilter::new();
        if let Some(domain) = domain {
            filter = filter.with_domain(domain.clone());
        }
        let limit = max_results.max(1) * self.config.over_retrieve_factor.max(1);
        self.vector.search(&embedding, &filter, limit).await
    }

    /// Runs the graph leg: traverses from the entities referenced by the
    /// top vector hits, falling back to a name lookup on the query when the
    /// vector leg contributed nothing.
    async fn graph_context(
        &self,
        query: &str,
        domain: Option<&DomainTag>,
        chunks: &[ScoredChunk],
    ) -> Result<Subgraph> {
        let mut seeds: Vec<EntityId> = Vec::new();
        let mut seen: HashSet<EntityId> = HashSet::new();
        for chunk in chunks {
            for entity in &chunk.entity_refs {
                if seen.insert(entity.clone()) {
                    seeds.push(entity.clone());
                }
            }
        }

        if seeds.is_empty() {
            let mut entity_query = EntityQuery::new().with_limit(5);
            if let Some(domain) = domain {
                entity_query = entity_query.with_domain(domain.clone());
            }
            for term in significant_terms(query) {
                let found = self
                    .graph
                    .find_entities(&entity_query.clone().with_name(term))
                    .await?;
                for entity in found {
                    if seen.insert(entity.id.clone()) {
                        seeds.push(entity.id);
                    }
                }
            }
        }

        self.graph
            .traverse(&seeds, self.config.max_hops, &self.relation_whitelist)
            .await
    }

    /// Merges both candidate sets with the configured weights and reranks
    /// with a lexical-overlap heuristic.
    fn merge_and_rerank(
        &self,
        query: &str,
        mut chunks: Vec<ScoredChunk>,
        graph_context: &Subgraph,
        max_results: usize,
    ) -> Vec<ScoredChunk> {
        let vw = self.config.vector_weight;
        let gw = self.config.graph_weight;
        let query_terms: HashSet<String> = significant_terms(query)
            .map(str::to_lowercase)
            .collect();

        for chunk in &mut chunks {
            let relatedness = chunk
                .entity_refs
                .iter()
                .map(|id| graph_context.centrality(id))
                .fold(0.0f32, f32::max);
            let combined = vw * chunk.score + gw * relatedness;
            // Lexical rerank: small boost proportional to query-term overlap.
            let overlap = lexical_overlap(&query_terms, &chunk.text);
            chunk.score = (combined * (1.0 + 0.2 * overlap)).clamp(0.0, 1.0);
        }

        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(max_results);
        chunks
    }

    fn base_confidence(chunks: &[ScoredChunk], graph_context: &Subgraph) -> f32 {
        if chunks.is_empty() && graph_context.is_empty() {
            return 0.0;
        }
        let top_mean = if chunks.is_empty() {
            // Graph-only: confidence from how connected the context is.
            0.6
        } else {
            let take = chunks.len().min(3);
            chunks[..take].iter().map(|c| c.score).sum::<f32>() / {
                #[allow(clippy::cast_precision_loss)]
                let n = take as f32;
                n
            }
        };
        top_mean.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Retriever for HybridRetrievalEngine {
    async fn retrieve(
        &self,
        query: &str,
        domain: Option<&DomainTag>,
        max_results: usize,
    ) -> Result<RetrievalResult> {
        let span = tracing::info_span!("retrieval.hybrid", max_results);
        let _enter = span.enter();

        let vector_result = self.vector_candidates(query, domain, max_results).await;
        let vector_down = vector_result.is_err();
        let chunks = vector_result.unwrap_or_default();

        let graph_result = self.graph_context(query, domain, &chunks).await;
        let graph_down = graph_result.is_err();
        let graph_context = graph_result.unwrap_or_default();

        if vector_down && graph_down {
            metrics::counter!("retrieval_requests_total", "status" => "unavailable").increment(1);
            return Err(Error::RetrievalUnavailable {
                cause: "vector index and graph store both unavailable".to_string(),
            });
        }

        let merged = self.merge_and_rerank(query, chunks, &graph_context, max_results);

        // Confidence carries the weight mass of the sources that answered:
        // losing the vector store multiplies by the graph weight and vice
        // versa.
        let availability = if vector_down {
            self.config.graph_weight
        } else if graph_down {
            self.config.vector_weight
        } else {
            1.0
        };
        let confidence = Self::base_confidence(&merged, &graph_context) * availability;
        let degraded = vector_down || graph_down;

        let mut sources: Vec<SourceRef> = Vec::new();
        let mut seen_sources: HashSet<String> = HashSet::new();
        for chunk in &merged {
            if seen_sources.insert(chunk.source.id.clone()) {
                sources.push(chunk.source.clone());
            }
        }

        let status = if degraded { "degraded" } else { "ok" };
        metrics::counter!("retrieval_requests_total", "status" => status).increment(1);
        if degraded {
            tracing::warn!(
                vector_down,
                graph_down,
                "retrieval degraded to single-store mode"
            );
        }

        Ok(RetrievalResult {
            chunks: merged,
            graph_context,
            confidence,
            sources,
            degraded,
            availability,
        })
    }
}

/// Query terms worth matching: length > 3, lowercased elsewhere by callers.
fn significant_terms(query: &str) -> impl Iterator<Item = &str> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
}

fn lexical_overlap(query_terms: &HashSet<String>, text: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let hits = query_terms
        .iter()
        .filter(|term| text_lower.contains(term.as_str()))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = hits as f32 / query_terms.len() as f32;
    ratio
}
