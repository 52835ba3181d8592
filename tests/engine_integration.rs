//! End-to-end engine tests over in-memory backends.
//!
//! Each test assembles a full engine (retrieval, memory, gateway,
//! verification) from the in-memory stores and a canned generator, then
//! drives whole sessions through the public API:
//! - Grounded answers complete with citations and no review flag
//! - Single-store outages degrade confidence instead of failing
//! - Unsupported checkable claims force human review
//! - Budget exhaustion fails the session but keeps completed records
//! - Idempotence, cancellation, and input validation at the boundary

// Integration tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use veridex::config::{EngineConfig, GatewayConfig, OrchestratorConfig};
use veridex::embedding::HashEmbedder;
use veridex::gateway::{Draft, GenerationRequest, ModelGateway};
use veridex::memory::MemoryManager;
use veridex::models::graph::{Entity, EntityId, EntityType, RelationType, Relationship, Subgraph};
use veridex::models::{
    ActionStatus, ChunkId, DocumentChunk, DomainTag, FailureReason, OperationTag, RequestId,
    ScoredChunk, SessionStatus, SourceRef,
};
use veridex::retrieval::HybridRetrievalEngine;
use veridex::storage::traits::EntityQuery;
use veridex::storage::{
    GraphStore, InMemoryGraphStore, InMemoryMemoryLog, InMemoryVectorIndex, VectorFilter,
    VectorIndex,
};
use veridex::verify::VerificationPipeline;
use veridex::{
    CognitionEngine, Embedder, Error, Generator, Result, SessionOutcome, SessionRequest,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Generator that always returns the same draft.
struct CannedGenerator {
    answer: String,
    confidence: f32,
}

impl CannedGenerator {
    fn new(answer: &str, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            confidence,
        })
    }
}

#[async_trait]
impl Generator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Draft> {
        Ok(Draft {
            text: self.answer.clone(),
            prompt_tokens: 50,
            completion_tokens: 40,
            self_reported_confidence: Some(self.confidence),
        })
    }
}

/// Generator that blocks until the session gives up on it.
struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Draft> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Draft {
            text: "too late".to_string(),
            prompt_tokens: 1,
            completion_tokens: 1,
            self_reported_confidence: None,
        })
    }
}

/// Vector index whose backend is unreachable.
struct DownVectorIndex;

fn down_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "backend unreachable".to_string(),
    }
}

#[async_trait]
impl VectorIndex for DownVectorIndex {
    fn dimensions(&self) -> usize {
        HashEmbedder::DEFAULT_DIMENSIONS
    }

    async fn upsert(&self, _chunk: DocumentChunk) -> Result<()> {
        Err(down_error("vector_upsert"))
    }

    async fn remove(&self, _id: &ChunkId) -> Result<bool> {
        Err(down_error("vector_remove"))
    }

    async fn search(
        &self,
        _query_embedding: &[f32],
        _filter: &VectorFilter,
        _limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        Err(down_error("vector_search"))
    }

    async fn count(&self) -> Result<usize> {
        Err(down_error("vector_count"))
    }
}

/// Graph store whose backend is unreachable.
struct DownGraphStore;

#[async_trait]
impl GraphStore for DownGraphStore {
    async fn store_entity(&self, _entity: Entity) -> Result<()> {
        Err(down_error("graph_store_entity"))
    }

    async fn entity(&self, _id: &EntityId) -> Result<Option<Entity>> {
        Err(down_error("graph_entity"))
    }

    async fn find_entities(&self, _query: &EntityQuery) -> Result<Vec<Entity>> {
        Err(down_error("graph_find_entities"))
    }

    async fn store_relationship(&self, _relationship: Relationship) -> Result<()> {
        Err(down_error("graph_store_relationship"))
    }

    async fn relationships_of(&self, _id: &EntityId) -> Result<Vec<Relationship>> {
        Err(down_error("graph_relationships_of"))
    }

    async fn traverse(
        &self,
        _start: &[EntityId],
        _hops: usize,
        _relations: &[RelationType],
    ) -> Result<Subgraph> {
        Err(down_error("graph_traverse"))
    }
}

/// Assembles a full engine over the given stores and generator.
fn build_engine(
    vector: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    generator: Arc<dyn Generator>,
    config: EngineConfig,
) -> Arc<CognitionEngine> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
    let retriever = Arc::new(HybridRetrievalEngine::new(
        vector,
        Arc::clone(&graph),
        Arc::clone(&embedder),
        config.retrieval.clone(),
    ));
    let memory = Arc::new(MemoryManager::new(
        Arc::new(InMemoryMemoryLog::new()),
        embedder,
        config.memory.clone(),
    ));
    let gateway = Arc::new(ModelGateway::new(
        Arc::clone(&generator),
        generator,
        config.gateway.clone(),
    ));
    let verifier = Arc::new(VerificationPipeline::new(
        Arc::clone(&graph),
        config.verification.clone(),
    ));
    Arc::new(CognitionEngine::new(
        retriever, memory, gateway, verifier, graph, config,
    ))
}

/// Seeds the breach-notification corpus: a regulation requiring a
/// requirement, plus one whitelisted-source chunk referencing it.
async fn seed_breach_corpus(vector: &InMemoryVectorIndex, graph: &InMemoryGraphStore) {
    let embedder = HashEmbedder::new();
    let regulation = Entity::new(EntityType::Regulation, "GDPR")
        .with_id(EntityId::new("gdpr"))
        .with_domain(DomainTag::new("gdpr"));
    let requirement = Entity::new(EntityType::Requirement, "Breach Notification")
        .with_id(EntityId::new("breach-notification"))
        .with_domain(DomainTag::new("gdpr"))
        .with_attribute("deadline", "72 hours");
    graph.store_entity(regulation).await.unwrap();
    graph.store_entity(requirement).await.unwrap();
    graph
        .store_relationship(Relationship::new(
            EntityId::new("gdpr"),
            EntityId::new("breach-notification"),
            RelationType::Requires,
        ))
        .await
        .unwrap();

    let text = "Personal data breach notification to the supervisory authority \
                is required without undue delay.";
    vector
        .upsert(DocumentChunk {
            id: ChunkId::new("c1"),
            text: text.to_string(),
            domain: Some(DomainTag::new("gdpr")),
            source: SourceRef::new("eur-lex").with_title("Regulation (EU) 2016/679"),
            entity_refs: vec![EntityId::new("breach-notification")],
            embedding: embedder.embed(text).unwrap(),
        })
        .await
        .unwrap();
}

fn breach_request(id: &str) -> SessionRequest {
    SessionRequest::new(
        RequestId::new(id),
        "When must we notify the supervisory authority about a personal data breach?",
    )
    .with_domain(DomainTag::new("gdpr"))
}

// ============================================================================
// Grounded answers
// ============================================================================

#[tokio::test]
async fn test_grounded_answer_completes_with_citations() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());
    seed_breach_corpus(&vector, &graph).await;

    let generator = CannedGenerator::new(
        "Controllers must notify the supervisory authority without undue delay \
         after becoming aware of a personal data breach.",
        0.9,
    );
    let engine = build_engine(vector, graph, generator, EngineConfig::default());

    let session_id = engine.start_session(breach_request("req-grounded")).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();

    let SessionOutcome::Completed(response) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert!(
        response.confidence >= 0.75,
        "grounded answer should clear the approval threshold, got {}",
        response.confidence
    );
    assert!(!response.requires_human_review);
    assert!(!response.degraded_verification);
    assert!(!response.citations.is_empty());
    assert_eq!(response.citations[0].source.id, "eur-lex");
    assert!(response.citations[0].verified);

    let (status, phase) = engine.session_status(&session_id).unwrap();
    assert_eq!(status, SessionStatus::Completed);
    assert_eq!(phase, "done");
}

#[tokio::test]
async fn test_unimplemented_requirement_yields_deferred_action() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());
    seed_breach_corpus(&vector, &graph).await;

    let generator = CannedGenerator::new(
        "Controllers must notify the supervisory authority without undue delay.",
        0.9,
    );
    let engine = build_engine(vector, graph, generator, EngineConfig::default());

    let session_id = engine.start_session(breach_request("req-deferred")).unwrap();
    engine.wait(&session_id).await.unwrap();

    // The requirement has no implementing control, so Plan raises a gap and
    // its priority sits below the default autonomy threshold.
    let records = engine.action_records(&session_id);
    assert!(!records.is_empty());
    assert!(
        records
            .iter()
            .any(|r| r.status == ActionStatus::RequiresConfirmation)
    );
}

#[tokio::test]
async fn test_autonomous_guidance_draft_records_output_and_tokens() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());

    // A retention requirement with no implementing control.
    let embedder = HashEmbedder::new();
    graph
        .store_entity(
            Entity::new(EntityType::Regulation, "GDPR")
                .with_id(EntityId::new("gdpr"))
                .with_domain(DomainTag::new("gdpr")),
        )
        .await
        .unwrap();
    graph
        .store_entity(
            Entity::new(EntityType::Requirement, "Storage Limitation and Retention")
                .with_id(EntityId::new("retention"))
                .with_domain(DomainTag::new("gdpr")),
        )
        .await
        .unwrap();
    graph
        .store_relationship(Relationship::new(
            EntityId::new("gdpr"),
            EntityId::new("retention"),
            RelationType::Requires,
        ))
        .await
        .unwrap();
    let text = "Personal data must be kept no longer than necessary for its purposes.";
    vector
        .upsert(DocumentChunk {
            id: ChunkId::new("c-retention"),
            text: text.to_string(),
            domain: Some(DomainTag::new("gdpr")),
            source: SourceRef::new("eur-lex"),
            entity_refs: vec![EntityId::new("retention")],
            embedding: embedder.embed(text).unwrap(),
        })
        .await
        .unwrap();

    // The retention gap maps to a guidance draft; the lowered threshold
    // lets it run without confirmation.
    let config = EngineConfig {
        orchestrator: OrchestratorConfig {
            autonomy_threshold: 0.3,
            ..OrchestratorConfig::default()
        },
        ..EngineConfig::default()
    };
    let generator = CannedGenerator::new(
        "Keep customer records only as long as the purpose requires.",
        0.9,
    );
    let engine = build_engine(vector, graph, generator, config);

    let request = SessionRequest::new(
        RequestId::new("req-draft"),
        "How long may we retain customer personal data?",
    )
    .with_domain(DomainTag::new("gdpr"));
    let session_id = engine.start_session(request).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Completed(_)));

    let records = engine.action_records(&session_id);
    let drafted = records
        .iter()
        .find(|r| r.status == ActionStatus::Completed)
        .expect("autonomous draft must complete");
    assert_eq!(drafted.operation, OperationTag::DraftGuidance);
    assert_eq!(
        drafted.output.as_deref(),
        Some("Keep customer records only as long as the purpose requires.")
    );
    assert_eq!(drafted.tokens_spent, 90);
}

// ============================================================================
// Degraded retrieval
// ============================================================================

#[tokio::test]
async fn test_vector_outage_degrades_instead_of_failing() {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vector_for_seed = InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS);
    seed_breach_corpus(&vector_for_seed, &graph).await;

    let generator = CannedGenerator::new(
        "Controllers must notify the supervisory authority without undue delay.",
        0.9,
    );
    let engine = build_engine(
        Arc::new(DownVectorIndex),
        graph,
        generator,
        EngineConfig::default(),
    );

    let session_id = engine.start_session(breach_request("req-degraded")).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();

    let SessionOutcome::Completed(response) = outcome else {
        panic!("expected graph-only completion, got {outcome:?}");
    };
    assert!(response.degraded_verification);
    assert!(
        response.confidence < 0.5,
        "confidence must carry the surviving store's weight, got {}",
        response.confidence
    );
}

#[tokio::test]
async fn test_both_stores_down_fails_closed() {
    let generator = CannedGenerator::new("unused", 0.9);
    let engine = build_engine(
        Arc::new(DownVectorIndex),
        Arc::new(DownGraphStore),
        generator,
        EngineConfig::default(),
    );

    let session_id = engine.start_session(breach_request("req-down")).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(FailureReason::RetrievalUnavailable)
    ));
    let (status, _) = engine.session_status(&session_id).unwrap();
    assert_eq!(status, SessionStatus::Failed);
}

// ============================================================================
// Verification gating
// ============================================================================

#[tokio::test]
async fn test_unsupported_monetary_claim_forces_review() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());

    // A citable chunk, but nothing in the graph backs the claimed amount.
    let embedder = HashEmbedder::new();
    let text = "Supervisory authorities may impose administrative fines.";
    vector
        .upsert(DocumentChunk {
            id: ChunkId::new("c-fines"),
            text: text.to_string(),
            domain: None,
            source: SourceRef::new("eur-lex"),
            entity_refs: Vec::new(),
            embedding: embedder.embed(text).unwrap(),
        })
        .await
        .unwrap();

    let generator = CannedGenerator::new(
        "The maximum fine is \u{20ac}25 million for late notification.",
        0.9,
    );
    let engine = build_engine(vector, graph, generator, EngineConfig::default());

    let request = SessionRequest::new(
        RequestId::new("req-unsupported"),
        "What is the maximum fine for late breach notification?",
    );
    let session_id = engine.start_session(request).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();

    let SessionOutcome::Completed(response) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert!(
        response.requires_human_review,
        "unbacked monetary claim must be vetoed"
    );
    assert!(response.confidence < 0.75);
    assert!(!response.claims.is_empty());
    assert!(!response.claims[0].result.verified);
}

// ============================================================================
// Budget and step limits
// ============================================================================

#[tokio::test]
async fn test_budget_exhaustion_keeps_completed_records() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());
    seed_breach_corpus(&vector, &graph).await;

    // One token covers nothing, so the first gateway call fails; the
    // lowered threshold lets the evidence-stub action run autonomously
    // first, without touching the gateway.
    let config = EngineConfig {
        gateway: GatewayConfig {
            period_budget_tokens: 1,
            ..GatewayConfig::default()
        },
        orchestrator: OrchestratorConfig {
            autonomy_threshold: 0.3,
            ..OrchestratorConfig::default()
        },
        ..EngineConfig::default()
    };

    let generator = CannedGenerator::new("unreachable", 0.9);
    let engine = build_engine(vector, graph, generator, config);

    let session_id = engine.start_session(breach_request("req-budget")).unwrap();
    let outcome = engine.wait(&session_id).await.unwrap();

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(FailureReason::BudgetExceeded)
    ));

    let records = engine.action_records(&session_id);
    let completed: Vec<_> = records
        .iter()
        .filter(|r| r.status == ActionStatus::Completed)
        .collect();
    assert!(
        !completed.is_empty(),
        "side effects recorded before exhaustion must stay queryable"
    );
    assert!(completed[0].output.as_deref().unwrap().contains("evidence"));
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_session_is_idempotent_per_request_id() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());
    seed_breach_corpus(&vector, &graph).await;

    let generator = CannedGenerator::new("Notify without undue delay.", 0.9);
    let engine = build_engine(vector, graph, generator, EngineConfig::default());

    let first = engine.start_session(breach_request("req-same")).unwrap();
    let second = engine.start_session(breach_request("req-same")).unwrap();
    assert_eq!(first, second);

    let other = engine.start_session(breach_request("req-other")).unwrap();
    assert_ne!(first, other);

    // Retrying after completion still resolves to the original session.
    engine.wait(&first).await.unwrap();
    let third = engine.start_session(breach_request("req-same")).unwrap();
    assert_eq!(first, third);
}

#[tokio::test]
async fn test_cancellation_escalates_session() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());

    let engine = build_engine(
        vector,
        graph,
        Arc::new(SlowGenerator),
        EngineConfig::default(),
    );

    let session_id = engine.start_session(breach_request("req-cancel")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.cancel_session(&session_id);

    let outcome = engine.wait(&session_id).await.unwrap();
    assert!(matches!(
        outcome,
        SessionOutcome::Failed(FailureReason::Cancelled)
    ));
    let (status, _) = engine.session_status(&session_id).unwrap();
    assert_eq!(status, SessionStatus::Escalated);
}

#[tokio::test]
async fn test_invalid_queries_rejected_at_the_boundary() {
    let vector = Arc::new(InMemoryVectorIndex::new(HashEmbedder::DEFAULT_DIMENSIONS));
    let graph = Arc::new(InMemoryGraphStore::new());
    let generator = CannedGenerator::new("unused", 0.9);
    let engine = build_engine(vector, graph, generator, EngineConfig::default());

    let empty = SessionRequest::new(RequestId::new("req-empty"), "   ");
    assert!(matches!(
        engine.start_session(empty),
        Err(Error::InvalidQuery(_))
    ));

    let oversized = SessionRequest::new(RequestId::new("req-huge"), "x".repeat(20_000));
    assert!(matches!(
        engine.start_session(oversized),
        Err(Error::InvalidQuery(_))
    ));

    // Nothing was registered for rejected requests.
    assert!(
        engine
            .start_session(SessionRequest::new(RequestId::new("req-empty"), "valid query"))
            .is_ok()
    );
}
