//! The per-session phase runner.
//!
//! Phases run strictly sequentially: perceiving → planning → acting →
//! learning → remembering → done, with a failed side-channel reachable from
//! any of them. Each phase is timeout-bound and retried with exponential
//! backoff on transient errors, except Act, which runs exactly once because
//! its side effects are not rolled back. The draft answer is generated and
//! gated by the verification pipeline at the tail of Act, before Learn.

use super::{act, learn, plan, CognitionEngine, SessionOutcome};
use crate::gateway::{Draft, GenerationRequest};
use crate::models::graph::{Entity, EntityType, RelationType, Relationship, Subgraph};
use crate::models::{
    FailureReason, Gap, MemoryKind, MemoryRecord, MemoryScope, PerceptionSnapshot, QuerySession,
    RequirementCategory, RequirementRef, RiskSignal, SourceRef, VerifiedResponse,
};
use crate::verify::VerificationReport;
use crate::{current_timestamp, Error, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RECALL_LIMIT: usize = 5;

type PhaseError = (FailureReason, String);

/// Drives one session to a terminal outcome. The whole run is bounded by
/// the session deadline; hitting it cancels all child operations.
pub(super) async fn run(
    engine: Arc<CognitionEngine>,
    session: QuerySession,
    cancel: CancellationToken,
) -> SessionOutcome {
    let deadline = Duration::from_millis(engine.config.orchestrator.session_deadline_ms);
    let result = tokio::select! {
        result = drive(&engine, &session, &cancel) => result,
        () = tokio::time::sleep(deadline) => {
            cancel.cancel();
            Err((
                FailureReason::Cancelled,
                "session deadline exceeded".to_string(),
            ))
        }
    };

    match result {
        Ok(response) => {
            metrics::counter!("engine_sessions_total", "status" => "completed").increment(1);
            SessionOutcome::Completed(Box::new(response))
        }
        Err((reason, detail)) => {
            metrics::counter!("engine_sessions_total", "status" => "failed").increment(1);
            tracing::warn!(
                session_id = %session.id,
                reason = reason.as_str(),
                detail,
                "session failed"
            );
            SessionOutcome::Failed(reason)
        }
    }
}

async fn drive(
    engine: &Arc<CognitionEngine>,
    session: &QuerySession,
    cancel: &CancellationToken,
) -> std::result::Result<VerifiedResponse, PhaseError> {
    let orchestrator = engine.config.orchestrator.clone();
    let steps = Arc::new(AtomicUsize::new(0));

    engine.set_phase(&session.id, "perceiving");
    let snapshot = run_phase(
        "perceive",
        orchestrator.phase_timeout_ms,
        orchestrator.max_phase_retries,
        orchestrator.retry_backoff_ms,
        cancel,
        || perceive(engine, session),
    )
    .await
    .map_err(|e| phase_error("perceive", &e))?;

    engine.set_phase(&session.id, "planning");
    let items = plan::build(&snapshot, &engine.config.risk, &orchestrator);
    tracing::debug!(session_id = %session.id, planned = items.len(), "plan built");

    engine.set_phase(&session.id, "acting");
    // Act runs once: its side effects are recorded, never rolled back, so a
    // blind retry would duplicate them.
    let records = run_phase(
        "act",
        orchestrator.phase_timeout_ms,
        0,
        orchestrator.retry_backoff_ms,
        cancel,
        || act::run(engine, &session.id, items.clone(), &steps, cancel),
    )
    .await
    .map_err(|e| phase_error("act", &e))?;

    let answer_step = steps.fetch_add(1, AtomicOrdering::SeqCst) + 1;
    if answer_step > orchestrator.max_steps {
        let e = Error::MaxStepsExceeded {
            limit: orchestrator.max_steps,
        };
        return Err(phase_error("act", &e));
    }
    let draft = run_phase(
        "generate",
        orchestrator.phase_timeout_ms,
        orchestrator.max_phase_retries,
        orchestrator.retry_backoff_ms,
        cancel,
        || generate_answer(engine, session, &snapshot),
    )
    .await
    .map_err(|e| phase_error("act", &e))?;

    let sources = cited_sources(&snapshot);
    let verify_timeout = Duration::from_millis(orchestrator.phase_timeout_ms);
    let report = tokio::select! {
        () = cancel.cancelled() => {
            return Err((FailureReason::Cancelled, "cancelled during verification".to_string()));
        }
        verified = tokio::time::timeout(
            verify_timeout,
            engine
                .verifier
                .verify(&session.query, &draft, &sources, session.domain.as_ref()),
        ) => verified.map_err(|_| {
            (
                FailureReason::VerificationTimeout,
                format!("verification exceeded {}ms", orchestrator.phase_timeout_ms),
            )
        })?,
    };

    engine.set_phase(&session.id, "learning");
    let patterns = learn::build(&orchestrator, &snapshot, &records);

    engine.set_phase(&session.id, "remembering");
    // A memory or graph write failure never voids a verified answer.
    if let Err(e) = remember(engine, session, &report, &patterns, &draft).await {
        tracing::warn!(session_id = %session.id, error = %e, "remember phase incomplete");
    }

    let confidence = (report.final_confidence * snapshot.retrieval_availability).clamp(0.0, 1.0);
    Ok(VerifiedResponse {
        session_id: session.id.clone(),
        answer: draft.text,
        confidence,
        claims: report.claims,
        citations: report.citations,
        requires_human_review: report.requires_human_review,
        degraded_verification: report.degraded || snapshot.degraded_retrieval,
    })
}

/// Runs one phase attempt loop: timeout-bound, retried with exponential
/// backoff on transient errors, aborted on cancellation.
async fn run_phase<T, Fut>(
    name: &str,
    timeout_ms: u64,
    max_retries: u32,
    backoff_ms: u64,
    cancel: &CancellationToken,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let timeout = Duration::from_millis(timeout_ms);
    let mut backoff = backoff_ms;
    let mut last_err: Option<Error> = None;

    for try_no in 0..=max_retries {
        if try_no > 0 {
            tracing::debug!(phase = name, try_no, "retrying phase");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            backoff = backoff.saturating_mul(2);
        }
        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = tokio::time::timeout(timeout, attempt()) => outcome,
        };
        match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_transient() => last_err = Some(e),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                last_err = Some(Error::Timeout {
                    operation: name.to_string(),
                    elapsed_ms: timeout_ms,
                });
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::OperationFailed {
        operation: name.to_string(),
        cause: "phase retries exhausted".to_string(),
    }))
}

fn phase_error(phase: &str, error: &Error) -> PhaseError {
    let reason = match error {
        Error::RetrievalUnavailable { .. } => FailureReason::RetrievalUnavailable,
        Error::BudgetExceeded { .. } => FailureReason::BudgetExceeded,
        Error::MaxStepsExceeded { .. } => FailureReason::MaxStepsExceeded,
        Error::Cancelled => FailureReason::Cancelled,
        Error::Timeout { .. } if phase == "perceive" => FailureReason::RetrievalUnavailable,
        _ => FailureReason::ModelProviderUnavailable,
    };
    (reason, format!("{phase}: {error}"))
}

/// Perceive: retrieval context plus recollections, distilled into gaps and
/// risk signals. Fails closed when retrieval is fully down; a memory-recall
/// failure only costs the recollections.
async fn perceive(
    engine: &Arc<CognitionEngine>,
    session: &QuerySession,
) -> Result<PerceptionSnapshot> {
    let retrieval = engine
        .retriever
        .retrieve(
            &session.query,
            session.domain.as_ref(),
            engine.config.retrieval.max_results,
        )
        .await?;

    let scope = memory_scope(session);
    let recollections = match engine.memory.recall(&session.query, &scope, RECALL_LIMIT).await {
        Ok(memories) => memories.into_iter().map(|m| m.record).collect(),
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "memory recall unavailable");
            Vec::new()
        }
    };

    let gaps = detect_gaps(&retrieval.graph_context);
    let risks = risk_signals(&retrieval.graph_context.entities);

    Ok(PerceptionSnapshot {
        session_id: session.id.clone(),
        entities: retrieval.graph_context.entities.clone(),
        chunks: retrieval.chunks,
        recollections,
        gaps,
        risks,
        retrieval_confidence: retrieval.confidence,
        retrieval_availability: retrieval.availability,
        degraded_retrieval: retrieval.degraded,
        created_at: current_timestamp(),
    })
}

/// A requirement reached in context with no implementing edge is a gap.
fn detect_gaps(context: &Subgraph) -> Vec<Gap> {
    context
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Requirement)
        .filter(|e| {
            !context.relationships.iter().any(|r| {
                matches!(
                    r.relation,
                    RelationType::Implements | RelationType::Satisfies
                ) && (r.to == e.id || r.from == e.id)
            })
        })
        .map(|e| Gap {
            requirement: RequirementRef::new(e.id.clone(), &e.name),
            category: RequirementCategory::infer(&e.name),
            description: format!("no control implements '{}'", e.name),
        })
        .collect()
}

/// Enforcement probability saturates with precedent count:
/// `count / (count + 2)` stays in the unit interval and rises steeply for
/// the first few precedents.
fn risk_signals(entities: &[Entity]) -> Vec<RiskSignal> {
    entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Requirement && e.violation_count > 0)
        .map(|e| {
            #[allow(clippy::cast_precision_loss)]
            let count = e.violation_count as f32;
            RiskSignal {
                requirement: RequirementRef::new(e.id.clone(), &e.name),
                precedent_count: e.violation_count,
                enforcement_probability: count / (count + 2.0),
            }
        })
        .collect()
}

async fn generate_answer(
    engine: &Arc<CognitionEngine>,
    session: &QuerySession,
    snapshot: &PerceptionSnapshot,
) -> Result<Draft> {
    let mut context = String::new();
    for chunk in snapshot.chunks.iter().take(5) {
        context.push_str("- [");
        context.push_str(&chunk.source.id);
        context.push_str("] ");
        context.push_str(&chunk.text);
        context.push('\n');
    }
    for memory in snapshot.recollections.iter().take(3) {
        context.push_str("- (recalled) ");
        context.push_str(&memory.content);
        context.push('\n');
    }

    let prompt = format!(
        "Context:\n{context}\nQuestion: {}\n\
         Answer using only the context above. End with a line \
         'Confidence: <0..1>'.",
        session.query
    );
    let filtered = engine.verifier.prefilter(&prompt);
    if filtered.rewritten {
        tracing::debug!(session_id = %session.id, "answer prompt rewritten by prefilter");
    }
    let request = GenerationRequest::new(filtered.text)
        .with_system("You are a compliance analyst. Never invent amounts, deadlines or citations.");
    engine.gateway.generate(&request).await
}

fn cited_sources(snapshot: &PerceptionSnapshot) -> Vec<SourceRef> {
    let mut seen: HashSet<String> = HashSet::new();
    snapshot
        .chunks
        .iter()
        .filter(|c| seen.insert(c.source.id.clone()))
        .map(|c| c.source.clone())
        .collect()
}

/// Remember: one episodic record for the interaction, semantic records plus
/// evidence entities for each verified claim, and procedural reinforcement
/// for each learned pattern.
async fn remember(
    engine: &Arc<CognitionEngine>,
    session: &QuerySession,
    report: &VerificationReport,
    patterns: &learn::PatternSummary,
    draft: &Draft,
) -> Result<()> {
    let scope = memory_scope(session);

    let episodic = MemoryRecord::new(
        MemoryKind::Episodic,
        scope.clone(),
        format!(
            "q: {} | a: {} | confidence {:.2}{}",
            session.query,
            truncate(&draft.text, 240),
            report.final_confidence,
            if report.requires_human_review {
                " (review required)"
            } else {
                ""
            }
        ),
    );
    engine.memory.commit(episodic).await?;

    for verified in report.claims.iter().filter(|c| c.result.verified) {
        let semantic = MemoryRecord::new(MemoryKind::Semantic, scope.clone(), &verified.claim.text)
            .with_confidence(verified.result.confidence)
            .with_importance(0.7);
        engine.memory.commit(semantic).await?;

        let mut evidence = Entity::new(EntityType::Evidence, &verified.claim.text);
        if let Some(domain) = session.domain.clone() {
            evidence = evidence.with_domain(domain);
        }
        let evidence_id = evidence.id.clone();
        if let Err(e) = engine.graph.store_entity(evidence).await {
            tracing::warn!(error = %e, "evidence entity write failed");
            continue;
        }
        for supporting in &verified.result.supporting {
            let cites = Relationship::new(
                evidence_id.clone(),
                supporting.clone(),
                RelationType::Cites,
            );
            if let Err(e) = engine.graph.store_relationship(cites).await {
                tracing::warn!(error = %e, "evidence citation write failed");
            }
        }
    }

    for line in &patterns.lines {
        if engine.memory.reinforce(line, true).await?.is_none() {
            let procedural = MemoryRecord::new(MemoryKind::Procedural, scope.clone(), line)
                .with_confidence(0.6);
            engine.memory.commit(procedural).await?;
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn memory_scope(session: &QuerySession) -> MemoryScope {
    session
        .scope
        .user_id
        .as_ref()
        .map_or(MemoryScope::Global, |user| MemoryScope::User(user.clone()))
}
