//! Cognition orchestrator.
//!
//! The engine owns all cross-component sequencing: retrieval, memory,
//! gateway and verification never call each other, they are invoked in
//! order by the per-session phase runner. Sessions are independent
//! concurrent units of work; the only shared mutable state lives behind
//! the gateway's atomics and the engine's session table.
//!
//! ```text
//! StartSession(query, scope) ─▶ [perceiving → planning → acting
//!                                 → learning → remembering] ─▶ done
//!                                          │
//!                                          └──▶ failed(reason)
//! GetResult(session_id) ─▶ Pending | Completed | Failed | Cancelled
//! ```

mod act;
mod learn;
mod plan;
mod session;

pub use learn::PatternSummary;

use crate::config::EngineConfig;
use crate::gateway::ModelGateway;
use crate::memory::MemoryManager;
use crate::models::{
    ActionRecord, DomainTag, FailureReason, QuerySession, RequestId, Scope, SessionId,
    SessionStatus, VerifiedResponse,
};
use crate::retrieval::Retriever;
use crate::storage::traits::GraphStore;
use crate::verify::VerificationPipeline;
use crate::{current_timestamp, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Queries longer than this are rejected before entering the state machine.
const MAX_QUERY_BYTES: usize = 16_384;

/// What a caller sees for a session right now.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The session is still progressing through its phases.
    Pending,
    /// The session produced a verified response.
    Completed(Box<VerifiedResponse>),
    /// The session failed with a structured reason code.
    Failed(FailureReason),
}

/// One logical request from the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Logical request ID; retries with the same ID are idempotent.
    pub request_id: RequestId,
    /// Query text.
    pub query: String,
    /// Domain/framework hint.
    pub domain: Option<DomainTag>,
    /// Caller scope.
    pub scope: Scope,
}

impl SessionRequest {
    /// Creates a request with an empty scope.
    #[must_use]
    pub fn new(request_id: RequestId, query: impl Into<String>) -> Self {
        Self {
            request_id,
            query: query.into(),
            domain: None,
            scope: Scope::new(),
        }
    }

    /// Sets the domain hint.
    #[must_use]
    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Sets the caller scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

struct SessionSlot {
    status: SessionStatus,
    phase: &'static str,
    outcome: SessionOutcome,
    cancel: CancellationToken,
}

/// Mutable engine state behind one lock: the session table, the
/// request-id index for idempotence, and the append-only action log.
#[derive(Default)]
struct EngineState {
    sessions: HashMap<SessionId, SessionSlot>,
    by_request: HashMap<RequestId, SessionId>,
    action_log: Vec<ActionRecord>,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Running,
            phase: "perceiving",
            outcome: SessionOutcome::Pending,
            cancel: CancellationToken::new(),
        }
    }
}

/// The five-phase cognition engine.
pub struct CognitionEngine {
    pub(crate) retriever: Arc<dyn Retriever>,
    pub(crate) memory: Arc<MemoryManager>,
    pub(crate) gateway: Arc<ModelGateway>,
    pub(crate) verifier: Arc<VerificationPipeline>,
    pub(crate) graph: Arc<dyn GraphStore>,
    pub(crate) config: EngineConfig,
    state: Mutex<EngineState>,
}

impl CognitionEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        retriever: Arc<dyn Retriever>,
        memory: Arc<MemoryManager>,
        gateway: Arc<ModelGateway>,
        verifier: Arc<VerificationPipeline>,
        graph: Arc<dyn GraphStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            retriever,
            memory,
            gateway,
            verifier,
            graph,
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Starts a session for a request and returns its session ID.
    ///
    /// Idempotent per logical request ID: retrying with the same ID returns
    /// the existing session without running anything twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for empty, whitespace-only or
    /// oversized queries; they are rejected before entering the state
    /// machine.
    pub fn start_session(self: &Arc<Self>, request: SessionRequest) -> Result<SessionId> {
        if request.query.trim().is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }
        if request.query.len() > MAX_QUERY_BYTES {
            return Err(Error::InvalidQuery(format!(
                "query exceeds {MAX_QUERY_BYTES} bytes"
            )));
        }

        let session = {
            let mut state = self.lock_state();
            if let Some(existing) = state.by_request.get(&request.request_id) {
                tracing::debug!(session_id = %existing, "request id already in flight");
                return Ok(existing.clone());
            }

            let session = QuerySession {
                id: SessionId::generate(),
                request_id: request.request_id.clone(),
                query: request.query.clone(),
                domain: request.domain.clone(),
                scope: request.scope.clone(),
                created_at: current_timestamp(),
                status: SessionStatus::Running,
            };
            state
                .by_request
                .insert(request.request_id, session.id.clone());
            state
                .sessions
                .insert(session.id.clone(), SessionSlot::default());
            session
        };

        let session_id = session.id.clone();
        let cancel = self.cancel_token(&session_id);
        let engine = Arc::clone(self);
        tracing::info!(session_id = %session_id, "session started");
        tokio::spawn(async move {
            let id = session.id.clone();
            let outcome = session::run(engine.clone(), session, cancel).await;
            engine.finish(&id, outcome);
        });

        Ok(session_id)
    }

    /// Returns the current outcome for a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for an unknown session ID.
    pub fn get_result(&self, session_id: &SessionId) -> Result<SessionOutcome> {
        let state = self.lock_state();
        state
            .sessions
            .get(session_id)
            .map(|slot| slot.outcome.clone())
            .ok_or_else(|| Error::InvalidQuery(format!("unknown session {session_id}")))
    }

    /// Waits until a session reaches a terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for an unknown session ID.
    pub async fn wait(&self, session_id: &SessionId) -> Result<SessionOutcome> {
        loop {
            match self.get_result(session_id)? {
                SessionOutcome::Pending => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                terminal => return Ok(terminal),
            }
        }
    }

    /// Current status and phase of a session, for observability surfaces.
    #[must_use]
    pub fn session_status(&self, session_id: &SessionId) -> Option<(SessionStatus, &'static str)> {
        let state = self.lock_state();
        state
            .sessions
            .get(session_id)
            .map(|slot| (slot.status, slot.phase))
    }

    /// Cancels a session. In-flight child operations are cancelled
    /// cooperatively; completed side effects stay recorded.
    pub fn cancel_session(&self, session_id: &SessionId) {
        let mut state = self.lock_state();
        if let Some(slot) = state.sessions.get_mut(session_id) {
            slot.cancel.cancel();
            if matches!(slot.outcome, SessionOutcome::Pending) {
                slot.status = SessionStatus::Escalated;
            }
            tracing::info!(session_id = %session_id, "session cancelled");
        }
    }

    /// The append-only action log for one session, in completion order.
    #[must_use]
    pub fn action_records(&self, session_id: &SessionId) -> Vec<ActionRecord> {
        let state = self.lock_state();
        state
            .action_log
            .iter()
            .filter(|r| &r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub(crate) fn append_action_record(&self, record: ActionRecord) {
        let mut state = self.lock_state();
        state.action_log.push(record);
    }

    pub(crate) fn set_phase(&self, session_id: &SessionId, phase: &'static str) {
        let mut state = self.lock_state();
        if let Some(slot) = state.sessions.get_mut(session_id) {
            slot.phase = phase;
        }
        drop(state);
        tracing::debug!(session_id = %session_id, phase, "phase entered");
    }

    fn finish(&self, session_id: &SessionId, outcome: SessionOutcome) {
        let mut state = self.lock_state();
        if let Some(slot) = state.sessions.get_mut(session_id) {
            slot.status = match &outcome {
                SessionOutcome::Completed(_) => SessionStatus::Completed,
                SessionOutcome::Failed(FailureReason::Cancelled) => SessionStatus::Escalated,
                SessionOutcome::Failed(_) | SessionOutcome::Pending => SessionStatus::Failed,
            };
            // On failure the phase keeps its last value, naming where the
            // session died.
            if slot.status == SessionStatus::Completed {
                slot.phase = "done";
            }
            slot.outcome = outcome;
        }
    }

    fn cancel_token(&self, session_id: &SessionId) -> CancellationToken {
        let state = self.lock_state();
        state
            .sessions
            .get(session_id)
            .map_or_else(CancellationToken::new, |slot| slot.cancel.clone())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
