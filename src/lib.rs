//! # Veridex
//!
//! An autonomous reasoning and verification engine for compliance queries.
//!
//! Veridex turns a natural-language compliance question into a risk-ranked,
//! evidence-backed, fact-checked answer. A five-phase cognition loop
//! (perceive, plan, act, learn, remember) sequences hybrid retrieval over a
//! relationship graph and a vector index, a tiered memory subsystem, a model
//! gateway with circuit breaking and budget accounting, and a multi-stage
//! verification pipeline that gates every generated claim before it reaches
//! a caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! use veridex::engine::SessionOutcome;
//! use veridex::models::RequestId;
//! use veridex::{CognitionEngine, SessionRequest};
//!
//! let engine = Arc::new(CognitionEngine::new(
//!     retriever, memory, gateway, verifier, graph, config,
//! ));
//! let session_id = engine.start_session(SessionRequest::new(
//!     RequestId::new("req-1"),
//!     "What are the data-retention obligations under GDPR?",
//! ))?;
//! if let SessionOutcome::Completed(response) = engine.wait(&session_id).await? {
//!     assert!(!response.citations.is_empty());
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod engine;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod observability;
pub mod retrieval;
pub mod storage;
pub mod verify;

// Re-exports for convenience
pub use config::EngineConfig;
pub use embedding::Embedder;
pub use engine::{CognitionEngine, SessionOutcome, SessionRequest};
pub use gateway::{Generator, ModelGateway};
pub use memory::MemoryManager;
pub use models::{
    ActionItem, ActionRecord, Claim, ClaimType, DomainTag, FailureReason, MemoryKind,
    MemoryRecord, MemoryScope, PerceptionSnapshot, RequestId, Scope, SessionId, SessionStatus,
    VerifiedResponse,
};
pub use retrieval::{HybridRetrievalEngine, Retriever};
pub use storage::{GraphStore, MemoryLog, VectorIndex};
pub use verify::VerificationPipeline;

/// Error type for veridex operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidQuery` | Empty or malformed input, rejected before the state machine |
/// | `RetrievalUnavailable` | Both the vector index and the graph store are down |
/// | `BudgetExceeded` | The period token budget is exhausted |
/// | `MaxStepsExceeded` | A session dispatched more steps than the configured bound |
/// | `ModelProviderUnavailable` | All providers failed or their breakers are open |
/// | `Timeout` | A phase or external call exceeded its deadline |
/// | `Cancelled` | The session was cancelled cooperatively |
/// | `OperationFailed` | Backend I/O or internal bookkeeping failed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The query was empty or malformed.
    ///
    /// Raised before a session enters the state machine; no partial state
    /// is created for an invalid query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Both retrieval sources are unavailable.
    ///
    /// The engine fails closed rather than answering from the model alone,
    /// and never silently returns empty context with full confidence.
    #[error("retrieval unavailable: {cause}")]
    RetrievalUnavailable {
        /// The underlying cause.
        cause: String,
    },

    /// The configured period budget is exhausted.
    #[error("budget exceeded: spent {spent_tokens} of {budget_tokens} tokens this period")]
    BudgetExceeded {
        /// Tokens spent in the current period.
        spent_tokens: u64,
        /// The configured period budget.
        budget_tokens: u64,
    },

    /// A session dispatched more execution steps than allowed.
    #[error("max steps exceeded: limit {limit}")]
    MaxStepsExceeded {
        /// The configured step limit.
        limit: usize,
    },

    /// No generation provider could serve the call.
    ///
    /// Trips the circuit breaker; a fallback provider is tried first.
    #[error("model provider '{provider}' unavailable: {cause}")]
    ModelProviderUnavailable {
        /// The provider that failed.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Elapsed time in milliseconds.
        elapsed_ms: u64,
    },

    /// The session was cancelled.
    #[error("session cancelled")]
    Cancelled,

    /// An operation failed.
    ///
    /// Raised when:
    /// - A storage backend rejects a read or write
    /// - Serialization of a record fails
    /// - Internal invariants cannot be upheld
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` if the error is transient and worth a bounded retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::OperationFailed { .. })
    }
}

/// Result type alias for veridex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized to avoid duplicate implementations across the codebase.
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
