//! Data models for veridex.
//!
//! This module contains all the core data structures used throughout the
//! engine. Cross-component references are by immutable ID, never by live
//! handle: the orchestrator owns sessions and snapshots, the memory manager
//! owns memory records, and the verification pipeline owns claim/result
//! pairs.

mod action;
mod claim;
pub mod graph;
mod memory;
mod perception;
mod response;
mod retrieval;
mod session;

pub use action::{ActionId, ActionItem, ActionRecord, ActionStatus, OperationTag};
pub use claim::{Claim, ClaimId, ClaimType, VerificationResult, VerifiedClaim};
pub use memory::{MemoryId, MemoryKind, MemoryRecord, MemoryScope};
pub use perception::{
    Gap, PerceptionSnapshot, RequirementCategory, RequirementRef, RiskSignal,
};
pub use response::{Citation, VerifiedResponse};
pub use retrieval::{ChunkId, DocumentChunk, RetrievalResult, ScoredChunk, SourceRef};
pub use session::{
    DomainTag, FailureReason, QuerySession, RequestId, Scope, SessionId, SessionStatus,
};
