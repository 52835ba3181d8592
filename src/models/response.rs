//! The verified response: terminal, immutable output of a session.

use super::claim::VerifiedClaim;
use super::retrieval::SourceRef;
use super::session::SessionId;
use serde::{Deserialize, Serialize};

/// A cited source with its resolved reliability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// The cited source.
    pub source: SourceRef,
    /// Reliability weight from the authoritative-source whitelist
    /// (0.0 to 1.0; unlisted sources get a low weight, not rejection).
    pub reliability: f32,
    /// Whether the source appears on the whitelist.
    pub verified: bool,
}

/// Final output of a query session.
///
/// Created once, terminal, immutable. Callers always receive either this or
/// a structured failure, never an unflagged answer that skipped
/// verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedResponse {
    /// The owning session.
    pub session_id: SessionId,
    /// The answer text.
    pub answer: String,
    /// Aggregated confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Extracted claims with their verification status.
    pub claims: Vec<VerifiedClaim>,
    /// Source citations.
    pub citations: Vec<Citation>,
    /// Set when the response must be reviewed by a human before use.
    pub requires_human_review: bool,
    /// Set when one or more verification stages could not complete.
    pub degraded_verification: bool,
}
