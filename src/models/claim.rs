//! Claims extracted from draft answers and their verification results.

use super::graph::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    /// Generates a new unique claim ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("clm_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of an extracted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    /// A monetary amount (fine, penalty, threshold).
    Monetary,
    /// A deadline or time window.
    Deadline,
    /// A reference to a regulation, article, or section.
    RegulatoryReference,
    /// A statistic or percentage.
    Statistical,
    /// An appeal to an authority ("according to the ICO...").
    AuthorityCitation,
    /// Any other factual assertion.
    Other,
}

impl ClaimType {
    /// Returns the claim type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monetary => "monetary",
            Self::Deadline => "deadline",
            Self::RegulatoryReference => "regulatory_reference",
            Self::Statistical => "statistical",
            Self::AuthorityCitation => "authority_citation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An atomic factual assertion extracted from a draft answer.
///
/// Immutable once created; its [`VerificationResult`] is attached exactly
/// once by the fact-verification stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Unique identifier.
    pub id: ClaimId,
    /// The asserted text span.
    pub text: String,
    /// Claim category.
    pub claim_type: ClaimType,
    /// Entities mentioned by the claim (names, amounts, citations).
    pub entities: Vec<String>,
    /// Byte span of the claim within the draft answer.
    pub span: (usize, usize),
}

/// Outcome of verifying one claim against the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the claim is corroborated by the graph.
    pub verified: bool,
    /// Confidence in the verdict (0.0 to 1.0).
    pub confidence: f32,
    /// Entities supporting the claim.
    pub supporting: Vec<EntityId>,
    /// Entities contradicting the claim.
    pub contradicting: Vec<EntityId>,
}

impl VerificationResult {
    /// Returns `true` when the claim is both unverified and low-confidence,
    /// which forces human review of the whole response.
    #[must_use]
    pub fn forces_review(&self) -> bool {
        !self.verified && self.confidence < 0.5
    }
}

/// A claim paired with its verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedClaim {
    /// The extracted claim.
    pub claim: Claim,
    /// The attached verification result.
    pub result: VerificationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forces_review() {
        let unverified_low = VerificationResult {
            verified: false,
            confidence: 0.3,
            supporting: Vec::new(),
            contradicting: Vec::new(),
        };
        assert!(unverified_low.forces_review());

        let unverified_high = VerificationResult {
            verified: false,
            confidence: 0.7,
            supporting: Vec::new(),
            contradicting: Vec::new(),
        };
        assert!(!unverified_high.forces_review());

        let verified = VerificationResult {
            verified: true,
            confidence: 0.4,
            supporting: vec![EntityId::new("e1")],
            contradicting: Vec::new(),
        };
        assert!(!verified.forces_review());
    }
}
