//! Perception snapshot: the immutable world-state record for one cycle.

use super::graph::{Entity, EntityId};
use super::memory::MemoryRecord;
use super::retrieval::ScoredChunk;
use super::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a requirement in the graph, by entity ID plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementRef {
    /// Graph entity ID of the requirement.
    pub entity_id: EntityId,
    /// Display name of the requirement.
    pub name: String,
}

impl RequirementRef {
    /// Creates a requirement reference.
    #[must_use]
    pub fn new(entity_id: EntityId, name: impl Into<String>) -> Self {
        Self {
            entity_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.entity_id)
    }
}

/// Category of a requirement; drives the severity-tier lookup in planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementCategory {
    /// Retention and deletion obligations.
    DataRetention,
    /// Confidentiality/integrity safeguards.
    DataProtection,
    /// Authorization and access review.
    AccessControl,
    /// Breach and incident handling.
    IncidentResponse,
    /// Regulatory reporting and notification.
    Reporting,
    /// Awareness and training obligations.
    Training,
    /// Third-party/vendor oversight.
    VendorManagement,
    /// Anything not otherwise categorized.
    Other,
}

impl RequirementCategory {
    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DataRetention => "data_retention",
            Self::DataProtection => "data_protection",
            Self::AccessControl => "access_control",
            Self::IncidentResponse => "incident_response",
            Self::Reporting => "reporting",
            Self::Training => "training",
            Self::VendorManagement => "vendor_management",
            Self::Other => "other",
        }
    }

    /// Best-effort categorization from a requirement name.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("retention") || lower.contains("deletion") || lower.contains("erasure") {
            Self::DataRetention
        } else if lower.contains("encrypt") || lower.contains("protection") {
            Self::DataProtection
        } else if lower.contains("access") || lower.contains("authoriz") {
            Self::AccessControl
        } else if lower.contains("incident") || lower.contains("breach") {
            Self::IncidentResponse
        } else if lower.contains("report") || lower.contains("notif") {
            Self::Reporting
        } else if lower.contains("training") || lower.contains("awareness") {
            Self::Training
        } else if lower.contains("vendor") || lower.contains("third-party") {
            Self::VendorManagement
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requirement with no observed implementing control or evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    /// The unimplemented requirement.
    pub requirement: RequirementRef,
    /// Category used for severity lookup.
    pub category: RequirementCategory,
    /// Short description of what is missing.
    pub description: String,
}

/// An enforcement-precedent signal attached to a requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSignal {
    /// The requirement the precedent attaches to.
    pub requirement: RequirementRef,
    /// Number of enforcement actions observed against it.
    pub precedent_count: u32,
    /// Derived enforcement probability (0.0 to 1.0).
    pub enforcement_probability: f32,
}

/// Immutable record of the retrieved world-state for one cycle.
///
/// Created once by the Perceive phase and never mutated; later phases
/// reference it by session ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionSnapshot {
    /// The owning session.
    pub session_id: SessionId,
    /// Graph entities matched for the query.
    pub entities: Vec<Entity>,
    /// Vector chunks matched for the query.
    pub chunks: Vec<ScoredChunk>,
    /// Session-relevant recollections from the memory manager.
    pub recollections: Vec<MemoryRecord>,
    /// Computed gap list.
    pub gaps: Vec<Gap>,
    /// Computed risk list.
    pub risks: Vec<RiskSignal>,
    /// Confidence reported by the retrieval engine.
    pub retrieval_confidence: f32,
    /// Weight mass of the retrieval stores that answered (1.0 when both
    /// did); scales the final response confidence under degradation.
    pub retrieval_availability: f32,
    /// Whether retrieval ran in a degraded (single-store) mode.
    pub degraded_retrieval: bool,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
}

impl PerceptionSnapshot {
    /// Returns the risk signal for a requirement, if any.
    #[must_use]
    pub fn risk_for(&self, requirement: &RequirementRef) -> Option<&RiskSignal> {
        self.risks
            .iter()
            .find(|r| r.requirement.entity_id == requirement.entity_id)
    }
}
