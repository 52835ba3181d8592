//! Planned action items and their executed records.

use super::perception::{RequirementCategory, RequirementRef};
use super::session::SessionId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Unique identifier for an action item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Generates a new unique action ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("act_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recommended operation for an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationTag {
    /// Generate remediation guidance for the gap.
    DraftGuidance,
    /// Create an evidence stub for the business layer to persist.
    CreateEvidence,
    /// Map an existing control to the requirement.
    MapControl,
    /// Escalate the gap for human review.
    EscalateReview,
}

impl OperationTag {
    /// Returns the tag as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DraftGuidance => "draft_guidance",
            Self::CreateEvidence => "create_evidence",
            Self::MapControl => "map_control",
            Self::EscalateReview => "escalate_review",
        }
    }
}

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single candidate step in a plan.
///
/// Created by the Plan phase and consumed, never mutated, by Act; execution
/// outcomes live in a separate [`ActionRecord`] linked 1:1 by [`ActionId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    /// Unique identifier, shared with the eventual record.
    pub id: ActionId,
    /// Target requirement.
    pub requirement: RequirementRef,
    /// Requirement category used for the severity lookup.
    pub category: RequirementCategory,
    /// Computed risk score on the 0–10 scale.
    pub risk_score: f32,
    /// Enforcement-precedent probability (0.0 to 1.0).
    pub enforcement_probability: f32,
    /// Derived priority (0.0 to 1.0); the plan sort key.
    pub priority: f32,
    /// Recommended operation.
    pub operation: OperationTag,
    /// Confidence in the recommendation (0.0 to 1.0).
    pub confidence: f32,
    /// Set when priority falls below the autonomy threshold.
    pub requires_confirmation: bool,
}

impl ActionItem {
    /// Plan ordering: strictly descending priority, ties broken by lower
    /// enforcement-precedent probability first. Deterministic and intended
    /// for use with a stable sort.
    #[must_use]
    pub fn plan_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
            .then(
                self.enforcement_probability
                    .partial_cmp(&other.enforcement_probability)
                    .unwrap_or(Ordering::Equal),
            )
    }
}

/// Terminal status of an executed (or skipped) action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Executed successfully.
    Completed,
    /// Execution was attempted and failed.
    Failed,
    /// Below the autonomy threshold; awaiting confirmation.
    RequiresConfirmation,
}

impl ActionStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RequiresConfirmation => "requires_confirmation",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The executed outcome of one action item.
///
/// Records are append-only: side effects that completed before a session
/// failed or was cancelled stay recorded, they are never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The action this record belongs to (1:1).
    pub action_id: ActionId,
    /// The owning session.
    pub session_id: SessionId,
    /// The operation that ran.
    pub operation: OperationTag,
    /// Terminal status.
    pub status: ActionStatus,
    /// Generated output, when the operation produced text.
    pub output: Option<String>,
    /// Error description on failure.
    pub error: Option<String>,
    /// Tokens charged against the budget by this execution.
    pub tokens_spent: u64,
    /// Completion timestamp (Unix epoch seconds).
    pub finished_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::EntityId;
    use proptest::prelude::*;

    fn item(priority: f32, enforcement: f32) -> ActionItem {
        ActionItem {
            id: ActionId::generate(),
            requirement: RequirementRef::new(EntityId::new("req"), "r"),
            category: RequirementCategory::Other,
            risk_score: priority * 10.0,
            enforcement_probability: enforcement,
            priority,
            operation: OperationTag::DraftGuidance,
            confidence: 0.9,
            requires_confirmation: false,
        }
    }

    #[test]
    fn test_plan_order_descending_priority() {
        let mut items = vec![item(0.2, 0.1), item(0.9, 0.5), item(0.5, 0.3)];
        items.sort_by(ActionItem::plan_order);
        let priorities: Vec<f32> = items.iter().map(|i| i.priority).collect();
        assert!((priorities[0] - 0.9).abs() < f32::EPSILON);
        assert!((priorities[2] - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_plan_order_tie_break_lower_enforcement_first() {
        let mut items = vec![item(0.5, 0.8), item(0.5, 0.2)];
        items.sort_by(ActionItem::plan_order);
        assert!((items[0].enforcement_probability - 0.2).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_plan_order_is_total_and_sorted(
            priorities in proptest::collection::vec((0.0f32..=1.0, 0.0f32..=1.0), 0..32)
        ) {
            let mut items: Vec<ActionItem> =
                priorities.iter().map(|&(p, e)| item(p, e)).collect();
            items.sort_by(ActionItem::plan_order);
            for pair in items.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.priority >= b.priority);
                if (a.priority - b.priority).abs() < f32::EPSILON {
                    prop_assert!(a.enforcement_probability <= b.enforcement_probability);
                }
            }
        }
    }
}
