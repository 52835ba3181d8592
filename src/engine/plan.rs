//! Plan phase: risk scoring and action-item selection.
//!
//! Risk follows `impact_weight * (severity_tier / 10) + enforcement_weight *
//! enforcement_probability`, with the severity tier looked up per
//! requirement category. The same unit-interval value doubles as the item's
//! priority; `risk_score` carries it on the 0–10 scale for reporting.

use crate::config::{OrchestratorConfig, RiskConfig};
use crate::models::{
    ActionId, ActionItem, OperationTag, PerceptionSnapshot, RequirementCategory,
};

/// Builds the ordered, truncated action-item list from a snapshot.
#[must_use]
pub(super) fn build(
    snapshot: &PerceptionSnapshot,
    risk: &RiskConfig,
    orchestrator: &OrchestratorConfig,
) -> Vec<ActionItem> {
    let mut items: Vec<ActionItem> = snapshot
        .gaps
        .iter()
        .map(|gap| {
            let enforcement_probability = snapshot
                .risk_for(&gap.requirement)
                .map_or(0.0, |r| r.enforcement_probability);
            let tier = risk.severity_tier(gap.category);
            let impact = f32::from(tier) / 10.0;
            let unit =
                risk.impact_weight * impact + risk.enforcement_weight * enforcement_probability;
            let priority = unit.clamp(0.0, 1.0);
            ActionItem {
                id: ActionId::generate(),
                requirement: gap.requirement.clone(),
                category: gap.category,
                risk_score: priority * 10.0,
                enforcement_probability,
                priority,
                operation: select_operation(gap.category, enforcement_probability),
                confidence: snapshot.retrieval_confidence,
                requires_confirmation: priority < orchestrator.autonomy_threshold,
            }
        })
        .collect();

    items.sort_by(ActionItem::plan_order);
    items.truncate(orchestrator.max_action_items);
    items
}

/// Operation choice: imminent enforcement escalates, reporting-style gaps
/// get drafted guidance, control-shaped gaps get a mapping, the rest get an
/// evidence stub for the business layer.
const fn select_operation(
    category: RequirementCategory,
    enforcement_probability: f32,
) -> OperationTag {
    if enforcement_probability >= 0.7 {
        return OperationTag::EscalateReview;
    }
    match category {
        RequirementCategory::Reporting
        | RequirementCategory::DataRetention
        | RequirementCategory::Training => OperationTag::DraftGuidance,
        RequirementCategory::AccessControl | RequirementCategory::DataProtection => {
            OperationTag::MapControl
        }
        _ => OperationTag::CreateEvidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::EntityId;
    use crate::models::{Gap, RequirementRef, RiskSignal, SessionId};

    fn snapshot(gaps: Vec<Gap>, risks: Vec<RiskSignal>) -> PerceptionSnapshot {
        PerceptionSnapshot {
            session_id: SessionId::generate(),
            entities: Vec::new(),
            chunks: Vec::new(),
            recollections: Vec::new(),
            gaps,
            risks,
            retrieval_confidence: 0.9,
            retrieval_availability: 1.0,
            degraded_retrieval: false,
            created_at: crate::current_timestamp(),
        }
    }

    fn gap(id: &str, name: &str, category: RequirementCategory) -> Gap {
        Gap {
            requirement: RequirementRef::new(EntityId::new(id), name),
            category,
            description: format!("no control implements {name}"),
        }
    }

    #[test]
    fn test_risk_formula_and_scale() {
        let snapshot = snapshot(
            vec![gap("r1", "Encryption at rest", RequirementCategory::DataProtection)],
            vec![RiskSignal {
                requirement: RequirementRef::new(EntityId::new("r1"), "Encryption at rest"),
                precedent_count: 4,
                enforcement_probability: 0.5,
            }],
        );
        let items = build(
            &snapshot,
            &RiskConfig::default(),
            &OrchestratorConfig::default(),
        );
        // 0.6 * (9/10) + 0.4 * 0.5 = 0.74
        assert!((items[0].priority - 0.74).abs() < 1e-5);
        assert!((items[0].risk_score - 7.4).abs() < 1e-4);
    }

    #[test]
    fn test_sorted_descending_and_truncated() {
        let categories = [
            RequirementCategory::Training,
            RequirementCategory::DataProtection,
            RequirementCategory::Reporting,
            RequirementCategory::IncidentResponse,
            RequirementCategory::Other,
            RequirementCategory::AccessControl,
            RequirementCategory::DataRetention,
        ];
        let gaps = categories
            .iter()
            .enumerate()
            .map(|(i, c)| gap(&format!("r{i}"), &format!("req {i}"), *c))
            .collect();
        let items = build(
            &snapshot(gaps, Vec::new()),
            &RiskConfig::default(),
            &OrchestratorConfig::default(),
        );
        assert_eq!(items.len(), 5);
        for pair in items.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
    }

    #[test]
    fn test_below_threshold_requires_confirmation() {
        let items = build(
            &snapshot(
                vec![gap("r1", "misc requirement", RequirementCategory::Other)],
                Vec::new(),
            ),
            &RiskConfig::default(),
            &OrchestratorConfig::default(),
        );
        // 0.6 * 0.3 = 0.18, far below the 0.8 autonomy threshold.
        assert!(items[0].requires_confirmation);
    }

    #[test]
    fn test_high_enforcement_escalates() {
        let requirement = RequirementRef::new(EntityId::new("r1"), "Breach notification");
        let items = build(
            &snapshot(
                vec![gap("r1", "Breach notification", RequirementCategory::IncidentResponse)],
                vec![RiskSignal {
                    requirement,
                    precedent_count: 9,
                    enforcement_probability: 0.85,
                }],
            ),
            &RiskConfig::default(),
            &OrchestratorConfig::default(),
        );
        assert_eq!(items[0].operation, OperationTag::EscalateReview);
        // 0.6 * 0.9 + 0.4 * 0.85 = 0.88, above the autonomy threshold.
        assert!(!items[0].requires_confirmation);
    }
}
