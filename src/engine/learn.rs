//! Learn phase: pattern aggregation across action records and enforcement
//! history.

use crate::config::OrchestratorConfig;
use crate::models::graph::EntityType;
use crate::models::{ActionRecord, ActionStatus, PerceptionSnapshot, RequirementRef};

/// Patterns extracted from one interaction, consumed by Remember.
#[derive(Debug, Clone, Default)]
pub struct PatternSummary {
    /// Human-readable pattern lines, one per finding.
    pub lines: Vec<String>,
    /// Requirements flagged by enforcement history.
    pub flagged_requirements: Vec<RequirementRef>,
}

impl PatternSummary {
    /// Returns `true` when the interaction surfaced nothing worth keeping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Aggregates patterns from the executed records and the snapshot's
/// enforcement history. Flagging thresholds come from the orchestrator
/// configuration.
#[must_use]
pub(super) fn build(
    config: &OrchestratorConfig,
    snapshot: &PerceptionSnapshot,
    records: &[ActionRecord],
) -> PatternSummary {
    let mut summary = PatternSummary::default();

    let failed: Vec<&ActionRecord> = records
        .iter()
        .filter(|r| r.status == ActionStatus::Failed)
        .collect();
    if failed.len() >= 2 {
        summary.lines.push(format!(
            "{} of {} actions failed in one session; operations: {}",
            failed.len(),
            records.len(),
            failed
                .iter()
                .map(|r| r.operation.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    let deferred = records
        .iter()
        .filter(|r| r.status == ActionStatus::RequiresConfirmation)
        .count();
    if deferred > 0 && deferred == records.len() {
        summary
            .lines
            .push("every planned action fell below the autonomy threshold".to_string());
    }

    for entity in &snapshot.entities {
        if entity.entity_type == EntityType::Requirement
            && entity.violation_count >= config.violation_flag_threshold
        {
            summary.lines.push(format!(
                "requirement '{}' has {} recorded violations",
                entity.name, entity.violation_count
            ));
            summary
                .flagged_requirements
                .push(RequirementRef::new(entity.id.clone(), &entity.name));
        }
        if entity.entity_type == EntityType::Control {
            if let Some(rate) = entity.pass_rate {
                if rate < config.control_pass_rate_floor {
                    summary.lines.push(format!(
                        "control '{}' passes only {:.0}% of checks",
                        entity.name,
                        rate * 100.0
                    ));
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::{Entity, EntityId};
    use crate::models::{ActionId, OperationTag, SessionId};

    fn snapshot(entities: Vec<Entity>) -> PerceptionSnapshot {
        PerceptionSnapshot {
            session_id: SessionId::generate(),
            entities,
            chunks: Vec::new(),
            recollections: Vec::new(),
            gaps: Vec::new(),
            risks: Vec::new(),
            retrieval_confidence: 0.9,
            retrieval_availability: 1.0,
            degraded_retrieval: false,
            created_at: crate::current_timestamp(),
        }
    }

    fn record(status: ActionStatus) -> ActionRecord {
        ActionRecord {
            action_id: ActionId::generate(),
            session_id: SessionId::generate(),
            operation: OperationTag::DraftGuidance,
            status,
            output: None,
            error: None,
            tokens_spent: 0,
            finished_at: crate::current_timestamp(),
        }
    }

    #[test]
    fn test_violation_history_flagged() {
        let entity = Entity::new(EntityType::Requirement, "Breach Notification")
            .with_id(EntityId::new("r1"))
            .with_violation_count(5);
        let summary = build(&OrchestratorConfig::default(), &snapshot(vec![entity]), &[]);
        assert_eq!(summary.flagged_requirements.len(), 1);
        assert!(summary.lines[0].contains("5 recorded violations"));
    }

    #[test]
    fn test_weak_control_flagged() {
        let entity = Entity::new(EntityType::Control, "Quarterly access review")
            .with_id(EntityId::new("c1"))
            .with_pass_rate(0.4);
        let summary = build(&OrchestratorConfig::default(), &snapshot(vec![entity]), &[]);
        assert_eq!(summary.lines.len(), 1);
        assert!(summary.lines[0].contains("40%"));
    }

    #[test]
    fn test_thresholds_follow_configuration() {
        let entities = vec![
            Entity::new(EntityType::Requirement, "Breach Notification")
                .with_id(EntityId::new("r1"))
                .with_violation_count(1),
            Entity::new(EntityType::Control, "Quarterly access review")
                .with_id(EntityId::new("c1"))
                .with_pass_rate(0.85),
        ];
        let defaults = OrchestratorConfig::default();
        assert!(build(&defaults, &snapshot(entities.clone()), &[]).is_empty());

        let strict = OrchestratorConfig {
            violation_flag_threshold: 1,
            control_pass_rate_floor: 0.9,
            ..OrchestratorConfig::default()
        };
        let summary = build(&strict, &snapshot(entities), &[]);
        assert_eq!(summary.flagged_requirements.len(), 1);
        assert_eq!(summary.lines.len(), 2);
    }

    #[test]
    fn test_repeated_failures_noted() {
        let records = vec![
            record(ActionStatus::Failed),
            record(ActionStatus::Failed),
            record(ActionStatus::Completed),
        ];
        let summary = build(&OrchestratorConfig::default(), &snapshot(Vec::new()), &records);
        assert!(summary.lines[0].contains("2 of 3"));
    }

    #[test]
    fn test_quiet_session_is_empty() {
        let summary = build(
            &OrchestratorConfig::default(),
            &snapshot(Vec::new()),
            &[record(ActionStatus::Completed)],
        );
        assert!(summary.is_empty());
    }
}
