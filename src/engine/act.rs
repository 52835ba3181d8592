//! Act phase: bounded-concurrency dispatch of action items.
//!
//! Autonomous items fan out up to the configured bound; items below the
//! autonomy threshold are recorded as `requires_confirmation` without
//! executing. Every dispatch consumes a step from the session's step
//! budget. Records append to the engine's action log as each item
//! finishes, so side effects that completed before a later failure stay
//! queryable.

use super::CognitionEngine;
use crate::gateway::{GenerationRequest, TaskComplexity};
use crate::models::{ActionItem, ActionRecord, ActionStatus, OperationTag, SessionId};
use crate::{current_timestamp, Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub(super) async fn run(
    engine: &Arc<CognitionEngine>,
    session_id: &SessionId,
    items: Vec<ActionItem>,
    steps: &Arc<AtomicUsize>,
    cancel: &CancellationToken,
) -> Result<Vec<ActionRecord>> {
    let max_steps = engine.config.orchestrator.max_steps;
    let fan_out = engine.config.orchestrator.act_fan_out.max(1);
    let semaphore = Arc::new(Semaphore::new(fan_out));
    let mut set: JoinSet<Result<ActionRecord>> = JoinSet::new();
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        if item.requires_confirmation {
            let record = deferred_record(session_id, &item);
            engine.append_action_record(record.clone());
            records.push(record);
            continue;
        }

        let step = steps.fetch_add(1, Ordering::SeqCst) + 1;
        if step > max_steps {
            set.shutdown().await;
            return Err(Error::MaxStepsExceeded { limit: max_steps });
        }

        let engine = Arc::clone(engine);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let session_id = session_id.clone();
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::Cancelled)?;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            execute(&engine, &session_id, item).await
        });
    }

    // All dispatches join before Learn; completion order is irrelevant.
    let mut fatal: Option<Error> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(record)) => records.push(record),
            Ok(Err(e)) => {
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
            Err(e) => {
                if fatal.is_none() {
                    fatal = Some(Error::OperationFailed {
                        operation: "act_dispatch".to_string(),
                        cause: e.to_string(),
                    });
                }
            }
        }
    }
    if let Some(e) = fatal {
        return Err(e);
    }

    metrics::counter!("engine_actions_total").increment(records.len() as u64);
    Ok(records)
}

/// Executes one autonomous item. Per-item failures become `Failed` records;
/// only budget exhaustion and cancellation abort the phase.
async fn execute(
    engine: &Arc<CognitionEngine>,
    session_id: &SessionId,
    item: ActionItem,
) -> Result<ActionRecord> {
    let (status, output, error, tokens_spent) = match item.operation {
        OperationTag::DraftGuidance | OperationTag::MapControl => {
            match generate_for(engine, &item).await {
                Ok(draft) => {
                    let tokens = draft.total_tokens();
                    (ActionStatus::Completed, Some(draft.text), None, tokens)
                }
                Err(e @ Error::BudgetExceeded { .. }) => return Err(e),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(action = %item.id, error = %e, "action failed");
                    (ActionStatus::Failed, None, Some(e.to_string()), 0)
                }
            }
        }
        OperationTag::CreateEvidence => (
            ActionStatus::Completed,
            Some(format!(
                "evidence stub: pending artifact for requirement '{}'",
                item.requirement.name
            )),
            None,
            0,
        ),
        OperationTag::EscalateReview => (
            ActionStatus::Completed,
            Some(format!(
                "escalated '{}' for human review (risk {:.1}/10)",
                item.requirement.name, item.risk_score
            )),
            None,
            0,
        ),
    };

    let record = ActionRecord {
        action_id: item.id,
        session_id: session_id.clone(),
        operation: item.operation,
        status,
        output,
        error,
        tokens_spent,
        finished_at: current_timestamp(),
    };
    engine.append_action_record(record.clone());
    Ok(record)
}

async fn generate_for(
    engine: &Arc<CognitionEngine>,
    item: &ActionItem,
) -> Result<crate::gateway::Draft> {
    let prompt = match item.operation {
        OperationTag::MapControl => format!(
            "Propose which existing control class satisfies the requirement \
             '{}' ({}), and why.",
            item.requirement.name, item.category
        ),
        _ => format!(
            "Draft remediation guidance for the requirement '{}' ({}). \
             Cite only sources provided in context.",
            item.requirement.name, item.category
        ),
    };
    let filtered = engine.verifier.prefilter(&prompt);
    let request = GenerationRequest::new(filtered.text)
        .with_max_tokens(512)
        .with_complexity(TaskComplexity::Low);
    engine.gateway.generate(&request).await
}

fn deferred_record(session_id: &SessionId, item: &ActionItem) -> ActionRecord {
    ActionRecord {
        action_id: item.id.clone(),
        session_id: session_id.clone(),
        operation: item.operation,
        status: ActionStatus::RequiresConfirmation,
        output: None,
        error: None,
        tokens_spent: 0,
        finished_at: current_timestamp(),
    }
}
