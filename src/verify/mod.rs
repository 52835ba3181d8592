//! Multi-stage verification pipeline.
//!
//! Gates every draft answer before it reaches a caller:
//!
//! ```text
//! prompt ──▶ pre-generation risk filter (rewrite, never reject)
//!                    │
//!                 generation (outside this module)
//!                    │
//! draft ───▶ claim extraction ──▶ fact verification (graph store)
//!                    │
//!            citation validation (source whitelist)
//!                    │
//!            confidence aggregation + human-review decision
//! ```
//!
//! Each stage contributes a partial score, and any stage may veto (force
//! human review) independent of the aggregate. A stage that cannot complete
//! contributes a neutral-but-penalized score and flags the result as
//! degraded rather than passing it through unchecked.

pub mod citations;
pub mod claims;
mod facts;
pub mod prefilter;

pub use facts::FactVerifier;
pub use prefilter::FilteredPrompt;

use crate::config::VerificationConfig;
use crate::gateway::Draft;
use crate::models::{Citation, ClaimType, DomainTag, SourceRef, VerifiedClaim};
use crate::storage::traits::GraphStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

/// Score a failed stage contributes: neutral, minus a penalty for the
/// blind spot.
const DEGRADED_STAGE_SCORE: f32 = 0.4;

static HEDGING: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r"(?i)\b(might|possibly|perhaps|it is unclear|i am not (sure|certain)|cannot confirm|may or may not|unverified)\b",
    )
    .unwrap()
});

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\d[\d,]*(\.\d+)?").unwrap()
});

/// Aggregated verification outcome for one draft answer.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// Claims with attached verification results.
    pub claims: Vec<VerifiedClaim>,
    /// Validated citations.
    pub citations: Vec<Citation>,
    /// Fact-verification stage score.
    pub fact_score: f32,
    /// Citation-validation stage score.
    pub citation_score: f32,
    /// Internal-consistency stage score.
    pub consistency_score: f32,
    /// Model self-reported confidence (0.5 when the model gave none).
    pub self_reported: f32,
    /// Final aggregated confidence after penalties.
    pub final_confidence: f32,
    /// Any contradiction found by any stage.
    pub contradiction_detected: bool,
    /// Hedging language found in the draft.
    pub hedging_detected: bool,
    /// A stage vetoed the response outright.
    pub vetoed: bool,
    /// One or more stages could not complete.
    pub degraded: bool,
    /// Final human-review decision.
    pub requires_human_review: bool,
}

/// The verification pipeline over a graph store.
pub struct VerificationPipeline {
    facts: FactVerifier,
    config: VerificationConfig,
}

impl VerificationPipeline {
    /// Creates a pipeline over the graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>, config: VerificationConfig) -> Self {
        Self {
            facts: FactVerifier::new(graph),
            config,
        }
    }

    /// Pre-generation stage: scores the prompt and rewrites it above the
    /// risk threshold.
    #[must_use]
    pub fn prefilter(&self, prompt: &str) -> FilteredPrompt {
        prefilter::apply(prompt, self.config.prefilter_risk_threshold)
    }

    /// Post-generation stages: extraction, fact verification, citation
    /// validation, aggregation, review decision.
    ///
    /// Infallible by contract; a stage failure degrades the report instead
    /// of erroring.
    pub async fn verify(
        &self,
        query: &str,
        draft: &Draft,
        sources: &[SourceRef],
        domain: Option<&DomainTag>,
    ) -> VerificationReport {
        let span = tracing::info_span!("verify.pipeline");
        let _enter = span.enter();

        let extracted = claims::extract(&draft.text);
        let claim_count = extracted.len();

        let mut degraded = false;
        let stage_timeout = Duration::from_millis(self.config.stage_timeout_ms);
        let fact_outcome =
            tokio::time::timeout(stage_timeout, self.facts.verify_all(extracted, domain)).await;
        let (claims, fact_score) = match fact_outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "fact verification unavailable");
                degraded = true;
                (Vec::new(), DEGRADED_STAGE_SCORE)
            }
            Err(_) => {
                tracing::warn!("fact verification timed out");
                degraded = true;
                (Vec::new(), DEGRADED_STAGE_SCORE)
            }
        };

        let (citations, citation_score) = citations::validate(sources, &self.config);
        let consistency_score = internal_consistency(&claims);
        let self_reported = draft.self_reported_confidence.unwrap_or(0.5);

        let contradiction_detected = consistency_score < 1.0
            || claims.iter().any(|c| !c.result.contradicting.is_empty());
        let hedging_detected = HEDGING.is_match(&draft.text);

        let weighted = self.config.fact_weight * fact_score
            + self.config.citation_weight * citation_score
            + self.config.consistency_weight * consistency_score
            + self.config.self_reported_weight * self_reported;
        let mut final_confidence = weighted;
        if contradiction_detected {
            final_confidence *= self.config.contradiction_penalty;
        }
        if hedging_detected {
            final_confidence *= self.config.hedging_penalty;
        }
        final_confidence = final_confidence.clamp(0.0, 1.0);

        let vetoed = claims.iter().any(|c| c.result.forces_review())
            || self.touches_sensitive_topic(query, &draft.text);
        let requires_human_review =
            final_confidence < self.config.approval_threshold || vetoed;

        metrics::histogram!("verify_final_confidence").record(f64::from(final_confidence));
        metrics::counter!(
            "verify_drafts_total",
            "review" => if requires_human_review { "required" } else { "auto" }
        )
        .increment(1);
        tracing::debug!(
            claim_count,
            fact_score,
            citation_score,
            final_confidence,
            requires_human_review,
            "draft verified"
        );

        VerificationReport {
            claims,
            citations,
            fact_score,
            citation_score,
            consistency_score,
            self_reported,
            final_confidence,
            contradiction_detected,
            hedging_detected,
            vetoed,
            degraded,
            requires_human_review,
        }
    }

    fn touches_sensitive_topic(&self, query: &str, answer: &str) -> bool {
        let query = query.to_lowercase();
        let answer = answer.to_lowercase();
        self.config
            .sensitive_topics
            .iter()
            .any(|topic| query.contains(topic.as_str()) || answer.contains(topic.as_str()))
    }
}

/// Internal consistency: two claims of the same type that share a named
/// entity but disagree on their numbers count as a contradiction within the
/// draft itself.
fn internal_consistency(claims: &[VerifiedClaim]) -> f32 {
    let mut conflicts = 0usize;
    for (i, a) in claims.iter().enumerate() {
        for b in &claims[i + 1..] {
            if a.claim.claim_type != b.claim.claim_type {
                continue;
            }
            if a.claim.claim_type == ClaimType::Other {
                continue;
            }
            if !shares_named_entity(&a.claim.entities, &b.claim.entities) {
                continue;
            }
            let nums_a = numeric_tokens(&a.claim.text);
            let nums_b = numeric_tokens(&b.claim.text);
            if !nums_a.is_empty() && !nums_b.is_empty() && nums_a != nums_b {
                conflicts += 1;
            }
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let penalty = 0.4 * conflicts as f32;
    (1.0 - penalty).clamp(0.0, 1.0)
}

fn shares_named_entity(a: &[String], b: &[String]) -> bool {
    a.iter()
        .filter(|e| e.chars().any(char::is_alphabetic))
        .any(|e| b.contains(e))
}

fn numeric_tokens(text: &str) -> Vec<String> {
    NUMERIC_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
