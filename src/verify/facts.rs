//! Fact verification of extracted claims against the graph store.

use crate::models::graph::{EntityId, RelationType};
use crate::models::{Claim, ClaimType, DomainTag, VerificationResult, VerifiedClaim};
use crate::storage::traits::{EntityQuery, GraphStore};
use crate::Result;
use std::sync::Arc;

/// Verifies claims by looking up their entities and checking for
/// corroboration or contradiction in the relationship graph.
pub struct FactVerifier {
    graph: Arc<dyn GraphStore>,
}

impl FactVerifier {
    /// Creates a verifier over the graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Verifies every claim and returns them with attached results plus the
    /// aggregate fact score.
    ///
    /// # Errors
    ///
    /// Returns an error when a graph lookup fails; the caller treats that as
    /// a degraded stage, not a pass.
    pub async fn verify_all(
        &self,
        claims: Vec<Claim>,
        domain: Option<&DomainTag>,
    ) -> Result<(Vec<VerifiedClaim>, f32)> {
        if claims.is_empty() {
            // Nothing checkable asserted; the draft carries no fact risk.
            return Ok((Vec::new(), 1.0));
        }

        let mut verified_claims = Vec::with_capacity(claims.len());
        let mut score_sum = 0.0f32;
        for claim in claims {
            let result = self.verify_claim(&claim, domain).await?;
            score_sum += if result.verified {
                result.confidence
            } else {
                // Unverified claims drag the aggregate down hard.
                result.confidence * 0.3
            };
            verified_claims.push(VerifiedClaim { claim, result });
        }

        #[allow(clippy::cast_precision_loss)]
        let fact_score = (score_sum / verified_claims.len() as f32).clamp(0.0, 1.0);
        Ok((verified_claims, fact_score))
    }

    /// Verifies one claim: corroborated when the graph holds matching
    /// entities, contradicted when a matching entity disagrees on the
    /// claim's checkable attribute or carries a `violates` edge against a
    /// supporting entity.
    async fn verify_claim(
        &self,
        claim: &Claim,
        domain: Option<&DomainTag>,
    ) -> Result<VerificationResult> {
        let mut supporting: Vec<EntityId> = Vec::new();
        let mut contradicting: Vec<EntityId> = Vec::new();

        for name in claim_lookup_terms(claim) {
            let mut query = EntityQuery::new().with_name(name).with_limit(5);
            if let Some(domain) = domain {
                query = query.with_domain(domain.clone());
            }
            for entity in self.graph.find_entities(&query).await? {
                if let Some(expected) = checkable_attribute(claim.claim_type, &entity.attributes) {
                    if claim_mentions(claim, expected) {
                        supporting.push(entity.id);
                    } else {
                        contradicting.push(entity.id);
                    }
                } else {
                    supporting.push(entity.id);
                }
            }
        }
        // Multiple lookup terms can resolve to the same entity.
        supporting.sort_unstable();
        supporting.dedup();
        contradicting.sort_unstable();
        contradicting.dedup();

        // A violates edge against any supporting entity counts as live
        // contradiction evidence.
        for id in supporting.clone() {
            for rel in self.graph.relationships_of(&id).await? {
                if rel.relation == RelationType::Violates {
                    let other = if rel.from == id { rel.to } else { rel.from };
                    if !contradicting.contains(&other) {
                        contradicting.push(other);
                    }
                }
            }
        }

        let verified = !supporting.is_empty() && contradicting.is_empty();
        #[allow(clippy::cast_precision_loss)]
        let confidence = if verified {
            (0.6 + 0.1 * supporting.len() as f32).clamp(0.0, 0.9)
        } else if supporting.is_empty() {
            // No evidence either way.
            0.3
        } else {
            // Conflicting evidence.
            0.2
        };

        Ok(VerificationResult {
            verified,
            confidence,
            supporting,
            contradicting,
        })
    }
}

/// Attribute key a claim type is checked against, when the entity carries
/// one.
fn checkable_attribute(
    claim_type: ClaimType,
    attributes: &std::collections::BTreeMap<String, String>,
) -> Option<&str> {
    let key = match claim_type {
        ClaimType::Monetary => "amount",
        ClaimType::Deadline => "deadline",
        ClaimType::Statistical => "rate",
        _ => return None,
    };
    attributes.get(key).map(String::as_str)
}

fn claim_mentions(claim: &Claim, expected: &str) -> bool {
    let needle = expected.to_lowercase();
    claim.text.to_lowercase().contains(&needle)
}

/// Names worth looking up for a claim: its extracted entities, minus bare
/// amounts and percentages that would never be entity names.
fn claim_lookup_terms(claim: &Claim) -> impl Iterator<Item = &str> {
    claim
        .entities
        .iter()
        .map(String::as_str)
        .filter(|e| e.chars().any(char::is_alphabetic))
}
