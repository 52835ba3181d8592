//! Source/citation validation against the authoritative-source whitelist.

use crate::config::VerificationConfig;
use crate::models::{Citation, SourceRef};

/// Validates the sources a draft answer rests on.
///
/// Unlisted sources get the configured low reliability weight rather than
/// rejection. Returns the citations and the aggregate citation score (mean
/// reliability; a draft citing nothing scores a flat 0.5, checkable claims
/// without sources are the fact stage's problem).
#[must_use]
pub fn validate(sources: &[SourceRef], config: &VerificationConfig) -> (Vec<Citation>, f32) {
    if sources.is_empty() {
        return (Vec::new(), 0.5);
    }

    let citations: Vec<Citation> = sources
        .iter()
        .map(|source| {
            let listed = config.authoritative_sources.get(&source.id).copied();
            Citation {
                source: source.clone(),
                reliability: listed.unwrap_or(config.unknown_source_reliability),
                verified: listed.is_some(),
            }
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let score = citations.iter().map(|c| c.reliability).sum::<f32>() / citations.len() as f32;
    (citations, score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelisted_source_keeps_weight() {
        let config = VerificationConfig::default();
        let (citations, score) = validate(&[SourceRef::new("eur-lex")], &config);
        assert!(citations[0].verified);
        assert!((score - 0.98).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_source_downweighted_not_rejected() {
        let config = VerificationConfig::default();
        let (citations, score) = validate(&[SourceRef::new("some-blog")], &config);
        assert!(!citations[0].verified);
        assert!((score - config.unknown_source_reliability).abs() < 1e-5);
    }

    #[test]
    fn test_mixed_sources_average() {
        let config = VerificationConfig::default();
        let (citations, score) = validate(
            &[SourceRef::new("eur-lex"), SourceRef::new("some-blog")],
            &config,
        );
        assert_eq!(citations.len(), 2);
        let expected = f32::midpoint(0.98, config.unknown_source_reliability);
        assert!((score - expected).abs() < 1e-5);
    }

    #[test]
    fn test_no_sources_neutral() {
        let config = VerificationConfig::default();
        let (citations, score) = validate(&[], &config);
        assert!(citations.is_empty());
        assert!((score - 0.5).abs() < f32::EPSILON);
    }
}
