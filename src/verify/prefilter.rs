//! Pre-generation risk filter.
//!
//! Scores an outgoing prompt against a fixed pattern library for the
//! phrasings most likely to bait a fabricated specific (amounts, deadlines,
//! statistics, authority claims). Prompts at or above the risk threshold are
//! rewritten to a safer equivalent through the substitution table below,
//! never rejected.

use once_cell::sync::Lazy;
use regex::Regex;

/// One risk pattern with its contribution weight.
struct RiskPattern {
    name: &'static str,
    regex: Regex,
    weight: f32,
}

fn pattern(name: &'static str, source: &str, weight: f32) -> RiskPattern {
    #[allow(clippy::unwrap_used)]
    let regex = Regex::new(source).unwrap();
    RiskPattern {
        name,
        regex,
        weight,
    }
}

static RISK_PATTERNS: Lazy<Vec<RiskPattern>> = Lazy::new(|| {
    vec![
        pattern(
            "monetary",
            r"(?i)(exact(ly)?\s+(fine|penalty|amount)|how much\s+(is|was)\s+the\s+(fine|penalty)|[€$£]\s?\d)",
            0.35,
        ),
        pattern(
            "deadline",
            r"(?i)(exact\s+deadline|precisely\s+when|within\s+exactly|\bthe deadline is\b)",
            0.3,
        ),
        pattern(
            "statistical",
            r"(?i)(what percentage|exact\s+(rate|percentage|number)|how many\s+\w+\s+(violated|breached))",
            0.25,
        ),
        pattern(
            "authority",
            r"(?i)(quote\s+(the\s+)?(regulator|authority|ico|edpb)|what did the\s+\w+\s+rule|cite the exact)",
            0.35,
        ),
    ]
});

/// Substitution table applied when a prompt crosses the risk threshold.
/// Each entry softens a demand for an unverifiable specific into a request
/// for a sourced range or a pointer to the authoritative text.
static SUBSTITUTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let table = vec![
        (
            Regex::new(r"(?i)exact(ly)?\s+(fine|penalty|amount)").unwrap(),
            "documented range of the $2",
        ),
        (
            Regex::new(r"(?i)exact\s+deadline").unwrap(),
            "deadline as stated in the cited source",
        ),
        (
            Regex::new(r"(?i)exact\s+(rate|percentage|number)").unwrap(),
            "reported $1, with its source",
        ),
        (
            Regex::new(r"(?i)quote\s+(the\s+)?(regulator|authority|ico|edpb)").unwrap(),
            "summarize the published position of the $2",
        ),
        (
            Regex::new(r"(?i)cite the exact").unwrap(),
            "cite the",
        ),
    ];
    table
});

/// Outcome of the pre-generation filter.
#[derive(Debug, Clone)]
pub struct FilteredPrompt {
    /// Prompt to send downstream, possibly rewritten.
    pub text: String,
    /// Risk score of the original prompt (0.0 to 1.0).
    pub risk: f32,
    /// Set when the substitution table rewrote the prompt.
    pub rewritten: bool,
}

/// Scores a prompt against the risk pattern library.
#[must_use]
pub fn risk_score(prompt: &str) -> f32 {
    let mut score = 0.0;
    for pattern in RISK_PATTERNS.iter() {
        if pattern.regex.is_match(prompt) {
            score += pattern.weight;
            tracing::trace!(pattern = pattern.name, "risk pattern matched");
        }
    }
    score.clamp(0.0, 1.0)
}

/// Applies the filter: at or above `threshold` the prompt is rewritten via
/// the substitution table.
#[must_use]
pub fn apply(prompt: &str, threshold: f32) -> FilteredPrompt {
    let risk = risk_score(prompt);
    if risk < threshold {
        return FilteredPrompt {
            text: prompt.to_string(),
            risk,
            rewritten: false,
        };
    }

    let mut text = prompt.to_string();
    for (regex, replacement) in SUBSTITUTIONS.iter() {
        text = regex.replace_all(&text, *replacement).into_owned();
    }
    let rewritten = text != prompt;
    if rewritten {
        metrics::counter!("verify_prompts_rewritten_total").increment(1);
        tracing::debug!(risk, "high-risk prompt rewritten before generation");
    }
    FilteredPrompt {
        text,
        risk,
        rewritten,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_prompt_scores_low() {
        let risk = risk_score("What are the data retention obligations under GDPR?");
        assert!(risk < 0.7);
    }

    #[test]
    fn test_specific_bait_scores_high() {
        let risk = risk_score(
            "Quote the ICO and tell me the exact fine and exact deadline for a late DPIA.",
        );
        assert!(risk >= 0.7);
    }

    #[test]
    fn test_high_risk_prompt_is_rewritten_not_rejected() {
        let filtered = apply(
            "Quote the ICO and tell me the exact fine and exact deadline for a late DPIA.",
            0.7,
        );
        assert!(filtered.rewritten);
        assert!(!filtered.text.to_lowercase().contains("exact fine"));
        assert!(!filtered.text.to_lowercase().contains("exact deadline"));
    }

    #[test]
    fn test_low_risk_prompt_untouched() {
        let prompt = "Summarize our SOC 2 control mapping.";
        let filtered = apply(prompt, 0.7);
        assert!(!filtered.rewritten);
        assert_eq!(filtered.text, prompt);
    }
}
