//! Claim extraction from draft answers.
//!
//! Splits the draft into sentences and classifies each one that asserts a
//! checkable specific. A sentence can only carry one claim record; the
//! highest-priority matching category wins (monetary before deadline before
//! regulatory reference before statistical before authority citation).

use crate::models::{Claim, ClaimId, ClaimType};
use once_cell::sync::Lazy;
use regex::Regex;

struct ClaimPattern {
    claim_type: ClaimType,
    regex: Regex,
}

fn pattern(claim_type: ClaimType, source: &str) -> ClaimPattern {
    #[allow(clippy::unwrap_used)]
    let regex = Regex::new(source).unwrap();
    ClaimPattern { claim_type, regex }
}

/// Ordered by priority; the first match classifies the sentence.
static CLAIM_PATTERNS: Lazy<Vec<ClaimPattern>> = Lazy::new(|| {
    vec![
        pattern(
            ClaimType::Monetary,
            r"(?i)([€$£]\s?[\d,]+(\.\d+)?\s?(million|m|billion|bn|k)?|\b[\d,]+(\.\d+)?\s?(euros?|dollars?|pounds?)\b|\bfine[sd]?\s+(of|up to))",
        ),
        pattern(
            ClaimType::Deadline,
            r"(?i)\b(within\s+\d+\s+(hour|day|week|month|year)s?|no later than|by the end of|\d+[-\s]day\s+(window|period|deadline))\b",
        ),
        pattern(
            ClaimType::RegulatoryReference,
            r"(?i)\b(article\s+\d+[a-z]?|section\s+\d+(\.\d+)*|recital\s+\d+|annex\s+[ivx]+|\b(gdpr|hipaa|ccpa|sox|pci[-\s]?dss)\b)",
        ),
        pattern(
            ClaimType::Statistical,
            r"(?i)(\b\d+(\.\d+)?\s?%|\bpercent(age)?\b|\b\d+\s+(out of|in)\s+\d+\b)",
        ),
        pattern(
            ClaimType::AuthorityCitation,
            r"(?i)\b(according to|as stated by|the\s+(ico|edpb|regulator|supervisory authority|commission)\s+(states?|ruled?|requires?|recommends?))\b",
        ),
    ]
});

/// Entity-ish tokens inside a claim sentence: amounts, citations,
/// capitalized names.
static ENTITY_TOKENS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r"([€$£]\s?[\d,]+(?:\.\d+)?(?:\s?(?:million|billion|[mk]|bn))?|\b\d+(?:\.\d+)?\s?%|\b(?:Article|Section|Recital|Annex)\s+\w+|\b[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*)",
    )
    .unwrap()
});

/// Extracts atomic claims from a draft answer.
#[must_use]
pub fn extract(draft: &str) -> Vec<Claim> {
    let mut claims = Vec::new();
    for (start, sentence) in sentences(draft) {
        let Some(claim_type) = classify(sentence) else {
            continue;
        };
        let entities = ENTITY_TOKENS
            .find_iter(sentence)
            .map(|m| m.as_str().trim().to_string())
            .collect();
        claims.push(Claim {
            id: ClaimId::generate(),
            text: sentence.trim().to_string(),
            claim_type,
            entities,
            span: (start, start + sentence.len()),
        });
    }
    claims
}

fn classify(sentence: &str) -> Option<ClaimType> {
    CLAIM_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(sentence))
        .map(|p| p.claim_type)
}

/// Splits text into sentences with their byte offsets. Terminators stay
/// attached to their sentence.
fn sentences(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            let sentence = &text[start..end];
            if sentence.trim().len() > 3 {
                out.push((start, sentence));
            }
            start = end;
        }
    }
    let tail = &text[start..];
    if tail.trim().len() > 3 {
        out.push((start, tail));
    }
    out
}
