//! Memory record types and identifiers.

use super::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a memory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a memory ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique memory ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("mem_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The four memory tiers.
///
/// Retention differs per tier: episodic records have a bounded retention
/// window, semantic records are permanent unless explicitly invalidated,
/// and procedural records carry a confidence that decays without
/// reinforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// One interaction: what happened in a session.
    Episodic,
    /// A durable confirmed fact.
    Semantic,
    /// A learned pattern with decaying confidence.
    Procedural,
    /// A caller preference.
    Preference,
}

impl MemoryKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Preference => "preference",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owner scope of a memory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Scoped to one session.
    Session(SessionId),
    /// Scoped to one user.
    User(String),
    /// Shared across all callers.
    Global,
}

impl MemoryScope {
    /// Returns `true` when a record in this scope is visible to a query
    /// running under `other`.
    ///
    /// Global records are visible everywhere; user records to the same
    /// user; session records to the same session or its continuation.
    #[must_use]
    pub fn visible_to(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Global, _) | (_, Self::Global) => matches!(self, Self::Global),
            (Self::User(a), Self::User(b)) => a == b,
            (Self::Session(a), Self::Session(b)) => a == b,
            (Self::User(_) | Self::Session(_), _) => false,
        }
    }
}

/// One record in the tiered memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: MemoryId,
    /// Memory tier.
    pub kind: MemoryKind,
    /// Owner scope.
    pub scope: MemoryScope,
    /// Record payload.
    pub content: String,
    /// Embedding vector, when computed.
    pub embedding: Option<Vec<f32>>,
    /// Base importance score (0.0 to 1.0).
    ///
    /// The effective score is recency- and access-frequency-weighted by the
    /// memory manager; it increases monotonically on access and decays on a
    /// fixed schedule otherwise.
    pub importance: f32,
    /// Pattern confidence for procedural records (0.0 to 1.0).
    pub confidence: f32,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last-access timestamp (Unix epoch seconds).
    pub last_accessed: u64,
    /// IDs of records this one was consolidated from or relates to.
    pub related: Vec<MemoryId>,
    /// Stable fingerprint for procedural pattern matching.
    pub pattern_hash: Option<String>,
    /// Set when the record was explicitly invalidated (tombstoned).
    pub invalidated: bool,
}

impl MemoryRecord {
    /// Creates a new record with default scores.
    #[must_use]
    pub fn new(kind: MemoryKind, scope: MemoryScope, content: impl Into<String>) -> Self {
        let now = crate::current_timestamp();
        Self {
            id: MemoryId::generate(),
            kind,
            scope,
            content: content.into(),
            embedding: None,
            importance: 0.5,
            confidence: 0.5,
            created_at: now,
            last_accessed: now,
            related: Vec::new(),
            pattern_hash: None,
            invalidated: false,
        }
    }

    /// Sets the base importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    /// Sets the pattern confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Links related/provenance record IDs.
    #[must_use]
    pub fn with_related(mut self, related: Vec<MemoryId>) -> Self {
        self.related = related;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_visibility() {
        let global = MemoryScope::Global;
        let user_a = MemoryScope::User("a".to_string());
        let user_b = MemoryScope::User("b".to_string());
        let session = MemoryScope::Session(SessionId::new("s1"));

        assert!(global.visible_to(&user_a));
        assert!(global.visible_to(&session));
        assert!(user_a.visible_to(&user_a));
        assert!(!user_a.visible_to(&user_b));
        assert!(!user_a.visible_to(&global));
        assert!(session.visible_to(&MemoryScope::Session(SessionId::new("s1"))));
        assert!(!session.visible_to(&MemoryScope::Session(SessionId::new("s2"))));
    }

    #[test]
    fn test_record_defaults() {
        let record = MemoryRecord::new(MemoryKind::Episodic, MemoryScope::Global, "payload");
        assert_eq!(record.kind, MemoryKind::Episodic);
        assert!((record.importance - 0.5).abs() < f32::EPSILON);
        assert!(!record.invalidated);
        assert_eq!(record.created_at, record.last_accessed);
    }
}
