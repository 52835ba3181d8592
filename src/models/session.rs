//! Query session types and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a query session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ses_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Logical request identifier used for idempotent session starts.
///
/// Retrying `start_session` with the same request ID returns the existing
/// session instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a request ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compliance domain or framework tag (e.g. `gdpr`, `soc2`, `hipaa`).
///
/// Tags are normalized to lowercase so filters compare consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainTag(String);

impl DomainTag {
    /// Creates a normalized domain tag.
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller scope for a session: which user/organization the query runs under,
/// and the prior session when a conversation continues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    /// Opaque user identifier from the business-entity store.
    pub user_id: Option<String>,
    /// Opaque organization identifier from the business-entity store.
    pub org_id: Option<String>,
    /// Prior session ID when continuing a conversation.
    pub prior_session: Option<SessionId>,
}

impl Scope {
    /// Creates an empty (global) scope.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            user_id: None,
            org_id: None,
            prior_session: None,
        }
    }

    /// Sets the user identifier.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the organization identifier.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Sets the prior session for a continued conversation.
    #[must_use]
    pub fn with_prior_session(mut self, session: SessionId) -> Self {
        self.prior_session = Some(session);
        self
    }
}

/// Terminal status of a query session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The session is still progressing through its phases.
    Running,
    /// The session produced a verified response.
    Completed,
    /// The session failed with a [`FailureReason`].
    Failed,
    /// The session was handed off for human review or cancelled.
    Escalated,
}

impl SessionStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured reason code carried by a failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Both retrieval sources were unavailable during Perceive.
    RetrievalUnavailable,
    /// The verification pipeline exceeded its deadline.
    VerificationTimeout,
    /// The period budget was exhausted mid-session.
    BudgetExceeded,
    /// The session dispatched more steps than the configured bound.
    MaxStepsExceeded,
    /// Both model providers stayed unavailable through the retry budget.
    ModelProviderUnavailable,
    /// The caller cancelled the session.
    Cancelled,
}

impl FailureReason {
    /// Returns the reason as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RetrievalUnavailable => "retrieval_unavailable",
            Self::VerificationTimeout => "verification_timeout",
            Self::BudgetExceeded => "budget_exceeded",
            Self::MaxStepsExceeded => "max_steps_exceeded",
            Self::ModelProviderUnavailable => "model_provider_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user-initiated reasoning cycle.
///
/// Owned exclusively by the orchestrator for its lifetime; persisted
/// read-only afterwards by the memory manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySession {
    /// Unique session identifier.
    pub id: SessionId,
    /// The logical request this session answers.
    pub request_id: RequestId,
    /// The original query text.
    pub query: String,
    /// Detected or hinted domain/framework tag.
    pub domain: Option<DomainTag>,
    /// Caller scope.
    pub scope: Scope,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Current status.
    pub status: SessionStatus,
}
