//! Configuration management.
//!
//! Every tunable weight and threshold in the engine lives here as an
//! explicit, immutable configuration struct passed by reference into each
//! component at construction. Nothing reads ambient global state, so
//! weights are testable and swappable per test case.
//!
//! Precedence: built-in defaults, then an optional TOML file, then
//! `VERIDEX_*` environment variable overrides.

use crate::models::RequirementCategory;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Orchestrator settings.
    pub orchestrator: OrchestratorConfig,
    /// Risk-scoring weights used by the Plan phase.
    pub risk: RiskConfig,
    /// Hybrid retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Memory manager settings.
    pub memory: MemoryConfig,
    /// Verification pipeline settings.
    pub verification: VerificationConfig,
    /// Model gateway settings.
    pub gateway: GatewayConfig,
}

/// Orchestrator state-machine settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum action items kept after Plan truncation.
    pub max_action_items: usize,
    /// Hard bound on execution steps within one session.
    pub max_steps: usize,
    /// Concurrent dispatch bound within the Act phase.
    pub act_fan_out: usize,
    /// Priority threshold for autonomous execution.
    pub autonomy_threshold: f32,
    /// Per-phase timeout in milliseconds.
    pub phase_timeout_ms: u64,
    /// Whole-session deadline in milliseconds.
    pub session_deadline_ms: u64,
    /// Bounded retry count per phase.
    pub max_phase_retries: u32,
    /// Base backoff between phase retries in milliseconds (exponential).
    pub retry_backoff_ms: u64,
    /// Violation count at which Learn flags a requirement.
    pub violation_flag_threshold: u32,
    /// Check pass rate below which Learn flags a control.
    pub control_pass_rate_floor: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_action_items: 5,
            max_steps: 10,
            act_fan_out: 5,
            autonomy_threshold: 0.8,
            phase_timeout_ms: 10_000,
            session_deadline_ms: 60_000,
            max_phase_retries: 3,
            retry_backoff_ms: 100,
            violation_flag_threshold: 3,
            control_pass_rate_floor: 0.7,
        }
    }
}

impl OrchestratorConfig {
    /// Per-phase timeout as a [`Duration`].
    #[must_use]
    pub const fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }

    /// Session deadline as a [`Duration`].
    #[must_use]
    pub const fn session_deadline(&self) -> Duration {
        Duration::from_millis(self.session_deadline_ms)
    }
}

/// Risk-scoring weights: `priority = impact_weight·(tier/10) +
/// enforcement_weight·enforcement_probability`.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Weight on the impact component.
    pub impact_weight: f32,
    /// Weight on the enforcement-precedent component.
    pub enforcement_weight: f32,
    /// Severity tier (1–10) per requirement category.
    pub severity_tiers: HashMap<RequirementCategory, u8>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let severity_tiers = [
            (RequirementCategory::DataRetention, 8),
            (RequirementCategory::DataProtection, 9),
            (RequirementCategory::AccessControl, 7),
            (RequirementCategory::IncidentResponse, 9),
            (RequirementCategory::Reporting, 6),
            (RequirementCategory::Training, 4),
            (RequirementCategory::VendorManagement, 5),
            (RequirementCategory::Other, 3),
        ]
        .into_iter()
        .collect();
        Self {
            impact_weight: 0.6,
            enforcement_weight: 0.4,
            severity_tiers,
        }
    }
}

impl RiskConfig {
    /// Severity tier for a category (defaults to the `Other` tier).
    #[must_use]
    pub fn severity_tier(&self, category: RequirementCategory) -> u8 {
        self.severity_tiers.get(&category).copied().unwrap_or(3)
    }
}

/// Hybrid retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Weight on the normalized vector-similarity score.
    pub vector_weight: f32,
    /// Weight on the normalized graph-centrality score.
    pub graph_weight: f32,
    /// Over-retrieval multiplier applied to `max_results` before merging.
    pub over_retrieve_factor: usize,
    /// Graph traversal hop bound.
    pub max_hops: usize,
    /// Default maximum results returned to callers.
    pub max_results: usize,
    /// Per-call retrieval timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            graph_weight: 0.4,
            over_retrieve_factor: 2,
            max_hops: 2,
            max_results: 10,
            timeout_ms: 900,
        }
    }
}

/// Memory manager settings.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Episodic retention window in seconds.
    pub episodic_retention_secs: u64,
    /// Recency window for candidate list (a) in seconds.
    pub recency_window_secs: u64,
    /// Importance half-life in days for the decay schedule.
    pub decay_half_life_days: f32,
    /// Importance boost applied per access (bounded at 1.0).
    pub access_boost: f32,
    /// Cosine-similarity threshold above which semantic duplicates merge.
    pub dedup_similarity_threshold: f32,
    /// Procedural confidence decay per day without reinforcement.
    pub confidence_decay_per_day: f32,
    /// Blend weight on recency for episodic ranking.
    pub episodic_recency_weight: f32,
    /// Blend weight on similarity for semantic ranking.
    pub semantic_similarity_weight: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            episodic_retention_secs: 30 * 86_400,
            recency_window_secs: 7 * 86_400,
            decay_half_life_days: 30.0,
            access_boost: 0.05,
            dedup_similarity_threshold: 0.92,
            confidence_decay_per_day: 0.01,
            episodic_recency_weight: 0.6,
            semantic_similarity_weight: 0.6,
        }
    }
}

/// Verification pipeline settings.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Weight on the fact-verification score.
    pub fact_weight: f32,
    /// Weight on the citation-validation score.
    pub citation_weight: f32,
    /// Weight on the internal-consistency score.
    pub consistency_weight: f32,
    /// Weight on the model's self-reported confidence.
    pub self_reported_weight: f32,
    /// Multiplicative penalty when any contradiction is detected.
    pub contradiction_penalty: f32,
    /// Multiplicative penalty for hedging/uncertain language.
    pub hedging_penalty: f32,
    /// Final-confidence threshold below which human review is required.
    pub approval_threshold: f32,
    /// Pre-generation risk threshold above which the prompt is rewritten.
    pub prefilter_risk_threshold: f32,
    /// Reliability assigned to sources missing from the whitelist.
    pub unknown_source_reliability: f32,
    /// Per-domain authoritative source identifiers with reliability weights.
    pub authoritative_sources: HashMap<String, f32>,
    /// Topics that force human review regardless of score.
    pub sensitive_topics: Vec<String>,
    /// Verification stage timeout in milliseconds.
    pub stage_timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        let authoritative_sources = [
            ("eur-lex", 0.98),
            ("ico-guidance", 0.95),
            ("edpb-guidelines", 0.95),
            ("nist-csf", 0.92),
            ("aicpa-soc", 0.9),
            ("hhs-hipaa", 0.95),
            ("internal-policy", 0.7),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            fact_weight: 0.4,
            citation_weight: 0.3,
            consistency_weight: 0.2,
            self_reported_weight: 0.1,
            contradiction_penalty: 0.5,
            hedging_penalty: 0.8,
            approval_threshold: 0.75,
            prefilter_risk_threshold: 0.7,
            unknown_source_reliability: 0.2,
            authoritative_sources,
            sensitive_topics: vec![
                "legal advice".to_string(),
                "active litigation".to_string(),
                "criminal liability".to_string(),
            ],
            stage_timeout_ms: 5_000,
        }
    }
}

impl VerificationConfig {
    /// Reliability weight for a source identifier.
    #[must_use]
    pub fn source_reliability(&self, source_id: &str) -> f32 {
        self.authoritative_sources
            .get(source_id)
            .copied()
            .unwrap_or(self.unknown_source_reliability)
    }

    /// Whether a source identifier is on the whitelist.
    #[must_use]
    pub fn is_authoritative(&self, source_id: &str) -> bool {
        self.authoritative_sources.contains_key(source_id)
    }
}

/// Model gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Consecutive failures before a provider's breaker opens.
    pub breaker_failure_threshold: u32,
    /// Breaker cooldown before a half-open trial, in milliseconds.
    pub breaker_reset_ms: u64,
    /// Prompt length (chars) above which a task classifies as high
    /// complexity.
    pub complexity_char_threshold: usize,
    /// Token budget per accounting period.
    pub period_budget_tokens: u64,
    /// Accounting period length in seconds.
    pub budget_period_secs: u64,
    /// Per-call generation timeout in milliseconds.
    pub generate_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 3,
            breaker_reset_ms: 30_000,
            complexity_char_threshold: 400,
            period_budget_tokens: 200_000,
            budget_period_secs: 3_600,
            generate_timeout_ms: 20_000,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Orchestrator section.
    pub orchestrator: Option<ConfigFileOrchestrator>,
    /// Risk section.
    pub risk: Option<ConfigFileRisk>,
    /// Retrieval section.
    pub retrieval: Option<ConfigFileRetrieval>,
    /// Verification section.
    pub verification: Option<ConfigFileVerification>,
    /// Gateway section.
    pub gateway: Option<ConfigFileGateway>,
}

/// Orchestrator section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileOrchestrator {
    /// Maximum action items.
    pub max_action_items: Option<usize>,
    /// Maximum execution steps.
    pub max_steps: Option<usize>,
    /// Act fan-out bound.
    pub act_fan_out: Option<usize>,
    /// Autonomy threshold.
    pub autonomy_threshold: Option<f32>,
    /// Per-phase timeout (ms).
    pub phase_timeout_ms: Option<u64>,
    /// Session deadline (ms).
    pub session_deadline_ms: Option<u64>,
    /// Retry count per phase.
    pub max_phase_retries: Option<u32>,
    /// Violation count that flags a requirement in Learn.
    pub violation_flag_threshold: Option<u32>,
    /// Pass rate floor that flags a control in Learn.
    pub control_pass_rate_floor: Option<f32>,
}

/// Risk section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRisk {
    /// Impact weight.
    pub impact_weight: Option<f32>,
    /// Enforcement weight.
    pub enforcement_weight: Option<f32>,
}

/// Retrieval section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetrieval {
    /// Vector weight.
    pub vector_weight: Option<f32>,
    /// Graph weight.
    pub graph_weight: Option<f32>,
    /// Hop bound.
    pub max_hops: Option<usize>,
    /// Default result limit.
    pub max_results: Option<usize>,
}

/// Verification section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileVerification {
    /// Approval threshold.
    pub approval_threshold: Option<f32>,
    /// Prefilter risk threshold.
    pub prefilter_risk_threshold: Option<f32>,
    /// Authoritative sources (id -> reliability).
    pub authoritative_sources: Option<HashMap<String, f32>>,
    /// Sensitive topics.
    pub sensitive_topics: Option<Vec<String>>,
}

/// Gateway section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGateway {
    /// Breaker failure threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset cooldown (ms).
    pub breaker_reset_ms: Option<u64>,
    /// Period token budget.
    pub period_budget_tokens: Option<u64>,
    /// Budget period (s).
    pub budget_period_secs: Option<u64>,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default platform location, falling back
    /// to defaults when no file exists.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("veridex").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config.with_env_overrides();
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a parsed [`ConfigFile`] into an [`EngineConfig`].
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(orch) = file.orchestrator {
            if let Some(v) = orch.max_action_items {
                config.orchestrator.max_action_items = v.max(1);
            }
            if let Some(v) = orch.max_steps {
                config.orchestrator.max_steps = v.max(1);
            }
            if let Some(v) = orch.act_fan_out {
                config.orchestrator.act_fan_out = v.max(1);
            }
            if let Some(v) = orch.autonomy_threshold {
                config.orchestrator.autonomy_threshold = v.clamp(0.0, 1.0);
            }
            if let Some(v) = orch.phase_timeout_ms {
                config.orchestrator.phase_timeout_ms = v;
            }
            if let Some(v) = orch.session_deadline_ms {
                config.orchestrator.session_deadline_ms = v;
            }
            if let Some(v) = orch.max_phase_retries {
                config.orchestrator.max_phase_retries = v;
            }
            if let Some(v) = orch.violation_flag_threshold {
                config.orchestrator.violation_flag_threshold = v;
            }
            if let Some(v) = orch.control_pass_rate_floor {
                config.orchestrator.control_pass_rate_floor = v.clamp(0.0, 1.0);
            }
        }
        if let Some(risk) = file.risk {
            if let Some(v) = risk.impact_weight {
                config.risk.impact_weight = v.clamp(0.0, 1.0);
            }
            if let Some(v) = risk.enforcement_weight {
                config.risk.enforcement_weight = v.clamp(0.0, 1.0);
            }
        }
        if let Some(retrieval) = file.retrieval {
            if let Some(v) = retrieval.vector_weight {
                config.retrieval.vector_weight = v.clamp(0.0, 1.0);
            }
            if let Some(v) = retrieval.graph_weight {
                config.retrieval.graph_weight = v.clamp(0.0, 1.0);
            }
            if let Some(v) = retrieval.max_hops {
                config.retrieval.max_hops = v;
            }
            if let Some(v) = retrieval.max_results {
                config.retrieval.max_results = v.max(1);
            }
        }
        if let Some(verification) = file.verification {
            if let Some(v) = verification.approval_threshold {
                config.verification.approval_threshold = v.clamp(0.0, 1.0);
            }
            if let Some(v) = verification.prefilter_risk_threshold {
                config.verification.prefilter_risk_threshold = v.clamp(0.0, 1.0);
            }
            if let Some(v) = verification.authoritative_sources {
                config.verification.authoritative_sources = v;
            }
            if let Some(v) = verification.sensitive_topics {
                config.verification.sensitive_topics = v;
            }
        }
        if let Some(gateway) = file.gateway {
            if let Some(v) = gateway.breaker_failure_threshold {
                config.gateway.breaker_failure_threshold = v.max(1);
            }
            if let Some(v) = gateway.breaker_reset_ms {
                config.gateway.breaker_reset_ms = v;
            }
            if let Some(v) = gateway.period_budget_tokens {
                config.gateway.period_budget_tokens = v;
            }
            if let Some(v) = gateway.budget_period_secs {
                config.gateway.budget_period_secs = v.max(1);
            }
        }

        config
    }

    /// Applies `VERIDEX_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("VERIDEX_MAX_ACTION_ITEMS") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.orchestrator.max_action_items = parsed.max(1);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_MAX_STEPS") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.orchestrator.max_steps = parsed.max(1);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_ACT_FAN_OUT") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.orchestrator.act_fan_out = parsed.max(1);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_AUTONOMY_THRESHOLD") {
            if let Ok(parsed) = v.parse::<f32>() {
                self.orchestrator.autonomy_threshold = parsed.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_VECTOR_WEIGHT") {
            if let Ok(parsed) = v.parse::<f32>() {
                self.retrieval.vector_weight = parsed.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_GRAPH_WEIGHT") {
            if let Ok(parsed) = v.parse::<f32>() {
                self.retrieval.graph_weight = parsed.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_APPROVAL_THRESHOLD") {
            if let Ok(parsed) = v.parse::<f32>() {
                self.verification.approval_threshold = parsed.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_PERIOD_BUDGET_TOKENS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.gateway.period_budget_tokens = parsed;
            }
        }
        if let Ok(v) = std::env::var("VERIDEX_BREAKER_FAILURE_THRESHOLD") {
            if let Ok(parsed) = v.parse::<u32>() {
                self.gateway.breaker_failure_threshold = parsed.max(1);
            }
        }

        self
    }
}
