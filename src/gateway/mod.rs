//! Model gateway: complexity routing, circuit breaking and token budgets.
//!
//! The gateway owns every model call the engine makes. Requests classify
//! into a complexity tier, route to the matching provider (fast for low,
//! capable for high), and fall back to the other provider when the
//! preferred one is broken or failing transiently. Each provider sits
//! behind its own [`CircuitBreaker`], and all spend flows through one
//! [`BudgetLedger`].

mod breaker;
mod budget;
mod http;

pub use breaker::{BreakerState, CircuitBreaker};
pub use budget::BudgetLedger;
pub use http::HttpProvider;

use crate::config::GatewayConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Rough chars-per-token ratio used to reserve budget before a call.
const CHARS_PER_TOKEN: usize = 4;

/// Task complexity tier, used for provider routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskComplexity {
    /// Short transformation or extraction work; routed to the fast model.
    Low,
    /// Long-context reasoning or drafting; routed to the capable model.
    High,
}

impl TaskComplexity {
    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Forced complexity tier; inferred from prompt length when unset.
    pub complexity: Option<TaskComplexity>,
}

impl GenerationRequest {
    /// Creates a request with standard sampling settings.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 1024,
            temperature: 0.2,
            complexity: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the completion token cap.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Forces a complexity tier.
    #[must_use]
    pub const fn with_complexity(mut self, complexity: TaskComplexity) -> Self {
        self.complexity = Some(complexity);
        self
    }
}

/// A model completion with spend accounting.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Completion text.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens consumed by the completion.
    pub completion_tokens: u64,
    /// Confidence the model reported for its own answer, when asked.
    pub self_reported_confidence: Option<f32>,
}

impl Draft {
    /// Total tokens this draft cost.
    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Trait for model providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name, used in logs and error causes.
    fn name(&self) -> &str;

    /// Produces a completion for the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelProviderUnavailable`] when the provider cannot
    /// serve the call.
    async fn generate(&self, request: &GenerationRequest) -> Result<Draft>;
}

struct ProviderSlot {
    provider: Arc<dyn Generator>,
    breaker: CircuitBreaker,
}

/// Gateway over a fast and a capable provider.
pub struct ModelGateway {
    fast: ProviderSlot,
    capable: ProviderSlot,
    budget: BudgetLedger,
    config: GatewayConfig,
}

impl ModelGateway {
    /// Creates a gateway over the two providers.
    #[must_use]
    pub fn new(
        fast: Arc<dyn Generator>,
        capable: Arc<dyn Generator>,
        config: GatewayConfig,
    ) -> Self {
        let slot = |provider: Arc<dyn Generator>| ProviderSlot {
            provider,
            breaker: CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_reset_ms),
        };
        Self {
            fast: slot(fast),
            capable: slot(capable),
            budget: BudgetLedger::new(config.period_budget_tokens, config.budget_period_secs),
            config,
        }
    }

    /// Classifies a request into a complexity tier.
    #[must_use]
    pub fn classify(&self, request: &GenerationRequest) -> TaskComplexity {
        request.complexity.unwrap_or_else(|| {
            let total_chars =
                request.prompt.len() + request.system.as_deref().map_or(0, str::len);
            if total_chars > self.config.complexity_char_threshold {
                TaskComplexity::High
            } else {
                TaskComplexity::Low
            }
        })
    }

    /// Tokens spent in the current budget period.
    #[must_use]
    pub fn tokens_spent(&self) -> u64 {
        self.budget.spent()
    }

    /// Generates a completion, routing by complexity with fallback.
    ///
    /// Budget is reserved up front from a character-count estimate and
    /// settled against the provider's reported usage afterwards. Each call
    /// is bounded by the configured generation timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BudgetExceeded`] when the period budget cannot cover
    /// the call, [`Error::ModelProviderUnavailable`] when both providers are
    /// down, and [`Error::Timeout`] when a provider exceeded the generation
    /// timeout and no fallback succeeded.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Draft> {
        let complexity = self.classify(request);
        let estimate = estimate_tokens(request);
        self.budget.try_charge(estimate)?;

        let (primary, secondary) = match complexity {
            TaskComplexity::Low => (&self.fast, &self.capable),
            TaskComplexity::High => (&self.capable, &self.fast),
        };

        let result = match self.call_slot(primary, request).await {
            Ok(draft) => Ok(draft),
            Err(primary_err) if primary_err.is_transient() || is_provider_down(&primary_err) => {
                tracing::warn!(
                    provider = primary.provider.name(),
                    error = %primary_err,
                    "primary provider failed, trying fallback"
                );
                metrics::counter!("gateway_fallbacks_total").increment(1);
                self.call_slot(secondary, request).await.map_err(|_| primary_err)
            }
            Err(other) => Err(other),
        };

        match result {
            Ok(draft) => {
                // Settle the reservation against actual usage.
                let actual = draft.total_tokens();
                if actual > estimate {
                    self.budget.try_charge(actual - estimate)?;
                } else {
                    self.budget.refund(estimate - actual);
                }
                metrics::counter!("gateway_tokens_total", "complexity" => complexity.as_str())
                    .increment(actual);
                Ok(draft)
            }
            Err(e) => {
                self.budget.refund(estimate);
                Err(e)
            }
        }
    }

    async fn call_slot(&self, slot: &ProviderSlot, request: &GenerationRequest) -> Result<Draft> {
        if !slot.breaker.allow() {
            return Err(Error::ModelProviderUnavailable {
                provider: slot.provider.name().to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let timeout = Duration::from_millis(self.config.generate_timeout_ms);
        let outcome = tokio::time::timeout(timeout, slot.provider.generate(request)).await;
        match outcome {
            Ok(Ok(draft)) => {
                slot.breaker.record_success();
                Ok(draft)
            }
            Ok(Err(e)) => {
                slot.breaker.record_failure();
                Err(e)
            }
            Err(_) => {
                slot.breaker.record_failure();
                Err(Error::Timeout {
                    operation: format!("generate({})", slot.provider.name()),
                    elapsed_ms: self.config.generate_timeout_ms,
                })
            }
        }
    }
}

fn estimate_tokens(request: &GenerationRequest) -> u64 {
    let prompt_chars = request.prompt.len() + request.system.as_deref().map_or(0, str::len);
    let prompt_estimate = (prompt_chars / CHARS_PER_TOKEN) as u64;
    prompt_estimate + u64::from(request.max_tokens)
}

const fn is_provider_down(error: &Error) -> bool {
    matches!(error, Error::ModelProviderUnavailable { .. })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubGenerator {
        name: &'static str,
        fail: bool,
        calls: AtomicU32,
    }

    impl StubGenerator {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                fail: true,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<Draft> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::ModelProviderUnavailable {
                    provider: self.name.to_string(),
                    cause: "stub failure".to_string(),
                });
            }
            Ok(Draft {
                text: format!("answer from {}", self.name),
                prompt_tokens: 10,
                completion_tokens: 20,
                self_reported_confidence: Some(0.9),
            })
        }
    }

    fn gateway(fast: StubGenerator, capable: StubGenerator) -> ModelGateway {
        ModelGateway::new(Arc::new(fast), Arc::new(capable), GatewayConfig::default())
    }

    #[tokio::test]
    async fn test_short_prompt_routes_fast() {
        let gateway = gateway(StubGenerator::ok("fast"), StubGenerator::ok("capable"));
        let draft = gateway
            .generate(&GenerationRequest::new("short prompt"))
            .await
            .unwrap();
        assert_eq!(draft.text, "answer from fast");
    }

    #[tokio::test]
    async fn test_long_prompt_routes_capable() {
        let gateway = gateway(StubGenerator::ok("fast"), StubGenerator::ok("capable"));
        let draft = gateway
            .generate(&GenerationRequest::new("x".repeat(500)))
            .await
            .unwrap();
        assert_eq!(draft.text, "answer from capable");
    }

    #[tokio::test]
    async fn test_fallback_on_primary_failure() {
        let gateway = gateway(StubGenerator::failing("fast"), StubGenerator::ok("capable"));
        let draft = gateway
            .generate(&GenerationRequest::new("short prompt"))
            .await
            .unwrap();
        assert_eq!(draft.text, "answer from capable");
    }

    #[tokio::test]
    async fn test_both_down_reports_primary_error() {
        let gateway = gateway(
            StubGenerator::failing("fast"),
            StubGenerator::failing("capable"),
        );
        let err = gateway
            .generate(&GenerationRequest::new("short prompt"))
            .await;
        assert!(matches!(
            err,
            Err(Error::ModelProviderUnavailable { provider, .. }) if provider == "fast"
        ));
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let config = GatewayConfig {
            period_budget_tokens: 10,
            ..GatewayConfig::default()
        };
        let gateway = ModelGateway::new(
            Arc::new(StubGenerator::ok("fast")),
            Arc::new(StubGenerator::ok("capable")),
            config,
        );
        let err = gateway.generate(&GenerationRequest::new("hello")).await;
        assert!(matches!(err, Err(Error::BudgetExceeded { .. })));
    }

    #[tokio::test]
    async fn test_failed_call_refunds_budget() {
        let gateway = gateway(
            StubGenerator::failing("fast"),
            StubGenerator::failing("capable"),
        );
        let _ = gateway.generate(&GenerationRequest::new("short")).await;
        assert_eq!(gateway.tokens_spent(), 0);
    }

    #[tokio::test]
    async fn test_explicit_complexity_overrides_length() {
        let gateway = gateway(StubGenerator::ok("fast"), StubGenerator::ok("capable"));
        let request =
            GenerationRequest::new("short").with_complexity(TaskComplexity::High);
        let draft = gateway.generate(&request).await.unwrap();
        assert_eq!(draft.text, "answer from capable");
    }
}
