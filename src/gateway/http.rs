//! HTTP model provider speaking the OpenAI-compatible chat API.

use super::{Draft, GenerationRequest, Generator};
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Trailing confidence annotation some models append when asked, e.g.
/// `Confidence: 0.85` on the final line.
static CONFIDENCE_LINE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)\n\s*confidence:\s*(0?\.\d+|1\.0|1|0)\s*$").unwrap()
});

/// Chat-completions provider over HTTP.
pub struct HttpProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpProvider {
    /// Creates a provider for the given endpoint and model.
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Sets the bearer token sent with each request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn unavailable(&self, cause: impl Into<String>) -> Error {
        Error::ModelProviderUnavailable {
            provider: self.name.clone(),
            cause: cause.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl Generator for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Draft> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let mut http_request = self.client.post(&url).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(self.unavailable(format!("status {}", response.status())));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("malformed response: {e}")))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| self.unavailable("empty choices"))?;
        let usage = parsed.usage.unwrap_or_default();

        let (text, confidence) = split_confidence(&raw);
        Ok(Draft {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            self_reported_confidence: confidence,
        })
    }
}

/// Strips a trailing `Confidence: x` line and returns it separately.
fn split_confidence(raw: &str) -> (String, Option<f32>) {
    if let Some(m) = CONFIDENCE_LINE.captures(raw) {
        let value = m.get(1).and_then(|v| v.as_str().parse::<f32>().ok());
        let text = CONFIDENCE_LINE.replace(raw, "").trim_end().to_string();
        return (text, value.map(|v| v.clamp(0.0, 1.0)));
    }
    (raw.trim_end().to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_confidence_present() {
        let (text, confidence) = split_confidence("The answer.\nConfidence: 0.85");
        assert_eq!(text, "The answer.");
        assert_eq!(confidence, Some(0.85));
    }

    #[test]
    fn test_split_confidence_absent() {
        let (text, confidence) = split_confidence("Plain answer with no annotation.");
        assert_eq!(text, "Plain answer with no annotation.");
        assert!(confidence.is_none());
    }

    #[test]
    fn test_inline_mention_not_stripped() {
        let raw = "Confidence: 0.9 is what the model said earlier, then more text.";
        let (text, confidence) = split_confidence(raw);
        assert_eq!(text, raw);
        assert!(confidence.is_none());
    }
}
