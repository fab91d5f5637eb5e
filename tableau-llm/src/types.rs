//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};

/// Which configured model a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTier {
    /// Speaking and observing turns: many short calls.
    Turn,
    /// End-of-beat reflections: fewer, longer calls.
    Reflection,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt (character persona, rules, constraints).
    pub system: String,
    /// User prompt (scene, history, instructions).
    pub user: String,
    /// Which model to use.
    pub tier: LlmTier,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// A turn-tier request with default sampling.
    #[must_use]
    pub fn turn(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            tier: LlmTier::Turn,
            max_tokens: 200,
            temperature: 0.8,
            timeout_ms: 20_000,
        }
    }

    /// A reflection-tier request with default sampling.
    #[must_use]
    pub fn reflection(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            tier: LlmTier::Reflection,
            max_tokens: 400,
            temperature: 0.7,
            timeout_ms: 20_000,
        }
    }

    /// Set sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}
