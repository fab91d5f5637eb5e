//! [`Responder`] backed by an [`LlmClient`].

use async_trait::async_trait;
use serde_json::Value;
use tableau_core::config::LlmConfig;
use tableau_core::context::{ObservationRequest, ReflectionRequest, TurnRequest};
use tableau_core::decision::{
    ObservingDecision, Reflection, SpeakingDecision, parse_observing, parse_reflection,
    parse_speaking,
};
use tableau_core::{Responder, TurnGenerationFailure};
use tracing::debug;

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::parse::{extract_json, normalise_turn};
use crate::prompt::PromptEngine;
use crate::types::LlmRequest;

/// Renders each request into a prompt, calls the model and validates the
/// answer with the core decision parsers.
#[derive(Debug)]
pub struct LlmResponder {
    client: LlmClient,
    prompts: PromptEngine,
    temperature: f32,
    max_tokens: u32,
    timeout_ms: u64,
}

impl LlmResponder {
    /// Wrap a client with the built-in prompts.
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client,
            prompts: PromptEngine::builtin(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            timeout_ms: defaults.request_timeout_ms,
        }
    }

    /// Build the client and prompt set from the `[llm]` config section.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] for an unknown provider, a missing API key
    /// or an unreadable prompt directory.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let prompts = match &config.prompt_dir {
            Some(dir) => PromptEngine::from_directory(dir)?,
            None => PromptEngine::builtin(),
        };
        Ok(Self {
            client: LlmClient::from_config(config)?,
            prompts,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_ms: config.request_timeout_ms,
        })
    }

    /// Replace the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptEngine) -> Self {
        self.prompts = prompts;
        self
    }

    async fn ask(&self, request: LlmRequest) -> Result<Value, LlmError> {
        let response = self.client.generate(&request).await?;
        debug!(
            model = %response.model,
            tokens = response.tokens_generated,
            latency_ms = response.latency_ms,
            "Model answered"
        );
        extract_json(&response.text)
    }

    fn turn_request(&self, (system, user): (String, String)) -> LlmRequest {
        LlmRequest::turn(system, user)
            .with_sampling(self.temperature, self.max_tokens)
            .with_timeout(self.timeout_ms)
    }

    fn reflection_request(&self, (system, user): (String, String)) -> LlmRequest {
        LlmRequest::reflection(system, user)
            .with_sampling(self.temperature, self.max_tokens)
            .with_timeout(self.timeout_ms)
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn speaking_turn(
        &self,
        request: &TurnRequest,
    ) -> Result<SpeakingDecision, TurnGenerationFailure> {
        let prompt = self.prompts.speaking(request)?;
        let value = self.ask(self.turn_request(prompt)).await?;
        parse_speaking(normalise_turn(value))
    }

    async fn observing_turn(
        &self,
        request: &ObservationRequest,
    ) -> Result<ObservingDecision, TurnGenerationFailure> {
        let prompt = self.prompts.observing(request)?;
        let value = self.ask(self.turn_request(prompt)).await?;
        parse_observing(value)
    }

    async fn reflect(
        &self,
        request: &ReflectionRequest,
    ) -> Result<Reflection, TurnGenerationFailure> {
        let prompt = self.prompts.reflection(request)?;
        let value = self.ask(self.reflection_request(prompt)).await?;
        parse_reflection(value)
    }
}
