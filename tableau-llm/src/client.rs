//! LLM client: one interface over Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tableau_core::config::LlmConfig;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, LlmTier};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible chat-completions API.
    OpenAiCompatible {
        /// Server root, without `/v1`.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No backend: every call fails with [`LlmError::Unavailable`].
    None,
}

/// Routes requests to the configured backend with retries.
#[derive(Debug)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    turn_model: String,
    reflection_model: String,
    max_retries: u32,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        turn_model: impl Into<String>,
        reflection_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            turn_model: turn_model.into(),
            reflection_model: reflection_model.into(),
            max_retries,
        }
    }

    /// Create a client with no LLM backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, "", "", 0)
    }

    /// Build a client from the `[llm]` config section.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] for an unknown provider or a missing API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "none" => LlmProvider::None,
            "ollama" => LlmProvider::Ollama {
                base_url: config.base_url.clone(),
            },
            "openai" => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    LlmError::ConfigError(format!("{} is not set", config.api_key_env))
                })?;
                LlmProvider::OpenAiCompatible {
                    base_url: config.base_url.clone(),
                    api_key,
                }
            }
            other => {
                return Err(LlmError::ConfigError(format!("unknown provider '{other}'")));
            }
        };
        Ok(Self::new(
            provider,
            config.turn_model.clone(),
            config.reflection_model.clone(),
            config.max_retries,
        ))
    }

    /// Generate a completion.
    ///
    /// # Errors
    /// [`LlmError::Unavailable`] without a backend; otherwise
    /// [`LlmError::RetriesExhausted`] once every attempt has failed.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = match request.tier {
            LlmTier::Turn => &self.turn_model,
            LlmTier::Reflection => &self.reflection_model,
        };
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/generate");
                let body = json!({
                    "model": model,
                    "prompt": format!("{}\n\n{}", request.system, request.user),
                    "stream": false,
                    "format": "json",
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                self.send_with_retries(model, request.timeout_ms, "Ollama", || {
                    self.http.post(&url).json(&body)
                }, |json| {
                    (
                        json["response"].as_str().unwrap_or_default().to_string(),
                        json["eval_count"].as_u64(),
                    )
                })
                .await
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let body = json!({
                    "model": model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.send_with_retries(model, request.timeout_ms, "OpenAI", || {
                    self.http
                        .post(&url)
                        .header("Authorization", format!("Bearer {api_key}"))
                        .json(&body)
                }, |json| {
                    (
                        json["choices"][0]["message"]["content"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                        json["usage"]["completion_tokens"].as_u64(),
                    )
                })
                .await
            }
        }
    }

    async fn send_with_retries(
        &self,
        model: &str,
        timeout_ms: u64,
        backend: &'static str,
        build: impl Fn() -> RequestBuilder,
        extract: impl Fn(&Value) -> (String, Option<u64>),
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(backend, attempt = attempt + 1, of = self.max_retries + 1, "Retrying LLM call");
            }

            let start = Instant::now();
            let result = build()
                .timeout(Duration::from_millis(timeout_ms))
                .send()
                .await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let (text, tokens) = extract(&json);
                    debug!(backend, model, latency_ms, "LLM call completed");
                    return Ok(LlmResponse {
                        text,
                        tokens_generated: tokens
                            .and_then(|t| u32::try_from(t).ok())
                            .unwrap_or(0),
                        latency_ms,
                        model: model.to_string(),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_error = format!("HTTP {status}: {}", resp.text().await.unwrap_or_default());
                    warn!(backend, %status, "LLM backend returned an error");
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!(backend, timeout_ms, "LLM request timed out");
                    } else {
                        warn!(backend, error = %last_error, "LLM request failed");
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn none_provider_is_unavailable() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let err = client
            .generate(&LlmRequest::turn("system", "user"))
            .await
            .expect_err("no backend");
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[test]
    fn config_selects_provider() {
        let mut config = LlmConfig::default();
        assert!(LlmClient::from_config(&config).expect("ollama").is_available());

        config.provider = "none".into();
        assert!(!LlmClient::from_config(&config).expect("none").is_available());

        config.provider = "carrier-pigeon".into();
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn openai_requires_api_key() {
        let config = LlmConfig {
            provider: "openai".into(),
            api_key_env: "TABLEAU_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(LlmError::ConfigError(msg)) if msg.contains("TABLEAU_TEST_KEY_THAT_IS_NEVER_SET")
        ));
    }
}
