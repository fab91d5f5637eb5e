//! LLM error types.

use tableau_core::TurnGenerationFailure;
use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Response text held no parseable JSON object.
    #[error("Failed to parse LLM response as JSON: {0}")]
    ParseError(String),

    /// JSON parsed but did not match the expected decision shape.
    #[error("LLM output schema validation failed: {0}")]
    SchemaValidation(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// LLM provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

impl From<LlmError> for TurnGenerationFailure {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(ms) => Self::Timeout(ms),
            LlmError::ParseError(msg) | LlmError::SchemaValidation(msg) => Self::Malformed(msg),
            other => Self::Unavailable(other.to_string()),
        }
    }
}
