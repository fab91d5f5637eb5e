//! # tableau-llm
//!
//! Model-backed response generation for tableau characters.
//!
//! - [`LlmClient`] talks to Ollama or any OpenAI-compatible endpoint with
//!   per-request timeouts and retries.
//! - [`PromptEngine`] renders speaking, observing and reflection prompts from
//!   built-in templates or TOML overrides.
//! - [`parse`] recovers a JSON object from imperfect model output.
//! - [`LlmResponder`] ties those together behind the core `Responder` trait.
//! - [`RuleBasedResponder`] answers from templates when no model is
//!   configured.

pub mod client;
pub mod error;
pub mod fallback;
pub mod parse;
pub mod prompt;
pub mod responder;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use fallback::RuleBasedResponder;
pub use prompt::{PromptEngine, PromptId};
pub use responder::LlmResponder;
pub use types::{LlmRequest, LlmResponse, LlmTier};
