//! Error types for the tableau core library.

use thiserror::Error;

use crate::types::CharacterId;

/// Top-level error type for engine, graph, memory, and persistence operations.
///
/// Collaborator-side failures are *not* represented here. See
/// [`TurnGenerationFailure`], which is always recovered at turn granularity.
#[derive(Error, Debug)]
pub enum TableauError {
    /// An engine method was called out of sequence (e.g. starting a round
    /// while an interjection chain is unresolved). Always surfaced.
    #[error("Invalid engine state: {operation} not allowed while {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// Description of the state that forbids it.
        state: String,
    },

    /// A relationship mutation broke the decay or delta policy. State unchanged.
    #[error("Decay policy violation on {from} -> {to}: {reason}")]
    DecayPolicyViolation {
        /// Source of the edge.
        from: CharacterId,
        /// Target of the edge.
        to: CharacterId,
        /// What was violated.
        reason: String,
    },

    /// The character is not part of the cast.
    #[error("Unknown character: {0}")]
    UnknownCharacter(CharacterId),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableauError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            state: state.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, TableauError>;

/// A response-generation call that did not yield a usable decision.
///
/// Recovered locally: the coordinator substitutes a neutral turn, logs the
/// anomaly and bumps the failure counter. Never aborts a round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnGenerationFailure {
    /// The collaborator did not answer within the configured timeout.
    #[error("response generation timed out after {0}ms")]
    Timeout(u64),

    /// The payload was missing required fields or had the wrong shape.
    #[error("malformed decision payload: {0}")]
    Malformed(String),

    /// The collaborator could not be reached or refused the request.
    #[error("response generator unavailable: {0}")]
    Unavailable(String),
}
