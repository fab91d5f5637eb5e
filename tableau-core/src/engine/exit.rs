//! Exit policy: which round phase a beat is in and what an exit request does.

use serde::{Deserialize, Serialize};

use crate::config::ConversationConfig;

/// Round thresholds for the exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPolicy {
    /// Rounds `1..=locked_in_rounds` ignore exit requests.
    pub locked_in_rounds: u32,
    /// Entering this round ends the beat.
    pub forced_exit_round: u32,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl From<&ConversationConfig> for ExitPolicy {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            locked_in_rounds: config.locked_in_rounds,
            forced_exit_round: config.forced_exit_round,
        }
    }
}

impl ExitPolicy {
    /// Phase for a given round.
    #[must_use]
    pub fn phase(&self, round: u32) -> ExitPhase {
        if round >= self.forced_exit_round {
            ExitPhase::MustExit
        } else if round <= self.locked_in_rounds {
            ExitPhase::LockedIn
        } else {
            ExitPhase::CanExit
        }
    }

    /// Conversational energy for a given round, shown to the characters.
    #[must_use]
    pub fn energy(&self, round: u32) -> ConversationEnergy {
        if round <= self.locked_in_rounds {
            ConversationEnergy::High
        } else if round + 1 < self.forced_exit_round {
            ConversationEnergy::Medium
        } else {
            ConversationEnergy::Low
        }
    }
}

/// Exit policy phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPhase {
    /// Requests are recorded but not honoured.
    LockedIn,
    /// Requests remove the character from later rounds.
    CanExit,
    /// The conversation is over regardless of requests.
    MustExit,
}

/// How lively the conversation is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEnergy {
    /// Opening rounds.
    High,
    /// Middle rounds.
    Medium,
    /// Closing rounds.
    Low,
}

/// What happened to an exit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Locked-in phase: recorded only.
    Ignored,
    /// The character leaves before the next round.
    Granted,
    /// Every remaining participant wants out; the beat is over.
    BeatEnded,
    /// Must-exit phase: the beat ends regardless.
    Forced,
}
