//! Turns, slots and interjection chains.

use serde::{Deserialize, Serialize};

use crate::decision::{InternalState, InterjectionLine, SpeakingDecision, VisibleAction};
use crate::types::CharacterId;

/// Which kind of slot a turn fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// A base-order turn.
    Ordinary,
    /// Chain step 1: the interjector cuts in.
    Interjection,
    /// Chain step 2: the original speaker answers.
    Response,
    /// Chain step 3: the interjector pushes back.
    Counter,
    /// Chain step 4: the original speaker closes.
    FinalWord,
}

impl TurnKind {
    /// Whether this slot belongs to an interjection chain.
    #[must_use]
    pub fn in_chain(self) -> bool {
        !matches!(self, Self::Ordinary)
    }

    /// Whether the interjector (rather than the original speaker) fills it.
    #[must_use]
    pub fn by_interjector(self) -> bool {
        matches!(self, Self::Interjection | Self::Counter)
    }
}

/// The next slot the engine expects to be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Round the slot belongs to.
    pub round: u32,
    /// Who must fill it.
    pub speaker: CharacterId,
    /// What kind of turn it is.
    pub kind: TurnKind,
}

/// An accepted interjection: four fixed steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterjectionChain {
    /// Who cut in.
    pub interjector: CharacterId,
    /// Whose turn was interrupted.
    pub speaker: CharacterId,
    /// Next step to fill, 1 through 4.
    pub step: u8,
}

impl InterjectionChain {
    /// Number of turns in every chain.
    pub const LEN: u8 = 4;

    pub(crate) fn new(interjector: CharacterId, speaker: CharacterId) -> Self {
        Self {
            interjector,
            speaker,
            step: 1,
        }
    }

    /// Kind of the step that is due.
    #[must_use]
    pub fn expected_kind(&self) -> TurnKind {
        match self.step {
            1 => TurnKind::Interjection,
            2 => TurnKind::Response,
            3 => TurnKind::Counter,
            _ => TurnKind::FinalWord,
        }
    }

    /// Who fills the step that is due.
    #[must_use]
    pub fn expected_speaker(&self) -> &CharacterId {
        if self.expected_kind().by_interjector() {
            &self.interjector
        } else {
            &self.speaker
        }
    }
}

/// One committed turn. `internal` is private to the speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Round it was taken in.
    pub round: u32,
    /// Slot kind.
    pub kind: TurnKind,
    /// Who took it.
    pub speaker: CharacterId,
    /// What everyone saw.
    pub action: VisibleAction,
    /// Speaker's private state, if the slot produced one.
    pub internal: Option<InternalState>,
    /// Whether a neutral turn was substituted for a failed generation.
    pub substituted: bool,
}

impl Turn {
    /// Fill a slot with a speaking decision.
    #[must_use]
    pub fn spoken(slot: &Slot, decision: SpeakingDecision) -> Self {
        Self {
            round: slot.round,
            kind: slot.kind,
            speaker: slot.speaker.clone(),
            action: decision.action,
            internal: Some(decision.internal),
            substituted: false,
        }
    }

    /// Fill an interjector slot with an interjection line.
    #[must_use]
    pub fn interjected(slot: &Slot, line: &InterjectionLine) -> Self {
        Self {
            round: slot.round,
            kind: slot.kind,
            speaker: slot.speaker.clone(),
            action: VisibleAction {
                speaks: line.speaks.clone(),
                does: None,
                tone: line.tone.clone(),
            },
            internal: None,
            substituted: false,
        }
    }

    /// Neutral silent turn for a failed generation.
    #[must_use]
    pub fn substitute(slot: &Slot) -> Self {
        let mut turn = Self::spoken(slot, SpeakingDecision::neutral());
        turn.substituted = true;
        turn
    }

    /// Whether the speaker asked to leave on this turn.
    #[must_use]
    pub fn wants_to_exit(&self) -> bool {
        self.internal.as_ref().is_some_and(|i| i.wants_to_exit)
    }
}
