//! Turn/Round Engine: the per-beat conversation state machine.
//!
//! ```text
//!            commit_turn               advance_turn
//! AwaitingTurn ───────► TurnTaken ───────────────────► AwaitingTurn | RoundComplete
//!                          │ request_interjection (accepted)
//!                          ▼
//!                    Chain(step 1..4) ── commit_turn ×4 ──► next slot | RoundComplete
//!
//! RoundComplete ── start_round ──► AwaitingTurn | Ended
//! any (no open chain) ── end_beat ──► Ended
//! ```
//!
//! One engine instance is scoped to one beat and owned by the coordinator.
//! Every mutation is synchronous; the engine never awaits anything, so it is
//! always in the state as of the last committed turn.

pub mod exit;
pub mod turn;

pub use exit::{ConversationEnergy, ExitOutcome, ExitPhase, ExitPolicy};
pub use turn::{InterjectionChain, Slot, Turn, TurnKind};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TableauError};
use crate::types::CharacterId;

/// Why a beat ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every remaining participant asked to leave.
    AllExited,
    /// The forced-exit round was reached.
    ForcedRoundLimit,
    /// Only one participant remains.
    Deserted,
    /// The director ended the beat.
    DirectorOverride,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AllExited => "all participants exited",
            Self::ForcedRoundLimit => "round limit reached",
            Self::Deserted => "only one participant left",
            Self::DirectorOverride => "ended by the director",
        })
    }
}

/// Where the engine is in the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum EnginePhase {
    /// The base-order speaker at the current index has not spoken yet.
    AwaitingTurn,
    /// The current speaker has spoken; interjections may be requested.
    TurnTaken,
    /// An interjection chain is open.
    Chain(InterjectionChain),
    /// Every base-order slot has been filled.
    RoundComplete,
    /// Terminal.
    Ended {
        /// Why.
        reason: EndReason,
    },
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingTurn => f.write_str("awaiting a turn"),
            Self::TurnTaken => f.write_str("the current turn is taken"),
            Self::Chain(chain) => write!(
                f,
                "{} is interjecting on {} (step {})",
                chain.interjector, chain.speaker, chain.step
            ),
            Self::RoundComplete => f.write_str("the round is complete"),
            Self::Ended { reason } => write!(f, "the beat has ended ({reason})"),
        }
    }
}

/// Why an interjection request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// A character cannot interject on their own turn.
    SameAsSpeaker,
    /// Already interjected this round.
    AlreadyInterjected,
    /// Not an active participant of this beat.
    NotParticipant,
    /// `current_speaker` is not the one whose turn was just taken.
    NotCurrentSpeaker,
    /// Chains cannot be interrupted.
    ChainInProgress,
    /// The current speaker has not spoken yet.
    TurnNotTaken,
    /// The beat is over.
    BeatEnded,
}

/// Result of [`TurnEngine::request_interjection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterjectionOutcome {
    /// A chain is open; fill its four slots next.
    Accepted(InterjectionChain),
    /// Nothing changed.
    Rejected(RejectionReason),
}

/// The conversation state machine for one beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEngine {
    policy: ExitPolicy,
    base_order: Vec<CharacterId>,
    current_round: u32,
    current_speaker_index: usize,
    interjections_used: BTreeMap<CharacterId, bool>,
    turn_history: Vec<Turn>,
    phase: EnginePhase,
    /// Every exit request as `(round, character)`, including ignored ones.
    exit_requests: Vec<(u32, CharacterId)>,
    pending_exits: BTreeSet<CharacterId>,
    exited: Vec<CharacterId>,
}

impl TurnEngine {
    /// Open a beat with round 1 ready to play.
    ///
    /// # Errors
    /// `InvalidState` if `base_order` has duplicates or fewer than two
    /// characters.
    pub fn new(base_order: Vec<CharacterId>, policy: ExitPolicy) -> Result<Self> {
        let unique: BTreeSet<&CharacterId> = base_order.iter().collect();
        if unique.len() != base_order.len() {
            return Err(TableauError::invalid_state(
                "new",
                "the base order lists a character twice",
            ));
        }
        if base_order.len() < 2 {
            return Err(TableauError::invalid_state(
                "new",
                "a conversation needs at least two participants",
            ));
        }
        let interjections_used = base_order.iter().map(|c| (c.clone(), false)).collect();
        Ok(Self {
            policy,
            base_order,
            current_round: 1,
            current_speaker_index: 0,
            interjections_used,
            turn_history: Vec::new(),
            phase: EnginePhase::AwaitingTurn,
            exit_requests: Vec::new(),
            pending_exits: BTreeSet::new(),
            exited: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Active participants in speaking order.
    #[must_use]
    pub fn base_order(&self) -> &[CharacterId] {
        &self.base_order
    }

    /// Round currently being played (starts at 1).
    #[must_use]
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Index into [`Self::base_order`] of the current speaker.
    #[must_use]
    pub fn current_speaker_index(&self) -> usize {
        self.current_speaker_index
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &EnginePhase {
        &self.phase
    }

    /// Exit-policy phase of the current round.
    #[must_use]
    pub fn exit_phase(&self) -> ExitPhase {
        self.policy.phase(self.current_round)
    }

    /// Conversational energy of the current round.
    #[must_use]
    pub fn energy(&self) -> ConversationEnergy {
        self.policy.energy(self.current_round)
    }

    /// All turns committed this beat, in order.
    #[must_use]
    pub fn turn_history(&self) -> &[Turn] {
        &self.turn_history
    }

    /// Every exit request as `(round, character)`.
    #[must_use]
    pub fn exit_requests(&self) -> &[(u32, CharacterId)] {
        &self.exit_requests
    }

    /// Characters that have left, in leaving order.
    #[must_use]
    pub fn exited(&self) -> &[CharacterId] {
        &self.exited
    }

    /// Whether `character` has interjected this round.
    #[must_use]
    pub fn has_interjected(&self, character: &CharacterId) -> bool {
        self.interjections_used.get(character).copied().unwrap_or(false)
    }

    /// Whether the beat is over.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, EnginePhase::Ended { .. })
    }

    /// Why the beat ended, if it has.
    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        match self.phase {
            EnginePhase::Ended { reason } => Some(reason),
            _ => None,
        }
    }

    /// `base_order[current_speaker_index]`. No side effects.
    #[must_use]
    pub fn next_speaker(&self) -> Option<&CharacterId> {
        self.base_order.get(self.current_speaker_index)
    }

    /// The slot that must be filled next, if any.
    #[must_use]
    pub fn next_slot(&self) -> Option<Slot> {
        let (speaker, kind) = match &self.phase {
            EnginePhase::AwaitingTurn => (self.next_speaker()?.clone(), TurnKind::Ordinary),
            EnginePhase::Chain(chain) => {
                (chain.expected_speaker().clone(), chain.expected_kind())
            }
            EnginePhase::TurnTaken | EnginePhase::RoundComplete | EnginePhase::Ended { .. } => {
                return None;
            }
        };
        Some(Slot {
            round: self.current_round,
            speaker,
            kind,
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Commit a turn into the open slot.
    ///
    /// Returns what happened to an exit request carried by the turn, if any.
    ///
    /// # Errors
    /// `InvalidState` if no slot is open or the turn does not match it.
    pub fn commit_turn(&mut self, turn: Turn) -> Result<Option<ExitOutcome>> {
        let Some(slot) = self.next_slot() else {
            return Err(TableauError::invalid_state("commit_turn", self.phase.to_string()));
        };
        if turn.speaker != slot.speaker || turn.kind != slot.kind || turn.round != slot.round {
            return Err(TableauError::invalid_state(
                "commit_turn",
                format!(
                    "expecting a {:?} turn from {} in round {}, got {:?} from {} in round {}",
                    slot.kind, slot.speaker, slot.round, turn.kind, turn.speaker, turn.round
                ),
            ));
        }

        debug!(
            round = self.current_round,
            speaker = %turn.speaker,
            kind = ?turn.kind,
            substituted = turn.substituted,
            "Turn committed"
        );
        let wants_out = turn.wants_to_exit().then(|| turn.speaker.clone());
        self.turn_history.push(turn);

        self.phase = match std::mem::replace(&mut self.phase, EnginePhase::AwaitingTurn) {
            EnginePhase::AwaitingTurn => EnginePhase::TurnTaken,
            EnginePhase::Chain(mut chain) if chain.step < InterjectionChain::LEN => {
                chain.step += 1;
                EnginePhase::Chain(chain)
            }
            EnginePhase::Chain(_) if self.everyone_leaving() => EnginePhase::Ended {
                reason: EndReason::AllExited,
            },
            EnginePhase::Chain(_) => self.step_past_current_speaker(),
            other => other,
        };

        Ok(wants_out.map(|character| self.handle_exit_request(character)))
    }

    /// Move past the current speaker after an ordinary turn with no interjection.
    ///
    /// # Errors
    /// `InvalidState` unless the current turn has just been taken.
    pub fn advance_turn(&mut self) -> Result<()> {
        if self.phase != EnginePhase::TurnTaken {
            return Err(TableauError::invalid_state("advance_turn", self.phase.to_string()));
        }
        self.phase = self.step_past_current_speaker();
        Ok(())
    }

    /// Ask for an interjection on `current_speaker`'s just-taken turn.
    pub fn request_interjection(
        &mut self,
        interjector: &CharacterId,
        current_speaker: &CharacterId,
    ) -> InterjectionOutcome {
        use RejectionReason as R;
        let rejection = match &self.phase {
            EnginePhase::Ended { .. } => Some(R::BeatEnded),
            EnginePhase::Chain(_) => Some(R::ChainInProgress),
            EnginePhase::AwaitingTurn | EnginePhase::RoundComplete => Some(R::TurnNotTaken),
            EnginePhase::TurnTaken => {
                if self.next_speaker() != Some(current_speaker) {
                    Some(R::NotCurrentSpeaker)
                } else if interjector == current_speaker {
                    Some(R::SameAsSpeaker)
                } else if !self.base_order.contains(interjector) {
                    Some(R::NotParticipant)
                } else if self.has_interjected(interjector) {
                    Some(R::AlreadyInterjected)
                } else {
                    None
                }
            }
        };
        if let Some(reason) = rejection {
            debug!(interjector = %interjector, ?reason, "Interjection rejected");
            return InterjectionOutcome::Rejected(reason);
        }

        self.interjections_used.insert(interjector.clone(), true);
        let chain = InterjectionChain::new(interjector.clone(), current_speaker.clone());
        self.phase = EnginePhase::Chain(chain.clone());
        info!(
            round = self.current_round,
            interjector = %interjector,
            speaker = %current_speaker,
            "Interjection accepted"
        );
        InterjectionOutcome::Accepted(chain)
    }

    /// Begin the next round.
    ///
    /// Applies granted exits, increments the round, clears interjection
    /// flags and resets the speaker index. Ends the beat instead when the new
    /// round reaches the forced-exit round or fewer than two participants remain.
    ///
    /// # Errors
    /// `InvalidState` while a chain is open or after the beat has ended.
    pub fn start_round(&mut self) -> Result<()> {
        if matches!(self.phase, EnginePhase::Chain(_) | EnginePhase::Ended { .. }) {
            return Err(TableauError::invalid_state("start_round", self.phase.to_string()));
        }

        let leaving = std::mem::take(&mut self.pending_exits);
        self.base_order.retain(|c| !leaving.contains(c));
        self.exited.extend(leaving);

        self.current_round += 1;
        self.current_speaker_index = 0;
        self.interjections_used = self.base_order.iter().map(|c| (c.clone(), false)).collect();

        self.phase = if self.policy.phase(self.current_round) == ExitPhase::MustExit {
            EnginePhase::Ended {
                reason: EndReason::ForcedRoundLimit,
            }
        } else if self.base_order.is_empty() {
            EnginePhase::Ended {
                reason: EndReason::AllExited,
            }
        } else if self.base_order.len() == 1 {
            EnginePhase::Ended {
                reason: EndReason::Deserted,
            }
        } else {
            EnginePhase::AwaitingTurn
        };

        match self.end_reason() {
            Some(reason) => info!(round = self.current_round, %reason, "Beat ended at round start"),
            None => info!(
                round = self.current_round,
                participants = self.base_order.len(),
                "Round started"
            ),
        }
        Ok(())
    }

    /// End the beat from outside (director override).
    ///
    /// # Errors
    /// `InvalidState` while a chain is open or if already ended.
    pub fn end_beat(&mut self, reason: EndReason) -> Result<()> {
        if matches!(self.phase, EnginePhase::Chain(_) | EnginePhase::Ended { .. }) {
            return Err(TableauError::invalid_state("end_beat", self.phase.to_string()));
        }
        info!(round = self.current_round, %reason, "Beat ended");
        self.phase = EnginePhase::Ended { reason };
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// A character who interjected this round has used up their remaining
    /// ordinary slot, so they are skipped.
    fn step_past_current_speaker(&mut self) -> EnginePhase {
        self.current_speaker_index += 1;
        while self
            .base_order
            .get(self.current_speaker_index)
            .is_some_and(|c| self.has_interjected(c))
        {
            self.current_speaker_index += 1;
        }
        if self.current_speaker_index >= self.base_order.len() {
            EnginePhase::RoundComplete
        } else {
            EnginePhase::AwaitingTurn
        }
    }

    fn everyone_leaving(&self) -> bool {
        self.base_order
            .iter()
            .all(|c| self.pending_exits.contains(c))
    }

    fn handle_exit_request(&mut self, character: CharacterId) -> ExitOutcome {
        self.exit_requests.push((self.current_round, character.clone()));
        let outcome = match self.exit_phase() {
            ExitPhase::LockedIn => ExitOutcome::Ignored,
            ExitPhase::CanExit => {
                self.pending_exits.insert(character.clone());
                // An open chain still runs to its final word.
                let in_chain = matches!(self.phase, EnginePhase::Chain(_));
                if self.everyone_leaving() && !in_chain {
                    self.phase = EnginePhase::Ended {
                        reason: EndReason::AllExited,
                    };
                    ExitOutcome::BeatEnded
                } else {
                    ExitOutcome::Granted
                }
            }
            ExitPhase::MustExit => {
                self.phase = EnginePhase::Ended {
                    reason: EndReason::ForcedRoundLimit,
                };
                ExitOutcome::Forced
            }
        };
        info!(
            round = self.current_round,
            character = %character,
            ?outcome,
            "Exit requested"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{InternalState, InterjectionLine, SpeakingDecision, VisibleAction};

    fn engine(names: &[&str]) -> TurnEngine {
        let order = names.iter().map(|n| CharacterId::from(*n)).collect();
        TurnEngine::new(order, ExitPolicy::default()).expect("valid engine")
    }

    fn decision(words: &str, wants_to_exit: bool) -> SpeakingDecision {
        SpeakingDecision {
            action: VisibleAction {
                speaks: words.to_string(),
                does: None,
                tone: "neutral".to_string(),
            },
            internal: InternalState {
                emotional_state: "calm".to_string(),
                wants_to_exit,
                intensity: None,
            },
        }
    }

    fn speak(engine: &mut TurnEngine, wants_to_exit: bool) -> Option<ExitOutcome> {
        let slot = engine.next_slot().expect("open slot");
        let turn = if slot.kind.by_interjector() {
            Turn::interjected(
                &slot,
                &InterjectionLine {
                    speaks: "Wait!".into(),
                    tone: "urgent".into(),
                    reason: "disagree".into(),
                },
            )
        } else {
            Turn::spoken(&slot, decision("...", wants_to_exit))
        };
        engine.commit_turn(turn).expect("slot matches")
    }

    fn play_round(engine: &mut TurnEngine) {
        while engine.phase() != &EnginePhase::RoundComplete && !engine.is_ended() {
            speak(engine, false);
            engine.advance_turn().expect("turn taken");
        }
    }

    fn id(name: &str) -> CharacterId {
        CharacterId::from(name)
    }

    #[test]
    fn interjection_chain_resumes_after_original_speaker() {
        let mut e = engine(&["A", "B", "C"]);
        speak(&mut e, false);
        let outcome = e.request_interjection(&id("B"), &id("A"));
        assert!(matches!(outcome, InterjectionOutcome::Accepted(_)));
        for _ in 0..4 {
            speak(&mut e, false);
        }

        let history: Vec<_> = e
            .turn_history()
            .iter()
            .map(|t| (t.speaker.to_string(), t.kind))
            .collect();
        assert_eq!(
            history,
            [
                ("A".to_string(), TurnKind::Ordinary),
                ("B".to_string(), TurnKind::Interjection),
                ("A".to_string(), TurnKind::Response),
                ("B".to_string(), TurnKind::Counter),
                ("A".to_string(), TurnKind::FinalWord),
            ]
        );
        assert_eq!(e.phase(), &EnginePhase::AwaitingTurn);
        assert_eq!(e.next_speaker(), Some(&id("C")));
    }

    #[test]
    fn earlier_interjector_keeps_their_slot() {
        let mut e = engine(&["A", "B", "C"]);
        speak(&mut e, false);
        e.advance_turn().expect("advance");
        speak(&mut e, false);
        assert!(matches!(
            e.request_interjection(&id("A"), &id("B")),
            InterjectionOutcome::Accepted(_)
        ));
        for _ in 0..4 {
            speak(&mut e, false);
        }
        assert_eq!(e.next_speaker(), Some(&id("C")));
        speak(&mut e, false);
        e.advance_turn().expect("advance");
        assert_eq!(e.phase(), &EnginePhase::RoundComplete);
        assert_eq!(e.turn_history().len(), 7);
    }

    #[test]
    fn one_interjection_per_character_per_round() {
        let mut e = engine(&["A", "B", "C"]);
        speak(&mut e, false);
        assert!(matches!(
            e.request_interjection(&id("B"), &id("A")),
            InterjectionOutcome::Accepted(_)
        ));
        for _ in 0..4 {
            speak(&mut e, false);
        }
        speak(&mut e, false);
        let before = e.clone();
        assert_eq!(
            e.request_interjection(&id("B"), &id("C")),
            InterjectionOutcome::Rejected(RejectionReason::AlreadyInterjected)
        );
        assert_eq!(e, before);

        e.advance_turn().expect("turn taken");
        e.start_round().expect("round complete");
        speak(&mut e, false);
        assert!(matches!(
            e.request_interjection(&id("B"), &id("A")),
            InterjectionOutcome::Accepted(_)
        ));
    }

    #[test]
    fn ineligible_interjections_are_rejected_without_change() {
        let mut e = engine(&["A", "B", "C"]);
        assert_eq!(
            e.request_interjection(&id("B"), &id("A")),
            InterjectionOutcome::Rejected(RejectionReason::TurnNotTaken)
        );
        speak(&mut e, false);
        let before = e.clone();
        assert_eq!(
            e.request_interjection(&id("A"), &id("A")),
            InterjectionOutcome::Rejected(RejectionReason::SameAsSpeaker)
        );
        assert_eq!(
            e.request_interjection(&id("Z"), &id("A")),
            InterjectionOutcome::Rejected(RejectionReason::NotParticipant)
        );
        assert_eq!(
            e.request_interjection(&id("B"), &id("C")),
            InterjectionOutcome::Rejected(RejectionReason::NotCurrentSpeaker)
        );
        assert_eq!(e, before);

        e.request_interjection(&id("B"), &id("A"));
        assert_eq!(
            e.request_interjection(&id("C"), &id("A")),
            InterjectionOutcome::Rejected(RejectionReason::ChainInProgress)
        );
    }

    #[test]
    fn start_round_mid_chain_is_invalid() {
        let mut e = engine(&["A", "B"]);
        speak(&mut e, false);
        e.request_interjection(&id("B"), &id("A"));
        speak(&mut e, false);
        let err = e.start_round().expect_err("chain open");
        assert!(matches!(err, TableauError::InvalidState { .. }));
        assert!(e.end_beat(EndReason::DirectorOverride).is_err());
    }

    #[test]
    fn wrong_speaker_cannot_commit() {
        let mut e = engine(&["A", "B"]);
        let slot = Slot {
            round: 1,
            speaker: id("B"),
            kind: TurnKind::Ordinary,
        };
        let err = e
            .commit_turn(Turn::spoken(&slot, decision("hi", false)))
            .expect_err("not B's turn");
        assert!(matches!(err, TableauError::InvalidState { .. }));
        assert!(e.turn_history().is_empty());
    }

    #[test]
    fn locked_in_exit_is_ignored_but_recorded() {
        let mut e = engine(&["A", "B", "C"]);
        e.start_round().expect("start");
        assert_eq!(e.current_round(), 2);
        assert_eq!(speak(&mut e, true), Some(ExitOutcome::Ignored));
        e.advance_turn().expect("advance");
        play_round(&mut e);
        e.start_round().expect("start");
        assert_eq!(e.base_order(), [id("A"), id("B"), id("C")]);
        assert_eq!(e.exit_requests(), [(2, id("A"))]);
    }

    #[test]
    fn can_exit_removes_requester_from_next_round() {
        let mut e = engine(&["A", "B", "C"]);
        for _ in 0..4 {
            play_round(&mut e);
            e.start_round().expect("start");
        }
        assert_eq!(e.current_round(), 5);
        assert_eq!(speak(&mut e, true), Some(ExitOutcome::Granted));
        e.advance_turn().expect("advance");
        // Still part of the rest of this round.
        assert_eq!(e.base_order().len(), 3);
        play_round(&mut e);
        e.start_round().expect("start");
        assert_eq!(e.base_order(), [id("B"), id("C")]);
        assert_eq!(e.exited(), [id("A")]);
    }

    #[test]
    fn everyone_leaving_ends_the_beat() {
        let mut e = engine(&["A", "B"]);
        for _ in 0..3 {
            play_round(&mut e);
            e.start_round().expect("start");
        }
        assert_eq!(speak(&mut e, true), Some(ExitOutcome::Granted));
        e.advance_turn().expect("advance");
        assert_eq!(speak(&mut e, true), Some(ExitOutcome::BeatEnded));
        assert_eq!(e.end_reason(), Some(EndReason::AllExited));
        assert!(e.start_round().is_err());
    }

    #[test]
    fn one_participant_left_is_deserted() {
        let mut e = engine(&["A", "B", "C"]);
        for _ in 0..3 {
            play_round(&mut e);
            e.start_round().expect("start");
        }
        speak(&mut e, true);
        e.advance_turn().expect("advance");
        speak(&mut e, true);
        e.advance_turn().expect("advance");
        speak(&mut e, false);
        e.advance_turn().expect("advance");
        e.start_round().expect("start");
        assert_eq!(e.end_reason(), Some(EndReason::Deserted));
    }

    #[test]
    fn round_eight_is_forced() {
        let mut e = engine(&["A", "B"]);
        for _ in 0..7 {
            play_round(&mut e);
            e.start_round().expect("start");
        }
        assert_eq!(e.current_round(), 8);
        assert_eq!(e.end_reason(), Some(EndReason::ForcedRoundLimit));
        assert!(e.next_slot().is_none());
        // Seven complete rounds of two turns.
        assert_eq!(e.turn_history().len(), 14);
    }

    #[test]
    fn director_override_ends_between_turns() {
        let mut e = engine(&["A", "B"]);
        speak(&mut e, false);
        e.end_beat(EndReason::DirectorOverride).expect("no chain open");
        assert_eq!(e.end_reason(), Some(EndReason::DirectorOverride));
        assert!(e.next_slot().is_none());
    }

    #[test]
    fn rejects_degenerate_casts() {
        assert!(TurnEngine::new(vec![id("A")], ExitPolicy::default()).is_err());
        assert!(TurnEngine::new(vec![id("A"), id("A")], ExitPolicy::default()).is_err());
    }

    #[test]
    fn engine_state_survives_serialization_mid_chain() {
        let mut e = engine(&["A", "B", "C"]);
        speak(&mut e, false);
        e.request_interjection(&id("C"), &id("A"));
        speak(&mut e, false);
        let json = serde_json::to_string(&e).expect("serialize");
        let restored: TurnEngine = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, e);
        assert_eq!(
            restored.next_slot().map(|s| (s.speaker, s.kind)),
            Some((id("A"), TurnKind::Response))
        );
    }
}
