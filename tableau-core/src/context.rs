//! Decision-request views.
//!
//! Two disjoint views per character:
//! - [`PrivateView`]: the character's own nature, nurture, complication,
//!   outgoing relationships and recollections. Only ever placed in that
//!   character's own requests.
//! - [`PublicTurn`]: speaker, round, slot kind and the visible action. This is
//!   all anyone learns about somebody else's turn.
//!
//! Every request type carries exactly one private view plus public history.

use serde::Serialize;

use crate::character::{Character, Nature, Nurture};
use crate::decision::VisibleAction;
use crate::engine::{ConversationEnergy, ExitPhase, Turn, TurnKind};
use crate::memory::MemoryStore;
use crate::relationship::{RelationshipGraph, RelationshipView};
use crate::types::CharacterId;

const RECENT_RECOLLECTIONS: usize = 5;

/// What a character knows about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateView {
    /// Own name.
    pub name: CharacterId,
    /// Own personality core.
    pub nature: Nature,
    /// Own current state.
    pub nurture: Nurture,
    /// Own secret for this beat.
    pub complication: Option<String>,
    /// Own feelings about everyone else present.
    pub relationships: Vec<RelationshipView>,
    /// Own memories, most durable first.
    pub recollections: Vec<String>,
}

impl PrivateView {
    /// Build `character`'s own view, restricted to relationships toward `present`.
    #[must_use]
    pub fn build(
        character: &Character,
        graph: &RelationshipGraph,
        memories: &MemoryStore,
        present: &[CharacterId],
    ) -> Self {
        let me = character.id();
        let relationships = present
            .iter()
            .filter(|other| *other != me)
            .filter_map(|other| graph.edge(me, other))
            .map(|edge| edge.view())
            .collect();
        Self {
            name: me.clone(),
            nature: character.nature().clone(),
            nurture: character.nurture.clone(),
            complication: character.complication().map(str::to_string),
            relationships,
            recollections: memories
                .bank(me)
                .map(|bank| bank.recollections(RECENT_RECOLLECTIONS))
                .unwrap_or_default(),
        }
    }
}

/// A turn as seen by anyone other than its speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicTurn {
    /// Round it was taken in.
    pub round: u32,
    /// Who took it.
    pub speaker: CharacterId,
    /// Slot kind.
    pub kind: TurnKind,
    /// What was seen and heard.
    pub action: VisibleAction,
}

impl From<&Turn> for PublicTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            round: turn.round,
            speaker: turn.speaker.clone(),
            kind: turn.kind,
            action: turn.action.clone(),
        }
    }
}

/// Project the last `window` turns of a history to their public form.
#[must_use]
pub fn public_window(history: &[Turn], window: usize) -> Vec<PublicTurn> {
    let skip = history.len().saturating_sub(window);
    history[skip..].iter().map(PublicTurn::from).collect()
}

/// Shared narrative frame for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneContext {
    /// Scene premise.
    pub premise: String,
    /// Scene stakes.
    pub stakes: String,
    /// Beat situation.
    pub situation: String,
    /// Everyone currently in the conversation.
    pub present: Vec<CharacterId>,
    /// Current round.
    pub round: u32,
    /// Exit-policy phase of the round.
    pub exit_phase: ExitPhase,
    /// Expected conversational energy.
    pub energy: ConversationEnergy,
}

/// Request for a speaking decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRequest {
    /// The speaker's own view.
    pub me: PrivateView,
    /// Narrative frame.
    pub scene: SceneContext,
    /// Recent public history, oldest first.
    pub history: Vec<PublicTurn>,
    /// Which slot this fills.
    pub kind: TurnKind,
    /// The other party, for interjection-chain slots.
    pub opposite: Option<CharacterId>,
}

/// Request for an observing decision about a turn just taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationRequest {
    /// The observer's own view.
    pub me: PrivateView,
    /// Narrative frame.
    pub scene: SceneContext,
    /// Recent public history, ending with `just_spoken`.
    pub history: Vec<PublicTurn>,
    /// The turn being observed.
    pub just_spoken: PublicTurn,
    /// Whether an interjection request could succeed right now.
    pub can_interject: bool,
}

/// Request for an end-of-beat reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionRequest {
    /// The reflector's own view.
    pub me: PrivateView,
    /// Narrative frame.
    pub scene: SceneContext,
    /// The whole beat, public form.
    pub beat: Vec<PublicTurn>,
    /// Bound on each trust/affection delta.
    pub delta_bound: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::SpeakingDecision;
    use crate::engine::Slot;
    use crate::types::StoryDay;

    fn character(name: &str, secret: &str) -> Character {
        let mut c = Character::new(
            name,
            Nature {
                core_traits: vec!["guarded".into()],
                cognitive_style: "analytical".into(),
                stress_response: "withdrawal".into(),
                moral_compass: "pragmatic".into(),
            },
        );
        c.set_complication(Some(secret.into()));
        c
    }

    #[test]
    fn private_view_holds_only_own_secret_and_edges() {
        let alice = character("Alice", "owes money to Bob");
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&"Alice".into(), &"Bob".into(), 6, 4, StoryDay(0));
        graph.establish_first_meeting(&"Bob".into(), &"Alice".into(), 2, 2, StoryDay(0));
        let present = vec![CharacterId::from("Alice"), "Bob".into()];

        let view = PrivateView::build(&alice, &graph, &MemoryStore::new(), &present);

        assert_eq!(view.complication.as_deref(), Some("owes money to Bob"));
        assert_eq!(view.relationships.len(), 1);
        assert_eq!(view.relationships[0].about, CharacterId::from("Bob"));
        assert_eq!(view.relationships[0].trust, Some(6));
    }

    #[test]
    fn public_turn_drops_internal_state() {
        let slot = Slot {
            round: 1,
            speaker: "Bob".into(),
            kind: TurnKind::Ordinary,
        };
        let mut decision = SpeakingDecision::neutral();
        decision.internal.emotional_state = "secretly terrified".into();
        let turn = Turn::spoken(&slot, decision);

        let json = serde_json::to_string(&PublicTurn::from(&turn)).expect("serialize");
        assert!(!json.contains("terrified"));
        assert!(!json.contains("wants_to_exit"));
    }

    #[test]
    fn window_keeps_newest() {
        let slot = Slot {
            round: 1,
            speaker: "Bob".into(),
            kind: TurnKind::Ordinary,
        };
        let turns: Vec<_> = (0..5)
            .map(|_| Turn::spoken(&slot, SpeakingDecision::neutral()))
            .collect();
        assert_eq!(public_window(&turns, 3).len(), 3);
        assert_eq!(public_window(&turns, 10).len(), 5);
    }
}
