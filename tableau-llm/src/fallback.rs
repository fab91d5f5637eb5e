//! Rule-based responder used when no model is configured.
//!
//! Lines come from small template tables chosen by the character's stance
//! toward whoever they are addressing. Stance is read from the character's
//! own relationship view, so the output still reacts to how the story has
//! gone. Always available, no I/O, fully deterministic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tableau_core::context::{
    ObservationRequest, PrivateView, PublicTurn, ReflectionRequest, TurnRequest,
};
use tableau_core::decision::{
    InterjectionLine, InternalState, Knowledge, ObservingDecision, Reflection,
    RelationshipChange, SpeakingDecision, VisibleAction,
};
use tableau_core::engine::{ConversationEnergy, ExitPhase, TurnKind};
use tableau_core::types::CharacterId;
use tableau_core::{Responder, TurnGenerationFailure};

/// How a character feels toward someone, coarsely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    /// High trust and affection.
    Warm,
    /// Middling, or not yet met.
    Neutral,
    /// Low trust or affection.
    Cool,
    /// Both very low.
    Hostile,
}

impl Stance {
    /// Stance of `me` toward `other`, from `me`'s own relationship view.
    #[must_use]
    pub fn toward(me: &PrivateView, other: &CharacterId) -> Self {
        let Some(view) = me.relationships.iter().find(|r| &r.about == other) else {
            return Self::Neutral;
        };
        match (view.trust, view.affection) {
            (Some(t), Some(a)) if t <= 2 && a <= 2 => Self::Hostile,
            (Some(t), Some(a)) if t <= 3 || a <= 3 => Self::Cool,
            (Some(t), Some(a)) if t >= 7 && a >= 6 => Self::Warm,
            _ => Self::Neutral,
        }
    }

    fn tone(self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Neutral => "even",
            Self::Cool => "guarded",
            Self::Hostile => "cold",
        }
    }
}

const OPENERS: [(Stance, &[&str]); 4] = [
    (Stance::Warm, &[
        "I'm glad you're here, {other}.",
        "{other}, you always know what to say. What do you make of this?",
    ]),
    (Stance::Neutral, &[
        "Let's hear it plainly. What are we dealing with?",
        "{other}, what's your view?",
        "I'd rather we settled this now.",
    ]),
    (Stance::Cool, &[
        "I'll believe that when I see it, {other}.",
        "Go on, {other}. I'm listening. For now.",
    ]),
    (Stance::Hostile, &[
        "I've heard enough from you, {other}.",
        "Don't pretend you care about any of this.",
    ]),
];

/// Deterministic stand-in for a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedResponder;

impl RuleBasedResponder {
    /// A new responder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn pick(stance: Stance, seed: usize) -> &'static str {
    let lines = OPENERS
        .iter()
        .find(|(s, _)| *s == stance)
        .map_or(&[][..], |(_, lines)| *lines);
    lines.get(seed % lines.len().max(1)).copied().unwrap_or("...")
}

/// Whoever spoke last, other than `me`.
fn last_other<'a>(history: &'a [PublicTurn], me: &CharacterId) -> Option<&'a CharacterId> {
    history.iter().rev().map(|t| &t.speaker).find(|s| *s != me)
}

fn emotion_for(stance: Stance, stress_response: &str) -> String {
    match stance {
        Stance::Warm => "content".to_string(),
        Stance::Neutral => "calm".to_string(),
        Stance::Cool => "wary".to_string(),
        Stance::Hostile if stress_response.contains("withdraw") => "withdrawn".to_string(),
        Stance::Hostile => "angry".to_string(),
    }
}

#[async_trait]
impl Responder for RuleBasedResponder {
    async fn speaking_turn(
        &self,
        request: &TurnRequest,
    ) -> Result<SpeakingDecision, TurnGenerationFailure> {
        let me = &request.me;
        let other = request
            .opposite
            .as_ref()
            .or_else(|| last_other(&request.history, &me.name))
            .or_else(|| request.scene.present.iter().find(|c| **c != me.name));
        let stance = other.map_or(Stance::Neutral, |o| Stance::toward(me, o));
        let other_name = other.map_or("everyone", CharacterId::as_str);

        let speaks = match request.kind {
            TurnKind::Ordinary => {
                let seed = request.history.len() + usize::try_from(request.scene.round).unwrap_or(0);
                pick(stance, seed).replace("{other}", other_name)
            }
            TurnKind::Interjection => format!("Wait, {other_name}. That isn't right."),
            TurnKind::Response => format!("Let me finish, {other_name}."),
            TurnKind::Counter => "You know I'm right about this.".to_string(),
            TurnKind::FinalWord => "Fine. Let's leave it there.".to_string(),
        };
        let does = match me.nature.primary_trait() {
            "proud" | "stubborn" => Some("crosses arms".to_string()),
            "anxious" | "nervous" => Some("fidgets".to_string()),
            _ => None,
        };
        let wants_to_exit = request.scene.exit_phase != ExitPhase::LockedIn
            && (request.scene.energy == ConversationEnergy::Low || stance == Stance::Hostile);

        Ok(SpeakingDecision {
            action: VisibleAction {
                speaks,
                does,
                tone: stance.tone().to_string(),
            },
            internal: InternalState {
                emotional_state: emotion_for(stance, &me.nature.stress_response),
                wants_to_exit,
                intensity: None,
            },
        })
    }

    async fn observing_turn(
        &self,
        request: &ObservationRequest,
    ) -> Result<ObservingDecision, TurnGenerationFailure> {
        let speaker = &request.just_spoken.speaker;
        let stance = Stance::toward(&request.me, speaker);
        let provoked = request.can_interject
            && stance == Stance::Hostile
            && request.just_spoken.kind == TurnKind::Ordinary;

        if !provoked {
            return Ok(ObservingDecision {
                observation: format!("{speaker} sounds {}", request.just_spoken.action.tone),
                ..ObservingDecision::listening()
            });
        }
        Ok(ObservingDecision {
            observation: format!("I can't let {speaker} get away with that"),
            wants_to_interject: true,
            interjection: Some(InterjectionLine {
                speaks: format!("That's not how it happened, {speaker}."),
                tone: "sharp".to_string(),
                reason: "distrust".to_string(),
            }),
        })
    }

    async fn reflect(&self, request: &ReflectionRequest) -> Result<Reflection, TurnGenerationFailure> {
        let me = &request.me.name;
        let bound = i8::try_from(request.delta_bound).unwrap_or(i8::MAX);
        let mut relationships = BTreeMap::new();

        for other in request.scene.present.iter().filter(|c| *c != me) {
            let mut score = 0i8;
            for turn in request.beat.iter().filter(|t| &t.speaker == other) {
                score = score.saturating_add(match turn.action.tone.as_str() {
                    "warm" | "kind" | "friendly" => 1,
                    "cold" | "sharp" | "hostile" | "angry" => -1,
                    _ => 0,
                });
                if turn.kind == TurnKind::Interjection {
                    score = score.saturating_sub(1);
                }
            }
            let delta = score.clamp(-bound, bound);
            if delta != 0 {
                relationships.insert(
                    other.clone(),
                    RelationshipChange {
                        trust_delta: delta,
                        affection_delta: delta,
                        label: None,
                        memory: Some(format!("{other} was {} with me", if delta > 0 { "kind" } else { "harsh" })),
                    },
                );
            }
        }

        let harshness = relationships.values().filter(|c| c.trust_delta < 0).count();
        Ok(Reflection {
            relationships,
            knowledge: Knowledge::default(),
            emotional_state: Some(if harshness > 0 { "unsettled" } else { "calm" }.to_string()),
            confidence_delta: if harshness > 1 { -1 } else { 0 },
            learned_behaviors: Vec::new(),
            beliefs: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableau_core::character::{Character, Nature};
    use tableau_core::context::SceneContext;
    use tableau_core::memory::MemoryStore;
    use tableau_core::relationship::RelationshipGraph;
    use tableau_core::types::StoryDay;

    fn alice() -> Character {
        Character::new(
            "Alice",
            Nature {
                core_traits: vec!["proud".into()],
                cognitive_style: "analytical".into(),
                stress_response: "confrontation".into(),
                moral_compass: "fairness-first".into(),
            },
        )
    }

    fn view(trust: u8, affection: u8) -> PrivateView {
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&"Alice".into(), &"Bob".into(), trust, affection, StoryDay(0));
        PrivateView::build(&alice(), &graph, &MemoryStore::new(), &present())
    }

    fn present() -> Vec<CharacterId> {
        vec!["Alice".into(), "Bob".into()]
    }

    fn scene(round: u32, exit_phase: ExitPhase) -> SceneContext {
        SceneContext {
            premise: "a quarrel over a debt".into(),
            stakes: "the farm".into(),
            situation: "the kitchen".into(),
            present: present(),
            round,
            exit_phase,
            energy: ConversationEnergy::High,
        }
    }

    fn bob_said(tone: &str, kind: TurnKind) -> PublicTurn {
        PublicTurn {
            round: 1,
            speaker: "Bob".into(),
            kind,
            action: VisibleAction {
                speaks: "Pay me back.".into(),
                does: None,
                tone: tone.into(),
            },
        }
    }

    #[test]
    fn stance_follows_own_edge() {
        assert_eq!(Stance::toward(&view(1, 2), &"Bob".into()), Stance::Hostile);
        assert_eq!(Stance::toward(&view(3, 6), &"Bob".into()), Stance::Cool);
        assert_eq!(Stance::toward(&view(8, 7), &"Bob".into()), Stance::Warm);
        assert_eq!(Stance::toward(&view(5, 5), &"Carol".into()), Stance::Neutral);
    }

    #[tokio::test]
    async fn hostile_speaker_asks_to_leave_only_once_allowed() {
        let responder = RuleBasedResponder::new();
        let mut request = TurnRequest {
            me: view(1, 1),
            scene: scene(2, ExitPhase::LockedIn),
            history: vec![bob_said("cold", TurnKind::Ordinary)],
            kind: TurnKind::Ordinary,
            opposite: None,
        };
        let locked = responder.speaking_turn(&request).await.expect("decision");
        assert!(!locked.internal.wants_to_exit);
        assert_eq!(locked.action.tone, "cold");
        assert_eq!(locked.action.does.as_deref(), Some("crosses arms"));

        request.scene = scene(5, ExitPhase::CanExit);
        let free = responder.speaking_turn(&request).await.expect("decision");
        assert!(free.internal.wants_to_exit);
    }

    #[tokio::test]
    async fn observer_interjects_only_when_provoked_and_allowed() {
        let responder = RuleBasedResponder::new();
        let mut request = ObservationRequest {
            me: view(1, 1),
            scene: scene(1, ExitPhase::LockedIn),
            history: vec![bob_said("cold", TurnKind::Ordinary)],
            just_spoken: bob_said("cold", TurnKind::Ordinary),
            can_interject: true,
        };
        let decision = responder.observing_turn(&request).await.expect("decision");
        assert!(decision.requested_line().is_some());

        request.can_interject = false;
        let decision = responder.observing_turn(&request).await.expect("decision");
        assert!(decision.requested_line().is_none());

        request.me = view(8, 8);
        request.can_interject = true;
        let decision = responder.observing_turn(&request).await.expect("decision");
        assert!(!decision.wants_to_interject);
    }

    #[tokio::test]
    async fn reflection_scores_tone_within_bound() {
        let responder = RuleBasedResponder::new();
        let request = ReflectionRequest {
            me: view(5, 5),
            scene: scene(3, ExitPhase::LockedIn),
            beat: vec![
                bob_said("cold", TurnKind::Ordinary),
                bob_said("hostile", TurnKind::Ordinary),
                bob_said("sharp", TurnKind::Interjection),
                bob_said("angry", TurnKind::Ordinary),
            ],
            delta_bound: 3,
        };
        let reflection = responder.reflect(&request).await.expect("reflection");
        let change = &reflection.relationships[&CharacterId::from("Bob")];
        assert_eq!(change.trust_delta, -3);
        assert!(!reflection.relationships.contains_key(&CharacterId::from("Alice")));
    }
}
