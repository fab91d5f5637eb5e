//! Golden checks on rendered prompts.
//!
//! Each case renders a real request through the built-in templates and
//! asserts what must and must not reach the model. The must-not lists carry
//! the privacy checks: another character's complication or internal state
//! never appears in someone else's prompt.

use tableau_core::character::{Character, Nature};
use tableau_core::context::{
    ObservationRequest, PrivateView, PublicTurn, ReflectionRequest, SceneContext, TurnRequest,
};
use tableau_core::decision::VisibleAction;
use tableau_core::engine::{ConversationEnergy, ExitPhase, TurnKind};
use tableau_core::memory::MemoryStore;
use tableau_core::relationship::RelationshipGraph;
use tableau_core::types::{CharacterId, StoryDay};
use tableau_llm::PromptEngine;

const PLACEHOLDERS: [&str; 20] = [
    "{name}",
    "{nature}",
    "{nurture}",
    "{complication}",
    "{premise}",
    "{stakes}",
    "{situation}",
    "{present}",
    "{round}",
    "{pacing}",
    "{relationships}",
    "{recollections}",
    "{history}",
    "{slot}",
    "{exit_hint}",
    "{speaker}",
    "{just_said}",
    "{interjection_rule}",
    "{bound}",
    "TODO",
];

struct GoldenCase {
    name: &'static str,
    rendered: (String, String),
    prompt_must_contain: Vec<&'static str>,
    prompt_must_not_contain: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Fixture: Mara owes Tomas money; Tomas is secretly selling the farm.
// ---------------------------------------------------------------------------

fn character(name: &str, trait_: &str, secret: &str) -> Character {
    let mut c = Character::new(
        name,
        Nature {
            core_traits: vec![trait_.into(), "loyal".into()],
            cognitive_style: "overthinking".into(),
            stress_response: "people-pleasing".into(),
            moral_compass: "fairness-first".into(),
        },
    );
    c.set_complication(Some(secret.into()));
    c.nurture.set_emotional_state("secretly-panicking");
    c
}

fn present() -> Vec<CharacterId> {
    vec!["Mara".into(), "Tomas".into()]
}

fn graph() -> RelationshipGraph {
    let mut graph = RelationshipGraph::new();
    graph.establish_first_meeting(&"Mara".into(), &"Tomas".into(), 8, 7, StoryDay(0));
    graph.establish_first_meeting(&"Tomas".into(), &"Mara".into(), 2, 9, StoryDay(0));
    graph
}

fn view(c: &Character) -> PrivateView {
    PrivateView::build(c, &graph(), &MemoryStore::new(), &present())
}

fn scene(round: u32) -> SceneContext {
    SceneContext {
        premise: "Harvest supper at the Holloway farm".into(),
        stakes: "whether the farm stays in the family".into(),
        situation: "Mara brings up the debt".into(),
        present: present(),
        round,
        exit_phase: ExitPhase::LockedIn,
        energy: ConversationEnergy::High,
    }
}

fn said(speaker: &str, words: &str, kind: TurnKind) -> PublicTurn {
    PublicTurn {
        round: 1,
        speaker: speaker.into(),
        kind,
        action: VisibleAction {
            speaks: words.into(),
            does: None,
            tone: "tense".into(),
        },
    }
}

fn golden_cases() -> Vec<GoldenCase> {
    let engine = PromptEngine::builtin();
    let mara = character("Mara", "earnest", "owes Tomas forty crowns");
    let tomas = character("Tomas", "proud", "has already sold the farm");
    let history = vec![said("Mara", "We need to talk about the money.", TurnKind::Ordinary)];

    vec![
        GoldenCase {
            name: "speaking_prompt_carries_own_secret_only",
            rendered: engine
                .speaking(&TurnRequest {
                    me: view(&mara),
                    scene: scene(1),
                    history: history.clone(),
                    kind: TurnKind::Ordinary,
                    opposite: None,
                })
                .expect("render"),
            prompt_must_contain: vec![
                "You are Mara",
                "owes Tomas forty crowns",
                "Harvest supper",
                "Tomas: trusted ally (trust 8/10, affection 7/10)",
                "We need to talk about the money.",
                "\"wants_to_exit\": false",
            ],
            prompt_must_not_contain: vec!["has already sold the farm"],
        },
        GoldenCase {
            name: "observer_sees_words_not_speaker_state",
            rendered: engine
                .observing(&ObservationRequest {
                    me: view(&tomas),
                    scene: scene(1),
                    history: history.clone(),
                    just_spoken: history[0].clone(),
                    can_interject: true,
                })
                .expect("render"),
            prompt_must_contain: vec![
                "You are Tomas",
                "has already sold the farm",
                "Mara just took their turn",
                "We need to talk about the money.",
                "You may INTERJECT",
            ],
            prompt_must_not_contain: vec!["owes Tomas forty crowns", "earnest"],
        },
        GoldenCase {
            name: "response_slot_names_interjector",
            rendered: engine
                .speaking(&TurnRequest {
                    me: view(&mara),
                    scene: scene(2),
                    history: vec![
                        said("Mara", "We need to talk about the money.", TurnKind::Ordinary),
                        said("Tomas", "Not tonight.", TurnKind::Interjection),
                    ],
                    kind: TurnKind::Response,
                    opposite: Some("Tomas".into()),
                })
                .expect("render"),
            prompt_must_contain: vec!["Tomas just interrupted you", "[interjects]: \"Not tonight.\""],
            prompt_must_not_contain: vec!["has already sold the farm"],
        },
        GoldenCase {
            name: "reflection_states_delta_bound",
            rendered: engine
                .reflection(&ReflectionRequest {
                    me: view(&tomas),
                    scene: scene(3),
                    beat: history,
                    delta_bound: 3,
                })
                .expect("render"),
            prompt_must_contain: vec!["from -3 to +3", "\"trust_delta\"", "Mara: "],
            prompt_must_not_contain: vec!["owes Tomas forty crowns"],
        },
    ]
}

#[test]
fn golden_prompts_render_as_expected() {
    for case in golden_cases() {
        let (system, user) = &case.rendered;
        let full = format!("{system}\n{user}");
        for needle in &case.prompt_must_contain {
            assert!(full.contains(needle), "[{}] missing {needle:?}\n{full}", case.name);
        }
        for needle in case.prompt_must_not_contain.iter().chain(PLACEHOLDERS.iter()) {
            assert!(!full.contains(needle), "[{}] leaked {needle:?}\n{full}", case.name);
        }
    }
}

#[test]
fn exit_hint_opens_up_after_lock_in() {
    let engine = PromptEngine::builtin();
    let mara = character("Mara", "earnest", "owes Tomas forty crowns");
    let mut scene = scene(5);
    scene.exit_phase = ExitPhase::CanExit;
    scene.energy = ConversationEnergy::Low;

    let (_, user) = engine
        .speaking(&TurnRequest {
            me: view(&mara),
            scene,
            history: Vec::new(),
            kind: TurnKind::Ordinary,
            opposite: None,
        })
        .expect("render");
    assert!(user.contains("true if you want to leave"));
    assert!(user.contains("must wrap up now"));
    assert!(user.contains("(nothing has been said yet)"));
}

#[test]
fn demo_prompt_override_renders_fully() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/prompts");
    let engine = PromptEngine::from_directory(dir).expect("demo prompts");
    let tomas = character("Tomas", "proud", "has already sold the farm");
    let turn = said("Mara", "We need to talk about the money.", TurnKind::Ordinary);

    let (system, user) = engine
        .observing(&ObservationRequest {
            me: view(&tomas),
            scene: scene(1),
            history: vec![turn.clone()],
            just_spoken: turn,
            can_interject: false,
        })
        .expect("render");
    let full = format!("{system}\n{user}");
    assert!(full.contains("You are Tomas, watching quietly."));
    assert!(full.contains("already interjected"));
    for placeholder in PLACEHOLDERS {
        assert!(!full.contains(placeholder), "unfilled {placeholder}");
    }
}
