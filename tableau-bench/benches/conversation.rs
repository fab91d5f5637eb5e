//! tableau benchmark suite.
//!
//! Targets, with a scripted responder (no model latency):
//!   beat_four_characters_full ........ < 5ms
//!   relationship_delta_single ........ < 5μs
//!   relationship_decay_pass_20_cast .. < 50μs
//!   scene_compression_60_memories .... < 200μs

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use tableau_core::character::{Character, Nature};
use tableau_core::config::{MemoryConfig, RelationshipConfig};
use tableau_core::memory::{MemoryEvent, MemoryKind, MemoryStore};
use tableau_core::relationship::{RelationshipDelta, RelationshipGraph};
use tableau_core::story::{BeatSetup, SceneSetup, Story};
use tableau_core::testing::{ScriptedDirector, ScriptedResponder, ScriptedScene};
use tableau_core::types::{CharacterId, StoryDay};
use tableau_core::{Coordinator, TableauConfig};

const CAST: [&str; 4] = ["Alice", "Bob", "Carol", "Dan"];

fn cast() -> Vec<Character> {
    CAST.iter()
        .map(|name| {
            Character::new(
                *name,
                Nature {
                    core_traits: vec!["curious".into()],
                    cognitive_style: "analytical".into(),
                    stress_response: "withdrawal".into(),
                    moral_compass: "pragmatic".into(),
                },
            )
        })
        .collect()
}

fn scene() -> ScriptedScene {
    ScriptedScene {
        setup: SceneSetup {
            title: "Bench".into(),
            premise: "A long supper".into(),
            stakes: "none".into(),
            days_since_previous: 0,
        },
        beats: vec![BeatSetup {
            situation: "Everyone talks".into(),
            characters: CAST.iter().map(|c| CharacterId::from(*c)).collect(),
            complications: Default::default(),
        }],
        resolution: None,
    }
}

/// Benchmark: one beat to the forced round, with an interjection chain in
/// round 1 (target: < 5ms).
fn bench_full_beat(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let mut config = TableauConfig::default();
    config.persistence.save_after_round = false;

    c.bench_function("beat_four_characters_full", |b| {
        b.iter(|| {
            rt.block_on(async {
                let responder = Arc::new(ScriptedResponder::new());
                responder.interject("Bob", "That's not true!");
                let story = Story::new("bench", cast()).expect("story");
                let mut coordinator = Coordinator::new(config.clone(), story, responder);
                let mut director = ScriptedDirector::new(vec![scene()]);
                let scenes = coordinator.run_story(&mut director).await.expect("run");
                black_box(scenes);
            });
        });
    });
}

/// Benchmark: a single reflection delta (target: < 5μs).
fn bench_relationship_delta(c: &mut Criterion) {
    let config = RelationshipConfig::default();
    let (a, b_) = (CharacterId::from("Alice"), CharacterId::from("Bob"));
    let mut graph = RelationshipGraph::new();
    graph.establish_first_meeting(&a, &b_, 5, 5, StoryDay(0));
    let delta = RelationshipDelta {
        trust: 1,
        affection: -1,
        ..RelationshipDelta::default()
    };

    c.bench_function("relationship_delta_single", |b| {
        b.iter(|| {
            let edge = graph
                .apply_delta(&config, &a, &b_, black_box(&delta), StoryDay(1))
                .expect("in bound");
            black_box(edge.trust);
        });
    });
}

/// Benchmark: decay pass over a fully connected cast of 20 (target: < 50μs).
fn bench_decay_pass(c: &mut Criterion) {
    let config = RelationshipConfig::default();
    let names: Vec<CharacterId> = (0..20).map(|i| CharacterId::from(format!("C{i}"))).collect();
    let mut graph = RelationshipGraph::new();
    for from in &names {
        for to in names.iter().filter(|to| *to != from) {
            graph.establish_first_meeting(from, to, 8, 8, StoryDay(0));
        }
    }

    c.bench_function("relationship_decay_pass_20_cast", |b| {
        b.iter(|| {
            let mut graph = graph.clone();
            black_box(graph.decay_all(&config, StoryDay(30)));
        });
    });
}

/// Benchmark: scene-end compression of 60 recent memories (target: < 200μs).
fn bench_compression(c: &mut Criterion) {
    let policy = MemoryConfig::default();
    let owner = CharacterId::from("Alice");
    let others = [CharacterId::from("Bob"), CharacterId::from("Carol")];
    let mut store = MemoryStore::new();
    for i in 0u8..60 {
        let kind = match i % 4 {
            0 => MemoryKind::Turn,
            1 => MemoryKind::Witnessed,
            2 => MemoryKind::Knowledge,
            _ => MemoryKind::Reflection,
        };
        let event = MemoryEvent::new(kind, format!("moment {i}"), StoryDay(1))
            .with_participants([others[usize::from(i) % 2].clone()])
            .with_intensity(i % 11);
        store.record(&owner, event);
    }
    let learned = vec!["Bob deflects when pressed".to_string()];

    c.bench_function("scene_compression_60_memories", |b| {
        b.iter(|| {
            let mut store = store.clone();
            black_box(store.compress(&owner, &policy, &learned, StoryDay(2)));
        });
    });
}

criterion_group!(
    benches,
    bench_full_beat,
    bench_relationship_delta,
    bench_decay_pass,
    bench_compression,
);
criterion_main!(benches);
