//! Beat/Scene Coordinator.
//!
//! Drives one [`TurnEngine`] per beat, routes each slot to the
//! [`Responder`], commits the results into the story, and runs the
//! reflection pass at beat end and the compression pass at scene end.
//!
//! Every collaborator call is awaited *before* any state is touched; the
//! effects of a turn are then applied in one synchronous step. Dropping a
//! `run_beat` future at any await point therefore leaves the story as of the
//! last fully committed turn.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TableauConfig;
use crate::context::{
    ObservationRequest, PrivateView, PublicTurn, ReflectionRequest, SceneContext, TurnRequest,
    public_window,
};
use crate::decision::{ObservingDecision, Reflection};
use crate::director::Director;
use crate::engine::{
    EndReason, EnginePhase, ExitOutcome, ExitPolicy, InterjectionOutcome, Slot, Turn, TurnEngine,
    TurnKind,
};
use crate::error::{Result, TableauError, TurnGenerationFailure};
use crate::memory::{MemoryEvent, MemoryKind};
use crate::metrics::{CounterSnapshot, EngineCounters};
use crate::persistence::{BeatInProgress, CLOSED, Snapshot, SnapshotKey, SnapshotStore};
use crate::relationship::{DecayReport, RelationshipDelta};
use crate::responder::Responder;
use crate::story::{BeatReport, BeatSetup, ReflectionOutcome, SceneRecord, SceneReport, SceneSetup, Story};
use crate::types::{CharacterId, StoryId};

const KNOWLEDGE_INTENSITY: u8 = 4;
const SUSPICION_INTENSITY: u8 = 5;
const OBSERVATION_INTENSITY: u8 = 3;
const INTERJECTION_INTENSITY: u8 = 6;

/// What [`Coordinator::advance_days`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdvanceReport {
    /// Relationship edges that drifted toward neutral.
    pub drifted: usize,
    /// Relationship edges that became forgotten.
    pub forgotten: usize,
    /// Compressed memories that faded.
    pub faded: usize,
}

/// Drives a [`Story`] through scenes and beats.
pub struct Coordinator {
    config: TableauConfig,
    story: Story,
    responder: Arc<dyn Responder>,
    store: Option<Box<dyn SnapshotStore>>,
    counters: EngineCounters,
    in_progress: Option<BeatInProgress>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("story", &self.story.id)
            .field("day", &self.story.day)
            .field("beat_in_progress", &self.in_progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Wrap a story. No snapshots are written until a store is attached.
    #[must_use]
    pub fn new(config: TableauConfig, story: Story, responder: Arc<dyn Responder>) -> Self {
        Self {
            config,
            story,
            responder,
            store: None,
            counters: EngineCounters::new(),
            in_progress: None,
        }
    }

    /// Attach a snapshot store.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Rebuild a coordinator from the latest snapshot of `story_id`.
    ///
    /// # Errors
    /// `InvalidState` if nothing was saved for the story; store errors otherwise.
    pub fn resume(
        config: TableauConfig,
        responder: Arc<dyn Responder>,
        store: Box<dyn SnapshotStore>,
        story_id: StoryId,
    ) -> Result<Self> {
        let snapshot = store.load_latest(story_id)?.ok_or_else(|| {
            TableauError::invalid_state("resume", format!("no snapshot saved for story {story_id}"))
        })?;
        info!(
            story = %story_id,
            scene = snapshot.key.scene,
            beat = snapshot.key.beat,
            round = snapshot.key.round,
            "Resuming story"
        );
        Ok(Self {
            config,
            story: snapshot.story,
            responder,
            store: Some(store),
            counters: EngineCounters::new(),
            in_progress: snapshot.beat,
        })
    }

    /// The story as of the last committed turn.
    #[must_use]
    pub fn story(&self) -> &Story {
        &self.story
    }

    /// Engine of the beat being played, if any.
    #[must_use]
    pub fn engine(&self) -> Option<&TurnEngine> {
        self.in_progress.as_ref().map(|b| &b.engine)
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Hand the story back.
    #[must_use]
    pub fn into_story(self) -> Story {
        self.story
    }

    // -----------------------------------------------------------------------
    // Story clock
    // -----------------------------------------------------------------------

    /// Let `days` pass: relationships decay and idle memories fade.
    pub fn advance_days(&mut self, days: u32) -> AdvanceReport {
        if days == 0 {
            return AdvanceReport::default();
        }
        self.story.day = self.story.day.plus(days);
        let DecayReport { drifted, forgotten } = self
            .story
            .relationships
            .decay_all(&self.config.relationship, self.story.day);
        let faded = self.story.memories.fade_all(days, &self.config.memory);
        info!(day = %self.story.day, drifted, forgotten, faded, "Time passed");
        AdvanceReport {
            drifted,
            forgotten,
            faded,
        }
    }

    // -----------------------------------------------------------------------
    // Scenes
    // -----------------------------------------------------------------------

    /// Open a scene. Returns its number.
    ///
    /// # Errors
    /// `InvalidState` if a scene is already open; store errors.
    pub fn begin_scene(&mut self, setup: SceneSetup) -> Result<u32> {
        if self.story.open_scene().is_some() {
            return Err(TableauError::invalid_state("begin_scene", "a scene is already open"));
        }
        self.advance_days(setup.days_since_previous);
        let number = u32::try_from(self.story.scenes.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        info!(scene = number, title = %setup.title, day = %self.story.day, "Scene opened");
        self.story
            .scenes
            .push(SceneRecord::open(number, setup, self.story.day));
        self.save_snapshot(0, 0)?;
        Ok(number)
    }

    /// Close the open scene: reset every participant's nurture and compress
    /// their recent memories, rolling learned behaviors into a lesson.
    ///
    /// # Errors
    /// `InvalidState` if no scene is open or a beat is still in progress.
    pub fn end_scene(&mut self, resolution: Option<String>) -> Result<SceneReport> {
        if self.in_progress.is_some() {
            return Err(TableauError::invalid_state("end_scene", "a beat is in progress"));
        }
        let Some(scene) = self.story.open_scene() else {
            return Err(TableauError::invalid_state("end_scene", "no scene is open"));
        };
        let number = scene.number;
        let title = scene.setup.title.clone();
        let beats = u32::try_from(scene.beats.len()).unwrap_or(u32::MAX);
        let participants = scene.participants.clone();

        let mut compression = BTreeMap::new();
        for who in &participants {
            let learned = self.story.character_mut(who)?.end_scene_reset();
            let report =
                self.story
                    .memories
                    .compress(who, &self.config.memory, &learned, self.story.day);
            compression.insert(who.clone(), report);
        }

        if let Some(scene) = self.story.open_scene_mut() {
            scene.resolution.clone_from(&resolution);
            scene.closed = true;
        }
        let asymmetries = self
            .story
            .relationships
            .asymmetries(self.config.relationship.asymmetry_threshold);
        info!(
            scene = number,
            beats,
            participants = participants.len(),
            asymmetries = asymmetries.len(),
            "Scene closed"
        );

        self.save_snapshot(CLOSED, CLOSED)?;
        if let Some(store) = &self.store {
            store.checkpoint()?;
        }
        Ok(SceneReport {
            scene: number,
            title,
            resolution,
            beats,
            compression,
            asymmetries,
        })
    }

    /// Play scenes and beats until the director runs out. Picks up an
    /// interrupted beat and an open scene first.
    ///
    /// Returns the number of scenes closed.
    ///
    /// # Errors
    /// Any fatal engine, story or store error.
    pub async fn run_story(&mut self, director: &mut dyn Director) -> Result<u32> {
        let mut closed = 0;
        if self.in_progress.is_some() {
            self.continue_beat(director).await?;
        }
        loop {
            if self.story.open_scene().is_none() {
                let Some(setup) = director.next_scene(&self.story) else {
                    break;
                };
                self.begin_scene(setup)?;
            }
            while let Some(beat) = director.next_beat(&self.story) {
                self.run_beat(beat, director).await?;
            }
            let resolution = director.scene_resolution(&self.story);
            let report = self.end_scene(resolution)?;
            director.scene_completed(&report);
            closed += 1;
        }
        let counters = self.counters();
        info!(
            story = %self.story.id,
            scenes = closed,
            turns = counters.turns_committed,
            failures = counters.turn_failures,
            interjections = counters.interjections_accepted,
            "Story finished"
        );
        Ok(closed)
    }

    // -----------------------------------------------------------------------
    // Beats
    // -----------------------------------------------------------------------

    /// Open and play a beat to its end, then run the reflection pass.
    ///
    /// # Errors
    /// `InvalidState` if no scene is open, a beat is already in progress or
    /// the cast is invalid; `UnknownCharacter` for characters not in the story.
    pub async fn run_beat(
        &mut self,
        setup: BeatSetup,
        director: &mut dyn Director,
    ) -> Result<BeatReport> {
        self.open_beat(setup)?;
        self.continue_beat(director).await
    }

    /// Continue the beat in progress (e.g. after [`Self::resume`]).
    ///
    /// # Errors
    /// `InvalidState` if no beat is in progress.
    pub async fn continue_beat(&mut self, director: &mut dyn Director) -> Result<BeatReport> {
        loop {
            let engine = self.engine_mut()?;
            if engine.is_ended() {
                break;
            }
            match engine.phase() {
                EnginePhase::RoundComplete => {
                    self.close_round(director)?;
                    continue;
                }
                // Interrupted while observers were deciding; their answers are lost.
                EnginePhase::TurnTaken => {
                    engine.advance_turn()?;
                    continue;
                }
                _ => {}
            }
            let Some(slot) = engine.next_slot() else {
                return Err(TableauError::invalid_state(
                    "continue_beat",
                    engine.phase().to_string(),
                ));
            };
            self.play_slot(slot).await?;
        }
        self.finish_beat(director).await
    }

    fn open_beat(&mut self, setup: BeatSetup) -> Result<()> {
        if self.in_progress.is_some() {
            return Err(TableauError::invalid_state("run_beat", "a beat is already in progress"));
        }
        let Some(scene) = self.story.open_scene() else {
            return Err(TableauError::invalid_state("run_beat", "no scene is open"));
        };
        let number = u32::try_from(scene.beats.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);

        for who in &setup.characters {
            self.story.character(who)?;
        }
        if let Some(stray) = setup
            .complications
            .keys()
            .find(|c| !setup.characters.contains(c))
        {
            return Err(TableauError::invalid_state(
                "run_beat",
                format!("complication assigned to {stray}, who is not present"),
            ));
        }
        let engine = TurnEngine::new(
            setup.characters.clone(),
            ExitPolicy::from(&self.config.conversation),
        )?;

        for who in &setup.characters {
            let complication = setup.complications.get(who).cloned();
            self.story.character_mut(who)?.set_complication(complication);
            for other in &setup.characters {
                if other != who {
                    self.story.memories.touch(who, other);
                }
            }
        }
        self.story.relationships.ensure_pairs(setup.characters.iter());
        if let Some(scene) = self.story.open_scene_mut() {
            scene.note_participants(&setup.characters);
        }

        info!(
            beat = number,
            situation = %setup.situation,
            characters = setup.characters.len(),
            "Beat opened"
        );
        self.in_progress = Some(BeatInProgress {
            number,
            setup,
            engine,
        });
        Ok(())
    }

    fn close_round(&mut self, director: &mut dyn Director) -> Result<()> {
        let engine = self.engine_mut()?;
        let round = engine.current_round();
        if director.force_end_beat(engine) {
            engine.end_beat(EndReason::DirectorOverride)?;
            return Ok(());
        }
        if self.config.persistence.save_after_round {
            let beat = self.in_progress.as_ref().map_or(0, |b| b.number);
            self.save_snapshot(beat, round)?;
        }
        self.engine_mut()?.start_round()
    }

    async fn play_slot(&mut self, slot: Slot) -> Result<()> {
        let request = self.turn_request(&slot)?;
        let responder = Arc::clone(&self.responder);
        let result = timed(
            self.config.conversation.turn_timeout_ms,
            responder.speaking_turn(&request),
        )
        .await;

        let turn = match result {
            Ok(decision) => Turn::spoken(&slot, decision),
            Err(failure) => {
                warn!(
                    character = %slot.speaker,
                    round = slot.round,
                    kind = ?slot.kind,
                    %failure,
                    "Turn generation failed, substituting a neutral turn"
                );
                EngineCounters::bump(&self.counters.turn_failures);
                Turn::substitute(&slot)
            }
        };
        self.commit(turn)?;

        if slot.kind == TurnKind::Ordinary && self.engine_mut()?.phase() == &EnginePhase::TurnTaken {
            self.poll_observers(&slot).await?;
        }
        Ok(())
    }

    async fn poll_observers(&mut self, slot: &Slot) -> Result<()> {
        let engine = self.engine_mut()?;
        let observers: Vec<CharacterId> = engine
            .base_order()
            .iter()
            .filter(|c| **c != slot.speaker)
            .cloned()
            .collect();
        let requests = observers
            .iter()
            .map(|observer| self.observation_request(observer))
            .collect::<Result<Vec<_>>>()?;

        let responder = Arc::clone(&self.responder);
        let limit = self.config.conversation.turn_timeout_ms;
        let results = join_all(
            requests
                .iter()
                .map(|request| timed(limit, responder.observing_turn(request))),
        )
        .await;

        let day = self.story.day;
        let mut chain_opened = false;
        for (observer, result) in observers.iter().zip(results) {
            let decision = result.unwrap_or_else(|failure| {
                warn!(character = %observer, %failure, "Observation failed, treating as listening");
                ObservingDecision::listening()
            });
            self.story.memories.record(
                observer,
                MemoryEvent::new(MemoryKind::Observation, decision.observation.clone(), day)
                    .with_participants([slot.speaker.clone()])
                    .with_intensity(OBSERVATION_INTENSITY),
            );
            if chain_opened {
                continue;
            }
            let Some(line) = decision.requested_line() else {
                continue;
            };
            let engine = self.engine_mut()?;
            match engine.request_interjection(observer, &slot.speaker) {
                InterjectionOutcome::Accepted(_) => {
                    EngineCounters::bump(&self.counters.interjections_accepted);
                    let Some(step) = self.engine_mut()?.next_slot() else {
                        return Err(TableauError::invalid_state(
                            "poll_observers",
                            "chain accepted without an open slot",
                        ));
                    };
                    self.commit(Turn::interjected(&step, line))?;
                    chain_opened = true;
                }
                InterjectionOutcome::Rejected(reason) => {
                    debug!(character = %observer, ?reason, "Interjection not granted");
                    EngineCounters::bump(&self.counters.interjections_rejected);
                }
            }
        }

        let engine = self.engine_mut()?;
        if !chain_opened && engine.phase() == &EnginePhase::TurnTaken {
            engine.advance_turn()?;
        }
        Ok(())
    }

    /// Apply a turn and all of its effects in one synchronous step.
    fn commit(&mut self, turn: Turn) -> Result<Option<ExitOutcome>> {
        let engine = self.engine_mut()?;
        let present = engine.base_order().to_vec();
        let exit = engine.commit_turn(turn.clone())?;

        EngineCounters::bump(&self.counters.turns_committed);
        if matches!(exit, Some(ExitOutcome::Granted | ExitOutcome::BeatEnded)) {
            EngineCounters::bump(&self.counters.exits_granted);
        }

        let day = self.story.day;
        let speaker = &turn.speaker;
        let summary = format!("{speaker}: {}", turn.action.describe());
        let intensity = turn.internal.as_ref().map_or(
            if turn.kind == TurnKind::Interjection { INTERJECTION_INTENSITY } else { 0 },
            |internal| internal.intensity(),
        );
        let listeners: Vec<CharacterId> =
            present.iter().filter(|c| *c != speaker).cloned().collect();

        if let (Some(internal), false) = (&turn.internal, turn.substituted) {
            self.story
                .character_mut(speaker)?
                .nurture
                .set_emotional_state(internal.emotional_state.clone());
        }

        let own_kind = if turn.kind.in_chain() {
            MemoryKind::Interjection
        } else {
            MemoryKind::Turn
        };
        self.story.memories.record(
            speaker,
            MemoryEvent::new(own_kind, summary.clone(), day)
                .with_participants(listeners.iter().cloned())
                .with_intensity(intensity),
        );
        for listener in &listeners {
            self.story.memories.record(
                listener,
                MemoryEvent::new(MemoryKind::Witnessed, summary.clone(), day)
                    .with_participants([speaker.clone()])
                    .with_intensity(intensity),
            );
            let graph = &mut self.story.relationships;
            let cfg = &self.config.relationship;
            graph.record_interaction(cfg, speaker, listener, day, Some(summary.as_str()));
            graph.record_interaction(cfg, listener, speaker, day, Some(summary.as_str()));
        }
        Ok(exit)
    }

    async fn finish_beat(&mut self, director: &mut dyn Director) -> Result<BeatReport> {
        let Some(beat) = self.in_progress.as_ref() else {
            return Err(TableauError::invalid_state("finish_beat", "no beat in progress"));
        };
        let present = beat.setup.characters.clone();
        let public: Vec<PublicTurn> = beat.engine.turn_history().iter().map(PublicTurn::from).collect();
        let scene = self.scene_context(&beat.engine, &beat.setup.situation, &present)?;

        let requests = present
            .iter()
            .map(|who| {
                Ok(ReflectionRequest {
                    me: self.private_view(who, &present)?,
                    scene: scene.clone(),
                    beat: public.clone(),
                    delta_bound: self.config.relationship.reflection_delta_bound,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let responder = Arc::clone(&self.responder);
        let limit = self.config.conversation.turn_timeout_ms;
        let results = join_all(
            requests
                .iter()
                .map(|request| timed(limit, responder.reflect(request))),
        )
        .await;

        let mut reflections = BTreeMap::new();
        for (who, result) in present.iter().zip(results) {
            let outcome = match result {
                Ok(reflection) => self.apply_reflection(who, reflection)?,
                Err(failure) => {
                    warn!(character = %who, %failure, "Reflection failed, skipping");
                    EngineCounters::bump(&self.counters.reflections_rejected);
                    ReflectionOutcome {
                        failed: true,
                        ..ReflectionOutcome::default()
                    }
                }
            };
            reflections.insert(who.clone(), outcome);
        }

        let Some(beat) = self.in_progress.take() else {
            return Err(TableauError::invalid_state("finish_beat", "no beat in progress"));
        };
        for who in &present {
            self.story.character_mut(who)?.set_complication(None);
        }
        let end_reason = beat.engine.end_reason().ok_or_else(|| {
            TableauError::invalid_state("finish_beat", beat.engine.phase().to_string())
        })?;
        let scene_number = self.story.open_scene().map_or(0, |s| s.number);
        let report = BeatReport {
            scene: scene_number,
            beat: beat.number,
            situation: beat.setup.situation,
            end_reason,
            rounds: beat.engine.current_round(),
            turns: beat.engine.turn_history().to_vec(),
            exited: beat.engine.exited().to_vec(),
            reflections,
        };
        if let Some(scene) = self.story.open_scene_mut() {
            scene.beats.push(report.clone());
        }
        EngineCounters::bump(&self.counters.beats_completed);
        info!(
            scene = report.scene,
            beat = report.beat,
            rounds = report.rounds,
            turns = report.turns.len(),
            reason = %end_reason,
            "Beat completed"
        );

        self.save_snapshot(report.beat, CLOSED)?;
        director.beat_completed(&report);
        Ok(report)
    }

    /// Apply one reflection. Only edges whose source is `who` are written.
    fn apply_reflection(&mut self, who: &CharacterId, reflection: Reflection) -> Result<ReflectionOutcome> {
        let day = self.story.day;
        let mut outcome = ReflectionOutcome::default();

        for (other, change) in reflection.relationships {
            if other == *who || !self.story.characters.contains_key(&other) {
                outcome
                    .rejected
                    .push((other, "not another member of the cast".to_string()));
                EngineCounters::bump(&self.counters.reflections_rejected);
                continue;
            }
            let delta = RelationshipDelta {
                trust: change.trust_delta,
                affection: change.affection_delta,
                label: change.label,
                memory_note: change.memory,
            };
            match self.story.relationships.apply_delta(
                &self.config.relationship,
                who,
                &other,
                &delta,
                day,
            ) {
                Ok(_) => {
                    if let Some(note) = &delta.memory_note {
                        self.story.memories.record(
                            who,
                            MemoryEvent::new(MemoryKind::Reflection, note.clone(), day)
                                .with_participants([other.clone()])
                                .with_intensity(
                                    delta
                                        .trust
                                        .unsigned_abs()
                                        .max(delta.affection.unsigned_abs())
                                        .saturating_mul(2)
                                        .min(10),
                                ),
                        );
                    }
                    outcome.applied.insert(other, delta);
                }
                Err(err) => {
                    warn!(character = %who, about = %other, %err, "Reflection delta rejected");
                    EngineCounters::bump(&self.counters.reflections_rejected);
                    outcome.rejected.push((other, err.to_string()));
                }
            }
        }

        for fact in reflection.knowledge.facts {
            self.story.memories.record(
                who,
                MemoryEvent::new(MemoryKind::Knowledge, fact, day).with_intensity(KNOWLEDGE_INTENSITY),
            );
        }
        for suspicion in reflection.knowledge.suspicions {
            self.story.memories.record(
                who,
                MemoryEvent::new(MemoryKind::Knowledge, format!("suspect: {suspicion}"), day)
                    .with_intensity(SUSPICION_INTENSITY),
            );
        }
        for gossip in reflection.knowledge.gossip_worthy {
            let lowered = gossip.to_lowercase();
            let about: Vec<CharacterId> = self
                .story
                .characters
                .keys()
                .filter(|c| *c != who && lowered.contains(&c.as_str().to_lowercase()))
                .cloned()
                .collect();
            for target in &about {
                self.story
                    .relationships
                    .add_gossip(&self.config.relationship, who, target, gossip.clone());
                outcome.gossip.push((target.clone(), gossip.clone()));
            }
            self.story.memories.record(
                who,
                MemoryEvent::new(MemoryKind::Gossip, gossip, day).with_participants(about),
            );
        }

        let cap = self.config.memory.max_temporary_beliefs;
        let nurture = &mut self.story.character_mut(who)?.nurture;
        if let Some(state) = reflection.emotional_state {
            nurture.set_emotional_state(state);
        }
        nurture.adjust_confidence(i32::from(reflection.confidence_delta));
        for behavior in reflection.learned_behaviors {
            nurture.learn_behavior(behavior);
        }
        for belief in reflection.beliefs {
            nurture.adopt_belief(belief, cap);
        }

        debug!(
            character = %who,
            applied = outcome.applied.len(),
            rejected = outcome.rejected.len(),
            gossip = outcome.gossip.len(),
            "Reflection applied"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    fn private_view(&self, who: &CharacterId, present: &[CharacterId]) -> Result<PrivateView> {
        Ok(PrivateView::build(
            self.story.character(who)?,
            &self.story.relationships,
            &self.story.memories,
            present,
        ))
    }

    fn scene_context(
        &self,
        engine: &TurnEngine,
        situation: &str,
        present: &[CharacterId],
    ) -> Result<SceneContext> {
        let Some(scene) = self.story.open_scene() else {
            return Err(TableauError::invalid_state("scene_context", "no scene is open"));
        };
        Ok(SceneContext {
            premise: scene.setup.premise.clone(),
            stakes: scene.setup.stakes.clone(),
            situation: situation.to_string(),
            present: present.to_vec(),
            round: engine.current_round(),
            exit_phase: engine.exit_phase(),
            energy: engine.energy(),
        })
    }

    fn beat(&self) -> Result<&BeatInProgress> {
        self.in_progress
            .as_ref()
            .ok_or_else(|| TableauError::invalid_state("beat", "no beat in progress"))
    }

    fn engine_mut(&mut self) -> Result<&mut TurnEngine> {
        self.in_progress
            .as_mut()
            .map(|b| &mut b.engine)
            .ok_or_else(|| TableauError::invalid_state("engine", "no beat in progress"))
    }

    fn turn_request(&self, slot: &Slot) -> Result<TurnRequest> {
        let beat = self.beat()?;
        let engine = &beat.engine;
        let present = engine.base_order();
        let opposite = match engine.phase() {
            EnginePhase::Chain(chain) if slot.speaker == chain.interjector => {
                Some(chain.speaker.clone())
            }
            EnginePhase::Chain(chain) => Some(chain.interjector.clone()),
            _ => None,
        };
        Ok(TurnRequest {
            me: self.private_view(&slot.speaker, present)?,
            scene: self.scene_context(engine, &beat.setup.situation, present)?,
            history: public_window(engine.turn_history(), self.config.conversation.history_window),
            kind: slot.kind,
            opposite,
        })
    }

    fn observation_request(&self, observer: &CharacterId) -> Result<ObservationRequest> {
        let beat = self.beat()?;
        let engine = &beat.engine;
        let present = engine.base_order();
        let history = public_window(engine.turn_history(), self.config.conversation.history_window);
        let Some(just_spoken) = history.last().cloned() else {
            return Err(TableauError::invalid_state("observation_request", "no turn to observe"));
        };
        Ok(ObservationRequest {
            me: self.private_view(observer, present)?,
            scene: self.scene_context(engine, &beat.setup.situation, present)?,
            history,
            just_spoken,
            can_interject: !engine.has_interjected(observer),
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn save_snapshot(&mut self, beat: u32, round: u32) -> Result<()> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };
        let snapshot = Snapshot {
            key: SnapshotKey {
                story_id: self.story.id,
                scene: self.story.scenes.last().map_or(0, |s| s.number),
                beat,
                round,
            },
            story: self.story.clone(),
            beat: self.in_progress.clone(),
            saved_at: Utc::now(),
        };
        store.save(&snapshot)?;
        EngineCounters::bump(&self.counters.snapshots_saved);
        Ok(())
    }
}

/// Bound a collaborator call; elapsing becomes `TurnGenerationFailure::Timeout`.
async fn timed<T>(
    limit_ms: u64,
    call: impl Future<Output = std::result::Result<T, TurnGenerationFailure>>,
) -> std::result::Result<T, TurnGenerationFailure> {
    tokio::time::timeout(Duration::from_millis(limit_ms), call)
        .await
        .unwrap_or(Err(TurnGenerationFailure::Timeout(limit_ms)))
}
