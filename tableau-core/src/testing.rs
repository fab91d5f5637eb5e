//! Deterministic collaborators for tests, demos and benches.
//!
//! [`ScriptedResponder`] answers from per-character queues and falls back to
//! a plain default once a queue runs dry. [`ScriptedDirector`] plays a fixed
//! list of scenes and is deserializable from TOML.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::{ObservationRequest, ReflectionRequest, TurnRequest};
use crate::decision::{
    InterjectionLine, ObservingDecision, Reflection, SpeakingDecision, VisibleAction,
};
use crate::director::Director;
use crate::engine::TurnEngine;
use crate::error::TurnGenerationFailure;
use crate::responder::Responder;
use crate::story::{BeatReport, BeatSetup, SceneReport, SceneSetup, Story};
use crate::types::CharacterId;

type Answer<T> = Result<T, TurnGenerationFailure>;

/// Which responder method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `speaking_turn`
    Speaking,
    /// `observing_turn`
    Observing,
    /// `reflect`
    Reflecting,
}

/// One recorded call: who was asked, and the request as sent (JSON).
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Character the request was for.
    pub character: CharacterId,
    /// Method.
    pub kind: CallKind,
    /// Serialized request.
    pub request: String,
}

#[derive(Default)]
struct Queues {
    speaking: BTreeMap<CharacterId, VecDeque<Answer<SpeakingDecision>>>,
    observing: BTreeMap<CharacterId, VecDeque<Answer<ObservingDecision>>>,
    reflecting: BTreeMap<CharacterId, VecDeque<Answer<Reflection>>>,
    delays: BTreeMap<CharacterId, Duration>,
    calls: Vec<RecordedCall>,
}

/// Responder that replays queued answers.
#[derive(Default)]
pub struct ScriptedResponder {
    inner: Mutex<Queues>,
}

impl std::fmt::Debug for ScriptedResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedResponder")
            .field("calls", &self.inner.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl ScriptedResponder {
    /// Empty script: every call gets the default answer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a speaking answer for `who`.
    pub fn push_speaking(&self, who: impl Into<CharacterId>, answer: Answer<SpeakingDecision>) {
        self.inner
            .lock()
            .speaking
            .entry(who.into())
            .or_default()
            .push_back(answer);
    }

    /// Queue a line of dialogue for `who`.
    pub fn say(&self, who: impl Into<CharacterId>, line: &str) {
        self.push_speaking(who, Ok(line_decision(line, false)));
    }

    /// Queue a line after which `who` asks to leave.
    pub fn say_and_leave(&self, who: impl Into<CharacterId>, line: &str) {
        self.push_speaking(who, Ok(line_decision(line, true)));
    }

    /// Queue an observing answer for `who`.
    pub fn push_observing(&self, who: impl Into<CharacterId>, answer: Answer<ObservingDecision>) {
        self.inner
            .lock()
            .observing
            .entry(who.into())
            .or_default()
            .push_back(answer);
    }

    /// Queue an interjection request for `who`'s next observation.
    pub fn interject(&self, who: impl Into<CharacterId>, line: &str) {
        self.push_observing(
            who,
            Ok(ObservingDecision {
                observation: "can't stay quiet".to_string(),
                wants_to_interject: true,
                interjection: Some(InterjectionLine {
                    speaks: line.to_string(),
                    tone: "urgent".to_string(),
                    reason: "provoked".to_string(),
                }),
            }),
        );
    }

    /// Queue a reflection for `who`.
    pub fn push_reflection(&self, who: impl Into<CharacterId>, answer: Answer<Reflection>) {
        self.inner
            .lock()
            .reflecting
            .entry(who.into())
            .or_default()
            .push_back(answer);
    }

    /// Make every call for `who` sleep first.
    pub fn delay(&self, who: impl Into<CharacterId>, by: Duration) {
        self.inner.lock().delays.insert(who.into(), by);
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    fn record(&self, character: &CharacterId, kind: CallKind, request: &impl Serialize) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.calls.push(RecordedCall {
            character: character.clone(),
            kind,
            request: serde_json::to_string(request).unwrap_or_default(),
        });
        inner.delays.get(character).copied()
    }
}

fn line_decision(line: &str, leave: bool) -> SpeakingDecision {
    let mut decision = SpeakingDecision::neutral();
    decision.action = VisibleAction {
        speaks: line.to_string(),
        does: None,
        tone: "neutral".to_string(),
    };
    decision.internal.wants_to_exit = leave;
    decision
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn speaking_turn(&self, request: &TurnRequest) -> Answer<SpeakingDecision> {
        let me = &request.me.name;
        pause(self.record(me, CallKind::Speaking, request)).await;
        let queued = self
            .inner
            .lock()
            .speaking
            .get_mut(me)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| Ok(line_decision(&format!("{me} has nothing to add."), false)))
    }

    async fn observing_turn(&self, request: &ObservationRequest) -> Answer<ObservingDecision> {
        let me = &request.me.name;
        pause(self.record(me, CallKind::Observing, request)).await;
        let queued = self
            .inner
            .lock()
            .observing
            .get_mut(me)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| Ok(ObservingDecision::listening()))
    }

    async fn reflect(&self, request: &ReflectionRequest) -> Answer<Reflection> {
        let me = &request.me.name;
        pause(self.record(me, CallKind::Reflecting, request)).await;
        let queued = self
            .inner
            .lock()
            .reflecting
            .get_mut(me)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| Ok(Reflection::default()))
    }
}

// ---------------------------------------------------------------------------
// Director
// ---------------------------------------------------------------------------

/// One scene of a fixed script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedScene {
    /// Scene setup.
    #[serde(flatten)]
    pub setup: SceneSetup,
    /// Beats, played in order.
    #[serde(default)]
    pub beats: Vec<BeatSetup>,
    /// Resolution recorded when the scene closes.
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Director that plays scenes in order and keeps every report.
#[derive(Debug, Default)]
pub struct ScriptedDirector {
    scenes: VecDeque<ScriptedScene>,
    beats: VecDeque<BeatSetup>,
    resolution: Option<String>,
    force_end_after_round: Option<u32>,
    /// Beat reports received.
    pub beat_reports: Vec<BeatReport>,
    /// Scene reports received.
    pub scene_reports: Vec<SceneReport>,
}

impl ScriptedDirector {
    /// Play `scenes` in order.
    #[must_use]
    pub fn new(scenes: Vec<ScriptedScene>) -> Self {
        Self {
            scenes: scenes.into(),
            ..Self::default()
        }
    }

    /// Cut every beat short once this round completes.
    #[must_use]
    pub fn force_end_after(mut self, round: u32) -> Self {
        self.force_end_after_round = Some(round);
        self
    }

    /// Continue a scene that was already open when the story resumed.
    #[must_use]
    pub fn with_open_scene(mut self, beats: Vec<BeatSetup>, resolution: Option<String>) -> Self {
        self.beats = beats.into();
        self.resolution = resolution;
        self
    }
}

impl Director for ScriptedDirector {
    fn next_scene(&mut self, _story: &Story) -> Option<SceneSetup> {
        let scene = self.scenes.pop_front()?;
        self.beats = scene.beats.into();
        self.resolution = scene.resolution;
        Some(scene.setup)
    }

    fn next_beat(&mut self, _story: &Story) -> Option<BeatSetup> {
        self.beats.pop_front()
    }

    fn force_end_beat(&mut self, engine: &TurnEngine) -> bool {
        self.force_end_after_round
            .is_some_and(|round| engine.current_round() >= round)
    }

    fn beat_completed(&mut self, report: &BeatReport) {
        self.beat_reports.push(report.clone());
    }

    fn scene_resolution(&mut self, _story: &Story) -> Option<String> {
        self.resolution.take()
    }

    fn scene_completed(&mut self, report: &SceneReport) {
        self.scene_reports.push(report.clone());
    }
}
