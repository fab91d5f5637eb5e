//! Closed decision types returned by the response-generation collaborator,
//! and their boundary validation.
//!
//! Payloads arrive as loosely shaped JSON. Each `parse_*` function checks the
//! required fields, fills documented defaults for optional ones and turns any
//! other deviation into [`TurnGenerationFailure::Malformed`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TurnGenerationFailure;
use crate::types::CharacterId;

// ---------------------------------------------------------------------------
// Speaking turn
// ---------------------------------------------------------------------------

/// What everyone present can see and hear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleAction {
    /// Spoken words. May be empty when the character only acts.
    pub speaks: String,
    /// Physical action, if any.
    #[serde(default)]
    pub does: Option<String>,
    /// Tone of delivery.
    #[serde(default = "default_tone")]
    pub tone: String,
}

impl VisibleAction {
    /// A neutral, silent action.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            speaks: String::new(),
            does: Some("says nothing".to_string()),
            tone: default_tone(),
        }
    }

    /// One-line rendering for memories and history.
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.speaks.trim(), self.does.as_deref()) {
            ("", Some(act)) => act.to_string(),
            ("", None) => "says nothing".to_string(),
            (words, None) => format!("\"{words}\" ({})", self.tone),
            (words, Some(act)) => format!("\"{words}\" ({}, {act})", self.tone),
        }
    }
}

/// The speaker's private state. Never shown to anyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalState {
    /// Self-reported emotional state.
    #[serde(default = "default_emotion")]
    pub emotional_state: String,
    /// Whether the speaker would like to leave the conversation.
    #[serde(default)]
    pub wants_to_exit: bool,
    /// Self-reported intensity 0–10, if the collaborator supplies one.
    #[serde(default)]
    pub intensity: Option<u8>,
}

impl InternalState {
    /// Emotional intensity, explicit or estimated from the emotional state.
    #[must_use]
    pub fn intensity(&self) -> u8 {
        const HIGH: [&str; 8] = [
            "furious", "terrified", "desperate", "panicked", "enraged", "devastated", "elated",
            "betrayed",
        ];
        const MID: [&str; 8] = [
            "angry", "anxious", "nervous", "frustrated", "excited", "hurt", "suspicious", "afraid",
        ];
        if let Some(explicit) = self.intensity {
            return explicit.min(10);
        }
        let state = self.emotional_state.to_lowercase();
        if HIGH.iter().any(|w| state.contains(w)) {
            8
        } else if MID.iter().any(|w| state.contains(w)) {
            6
        } else if state.contains("neutral") || state.contains("calm") {
            2
        } else {
            4
        }
    }
}

/// Decision for a character whose slot it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakingDecision {
    /// Public part.
    pub action: VisibleAction,
    /// Private part.
    pub internal: InternalState,
}

impl SpeakingDecision {
    /// Neutral stand-in committed when the collaborator fails.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            action: VisibleAction::silent(),
            internal: InternalState {
                emotional_state: default_emotion(),
                wants_to_exit: false,
                intensity: Some(0),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Observing turn
// ---------------------------------------------------------------------------

/// Content of a requested interjection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterjectionLine {
    /// Words to cut in with.
    pub speaks: String,
    /// Tone of delivery.
    #[serde(default = "default_urgent")]
    pub tone: String,
    /// Why the observer wants to cut in. Private.
    #[serde(default)]
    pub reason: String,
}

/// Decision for a character watching someone else's turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservingDecision {
    /// Private read of the moment.
    #[serde(default = "default_observation")]
    pub observation: String,
    /// Whether the observer asks to interject.
    #[serde(default)]
    pub wants_to_interject: bool,
    /// Required when `wants_to_interject` is true.
    #[serde(default)]
    pub interjection: Option<InterjectionLine>,
}

impl ObservingDecision {
    /// Quiet observer; used when the collaborator fails.
    #[must_use]
    pub fn listening() -> Self {
        Self {
            observation: default_observation(),
            wants_to_interject: false,
            interjection: None,
        }
    }

    /// The interjection line, only when the observer actually asked for one.
    #[must_use]
    pub fn requested_line(&self) -> Option<&InterjectionLine> {
        self.interjection.as_ref().filter(|_| self.wants_to_interject)
    }
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

/// Requested change to one of the reflector's own outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipChange {
    /// Trust change.
    #[serde(default)]
    pub trust_delta: i8,
    /// Affection change.
    #[serde(default)]
    pub affection_delta: i8,
    /// Reflector's own phrasing for the relationship.
    #[serde(default)]
    pub label: Option<String>,
    /// Note for the edge history.
    #[serde(default)]
    pub memory: Option<String>,
}

/// What the reflector took away from the beat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knowledge {
    /// Things now believed true.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Things suspected.
    #[serde(default)]
    pub suspicions: Vec<String>,
    /// Hearsay worth passing on; routed to edges of any character named in it.
    #[serde(default)]
    pub gossip_worthy: Vec<String>,
}

/// End-of-beat reflection for one character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    /// Deltas keyed by the other character.
    #[serde(default)]
    pub relationships: BTreeMap<CharacterId, RelationshipChange>,
    /// Knowledge gained.
    #[serde(default, alias = "knowledge_gained")]
    pub knowledge: Knowledge,
    /// New emotional state.
    #[serde(default)]
    pub emotional_state: Option<String>,
    /// Confidence change.
    #[serde(default)]
    pub confidence_delta: i8,
    /// Patterns noticed about others.
    #[serde(default)]
    pub learned_behaviors: Vec<String>,
    /// Temporary beliefs adopted.
    #[serde(default)]
    pub beliefs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Validate a speaking-turn payload.
///
/// # Errors
/// `Malformed` if `action`, `action.speaks` or `internal` is missing, or any
/// field has the wrong type.
pub fn parse_speaking(value: Value) -> Result<SpeakingDecision, TurnGenerationFailure> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("speaking decision is not an object"))?;
    let action = object
        .get("action")
        .ok_or_else(|| malformed("missing `action`"))?;
    if action.get("speaks").is_none() {
        return Err(malformed("missing `action.speaks`"));
    }
    if !object.contains_key("internal") {
        return Err(malformed("missing `internal`"));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// Validate an observing-turn payload.
///
/// # Errors
/// `Malformed` on wrong types, or when an interjection is requested without
/// its content.
pub fn parse_observing(value: Value) -> Result<ObservingDecision, TurnGenerationFailure> {
    if !value.is_object() {
        return Err(malformed("observing decision is not an object"));
    }
    let decision: ObservingDecision =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    if decision.wants_to_interject && decision.interjection.is_none() {
        return Err(malformed("`wants_to_interject` without `interjection`"));
    }
    Ok(decision)
}

/// Validate a reflection payload. Every section is optional.
///
/// # Errors
/// `Malformed` on wrong types.
pub fn parse_reflection(value: Value) -> Result<Reflection, TurnGenerationFailure> {
    if !value.is_object() {
        return Err(malformed("reflection is not an object"));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

fn malformed(reason: impl Into<String>) -> TurnGenerationFailure {
    TurnGenerationFailure::Malformed(reason.into())
}

fn default_tone() -> String {
    "neutral".to_string()
}
fn default_emotion() -> String {
    "neutral".to_string()
}
fn default_urgent() -> String {
    "urgent".to_string()
}
fn default_observation() -> String {
    "listening".to_string()
}
