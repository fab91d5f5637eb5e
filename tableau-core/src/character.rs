//! Character state: nature, nurture and the beat's complication.
//!
//! - **Nature** is fixed at creation and never mutated.
//! - **Nurture** evolves with turn outcomes and reflections during a scene,
//!   and is partially reset when the scene ends.
//! - **Complication** is the character's hidden secret for the current beat.
//!   It only ever reaches that character's own decision requests (see
//!   [`crate::context::PrivateView`]).

use serde::{Deserialize, Serialize};

use crate::types::CharacterId;

/// Permanent personality core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nature {
    /// Ordered core traits, most prominent first.
    pub core_traits: Vec<String>,
    /// How the character thinks: "overthinking", "impulsive", "analytical"...
    pub cognitive_style: String,
    /// How the character reacts under pressure: "people-pleasing", "withdrawal"...
    pub stress_response: String,
    /// What the character optimises for: "fairness-first", "pragmatic"...
    pub moral_compass: String,
}

impl Nature {
    /// The most prominent trait, or "neutral" if none are set.
    #[must_use]
    pub fn primary_trait(&self) -> &str {
        self.core_traits.first().map_or("neutral", String::as_str)
    }
}

/// Mutable, scene-scoped personality state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nurture {
    /// How others have treated the character lately.
    pub recent_treatment: String,
    /// Self-confidence on a 0–10 scale.
    pub confidence: u8,
    /// Patterns picked up this scene. Append-only until the scene ends.
    pub learned_behaviors: Vec<String>,
    /// Short-lived beliefs, newest last.
    pub temporary_beliefs: Vec<String>,
    /// The face the character is trying to show.
    pub social_mask: String,
    /// Current emotional state as last reported by the character.
    pub emotional_state: String,
}

impl Default for Nurture {
    fn default() -> Self {
        Self {
            recent_treatment: "neutral".to_string(),
            confidence: 5,
            learned_behaviors: Vec::new(),
            temporary_beliefs: Vec::new(),
            social_mask: "authentic".to_string(),
            emotional_state: NEUTRAL_EMOTION.to_string(),
        }
    }
}

const NEUTRAL_EMOTION: &str = "neutral";

impl Nurture {
    /// Shift confidence, clamped to 0–10.
    pub fn adjust_confidence(&mut self, delta: i32) {
        let next = (i32::from(self.confidence) + delta).clamp(0, 10);
        self.confidence = u8::try_from(next).unwrap_or(10);
    }

    /// Record a learned behavior. Duplicates are ignored.
    pub fn learn_behavior(&mut self, behavior: impl Into<String>) {
        let behavior = behavior.into();
        if !self.learned_behaviors.contains(&behavior) {
            self.learned_behaviors.push(behavior);
        }
    }

    /// Adopt a temporary belief, keeping at most `cap` (oldest dropped).
    pub fn adopt_belief(&mut self, belief: impl Into<String>, cap: usize) {
        let belief = belief.into();
        if self.temporary_beliefs.contains(&belief) {
            return;
        }
        self.temporary_beliefs.push(belief);
        if self.temporary_beliefs.len() > cap {
            let overflow = self.temporary_beliefs.len() - cap;
            self.temporary_beliefs.drain(..overflow);
        }
    }

    /// Set the current emotional state.
    pub fn set_emotional_state(&mut self, emotion: impl Into<String>) {
        self.emotional_state = emotion.into();
    }

    /// Set the social mask.
    pub fn set_social_mask(&mut self, mask: impl Into<String>) {
        self.social_mask = mask.into();
    }

    /// Set how the character was recently treated.
    pub fn set_recent_treatment(&mut self, treatment: impl Into<String>) {
        self.recent_treatment = treatment.into();
    }
}

/// One member of the cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    id: CharacterId,
    nature: Nature,
    /// Scene-scoped mutable state.
    pub nurture: Nurture,
    complication: Option<String>,
}

impl Character {
    /// Create a character at story start with a fresh nurture.
    #[must_use]
    pub fn new(id: impl Into<CharacterId>, nature: Nature) -> Self {
        Self {
            id: id.into(),
            nature,
            nurture: Nurture::default(),
            complication: None,
        }
    }

    /// Seed a non-default nurture (used when a scene starts mid-story).
    #[must_use]
    pub fn with_nurture(mut self, nurture: Nurture) -> Self {
        self.nurture = nurture;
        self
    }

    /// The character's unique name.
    #[must_use]
    pub fn id(&self) -> &CharacterId {
        &self.id
    }

    /// Immutable personality core.
    #[must_use]
    pub fn nature(&self) -> &Nature {
        &self.nature
    }

    /// The hidden secret for the current beat, if any.
    #[must_use]
    pub fn complication(&self) -> Option<&str> {
        self.complication.as_deref()
    }

    /// Assign (or clear) the beat complication.
    pub fn set_complication(&mut self, complication: Option<String>) {
        self.complication = complication;
    }

    /// Scene-boundary reset.
    ///
    /// Returns the learned behaviors so the caller can roll them up into a
    /// lesson, then clears them along with temporary beliefs, the emotional
    /// state and the complication. Confidence, social mask and recent
    /// treatment carry over.
    pub fn end_scene_reset(&mut self) -> Vec<String> {
        let learned = std::mem::take(&mut self.nurture.learned_behaviors);
        self.nurture.temporary_beliefs.clear();
        self.nurture.emotional_state = NEUTRAL_EMOTION.to_string();
        self.complication = None;
        learned
    }
}
