//! Story, scene and beat data: the narrative hierarchy the coordinator walks.
//!
//! A [`Story`] owns every piece of long-lived state (cast, relationship
//! graph, memory store, story clock) so one value can be snapshotted whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::engine::{EndReason, Turn};
use crate::error::{Result, TableauError};
use crate::memory::{CompressionReport, MemoryStore};
use crate::relationship::{Asymmetry, RelationshipDelta, RelationshipGraph};
use crate::types::{CharacterId, StoryDay, StoryId};

/// What the director supplies when a scene opens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSetup {
    /// Short title.
    pub title: String,
    /// What the scene is about.
    pub premise: String,
    /// What is at risk.
    pub stakes: String,
    /// Story days that pass before the scene opens.
    #[serde(default)]
    pub days_since_previous: u32,
}

/// What the director supplies when a beat opens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatSetup {
    /// The immediate situation.
    pub situation: String,
    /// Characters present, in speaking order.
    pub characters: Vec<CharacterId>,
    /// Hidden secrets for this beat, keyed by character.
    #[serde(default)]
    pub complications: BTreeMap<CharacterId, String>,
}

/// How one character's reflection was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    /// Deltas that landed on the reflector's own outgoing edges.
    pub applied: BTreeMap<CharacterId, RelationshipDelta>,
    /// Deltas refused, with the reason.
    pub rejected: Vec<(CharacterId, String)>,
    /// Gossip items stored, as `(about, text)`.
    pub gossip: Vec<(CharacterId, String)>,
    /// Whether the collaborator failed and nothing was applied.
    pub failed: bool,
}

/// Finalised record of a beat, handed to the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatReport {
    /// Scene number (1-based).
    pub scene: u32,
    /// Beat number within the scene (1-based).
    pub beat: u32,
    /// The situation it was played under.
    pub situation: String,
    /// Why it ended.
    pub end_reason: EndReason,
    /// Last round reached.
    pub rounds: u32,
    /// Every committed turn, in order.
    pub turns: Vec<Turn>,
    /// Characters that left before the end.
    pub exited: Vec<CharacterId>,
    /// Reflection results per character.
    pub reflections: BTreeMap<CharacterId, ReflectionOutcome>,
}

/// Finalised record of a scene, handed to the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneReport {
    /// Scene number (1-based).
    pub scene: u32,
    /// Title from the setup.
    pub title: String,
    /// Director-supplied resolution text.
    pub resolution: Option<String>,
    /// Beats played.
    pub beats: u32,
    /// Compression results per participant.
    pub compression: BTreeMap<CharacterId, CompressionReport>,
    /// Pairs whose feelings disagree by at least the configured gap, as
    /// the scene closes.
    pub asymmetries: Vec<Asymmetry>,
}

/// A scene as stored in the story log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene number (1-based).
    pub number: u32,
    /// Setup the scene opened with.
    pub setup: SceneSetup,
    /// Day the scene opened.
    pub day: StoryDay,
    /// Beats played so far.
    pub beats: Vec<BeatReport>,
    /// Everyone who appeared in at least one beat.
    pub participants: Vec<CharacterId>,
    /// Set when the scene ends.
    pub resolution: Option<String>,
    /// Whether the scene has ended.
    pub closed: bool,
}

impl SceneRecord {
    pub(crate) fn open(number: u32, setup: SceneSetup, day: StoryDay) -> Self {
        Self {
            number,
            setup,
            day,
            beats: Vec::new(),
            participants: Vec::new(),
            resolution: None,
            closed: false,
        }
    }

    pub(crate) fn note_participants(&mut self, present: &[CharacterId]) {
        for who in present {
            if !self.participants.contains(who) {
                self.participants.push(who.clone());
            }
        }
    }
}

/// All long-lived simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Persistence key root.
    pub id: StoryId,
    /// Human-readable title.
    pub title: String,
    /// Story clock.
    pub day: StoryDay,
    /// The cast.
    pub characters: BTreeMap<CharacterId, Character>,
    /// Directed relationships.
    pub relationships: RelationshipGraph,
    /// Per-character memories.
    pub memories: MemoryStore,
    /// Scenes played, oldest first; the last may still be open.
    pub scenes: Vec<SceneRecord>,
}

impl Story {
    /// Start a story with the given cast on day 0.
    ///
    /// # Errors
    /// `InvalidState` if two characters share a name.
    pub fn new(title: impl Into<String>, cast: impl IntoIterator<Item = Character>) -> Result<Self> {
        let mut characters = BTreeMap::new();
        for character in cast {
            let id = character.id().clone();
            if characters.insert(id.clone(), character).is_some() {
                return Err(TableauError::invalid_state(
                    "Story::new",
                    format!("the cast lists {id} twice"),
                ));
            }
        }
        Ok(Self {
            id: StoryId::new(),
            title: title.into(),
            day: StoryDay::default(),
            characters,
            relationships: RelationshipGraph::new(),
            memories: MemoryStore::new(),
            scenes: Vec::new(),
        })
    }

    /// Look up a cast member.
    ///
    /// # Errors
    /// `UnknownCharacter` if not in the cast.
    pub fn character(&self, id: &CharacterId) -> Result<&Character> {
        self.characters
            .get(id)
            .ok_or_else(|| TableauError::UnknownCharacter(id.clone()))
    }

    /// Mutable lookup.
    ///
    /// # Errors
    /// `UnknownCharacter` if not in the cast.
    pub fn character_mut(&mut self, id: &CharacterId) -> Result<&mut Character> {
        self.characters
            .get_mut(id)
            .ok_or_else(|| TableauError::UnknownCharacter(id.clone()))
    }

    /// The scene currently open, if any.
    #[must_use]
    pub fn open_scene(&self) -> Option<&SceneRecord> {
        self.scenes.last().filter(|s| !s.closed)
    }

    pub(crate) fn open_scene_mut(&mut self) -> Option<&mut SceneRecord> {
        self.scenes.last_mut().filter(|s| !s.closed)
    }
}
