//! Memory entry types for the three fidelity tiers.

use serde::{Deserialize, Serialize};

use crate::types::{CharacterId, MemoryId, StoryDay};

/// What kind of event a recent memory captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the owner said or did on their own turn.
    Turn,
    /// Part of an interjection chain the owner took part in.
    Interjection,
    /// Another character's visible action the owner witnessed.
    Witnessed,
    /// The owner's private read of a moment while not speaking.
    Observation,
    /// A fact or suspicion the owner settled on after a beat.
    Knowledge,
    /// Hearsay the owner decided was worth repeating.
    Gossip,
    /// The owner's own note about how a relationship moved.
    Reflection,
}

impl MemoryKind {
    /// Whether this kind describes a concrete moment (specific-moment candidate).
    #[must_use]
    pub fn is_moment(self) -> bool {
        matches!(
            self,
            Self::Turn | Self::Interjection | Self::Witnessed | Self::Observation
        )
    }

    /// Whether this kind is a conclusion the owner drew (lesson candidate).
    #[must_use]
    pub fn is_insight(self) -> bool {
        matches!(self, Self::Knowledge | Self::Reflection)
    }
}

/// Input to [`super::MemoryStore::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// What kind of event this is.
    pub kind: MemoryKind,
    /// One-line description.
    pub summary: String,
    /// Other characters involved (never the owner).
    pub participants: Vec<CharacterId>,
    /// Emotional intensity 0–10 (clamped on record).
    pub intensity: u8,
    /// When it happened.
    pub day: StoryDay,
}

impl MemoryEvent {
    /// Build an event with the given kind and summary and no participants.
    #[must_use]
    pub fn new(kind: MemoryKind, summary: impl Into<String>, day: StoryDay) -> Self {
        Self {
            kind,
            summary: summary.into(),
            participants: Vec::new(),
            intensity: 0,
            day,
        }
    }

    /// Attach participants.
    #[must_use]
    pub fn with_participants(mut self, participants: impl IntoIterator<Item = CharacterId>) -> Self {
        self.participants = participants.into_iter().collect();
        self
    }

    /// Set emotional intensity.
    #[must_use]
    pub fn with_intensity(mut self, intensity: u8) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Full-detail, current-scene record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentMemory {
    /// Unique ID.
    pub id: MemoryId,
    /// Per-bank insertion sequence. Unique within a bank.
    pub seq: u64,
    /// Event kind.
    pub kind: MemoryKind,
    /// One-line description.
    pub summary: String,
    /// Other characters involved.
    pub participants: Vec<CharacterId>,
    /// Emotional intensity 0–10.
    pub intensity: u8,
    /// When it happened.
    pub day: StoryDay,
}

/// Which slot of the compression cap a summary fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompressedKind {
    /// A single vivid moment kept nearly verbatim.
    SpecificMoment,
    /// An overall feeling about one other character.
    GeneralImpression {
        /// Who the impression is about.
        about: CharacterId,
    },
    /// What the owner took away from the scene.
    Lesson,
}

/// Key-point summary produced at scene end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedMemory {
    /// Unique ID.
    pub id: MemoryId,
    /// Slot type.
    pub kind: CompressedKind,
    /// Summary text.
    pub text: String,
    /// Recent memories this was built from.
    pub derived_from: Vec<MemoryId>,
    /// Characters the summary concerns.
    pub participants: Vec<CharacterId>,
    /// Day it was compressed.
    pub created: StoryDay,
    /// Days elapsed without renewed contact with any participant.
    pub idle_days: u32,
}

/// A vague, lossy impression. Terminal tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadedMemory {
    /// Carries the ID of the compressed memory it replaced.
    pub id: MemoryId,
    /// Blurred gist.
    pub gist: String,
    /// Day the original summary was compressed.
    pub originally: StoryDay,
}
