//! Per-character recollections at three fidelity tiers.
//!
//! ```text
//! record ──► recent ──(compress, scene end)──► compressed ──(fade)──► faded
//! ```
//!
//! Promotion is strictly one-directional. `recent` is unbounded within a
//! scene and cleared by [`MemoryStore::compress`]; `compressed` overflow is
//! faded rather than dropped; `faded` is the lossy terminal tier.

pub mod compression;
pub mod entry;
pub mod fading;

pub use entry::{
    CompressedKind, CompressedMemory, FadedMemory, MemoryEvent, MemoryKind, RecentMemory,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MemoryConfig;
use crate::types::{CharacterId, MemoryId, StoryDay};

/// One character's memories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBank {
    /// Current-scene, full detail.
    pub recent: Vec<RecentMemory>,
    /// Scene summaries.
    pub compressed: Vec<CompressedMemory>,
    /// Vague impressions.
    pub faded: Vec<FadedMemory>,
    next_seq: u64,
}

impl MemoryBank {
    /// Append an event to `recent`.
    pub fn record(&mut self, event: MemoryEvent) -> MemoryId {
        let id = MemoryId::new();
        self.recent.push(RecentMemory {
            id,
            seq: self.next_seq,
            kind: event.kind,
            summary: event.summary,
            participants: event.participants,
            intensity: event.intensity.min(10),
            day: event.day,
        });
        self.next_seq += 1;
        id
    }

    /// Short text lines for the owner's own decision context: compressed
    /// summaries, then faded gists, then the newest `recent_limit` recent entries.
    #[must_use]
    pub fn recollections(&self, recent_limit: usize) -> Vec<String> {
        let skip = self.recent.len().saturating_sub(recent_limit);
        self.compressed
            .iter()
            .map(|c| c.text.clone())
            .chain(self.faded.iter().map(|f| f.gist.clone()))
            .chain(self.recent[skip..].iter().map(|r| r.summary.clone()))
            .collect()
    }

    /// Total entries across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.len() + self.compressed.len() + self.faded.len()
    }

    /// Whether the bank holds nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a compression pass produced for one character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    /// Recent entries consumed.
    pub consumed: usize,
    /// New compressed summaries.
    pub produced: Vec<CompressedMemory>,
    /// Older compressed entries faded to stay under the cap.
    pub overflow_faded: usize,
}

/// Memory banks for the whole cast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    banks: BTreeMap<CharacterId, MemoryBank>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow one character's bank.
    #[must_use]
    pub fn bank(&self, character: &CharacterId) -> Option<&MemoryBank> {
        self.banks.get(character)
    }

    /// Append to `character`'s recent tier, creating the bank if needed.
    pub fn record(&mut self, character: &CharacterId, event: MemoryEvent) -> MemoryId {
        self.banks.entry(character.clone()).or_default().record(event)
    }

    /// Reduce `character`'s recent tier into capped summaries and clear it.
    ///
    /// `learned` is the character's learned behaviors for the scene, which
    /// feed the lesson slot.
    pub fn compress(
        &mut self,
        character: &CharacterId,
        policy: &MemoryConfig,
        learned: &[String],
        day: StoryDay,
    ) -> CompressionReport {
        let bank = self.banks.entry(character.clone()).or_default();
        let produced = compression::compress_recent(&bank.recent, learned, policy, day);
        let consumed = bank.recent.len();
        bank.recent.clear();
        bank.compressed.extend(produced.iter().cloned());

        let excess = bank.compressed.len().saturating_sub(policy.max_compressed);
        let overflow_faded = fading::fade_where(
            &mut bank.compressed,
            &mut bank.faded,
            policy.max_faded,
            |idx, _| idx < excess,
        );

        debug!(
            character = %character,
            consumed,
            produced = produced.len(),
            overflow_faded,
            "Compressed scene memories"
        );
        CompressionReport {
            consumed,
            produced,
            overflow_faded,
        }
    }

    /// Add `elapsed` interaction-free days to `character`'s compressed
    /// entries and fade those idle longer than `fade_after_days`.
    pub fn fade(&mut self, character: &CharacterId, elapsed: u32, policy: &MemoryConfig) -> usize {
        let Some(bank) = self.banks.get_mut(character) else {
            return 0;
        };
        for memory in &mut bank.compressed {
            memory.idle_days = memory.idle_days.saturating_add(elapsed);
        }
        fading::fade_where(&mut bank.compressed, &mut bank.faded, policy.max_faded, |_, m| {
            m.idle_days > policy.fade_after_days
        })
    }

    /// [`Self::fade`] for every bank. Returns the total faded.
    pub fn fade_all(&mut self, elapsed: u32, policy: &MemoryConfig) -> usize {
        let characters: Vec<CharacterId> = self.banks.keys().cloned().collect();
        characters
            .iter()
            .map(|c| self.fade(c, elapsed, policy))
            .sum()
    }

    /// Renewed contact: reset idle days on `owner`'s summaries involving `other`.
    pub fn touch(&mut self, owner: &CharacterId, other: &CharacterId) {
        if let Some(bank) = self.banks.get_mut(owner) {
            for memory in &mut bank.compressed {
                if memory.participants.contains(other) {
                    memory.idle_days = 0;
                }
            }
        }
    }

    /// Characters with a bank.
    pub fn characters(&self) -> impl Iterator<Item = &CharacterId> {
        self.banks.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> CharacterId {
        CharacterId::from("Alice")
    }

    fn event(summary: &str, intensity: u8, with: &str) -> MemoryEvent {
        MemoryEvent::new(MemoryKind::Turn, summary, StoryDay(0))
            .with_participants([CharacterId::from(with)])
            .with_intensity(intensity)
    }

    #[test]
    fn record_only_touches_recent() {
        let mut store = MemoryStore::new();
        store.record(&alice(), event("spoke", 4, "Bob"));
        let bank = store.bank(&alice()).expect("bank");
        assert_eq!(bank.recent.len(), 1);
        assert!(bank.compressed.is_empty());
        assert!(bank.faded.is_empty());
    }

    #[test]
    fn compress_clears_recent_and_caps_output() {
        let mut store = MemoryStore::new();
        let policy = MemoryConfig::default();
        for i in 0..12 {
            store.record(&alice(), event(&format!("moment {i}"), 3, "Bob"));
        }
        let report = store.compress(&alice(), &policy, &["Bob lies".into()], StoryDay(1));
        assert_eq!(report.consumed, 12);
        assert_eq!(report.produced.len(), 3 + 1 + 1);

        let bank = store.bank(&alice()).expect("bank");
        assert!(bank.recent.is_empty());
        assert_eq!(bank.compressed.len(), 5);
    }

    #[test]
    fn compressed_overflow_fades_oldest() {
        let mut store = MemoryStore::new();
        let policy = MemoryConfig {
            max_compressed: 4,
            ..MemoryConfig::default()
        };
        for scene in 0..2 {
            for i in 0..3 {
                store.record(&alice(), event(&format!("s{scene} m{i}"), 5, "Bob"));
            }
            store.compress(&alice(), &policy, &[], StoryDay(scene));
        }
        let bank = store.bank(&alice()).expect("bank");
        // 4 produced per scene (3 moments + 1 impression), 8 total, cap 4.
        assert_eq!(bank.compressed.len(), 4);
        assert_eq!(bank.faded.len(), 4);
        assert!(bank.compressed.iter().all(|c| c.created == StoryDay(1)));
    }

    #[test]
    fn fade_is_driven_by_idle_days() {
        let mut store = MemoryStore::new();
        let policy = MemoryConfig::default();
        store.record(&alice(), event("argued with Bob", 8, "Bob"));
        store.compress(&alice(), &policy, &[], StoryDay(0));
        let compressed = store.bank(&alice()).expect("bank").compressed.len();

        assert_eq!(store.fade(&alice(), 7, &policy), 0);
        store.touch(&alice(), &CharacterId::from("Bob"));
        assert_eq!(store.fade(&alice(), 7, &policy), 0);
        assert_eq!(store.fade(&alice(), 1, &policy), compressed);

        let bank = store.bank(&alice()).expect("bank");
        assert!(bank.compressed.is_empty());
        assert_eq!(bank.faded.len(), compressed);
    }

    #[test]
    fn recollections_order_tiers() {
        let mut bank = MemoryBank::default();
        for i in 0..5 {
            bank.record(MemoryEvent::new(MemoryKind::Witnessed, format!("r{i}"), StoryDay(0)));
        }
        let lines = bank.recollections(2);
        assert_eq!(lines, ["r3", "r4"]);
    }
}
