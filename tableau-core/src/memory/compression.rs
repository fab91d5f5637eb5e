//! Scene-end compression from Recent into Compressed.
//!
//! Priority is total and stable: emotional intensity descending, then `seq`
//! descending (newer first). `seq` is unique per bank, so no two recent
//! entries ever compare equal.
//!
//! Slots are filled in three passes:
//!   1. specific moments: the top-priority turns, interjections, witnessed
//!      events and observations;
//!   2. general impressions: one per most-frequent co-participant
//!      (frequency desc, then name asc), summarising count and mean intensity;
//!   3. lessons: the newest learned behavior rolled up from nurture, else the
//!      top-priority knowledge or reflection entry.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::MemoryConfig;
use crate::types::{CharacterId, MemoryId, StoryDay};

use super::entry::{CompressedKind, CompressedMemory, RecentMemory};

/// Sort key implementing the priority function. Smaller sorts first.
#[must_use]
pub fn priority_key(entry: &RecentMemory) -> (Reverse<u8>, Reverse<u64>) {
    (Reverse(entry.intensity), Reverse(entry.seq))
}

/// Build the compressed summaries for one scene's worth of recent memories.
///
/// `learned` is the owner's learned behaviors for the scene, oldest first.
/// Does not touch `recent`; the caller clears it.
#[must_use]
pub fn compress_recent(
    recent: &[RecentMemory],
    learned: &[String],
    policy: &MemoryConfig,
    day: StoryDay,
) -> Vec<CompressedMemory> {
    let mut ranked: Vec<&RecentMemory> = recent.iter().collect();
    ranked.sort_by_key(|e| priority_key(e));

    let mut out = Vec::new();

    for entry in ranked
        .iter()
        .filter(|e| e.kind.is_moment())
        .take(policy.specific_moments)
    {
        out.push(summary(
            CompressedKind::SpecificMoment,
            entry.summary.clone(),
            vec![entry.id],
            entry.participants.clone(),
            day,
        ));
    }

    for (about, entries) in co_participants(recent)
        .into_iter()
        .take(policy.general_impressions)
    {
        let total: u32 = entries.iter().map(|e| u32::from(e.intensity)).sum();
        let count = u32::try_from(entries.len()).unwrap_or(u32::MAX).max(1);
        let mean = total / count;
        let text = format!(
            "{about}: {count} shared moments, {} on the whole",
            intensity_word(mean)
        );
        out.push(summary(
            CompressedKind::GeneralImpression {
                about: about.clone(),
            },
            text,
            entries.iter().map(|e| e.id).collect(),
            vec![about],
            day,
        ));
    }

    if policy.lessons > 0 {
        let lesson = learned
            .last()
            .map(|behavior| (behavior.clone(), Vec::new(), Vec::new()))
            .or_else(|| {
                ranked.iter().find(|e| e.kind.is_insight()).map(|e| {
                    (e.summary.clone(), vec![e.id], e.participants.clone())
                })
            });
        if let Some((text, from, participants)) = lesson {
            out.push(summary(CompressedKind::Lesson, text, from, participants, day));
        }
    }

    out
}

fn summary(
    kind: CompressedKind,
    text: String,
    derived_from: Vec<MemoryId>,
    participants: Vec<CharacterId>,
    created: StoryDay,
) -> CompressedMemory {
    CompressedMemory {
        id: MemoryId::new(),
        kind,
        text,
        derived_from,
        participants,
        created,
        idle_days: 0,
    }
}

/// Co-participants ordered by frequency desc, then name asc.
fn co_participants(recent: &[RecentMemory]) -> Vec<(CharacterId, Vec<&RecentMemory>)> {
    let mut by_character: BTreeMap<&CharacterId, Vec<&RecentMemory>> = BTreeMap::new();
    for entry in recent {
        for who in &entry.participants {
            by_character.entry(who).or_default().push(entry);
        }
    }
    let mut grouped: Vec<_> = by_character
        .into_iter()
        .map(|(who, entries)| (who.clone(), entries))
        .collect();
    // BTreeMap order is name asc; a stable sort keeps it as the tie-break.
    grouped.sort_by_key(|(_, entries)| Reverse(entries.len()));
    grouped
}

fn intensity_word(mean: u32) -> &'static str {
    match mean {
        7.. => "intense",
        4..=6 => "memorable",
        _ => "uneventful",
    }
}
