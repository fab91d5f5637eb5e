//! Directed trust and affection edges between characters.
//!
//! Every ordered pair `(A, B)` owns an independent [`Relationship`]; nothing
//! in this module reads or writes `B → A` while handling `A → B`. Edges are
//! created lazily as `Unknown`, become `Known` on first direct interaction,
//! and drift back toward neutral (5) once the pair stops interacting.
//!
//! The relationship label is never stored: [`Relationship::label`] classifies
//! the current `(trust, affection)` pair on every read.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RelationshipConfig;
use crate::error::{Result, TableauError};
use crate::types::{CharacterId, StoryDay};

/// The neutral point trust and affection decay toward.
pub const NEUTRAL_SCORE: u8 = 5;

const MAX_SCORE: u8 = 10;

/// Whether the source character has met the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    /// Never met. Trust and affection are unset; gossip may still exist.
    Unknown,
    /// Have interacted directly.
    Known,
    /// Met once, but the memory has decayed to neutral.
    Forgotten,
}

/// Short descriptor derived from a `(trust, affection)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLabel {
    /// Both very high.
    BelovedFriend,
    /// Both high.
    TrustedAlly,
    /// High trust, low affection: reliable but cold.
    ReliableStranger,
    /// Low trust, high affection.
    CharmingLiar,
    /// Both low.
    DangerousEnemy,
    /// Fairly high trust, middling affection.
    CautiousAlly,
    /// Middling trust, high affection.
    LikeableAcquaintance,
    /// Anything else.
    ComplicatedPerson,
}

impl RelationshipLabel {
    /// Classify a `(trust, affection)` pair. First matching rule wins.
    #[must_use]
    pub fn classify(trust: u8, affection: u8) -> Self {
        match (trust, affection) {
            (t, a) if t >= 8 && a >= 8 => Self::BelovedFriend,
            (t, a) if t >= 7 && a >= 7 => Self::TrustedAlly,
            (t, a) if t >= 7 && a <= 3 => Self::ReliableStranger,
            (t, a) if t <= 3 && a >= 7 => Self::CharmingLiar,
            (t, a) if t <= 3 && a <= 3 => Self::DangerousEnemy,
            (t, a) if t >= 6 && (4..=6).contains(&a) => Self::CautiousAlly,
            (t, a) if (4..=6).contains(&t) && a >= 7 => Self::LikeableAcquaintance,
            _ => Self::ComplicatedPerson,
        }
    }

    /// Two-word human-readable form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelovedFriend => "beloved friend",
            Self::TrustedAlly => "trusted ally",
            Self::ReliableStranger => "reliable stranger",
            Self::CharmingLiar => "charming liar",
            Self::DangerousEnemy => "dangerous enemy",
            Self::CautiousAlly => "cautious ally",
            Self::LikeableAcquaintance => "likeable acquaintance",
            Self::ComplicatedPerson => "complicated person",
        }
    }
}

impl fmt::Display for RelationshipLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in an edge's history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    /// Compressed description of what happened.
    pub note: String,
    /// Trust change this event caused, if any.
    pub trust_delta: Option<i8>,
    /// Affection change this event caused, if any.
    pub affection_delta: Option<i8>,
    /// The source character's own words for the relationship at the time.
    pub perceived_label: Option<String>,
    /// When it happened.
    pub day: StoryDay,
}

/// Running summary of history entries that fell out of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDigest {
    /// How many entries were folded in.
    pub dropped: u32,
    /// Sum of their trust deltas.
    pub net_trust: i32,
    /// Sum of their affection deltas.
    pub net_affection: i32,
}

/// A one-directional relationship `from → to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Whose feelings these are.
    pub from: CharacterId,
    /// Who they are about.
    pub to: CharacterId,
    /// Met / not met / faded.
    pub status: RelationshipStatus,
    /// 0–10: will they do what they say? `None` while unknown.
    pub trust: Option<u8>,
    /// 0–10: do I enjoy their company? `None` while unknown.
    pub affection: Option<u8>,
    /// Summary of the most recent direct exchange.
    pub last_interaction: Option<String>,
    /// Day of the most recent direct exchange.
    pub last_interaction_day: Option<StoryDay>,
    /// Recent history, oldest first.
    pub historical_events: Vec<HistoricalEvent>,
    /// What fell out of `historical_events`.
    pub digest: EventDigest,
    /// Hearsay about `to`, oldest first, deduplicated.
    pub gossip_knowledge: Vec<String>,
}

impl Relationship {
    fn unknown(from: CharacterId, to: CharacterId) -> Self {
        Self {
            from,
            to,
            status: RelationshipStatus::Unknown,
            trust: None,
            affection: None,
            last_interaction: None,
            last_interaction_day: None,
            historical_events: Vec::new(),
            digest: EventDigest::default(),
            gossip_knowledge: Vec::new(),
        }
    }

    /// Derived label; `None` while the pair has never met.
    #[must_use]
    pub fn label(&self) -> Option<RelationshipLabel> {
        match (self.status, self.trust, self.affection) {
            (RelationshipStatus::Unknown, _, _) => None,
            (_, Some(trust), Some(affection)) => Some(RelationshipLabel::classify(trust, affection)),
            _ => None,
        }
    }

    fn push_event(&mut self, event: HistoricalEvent, window: usize) {
        self.historical_events.push(event);
        while self.historical_events.len() > window {
            let evicted = self.historical_events.remove(0);
            self.digest.dropped += 1;
            self.digest.net_trust += i32::from(evicted.trust_delta.unwrap_or(0));
            self.digest.net_affection += i32::from(evicted.affection_delta.unwrap_or(0));
        }
    }

    fn meet(&mut self, trust: u8, affection: u8) {
        if self.status == RelationshipStatus::Unknown {
            self.trust = Some(trust.min(MAX_SCORE));
            self.affection = Some(affection.min(MAX_SCORE));
        }
        self.status = RelationshipStatus::Known;
    }

    /// Compact read-only projection used in decision requests.
    #[must_use]
    pub fn view(&self) -> RelationshipView {
        let recent = self.historical_events.len().saturating_sub(3);
        let gossip = self.gossip_knowledge.len().saturating_sub(2);
        RelationshipView {
            about: self.to.clone(),
            status: self.status,
            trust: self.trust,
            affection: self.affection,
            label: self.label().map(|l| l.as_str().to_string()),
            last_interaction: self.last_interaction.clone(),
            recent_events: self.historical_events[recent..]
                .iter()
                .map(|e| e.note.clone())
                .collect(),
            gossip: self.gossip_knowledge[gossip..].to_vec(),
        }
    }
}

/// What a character knows about one other character, as shown to that
/// character's own decision requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipView {
    /// The other character.
    pub about: CharacterId,
    /// Met / not met / faded.
    pub status: RelationshipStatus,
    /// Current trust, if met.
    pub trust: Option<u8>,
    /// Current affection, if met.
    pub affection: Option<u8>,
    /// Derived label, if met.
    pub label: Option<String>,
    /// Most recent exchange.
    pub last_interaction: Option<String>,
    /// Up to three most recent history notes.
    pub recent_events: Vec<String>,
    /// Up to two most recent gossip items.
    pub gossip: Vec<String>,
}

/// A requested change to one edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDelta {
    /// Trust change; must lie within the reflection bound.
    pub trust: i8,
    /// Affection change; must lie within the reflection bound.
    pub affection: i8,
    /// The source character's own phrasing for the relationship.
    pub label: Option<String>,
    /// Note appended to the edge history.
    pub memory_note: Option<String>,
}

/// Result of a single decay application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOutcome {
    /// Still inside the interaction-free grace period.
    Fresh,
    /// Moved one step toward neutral.
    Drifted,
    /// Already neutral, but not yet idle long enough to be forgotten.
    Settled,
    /// Neutral and idle past the forget horizon.
    Forgotten,
}

/// Counts from a [`RelationshipGraph::decay_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Edges that moved toward neutral.
    pub drifted: usize,
    /// Edges that became forgotten.
    pub forgotten: usize,
}

/// A pair whose two directions disagree sharply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asymmetry {
    /// First character (lexicographically smaller).
    pub a: CharacterId,
    /// Second character.
    pub b: CharacterId,
    /// `|trust(a→b) − trust(b→a)|`.
    pub trust_gap: u8,
    /// `|affection(a→b) − affection(b→a)|`.
    pub affection_gap: u8,
}

/// All directed edges, grouped by source.
///
/// Grouping by source makes the reflection discipline explicit: a
/// character's reflection only ever touches `edges[self]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: BTreeMap<CharacterId, BTreeMap<CharacterId, Relationship>>,
}

impl RelationshipGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `from → to` without creating it.
    #[must_use]
    pub fn edge(&self, from: &CharacterId, to: &CharacterId) -> Option<&Relationship> {
        self.edges.get(from).and_then(|out| out.get(to))
    }

    /// Return the existing edge or create an `Unknown` one.
    pub fn get_or_create(&mut self, from: &CharacterId, to: &CharacterId) -> &mut Relationship {
        self.edges
            .entry(from.clone())
            .or_default()
            .entry(to.clone())
            .or_insert_with(|| Relationship::unknown(from.clone(), to.clone()))
    }

    /// Create `Unknown` edges for every ordered pair of distinct characters.
    pub fn ensure_pairs<'a>(&mut self, characters: impl IntoIterator<Item = &'a CharacterId> + Clone) {
        for from in characters.clone() {
            for to in characters.clone() {
                if from != to {
                    self.get_or_create(from, to);
                }
            }
        }
    }

    /// All edges whose source is `from`.
    pub fn outgoing(&self, from: &CharacterId) -> impl Iterator<Item = &Relationship> {
        self.edges.get(from).into_iter().flat_map(BTreeMap::values)
    }

    /// Total number of directed edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    /// Whether no edge exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `from → to` as met with explicit starting scores.
    ///
    /// Already-known edges keep their scores; forgotten edges are revived
    /// with their decayed scores.
    pub fn establish_first_meeting(
        &mut self,
        from: &CharacterId,
        to: &CharacterId,
        trust: u8,
        affection: u8,
        day: StoryDay,
    ) -> &Relationship {
        let edge = self.get_or_create(from, to);
        edge.meet(trust, affection);
        edge.last_interaction_day.get_or_insert(day);
        edge
    }

    /// Record a direct exchange from `from`'s point of view.
    pub fn record_interaction(
        &mut self,
        config: &RelationshipConfig,
        from: &CharacterId,
        to: &CharacterId,
        day: StoryDay,
        summary: Option<&str>,
    ) {
        if from == to {
            return;
        }
        let edge = self.get_or_create(from, to);
        edge.meet(config.initial_trust, config.initial_affection);
        edge.last_interaction_day = Some(day);
        if let Some(summary) = summary {
            edge.last_interaction = Some(summary.to_string());
        }
    }

    /// Apply a bounded trust/affection change to `from → to`.
    ///
    /// # Errors
    /// [`TableauError::DecayPolicyViolation`] if either delta exceeds the
    /// configured reflection bound or `from == to`. The graph is unchanged.
    pub fn apply_delta(
        &mut self,
        config: &RelationshipConfig,
        from: &CharacterId,
        to: &CharacterId,
        delta: &RelationshipDelta,
        day: StoryDay,
    ) -> Result<&Relationship> {
        if from == to {
            return Err(violation(from, to, "self relationships are not tracked"));
        }
        let bound = i16::from(config.reflection_delta_bound);
        for (name, value) in [("trust", delta.trust), ("affection", delta.affection)] {
            if i16::from(value).abs() > bound {
                return Err(violation(
                    from,
                    to,
                    format!("{name} delta {value:+} outside ±{bound}"),
                ));
            }
        }

        let window = config.history_window;
        let edge = self.get_or_create(from, to);
        edge.meet(config.initial_trust, config.initial_affection);
        edge.trust = edge.trust.map(|t| shift(t, delta.trust));
        edge.affection = edge.affection.map(|a| shift(a, delta.affection));
        edge.last_interaction_day = Some(day);

        if let Some(note) = &delta.memory_note {
            edge.last_interaction = Some(note.clone());
            edge.push_event(
                HistoricalEvent {
                    note: note.clone(),
                    trust_delta: Some(delta.trust),
                    affection_delta: Some(delta.affection),
                    perceived_label: delta.label.clone(),
                    day,
                },
                window,
            );
        }

        debug!(
            from = %from,
            to = %to,
            trust = ?edge.trust,
            affection = ?edge.affection,
            label = ?edge.label(),
            "Applied relationship delta"
        );
        Ok(edge)
    }

    /// Drift `from → to` one step toward neutral once the pair has been idle
    /// longer than the decay threshold.
    ///
    /// # Errors
    /// [`TableauError::DecayPolicyViolation`] if the edge is `Unknown` or does
    /// not exist. Gossip is never touched.
    pub fn decay(
        &mut self,
        config: &RelationshipConfig,
        from: &CharacterId,
        to: &CharacterId,
        days_since_interaction: u32,
    ) -> Result<DecayOutcome> {
        let Some(edge) = self.edges.get_mut(from).and_then(|out| out.get_mut(to)) else {
            return Err(violation(from, to, "edge does not exist"));
        };
        if edge.status == RelationshipStatus::Unknown {
            return Err(violation(from, to, "cannot decay an unknown relationship"));
        }
        Ok(decay_edge(edge, config, days_since_interaction))
    }

    /// Apply [`Self::decay`] to every met edge, measuring idleness against `today`.
    pub fn decay_all(&mut self, config: &RelationshipConfig, today: StoryDay) -> DecayReport {
        let mut report = DecayReport::default();
        for edge in self.edges.values_mut().flat_map(BTreeMap::values_mut) {
            if edge.status != RelationshipStatus::Known {
                continue;
            }
            let idle = edge
                .last_interaction_day
                .map_or(0, |day| today.days_since(day));
            match decay_edge(edge, config, idle) {
                DecayOutcome::Drifted => report.drifted += 1,
                DecayOutcome::Forgotten => report.forgotten += 1,
                DecayOutcome::Fresh | DecayOutcome::Settled => {}
            }
        }
        report
    }

    /// Record hearsay `listener` picked up about `about`. Works before they meet.
    pub fn add_gossip(
        &mut self,
        config: &RelationshipConfig,
        listener: &CharacterId,
        about: &CharacterId,
        gossip: impl Into<String>,
    ) {
        if listener == about {
            return;
        }
        let gossip = gossip.into();
        let edge = self.get_or_create(listener, about);
        if edge.gossip_knowledge.contains(&gossip) {
            return;
        }
        edge.gossip_knowledge.push(gossip);
        if edge.gossip_knowledge.len() > config.gossip_cap {
            let overflow = edge.gossip_knowledge.len() - config.gossip_cap;
            edge.gossip_knowledge.drain(..overflow);
        }
    }

    /// Pairs where both directions are known and disagree by at least `threshold`.
    #[must_use]
    pub fn asymmetries(&self, threshold: u8) -> Vec<Asymmetry> {
        let mut found = Vec::new();
        for (a, out) in &self.edges {
            for (b, forward) in out {
                if a >= b {
                    continue;
                }
                let Some(backward) = self.edge(b, a) else {
                    continue;
                };
                let (Some(t1), Some(a1), Some(t2), Some(a2)) =
                    (forward.trust, forward.affection, backward.trust, backward.affection)
                else {
                    continue;
                };
                if forward.status != RelationshipStatus::Known
                    || backward.status != RelationshipStatus::Known
                {
                    continue;
                }
                let trust_gap = t1.abs_diff(t2);
                let affection_gap = a1.abs_diff(a2);
                if trust_gap >= threshold || affection_gap >= threshold {
                    found.push(Asymmetry {
                        a: a.clone(),
                        b: b.clone(),
                        trust_gap,
                        affection_gap,
                    });
                }
            }
        }
        found
    }
}

fn violation(from: &CharacterId, to: &CharacterId, reason: impl Into<String>) -> TableauError {
    TableauError::DecayPolicyViolation {
        from: from.clone(),
        to: to.clone(),
        reason: reason.into(),
    }
}

fn shift(score: u8, delta: i8) -> u8 {
    let next = (i16::from(score) + i16::from(delta)).clamp(0, i16::from(MAX_SCORE));
    u8::try_from(next).unwrap_or(MAX_SCORE)
}

fn toward_neutral(score: u8) -> u8 {
    match score.cmp(&NEUTRAL_SCORE) {
        std::cmp::Ordering::Greater => score - 1,
        std::cmp::Ordering::Less => score + 1,
        std::cmp::Ordering::Equal => score,
    }
}

fn decay_edge(edge: &mut Relationship, config: &RelationshipConfig, idle_days: u32) -> DecayOutcome {
    if idle_days <= config.decay_threshold_days {
        return DecayOutcome::Fresh;
    }
    let before = (edge.trust, edge.affection);
    edge.trust = edge.trust.map(toward_neutral);
    edge.affection = edge.affection.map(toward_neutral);
    if (edge.trust, edge.affection) != before {
        return DecayOutcome::Drifted;
    }
    if idle_days >= config.forget_after_days && edge.status == RelationshipStatus::Known {
        edge.status = RelationshipStatus::Forgotten;
        debug!(from = %edge.from, to = %edge.to, idle_days, "Relationship forgotten");
        return DecayOutcome::Forgotten;
    }
    DecayOutcome::Settled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (CharacterId, CharacterId) {
        (CharacterId::from("Alice"), CharacterId::from("Bob"))
    }

    fn delta(trust: i8, affection: i8) -> RelationshipDelta {
        RelationshipDelta {
            trust,
            affection,
            ..RelationshipDelta::default()
        }
    }

    #[test]
    fn new_edges_are_unknown_without_label() {
        let (a, b) = ids();
        let mut graph = RelationshipGraph::new();
        let edge = graph.get_or_create(&a, &b);
        assert_eq!(edge.status, RelationshipStatus::Unknown);
        assert_eq!(edge.trust, None);
        assert_eq!(edge.label(), None);
    }

    #[test]
    fn trusted_but_disliked_edge_relabels_after_delta() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 9, 2, StoryDay(0));

        let edge = graph
            .apply_delta(&config, &a, &b, &delta(-1, 1), StoryDay(1))
            .expect("within bound");

        assert_eq!(edge.trust, Some(8));
        assert_eq!(edge.affection, Some(3));
        assert_eq!(edge.label(), Some(RelationshipLabel::classify(8, 3)));
        assert_eq!(edge.label(), Some(RelationshipLabel::ReliableStranger));
    }

    #[test]
    fn deltas_clamp_at_bounds() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 9, 1, StoryDay(0));
        let edge = graph
            .apply_delta(&config, &a, &b, &delta(3, -3), StoryDay(0))
            .expect("within bound");
        assert_eq!(edge.trust, Some(10));
        assert_eq!(edge.affection, Some(0));
    }

    #[test]
    fn out_of_bound_delta_is_rejected_without_change() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 5, 5, StoryDay(0));
        let before = graph.edge(&a, &b).cloned();

        let err = graph
            .apply_delta(&config, &a, &b, &delta(4, 0), StoryDay(0))
            .expect_err("outside ±3");
        assert!(matches!(err, TableauError::DecayPolicyViolation { .. }));
        assert_eq!(graph.edge(&a, &b).cloned(), before);
    }

    #[test]
    fn delta_never_touches_reverse_edge() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 5, 5, StoryDay(0));
        graph.establish_first_meeting(&b, &a, 6, 4, StoryDay(0));

        graph
            .apply_delta(&config, &a, &b, &delta(-3, -3), StoryDay(0))
            .expect("within bound");

        let reverse = graph.edge(&b, &a).expect("exists");
        assert_eq!((reverse.trust, reverse.affection), (Some(6), Some(4)));
    }

    #[test]
    fn delta_on_unknown_edge_meets_first() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        let edge = graph
            .apply_delta(&config, &a, &b, &delta(1, 2), StoryDay(0))
            .expect("within bound");
        assert_eq!(edge.status, RelationshipStatus::Known);
        assert_eq!((edge.trust, edge.affection), (Some(6), Some(7)));
    }

    #[test]
    fn history_window_folds_into_digest() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        for i in 0..7 {
            let d = RelationshipDelta {
                trust: 1,
                affection: -1,
                label: None,
                memory_note: Some(format!("exchange {i}")),
            };
            graph.apply_delta(&config, &a, &b, &d, StoryDay(i)).expect("ok");
        }
        let edge = graph.edge(&a, &b).expect("exists");
        assert_eq!(edge.historical_events.len(), 5);
        assert_eq!(edge.historical_events[0].note, "exchange 2");
        assert_eq!(edge.digest.dropped, 2);
        assert_eq!(edge.digest.net_trust, 2);
        assert_eq!(edge.digest.net_affection, -2);
        assert_eq!(edge.last_interaction.as_deref(), Some("exchange 6"));
    }

    #[test]
    fn decay_waits_for_threshold_then_steps_toward_neutral() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 9, 2, StoryDay(0));

        assert_eq!(graph.decay(&config, &a, &b, 5).expect("ok"), DecayOutcome::Fresh);
        assert_eq!(graph.decay(&config, &a, &b, 6).expect("ok"), DecayOutcome::Drifted);
        let edge = graph.edge(&a, &b).expect("exists");
        assert_eq!((edge.trust, edge.affection), (Some(8), Some(3)));
    }

    #[test]
    fn decaying_unknown_edge_is_a_violation() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.add_gossip(&config, &a, &b, "Bob hoards grain");
        let err = graph.decay(&config, &a, &b, 30).expect_err("unknown edge");
        assert!(matches!(err, TableauError::DecayPolicyViolation { .. }));
        assert_eq!(graph.edge(&a, &b).expect("exists").gossip_knowledge.len(), 1);
    }

    #[test]
    fn neutral_idle_edges_are_forgotten_but_keep_gossip() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 6, 5, StoryDay(0));
        graph.add_gossip(&config, &a, &b, "Bob was seen at the mill");

        assert_eq!(graph.decay_all(&config, StoryDay(6)).drifted, 1);
        assert_eq!(graph.decay_all(&config, StoryDay(8)), DecayReport::default());
        assert_eq!(graph.decay_all(&config, StoryDay(10)).forgotten, 1);

        let edge = graph.edge(&a, &b).expect("exists");
        assert_eq!(edge.status, RelationshipStatus::Forgotten);
        assert_eq!(edge.gossip_knowledge, ["Bob was seen at the mill"]);
    }

    #[test]
    fn gossip_is_deduplicated_and_capped() {
        let (a, b) = ids();
        let config = RelationshipConfig::default();
        let mut graph = RelationshipGraph::new();
        for g in ["one", "two", "one", "three", "four"] {
            graph.add_gossip(&config, &a, &b, g);
        }
        let edge = graph.edge(&a, &b).expect("exists");
        assert_eq!(edge.gossip_knowledge, ["two", "three", "four"]);
        assert_eq!(edge.status, RelationshipStatus::Unknown);
    }

    #[test]
    fn asymmetries_need_both_directions_known() {
        let (a, b) = ids();
        let mut graph = RelationshipGraph::new();
        graph.establish_first_meeting(&a, &b, 9, 8, StoryDay(0));
        graph.get_or_create(&b, &a);
        assert!(graph.asymmetries(3).is_empty());

        graph.establish_first_meeting(&b, &a, 3, 7, StoryDay(0));
        let found = graph.asymmetries(3);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].trust_gap, 6);
        assert_eq!(found[0].affection_gap, 1);
    }

    #[test]
    fn label_table_covers_each_quadrant() {
        use RelationshipLabel as L;
        assert_eq!(L::classify(9, 9), L::BelovedFriend);
        assert_eq!(L::classify(7, 7), L::TrustedAlly);
        assert_eq!(L::classify(8, 1), L::ReliableStranger);
        assert_eq!(L::classify(2, 9), L::CharmingLiar);
        assert_eq!(L::classify(1, 1), L::DangerousEnemy);
        assert_eq!(L::classify(6, 5), L::CautiousAlly);
        assert_eq!(L::classify(5, 8), L::LikeableAcquaintance);
        assert_eq!(L::classify(5, 5), L::ComplicatedPerson);
    }
}
