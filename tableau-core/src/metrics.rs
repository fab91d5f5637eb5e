//! Runtime counters for the conversation engine.
//!
//! Lock-free `AtomicU64` counters bumped on the hot path (turn commits,
//! interjection decisions, saves) and read through [`EngineCounters::snapshot`].
//! One instance is owned by the coordinator and shared by reference with the
//! concurrent reflection tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for engine and coordinator events.
#[derive(Debug)]
pub struct EngineCounters {
    /// Turns committed to any engine (ordinary, chain and substituted).
    pub turns_committed: AtomicU64,
    /// Collaborator calls that failed and were replaced by a neutral turn.
    pub turn_failures: AtomicU64,
    /// Interjection requests granted a chain.
    pub interjections_accepted: AtomicU64,
    /// Interjection requests turned down.
    pub interjections_rejected: AtomicU64,
    /// Exit requests honoured.
    pub exits_granted: AtomicU64,
    /// Beats run to completion.
    pub beats_completed: AtomicU64,
    /// Reflections (or individual deltas) discarded.
    pub reflections_rejected: AtomicU64,
    /// Snapshots written to the store.
    pub snapshots_saved: AtomicU64,
}

impl EngineCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            turns_committed: AtomicU64::new(0),
            turn_failures: AtomicU64::new(0),
            interjections_accepted: AtomicU64::new(0),
            interjections_rejected: AtomicU64::new(0),
            exits_granted: AtomicU64::new(0),
            beats_completed: AtomicU64::new(0),
            reflections_rejected: AtomicU64::new(0),
            snapshots_saved: AtomicU64::new(0),
        }
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters out.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            turns_committed: self.turns_committed.load(Ordering::Relaxed),
            turn_failures: self.turn_failures.load(Ordering::Relaxed),
            interjections_accepted: self.interjections_accepted.load(Ordering::Relaxed),
            interjections_rejected: self.interjections_rejected.load(Ordering::Relaxed),
            exits_granted: self.exits_granted.load(Ordering::Relaxed),
            beats_completed: self.beats_completed.load(Ordering::Relaxed),
            reflections_rejected: self.reflections_rejected.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`EngineCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Turns committed.
    pub turns_committed: u64,
    /// Substituted turns.
    pub turn_failures: u64,
    /// Granted interjections.
    pub interjections_accepted: u64,
    /// Refused interjections.
    pub interjections_rejected: u64,
    /// Honoured exits.
    pub exits_granted: u64,
    /// Completed beats.
    pub beats_completed: u64,
    /// Discarded reflections.
    pub reflections_rejected: u64,
    /// Saved snapshots.
    pub snapshots_saved: u64,
}

impl CounterSnapshot {
    /// Share of committed turns that had to be substituted.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.turns_committed == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.turn_failures as f64 / self.turns_committed as f64;
        rate
    }
}
