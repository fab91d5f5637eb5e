//! # Tableau Core
//!
//! Simulation core for multi-character conversations voiced by an external
//! response generator.
//!
//! - [`engine`]: per-beat turn/round state machine with four-step
//!   interjection chains and a round-based exit policy
//! - [`relationship`]: directed trust/affection graph with bounded deltas,
//!   decay toward neutral and gossip
//! - [`memory`]: recent, compressed and faded memory tiers per character
//! - [`character`]: fixed nature, evolving nurture, per-beat complication
//! - [`coordinator`]: drives scenes and beats, runs reflection and
//!   compression, saves snapshots
//!
//! Response generation and scene direction are collaborators behind the
//! [`Responder`] and [`Director`] traits.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod character;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod decision;
pub mod director;
pub mod engine;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod persistence;
pub mod relationship;
pub mod responder;
pub mod story;
pub mod testing;
pub mod types;

pub use character::{Character, Nature, Nurture};
pub use config::TableauConfig;
pub use coordinator::{AdvanceReport, Coordinator};
pub use director::Director;
pub use engine::{TurnEngine, TurnKind};
pub use error::{TableauError, TurnGenerationFailure};
pub use relationship::{RelationshipGraph, RelationshipLabel};
pub use responder::Responder;
pub use story::{BeatSetup, SceneSetup, Story};
pub use types::*;
