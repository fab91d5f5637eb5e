//! Response-generation collaborator seam.

use async_trait::async_trait;

use crate::context::{ObservationRequest, ReflectionRequest, TurnRequest};
use crate::decision::{ObservingDecision, Reflection, SpeakingDecision};
use crate::error::TurnGenerationFailure;

/// Produces character decisions. Implementations may block on the network;
/// the coordinator bounds every call with a timeout.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Decision for the character whose slot is open.
    async fn speaking_turn(
        &self,
        request: &TurnRequest,
    ) -> Result<SpeakingDecision, TurnGenerationFailure>;

    /// Decision for a character watching the turn just taken.
    async fn observing_turn(
        &self,
        request: &ObservationRequest,
    ) -> Result<ObservingDecision, TurnGenerationFailure>;

    /// End-of-beat reflection.
    async fn reflect(&self, request: &ReflectionRequest)
    -> Result<Reflection, TurnGenerationFailure>;
}
