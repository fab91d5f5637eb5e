//! Director collaborator seam: supplies scenes and beats, receives reports,
//! and may cut a beat short at a round boundary.

use crate::engine::TurnEngine;
use crate::story::{BeatReport, BeatSetup, SceneReport, SceneSetup, Story};

/// Drives the narrative from outside the engine.
pub trait Director: Send {
    /// Next scene to play, or `None` when the story is over.
    fn next_scene(&mut self, story: &Story) -> Option<SceneSetup>;

    /// Next beat of the open scene, or `None` to close the scene.
    fn next_beat(&mut self, story: &Story) -> Option<BeatSetup>;

    /// Checked after every completed round.
    fn force_end_beat(&mut self, _engine: &TurnEngine) -> bool {
        false
    }

    /// Called once a beat's reflections have been applied.
    fn beat_completed(&mut self, _report: &BeatReport) {}

    /// Resolution text recorded when the open scene closes.
    fn scene_resolution(&mut self, _story: &Story) -> Option<String> {
        None
    }

    /// Called once a scene's memories have been compressed.
    fn scene_completed(&mut self, _report: &SceneReport) {}
}
