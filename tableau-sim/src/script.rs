//! Story scripts: the cast and scene list a run plays through.
//!
//! ```toml
//! title = "The Holloway Harvest"
//!
//! [[characters]]
//! name = "Mara"
//! [characters.nature]
//! core_traits = ["earnest", "stubborn"]
//! cognitive_style = "overthinking"
//! stress_response = "people-pleasing"
//! moral_compass = "fairness-first"
//!
//! [[scenes]]
//! title = "Supper"
//! premise = "..."
//! stakes = "..."
//! [[scenes.beats]]
//! situation = "..."
//! characters = ["Mara", "Tomas"]
//! complications = { Mara = "owes Tomas forty crowns" }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tableau_core::character::{Character, Nature, Nurture};
use tableau_core::story::Story;
use tableau_core::testing::{ScriptedDirector, ScriptedScene};

/// One cast member as written in a script.
#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    /// Unique name.
    pub name: String,
    /// Personality core.
    pub nature: Nature,
    /// Starting state; defaults when omitted.
    #[serde(default)]
    pub nurture: Option<Nurture>,
}

/// A whole story script.
#[derive(Debug, Clone, Deserialize)]
pub struct StoryScript {
    /// Story title.
    pub title: String,
    /// The cast.
    pub characters: Vec<CastMember>,
    /// Scenes in play order.
    #[serde(default)]
    pub scenes: Vec<ScriptedScene>,
}

impl StoryScript {
    /// Parse a script from TOML text.
    ///
    /// # Errors
    /// If the TOML does not match the script shape.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid story script")
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    /// If the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read story script {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// A fresh story with this script's cast.
    ///
    /// # Errors
    /// If two cast members share a name.
    pub fn new_story(&self) -> Result<Story> {
        let cast = self.characters.iter().map(|member| {
            let character = Character::new(member.name.as_str(), member.nature.clone());
            match &member.nurture {
                Some(nurture) => character.with_nurture(nurture.clone()),
                None => character,
            }
        });
        Ok(Story::new(self.title.clone(), cast)?)
    }

    /// Director for the part of the script `story` has not played yet.
    ///
    /// Scenes already in the story are skipped. If the last one is still
    /// open, its unplayed beats are handed over first; `beat_in_progress`
    /// marks one more beat the coordinator will finish on its own.
    #[must_use]
    pub fn director_for(&self, story: &Story, beat_in_progress: bool) -> ScriptedDirector {
        let started = story.scenes.len();
        let remaining = self.scenes.iter().skip(started).cloned().collect();
        let director = ScriptedDirector::new(remaining);

        let Some(open) = story.open_scene() else {
            return director;
        };
        let Some(script) = started.checked_sub(1).and_then(|i| self.scenes.get(i)) else {
            return director;
        };
        let played = open.beats.len() + usize::from(beat_in_progress);
        let beats = script.beats.iter().skip(played).cloned().collect();
        director.with_open_scene(beats, script.resolution.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableau_core::director::Director;
    use tableau_core::story::{SceneRecord, SceneSetup};
    use tableau_core::types::{CharacterId, StoryDay};

    const SCRIPT: &str = r#"
title = "Harvest"

[[characters]]
name = "Mara"
[characters.nature]
core_traits = ["earnest"]
cognitive_style = "overthinking"
stress_response = "people-pleasing"
moral_compass = "fairness-first"

[[characters]]
name = "Tomas"
[characters.nature]
core_traits = ["proud"]
cognitive_style = "impulsive"
stress_response = "confrontation"
moral_compass = "pragmatic"
[characters.nurture]
recent_treatment = "dismissed"
confidence = 3
learned_behaviors = []
temporary_beliefs = []
social_mask = "jovial"
emotional_state = "tense"

[[scenes]]
title = "Supper"
premise = "Harvest supper"
stakes = "the farm"
resolution = "Nothing is settled."

[[scenes.beats]]
situation = "Mara raises the debt"
characters = ["Mara", "Tomas"]
complications = { Tomas = "has sold the farm" }

[[scenes.beats]]
situation = "Tomas storms out"
characters = ["Tomas", "Mara"]

[[scenes]]
title = "Market"
premise = "Market day"
stakes = "reputation"
days_since_previous = 3
"#;

    #[test]
    fn script_parses_cast_and_scenes() {
        let script = StoryScript::from_toml(SCRIPT).expect("parse");
        assert_eq!(script.characters.len(), 2);
        assert_eq!(script.scenes.len(), 2);
        assert_eq!(script.scenes[0].beats.len(), 2);
        assert_eq!(
            script.scenes[0].beats[0].complications[&CharacterId::from("Tomas")],
            "has sold the farm"
        );
        assert_eq!(script.scenes[1].setup.days_since_previous, 3);

        let story = script.new_story().expect("story");
        let tomas = story.character(&"Tomas".into()).expect("tomas");
        assert_eq!(tomas.nurture.confidence, 3);
        assert_eq!(tomas.nurture.social_mask, "jovial");
    }

    #[test]
    fn bundled_demo_parses() {
        let script = StoryScript::from_toml(include_str!("../../demos/holloway.toml")).expect("demo");
        let story = script.new_story().expect("story");
        assert_eq!(story.characters.len(), 3);
        for beat in script.scenes.iter().flat_map(|s| &s.beats) {
            for who in &beat.characters {
                assert!(story.characters.contains_key(who), "{who} is not in the cast");
            }
        }
        tableau_core::TableauConfig::from_toml(include_str!("../../demos/tableau.toml"))
            .expect("demo config");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut script = StoryScript::from_toml(SCRIPT).expect("parse");
        script.characters[1].name = "Mara".into();
        assert!(script.new_story().is_err());
    }

    #[test]
    fn fresh_story_plays_every_scene() {
        let script = StoryScript::from_toml(SCRIPT).expect("parse");
        let story = script.new_story().expect("story");
        let mut director = script.director_for(&story, false);

        let first = director.next_scene(&story).expect("scene");
        assert_eq!(first.title, "Supper");
        assert!(director.next_beat(&story).is_some());
        assert!(director.next_beat(&story).is_some());
        assert!(director.next_beat(&story).is_none());
    }

    #[test]
    fn resumed_story_skips_played_beats() {
        let script = StoryScript::from_toml(SCRIPT).expect("parse");
        let mut story = script.new_story().expect("story");
        story.scenes.push(SceneRecord {
            number: 1,
            setup: SceneSetup {
                title: "Supper".into(),
                ..SceneSetup::default()
            },
            day: StoryDay(0),
            beats: Vec::new(),
            participants: Vec::new(),
            resolution: None,
            closed: false,
        });

        let mut director = script.director_for(&story, true);
        let next = director.next_beat(&story).expect("second beat");
        assert_eq!(next.situation, "Tomas storms out");
        assert!(director.next_beat(&story).is_none());
        assert_eq!(director.scene_resolution(&story).as_deref(), Some("Nothing is settled."));
        assert_eq!(director.next_scene(&story).map(|s| s.title), Some("Market".to_string()));
    }
}
