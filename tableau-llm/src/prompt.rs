//! Prompt templates for speaking, observing and reflecting.
//!
//! Templates use `{key}` placeholders. The built-in set is compiled in;
//! [`PromptEngine::from_directory`] loads TOML overrides so wording can be
//! changed without a rebuild.
//!
//! Every renderer takes one request, and a request carries exactly one
//! private view: the character the prompt is for. Nothing here can place
//! another character's complication or internal state into a prompt.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tableau_core::context::{
    ObservationRequest, PrivateView, PublicTurn, ReflectionRequest, SceneContext, TurnRequest,
};
use tableau_core::engine::{ConversationEnergy, ExitPhase, TurnKind};

use crate::error::LlmError;

/// Persona block shared by all three prompts.
pub const PERSONA_SYSTEM: &str = r"You are {name}.
Your nature: {nature}.
Right now: {nurture}.
{complication}
RULES:
- Stay in character. Never break the fourth wall.
- Only you know what is in your head. Others only see what you say and do.
- Your response must be a single valid JSON object.";

/// Speaking-turn prompt.
pub const SPEAKING_USER: &str = r#"Scene: {premise}
Stakes: {stakes}
Situation: {situation}
Present: {present}
Round {round}. {pacing}

How you feel about the others:
{relationships}

What you remember:
{recollections}

The conversation so far:
{history}

{slot}

Respond with ONLY a JSON object:
{"action": {"speaks": "what you say (1 sentence)", "does": "physical action or null", "tone": "one word"},
 "internal": {"emotional_state": "one word", "wants_to_exit": {exit_hint}}}"#;

/// Observation prompt for a character watching someone else's turn.
pub const OBSERVING_USER: &str = r#"Scene: {premise}
Situation: {situation}
Round {round}.

How you feel about the others:
{relationships}

The conversation so far:
{history}

{speaker} just took their turn: {just_said}

{interjection_rule}
Interject only if someone is lying about something you know, someone you
trust is unfairly attacked, or what was said provokes you strongly.

Respond with ONLY a JSON object:
{"observation": "your private thought",
 "wants_to_interject": true or false,
 "interjection": {"speaks": "what you would say", "tone": "one word", "reason": "why"} or null}"#;

/// End-of-beat reflection prompt.
pub const REFLECTION_USER: &str = r#"The beat is over. Situation was: {situation}
Present: {present}

What happened:
{history}

How you felt about the others going in:
{relationships}

Reflect privately. For each OTHER character, how did your trust and
affection change? Each change is a whole number from -{bound} to +{bound}.

Respond with ONLY a JSON object:
{"relationships": {"Name": {"trust_delta": 0, "affection_delta": 0, "label": "two words", "memory": "one sentence"}},
 "knowledge": {"facts": [], "suspicions": [], "gossip_worthy": []},
 "emotional_state": "one word",
 "confidence_delta": 0,
 "learned_behaviors": [],
 "beliefs": []}"#;

/// Replace every `{key}` in `template` with its value. Unknown keys stay.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// PromptEngine: built-in templates with TOML overrides
// ---------------------------------------------------------------------------

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Speaking turn, including interjection-chain slots.
    Speaking,
    /// Observing another character's turn.
    Observing,
    /// End-of-beat reflection.
    Reflection,
}

impl PromptId {
    /// TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::Speaking => "speaking.toml",
            Self::Observing => "observing.toml",
            Self::Reflection => "reflection.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[Self::Speaking, Self::Observing, Self::Reflection]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Speaking => "speaking",
            Self::Observing => "observing",
            Self::Reflection => "reflection",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speaking" => Ok(Self::Speaking),
            "observing" => Ok(Self::Observing),
            "reflection" => Ok(Self::Reflection),
            _ => Err(LlmError::ConfigError(format!("unknown prompt id: '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: PromptTemplate,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    /// Template version string.
    pub version: String,
    /// System prompt (`{key}` placeholders).
    pub system: String,
    /// User prompt (`{key}` placeholders).
    pub user: String,
}

/// Holds one template per [`PromptId`] and renders requests with them.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptEngine {
    /// The compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let builtin = |user: &str| PromptTemplate {
            version: "builtin".into(),
            system: PERSONA_SYSTEM.into(),
            user: user.into(),
        };
        let templates = HashMap::from([
            (PromptId::Speaking, builtin(SPEAKING_USER)),
            (PromptId::Observing, builtin(OBSERVING_USER)),
            (PromptId::Reflection, builtin(REFLECTION_USER)),
        ]);
        Self { templates }
    }

    /// Built-in templates, overridden by any `<id>.toml` found in `dir`.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] if the directory is missing or a file
    /// exists but cannot be read or parsed.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }
        let mut engine = Self::builtin();
        for id in PromptId::all() {
            let path: PathBuf = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                LlmError::ConfigError(format!("failed to read {}: {e}", path.display()))
            })?;
            let parsed: TomlPromptFile = toml::from_str(&content).map_err(|e| {
                LlmError::ConfigError(format!("failed to parse {}: {e}", path.display()))
            })?;
            engine.templates.insert(*id, parsed.prompt);
        }
        Ok(engine)
    }

    /// Template for `id`.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render `(system, user)` for `id`.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] if `id` has no template.
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<(String, String), LlmError> {
        let tpl = self
            .get(id)
            .ok_or_else(|| LlmError::ConfigError(format!("prompt template '{id}' not loaded")))?;
        Ok((render_template(&tpl.system, vars), render_template(&tpl.user, vars)))
    }

    /// Prompt for a speaking turn.
    ///
    /// # Errors
    /// See [`Self::render`].
    pub fn speaking(&self, request: &TurnRequest) -> Result<(String, String), LlmError> {
        let mut vars = persona_vars(&request.me);
        vars.extend(scene_vars(&request.scene));
        vars.extend([
            ("relationships", format_relationships(&request.me)),
            ("recollections", format_recollections(&request.me)),
            ("history", format_history(&request.history)),
            ("slot", slot_instruction(request.kind, request.opposite.as_ref().map(|c| c.as_str()))),
            ("exit_hint", exit_hint(request.scene.exit_phase).to_string()),
        ]);
        self.render(PromptId::Speaking, &borrowed(&vars))
    }

    /// Prompt for an observer.
    ///
    /// # Errors
    /// See [`Self::render`].
    pub fn observing(&self, request: &ObservationRequest) -> Result<(String, String), LlmError> {
        let mut vars = persona_vars(&request.me);
        vars.extend(scene_vars(&request.scene));
        let rule = if request.can_interject {
            "You may INTERJECT if you feel strongly. You can only do this once per round."
        } else {
            "You have already interjected this round, so you can only watch."
        };
        vars.extend([
            ("relationships", format_relationships(&request.me)),
            ("history", format_history(&request.history)),
            ("speaker", request.just_spoken.speaker.to_string()),
            ("just_said", request.just_spoken.action.describe()),
            ("interjection_rule", rule.to_string()),
        ]);
        self.render(PromptId::Observing, &borrowed(&vars))
    }

    /// Prompt for an end-of-beat reflection.
    ///
    /// # Errors
    /// See [`Self::render`].
    pub fn reflection(&self, request: &ReflectionRequest) -> Result<(String, String), LlmError> {
        let mut vars = persona_vars(&request.me);
        vars.extend(scene_vars(&request.scene));
        vars.extend([
            ("relationships", format_relationships(&request.me)),
            ("history", format_history(&request.beat)),
            ("bound", request.delta_bound.to_string()),
        ]);
        self.render(PromptId::Reflection, &borrowed(&vars))
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

type Vars = Vec<(&'static str, String)>;

fn borrowed(vars: &Vars) -> Vec<(&str, &str)> {
    vars.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

fn persona_vars(me: &PrivateView) -> Vars {
    let nature = &me.nature;
    let nurture = &me.nurture;
    let mut now = format!(
        "feeling {}, confidence {}/10, presenting as {}, treated {} lately",
        nurture.emotional_state, nurture.confidence, nurture.social_mask, nurture.recent_treatment
    );
    if !nurture.temporary_beliefs.is_empty() {
        now.push_str(&format!("; you currently believe {}", nurture.temporary_beliefs.join("; ")));
    }
    if !nurture.learned_behaviors.is_empty() {
        now.push_str(&format!("; you have noticed {}", nurture.learned_behaviors.join("; ")));
    }
    vec![
        ("name", me.name.to_string()),
        (
            "nature",
            format!(
                "{}; {} thinker; under stress you lean to {}; your morals are {}",
                nature.core_traits.join(", "),
                nature.cognitive_style,
                nature.stress_response,
                nature.moral_compass
            ),
        ),
        ("nurture", now),
        (
            "complication",
            me.complication
                .as_ref()
                .map(|c| format!("Your secret in this moment (only you know it): {c}\n"))
                .unwrap_or_default(),
        ),
    ]
}

fn scene_vars(scene: &SceneContext) -> Vars {
    let pacing = match scene.energy {
        ConversationEnergy::High => "The conversation is just getting going.",
        ConversationEnergy::Medium => "The conversation may end soon. Work toward resolving it.",
        ConversationEnergy::Low => "The conversation must wrap up now.",
    };
    vec![
        ("premise", scene.premise.clone()),
        ("stakes", scene.stakes.clone()),
        ("situation", scene.situation.clone()),
        (
            "present",
            scene
                .present
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        ("round", scene.round.to_string()),
        ("pacing", pacing.to_string()),
    ]
}

fn format_relationships(me: &PrivateView) -> String {
    if me.relationships.is_empty() {
        return "- nobody here you know".to_string();
    }
    me.relationships
        .iter()
        .map(|r| {
            let mut line = match (r.trust, r.affection, &r.label) {
                (Some(t), Some(a), Some(label)) => {
                    format!("- {}: {label} (trust {t}/10, affection {a}/10)", r.about)
                }
                _ => format!("- {}: you have not really met", r.about),
            };
            if let Some(last) = &r.last_interaction {
                line.push_str(&format!("; last time: {last}"));
            }
            for gossip in &r.gossip {
                line.push_str(&format!("; you heard: {gossip}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_recollections(me: &PrivateView) -> String {
    if me.recollections.is_empty() {
        return "- nothing in particular".to_string();
    }
    me.recollections
        .iter()
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_history(history: &[PublicTurn]) -> String {
    if history.is_empty() {
        return "(nothing has been said yet)".to_string();
    }
    history
        .iter()
        .map(|t| {
            let marker = match t.kind {
                TurnKind::Ordinary => "",
                TurnKind::Interjection => " [interjects]",
                TurnKind::Response => " [responds]",
                TurnKind::Counter => " [counters]",
                TurnKind::FinalWord => " [final word]",
            };
            format!("R{} {}{marker}: {}", t.round, t.speaker, t.action.describe())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn slot_instruction(kind: TurnKind, opposite: Option<&str>) -> String {
    let other = opposite.unwrap_or("them");
    match kind {
        TurnKind::Ordinary => "It is your turn to speak.".to_string(),
        TurnKind::Interjection => format!("You are cutting in on {other}."),
        TurnKind::Response => format!("{other} just interrupted you. Respond to them directly."),
        TurnKind::Counter => format!("{other} answered your interjection. Push back once more."),
        TurnKind::FinalWord => format!("Have the final word with {other}, then the conversation moves on."),
    }
}

fn exit_hint(phase: ExitPhase) -> &'static str {
    match phase {
        ExitPhase::LockedIn => "false",
        ExitPhase::CanExit | ExitPhase::MustExit => "true if you want to leave, else false",
    }
}
