//! Configuration for the tableau engine.
//!
//! Maps directly to `tableau.toml`. Every section and field is optional;
//! missing values fall back to the defaults documented on each field.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableauError};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableauConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Round and exit policy.
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Relationship graph bounds and decay.
    #[serde(default)]
    pub relationship: RelationshipConfig,
    /// Memory tier caps and fading.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// LLM collaborator settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Snapshot persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl TableauConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns `TableauError::Config` if the TOML is invalid or inconsistent.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| TableauError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    /// Returns `TableauError::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let c = &self.conversation;
        if c.forced_exit_round <= c.locked_in_rounds + 1 {
            return Err(TableauError::Config(format!(
                "forced_exit_round ({}) must leave at least one can-exit round after locked_in_rounds ({})",
                c.forced_exit_round, c.locked_in_rounds
            )));
        }
        let r = &self.relationship;
        if r.initial_trust > 10 || r.initial_affection > 10 {
            return Err(TableauError::Config(
                "initial trust/affection must be within 0..=10".to_string(),
            ));
        }
        if r.reflection_delta_bound == 0 || r.reflection_delta_bound > 10 {
            return Err(TableauError::Config(format!(
                "reflection_delta_bound must be within 1..=10, got {}",
                r.reflection_delta_bound
            )));
        }
        if r.forget_after_days < r.decay_threshold_days {
            return Err(TableauError::Config(
                "forget_after_days must not be shorter than decay_threshold_days".to_string(),
            ));
        }
        if self.memory.max_compressed
            < self.memory.specific_moments + self.memory.general_impressions + self.memory.lessons
        {
            return Err(TableauError::Config(
                "max_compressed must hold at least one full compression batch".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON-formatted log lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Round structure and exit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Rounds 1..=N are "locked in": exit requests are recorded but ignored.
    #[serde(default = "default_3_u32")]
    pub locked_in_rounds: u32,
    /// Entering this round ends the beat regardless of requests.
    #[serde(default = "default_8_u32")]
    pub forced_exit_round: u32,
    /// How many public turns a character sees when deciding.
    #[serde(default = "default_10_usize")]
    pub history_window: usize,
    /// Hard timeout for any single response-generation call.
    #[serde(default = "default_30000")]
    pub turn_timeout_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            locked_in_rounds: 3,
            forced_exit_round: 8,
            history_window: 10,
            turn_timeout_ms: 30_000,
        }
    }
}

/// Relationship graph bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// Trust assigned on first meeting.
    #[serde(default = "default_5_u8")]
    pub initial_trust: u8,
    /// Affection assigned on first meeting.
    #[serde(default = "default_5_u8")]
    pub initial_affection: u8,
    /// Largest absolute delta a single reflection may apply.
    #[serde(default = "default_3_u8")]
    pub reflection_delta_bound: u8,
    /// Historical events kept verbatim per edge.
    #[serde(default = "default_5_usize")]
    pub history_window: usize,
    /// Gossip items kept per edge.
    #[serde(default = "default_3_usize")]
    pub gossip_cap: usize,
    /// Interaction-free days before trust/affection start drifting to neutral.
    #[serde(default = "default_5_u32")]
    pub decay_threshold_days: u32,
    /// Interaction-free days after which a neutral edge is forgotten.
    #[serde(default = "default_10_u32")]
    pub forget_after_days: u32,
    /// Gap in trust or affection between the two directions of a pair
    /// that gets reported at scene end.
    #[serde(default = "default_3_u8")]
    pub asymmetry_threshold: u8,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            initial_trust: 5,
            initial_affection: 5,
            reflection_delta_bound: 3,
            history_window: 5,
            gossip_cap: 3,
            decay_threshold_days: 5,
            forget_after_days: 10,
            asymmetry_threshold: 3,
        }
    }
}

/// Memory tier caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Specific moments kept per compression.
    #[serde(default = "default_3_usize")]
    pub specific_moments: usize,
    /// General impressions kept per compression.
    #[serde(default = "default_2_usize")]
    pub general_impressions: usize,
    /// Lessons kept per compression.
    #[serde(default = "default_1_usize")]
    pub lessons: usize,
    /// Total compressed entries per character; overflow is faded.
    #[serde(default = "default_30_usize")]
    pub max_compressed: usize,
    /// Idle days before a compressed memory fades.
    #[serde(default = "default_7_u32")]
    pub fade_after_days: u32,
    /// Faded gists kept per character; oldest dropped.
    #[serde(default = "default_20_usize")]
    pub max_faded: usize,
    /// Temporary beliefs a character holds at once.
    #[serde(default = "default_3_usize")]
    pub max_temporary_beliefs: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            specific_moments: 3,
            general_impressions: 2,
            lessons: 1,
            max_compressed: 30,
            fade_after_days: 7,
            max_faded: 20,
            max_temporary_beliefs: 3,
        }
    }
}

/// LLM integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model used for speaking and observing turns.
    #[serde(default = "default_turn_model")]
    pub turn_model: String,
    /// Model used for beat reflections.
    #[serde(default = "default_reflection_model")]
    pub reflection_model: String,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request HTTP timeout in milliseconds.
    #[serde(default = "default_20000")]
    pub request_timeout_ms: u64,
    /// Retries before the call is reported as failed.
    #[serde(default = "default_2_u32")]
    pub max_retries: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_8")]
    pub temperature: f32,
    /// Maximum output tokens.
    #[serde(default = "default_400")]
    pub max_tokens: u32,
    /// Directory of TOML prompt templates overriding the built-in ones.
    #[serde(default)]
    pub prompt_dir: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_ollama(),
            base_url: default_ollama_url(),
            turn_model: default_turn_model(),
            reflection_model: default_reflection_model(),
            api_key_env: default_api_key_env(),
            request_timeout_ms: 20_000,
            max_retries: 2,
            temperature: 0.8,
            max_tokens: 400,
            prompt_dir: None,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of rotating backups to keep.
    #[serde(default = "default_3_u32")]
    pub backup_count: u32,
    /// Snapshot after every completed round.
    #[serde(default = "default_true")]
    pub save_after_round: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            checksum_enabled: true,
            backup_count: 3,
            save_after_round: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_turn_model() -> String { "qwen2.5:7b-instruct".to_string() }
fn default_reflection_model() -> String { "qwen2.5:7b-instruct".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_db_path() -> String { "saves/tableau.db".to_string() }
fn default_0_8() -> f32 { 0.8 }
fn default_1_usize() -> usize { 1 }
fn default_2_usize() -> usize { 2 }
fn default_2_u32() -> u32 { 2 }
fn default_3_u8() -> u8 { 3 }
fn default_3_u32() -> u32 { 3 }
fn default_3_usize() -> usize { 3 }
fn default_5_u8() -> u8 { 5 }
fn default_5_u32() -> u32 { 5 }
fn default_5_usize() -> usize { 5 }
fn default_7_u32() -> u32 { 7 }
fn default_8_u32() -> u32 { 8 }
fn default_10_u32() -> u32 { 10 }
fn default_10_usize() -> usize { 10 }
fn default_20_usize() -> usize { 20 }
fn default_30_usize() -> usize { 30 }
fn default_400() -> u32 { 400 }
fn default_20000() -> u64 { 20_000 }
fn default_30000() -> u64 { 30_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = TableauConfig::from_toml("").expect("defaults are valid");
        assert_eq!(config.conversation.locked_in_rounds, 3);
        assert_eq!(config.conversation.forced_exit_round, 8);
        assert_eq!(config.relationship.reflection_delta_bound, 3);
        assert_eq!(config.memory.specific_moments, 3);
        assert_eq!(config.memory.general_impressions, 2);
        assert_eq!(config.memory.lessons, 1);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = TableauConfig::from_toml(
            r#"
            [conversation]
            forced_exit_round = 6

            [llm]
            provider = "none"
            "#,
        )
        .expect("valid");
        assert_eq!(config.conversation.forced_exit_round, 6);
        assert_eq!(config.conversation.locked_in_rounds, 3);
        assert_eq!(config.llm.provider, "none");
        assert_eq!(config.llm.max_retries, 2);
    }

    #[test]
    fn rejects_exit_window_without_can_exit_rounds() {
        let err = TableauConfig::from_toml(
            r#"
            [conversation]
            locked_in_rounds = 5
            forced_exit_round = 6
            "#,
        )
        .expect_err("no can-exit round left");
        assert!(matches!(err, TableauError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(TableauConfig::from_toml("[conversation\nx = ").is_err());
    }
}
