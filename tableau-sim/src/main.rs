//! Headless tableau runner.
//!
//! Plays a story script through the coordinator, saving snapshots to SQLite
//! as it goes, then prints the transcript.
//!
//! ```text
//! tableau-sim demos/holloway.toml --config demos/tableau.toml
//! tableau-sim demos/holloway.toml --resume 6f1c...  # pick up where a run stopped
//! ```

mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tableau_core::persistence::SqliteSnapshotStore;
use tableau_core::story::Story;
use tableau_core::types::StoryId;
use tableau_core::{Coordinator, Responder, TableauConfig};
use tableau_llm::{LlmResponder, RuleBasedResponder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::script::StoryScript;

#[derive(Parser, Debug)]
#[command(name = "tableau-sim")]
#[command(about = "Play a scripted story through the tableau conversation engine")]
struct Args {
    /// Story script (TOML).
    story: PathBuf,

    /// Engine configuration; defaults apply when the file is absent.
    #[arg(long, default_value = "tableau.toml")]
    config: PathBuf,

    /// Snapshot database, overriding `persistence.path`.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Resume the story with this ID from its latest snapshot.
    #[arg(long)]
    resume: Option<StoryId>,

    /// Use the rule-based responder even when a model is configured.
    #[arg(long)]
    rule_based: bool,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn load_config(path: &Path) -> Result<TableauConfig> {
    if path.exists() {
        TableauConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(TableauConfig::default())
    }
}

fn init_logging(config: &TableauConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    if json || config.general.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn responder(config: &TableauConfig, rule_based: bool) -> Result<Arc<dyn Responder>> {
    if rule_based || config.llm.provider == "none" {
        info!("Using rule-based responder");
        return Ok(Arc::new(RuleBasedResponder::new()));
    }
    let responder = LlmResponder::from_config(&config.llm).context("configuring LLM responder")?;
    info!(provider = %config.llm.provider, model = %config.llm.turn_model, "Using LLM responder");
    Ok(Arc::new(responder))
}

fn print_transcript(story: &Story, asymmetry_threshold: u8) {
    println!("# {} ({})", story.title, story.id);
    for scene in &story.scenes {
        println!("\n## Scene {}: {} (day {})", scene.number, scene.setup.title, scene.day.0);
        for beat in &scene.beats {
            println!("\n### Beat {}: {}", beat.beat, beat.situation);
            for turn in &beat.turns {
                let marker = if turn.substituted { " (substituted)" } else { "" };
                println!("  [R{}] {}: {}{marker}", turn.round, turn.speaker, turn.action.describe());
            }
            println!("  -- {} after {} rounds", beat.end_reason, beat.rounds);
        }
        if let Some(resolution) = &scene.resolution {
            println!("\n  Resolution: {resolution}");
        }
    }

    let lopsided = story.relationships.asymmetries(asymmetry_threshold);
    if !lopsided.is_empty() {
        println!("\n## Lopsided relationships");
        for pair in lopsided.iter().take(3) {
            let gap = pair.trust_gap.max(pair.affection_gap);
            println!("  {} <-> {}: {gap} point difference in feelings", pair.a, pair.b);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if let Some(db) = &args.db {
        config.persistence.path = db.display().to_string();
    }
    init_logging(&config, args.json_logs);

    let script = StoryScript::from_file(&args.story)?;
    let responder = responder(&config, args.rule_based)?;
    let store = SqliteSnapshotStore::open(&config.persistence.path, &config.persistence)
        .context("opening snapshot store")?;

    let mut coordinator = match args.resume {
        Some(story_id) => {
            Coordinator::resume(config.clone(), responder, Box::new(store), story_id)?
        }
        None => {
            let story = script.new_story()?;
            info!(story = %story.id, title = %story.title, "Starting story");
            Coordinator::new(config.clone(), story, responder).with_store(Box::new(store))
        }
    };

    let mut director = script.director_for(coordinator.story(), coordinator.engine().is_some());
    let scenes = coordinator.run_story(&mut director).await?;

    let counters = coordinator.counters();
    if counters.failure_rate() > 0.25 {
        warn!(rate = counters.failure_rate(), "Many turns needed a neutral substitute");
    }
    info!(scenes, ?counters, "Story finished");

    print_transcript(coordinator.story(), config.relationship.asymmetry_threshold);
    Ok(())
}
