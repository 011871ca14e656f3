//! Continuity daemon: opens the engine, runs its control loop until Ctrl-C, then
//! saves every store.
//!
//! With `--stdin`, interactions are read as JSON lines, for example
//! `{"input":"hi","output":"hello","facts":[{"text":"User likes pizza"}]}`.

use continuity_core::{
    Collaborators, ContinuityConfig, ContinuityContext, ContinuityController, ControlLoopHandle,
    Interaction, ResumeDecision,
};
use continuity_skills::{FactCountConfidence, LlmMode, ModelRouter, PolarityJudge, SledFactIndex};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INDEX_DIR: &str = "fact_index";

fn build_collaborators(config: &ContinuityConfig) -> Collaborators {
    let router = ModelRouter::with_mode(LlmMode::from_env_or(&config.llm_mode));
    tracing::info!(mode = router.mode().as_str(), "Model router ready");

    let collaborators =
        Collaborators::new(Arc::new(router)).with_judge(Arc::new(PolarityJudge::new()));
    match SledFactIndex::open_path(Path::new(&config.storage_path).join(INDEX_DIR)) {
        Ok(index) => {
            let index = Arc::new(index);
            tracing::info!(indexed = index.len(), "Fact index opened");
            collaborators
                .with_similarity(index.clone())
                .with_stability(Arc::new(FactCountConfidence::new(index)))
        }
        Err(e) => {
            tracing::warn!("Fact index unavailable, running without similarity search: {}", e);
            collaborators
        }
    }
}

async fn feed_stdin(sender: mpsc::Sender<Interaction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Interaction>(line) {
                    Ok(interaction) => {
                        if sender.send(interaction).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed interaction line"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
    tracing::info!("Interaction feed closed");
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[continuity-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ContinuityConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Config load failed: {}", e);
            std::process::exit(1);
        }
    };
    let ctx = match ContinuityContext::from_config(config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(path = %config.storage_path, "Storage directory unavailable: {}", e);
            std::process::exit(1);
        }
    };

    let (controller, report) = ContinuityController::open(ctx, build_collaborators(&config));
    for warning in &report.warnings {
        tracing::warn!("Startup: {}", warning);
    }
    match &report.resume {
        ResumeDecision::Empty => tracing::info!("No goal to resume"),
        ResumeDecision::Resumed(goal) => tracing::info!(goal = %goal.name, "Resumed goal"),
        ResumeDecision::Stale(goal) => {
            tracing::info!(goal = %goal.name, "Previous goal is stale, a new one will be chosen")
        }
    }

    let controller = Arc::new(controller);
    let handle = ControlLoopHandle::spawn(controller.clone());
    if std::env::args().any(|a| a == "--stdin") {
        tokio::spawn(feed_stdin(handle.sender()));
    }

    tracing::info!(app = %config.app_name, storage = %config.storage_path, "Continuity daemon running (Ctrl-C to stop)");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler failed: {}", e);
    }
    tracing::info!("Shutdown signal received");
    handle.shutdown().await;

    let status = controller.status().await;
    tracing::info!(
        coherence = status.coherence,
        facts = status.fact_count,
        episodes = status.episode_count,
        narratives = status.narrative_count,
        "Continuity daemon stopped"
    );
}
