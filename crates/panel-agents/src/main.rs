use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use panel_agents::{PanelConfig, Simulation};
use tracing::{error, info};

/// Multi-rater annotation panel with discussion and codebook evolution.
#[derive(Debug, Parser)]
#[command(name = "panel-agents", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./configs/config.toml")]
    config: PathBuf,

    /// Number of independent runs; run `i` uses seed `settings.seed + i`.
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Evaluate an existing run log instead of running the panel.
    #[arg(long)]
    evaluate: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PanelConfig::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        dataset = %config.dataset_name,
        model = %config.settings.model,
        base_url = %config.base_url(),
        agents = config.settings.agents,
        rounds = config.settings.rounds,
        chunk_size = config.settings.chunk_size,
        prompt_version = panel_agents::prompts::PROMPT_VERSION,
        "Panel starting"
    );

    let simulation = Simulation::load(config)?;

    if let Some(path) = cli.evaluate {
        simulation.evaluate_file(&path)?;
        return Ok(());
    }

    let result = if cli.runs <= 1 {
        simulation.run_single(0).await.map(|outcome| {
            info!(dir = %outcome.run_dir.display(), chunks = outcome.records.len(), "Run complete");
        })
    } else {
        simulation.run_multiple(cli.runs).await.map(|_| ())
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Simulation failed");
    }
    result
}
