//! spa-orchestrator CLI.
//!
//! ```text
//! spa-orchestrator --config orchestrator.toml validate
//! spa-orchestrator --config orchestrator.toml [--metrics] plan URL...
//! ```
//!
//! `validate` loads and checks a manifest. `plan` registers the manifest's
//! applications and walks them through each URL in turn, printing the change
//! sets a scheduler would execute.

mod plan;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use spa_orchestrator::config::{self, OrchestratorConfig};
use spa_orchestrator::observability::{logging, metrics};
use spa_orchestrator::{Location, NavigationSource, Orchestrator, Shutdown, StartOptions};

use crate::plan::{DryRunDriver, PlaceholderResolver, PlanStep};

#[derive(Parser)]
#[command(name = "spa-orchestrator")]
#[command(about = "Plan micro-frontend lifecycle changes from a TOML manifest", long_about = None)]
struct Cli {
    /// Path to the TOML manifest.
    #[arg(short, long, default_value = "orchestrator.toml")]
    config: PathBuf,

    /// Print Prometheus metrics after the command.
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the manifest
    Validate,
    /// Simulate navigating through the given URLs
    Plan {
        /// Start the orchestrator even if `start.auto_start` is off
        #[arg(long)]
        start: bool,

        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&Default::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    logging::init_logging(&config.observability);

    let recorder = if cli.metrics || config.observability.metrics_enabled {
        metrics::install_recorder()
    } else {
        None
    };

    match cli.command {
        Commands::Validate => validate(&config)?,
        Commands::Plan { start, urls } => run_plan(&config, start, &urls).await?,
    }

    if let Some(handle) = recorder {
        println!("{}", handle.render());
    }
    Ok(())
}

fn validate(config: &OrchestratorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manifests = config.manifests()?;
    let summary = json!({
        "valid": true,
        "apps": manifests,
        "orchestrator": config.orchestrator,
        "start": config.start,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_plan(
    config: &OrchestratorConfig,
    force_start: bool,
    urls: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let locations = urls
        .iter()
        .map(|url| Location::parse(url))
        .collect::<Result<Vec<_>, _>>()?;

    let orchestrator = Orchestrator::new(config.orchestrator.clone(), Arc::new(DryRunDriver));
    let shutdown = Shutdown::new();

    let mut tasks = Vec::new();
    if let Some(reroute) = orchestrator.reroute_loop() {
        tasks.push(tokio::spawn(reroute.run(shutdown.subscribe())));
    }
    let watchdog = orchestrator.start_watchdog();
    let watchdog = tokio::spawn(watchdog.run(shutdown.subscribe()));

    for manifest in config.manifests()? {
        orchestrator.register_manifest(manifest, &PlaceholderResolver)?;
    }

    if config.start.auto_start || force_start {
        orchestrator.start(StartOptions {
            url_reroute_only: config.start.url_reroute_only,
        });
    }

    let mut steps = Vec::with_capacity(locations.len());
    let mut previous: Option<&Location> = None;
    for location in &locations {
        let rerouted = match previous {
            Some(previous) => orchestrator.navigate(previous, location, NavigationSource::HistoryApi),
            None => true,
        };
        let rounds = if rerouted {
            plan::settle(&orchestrator, location)?
        } else {
            Vec::new()
        };
        steps.push(PlanStep {
            url: location.href().to_string(),
            rerouted,
            rounds,
            mounted: orchestrator.mounted_app_names(),
        });
        previous = Some(location);

        // Let posted recomputation passes drain between locations.
        tokio::task::yield_now().await;
    }

    let output = json!({
        "started": orchestrator.is_started(),
        "steps": steps,
        "apps": orchestrator.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    shutdown.trigger();
    for task in tasks {
        task.await?;
    }
    watchdog.await?;
    Ok(())
}
