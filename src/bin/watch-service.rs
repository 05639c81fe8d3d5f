use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crimsonwatch::{build_service, console, load_config, logging};
use crimsonwatch_application::CycleOutcome;
use crimsonwatch_application::scheduler::FAST_INTERVAL;

/// Poll the security telemetry sources and print each merged snapshot.
#[derive(Parser, Debug)]
#[command(name = "watch-service", version, about)]
struct Cli {
    /// Path to the YAML config (overrides discovery)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll at the fast threat-summary cadence (2.5s)
    #[arg(long)]
    fast: bool,

    /// Static dataset served while live sources are down: normal | attack
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Run a single cycle, print the snapshot as JSON, and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: crimsonwatch_domain::WatchConfig) -> Result<()> {
    let service = build_service(&config, cli.fast.then_some(FAST_INTERVAL))?;
    if let Some(name) = &cli.profile {
        service.store.select_fallback_profile(name)?;
    }

    if cli.once {
        if let CycleOutcome::Published { is_live, .. } = service.scheduler.run_cycle().await {
            tracing::debug!(is_live, "single cycle complete");
        }
        let snapshot = service.store.get_current();
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    let _console = console::attach(&service.store);
    let handle = service.scheduler.spawn();

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    handle.shutdown().await
}
