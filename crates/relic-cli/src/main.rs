// crates/relic-cli/src/main.rs
//
// CLI entrypoint for the Relic heritage monitor.
//
// Operates directly on the daemon's RocksDB store: site registry management,
// baseline inspection and rebuilds, the observation log, the change event
// trail, the tick ledger, and ad-hoc before/after comparisons. RocksDB admits one process at a time,
// so commands that open the store fail while the daemon is running.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::baseline::BaselineCmd;
use commands::compare::CompareCmd;
use commands::events::EventsCmd;
use commands::observations::ObservationsCmd;
use commands::site::SiteCmd;
use commands::ticks::TicksCmd;
use commands::Context;
use output::OutputFormat;

/// Relic CLI: operator tools for the heritage site monitor.
#[derive(Parser, Debug)]
#[command(
    name = "relic",
    version = "0.1.0",
    about = "Relic CLI: manage monitored heritage sites and inspect detected changes"
)]
struct Cli {
    /// Data directory of the relic-daemon store.
    #[arg(long, global = true, default_value = "~/.relic/data")]
    data_dir: String,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Site registry: add, list, show, update, deactivate, reactivate, presets.
    #[command(subcommand)]
    Site(SiteCmd),

    /// Baselines: show, recompute.
    #[command(subcommand)]
    Baseline(BaselineCmd),

    /// Per-index observation time series.
    #[command(subcommand)]
    Observations(ObservationsCmd),

    /// Change event audit trail.
    #[command(subcommand)]
    Events(EventsCmd),

    /// Tick outcome ledger.
    #[command(subcommand)]
    Ticks(TicksCmd),

    /// Before/after change map from two sets of scene files.
    Compare(CompareCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let ctx = Context {
        data_dir: cli.data_dir.clone(),
        format: OutputFormat::from_flag(cli.json),
    };

    match &cli.command {
        Commands::Site(cmd) => commands::site::run(cmd, &ctx).await?,
        Commands::Baseline(cmd) => commands::baseline::run(cmd, &ctx).await?,
        Commands::Observations(cmd) => commands::observations::run(cmd, &ctx).await?,
        Commands::Events(cmd) => commands::events::run(cmd, &ctx).await?,
        Commands::Ticks(cmd) => commands::ticks::run(cmd, &ctx).await?,
        Commands::Compare(cmd) => commands::compare::run(cmd, &ctx).await?,
    }

    Ok(())
}
