// crates/relic-daemon/src/main.rs
//
// Binary entrypoint for the Relic monitoring daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, opens the
// store, wires the directory imagery source and alert sinks into the
// pipeline, and either runs one tick over every active site (`--once`) or
// hands control to the scheduler until Ctrl-C.

mod config;
mod sink;
mod source;
mod state;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use config::{expand_tilde, DaemonConfig};
use relic_core::traits::{AlertSink, MonitorStore};
use relic_pipeline::{MonitorEvent, Pipeline, Scheduler};
use relic_store::{InMemoryStore, RocksStore};
use sink::{JsonlAlertSink, LogAlertSink};
use source::DirectoryImagerySource;
use state::{DaemonState, DaemonStateMachine};

/// Relic daemon: spectral change monitoring for heritage sites.
#[derive(Parser, Debug)]
#[command(name = "relic-daemon", version = "0.1.0", about = "Heritage site spectral change monitor")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.relic/config.toml")]
    config: String,

    /// Run one tick for every active site, then exit.
    #[arg(long)]
    once: bool,

    /// Keep all state in memory instead of RocksDB (nothing survives exit).
    #[arg(long)]
    ephemeral: bool,

    /// Override the imagery directory from the config file.
    #[arg(long)]
    imagery_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);
    let mut daemon_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    // CLI flag overrides the config file value.
    if let Some(dir) = args.imagery_dir {
        daemon_config.imagery_dir = dir;
    }

    let mut state_machine = DaemonStateMachine::new();
    state_machine.transition(DaemonState::Opening)?;

    tracing::info!("Relic Daemon v0.1.0");
    let store: Arc<dyn MonitorStore> = if args.ephemeral {
        tracing::warn!("Ephemeral mode: state is kept in memory only");
        Arc::new(InMemoryStore::new())
    } else {
        let db_path = format!("{}/rocksdb", expand_tilde(&daemon_config.data_dir));
        std::fs::create_dir_all(&db_path)?;
        let store = RocksStore::open(&db_path)?;
        tracing::info!("Store opened at {}", db_path);
        Arc::new(store)
    };

    let imagery_dir = expand_tilde(&daemon_config.imagery_dir);
    tracing::info!("Imagery directory: {}", imagery_dir);
    let source = Arc::new(DirectoryImagerySource::new(imagery_dir));

    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlertSink)];
    if let Some(path) = &daemon_config.alerts_path {
        let path = expand_tilde(path);
        tracing::info!("Appending alerts to {}", path);
        sinks.push(Arc::new(JsonlAlertSink::new(path)));
    }

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        source,
        sinks,
        daemon_config.max_concurrent_ticks,
    ));
    spawn_event_logger(&pipeline);

    if args.once {
        state_machine.transition(DaemonState::RunningOnce)?;
        let records = pipeline.run_active_sites(Utc::now()).await?;
        let changed = records
            .iter()
            .filter(|r| r.outcome.label() == "changed")
            .count();
        let failed = records
            .iter()
            .filter(|r| r.outcome.label() == "failed")
            .count();
        tracing::info!(
            runs = records.len(),
            changed,
            failed,
            "Single pass complete"
        );
    } else {
        state_machine.transition(DaemonState::Monitoring)?;
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            tracing::info!("Received shutdown signal");
            signal.cancel();
        });

        let mut scheduler = Scheduler::new(
            pipeline.clone(),
            Duration::from_secs(daemon_config.sync_interval_secs.max(1)),
        );
        scheduler.run(shutdown).await;
    }

    let _ = state_machine.transition(DaemonState::ShuttingDown);
    tracing::info!("Relic daemon shut down gracefully");

    Ok(())
}

/// Log monitor events at debug level for operators following along.
fn spawn_event_logger(pipeline: &Arc<Pipeline>) {
    let mut rx = pipeline.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MonitorEvent::TickCompleted { record }) => tracing::debug!(
                    site_id = %record.site_id,
                    index = %record.index,
                    outcome = record.outcome.label(),
                    "Tick completed"
                ),
                Ok(MonitorEvent::ChangeDetected { event }) => tracing::debug!(
                    event_id = %event.id,
                    site_id = %event.site_id,
                    "Change event committed"
                ),
                Ok(MonitorEvent::SiteCancelled { site_id }) => {
                    tracing::debug!(site_id = %site_id, "Site task cancelled")
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event logger lagged by {} events", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
