// crates/relic-cli/src/commands/baseline.rs
//
// `relic baseline {show, recompute}`: inspect baselines and rebuild them from
// the observation log.

use chrono::Utc;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use relic_core::traits::{BaselineStore, ObservationLog};
use relic_core::{Baseline, BaselineState, IndexKind};
use relic_detect::ReplaySummary;
use relic_store::SiteRegistry;

use super::{parse_site_id, resolve_index, Context};
use crate::output::{emit, fmt_f64};

/// Baseline subcommands.
#[derive(Debug, Subcommand)]
pub enum BaselineCmd {
    /// Show the baselines of a site.
    Show {
        site: String,
    },
    /// Rebuild baselines from the observation log with the site's current
    /// configuration. Run while the daemon is stopped.
    Recompute {
        site: String,
        /// Only this index (default: every monitored index).
        #[arg(long)]
        index: Option<String>,
    },
}

#[derive(Tabled)]
struct BaselineRow {
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Samples")]
    samples: u64,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std: String,
    #[tabled(rename = "Last observation")]
    last_observation: String,
}

impl From<&Baseline> for BaselineRow {
    fn from(b: &Baseline) -> Self {
        Self {
            index: b.index.short_name().to_string(),
            state: match b.state {
                BaselineState::ColdStart => "cold start",
                BaselineState::Established => "established",
            }
            .to_string(),
            samples: b.sample_count,
            mean: fmt_f64(b.mean),
            std: fmt_f64(b.std_dev()),
            last_observation: b
                .last_observation_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled, Serialize)]
struct RecomputeRow {
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Observations")]
    observations: usize,
    #[tabled(rename = "Absorbed")]
    absorbed: usize,
    #[tabled(rename = "Anomalous")]
    anomalous: usize,
    #[tabled(rename = "Duplicates")]
    duplicates: usize,
}

impl RecomputeRow {
    fn new(index: &IndexKind, s: ReplaySummary) -> Self {
        Self {
            index: index.short_name().to_string(),
            observations: s.observations,
            absorbed: s.absorbed,
            anomalous: s.anomalous,
            duplicates: s.duplicates,
        }
    }
}

/// Run the baseline subcommand.
pub async fn run(cmd: &BaselineCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.open_store()?;
    let registry = SiteRegistry::new(store.clone());

    match cmd {
        BaselineCmd::Show { site } => {
            let site = registry.get(&parse_site_id(site)?).await?;
            let baselines = store.list_baselines(&site.id).await?;
            let rows: Vec<BaselineRow> = baselines.iter().map(BaselineRow::from).collect();
            emit(ctx.format, &rows, &baselines);
        }
        BaselineCmd::Recompute { site, index } => {
            let site = registry.get(&parse_site_id(site)?).await?;
            let indices: Vec<IndexKind> = match index {
                Some(name) => vec![resolve_index(&site, name)?],
                None => site.config.monitored_indices().into_iter().collect(),
            };

            let mut rows = Vec::with_capacity(indices.len());
            for kind in indices {
                let log = store.list_observations(&site.id, &kind).await?;
                let (baseline, summary) =
                    relic_detect::replay(site.id, &kind, &log, &site.config, Utc::now())?;
                store.save_baseline(&baseline).await?;
                rows.push(RecomputeRow::new(&kind, summary));
            }
            emit(ctx.format, &rows, &rows);
        }
    }
    Ok(())
}
