// crates/relic-cli/src/commands/observations.rs
//
// `relic observations list`: the per-index time series a site's baseline was
// built from, oldest first.

use clap::Subcommand;
use tabled::Tabled;

use relic_core::traits::ObservationLog;
use relic_core::{Disposition, ObservationRecord};
use relic_store::SiteRegistry;

use super::{parse_site_id, resolve_index, Context};
use crate::output::{emit, fmt_f64, short_id};

#[derive(Debug, Subcommand)]
pub enum ObservationsCmd {
    /// List the observation log of one index.
    List {
        site: String,
        #[arg(long, default_value = "ndvi")]
        index: String,
        /// Only the most recent N observations.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Tabled)]
struct ObservationRow {
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Valid")]
    valid: String,
    #[tabled(rename = "Disposition")]
    disposition: &'static str,
    #[tabled(rename = "Composite")]
    composite: String,
}

impl From<&ObservationRecord> for ObservationRow {
    fn from(o: &ObservationRecord) -> Self {
        Self {
            observed: o.observed_at.format("%Y-%m-%d %H:%M").to_string(),
            value: fmt_f64(o.value),
            valid: format!("{:.0}%", o.valid_fraction * 100.0),
            disposition: match o.disposition {
                Disposition::Absorbed => "absorbed",
                Disposition::Anomalous => "anomalous",
            },
            composite: short_id(&o.composite_id),
        }
    }
}

pub async fn run(cmd: &ObservationsCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.open_store()?;
    match cmd {
        ObservationsCmd::List { site, index, limit } => {
            let site = SiteRegistry::new(store.clone()).get(&parse_site_id(site)?).await?;
            let kind = resolve_index(&site, index)?;
            let mut log = store.list_observations(&site.id, &kind).await?;
            if let Some(n) = limit {
                let skip = log.len().saturating_sub(*n);
                log.drain(..skip);
            }
            let rows: Vec<ObservationRow> = log.iter().map(ObservationRow::from).collect();
            emit(ctx.format, &rows, &log);
        }
    }
    Ok(())
}
