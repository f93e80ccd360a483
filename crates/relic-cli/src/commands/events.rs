// crates/relic-cli/src/commands/events.rs
//
// `relic events list`: the change event audit trail for a site.

use clap::Subcommand;
use tabled::Tabled;

use relic_core::traits::EventLog;
use relic_core::ChangeEvent;
use relic_store::SiteRegistry;

use super::{parse_site_id, Context};
use crate::output::{emit, fmt_f64, short_id};

#[derive(Debug, Subcommand)]
pub enum EventsCmd {
    /// List change events for a site, oldest first.
    List {
        site: String,
        /// Only the most recent N events.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Event")]
    id: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "z")]
    z: String,
    #[tabled(rename = "Affected")]
    affected: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

impl From<&ChangeEvent> for EventRow {
    fn from(e: &ChangeEvent) -> Self {
        Self {
            id: short_id(&e.id),
            observed: e.observed_at.format("%Y-%m-%d").to_string(),
            index: e.index.short_name().to_string(),
            value: fmt_f64(e.value),
            baseline: format!("{} ± {}", fmt_f64(e.baseline_mean), fmt_f64(e.baseline_std)),
            z: format!("{:+.2}", e.z_score),
            affected: format!("{:.0}%", e.affected_fraction * 100.0),
            severity: format!("{:?}", e.severity).to_lowercase(),
            direction: format!("{:?}", e.direction).to_lowercase(),
        }
    }
}

pub async fn run(cmd: &EventsCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.open_store()?;
    match cmd {
        EventsCmd::List { site, limit } => {
            let site = SiteRegistry::new(store.clone()).get(&parse_site_id(site)?).await?;
            let mut events = store.list_events(&site.id).await?;
            if let Some(n) = limit {
                let skip = events.len().saturating_sub(*n);
                events.drain(..skip);
            }
            let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
            emit(ctx.format, &rows, &events);
        }
    }
    Ok(())
}
