// crates/relic-cli/src/commands/ticks.rs
//
// `relic ticks list`: recent tick outcomes for a site, newest first.

use clap::Subcommand;
use tabled::Tabled;

use relic_core::traits::TickLedger;
use relic_core::{TickOutcome, TickRecord};
use relic_store::SiteRegistry;

use super::{parse_site_id, Context};
use crate::output::emit;

#[derive(Debug, Subcommand)]
pub enum TicksCmd {
    /// List recent ticks for a site.
    List {
        site: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Tabled)]
struct TickRow {
    #[tabled(rename = "Tick")]
    tick_at: String,
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&TickRecord> for TickRow {
    fn from(r: &TickRecord) -> Self {
        let detail = match &r.outcome {
            TickOutcome::Succeeded { .. } => String::new(),
            TickOutcome::Skipped { reason } => format!("{:?}", reason),
            TickOutcome::Failed { kind, message } => format!("{}: {}", kind, message),
        };
        Self {
            tick_at: r.tick_at.format("%Y-%m-%d %H:%M").to_string(),
            index: r.index.short_name().to_string(),
            outcome: r.outcome.label().to_string(),
            detail,
        }
    }
}

pub async fn run(cmd: &TicksCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.open_store()?;
    match cmd {
        TicksCmd::List { site, limit } => {
            let site = SiteRegistry::new(store.clone()).get(&parse_site_id(site)?).await?;
            let ticks = store.list_ticks(&site.id, *limit).await?;
            let rows: Vec<TickRow> = ticks.iter().map(TickRow::from).collect();
            emit(ctx.format, &rows, &ticks);
        }
    }
    Ok(())
}
