// crates/relic-cli/src/commands/compare.rs
//
// `relic compare`: before/after change map for a site from two sets of scene
// files, independent of the site's baseline.

use chrono::Duration;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use relic_core::{DateRange, IndexStats, RelicError, Scene, Site};
use relic_detect::pairwise::DEFAULT_THRESHOLD;
use relic_detect::ChangeSummary;
use relic_store::SiteRegistry;

use super::{parse_site_id, resolve_index, Context};
use crate::output::{emit, fmt_f64};

#[derive(Debug, Args)]
pub struct CompareCmd {
    /// Site the scenes belong to.
    site: String,
    /// Scene JSON files composited into the "before" image.
    #[arg(long, num_args = 1.., required = true)]
    before: Vec<String>,
    /// Scene JSON files composited into the "after" image.
    #[arg(long, num_args = 1.., required = true)]
    after: Vec<String>,
    /// Index to compare.
    #[arg(long, default_value = "ndvi")]
    index: String,
    /// |after - before| above which a pixel counts as changed.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
}

#[derive(Serialize)]
struct Comparison {
    site_id: uuid::Uuid,
    index: String,
    threshold: f64,
    before: Option<IndexStats>,
    after: Option<IndexStats>,
    summary: ChangeSummary,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn run(cmd: &CompareCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.open_store()?;
    let site = SiteRegistry::new(store).get(&parse_site_id(&cmd.site)?).await?;
    let kind = resolve_index(&site, &cmd.index)?;

    let before = index_raster(&site, &kind, &load_scenes(&cmd.before).await?)?;
    let after = index_raster(&site, &kind, &load_scenes(&cmd.after).await?)?;
    let map = relic_detect::difference(&before, &after, cmd.threshold)?;

    let comparison = Comparison {
        site_id: site.id,
        index: kind.short_name().to_string(),
        threshold: map.threshold,
        before: relic_imagery::stats(&before),
        after: relic_imagery::stats(&after),
        summary: map.summary,
    };

    let pct = |f: f64| format!("{:.1}%", f * 100.0);
    let mean = |s: &Option<IndexStats>| s.map(|s| fmt_f64(s.mean)).unwrap_or_else(|| "-".to_string());
    let rows = vec![
        MetricRow {
            metric: "Before mean",
            value: mean(&comparison.before),
        },
        MetricRow {
            metric: "After mean",
            value: mean(&comparison.after),
        },
        MetricRow {
            metric: "Mean delta",
            value: map
                .summary
                .mean_delta
                .map(fmt_f64)
                .unwrap_or_else(|| "-".to_string()),
        },
        MetricRow {
            metric: "Valid pixels",
            value: map.summary.valid_pixels.to_string(),
        },
        MetricRow {
            metric: "Decrease",
            value: pct(map.summary.decrease_fraction),
        },
        MetricRow {
            metric: "No change",
            value: pct(map.summary.no_change_fraction),
        },
        MetricRow {
            metric: "Increase",
            value: pct(map.summary.increase_fraction),
        },
    ];
    emit(ctx.format, &rows, &comparison);
    Ok(())
}

async fn load_scenes(paths: &[String]) -> Result<Vec<Scene>, Box<dyn std::error::Error>> {
    let mut scenes = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await?;
        scenes.push(serde_json::from_slice::<Scene>(&bytes)?);
    }
    Ok(scenes)
}

/// Composite `scenes` over the span they cover and evaluate `kind`.
fn index_raster(
    site: &Site,
    kind: &relic_core::IndexKind,
    scenes: &[Scene],
) -> Result<relic_core::IndexRaster, RelicError> {
    let window = covering_window(scenes)?;
    let composite = relic_imagery::compose(site, scenes, window)?;
    relic_imagery::compute(&composite, kind)
}

/// Smallest half-open window containing every acquisition.
fn covering_window(scenes: &[Scene]) -> Result<DateRange, RelicError> {
    let start = scenes
        .iter()
        .map(|s| s.acquired_at)
        .min()
        .ok_or_else(|| RelicError::Validation("No scenes given".to_string()))?;
    let end = scenes
        .iter()
        .map(|s| s.acquired_at)
        .max()
        .unwrap_or(start);
    DateRange::new(start, end + Duration::milliseconds(1))
}
