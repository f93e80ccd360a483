// crates/relic-store/src/keys.rs
//
// RocksDB key layout. All keys are UTF-8; values are JSON.
//
//   site:{site}                                         -> Site
//   active:{site}                                       -> (empty; index of active sites)
//   baseline:{site}:{tag}                               -> Baseline
//   obs:{site}:{tag}:{observed_ms}:{obs}                -> ObservationRecord
//   event:{site}:{observed_ms}:{event}                  -> ChangeEvent
//   event_id:{event}                                    -> (empty; uniqueness guard)
//   composite:{site}:{window_end_ms}:{composite}        -> CompositeSummary
//   window:{site}:{window_start_ms}:{window_end_ms}     -> CompositeSummary (latest)
//   tick:{site}:{tick_ms}:{tag}:{finished_ms}           -> TickRecord
//
// `{tag}` is `IndexKind::tag()` and never contains ':'. Timestamps are
// zero-padded milliseconds since the epoch, so lexicographic key order is
// time order within a prefix. Pre-epoch instants clamp to zero.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use relic_core::{DateRange, IndexKind};

/// Zero-padded epoch milliseconds.
pub fn millis(t: DateTime<Utc>) -> String {
    format!("{:020}", t.timestamp_millis().max(0))
}

pub fn site(id: &Uuid) -> String {
    format!("site:{}", id)
}

pub const SITE_PREFIX: &str = "site:";

pub fn active(id: &Uuid) -> String {
    format!("active:{}", id)
}

pub const ACTIVE_PREFIX: &str = "active:";

pub fn baseline(site: &Uuid, index: &IndexKind) -> String {
    format!("baseline:{}:{}", site, index.tag())
}

pub fn baseline_prefix(site: &Uuid) -> String {
    format!("baseline:{}:", site)
}

pub fn observation(site: &Uuid, index: &IndexKind, observed_at: DateTime<Utc>, id: &Uuid) -> String {
    format!("obs:{}:{}:{}:{}", site, index.tag(), millis(observed_at), id)
}

pub fn observation_prefix(site: &Uuid, index: &IndexKind) -> String {
    format!("obs:{}:{}:", site, index.tag())
}

pub fn event(site: &Uuid, observed_at: DateTime<Utc>, id: &Uuid) -> String {
    format!("event:{}:{}:{}", site, millis(observed_at), id)
}

pub fn event_prefix(site: &Uuid) -> String {
    format!("event:{}:", site)
}

pub fn event_id(id: &Uuid) -> String {
    format!("event_id:{}", id)
}

pub fn composite(site: &Uuid, window: &DateRange, id: &Uuid) -> String {
    format!("composite:{}:{}:{}", site, millis(window.end), id)
}

pub fn composite_prefix(site: &Uuid) -> String {
    format!("composite:{}:", site)
}

pub fn window(site: &Uuid, window: &DateRange) -> String {
    format!("window:{}:{}:{}", site, millis(window.start), millis(window.end))
}

pub fn tick(site: &Uuid, tick_at: DateTime<Utc>, index: &IndexKind, finished_at: DateTime<Utc>) -> String {
    format!(
        "tick:{}:{}:{}:{}",
        site,
        millis(tick_at),
        index.tag(),
        millis(finished_at)
    )
}

pub fn tick_prefix(site: &Uuid) -> String {
    format!("tick:{}:", site)
}
