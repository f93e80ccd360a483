// crates/relic-core/src/traits.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::baseline::Baseline;
use crate::error::RelicError;
use crate::event::{ChangeEvent, ObservationRecord, TickRecord};
use crate::index::IndexKind;
use crate::raster::CompositeSummary;
use crate::scene::{AreaOfInterest, DateRange, Scene};
use crate::site::Site;

/// Persistent storage of site records.
///
/// Implemented by relic-store (RocksDB and in-memory backends).
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Save a site. Overwrites if the ID already exists.
    async fn save_site(&self, site: &Site) -> Result<(), RelicError>;

    async fn get_site(&self, id: &Uuid) -> Result<Option<Site>, RelicError>;

    /// All sites, active or not, ordered by ID (creation order).
    async fn list_sites(&self) -> Result<Vec<Site>, RelicError>;

    /// Active sites only, ordered by ID.
    async fn list_active_sites(&self) -> Result<Vec<Site>, RelicError>;
}

/// Baseline state per (site, index).
#[async_trait]
pub trait BaselineStore: Send + Sync {
    async fn get_baseline(
        &self,
        site_id: &Uuid,
        index: &IndexKind,
    ) -> Result<Option<Baseline>, RelicError>;

    async fn list_baselines(&self, site_id: &Uuid) -> Result<Vec<Baseline>, RelicError>;

    /// Replace a baseline without touching the logs (used by replay).
    async fn save_baseline(&self, baseline: &Baseline) -> Result<(), RelicError>;

    /// Atomically persist the outcome of one evaluation: the new baseline,
    /// the observation record, and the change event if one was raised.
    ///
    /// Either all three are written or none are. Fails without writing if
    /// the event ID already exists.
    async fn commit_evaluation(
        &self,
        baseline: &Baseline,
        observation: &ObservationRecord,
        event: Option<&ChangeEvent>,
    ) -> Result<(), RelicError>;
}

/// Log of every evaluated observation, used to rebuild baselines.
#[async_trait]
pub trait ObservationLog: Send + Sync {
    /// Observations for one (site, index), oldest first.
    async fn list_observations(
        &self,
        site_id: &Uuid,
        index: &IndexKind,
    ) -> Result<Vec<ObservationRecord>, RelicError>;
}

/// Append-only change event audit trail.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event outside of an evaluation commit. Fails if the ID exists.
    async fn append_event(&self, event: &ChangeEvent) -> Result<(), RelicError>;

    /// Events for a site, oldest observation first.
    async fn list_events(&self, site_id: &Uuid) -> Result<Vec<ChangeEvent>, RelicError>;
}

/// Archive of composite summaries. Superseded entries are kept.
#[async_trait]
pub trait CompositeArchive: Send + Sync {
    async fn archive_composite(&self, summary: &CompositeSummary) -> Result<(), RelicError>;

    /// Most recently archived composite for exactly this window, if any.
    async fn latest_composite(
        &self,
        site_id: &Uuid,
        window: &DateRange,
    ) -> Result<Option<CompositeSummary>, RelicError>;

    /// All summaries for a site, ordered by window end then archive order.
    async fn list_composites(&self, site_id: &Uuid) -> Result<Vec<CompositeSummary>, RelicError>;
}

/// Record of every (site, index, tick) outcome.
#[async_trait]
pub trait TickLedger: Send + Sync {
    async fn record_tick(&self, record: &TickRecord) -> Result<(), RelicError>;

    /// Most recent `limit` ticks for a site, newest first.
    async fn list_ticks(&self, site_id: &Uuid, limit: usize) -> Result<Vec<TickRecord>, RelicError>;
}

/// Everything the monitoring pipeline needs from storage.
pub trait MonitorStore:
    SiteStore + BaselineStore + ObservationLog + EventLog + CompositeArchive + TickLedger
{
}

impl<T> MonitorStore for T where
    T: SiteStore + BaselineStore + ObservationLog + EventLog + CompositeArchive + TickLedger
{
}

/// Provider of raw scenes.
///
/// Implemented by the daemon (directory-backed) and by test fixtures.
#[async_trait]
pub trait ImagerySource: Send + Sync {
    /// Scenes intersecting `area` acquired within `range`, in any order.
    async fn fetch(&self, area: &AreaOfInterest, range: DateRange) -> Result<Vec<Scene>, RelicError>;
}

/// Consumer of change events. Takes ownership of each event.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, event: ChangeEvent) -> Result<(), RelicError>;
}
