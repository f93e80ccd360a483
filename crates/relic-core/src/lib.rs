// crates/relic-core/src/lib.rs
//
// relic-core: Core types and traits for the Relic heritage-site monitor.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines sites and their monitoring configuration, the Sentinel-2 band and
// spectral index catalogue, raster and baseline data structures, audit records,
// the error type, and the storage/adapter trait interfaces.

pub mod band;
pub mod baseline;
pub mod error;
pub mod event;
pub mod geometry;
pub mod index;
pub mod presets;
pub mod raster;
pub mod scene;
pub mod site;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use relic_core::Site;`

pub use band::Band;
pub use index::{CustomFormula, CustomIndex, IndexCategory, IndexFormula, IndexKind};

pub use geometry::GridSpec;
pub use presets::SitePreset;
pub use site::{AgingPolicy, MonitoringConfig, NewSite, Site, SiteUpdate};

pub use raster::{Composite, CompositeSummary, IndexRaster, IndexStats};
pub use scene::{AreaOfInterest, DateRange, QualityFlag, Scene};

pub use baseline::{Baseline, BaselineState, PixelBaseline};
pub use event::{
    ChangeEvent, Direction, Disposition, ObservationRecord, Severity, SkipReason, TickOutcome,
    TickRecord,
};

pub use error::{ErrorKind, RelicError};

pub use traits::{
    AlertSink, BaselineStore, CompositeArchive, EventLog, ImagerySource, MonitorStore,
    ObservationLog, SiteStore, TickLedger,
};
