// crates/relic-pipeline/src/events.rs
//
// Monitor events broadcast from the pipeline and scheduler.
//
// The pipeline publishes on a tokio broadcast channel; the daemon and tests
// subscribe to follow progress without polling the store.

use uuid::Uuid;

use relic_core::{ChangeEvent, TickRecord};

/// Progress notifications from the monitoring pipeline.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// One (site, index, tick) run finished with the recorded outcome.
    TickCompleted {
        record: TickRecord,
    },
    /// A change event was committed.
    ChangeDetected {
        event: ChangeEvent,
    },
    /// The scheduler cancelled a site's task (deactivation or shutdown).
    SiteCancelled {
        site_id: Uuid,
    },
}
