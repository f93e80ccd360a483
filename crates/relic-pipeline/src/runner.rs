// crates/relic-pipeline/src/runner.rs
//
// One monitoring tick for one site.
//
//   fetch scenes (I/O, once per site)
//     -> compose (blocking pool)
//     -> per index, in parallel, under the (site, index) lock:
//          compute index + evaluate (blocking pool)
//          -> cancellation check -> archive composite summary (once)
//          -> atomic commit -> alert sinks
//     -> archive composite summary if not cancelled and not yet archived
//     -> tick ledger + monitor events
//
// Every failure is contained at the (site, index, tick) boundary and ends up
// in the tick ledger; nothing here propagates into another site's run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, OnceCell, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use relic_core::traits::{AlertSink, ImagerySource, MonitorStore};
use relic_core::{
    AreaOfInterest, Baseline, ChangeEvent, Composite, CompositeSummary, DateRange, IndexKind, RelicError, Site, SkipReason,
    TickOutcome, TickRecord,
};
use relic_detect::{Assessment, ReplaySummary};

use crate::events::MonitorEvent;
use crate::locks::KeyedLocks;

/// Capacity of the monitor event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The summary of a tick's composite, written to the archive at most once.
///
/// `summary` is `None` when the archive already holds an identical composite
/// for the window.
struct PendingSummary {
    summary: Option<CompositeSummary>,
    archived: OnceCell<()>,
}

impl PendingSummary {
    async fn ensure_archived(&self, store: &dyn MonitorStore) -> Result<(), RelicError> {
        let Some(summary) = &self.summary else {
            return Ok(());
        };
        self.archived
            .get_or_try_init(|| store.archive_composite(summary))
            .await?;
        Ok(())
    }
}

/// Orchestrates ticks over a store, an imagery source, and alert sinks.
pub struct Pipeline {
    store: Arc<dyn MonitorStore>,
    source: Arc<dyn ImagerySource>,
    sinks: Vec<Arc<dyn AlertSink>>,
    locks: KeyedLocks,
    /// Bounds concurrent CPU-bound work on the blocking pool.
    cpu: Arc<Semaphore>,
    events: broadcast::Sender<MonitorEvent>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        source: Arc<dyn ImagerySource>,
        sinks: Vec<Arc<dyn AlertSink>>,
        max_concurrent: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            source,
            sinks,
            locks: KeyedLocks::new(),
            cpu: Arc::new(Semaphore::new(max_concurrent.max(1))),
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Run `f` on the blocking pool while holding a CPU permit.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, RelicError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RelicError> + Send + 'static,
    {
        let permit = self
            .cpu
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RelicError::Pipeline(format!("CPU semaphore closed: {}", e)))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| RelicError::Pipeline(format!("Blocking task failed: {}", e)))?
    }

    /// Run one tick for `site` at `tick_at`, for every monitored index.
    ///
    /// Returns the tick records written (one per index that reached an
    /// outcome). Indices whose commit was pre-empted by `cancel` are omitted.
    pub async fn run_site_tick(
        self: &Arc<Self>,
        site: &Site,
        tick_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<TickRecord> {
        let indices: Vec<IndexKind> = site.config.monitored_indices().into_iter().collect();
        let window = DateRange::ending_at(tick_at, site.config.window_days);
        tracing::info!(
            site_id = %site.id,
            window_start = %window.start,
            window_end = %window.end,
            indices = indices.len(),
            "Tick started"
        );

        let (composite, pending) = match self.prepare_composite(site, window).await {
            Ok((c, pending)) => (Arc::new(c), Arc::new(pending)),
            Err(e) => {
                let outcome = outcome_for_error(&e);
                tracing::info!(site_id = %site.id, outcome = outcome.label(), error = %e, "Tick ended before indexing");
                let mut records = Vec::with_capacity(indices.len());
                for index in indices {
                    records.push(self.finish(site, index, tick_at, outcome.clone()).await);
                }
                return records;
            }
        };

        let mut tasks = JoinSet::new();
        for index in indices {
            let this = Arc::clone(self);
            let site = site.clone();
            let composite = Arc::clone(&composite);
            let pending = Arc::clone(&pending);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                this.run_index(&site, composite, &pending, index, tick_at, &cancel)
                    .await
            });
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::error!(site_id = %site.id, error = %e, "Index task panicked"),
            }
        }

        // Skipped and failed indices still leave the composite on record.
        if !cancel.is_cancelled() {
            if let Err(e) = pending.ensure_archived(self.store.as_ref()).await {
                tracing::error!(site_id = %site.id, error = %e, "Failed to archive composite");
            }
        }
        records
    }

    /// Fetch and compose one window, and work out what the archive needs.
    async fn prepare_composite(
        &self,
        site: &Site,
        window: DateRange,
    ) -> Result<(Composite, PendingSummary), RelicError> {
        let scenes = self.source.fetch(&AreaOfInterest::from(site), window).await?;
        tracing::debug!(site_id = %site.id, scenes = scenes.len(), "Scenes fetched");

        let owned_site = site.clone();
        let composite = self
            .run_blocking(move || relic_imagery::compose(&owned_site, &scenes, window))
            .await?;

        let summary = match self.store.latest_composite(&site.id, &window).await? {
            Some(prev) if prev.fingerprint == composite.fingerprint => {
                tracing::debug!(site_id = %site.id, composite_id = %prev.id, "Composite unchanged");
                None
            }
            prev => Some(composite.summary(prev.map(|p| p.id))),
        };
        let pending = PendingSummary {
            summary,
            archived: OnceCell::new(),
        };
        Ok((composite, pending))
    }

    /// Evaluate one index of a composite and commit the result.
    async fn run_index(
        &self,
        site: &Site,
        composite: Arc<Composite>,
        pending: &PendingSummary,
        index: IndexKind,
        tick_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Option<TickRecord> {
        let _guard = self.locks.lock(site.id, &index).await;

        let outcome = match self
            .evaluate_and_commit(site, composite, pending, &index, cancel)
            .await
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                tracing::info!(site_id = %site.id, index = %index, "Site cancelled before commit; evaluation discarded");
                return None;
            }
            Err(e @ RelicError::OutOfOrderObservation { .. }) => {
                // The stored baseline is left as is; backfill goes through
                // `recompute_baseline`.
                tracing::warn!(site_id = %site.id, index = %index, error = %e, "Observation rejected");
                outcome_for_error(&e)
            }
            Err(e) => outcome_for_error(&e),
        };

        Some(self.finish(site, index, tick_at, outcome).await)
    }

    /// `Ok(None)` means the site was cancelled before the commit.
    async fn evaluate_and_commit(
        &self,
        site: &Site,
        composite: Arc<Composite>,
        pending: &PendingSummary,
        index: &IndexKind,
        cancel: &CancellationToken,
    ) -> Result<Option<TickOutcome>, RelicError> {
        let baseline = self
            .store
            .get_baseline(&site.id, index)
            .await?
            .unwrap_or_else(|| Baseline::new(site.id, index.clone()));

        let config = site.config.clone();
        let kind = index.clone();
        let assessment = self
            .run_blocking(move || {
                let raster = relic_imagery::compute(&composite, &kind)?;
                relic_detect::evaluate(&baseline, &raster, &config, Utc::now())
            })
            .await?;

        let evaluation = match assessment {
            Assessment::NoNewData => {
                return Ok(Some(TickOutcome::Skipped {
                    reason: SkipReason::NoNewData,
                }))
            }
            Assessment::Evaluated(e) => e,
        };

        if cancel.is_cancelled() {
            return Ok(None);
        }

        // Observations reference the composite, so it is archived first.
        pending.ensure_archived(self.store.as_ref()).await?;
        self.store
            .commit_evaluation(&evaluation.baseline, &evaluation.observation, evaluation.event.as_ref())
            .await?;

        tracing::debug!(
            site_id = %site.id,
            index = %index,
            value = evaluation.observation.value,
            state = ?evaluation.baseline.state,
            samples = evaluation.baseline.sample_count,
            "Observation committed"
        );

        let event_emitted = evaluation.event.is_some();
        if let Some(event) = evaluation.event {
            tracing::warn!(
                site_id = %event.site_id,
                index = %event.index,
                z_score = event.z_score,
                severity = ?event.severity,
                direction = ?event.direction,
                "Change detected"
            );
            self.publish(MonitorEvent::ChangeDetected {
                event: event.clone(),
            });
            self.dispatch(event).await;
        }
        Ok(Some(TickOutcome::Succeeded { event_emitted }))
    }

    /// Hand a committed event to every sink. Sink failures are logged only;
    /// the event is already in the audit trail.
    async fn dispatch(&self, event: ChangeEvent) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        for sink in rest {
            if let Err(e) = sink.emit(event.clone()).await {
                tracing::error!(event_id = %event.id, error = %e, "Alert sink failed");
            }
        }
        let id = event.id;
        if let Err(e) = last.emit(event).await {
            tracing::error!(event_id = %id, error = %e, "Alert sink failed");
        }
    }

    /// Record a tick outcome and announce it.
    async fn finish(&self, site: &Site, index: IndexKind, tick_at: DateTime<Utc>, outcome: TickOutcome) -> TickRecord {
        let record = TickRecord {
            site_id: site.id,
            index,
            tick_at,
            finished_at: Utc::now(),
            outcome,
        };
        tracing::info!(
            site_id = %record.site_id,
            index = %record.index,
            outcome = record.outcome.label(),
            "Tick finished"
        );
        if let Err(e) = self.store.record_tick(&record).await {
            tracing::error!(site_id = %site.id, error = %e, "Failed to record tick");
        }
        self.publish(MonitorEvent::TickCompleted {
            record: record.clone(),
        });
        record
    }

    /// Rebuild the baseline for (site, index) from its observation log.
    pub async fn recompute_baseline(
        &self,
        site: &Site,
        index: &IndexKind,
    ) -> Result<(Baseline, ReplaySummary), RelicError> {
        let _guard = self.locks.lock(site.id, index).await;
        let log = self.store.list_observations(&site.id, index).await?;
        let (baseline, summary) = relic_detect::replay(site.id, index, &log, &site.config, Utc::now())?;
        self.store.save_baseline(&baseline).await?;
        tracing::info!(
            site_id = %site.id,
            index = %index,
            observations = summary.observations,
            absorbed = summary.absorbed,
            anomalous = summary.anomalous,
            "Baseline rebuilt"
        );
        Ok((baseline, summary))
    }

    /// Run one tick now for every active site, sequentially by site.
    pub async fn run_active_sites(self: &Arc<Self>, tick_at: DateTime<Utc>) -> Result<Vec<TickRecord>, RelicError> {
        let cancel = CancellationToken::new();
        let mut records = Vec::new();
        for site in self.store.list_active_sites().await? {
            records.extend(self.run_site_tick(&site, tick_at, &cancel).await);
        }
        Ok(records)
    }
}

/// Map an error to the tick outcome recorded for it.
fn outcome_for_error(e: &RelicError) -> TickOutcome {
    match e {
        RelicError::InsufficientData { .. } => TickOutcome::Skipped {
            reason: SkipReason::InsufficientData,
        },
        other => TickOutcome::Failed {
            kind: other.kind(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_core::ErrorKind;

    #[test]
    fn test_outcome_for_error() {
        assert_eq!(
            outcome_for_error(&RelicError::no_data(0.8)),
            TickOutcome::Skipped {
                reason: SkipReason::InsufficientData
            }
        );
        match outcome_for_error(&RelicError::Imagery("down".to_string())) {
            TickOutcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::Imagery);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
