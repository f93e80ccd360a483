// crates/relic-pipeline/src/scheduler.rs
//
// Central scheduler for the Relic monitor.
//
// Owns one task per active site. Each task ticks on the site's cadence and
// runs the pipeline; it carries a cancellation token derived from the
// scheduler's shutdown token. A periodic sync against the site store starts
// tasks for new sites, restarts tasks whose site changed, and cancels tasks
// for sites that were deactivated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use relic_core::{RelicError, Site};

use crate::events::MonitorEvent;
use crate::runner::Pipeline;

const SECONDS_PER_DAY: u64 = 86_400;

struct SiteTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
    /// `updated_at` of the site definition the task was started with.
    updated_at: DateTime<Utc>,
}

/// Scheduler owning one cancellable task per active site.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    sync_interval: Duration,
    tasks: HashMap<Uuid, SiteTask>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, sync_interval: Duration) -> Self {
        Self {
            pipeline,
            sync_interval,
            tasks: HashMap::new(),
        }
    }

    /// IDs of sites with a running task.
    pub fn scheduled_sites(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.tasks.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Sync with the store on every interval until `shutdown` fires, then
    /// cancel and join every site task.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        tracing::info!(
            sync_interval_secs = self.sync_interval.as_secs(),
            "Scheduler started"
        );
        let mut interval = tokio::time::interval(self.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sync(&shutdown).await {
                        tracing::error!(error = %e, "Site sync failed");
                    }
                }
            }
        }

        self.stop_all().await;
    }

    /// Reconcile running tasks with the active sites in the store.
    pub async fn sync(&mut self, parent: &CancellationToken) -> Result<(), RelicError> {
        let active = self.pipeline.store().list_active_sites().await?;

        // Tasks that ended on their own (panic) are restarted below.
        self.tasks.retain(|id, task| {
            if task.handle.is_finished() {
                tracing::warn!(site_id = %id, "Site task exited; restarting");
                false
            } else {
                true
            }
        });

        let active_ids: Vec<Uuid> = active.iter().map(|s| s.id).collect();
        let stale: Vec<Uuid> = self
            .tasks
            .keys()
            .filter(|id| !active_ids.contains(id))
            .copied()
            .collect();
        for id in stale {
            self.cancel_site(&id);
        }

        for site in active {
            match self.tasks.get(&site.id) {
                Some(task) if task.updated_at == site.updated_at => continue,
                Some(_) => {
                    tracing::info!(site_id = %site.id, "Site definition changed; restarting task");
                    self.cancel_site(&site.id);
                }
                None => {}
            }
            self.spawn_site(site, parent);
        }
        Ok(())
    }

    /// Cancel a site's task immediately, without waiting for the next sync.
    /// Returns false if the site had no task.
    pub fn deactivate_site(&mut self, site_id: &Uuid) -> bool {
        self.cancel_site(site_id)
    }

    fn cancel_site(&mut self, site_id: &Uuid) -> bool {
        let Some(task) = self.tasks.remove(site_id) else {
            return false;
        };
        task.token.cancel();
        self.pipeline.locks().forget_site(site_id);
        self.pipeline.publish(MonitorEvent::SiteCancelled { site_id: *site_id });
        tracing::info!(site_id = %site_id, "Site task cancelled");
        true
    }

    fn spawn_site(&mut self, site: Site, parent: &CancellationToken) {
        let token = parent.child_token();
        let id = site.id;
        let updated_at = site.updated_at;
        tracing::info!(
            site_id = %id,
            name = %site.name,
            cadence_days = site.config.cadence_days,
            "Site task started"
        );
        let handle = tokio::spawn(site_loop(self.pipeline.clone(), site, token.clone()));
        self.tasks.insert(
            id,
            SiteTask {
                token,
                handle,
                updated_at,
            },
        );
    }

    async fn stop_all(&mut self) {
        let ids: Vec<Uuid> = self.tasks.keys().copied().collect();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.tasks.remove(&id) {
                task.token.cancel();
                self.pipeline.publish(MonitorEvent::SiteCancelled { site_id: id });
                handles.push(task.handle);
            }
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Site task failed during shutdown");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Tick `site` on its cadence until `token` is cancelled. The first tick
/// fires immediately.
async fn site_loop(pipeline: Arc<Pipeline>, site: Site, token: CancellationToken) {
    let period = Duration::from_secs(u64::from(site.config.cadence_days) * SECONDS_PER_DAY);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                pipeline.run_site_tick(&site, Utc::now(), &token).await;
            }
        }
    }
    tracing::debug!(site_id = %site.id, "Site loop exited");
}
