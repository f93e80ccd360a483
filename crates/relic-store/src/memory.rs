// crates/relic-store/src/memory.rs
//
// In-memory implementation of every relic-core storage trait.
//
// Used by tests and by `relic-daemon --ephemeral`. One lock guards all
// collections, so `commit_evaluation` is trivially atomic.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use relic_core::error::RelicError;
use relic_core::traits::{
    BaselineStore, CompositeArchive, EventLog, ObservationLog, SiteStore, TickLedger,
};
use relic_core::{
    Baseline, ChangeEvent, CompositeSummary, DateRange, IndexKind, ObservationRecord, Site,
    TickRecord,
};

#[derive(Debug, Default)]
struct Inner {
    sites: BTreeMap<Uuid, Site>,
    baselines: BTreeMap<(Uuid, IndexKind), Baseline>,
    observations: Vec<ObservationRecord>,
    events: Vec<ChangeEvent>,
    event_ids: HashSet<Uuid>,
    composites: Vec<CompositeSummary>,
    ticks: Vec<TickRecord>,
}

/// Volatile store backed by ordered maps and vectors.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate_event(id: &Uuid) -> RelicError {
    RelicError::Validation(format!("Change event {} already recorded", id))
}

fn insert_event(inner: &mut Inner, event: &ChangeEvent) {
    inner.event_ids.insert(event.id);
    inner.events.push(event.clone());
}

#[async_trait]
impl SiteStore for InMemoryStore {
    async fn save_site(&self, site: &Site) -> Result<(), RelicError> {
        self.inner.write().await.sites.insert(site.id, site.clone());
        Ok(())
    }

    async fn get_site(&self, id: &Uuid) -> Result<Option<Site>, RelicError> {
        Ok(self.inner.read().await.sites.get(id).cloned())
    }

    async fn list_sites(&self) -> Result<Vec<Site>, RelicError> {
        Ok(self.inner.read().await.sites.values().cloned().collect())
    }

    async fn list_active_sites(&self) -> Result<Vec<Site>, RelicError> {
        Ok(self
            .inner
            .read()
            .await
            .sites
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BaselineStore for InMemoryStore {
    async fn get_baseline(&self, site_id: &Uuid, index: &IndexKind) -> Result<Option<Baseline>, RelicError> {
        Ok(self
            .inner
            .read()
            .await
            .baselines
            .get(&(*site_id, index.clone()))
            .cloned())
    }

    async fn list_baselines(&self, site_id: &Uuid) -> Result<Vec<Baseline>, RelicError> {
        Ok(self
            .inner
            .read()
            .await
            .baselines
            .values()
            .filter(|b| &b.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn save_baseline(&self, baseline: &Baseline) -> Result<(), RelicError> {
        self.inner
            .write()
            .await
            .baselines
            .insert((baseline.site_id, baseline.index.clone()), baseline.clone());
        Ok(())
    }

    async fn commit_evaluation(
        &self,
        baseline: &Baseline,
        observation: &ObservationRecord,
        event: Option<&ChangeEvent>,
    ) -> Result<(), RelicError> {
        let mut inner = self.inner.write().await;
        if let Some(event) = event {
            if inner.event_ids.contains(&event.id) {
                return Err(duplicate_event(&event.id));
            }
        }
        inner
            .baselines
            .insert((baseline.site_id, baseline.index.clone()), baseline.clone());
        inner.observations.push(observation.clone());
        if let Some(event) = event {
            insert_event(&mut inner, event);
        }
        Ok(())
    }
}

#[async_trait]
impl ObservationLog for InMemoryStore {
    async fn list_observations(
        &self,
        site_id: &Uuid,
        index: &IndexKind,
    ) -> Result<Vec<ObservationRecord>, RelicError> {
        let mut out: Vec<ObservationRecord> = self
            .inner
            .read()
            .await
            .observations
            .iter()
            .filter(|o| &o.site_id == site_id && &o.index == index)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[async_trait]
impl EventLog for InMemoryStore {
    async fn append_event(&self, event: &ChangeEvent) -> Result<(), RelicError> {
        let mut inner = self.inner.write().await;
        if inner.event_ids.contains(&event.id) {
            return Err(duplicate_event(&event.id));
        }
        insert_event(&mut inner, event);
        Ok(())
    }

    async fn list_events(&self, site_id: &Uuid) -> Result<Vec<ChangeEvent>, RelicError> {
        let mut out: Vec<ChangeEvent> = self
            .inner
            .read()
            .await
            .events
            .iter()
            .filter(|e| &e.site_id == site_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[async_trait]
impl CompositeArchive for InMemoryStore {
    async fn archive_composite(&self, summary: &CompositeSummary) -> Result<(), RelicError> {
        self.inner.write().await.composites.push(summary.clone());
        Ok(())
    }

    async fn latest_composite(
        &self,
        site_id: &Uuid,
        window: &DateRange,
    ) -> Result<Option<CompositeSummary>, RelicError> {
        Ok(self
            .inner
            .read()
            .await
            .composites
            .iter()
            .rev()
            .find(|c| &c.site_id == site_id && &c.window == window)
            .cloned())
    }

    async fn list_composites(&self, site_id: &Uuid) -> Result<Vec<CompositeSummary>, RelicError> {
        let mut out: Vec<CompositeSummary> = self
            .inner
            .read()
            .await
            .composites
            .iter()
            .filter(|c| &c.site_id == site_id)
            .cloned()
            .collect();
        // Stable: archive order is kept within a window end.
        out.sort_by_key(|c| c.window.end);
        Ok(out)
    }
}

#[async_trait]
impl TickLedger for InMemoryStore {
    async fn record_tick(&self, record: &TickRecord) -> Result<(), RelicError> {
        self.inner.write().await.ticks.push(record.clone());
        Ok(())
    }

    async fn list_ticks(&self, site_id: &Uuid, limit: usize) -> Result<Vec<TickRecord>, RelicError> {
        let mut out: Vec<TickRecord> = self
            .inner
            .read()
            .await
            .ticks
            .iter()
            .filter(|t| &t.site_id == site_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.tick_at.cmp(&a.tick_at).then(b.finished_at.cmp(&a.finished_at)));
        out.truncate(limit);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relic_core::{Direction, Disposition, Severity};

    fn event(site_id: Uuid) -> ChangeEvent {
        ChangeEvent {
            id: Uuid::now_v7(),
            site_id,
            index: IndexKind::Ndvi,
            observed_at: Utc::now(),
            emitted_at: Utc::now(),
            value: 0.3,
            baseline_mean: 0.6,
            baseline_std: 0.02,
            z_score: -15.0,
            affected_fraction: 0.9,
            severity: Severity::Severe,
            direction: Direction::Decrease,
            composite_id: Uuid::now_v7(),
        }
    }

    fn observation(site_id: Uuid) -> ObservationRecord {
        ObservationRecord {
            id: Uuid::now_v7(),
            site_id,
            index: IndexKind::Ndvi,
            observed_at: Utc::now(),
            value: 0.3,
            valid_fraction: 1.0,
            composite_id: Uuid::now_v7(),
            disposition: Disposition::Anomalous,
        }
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let site = Uuid::now_v7();
        let b = Baseline::new(site, IndexKind::Ndvi);
        let e = event(site);
        store.append_event(&e).await.unwrap();

        let err = store
            .commit_evaluation(&b, &observation(site), Some(&e))
            .await
            .unwrap_err();
        assert!(matches!(err, RelicError::Validation(_)));
        assert!(store.get_baseline(&site, &IndexKind::Ndvi).await.unwrap().is_none());
        assert!(store
            .list_observations(&site, &IndexKind::Ndvi)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_events(&site).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_writes_everything() {
        let store = InMemoryStore::new();
        let site = Uuid::now_v7();
        let b = Baseline::new(site, IndexKind::Ndvi);
        store
            .commit_evaluation(&b, &observation(site), Some(&event(site)))
            .await
            .unwrap();
        assert_eq!(store.get_baseline(&site, &IndexKind::Ndvi).await.unwrap(), Some(b));
        assert_eq!(store.list_observations(&site, &IndexKind::Ndvi).await.unwrap().len(), 1);
        assert_eq!(store.list_events(&site).await.unwrap().len(), 1);
    }
}
