// crates/relic-store/src/rocks.rs
//
// RocksDB-backed persistent storage for sites, baselines, and audit logs.
//
// See `keys.rs` for the key layout. Multi-key updates (site + active index,
// baseline + observation + event) go through a single `WriteBatch`, so a
// crash never leaves half an evaluation on disk.

use std::sync::Mutex;

use async_trait::async_trait;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use relic_core::error::RelicError;
use relic_core::traits::{
    BaselineStore, CompositeArchive, EventLog, ObservationLog, SiteStore, TickLedger,
};
use relic_core::{
    Baseline, ChangeEvent, CompositeSummary, DateRange, IndexKind, ObservationRecord, Site,
    TickRecord,
};

use crate::keys;

/// RocksDB wrapper implementing every relic-core storage trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    /// Serialises read-check-write sequences (event uniqueness).
    write_guard: Mutex<()>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, RelicError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)
            .map_err(|e| RelicError::Storage(format!("Failed to open RocksDB at {}: {}", path, e)))?;

        Ok(Self {
            db,
            write_guard: Mutex::new(()),
        })
    }

    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, RelicError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| RelicError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RelicError> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), RelicError> {
        let json = serde_json::to_vec(value)?;
        self.db
            .put(key.as_bytes(), json)
            .map_err(|e| RelicError::Storage(format!("RocksDB put failed: {}", e)))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), RelicError> {
        self.db
            .write(batch)
            .map_err(|e| RelicError::Storage(format!("RocksDB batch write failed: {}", e)))
    }

    /// Visit every (key, value) pair under `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, RelicError> {
        let prefix = prefix.as_bytes();
        let mut out = Vec::new();
        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item
                .map_err(|e| RelicError::Storage(format!("RocksDB iteration error: {}", e)))?;
            // No prefix extractor is configured; stop at the first foreign key.
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn scan_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, RelicError> {
        self.scan_prefix(prefix)?
            .into_iter()
            .map(|(_, v)| serde_json::from_slice(&v).map_err(RelicError::from))
            .collect()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, RelicError> {
        self.write_guard
            .lock()
            .map_err(|_| RelicError::Storage("RocksStore write guard poisoned".to_string()))
    }

    fn ensure_new_event(&self, event: &ChangeEvent) -> Result<(), RelicError> {
        if self.get_raw(&keys::event_id(&event.id))?.is_some() {
            return Err(RelicError::Validation(format!(
                "Change event {} already recorded",
                event.id
            )));
        }
        Ok(())
    }

    fn batch_put_json<T: serde::Serialize>(
        batch: &mut WriteBatch,
        key: &str,
        value: &T,
    ) -> Result<(), RelicError> {
        batch.put(key.as_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn batch_event(batch: &mut WriteBatch, event: &ChangeEvent) -> Result<(), RelicError> {
        Self::batch_put_json(
            batch,
            &keys::event(&event.site_id, event.observed_at, &event.id),
            event,
        )?;
        batch.put(keys::event_id(&event.id).as_bytes(), b"");
        Ok(())
    }

    /// Load a site synchronously.
    pub fn get_site_sync(&self, id: &Uuid) -> Result<Option<Site>, RelicError> {
        self.get_json(&keys::site(id))
    }
}

#[async_trait]
impl SiteStore for RocksStore {
    async fn save_site(&self, site: &Site) -> Result<(), RelicError> {
        let mut batch = WriteBatch::default();
        Self::batch_put_json(&mut batch, &keys::site(&site.id), site)?;
        // Active index: existence is the signal.
        if site.active {
            batch.put(keys::active(&site.id).as_bytes(), b"");
        } else {
            batch.delete(keys::active(&site.id).as_bytes());
        }
        self.write(batch)
    }

    async fn get_site(&self, id: &Uuid) -> Result<Option<Site>, RelicError> {
        self.get_site_sync(id)
    }

    async fn list_sites(&self) -> Result<Vec<Site>, RelicError> {
        self.scan_json(keys::SITE_PREFIX)
    }

    async fn list_active_sites(&self) -> Result<Vec<Site>, RelicError> {
        let mut sites = Vec::new();
        for (key, _) in self.scan_prefix(keys::ACTIVE_PREFIX)? {
            let id_str = std::str::from_utf8(&key[keys::ACTIVE_PREFIX.len()..]).unwrap_or("");
            if let Ok(id) = Uuid::parse_str(id_str) {
                match self.get_site_sync(&id)? {
                    Some(site) if site.active => sites.push(site),
                    Some(_) => {}
                    None => tracing::warn!(site_id = %id, "Active index entry without a site record"),
                }
            }
        }
        Ok(sites)
    }
}

#[async_trait]
impl BaselineStore for RocksStore {
    async fn get_baseline(&self, site_id: &Uuid, index: &IndexKind) -> Result<Option<Baseline>, RelicError> {
        self.get_json(&keys::baseline(site_id, index))
    }

    async fn list_baselines(&self, site_id: &Uuid) -> Result<Vec<Baseline>, RelicError> {
        self.scan_json(&keys::baseline_prefix(site_id))
    }

    async fn save_baseline(&self, baseline: &Baseline) -> Result<(), RelicError> {
        self.put_json(&keys::baseline(&baseline.site_id, &baseline.index), baseline)
    }

    async fn commit_evaluation(
        &self,
        baseline: &Baseline,
        observation: &ObservationRecord,
        event: Option<&ChangeEvent>,
    ) -> Result<(), RelicError> {
        let _guard = self.guard()?;
        if let Some(event) = event {
            self.ensure_new_event(event)?;
        }

        let mut batch = WriteBatch::default();
        Self::batch_put_json(&mut batch, &keys::baseline(&baseline.site_id, &baseline.index), baseline)?;
        Self::batch_put_json(
            &mut batch,
            &keys::observation(
                &observation.site_id,
                &observation.index,
                observation.observed_at,
                &observation.id,
            ),
            observation,
        )?;
        if let Some(event) = event {
            Self::batch_event(&mut batch, event)?;
        }
        self.write(batch)
    }
}

#[async_trait]
impl ObservationLog for RocksStore {
    async fn list_observations(
        &self,
        site_id: &Uuid,
        index: &IndexKind,
    ) -> Result<Vec<ObservationRecord>, RelicError> {
        self.scan_json(&keys::observation_prefix(site_id, index))
    }
}

#[async_trait]
impl EventLog for RocksStore {
    async fn append_event(&self, event: &ChangeEvent) -> Result<(), RelicError> {
        let _guard = self.guard()?;
        self.ensure_new_event(event)?;
        let mut batch = WriteBatch::default();
        Self::batch_event(&mut batch, event)?;
        self.write(batch)
    }

    async fn list_events(&self, site_id: &Uuid) -> Result<Vec<ChangeEvent>, RelicError> {
        self.scan_json(&keys::event_prefix(site_id))
    }
}

#[async_trait]
impl CompositeArchive for RocksStore {
    async fn archive_composite(&self, summary: &CompositeSummary) -> Result<(), RelicError> {
        let mut batch = WriteBatch::default();
        Self::batch_put_json(
            &mut batch,
            &keys::composite(&summary.site_id, &summary.window, &summary.id),
            summary,
        )?;
        Self::batch_put_json(&mut batch, &keys::window(&summary.site_id, &summary.window), summary)?;
        self.write(batch)
    }

    async fn latest_composite(
        &self,
        site_id: &Uuid,
        window: &DateRange,
    ) -> Result<Option<CompositeSummary>, RelicError> {
        self.get_json(&keys::window(site_id, window))
    }

    async fn list_composites(&self, site_id: &Uuid) -> Result<Vec<CompositeSummary>, RelicError> {
        self.scan_json(&keys::composite_prefix(site_id))
    }
}

#[async_trait]
impl TickLedger for RocksStore {
    async fn record_tick(&self, record: &TickRecord) -> Result<(), RelicError> {
        self.put_json(
            &keys::tick(&record.site_id, record.tick_at, &record.index, record.finished_at),
            record,
        )
    }

    async fn list_ticks(&self, site_id: &Uuid, limit: usize) -> Result<Vec<TickRecord>, RelicError> {
        let mut ticks: Vec<TickRecord> = self.scan_json(&keys::tick_prefix(site_id))?;
        ticks.reverse();
        ticks.truncate(limit);
        Ok(ticks)
    }
}
