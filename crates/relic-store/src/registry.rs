// crates/relic-store/src/registry.rs
//
// Site registry: validated CRUD over site records.
//
// Every mutation validates the full site definition before anything is
// written; a rejected request leaves the store untouched. Sites are never
// deleted, only deactivated.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use relic_core::geometry::{buffered_point, WGS84};
use relic_core::traits::SiteStore;
use relic_core::{presets, MonitoringConfig, NewSite, RelicError, Site, SiteUpdate};

/// Vertices used to approximate point buffers.
pub const BUFFER_SEGMENTS: usize = 64;

/// Registry of monitored sites over any [`SiteStore`].
#[derive(Clone)]
pub struct SiteRegistry {
    store: Arc<dyn SiteStore>,
}

impl SiteRegistry {
    pub fn new(store: Arc<dyn SiteStore>) -> Self {
        Self { store }
    }

    /// Register a new active site.
    pub async fn create(&self, new: NewSite) -> Result<Site, RelicError> {
        let site = Site::create(new)?;
        self.store.save_site(&site).await?;
        tracing::info!(site_id = %site.id, name = %site.name, "Site registered");
        Ok(site)
    }

    /// Register a site as a circular buffer around a WGS84 point.
    pub async fn create_from_point(
        &self,
        name: &str,
        lat: f64,
        lon: f64,
        buffer_km: f64,
        config: MonitoringConfig,
    ) -> Result<Site, RelicError> {
        let geometry = buffered_point(lat, lon, buffer_km, BUFFER_SEGMENTS)?;
        self.create(NewSite {
            name: name.to_string(),
            geometry,
            crs: WGS84.to_string(),
            config,
        })
        .await
    }

    /// Register one of the built-in heritage presets.
    pub async fn create_from_preset(&self, key: &str, config: MonitoringConfig) -> Result<Site, RelicError> {
        let preset = presets::find(key)
            .ok_or_else(|| RelicError::NotFound(format!("No site preset named '{}'", key)))?;
        self.create_from_point(preset.name, preset.lat, preset.lon, preset.buffer_km, config)
            .await
    }

    pub async fn get(&self, id: &Uuid) -> Result<Site, RelicError> {
        self.store
            .get_site(id)
            .await?
            .ok_or_else(|| RelicError::NotFound(format!("Site {}", id)))
    }

    /// Apply a partial update. The stored site changes only if the result is valid.
    pub async fn update(&self, id: &Uuid, update: SiteUpdate) -> Result<Site, RelicError> {
        let current = self.get(id).await?;
        let next = current.updated(update)?;
        self.store.save_site(&next).await?;
        tracing::info!(site_id = %id, "Site updated");
        Ok(next)
    }

    /// Stop monitoring a site. Idempotent.
    pub async fn deactivate(&self, id: &Uuid) -> Result<Site, RelicError> {
        let mut site = self.get(id).await?;
        if !site.active {
            return Ok(site);
        }
        let now = Utc::now();
        site.active = false;
        site.deactivated_at = Some(now);
        site.updated_at = now;
        self.store.save_site(&site).await?;
        tracing::info!(site_id = %id, "Site deactivated");
        Ok(site)
    }

    /// Resume monitoring a deactivated site. Idempotent.
    pub async fn reactivate(&self, id: &Uuid) -> Result<Site, RelicError> {
        let mut site = self.get(id).await?;
        if site.active {
            return Ok(site);
        }
        site.active = true;
        site.deactivated_at = None;
        site.updated_at = Utc::now();
        self.store.save_site(&site).await?;
        tracing::info!(site_id = %id, "Site reactivated");
        Ok(site)
    }

    pub async fn list(&self) -> Result<Vec<Site>, RelicError> {
        self.store.list_sites().await
    }

    pub async fn get_active_sites(&self) -> Result<Vec<Site>, RelicError> {
        self.store.list_active_sites().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use geo::polygon;

    fn registry() -> SiteRegistry {
        SiteRegistry::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_invalid_geometry_persists_nothing() {
        let reg = registry();
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let err = reg
            .create(NewSite {
                name: "bad".to_string(),
                geometry: bowtie,
                crs: WGS84.to_string(),
                config: MonitoringConfig::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelicError::Validation(_)));
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_and_reactivate() {
        let reg = registry();
        let site = reg
            .create_from_preset("colosseum", MonitoringConfig::default())
            .await
            .unwrap();
        assert_eq!(reg.get_active_sites().await.unwrap().len(), 1);

        let off = reg.deactivate(&site.id).await.unwrap();
        assert!(!off.active && off.deactivated_at.is_some());
        assert!(reg.get_active_sites().await.unwrap().is_empty());
        assert_eq!(reg.list().await.unwrap().len(), 1, "deactivated sites are kept");

        let on = reg.reactivate(&site.id).await.unwrap();
        assert!(on.active && on.deactivated_at.is_none());
        assert_eq!(reg.get_active_sites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_site_unchanged() {
        let reg = registry();
        let site = reg
            .create_from_point("Giza", 29.9792, 31.1342, 2.5, MonitoringConfig::default())
            .await
            .unwrap();
        let bad = MonitoringConfig {
            sensitivity: -1.0,
            ..MonitoringConfig::default()
        };
        assert!(reg
            .update(
                &site.id,
                SiteUpdate {
                    config: Some(bad),
                    ..Default::default()
                }
            )
            .await
            .is_err());
        assert_eq!(reg.get(&site.id).await.unwrap(), site);
    }

    #[tokio::test]
    async fn test_unknown_site_and_preset() {
        let reg = registry();
        assert!(matches!(reg.get(&Uuid::now_v7()).await, Err(RelicError::NotFound(_))));
        assert!(matches!(
            reg.create_from_preset("atlantis", MonitoringConfig::default()).await,
            Err(RelicError::NotFound(_))
        ));
    }
}
