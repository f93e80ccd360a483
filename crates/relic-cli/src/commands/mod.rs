// crates/relic-cli/src/commands/mod.rs
//
// Command module declarations for the Relic CLI, plus the shared context
// every command receives.

pub mod baseline;
pub mod compare;
pub mod events;
pub mod observations;
pub mod site;
pub mod ticks;

use std::sync::Arc;

use uuid::Uuid;

use relic_core::{IndexKind, RelicError, Site};
use relic_store::RocksStore;

use crate::output::OutputFormat;

/// Where the store lives and how to print results.
pub struct Context {
    pub data_dir: String,
    pub format: OutputFormat,
}

impl Context {
    /// Open the daemon's RocksDB store. Fails while the daemon holds it.
    pub fn open_store(&self) -> Result<Arc<RocksStore>, RelicError> {
        let path = format!("{}/rocksdb", expand_tilde(&self.data_dir));
        std::fs::create_dir_all(&path)
            .map_err(|e| RelicError::Storage(format!("Failed to create {}: {}", path, e)))?;
        RocksStore::open(&path).map(Arc::new)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

pub fn parse_site_id(s: &str) -> Result<Uuid, RelicError> {
    Uuid::parse_str(s.trim()).map_err(|e| RelicError::Validation(format!("Invalid site id '{}': {}", s, e)))
}

/// Resolve an index name against what `site` monitors, including custom
/// indices.
pub fn resolve_index(site: &Site, name: &str) -> Result<IndexKind, RelicError> {
    site.config
        .monitored_indices()
        .into_iter()
        .find(|k| k.short_name().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| {
            RelicError::NotFound(format!("Site {} does not monitor index '{}'", site.id, name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_core::{CustomFormula, CustomIndex, MonitoringConfig, NewSite};
    use relic_core::geometry::{buffered_point, WGS84};
    use relic_core::Band;

    #[test]
    fn test_resolve_index_includes_custom() {
        let mut config = MonitoringConfig::default();
        config.custom_indices.push(CustomIndex {
            name: "RedEdge2".to_string(),
            formula: CustomFormula::NormalizedDiff,
            band_a: Band::B8A,
            band_b: Band::B6,
        });
        let site = Site::create(NewSite {
            name: "Histria".to_string(),
            geometry: buffered_point(44.547, 28.774, 1.0, 32).unwrap(),
            crs: WGS84.to_string(),
            config,
        })
        .unwrap();

        assert_eq!(resolve_index(&site, "ndvi").unwrap(), IndexKind::Ndvi);
        assert_eq!(resolve_index(&site, "rededge2").unwrap().tag(), "custom.RedEdge2.nd.b8a.b6");
        assert!(matches!(resolve_index(&site, "evi"), Err(RelicError::NotFound(_))));
    }

    #[test]
    fn test_parse_site_id_rejects_garbage() {
        assert!(parse_site_id("not-a-uuid").is_err());
        let id = Uuid::now_v7();
        assert_eq!(parse_site_id(&format!(" {} ", id)).unwrap(), id);
    }
}
