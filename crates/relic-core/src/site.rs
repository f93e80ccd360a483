// crates/relic-core/src/site.rs
//
// Monitored heritage sites and their monitoring configuration.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelicError;
use crate::geometry::validate_polygon;
use crate::index::{CustomIndex, IndexKind};

/// A monitored heritage site.
///
/// Sites are never deleted. Deactivation stops scheduling but keeps the
/// baselines, observations and events that reference the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Unique identifier (UUID v7 for time-ordering).
    pub id: Uuid,
    pub name: String,
    /// Area of interest boundary, in `crs` coordinates.
    pub geometry: Polygon<f64>,
    /// CRS identifier of `geometry`, e.g. "EPSG:4326".
    pub crs: String,
    pub config: MonitoringConfig,
    /// Whether the scheduler should run ticks for this site.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Input for creating a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
    pub name: String,
    pub geometry: Polygon<f64>,
    pub crs: String,
    #[serde(default)]
    pub config: MonitoringConfig,
}

/// Partial update of a site. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteUpdate {
    pub name: Option<String>,
    pub geometry: Option<Polygon<f64>>,
    pub crs: Option<String>,
    pub config: Option<MonitoringConfig>,
}

/// How the baseline forgets old observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgingPolicy {
    /// Cumulative statistics; every absorbed observation counts equally forever.
    None,
    /// Accumulated weight halves every `half_life_days` of elapsed observation time.
    Exponential { half_life_days: f64 },
}

impl Default for AgingPolicy {
    fn default() -> Self {
        AgingPolicy::Exponential {
            half_life_days: default_half_life_days(),
        }
    }
}

/// Per-site monitoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Built-in indices to track.
    #[serde(default = "default_indices")]
    pub indices: BTreeSet<IndexKind>,
    /// |z| at or above which an observation is anomalous.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Minimum share of AOI pixels that must be valid for an observation.
    #[serde(default = "default_min_valid_fraction")]
    pub min_valid_fraction: f64,
    /// Days between scheduled ticks.
    #[serde(default = "default_cadence_days")]
    pub cadence_days: u32,
    /// Compositing window length in days, ending at the tick time.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Scenes with a higher scene-level cloud cover are discarded.
    #[serde(default = "default_max_cloud_cover_pct")]
    pub max_cloud_cover_pct: f64,
    /// Observations absorbed before the baseline leaves cold start.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// Per-pixel |z| at or above which a pixel counts towards the affected area.
    #[serde(default = "default_pixel_z_threshold")]
    pub pixel_z_threshold: f64,
    /// Lower bound on the variance used when computing z-scores.
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f64,
    #[serde(default)]
    pub aging: AgingPolicy,
    /// Operator-defined indices tracked in addition to `indices`.
    #[serde(default)]
    pub custom_indices: Vec<CustomIndex>,
}

fn default_indices() -> BTreeSet<IndexKind> {
    [IndexKind::Ndvi, IndexKind::Ndbi].into_iter().collect()
}

fn default_sensitivity() -> f64 {
    2.5
}

fn default_min_valid_fraction() -> f64 {
    0.8
}

fn default_cadence_days() -> u32 {
    30
}

fn default_window_days() -> u32 {
    30
}

fn default_max_cloud_cover_pct() -> f64 {
    20.0
}

fn default_min_samples() -> u64 {
    12
}

fn default_pixel_z_threshold() -> f64 {
    2.0
}

fn default_variance_floor() -> f64 {
    1e-4
}

fn default_half_life_days() -> f64 {
    365.0
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            indices: default_indices(),
            sensitivity: default_sensitivity(),
            min_valid_fraction: default_min_valid_fraction(),
            cadence_days: default_cadence_days(),
            window_days: default_window_days(),
            max_cloud_cover_pct: default_max_cloud_cover_pct(),
            min_samples: default_min_samples(),
            pixel_z_threshold: default_pixel_z_threshold(),
            variance_floor: default_variance_floor(),
            aging: AgingPolicy::default(),
            custom_indices: Vec::new(),
        }
    }
}

impl MonitoringConfig {
    /// Every index this configuration monitors, built-in and custom.
    pub fn monitored_indices(&self) -> BTreeSet<IndexKind> {
        let mut all = self.indices.clone();
        all.extend(self.custom_indices.iter().cloned().map(IndexKind::Custom));
        all
    }

    /// Check configuration bounds.
    pub fn validate(&self) -> Result<(), RelicError> {
        if self.monitored_indices().is_empty() {
            return Err(invalid("at least one index must be monitored"));
        }
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(invalid(format!("sensitivity must be > 0, got {}", self.sensitivity)));
        }
        if !(self.min_valid_fraction > 0.0 && self.min_valid_fraction <= 1.0) {
            return Err(invalid(format!(
                "min_valid_fraction must be in (0, 1], got {}",
                self.min_valid_fraction
            )));
        }
        if self.cadence_days == 0 {
            return Err(invalid("cadence_days must be > 0"));
        }
        if self.window_days == 0 {
            return Err(invalid("window_days must be > 0"));
        }
        if !(0.0..=100.0).contains(&self.max_cloud_cover_pct) {
            return Err(invalid(format!(
                "max_cloud_cover_pct must be in [0, 100], got {}",
                self.max_cloud_cover_pct
            )));
        }
        if self.min_samples < 2 {
            return Err(invalid(format!("min_samples must be >= 2, got {}", self.min_samples)));
        }
        if !(self.pixel_z_threshold.is_finite() && self.pixel_z_threshold > 0.0) {
            return Err(invalid(format!(
                "pixel_z_threshold must be > 0, got {}",
                self.pixel_z_threshold
            )));
        }
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(invalid(format!(
                "variance_floor must be > 0, got {}",
                self.variance_floor
            )));
        }
        if let AgingPolicy::Exponential { half_life_days } = self.aging {
            if !(half_life_days.is_finite() && half_life_days > 0.0) {
                return Err(invalid(format!(
                    "aging half_life_days must be > 0, got {}",
                    half_life_days
                )));
            }
        }
        if self.indices.iter().any(|k| matches!(k, IndexKind::Custom(_))) {
            return Err(invalid("custom indices belong in custom_indices"));
        }
        let mut names = HashSet::new();
        for custom in &self.custom_indices {
            custom.validate()?;
            if !names.insert(custom.name.to_ascii_lowercase()) {
                return Err(invalid(format!("duplicate custom index '{}'", custom.name)));
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> RelicError {
    RelicError::Validation(format!("Invalid monitoring config: {}", msg.into()))
}

/// Validate everything about a site definition except identity and timestamps.
pub fn validate_definition(
    name: &str,
    geometry: &Polygon<f64>,
    crs: &str,
    config: &MonitoringConfig,
) -> Result<(), RelicError> {
    if name.trim().is_empty() {
        return Err(RelicError::Validation("Site name must not be empty".to_string()));
    }
    if crs.trim().is_empty() {
        return Err(RelicError::Validation("Site CRS must not be empty".to_string()));
    }
    validate_polygon(geometry)?;
    config.validate()
}

impl Site {
    /// Build a new active site from validated input.
    pub fn create(new: NewSite) -> Result<Self, RelicError> {
        validate_definition(&new.name, &new.geometry, &new.crs, &new.config)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            name: new.name.trim().to_string(),
            geometry: new.geometry,
            crs: new.crs,
            config: new.config,
            active: true,
            created_at: now,
            updated_at: now,
            deactivated_at: None,
        })
    }

    /// Apply an update, returning the modified copy. `self` is untouched on error.
    pub fn updated(&self, update: SiteUpdate) -> Result<Self, RelicError> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(geometry) = update.geometry {
            next.geometry = geometry;
        }
        if let Some(crs) = update.crs {
            next.crs = crs;
        }
        if let Some(config) = update.config {
            next.config = config;
        }
        validate_definition(&next.name, &next.geometry, &next.crs, &next.config)?;
        next.updated_at = Utc::now();
        Ok(next)
    }
}
