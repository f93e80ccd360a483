// crates/relic-cli/src/commands/site.rs
//
// `relic site {add, list, show, update, deactivate, reactivate, presets}`:
// site registry management.

use clap::{Args, Subcommand};
use geo::Polygon;
use serde::Serialize;
use tabled::Tabled;

use relic_core::geometry::WGS84;
use relic_core::presets::PRESETS;
use relic_core::{IndexKind, MonitoringConfig, NewSite, RelicError, Site, SiteUpdate};
use relic_store::SiteRegistry;

use super::{parse_site_id, Context};
use crate::output::{emit, format_json, fmt_f64, OutputFormat};

/// Site management subcommands.
#[derive(Debug, Subcommand)]
pub enum SiteCmd {
    /// Register a new site from a preset, a point buffer, or a polygon file.
    Add(AddArgs),
    /// List registered sites.
    List {
        /// Include deactivated sites.
        #[arg(long)]
        all: bool,
    },
    /// Show one site in full.
    Show {
        id: String,
    },
    /// Change a site's name or monitoring configuration.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Stop monitoring a site. History is kept.
    Deactivate {
        id: String,
    },
    /// Resume monitoring a deactivated site.
    Reactivate {
        id: String,
    },
    /// List the built-in heritage site presets.
    Presets,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Preset key (see `relic site presets`).
    #[arg(long, conflicts_with_all = ["lat", "lon", "geometry"])]
    preset: Option<String>,
    /// Display name (required unless --preset is given).
    #[arg(long)]
    name: Option<String>,
    /// Latitude of the site centre (WGS84).
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Longitude of the site centre (WGS84).
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
    /// Buffer radius around the point, in kilometres.
    #[arg(long, default_value_t = 1.0)]
    buffer_km: f64,
    /// JSON file holding a polygon (geo serde layout).
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    geometry: Option<String>,
    /// CRS of the polygon file.
    #[arg(long, default_value = WGS84)]
    crs: String,
    #[command(flatten)]
    config: ConfigArgs,
}

/// Monitoring configuration: an optional TOML file plus per-field overrides.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// TOML file with a full or partial monitoring configuration.
    #[arg(long)]
    config_file: Option<String>,
    /// Comma-separated built-in indices, e.g. "ndvi,ndbi,bsi".
    #[arg(long, value_delimiter = ',')]
    indices: Option<Vec<String>>,
    #[arg(long)]
    sensitivity: Option<f64>,
    #[arg(long)]
    min_valid_fraction: Option<f64>,
    #[arg(long)]
    cadence_days: Option<u32>,
    #[arg(long)]
    window_days: Option<u32>,
}

impl ConfigArgs {
    fn is_empty(&self) -> bool {
        self.config_file.is_none()
            && self.indices.is_none()
            && self.sensitivity.is_none()
            && self.min_valid_fraction.is_none()
            && self.cadence_days.is_none()
            && self.window_days.is_none()
    }

    /// Build a configuration on top of `base`.
    fn apply(&self, base: MonitoringConfig) -> Result<MonitoringConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config_file {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => base,
        };
        if let Some(names) = &self.indices {
            config.indices = names
                .iter()
                .map(|n| n.parse::<IndexKind>())
                .collect::<Result<_, RelicError>>()?;
        }
        if let Some(v) = self.sensitivity {
            config.sensitivity = v;
        }
        if let Some(v) = self.min_valid_fraction {
            config.min_valid_fraction = v;
        }
        if let Some(v) = self.cadence_days {
            config.cadence_days = v;
        }
        if let Some(v) = self.window_days {
            config.window_days = v;
        }
        Ok(config)
    }
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Indices")]
    indices: String,
    #[tabled(rename = "Cadence (d)")]
    cadence: u32,
    #[tabled(rename = "Sensitivity")]
    sensitivity: String,
}

impl From<&Site> for SiteRow {
    fn from(site: &Site) -> Self {
        Self {
            id: site.id.to_string(),
            name: site.name.clone(),
            active: if site.active { "yes" } else { "no" }.to_string(),
            indices: site
                .config
                .monitored_indices()
                .iter()
                .map(|k| k.short_name().to_string())
                .collect::<Vec<_>>()
                .join(","),
            cadence: site.config.cadence_days,
            sensitivity: fmt_f64(site.config.sensitivity),
        }
    }
}

#[derive(Tabled, Serialize)]
struct PresetRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Lat")]
    lat: f64,
    #[tabled(rename = "Lon")]
    lon: f64,
    #[tabled(rename = "Buffer (km)")]
    buffer_km: f64,
    #[tabled(rename = "Description")]
    description: &'static str,
}

/// Run the site subcommand.
pub async fn run(cmd: &SiteCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    if let SiteCmd::Presets = cmd {
        let rows: Vec<PresetRow> = PRESETS
            .iter()
            .map(|p| PresetRow {
                key: p.key,
                name: p.name,
                lat: p.lat,
                lon: p.lon,
                buffer_km: p.buffer_km,
                description: p.description,
            })
            .collect();
        emit(ctx.format, &rows, &rows);
        return Ok(());
    }

    let registry = SiteRegistry::new(ctx.open_store()?);
    match cmd {
        SiteCmd::Add(args) => {
            let site = add(&registry, args).await?;
            print_site(ctx.format, &site);
        }
        SiteCmd::List { all } => {
            let sites = if *all {
                registry.list().await?
            } else {
                registry.get_active_sites().await?
            };
            let rows: Vec<SiteRow> = sites.iter().map(SiteRow::from).collect();
            emit(ctx.format, &rows, &sites);
        }
        SiteCmd::Show { id } => {
            let site = registry.get(&parse_site_id(id)?).await?;
            print_site(ctx.format, &site);
        }
        SiteCmd::Update { id, name, config } => {
            let id = parse_site_id(id)?;
            let current = registry.get(&id).await?;
            let update = SiteUpdate {
                name: name.clone(),
                config: if config.is_empty() {
                    None
                } else {
                    Some(config.apply(current.config.clone())?)
                },
                ..Default::default()
            };
            let site = registry.update(&id, update).await?;
            print_site(ctx.format, &site);
        }
        SiteCmd::Deactivate { id } => {
            let site = registry.deactivate(&parse_site_id(id)?).await?;
            println!("Site {} deactivated", site.id);
        }
        SiteCmd::Reactivate { id } => {
            let site = registry.reactivate(&parse_site_id(id)?).await?;
            println!("Site {} reactivated", site.id);
        }
        SiteCmd::Presets => {}
    }
    Ok(())
}

async fn add(registry: &SiteRegistry, args: &AddArgs) -> Result<Site, Box<dyn std::error::Error>> {
    let config = args.config.apply(MonitoringConfig::default())?;

    if let Some(key) = &args.preset {
        let mut site = registry.create_from_preset(key, config).await?;
        if let Some(name) = &args.name {
            site = registry
                .update(
                    &site.id,
                    SiteUpdate {
                        name: Some(name.clone()),
                        ..Default::default()
                    },
                )
                .await?;
        }
        return Ok(site);
    }

    let name = args
        .name
        .clone()
        .ok_or_else(|| RelicError::Validation("--name is required without --preset".to_string()))?;

    match (args.lat, args.lon, &args.geometry) {
        (Some(lat), Some(lon), None) => Ok(registry
            .create_from_point(&name, lat, lon, args.buffer_km, config)
            .await?),
        (None, None, Some(path)) => {
            let geometry: Polygon<f64> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            Ok(registry
                .create(NewSite {
                    name,
                    geometry,
                    crs: args.crs.clone(),
                    config,
                })
                .await?)
        }
        _ => Err(RelicError::Validation(
            "Give one of --preset, --lat/--lon, or --geometry".to_string(),
        )
        .into()),
    }
}

fn print_site(format: OutputFormat, site: &Site) {
    match format {
        OutputFormat::Json => println!("{}", format_json(site)),
        OutputFormat::Table => {
            println!("{}", crate::output::format_table(&[SiteRow::from(site)]));
            println!("CRS: {}", site.crs);
            println!("Created: {}", site.created_at.to_rfc3339());
            if let Some(at) = site.deactivated_at {
                println!("Deactivated: {}", at.to_rfc3339());
            }
            for index in site.config.monitored_indices() {
                println!("  {:<8} {}", index.short_name(), index.heritage_use());
            }
        }
    }
}
