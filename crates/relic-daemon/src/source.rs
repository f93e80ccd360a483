// crates/relic-daemon/src/source.rs
//
// Directory-backed imagery source.
//
// Scenes are JSON files laid out as `<root>/<site_id>/<anything>.json`, each
// holding one serialized `Scene` with reflectance already scaled to 0..1.
// A separate downloader is expected to populate the tree; the daemon only
// reads it.

use std::path::PathBuf;

use async_trait::async_trait;

use relic_core::traits::ImagerySource;
use relic_core::{AreaOfInterest, DateRange, RelicError, Scene};

pub struct DirectoryImagerySource {
    root: PathBuf,
}

impl DirectoryImagerySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImagerySource for DirectoryImagerySource {
    async fn fetch(&self, area: &AreaOfInterest, range: DateRange) -> Result<Vec<Scene>, RelicError> {
        let dir = self.root.join(area.site_id.to_string());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(site_id = %area.site_id, dir = %dir.display(), "No imagery directory");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(RelicError::Imagery(format!(
                    "Failed to list {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut scenes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RelicError::Imagery(format!("Failed to list {}: {}", dir.display(), e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|x| x.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| RelicError::Imagery(format!("Failed to read {}: {}", path.display(), e)))?;
            let scene: Scene = match serde_json::from_slice(&bytes) {
                Ok(scene) => scene,
                Err(e) => {
                    // One bad file should not hide the rest of the window.
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable scene");
                    continue;
                }
            };
            if scene.site_id != area.site_id {
                tracing::warn!(path = %path.display(), scene_site = %scene.site_id, "Scene filed under the wrong site");
                continue;
            }
            if range.contains(scene.acquired_at) {
                scenes.push(scene);
            }
        }

        tracing::debug!(site_id = %area.site_id, scenes = scenes.len(), "Scenes loaded from directory");
        Ok(scenes)
    }
}
