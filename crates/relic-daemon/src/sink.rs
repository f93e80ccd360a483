// crates/relic-daemon/src/sink.rs
//
// Alert sinks shipped with the daemon.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use relic_core::traits::AlertSink;
use relic_core::{ChangeEvent, RelicError};

/// Writes every change event to the log at WARN.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn emit(&self, event: ChangeEvent) -> Result<(), RelicError> {
        tracing::warn!(
            event_id = %event.id,
            site_id = %event.site_id,
            index = %event.index,
            observed_at = %event.observed_at,
            value = event.value,
            baseline_mean = event.baseline_mean,
            z_score = event.z_score,
            affected_fraction = event.affected_fraction,
            severity = ?event.severity,
            direction = ?event.direction,
            "ALERT"
        );
        Ok(())
    }
}

/// Appends every change event as one JSON line to a file.
pub struct JsonlAlertSink {
    path: PathBuf,
    /// Serialises appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlAlertSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AlertSink for JsonlAlertSink {
    async fn emit(&self, event: ChangeEvent) -> Result<(), RelicError> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| RelicError::Storage(format!("Failed to open {}: {}", self.path.display(), e)))?;
        file.write_all(&line)
            .await
            .map_err(|e| RelicError::Storage(format!("Failed to append to {}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| RelicError::Storage(format!("Failed to flush {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}
