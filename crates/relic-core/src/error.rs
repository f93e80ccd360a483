// crates/relic-core/src/error.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide error type for the Relic monitoring pipeline.
#[derive(Debug, Error)]
pub enum RelicError {
    /// Too few valid pixels (or no usable scenes) to produce an observation.
    /// Recoverable: the tick is skipped and the baseline is left alone.
    #[error("Insufficient data: valid fraction {valid_fraction:.3} below required {required:.3}")]
    InsufficientData {
        /// Valid-pixel fraction that was achieved (0.0 when nothing was usable).
        valid_fraction: f64,
        /// Minimum fraction required by the site configuration.
        required: f64,
    },

    /// Rejected input (malformed geometry, out-of-bounds configuration).
    /// Nothing is persisted when this is returned.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Observation older than the latest one already applied to the baseline.
    /// The caller must trigger a baseline recomputation.
    #[error("Out-of-order observation at {observed_at}: baseline already at {last_observation_at}")]
    OutOfOrderObservation {
        observed_at: DateTime<Utc>,
        last_observation_at: DateTime<Utc>,
    },

    /// Unexpected computation fault (malformed raster, missing band, grid mismatch).
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Storage layer error (RocksDB, in-memory store).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Imagery source failure (fetch, decode).
    #[error("Imagery source error: {0}")]
    Imagery(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Coarse classification of a [`RelicError`], recorded in the tick ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    Validation,
    OutOfOrderObservation,
    Pipeline,
    Storage,
    Serialization,
    Imagery,
    NotFound,
}

impl RelicError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelicError::InsufficientData { .. } => ErrorKind::InsufficientData,
            RelicError::Validation(_) => ErrorKind::Validation,
            RelicError::OutOfOrderObservation { .. } => ErrorKind::OutOfOrderObservation,
            RelicError::Pipeline(_) => ErrorKind::Pipeline,
            RelicError::Storage(_) => ErrorKind::Storage,
            RelicError::Serialization(_) => ErrorKind::Serialization,
            RelicError::Imagery(_) => ErrorKind::Imagery,
            RelicError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Shorthand for an `InsufficientData` error when nothing was usable at all.
    pub fn no_data(required: f64) -> Self {
        RelicError::InsufficientData {
            valid_fraction: 0.0,
            required,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::Validation => "validation",
            ErrorKind::OutOfOrderObservation => "out_of_order",
            ErrorKind::Pipeline => "pipeline",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Imagery => "imagery",
            ErrorKind::NotFound => "not_found",
        };
        write!(f, "{}", s)
    }
}

impl From<serde_json::Error> for RelicError {
    fn from(e: serde_json::Error) -> Self {
        RelicError::Serialization(e.to_string())
    }
}
