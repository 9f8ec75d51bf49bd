//! Clock utilities for the export pipeline.
//!
//! Every export is anchored to a monotonic epoch captured when the
//! orchestrator starts the run; elapsed time and the wall-clock start
//! are reported from it.

use std::time::Instant;

/// A clock anchored to the moment an export started.
#[derive(Debug, Clone)]
pub struct ExportClock {
    /// The instant the export started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string), for diagnostics.
    epoch_wall: String,
}

impl ExportClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since the export started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at export start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}
