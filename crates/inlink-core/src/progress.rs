//! Progress reporting for jobs (units done, ETA, rate).
//!
//! The manager sends one snapshot per processed unit to an optional channel;
//! consumers (the CLI) render it.

use crate::job_store::JobId;

/// Snapshot of one job's progress after a unit (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub job_id: JobId,
    /// Units processed so far, across all runs of the job.
    pub units_done: u64,
    pub total_units: u64,
    /// Units processed by the current worker.
    pub units_this_run: u64,
    /// Rows appended to the checkpoint log so far (reprocessed units counted again).
    pub rows_appended: u64,
    /// Units skipped after a recoverable analyzer failure.
    pub skipped_units: u64,
    /// Elapsed time since the current worker started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Rate of the current run in units per second (0 if elapsed is 0).
    pub fn units_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.units_this_run as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0 and units remain).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_units.saturating_sub(self.units_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.units_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_units == 0 {
            return 1.0;
        }
        (self.units_done as f64 / self.total_units as f64).min(1.0)
    }
}
