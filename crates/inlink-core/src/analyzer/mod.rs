//! The page analyzer seam: one call per unit of a job.

mod command;

pub use command::{CommandAnalyzer, FATAL_EXIT_CODE};

use async_trait::async_trait;

use crate::checkpoint::ResultRow;
use crate::job_store::{JobConfig, JobId};

/// Descriptor of the unit being analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub job_id: JobId,
    /// 0-based position within the job.
    pub index: u64,
    pub total: u64,
}

/// Failure of a single `process` call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzeError {
    /// The unit is skipped; the job continues with the next one.
    #[error("unit skipped: {0}")]
    Recoverable(String),
    /// The job cannot continue and is marked Failed.
    #[error("fatal analyzer error: {0}")]
    Fatal(String),
}

impl AnalyzeError {
    pub fn recoverable(reason: impl Into<String>) -> Self {
        AnalyzeError::Recoverable(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        AnalyzeError::Fatal(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalyzeError::Fatal(_))
    }
}

/// Produces result rows for one unit.
///
/// A unit can be processed more than once (after a crash between the
/// checkpoint append and the progress write), so implementations must not
/// assume each index is seen exactly once.
#[async_trait]
pub trait PageAnalyzer: Send + Sync {
    async fn process(&self, unit: &Unit, config: &JobConfig) -> Result<Vec<ResultRow>, AnalyzeError>;
}
