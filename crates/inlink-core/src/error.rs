//! Error taxonomy shared by the stores and the job manager.

use crate::job_store::{JobId, JobStatus};

/// Errors returned by the job stores and the control surface.
///
/// Unit-level analyzer failures are not part of this type; see
/// [`crate::analyzer::AnalyzeError`].
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} already exists")]
    AlreadyExists(JobId),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {job_id} is {status}; cannot {action}")]
    InvalidState {
        job_id: JobId,
        status: JobStatus,
        action: String,
    },

    #[error("invalid job id {0:?}: use 1-128 characters from [A-Za-z0-9_-]")]
    InvalidJobId(String),

    #[error("job {job_id}: completed_units {requested} out of range (current {current}, total {total})")]
    ProgressOutOfRange {
        job_id: JobId,
        current: u64,
        requested: u64,
        total: u64,
    },

    #[error("job {job_id}: storage I/O failed: {source}")]
    Io {
        job_id: JobId,
        #[source]
        source: std::io::Error,
    },

    #[error("job {job_id}: stored data is corrupt: {reason}")]
    Corrupt { job_id: JobId, reason: String },

    /// Directory-level failure not tied to one job (e.g. listing).
    #[error("job store I/O failed: {0}")]
    Store(#[source] std::io::Error),
}

impl JobError {
    pub(crate) fn invalid_state(job_id: &JobId, status: JobStatus, action: impl Into<String>) -> Self {
        JobError::InvalidState {
            job_id: job_id.clone(),
            status,
            action: action.into(),
        }
    }

    pub(crate) fn io(job_id: &JobId, source: std::io::Error) -> Self {
        JobError::Io {
            job_id: job_id.clone(),
            source,
        }
    }

    pub(crate) fn corrupt(job_id: &JobId, reason: impl Into<String>) -> Self {
        JobError::Corrupt {
            job_id: job_id.clone(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by the durable stores themselves (disk, parse),
    /// as opposed to caller mistakes.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            JobError::Io { .. } | JobError::Corrupt { .. } | JobError::Store(_)
        )
    }
}

pub type JobResult<T> = std::result::Result<T, JobError>;
