//! Removal of old terminal jobs.

use std::time::Duration;

use crate::checkpoint::CheckpointStore;
use crate::error::{JobError, JobResult};
use crate::job_store::{unix_timestamp, JobId, JobRecordStore};

/// Delete terminal jobs created more than `max_age` ago. Queued, Running and
/// Paused jobs are kept whatever their age. Returns the deleted ids.
pub async fn purge_expired(
    records: &JobRecordStore,
    checkpoints: &CheckpointStore,
    max_age: Duration,
) -> JobResult<Vec<JobId>> {
    let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    purge_created_before(records, checkpoints, unix_timestamp().saturating_sub(max_age)).await
}

/// Delete terminal jobs whose `created_at` is before `cutoff` (Unix seconds).
pub async fn purge_created_before(
    records: &JobRecordStore,
    checkpoints: &CheckpointStore,
    cutoff: i64,
) -> JobResult<Vec<JobId>> {
    let mut deleted = Vec::new();
    for record in records.list().await? {
        if !record.status.is_terminal() || record.created_at >= cutoff {
            continue;
        }
        match records.delete(&record.job_id, checkpoints).await {
            Ok(()) => deleted.push(record.job_id),
            // Removed concurrently.
            Err(JobError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    if !deleted.is_empty() {
        tracing::info!(count = deleted.len(), cutoff, "purged expired jobs");
    }
    Ok(deleted)
}
