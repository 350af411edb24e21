//! Job write operations: create, update, recover, delete.

use crate::checkpoint::CheckpointStore;
use crate::error::{JobError, JobResult};
use crate::storage;

use super::super::store::{unix_timestamp, JobRecordStore};
use super::super::types::{JobConfig, JobId, JobPatch, JobRecord, JobStatus};

impl JobRecordStore {
    /// Persist a new Queued record with no progress.
    pub async fn create(
        &self,
        job_id: JobId,
        total_units: u64,
        config: JobConfig,
    ) -> JobResult<JobRecord> {
        let lock = self.locks.get(&job_id);
        let _guard = lock.lock().await;

        let exists = tokio::fs::try_exists(self.record_path(&job_id))
            .await
            .map_err(|e| JobError::io(&job_id, e))?;
        if exists {
            return Err(JobError::AlreadyExists(job_id));
        }

        let record = JobRecord::new_queued(job_id, total_units, config, unix_timestamp());
        self.write_record(&record).await?;
        tracing::info!(job_id = %record.job_id, total_units, "job created");
        Ok(record)
    }

    /// Read-modify-write of the fields present in `patch`.
    pub async fn update(&self, job_id: &JobId, patch: JobPatch) -> JobResult<JobRecord> {
        self.update_with(job_id, move |_| Ok(Some(patch))).await
    }

    /// Like [`update`](Self::update), but the patch is derived from the current
    /// record while the job's lock is held. Returning `Ok(None)` writes nothing;
    /// returning an error writes nothing and passes the error through.
    ///
    /// Returns the record as it stands after the call.
    pub async fn update_with<F>(&self, job_id: &JobId, f: F) -> JobResult<JobRecord>
    where
        F: FnOnce(&JobRecord) -> JobResult<Option<JobPatch>> + Send,
    {
        let lock = self.locks.get(job_id);
        let _guard = lock.lock().await;

        let current = self.get(job_id).await?;
        let Some(patch) = f(&current)? else {
            return Ok(current);
        };
        let next = current.apply(&patch, unix_timestamp())?;
        self.write_record(&next).await?;
        if next.status != current.status {
            tracing::debug!(
                job_id = %job_id,
                from = %current.status,
                to = %next.status,
                "job status changed"
            );
        }
        Ok(next)
    }

    /// Move a job abandoned by a dead process (Running, or Queued before its
    /// worker started) to Paused. Returns the new record, or `None` if the job
    /// was in any other state.
    ///
    /// This is the only write that bypasses the transition table.
    pub async fn recover_abandoned(&self, job_id: &JobId) -> JobResult<Option<JobRecord>> {
        let lock = self.locks.get(job_id);
        let _guard = lock.lock().await;

        let mut record = self.get(job_id).await?;
        if !matches!(record.status, JobStatus::Running | JobStatus::Queued) {
            return Ok(None);
        }
        record.status = JobStatus::Paused;
        record.updated_at = unix_timestamp();
        self.write_record(&record).await?;
        Ok(Some(record))
    }

    /// Remove a terminal job together with its checkpoint log.
    ///
    /// The log goes first: a crash in between leaves a terminal record with no
    /// results, and deleting again finishes the job.
    pub async fn delete(&self, job_id: &JobId, checkpoints: &CheckpointStore) -> JobResult<()> {
        let status = {
            let lock = self.locks.get(job_id);
            let _guard = lock.lock().await;

            let record = self.get(job_id).await?;
            if !record.status.is_terminal() {
                return Err(JobError::invalid_state(job_id, record.status, "delete"));
            }
            checkpoints.delete(job_id).await?;
            storage::remove_if_exists(&self.record_path(job_id))
                .await
                .map_err(|e| JobError::io(job_id, e))?;
            record.status
        };
        self.locks.remove_if_idle(job_id);
        tracing::info!(job_id = %job_id, %status, "job deleted");
        Ok(())
    }
}
