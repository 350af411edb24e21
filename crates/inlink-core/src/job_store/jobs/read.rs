//! Job read operations: get and list.

use crate::error::{JobError, JobResult};
use crate::storage;

use super::super::store::{JobRecordStore, RECORD_EXT};
use super::super::types::{JobId, JobRecord};

impl JobRecordStore {
    /// Current snapshot of one job.
    pub async fn get(&self, job_id: &JobId) -> JobResult<JobRecord> {
        self.read_record(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    /// All readable records, newest first.
    ///
    /// Temp files, checkpoint logs and records that fail to parse are skipped
    /// (the latter with a warning) so one bad file never hides the others.
    pub async fn list(&self) -> JobResult<Vec<JobRecord>> {
        let mut entries = tokio::fs::read_dir(self.dir())
            .await
            .map_err(JobError::Store)?;

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(JobError::Store)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if storage::is_temp_name(name) {
                continue;
            }
            let Some(stem) = name.strip_suffix(RECORD_EXT) else {
                continue;
            };
            let Ok(job_id) = JobId::parse(stem) else {
                continue;
            };
            match self.read_record(&job_id).await {
                Ok(Some(record)) => out.push(record),
                // Deleted between read_dir and read.
                Ok(None) => {}
                Err(e) => tracing::warn!(job_id = %job_id, "skipping unreadable job record: {}", e),
            }
        }

        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.job_id.cmp(&a.job_id))
        });
        Ok(out)
    }
}
