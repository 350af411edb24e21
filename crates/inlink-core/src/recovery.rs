//! Startup scan for jobs abandoned by a process that died mid-run.

use std::sync::Arc;

use crate::error::JobResult;
use crate::job_store::{JobId, JobRecordStore, JobStatus};

/// Jobs moved to Paused by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub paused: Vec<JobId>,
}

/// Must run before any job is submitted or resumed in this process: no worker
/// exists yet, so every Running record belongs to a dead one.
///
/// Recovered jobs are left Paused; resuming them is an explicit decision.
pub struct RecoveryScanner {
    records: Arc<JobRecordStore>,
}

impl RecoveryScanner {
    pub fn new(records: Arc<JobRecordStore>) -> Self {
        Self { records }
    }

    pub async fn run(&self) -> JobResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for record in self.records.list().await? {
            if !matches!(record.status, JobStatus::Running | JobStatus::Queued) {
                continue;
            }
            match self.records.recover_abandoned(&record.job_id).await {
                Ok(Some(recovered)) => {
                    tracing::info!(
                        job_id = %recovered.job_id,
                        was = %record.status,
                        completed_units = recovered.completed_units,
                        total_units = recovered.total_units,
                        "recovered abandoned job as paused"
                    );
                    report.paused.push(recovered.job_id);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(job_id = %record.job_id, error = %e, "could not recover job");
                }
            }
        }
        if !report.paused.is_empty() {
            tracing::info!(count = report.paused.len(), "recovery scan finished");
        }
        Ok(report)
    }
}
