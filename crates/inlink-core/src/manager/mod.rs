//! Job manager: lifecycle state machine and worker supervision.
//!
//! ```text
//! submit ──► Queued ──► Running ──► Completed | Failed | Stopped
//!                        ▲   │
//!               resume   │   ▼  pause (at next unit boundary)
//!                        Paused ──► Stopped
//! ```
//!
//! Control calls decide under the job's record lock (`update_with`); the worker
//! checks its token under the same lock at every unit boundary, so a request is
//! either observed by the worker or rejected, never lost.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::analyzer::PageAnalyzer;
use crate::checkpoint::{CheckpointStore, ResultRow};
use crate::control::JobControl;
use crate::error::{JobError, JobResult};
use crate::job_store::{JobConfig, JobId, JobPatch, JobRecord, JobRecordStore, JobStatus};
use crate::progress::ProgressStats;
use crate::recovery::{RecoveryReport, RecoveryScanner};
use crate::retention;

use worker::WorkerContext;

/// Entry point for submitting and controlling jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobManager {
    records: Arc<JobRecordStore>,
    checkpoints: Arc<CheckpointStore>,
    analyzer: Arc<dyn PageAnalyzer>,
    control: Arc<JobControl>,
    progress_tx: Option<mpsc::Sender<ProgressStats>>,
    unit_delay: Duration,
}

impl JobManager {
    /// Manager over existing stores. Callers that host workers should prefer
    /// [`start`](Self::start), which runs crash recovery first.
    pub fn new(
        records: Arc<JobRecordStore>,
        checkpoints: Arc<CheckpointStore>,
        analyzer: Arc<dyn PageAnalyzer>,
    ) -> Self {
        Self {
            records,
            checkpoints,
            analyzer,
            control: Arc::new(JobControl::new()),
            progress_tx: None,
            unit_delay: Duration::ZERO,
        }
    }

    /// Run the recovery scan, then build the manager.
    pub async fn start(
        records: Arc<JobRecordStore>,
        checkpoints: Arc<CheckpointStore>,
        analyzer: Arc<dyn PageAnalyzer>,
    ) -> JobResult<(Self, RecoveryReport)> {
        let report = RecoveryScanner::new(Arc::clone(&records)).run().await?;
        Ok((Self::new(records, checkpoints, analyzer), report))
    }

    /// Send a [`ProgressStats`] snapshot after every unit. Snapshots are
    /// dropped when the channel is full.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Pause between consecutive analyzer calls of one worker.
    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    pub fn records(&self) -> &JobRecordStore {
        &self.records
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn control(&self) -> &Arc<JobControl> {
        &self.control
    }

    /// Create a job under a fresh id and start its worker. Returns as soon as
    /// the job is Running.
    pub async fn submit(&self, total_units: u64, config: JobConfig) -> JobResult<JobId> {
        self.submit_with_id(JobId::generate(), total_units, config)
            .await
    }

    /// Like [`submit`](Self::submit) with a caller-chosen id.
    pub async fn submit_with_id(
        &self,
        job_id: JobId,
        total_units: u64,
        config: JobConfig,
    ) -> JobResult<JobId> {
        self.records
            .create(job_id.clone(), total_units, config)
            .await?;
        self.spawn_worker(&job_id, JobStatus::Queued, "start").await?;
        Ok(job_id)
    }

    /// Continue a Paused job from its saved progress.
    pub async fn resume(&self, job_id: &JobId) -> JobResult<()> {
        self.spawn_worker(job_id, JobStatus::Paused, "resume")
            .await?;
        Ok(())
    }

    /// Ask the job's worker to pause at the next unit boundary.
    ///
    /// The job stays Running until the worker gets there; use
    /// [`wait_idle`](Self::wait_idle) to observe the Paused state.
    pub async fn pause(&self, job_id: &JobId) -> JobResult<()> {
        let control = &self.control;
        self.records
            .update_with(job_id, |current| {
                if current.status != JobStatus::Running {
                    return Err(JobError::invalid_state(job_id, current.status, "pause"));
                }
                if !control.request_pause(job_id) {
                    return Err(JobError::invalid_state(
                        job_id,
                        current.status,
                        "pause without an active worker in this process",
                    ));
                }
                Ok(None)
            })
            .await?;
        tracing::info!(job_id = %job_id, "pause requested");
        Ok(())
    }

    /// Stop a job for good. A Running job's worker stops at the next unit
    /// boundary; a Paused job is marked Stopped immediately.
    pub async fn stop(&self, job_id: &JobId) -> JobResult<()> {
        let control = &self.control;
        let record = self
            .records
            .update_with(job_id, |current| match current.status {
                JobStatus::Running => {
                    if control.request_stop(job_id) {
                        Ok(None)
                    } else {
                        Err(JobError::invalid_state(
                            job_id,
                            current.status,
                            "stop without an active worker in this process",
                        ))
                    }
                }
                JobStatus::Paused => Ok(Some(JobPatch::status(JobStatus::Stopped))),
                status => Err(JobError::invalid_state(job_id, status, "stop")),
            })
            .await?;
        if record.status == JobStatus::Stopped {
            tracing::info!(job_id = %job_id, completed_units = record.completed_units, "job stopped");
        } else {
            tracing::info!(job_id = %job_id, "stop requested");
        }
        Ok(())
    }

    /// Remove a terminal job and its results.
    pub async fn delete(&self, job_id: &JobId) -> JobResult<()> {
        self.records.delete(job_id, &self.checkpoints).await
    }

    pub async fn get_status(&self, job_id: &JobId) -> JobResult<JobRecord> {
        self.records.get(job_id).await
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> JobResult<Vec<JobRecord>> {
        self.records.list().await
    }

    /// Rows produced so far, with reprocessed units collapsed.
    pub async fn load_partial_results(&self, job_id: &JobId) -> JobResult<Vec<ResultRow>> {
        self.records.get(job_id).await?;
        self.checkpoints.load(job_id).await
    }

    /// Wait until the job has no active worker in this process, then return
    /// its record. Returns immediately when no worker is running.
    pub async fn wait_idle(&self, job_id: &JobId) -> JobResult<JobRecord> {
        if let Some(mut done) = self.control.done_receiver(job_id) {
            // An error means the sender is gone, which also means the worker is.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.records.get(job_id).await
    }

    /// Jobs with a live worker in this process.
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.control.active_jobs()
    }

    /// Delete terminal jobs created more than `max_age` ago.
    pub async fn purge_expired(&self, max_age: Duration) -> JobResult<Vec<JobId>> {
        retention::purge_expired(&self.records, &self.checkpoints, max_age).await
    }

    /// Move the job from `from` to Running and hand it to a new worker task.
    /// The worker is registered under the record lock, before Running is
    /// visible, so control calls always find it.
    async fn spawn_worker(
        &self,
        job_id: &JobId,
        from: JobStatus,
        action: &str,
    ) -> JobResult<JobRecord> {
        let control = &self.control;
        let mut guard = None;
        let record = self
            .records
            .update_with(job_id, |current| {
                if current.status != from {
                    return Err(JobError::invalid_state(job_id, current.status, action));
                }
                guard = Some(control.register(job_id));
                Ok(Some(JobPatch::status(JobStatus::Running)))
            })
            .await?;
        let guard =
            guard.ok_or_else(|| JobError::invalid_state(job_id, record.status, action))?;

        tracing::info!(
            job_id = %job_id,
            from = %from,
            completed_units = record.completed_units,
            total_units = record.total_units,
            "worker started"
        );
        tokio::spawn(worker::run_worker(self.worker_context(), record.clone(), guard));
        Ok(record)
    }

    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            records: Arc::clone(&self.records),
            checkpoints: Arc::clone(&self.checkpoints),
            analyzer: Arc::clone(&self.analyzer),
            progress_tx: self.progress_tx.clone(),
            unit_delay: self.unit_delay,
        }
    }
}
