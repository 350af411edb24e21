//! Worker task: drives one job through its remaining units.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::analyzer::{AnalyzeError, PageAnalyzer, Unit};
use crate::checkpoint::CheckpointStore;
use crate::control::{ControlToken, WorkerGuard};
use crate::error::JobError;
use crate::job_store::{JobPatch, JobRecord, JobRecordStore, JobStatus};
use crate::progress::ProgressStats;

pub(super) struct WorkerContext {
    pub records: Arc<JobRecordStore>,
    pub checkpoints: Arc<CheckpointStore>,
    pub analyzer: Arc<dyn PageAnalyzer>,
    pub progress_tx: Option<mpsc::Sender<ProgressStats>>,
    pub unit_delay: Duration,
}

/// Why a worker gave up on its job.
#[derive(Debug, thiserror::Error)]
enum WorkerFailure {
    #[error("unit {unit}: {source}")]
    Analyzer {
        unit: u64,
        #[source]
        source: AnalyzeError,
    },
    #[error(transparent)]
    Store(#[from] JobError),
}

/// Run the job to a boundary exit (Paused/Stopped), completion or failure.
/// The guard is released only after the final status is durable, including
/// when the analyzer panics.
pub(super) async fn run_worker(ctx: WorkerContext, record: JobRecord, guard: WorkerGuard) {
    let job_id = record.job_id.clone();
    let records = Arc::clone(&ctx.records);
    let token = Arc::clone(guard.token());
    let outcome = tokio::spawn(async move { drive(&ctx, record, &token).await }).await;

    let failure = match outcome {
        Ok(Ok(last)) => {
            tracing::info!(
                job_id = %job_id,
                status = %last.status,
                completed_units = last.completed_units,
                skipped = last.skipped_units.len(),
                "worker finished"
            );
            None
        }
        Ok(Err(failure)) => Some(failure.to_string()),
        Err(join) if join.is_panic() => Some(format!(
            "worker panicked: {}",
            panic_message(join.into_panic())
        )),
        Err(_) => Some("worker task was cancelled".to_string()),
    };

    if let Some(reason) = failure {
        tracing::error!(job_id = %job_id, error = %reason, "job failed");
        if let Err(e) = records.update(&job_id, JobPatch::failed(reason)).await {
            tracing::error!(job_id = %job_id, error = %e, "could not record job failure");
        }
    }
    drop(guard);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn drive(
    ctx: &WorkerContext,
    mut record: JobRecord,
    token: &ControlToken,
) -> Result<JobRecord, WorkerFailure> {
    let job_id = record.job_id.clone();
    let total = record.total_units;
    let started = Instant::now();
    let mut units_this_run = 0u64;
    let mut rows_appended = ctx.checkpoints.row_count(&job_id).await?;

    while record.completed_units < total {
        // Unit boundary: honor a pending pause/stop under the record lock.
        record = ctx
            .records
            .update_with(&job_id, |_| {
                Ok(token
                    .pending()
                    .map(|request| JobPatch::status(request.target_status())))
            })
            .await?;
        if record.status != JobStatus::Running {
            return Ok(record);
        }

        let index = record.completed_units;
        let unit = Unit {
            job_id: job_id.clone(),
            index,
            total,
        };
        let patch = match ctx.analyzer.process(&unit, &record.config).await {
            Ok(rows) => {
                rows_appended = ctx.checkpoints.append(&job_id, index, &rows).await?;
                JobPatch::progress(index + 1)
            }
            Err(AnalyzeError::Recoverable(reason)) => {
                tracing::warn!(job_id = %job_id, unit = index, %reason, "unit skipped");
                JobPatch::progress(index + 1).with_skipped(index)
            }
            Err(source @ AnalyzeError::Fatal(_)) => {
                return Err(WorkerFailure::Analyzer {
                    unit: index,
                    source,
                });
            }
        };
        record = ctx.records.update(&job_id, patch).await?;
        units_this_run += 1;

        if let Some(tx) = &ctx.progress_tx {
            let _ = tx.try_send(ProgressStats {
                job_id: job_id.clone(),
                units_done: record.completed_units,
                total_units: total,
                units_this_run,
                rows_appended,
                skipped_units: record.skipped_units.len() as u64,
                elapsed_secs: started.elapsed().as_secs_f64(),
            });
        }

        if record.completed_units < total && !ctx.unit_delay.is_zero() {
            tokio::time::sleep(ctx.unit_delay).await;
        }
    }

    Ok(ctx
        .records
        .update(&job_id, JobPatch::status(JobStatus::Completed))
        .await?)
}
