//! Foreground worker host shared by `submit` and `resume`.

use anyhow::{bail, Context as _, Result};
use inlink_core::analyzer::{CommandAnalyzer, PageAnalyzer};
use inlink_core::control::default_control_socket_path;
use inlink_core::host_lock::{default_host_lock_path, holder_pid, HostLock};
use inlink_core::job_store::{JobConfig, JobId, JobRecord, JobStatus};
use inlink_core::manager::JobManager;
use inlink_core::progress::ProgressStats;
use inlink_core::JobError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::control_socket;
use crate::cli::Context;

pub enum Start {
    Submit {
        job_id: JobId,
        total_units: u64,
        config: JobConfig,
    },
    Resume(JobId),
}

/// Run one job in this process until it completes, fails, stops or pauses.
///
/// Hosting needs the exclusive host lock: the holder runs recovery, serves
/// the control socket and is the only process that runs workers. Ctrl-C
/// requests a pause.
pub async fn host_job(ctx: &Context, start: Start) -> Result<()> {
    let lock_path = default_host_lock_path()?;
    let Some(host_lock) = HostLock::try_acquire(&lock_path)
        .with_context(|| format!("open host lock {}", lock_path.display()))?
    else {
        let holder = holder_pid(&lock_path)
            .map(|pid| format!(" (pid {pid})"))
            .unwrap_or_default();
        bail!(
            "another inlink process{holder} is already running jobs; \
             control it with `inlink pause`/`inlink stop` or wait for it to exit"
        );
    };
    let socket_path = default_control_socket_path()?;

    let analyzer: Arc<dyn PageAnalyzer> =
        Arc::new(CommandAnalyzer::from_config(&ctx.cfg.analyzer()));
    let (manager, recovered) = JobManager::start(
        Arc::clone(&ctx.records),
        Arc::clone(&ctx.checkpoints),
        analyzer,
    )
    .await?;
    for id in &recovered.paused {
        println!("Recovered interrupted job {id} as paused");
    }

    let (progress_tx, progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let progress_handle = tokio::spawn(print_progress(progress_rx, ctx.cfg.progress_interval()));
    let manager = manager
        .with_progress(progress_tx)
        .with_unit_delay(ctx.cfg.unit_delay());

    let listener = match control_socket::spawn_control_listener(manager.clone(), &socket_path) {
        Ok(handle) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("control socket unavailable: {:#}", e);
            None
        }
    };

    let outcome = run_hosted(&manager, start).await;

    // Only the process that bound the socket removes it.
    if let Some(handle) = listener {
        handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }
    progress_handle.abort();
    drop(host_lock);
    report(&outcome?)
}

async fn run_hosted(manager: &JobManager, start: Start) -> Result<JobRecord> {
    let job_id = match start {
        Start::Submit {
            job_id,
            total_units,
            config,
        } => {
            let job_id = manager.submit_with_id(job_id, total_units, config).await?;
            println!("Submitted job {job_id} ({total_units} pages)");
            job_id
        }
        Start::Resume(job_id) => {
            manager.resume(&job_id).await?;
            println!("Resumed job {job_id}");
            job_id
        }
    };

    let record = tokio::select! {
        record = manager.wait_idle(&job_id) => record?,
        _ = tokio::signal::ctrl_c() => {
            match manager.pause(&job_id).await {
                Ok(()) => println!("Pausing job {job_id} after the current page..."),
                // Finished in the meantime.
                Err(JobError::InvalidState { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            manager.wait_idle(&job_id).await?
        }
    };
    Ok(record)
}

async fn print_progress(mut rx: tokio::sync::mpsc::Receiver<ProgressStats>, interval: Duration) {
    let mut last_print: Option<Instant> = None;
    while let Some(stats) = rx.recv().await {
        let due = last_print.map_or(true, |t| t.elapsed() >= interval);
        if !due && stats.units_done < stats.total_units {
            continue;
        }
        let eta = stats
            .eta_secs()
            .map(|s| format!("{:.0}s", s))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {} / {} pages ({:.1}%)  {} rows  {} skipped  {:.2} pages/s  ETA {}",
            stats.units_done,
            stats.total_units,
            stats.fraction() * 100.0,
            stats.rows_appended,
            stats.skipped_units,
            stats.units_per_sec(),
            eta
        );
        last_print = Some(Instant::now());
    }
}

fn report(record: &JobRecord) -> Result<()> {
    println!(
        "Job {} {}: {}/{} pages, {} skipped",
        record.job_id,
        record.status,
        record.completed_units,
        record.total_units,
        record.skipped_units.len()
    );
    match record.status {
        JobStatus::Failed => bail!(
            "job {} failed: {}",
            record.job_id,
            record.last_error.as_deref().unwrap_or("unknown error")
        ),
        JobStatus::Paused => {
            println!("Run `inlink resume {}` to continue.", record.job_id);
            Ok(())
        }
        _ => Ok(()),
    }
}
