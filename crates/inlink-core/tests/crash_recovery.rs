//! Integration tests: restart after a process died mid-job.
//!
//! The "crashed" process is simulated by writing the stores directly, the way a
//! worker would have left them.

mod common;

use std::collections::BTreeSet;

use common::scripted::units_of;
use common::{id, start_manager, stores, ScriptedAnalyzer};
use inlink_core::job_store::{JobConfig, JobPatch, JobStatus};
use tempfile::tempdir;

#[tokio::test]
async fn running_job_is_paused_and_resumes_without_duplicates() {
    let dir = tempdir().unwrap();
    let analyzer = ScriptedAnalyzer::new(1).shared();
    let job = id("crashed");

    {
        let (records, checkpoints) = stores(dir.path()).await;
        records.create(job.clone(), 4, JobConfig::new()).await.unwrap();
        records
            .update(&job, JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        checkpoints.append(&job, 0, &analyzer.rows_for(0)).await.unwrap();
        records.update(&job, JobPatch::progress(1)).await.unwrap();
        // Died after appending unit 1 but before recording its progress.
        checkpoints.append(&job, 1, &analyzer.rows_for(1)).await.unwrap();
    }

    let (manager, report) = start_manager(dir.path(), &analyzer).await;
    assert_eq!(report.paused, vec![job.clone()]);
    let record = manager.get_status(&job).await.unwrap();
    assert_eq!(record.status, JobStatus::Paused);
    assert_eq!(record.completed_units, 1);
    // Recovery never starts a worker.
    assert!(manager.active_jobs().is_empty());
    assert!(analyzer.calls().is_empty());

    manager.resume(&job).await.unwrap();
    let done = manager.wait_idle(&job).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(analyzer.calls(), vec![1, 2, 3]);

    let rows = manager.load_partial_results(&job).await.unwrap();
    assert_eq!(units_of(&rows), vec![0, 1, 2, 3]);
    // The raw log still holds both attempts at unit 1.
    assert_eq!(manager.checkpoints().row_count(&job).await.unwrap(), 5);
}

#[tokio::test]
async fn scan_handles_queued_terminal_and_unreadable_records() {
    let dir = tempdir().unwrap();
    let analyzer = ScriptedAnalyzer::new(1).shared();
    let stranded = id("stranded");
    let running = id("running");
    let finished = id("finished");
    let paused = id("paused");

    {
        let (records, _) = stores(dir.path()).await;
        records
            .create(stranded.clone(), 2, JobConfig::new())
            .await
            .unwrap();
        records.create(running.clone(), 2, JobConfig::new()).await.unwrap();
        records
            .update(&running, JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        records.create(finished.clone(), 0, JobConfig::new()).await.unwrap();
        records
            .update(&finished, JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        records
            .update(&finished, JobPatch::status(JobStatus::Completed))
            .await
            .unwrap();
        records.create(paused.clone(), 2, JobConfig::new()).await.unwrap();
        records
            .update(&paused, JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        records
            .update(&paused, JobPatch::status(JobStatus::Paused))
            .await
            .unwrap();
    }
    std::fs::write(dir.path().join("garbled.json"), b"{ not a record").unwrap();

    let (manager, report) = start_manager(dir.path(), &analyzer).await;
    let recovered: BTreeSet<_> = report.paused.into_iter().collect();
    assert_eq!(recovered, BTreeSet::from([stranded.clone(), running.clone()]));

    assert_eq!(manager.get_status(&stranded).await.unwrap().status, JobStatus::Paused);
    assert_eq!(manager.get_status(&running).await.unwrap().status, JobStatus::Paused);
    assert_eq!(manager.get_status(&finished).await.unwrap().status, JobStatus::Completed);
    assert_eq!(manager.get_status(&paused).await.unwrap().status, JobStatus::Paused);

    // A stranded job can be stopped like any paused one.
    manager.stop(&stranded).await.unwrap();
    assert_eq!(manager.get_status(&stranded).await.unwrap().status, JobStatus::Stopped);

    // A second scan finds nothing left to recover.
    let (_, report) = start_manager(dir.path(), &analyzer).await;
    assert!(report.paused.is_empty());
}

#[tokio::test]
async fn torn_checkpoint_tail_is_repaired_on_resume() {
    let dir = tempdir().unwrap();
    let analyzer = ScriptedAnalyzer::new(2).shared();
    let job = id("torn");

    {
        let (records, checkpoints) = stores(dir.path()).await;
        records.create(job.clone(), 3, JobConfig::new()).await.unwrap();
        records
            .update(&job, JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        checkpoints.append(&job, 0, &analyzer.rows_for(0)).await.unwrap();
        records.update(&job, JobPatch::progress(1)).await.unwrap();
    }
    let log = dir.path().join("torn.results.jsonl");
    let mut bytes = std::fs::read(&log).unwrap();
    bytes.extend_from_slice(b"deadbeef {\"unit\":1,\"ro");
    std::fs::write(&log, bytes).unwrap();

    let (manager, _) = start_manager(dir.path(), &analyzer).await;
    assert_eq!(manager.load_partial_results(&job).await.unwrap().len(), 2);
    manager.resume(&job).await.unwrap();
    assert_eq!(manager.wait_idle(&job).await.unwrap().status, JobStatus::Completed);

    let rows = manager.load_partial_results(&job).await.unwrap();
    assert_eq!(units_of(&rows), vec![0, 0, 1, 1, 2, 2]);
}
