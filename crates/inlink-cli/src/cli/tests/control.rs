//! Tests for the control socket protocol.

use std::sync::Arc;
use std::time::Duration;

use inlink_core::analyzer::CommandAnalyzer;
use inlink_core::checkpoint::CheckpointStore;
use inlink_core::control::ControlRequest;
use inlink_core::job_store::{JobConfig, JobId, JobPatch, JobRecordStore, JobStatus};
use inlink_core::manager::JobManager;

use crate::cli::control_socket::{
    is_live, parse_request, request_line, send_request, spawn_control_listener,
};

fn id(s: &str) -> JobId {
    JobId::parse(s).unwrap()
}

#[test]
fn request_line_parses_back() {
    let line = request_line(ControlRequest::Stop, &id("job-7"));
    assert_eq!(line, "stop job-7\n");
    assert_eq!(parse_request(&line).unwrap(), (ControlRequest::Stop, id("job-7")));
    assert_eq!(
        parse_request("pause abc").unwrap(),
        (ControlRequest::Pause, id("abc"))
    );
}

#[test]
fn malformed_requests_are_rejected() {
    assert!(parse_request("pause").is_err());
    assert!(parse_request("cancel job1").is_err());
    assert!(parse_request("stop ../x").is_err());
}

#[tokio::test]
async fn socket_applies_requests_and_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let records = Arc::new(JobRecordStore::open(dir.path()).await.unwrap());
    let checkpoints = Arc::new(CheckpointStore::open(dir.path()).await.unwrap());
    let manager = JobManager::new(
        Arc::clone(&records),
        checkpoints,
        Arc::new(CommandAnalyzer::new(None, Duration::from_secs(1))),
    );

    let job = id("paused-job");
    records.create(job.clone(), 3, JobConfig::new()).await.unwrap();
    records
        .update(&job, JobPatch::status(JobStatus::Running))
        .await
        .unwrap();
    records
        .update(&job, JobPatch::status(JobStatus::Paused))
        .await
        .unwrap();

    let socket = dir.path().join("control.sock");
    assert!(!is_live(&socket).await);
    let handle = spawn_control_listener(manager, &socket).unwrap();
    assert!(is_live(&socket).await);

    let err = send_request(&socket, ControlRequest::Pause, &job)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("paused"), "{err}");

    let err = send_request(&socket, ControlRequest::Stop, &id("nope"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");

    send_request(&socket, ControlRequest::Stop, &job).await.unwrap();
    assert_eq!(records.get(&job).await.unwrap().status, JobStatus::Stopped);

    handle.abort();
}
