pub mod scripted;

use std::path::Path;
use std::sync::Arc;

use inlink_core::analyzer::PageAnalyzer;
use inlink_core::checkpoint::CheckpointStore;
use inlink_core::job_store::{JobId, JobRecordStore};
use inlink_core::manager::JobManager;
use inlink_core::recovery::RecoveryReport;

pub use scripted::ScriptedAnalyzer;

pub fn id(s: &str) -> JobId {
    JobId::parse(s).unwrap()
}

pub async fn stores(dir: &Path) -> (Arc<JobRecordStore>, Arc<CheckpointStore>) {
    let records = JobRecordStore::open(dir).await.unwrap();
    let checkpoints = CheckpointStore::open(dir).await.unwrap();
    (Arc::new(records), Arc::new(checkpoints))
}

/// Manager over `dir` after a recovery scan.
pub async fn start_manager(
    dir: &Path,
    analyzer: &Arc<ScriptedAnalyzer>,
) -> (JobManager, RecoveryReport) {
    let (records, checkpoints) = stores(dir).await;
    let analyzer: Arc<dyn PageAnalyzer> = analyzer.clone();
    JobManager::start(records, checkpoints, analyzer).await.unwrap()
}
