//! File-backed job record store: directory handling, paths, raw record I/O.
//!
//! Job CRUD lives in `jobs`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::InlinkConfig;
use crate::error::{JobError, JobResult};
use crate::locks::KeyedLocks;
use crate::storage;

use super::types::{JobId, JobRecord};

/// Extension of a record file (`<job_id>.json`).
pub(crate) const RECORD_EXT: &str = ".json";

/// Handle to the job record directory.
///
/// Every record is one pretty-printed JSON file. Updates to the same job are
/// serialized with a per-job lock; reads take no lock and rely on the atomic
/// replace performed by [`storage::write_atomic`].
pub struct JobRecordStore {
    dir: PathBuf,
    pub(crate) locks: KeyedLocks<()>,
}

impl JobRecordStore {
    /// Open (or create) the store at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create jobs dir: {}", dir.display()))?;
        Ok(JobRecordStore {
            dir,
            locks: KeyedLocks::new(),
        })
    }

    /// Open the store in the configured jobs directory
    /// (`~/.local/state/inlink/jobs` unless overridden).
    pub async fn open_default(cfg: &InlinkConfig) -> Result<Self> {
        Self::open(cfg.jobs_dir()?).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn record_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}{RECORD_EXT}"))
    }

    /// Read a record file; `None` if it does not exist.
    pub(crate) async fn read_record(&self, job_id: &JobId) -> JobResult<Option<JobRecord>> {
        let path = self.record_path(job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(JobError::io(job_id, e)),
        };
        let record: JobRecord = serde_json::from_slice(&bytes)
            .map_err(|e| JobError::corrupt(job_id, format!("{}: {e}", path.display())))?;
        if &record.job_id != job_id {
            return Err(JobError::corrupt(
                job_id,
                format!("{} holds job {}", path.display(), record.job_id),
            ));
        }
        Ok(Some(record))
    }

    /// Persist a full record. Callers must hold the job's lock.
    pub(crate) async fn write_record(&self, record: &JobRecord) -> JobResult<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| JobError::corrupt(&record.job_id, format!("serialize: {e}")))?;
        storage::write_atomic(&self.record_path(&record.job_id), &json)
            .await
            .map_err(|e| JobError::io(&record.job_id, e))
    }
}

/// Current time as Unix seconds (for record timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
