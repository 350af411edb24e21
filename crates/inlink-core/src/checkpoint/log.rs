//! File-backed checkpoint store: `<job_id>.results.jsonl`, one line per append.
//!
//! Line format: `<sha256 hex of json> <json>\n` where json is a
//! [`CheckpointEntry`]. The checksum catches lines mangled on disk; the
//! newline terminator marks a line as fully written.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::config::InlinkConfig;
use crate::error::{JobError, JobResult};
use crate::job_store::JobId;
use crate::locks::KeyedLocks;
use crate::storage;

use super::types::{dedup_by_unit, CheckpointEntry, ResultRow};

/// Extension of a checkpoint log (`<job_id>.results.jsonl`).
const LOG_EXT: &str = ".results.jsonl";

/// Handle to the checkpoint logs.
///
/// Appends to one job are serialized by a per-job lock whose value caches the
/// raw row count of that job's log once it has been scanned.
pub struct CheckpointStore {
    dir: PathBuf,
    pub(crate) logs: KeyedLocks<Option<u64>>,
}

/// Borrowing twin of [`CheckpointEntry`]; serializes identically.
#[derive(Serialize)]
struct EntryRef<'a> {
    unit: u64,
    rows: &'a [ResultRow],
}

struct ParsedLog {
    entries: Vec<CheckpointEntry>,
    /// Byte length of the complete lines.
    valid_len: u64,
    torn_tail: bool,
}

impl ParsedLog {
    fn row_count(&self) -> u64 {
        self.entries.iter().map(|e| e.rows.len() as u64).sum()
    }
}

impl CheckpointStore {
    /// Open (or create) the store at `dir`. May share the directory with the
    /// record store.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create checkpoint dir: {}", dir.display()))?;
        Ok(CheckpointStore {
            dir,
            logs: KeyedLocks::new(),
        })
    }

    pub async fn open_default(cfg: &InlinkConfig) -> Result<Self> {
        Self::open(cfg.jobs_dir()?).await
    }

    fn log_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}{LOG_EXT}"))
    }

    /// Durably append the rows `unit` produced. Returns the total number of
    /// rows in the log afterwards (counting reprocessed units every time).
    ///
    /// An empty `rows` still records that the unit was processed.
    pub async fn append(&self, job_id: &JobId, unit: u64, rows: &[ResultRow]) -> JobResult<u64> {
        let lock = self.logs.get(job_id);
        let mut row_count = lock.lock().await;

        let line = encode_line(job_id, unit, rows)?;
        let path = self.log_path(job_id);
        let io_err = |e: std::io::Error| JobError::io(job_id, e);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        let base = match *row_count {
            Some(n) => n,
            None => {
                storage::sync_parent_dir(&path).await.map_err(io_err)?;
                let parsed = self.scan(job_id).await?;
                if parsed.torn_tail {
                    tracing::warn!(
                        job_id = %job_id,
                        valid_len = parsed.valid_len,
                        "truncating torn checkpoint tail"
                    );
                    file.set_len(parsed.valid_len).await.map_err(io_err)?;
                }
                parsed.row_count()
            }
        };

        // Cleared until the write lands: a failed write may leave a torn tail
        // that the next append must rescan and repair.
        *row_count = None;
        file.seek(SeekFrom::End(0)).await.map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.sync_data().await.map_err(io_err)?;

        let total = base + rows.len() as u64;
        *row_count = Some(total);
        tracing::trace!(job_id = %job_id, unit, rows = rows.len(), total, "checkpoint appended");
        Ok(total)
    }

    /// Raw number of rows appended so far, as [`append`](Self::append) counts them.
    pub async fn row_count(&self, job_id: &JobId) -> JobResult<u64> {
        let lock = self.logs.get(job_id);
        let row_count = lock.lock().await;
        match *row_count {
            Some(n) => Ok(n),
            None => Ok(self.scan(job_id).await?.row_count()),
        }
    }

    /// Result rows for a job with reprocessed units collapsed (latest attempt
    /// wins). A job with no log yet has no rows.
    pub async fn load(&self, job_id: &JobId) -> JobResult<Vec<ResultRow>> {
        Ok(dedup_by_unit(self.load_entries(job_id).await?))
    }

    /// Every complete entry in append order, duplicates included.
    pub async fn load_entries(&self, job_id: &JobId) -> JobResult<Vec<CheckpointEntry>> {
        let parsed = self.scan(job_id).await?;
        if parsed.torn_tail {
            tracing::debug!(job_id = %job_id, "ignoring incomplete checkpoint line");
        }
        Ok(parsed.entries)
    }

    /// Remove a job's log. Called only from `JobRecordStore::delete`.
    pub(crate) async fn delete(&self, job_id: &JobId) -> JobResult<()> {
        {
            let lock = self.logs.get(job_id);
            let mut row_count = lock.lock().await;
            storage::remove_if_exists(&self.log_path(job_id))
                .await
                .map_err(|e| JobError::io(job_id, e))?;
            *row_count = None;
        }
        self.logs.remove_if_idle(job_id);
        Ok(())
    }

    async fn scan(&self, job_id: &JobId) -> JobResult<ParsedLog> {
        let bytes = match tokio::fs::read(self.log_path(job_id)).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(JobError::io(job_id, e)),
        };
        parse_log(job_id, &bytes)
    }
}

fn encode_line(job_id: &JobId, unit: u64, rows: &[ResultRow]) -> JobResult<String> {
    let json = serde_json::to_string(&EntryRef { unit, rows })
        .map_err(|e| JobError::corrupt(job_id, format!("serialize unit {unit}: {e}")))?;
    let digest = hex::encode(Sha256::digest(json.as_bytes()));
    Ok(format!("{digest} {json}\n"))
}

fn decode_line(line: &[u8]) -> Result<CheckpointEntry, String> {
    let line = std::str::from_utf8(line).map_err(|e| e.to_string())?;
    let (digest, json) = line.split_once(' ').ok_or("missing checksum")?;
    if hex::encode(Sha256::digest(json.as_bytes())) != digest {
        return Err("checksum mismatch".to_string());
    }
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn parse_log(job_id: &JobId, bytes: &[u8]) -> JobResult<ParsedLog> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;
    while let Some(pos) = bytes[offset..].iter().position(|&b| b == b'\n') {
        line_no += 1;
        let entry = decode_line(&bytes[offset..offset + pos]).map_err(|reason| {
            JobError::corrupt(job_id, format!("checkpoint line {line_no}: {reason}"))
        })?;
        entries.push(entry);
        offset += pos + 1;
    }
    Ok(ParsedLog {
        entries,
        valid_len: offset as u64,
        torn_tail: offset < bytes.len(),
    })
}
