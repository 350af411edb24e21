//! Types used by the job record store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{JobError, JobResult};

const MAX_JOB_ID_LEN: usize = 128;

/// Job identifier. Always usable as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// New random id (UUID v4, simple form).
    pub fn generate() -> Self {
        JobId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Validate a caller-supplied id.
    pub fn parse(s: impl Into<String>) -> JobResult<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= MAX_JOB_ID_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(JobId(s))
        } else {
            Err(JobError::InvalidJobId(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobId::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = JobError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        JobId::parse(s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Lifecycle status, stored as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    /// Completed, Failed and Stopped admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Edges of the lifecycle state machine:
    /// `Queued → Running ⇄ Paused`, `Running → {Completed, Failed, Stopped}`, `Paused → Stopped`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Stopped)
                | (Paused, Stopped)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "stopped" => Ok(JobStatus::Stopped),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

/// Opaque per-job configuration snapshot, fixed at creation.
///
/// The core never interprets it; it is handed to the analyzer with every unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConfig(BTreeMap<String, serde_json::Value>);

impl JobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for assembling a config before submission.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, serde_json::Value)> for JobConfig {
    fn from_iter<I: IntoIterator<Item = (K, serde_json::Value)>>(iter: I) -> Self {
        JobConfig(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Durable job metadata, one file per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_units: u64,
    pub completed_units: u64,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds; refreshed on every write.
    pub updated_at: i64,
    pub config: JobConfig,
    /// Set only when the job is Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Units whose analysis failed recoverably, in processing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_units: Vec<u64>,
}

impl JobRecord {
    pub(crate) fn new_queued(job_id: JobId, total_units: u64, config: JobConfig, now: i64) -> Self {
        JobRecord {
            job_id,
            status: JobStatus::Queued,
            total_units,
            completed_units: 0,
            created_at: now,
            updated_at: now,
            config,
            last_error: None,
            skipped_units: Vec::new(),
        }
    }

    pub fn remaining_units(&self) -> u64 {
        self.total_units.saturating_sub(self.completed_units)
    }

    /// Apply `patch` and return the resulting record, or the reason it is illegal.
    /// Nothing is applied unless every field of the patch is valid.
    pub fn apply(&self, patch: &JobPatch, now: i64) -> JobResult<JobRecord> {
        let mut next = self.clone();

        if let Some(status) = patch.status {
            if status != self.status && !self.status.can_transition_to(status) {
                return Err(JobError::invalid_state(
                    &self.job_id,
                    self.status,
                    format!("transition to {status}"),
                ));
            }
            next.status = status;
        }

        if let Some(done) = patch.completed_units {
            if done < self.completed_units || done > self.total_units {
                return Err(JobError::ProgressOutOfRange {
                    job_id: self.job_id.clone(),
                    current: self.completed_units,
                    requested: done,
                    total: self.total_units,
                });
            }
            next.completed_units = done;
        }

        if let Some(unit) = patch.skipped_unit {
            if !next.skipped_units.contains(&unit) {
                next.skipped_units.push(unit);
            }
        }

        if let Some(err) = &patch.last_error {
            if next.status != JobStatus::Failed {
                return Err(JobError::invalid_state(
                    &self.job_id,
                    next.status,
                    "record an error outside the failed state",
                ));
            }
            next.last_error = Some(err.clone());
        }

        next.updated_at = now;
        Ok(next)
    }
}

/// Partial update: only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub completed_units: Option<u64>,
    pub last_error: Option<String>,
    pub skipped_unit: Option<u64>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        JobPatch {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(completed_units: u64) -> Self {
        JobPatch {
            completed_units: Some(completed_units),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobPatch {
            status: Some(JobStatus::Failed),
            last_error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_skipped(mut self, unit: u64) -> Self {
        self.skipped_unit = Some(unit);
        self
    }
}
