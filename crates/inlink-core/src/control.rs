//! Job control for pause/stop: per-worker request tokens and completion signals.
//!
//! Every running worker is registered with a [`ControlToken`]. A control client
//! (the manager, or `inlink pause <id>` via socket) sets a request on the token;
//! the worker loop checks it at the next unit boundary and exits.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use crate::job_store::{JobId, JobStatus};

/// Cooperative request observed by a worker at unit boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Pause,
    Stop,
}

impl ControlRequest {
    /// Status the worker persists when it honors this request.
    pub fn target_status(self) -> JobStatus {
        match self {
            ControlRequest::Pause => JobStatus::Paused,
            ControlRequest::Stop => JobStatus::Stopped,
        }
    }
}

const NONE: u8 = 0;
const PAUSE: u8 = 1;
const STOP: u8 = 2;

/// Pending request for one worker. Stop overrides pause; pause never
/// downgrades a stop.
#[derive(Debug, Default)]
pub struct ControlToken(AtomicU8);

impl ControlToken {
    pub fn request_pause(&self) {
        let _ = self
            .0
            .compare_exchange(NONE, PAUSE, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn request_stop(&self) {
        self.0.store(STOP, Ordering::Release);
    }

    pub fn pending(&self) -> Option<ControlRequest> {
        match self.0.load(Ordering::Acquire) {
            STOP => Some(ControlRequest::Stop),
            PAUSE => Some(ControlRequest::Pause),
            _ => None,
        }
    }
}

struct Registration {
    generation: u64,
    token: Arc<ControlToken>,
    done: watch::Receiver<bool>,
}

/// Registry of job id -> active worker. Entries exist only while a worker runs;
/// the [`WorkerGuard`] returned by [`register`](JobControl::register) removes
/// its entry when dropped.
#[derive(Default)]
pub struct JobControl {
    next_generation: AtomicU64,
    workers: RwLock<HashMap<JobId, Registration>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker for `job_id`. The returned guard carries the token the
    /// worker polls and signals completion when dropped.
    pub fn register(self: &Arc<Self>, job_id: &JobId) -> WorkerGuard {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = Arc::new(ControlToken::default());
        let (done_tx, done_rx) = watch::channel(false);
        let previous = self.write().insert(
            job_id.clone(),
            Registration {
                generation,
                token: Arc::clone(&token),
                done: done_rx,
            },
        );
        if previous.is_some() {
            tracing::warn!(job_id = %job_id, "replacing stale worker registration");
        }
        WorkerGuard {
            control: Arc::clone(self),
            job_id: job_id.clone(),
            generation,
            token,
            done: done_tx,
        }
    }

    /// Token of the active worker for `job_id`, if any.
    pub fn token(&self, job_id: &JobId) -> Option<Arc<ControlToken>> {
        self.read().get(job_id).map(|r| Arc::clone(&r.token))
    }

    /// Ask the active worker to pause. Returns false when no worker is active.
    pub fn request_pause(&self, job_id: &JobId) -> bool {
        match self.token(job_id) {
            Some(token) => {
                token.request_pause();
                true
            }
            None => false,
        }
    }

    /// Ask the active worker to stop. Returns false when no worker is active.
    pub fn request_stop(&self, job_id: &JobId) -> bool {
        match self.token(job_id) {
            Some(token) => {
                token.request_stop();
                true
            }
            None => false,
        }
    }

    /// Completion signal of the active worker; flips to `true` when it exits.
    pub fn done_receiver(&self, job_id: &JobId) -> Option<watch::Receiver<bool>> {
        self.read().get(job_id).map(|r| r.done.clone())
    }

    pub fn active_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn unregister(&self, job_id: &JobId, generation: u64) {
        let mut workers = self.write();
        if workers.get(job_id).map(|r| r.generation) == Some(generation) {
            workers.remove(job_id);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, Registration>> {
        self.workers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, Registration>> {
        self.workers.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held by a worker for its whole run. On drop: unregister, then wake waiters.
pub struct WorkerGuard {
    control: Arc<JobControl>,
    job_id: JobId,
    generation: u64,
    token: Arc<ControlToken>,
    done: watch::Sender<bool>,
}

impl WorkerGuard {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn token(&self) -> &Arc<ControlToken> {
        &self.token
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.control.unregister(&self.job_id, self.generation);
        self.done.send_replace(true);
    }
}

/// Default path for the control socket (same XDG state dir as the job store).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    Ok(crate::config::state_dir()?.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::parse(s).unwrap()
    }

    #[test]
    fn stop_overrides_pause_and_pause_never_downgrades() {
        let token = ControlToken::default();
        assert_eq!(token.pending(), None);
        token.request_pause();
        assert_eq!(token.pending(), Some(ControlRequest::Pause));
        token.request_stop();
        assert_eq!(token.pending(), Some(ControlRequest::Stop));
        token.request_pause();
        assert_eq!(token.pending(), Some(ControlRequest::Stop));
    }

    #[test]
    fn requests_without_worker_report_false() {
        let control = Arc::new(JobControl::new());
        assert!(!control.request_pause(&id("idle")));
        assert!(!control.request_stop(&id("idle")));
        assert!(control.done_receiver(&id("idle")).is_none());
    }

    #[test]
    fn guard_drop_unregisters_and_signals_done() {
        let control = Arc::new(JobControl::new());
        let job = id("j1");
        let guard = control.register(&job);
        assert_eq!(control.active_jobs(), vec![job.clone()]);
        assert!(control.request_pause(&job));
        assert_eq!(guard.token().pending(), Some(ControlRequest::Pause));

        let done = control.done_receiver(&job).unwrap();
        assert!(!*done.borrow());
        drop(guard);
        assert!(*done.borrow());
        assert!(control.active_jobs().is_empty());
    }

    #[test]
    fn stale_guard_does_not_remove_newer_registration() {
        let control = Arc::new(JobControl::new());
        let job = id("j2");
        let old = control.register(&job);
        let new = control.register(&job);
        drop(old);
        assert_eq!(control.active_jobs(), vec![job.clone()]);
        assert!(control.request_stop(&job));
        assert_eq!(new.token().pending(), Some(ControlRequest::Stop));
    }
}
