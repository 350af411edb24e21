//! Per-job async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::job_store::JobId;

/// One `tokio::sync::Mutex<T>` per job id, created on first use.
///
/// An entry is evicted only while no caller holds a handle to it, so two live
/// locks for the same id never exist.
pub(crate) struct KeyedLocks<T> {
    inner: Mutex<HashMap<JobId, Arc<tokio::sync::Mutex<T>>>>,
}

impl<T: Default> KeyedLocks<T> {
    pub(crate) fn new() -> Self {
        KeyedLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, job_id: &JobId) -> Arc<tokio::sync::Mutex<T>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(job_id.clone()).or_default())
    }

    /// Drop the entry for `job_id` if nobody else holds its lock handle.
    /// Callers must release their own handle first.
    pub(crate) fn remove_if_idle(&self, job_id: &JobId) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(job_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(job_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Default> Default for KeyedLocks<T> {
    fn default() -> Self {
        Self::new()
    }
}
