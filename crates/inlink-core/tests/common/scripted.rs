//! Deterministic analyzer for manager tests.
//!
//! Produces `rows_per_unit` rows per unit tagged with the unit index, fails the
//! units it is told to, panics where told, and can hold one unit until the test
//! releases it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use inlink_core::analyzer::{AnalyzeError, PageAnalyzer, Unit};
use inlink_core::checkpoint::ResultRow;
use inlink_core::job_store::JobConfig;

/// Holds the first call for `unit` until released.
pub struct Gate {
    pub unit: u64,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Resolves once the worker is inside the gated unit.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

pub struct ScriptedAnalyzer {
    rows_per_unit: usize,
    recoverable: HashSet<u64>,
    fatal: HashSet<u64>,
    panics: HashSet<u64>,
    gate: Option<Arc<Gate>>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedAnalyzer {
    pub fn new(rows_per_unit: usize) -> Self {
        Self {
            rows_per_unit,
            recoverable: HashSet::new(),
            fatal: HashSet::new(),
            panics: HashSet::new(),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recoverable_at(mut self, unit: u64) -> Self {
        self.recoverable.insert(unit);
        self
    }

    pub fn fatal_at(mut self, unit: u64) -> Self {
        self.fatal.insert(unit);
        self
    }

    pub fn panic_at(mut self, unit: u64) -> Self {
        self.panics.insert(unit);
        self
    }

    pub fn gated_at(mut self, unit: u64) -> Self {
        self.gate = Some(Arc::new(Gate {
            unit,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }));
        self
    }

    pub fn gate(&self) -> Arc<Gate> {
        Arc::clone(self.gate.as_ref().expect("analyzer has no gate"))
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Unit indexes processed so far, in call order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }

    /// The rows this analyzer produces for `unit`.
    pub fn rows_for(&self, unit: u64) -> Vec<ResultRow> {
        (0..self.rows_per_unit)
            .map(|n| {
                ResultRow::new()
                    .with("source_url", format!("https://site.test/page{unit}"))
                    .with("anchor_text", format!("link {n}"))
                    .with("target_url", format!("https://site.test/target{n}"))
                    .with("unit", unit)
            })
            .collect()
    }
}

#[async_trait]
impl PageAnalyzer for ScriptedAnalyzer {
    async fn process(&self, unit: &Unit, _config: &JobConfig) -> Result<Vec<ResultRow>, AnalyzeError> {
        self.calls.lock().unwrap().push(unit.index);

        if let Some(gate) = &self.gate {
            if gate.unit == unit.index && gate.armed.swap(false, Ordering::SeqCst) {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        if self.panics.contains(&unit.index) {
            panic!("analyzer bug at unit {}", unit.index);
        }
        if self.fatal.contains(&unit.index) {
            return Err(AnalyzeError::fatal(format!("site blocked at unit {}", unit.index)));
        }
        if self.recoverable.contains(&unit.index) {
            return Err(AnalyzeError::recoverable(format!("page {} returned 404", unit.index)));
        }
        Ok(self.rows_for(unit.index))
    }
}

/// Unit tags of `rows`, in order.
pub fn units_of(rows: &[ResultRow]) -> Vec<u64> {
    rows.iter()
        .map(|r| r.get("unit").and_then(|v| v.as_u64()).unwrap())
        .collect()
}
