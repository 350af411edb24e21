//! Row and log-entry types for the checkpoint log.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One analysis output (e.g. a link suggestion). Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(BTreeMap<String, serde_json::Value>);

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.0
    }
}

/// One append: the rows a single unit produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub unit: u64,
    pub rows: Vec<ResultRow>,
}

/// Collapse reprocessed units: for each unit only its latest entry counts,
/// and it sits at that latest entry's position in the log.
pub fn dedup_by_unit(entries: Vec<CheckpointEntry>) -> Vec<ResultRow> {
    let mut latest: HashMap<u64, usize> = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        latest.insert(entry.unit, i);
    }
    entries
        .into_iter()
        .enumerate()
        .filter(|(i, entry)| latest.get(&entry.unit) == Some(i))
        .flat_map(|(_, entry)| entry.rows)
        .collect()
}
