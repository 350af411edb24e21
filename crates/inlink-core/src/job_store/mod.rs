//! Durable job record store (one JSON file per job).
//!
//! Stores each job's status, progress counters, timestamps, immutable config
//! snapshot and last error. Writes are atomic per record; updates to the same
//! job are serialized.

mod jobs;
mod store;
pub mod types;

pub use store::JobRecordStore;
pub(crate) use store::unix_timestamp;
pub use types::*;
