//! Append-only checkpoint log of result rows, one file per job.
//!
//! Each append is a single checksummed line holding the unit index and the
//! rows it produced. A crash can at worst leave a torn final line, which
//! readers ignore and the next append truncates. Units reprocessed after a
//! crash are collapsed at read time (latest attempt wins).

mod log;
pub mod types;

pub use log::CheckpointStore;
pub use types::{dedup_by_unit, CheckpointEntry, ResultRow};

#[cfg(test)]
mod tests;
