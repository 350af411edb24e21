pub mod config;
pub mod logging;

pub mod analyzer;
pub mod checkpoint;
pub mod control;
pub mod error;
pub mod host_lock;
pub mod job_store;
pub mod manager;
pub mod progress;
pub mod recovery;
pub mod retention;
pub mod storage;

mod locks;

pub use error::{JobError, JobResult};
