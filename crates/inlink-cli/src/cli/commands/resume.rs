//! `inlink resume <id>` – resume a paused job in the foreground.

use anyhow::Result;
use inlink_core::job_store::JobId;

use super::host::{host_job, Start};
use crate::cli::Context;

pub async fn run_resume(ctx: &Context, id: JobId) -> Result<()> {
    host_job(ctx, Start::Resume(id)).await
}
