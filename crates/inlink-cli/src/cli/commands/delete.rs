//! `inlink delete <id>` – remove a finished job and its results.

use anyhow::Result;
use inlink_core::job_store::JobId;

use crate::cli::Context;

pub async fn run_delete(ctx: &Context, id: &JobId) -> Result<()> {
    ctx.manager().delete(id).await?;
    println!("Deleted job {id}");
    Ok(())
}
