//! `inlink results <id>` – print result rows as JSON lines.

use anyhow::Result;
use inlink_core::job_store::JobId;
use std::io::Write;

use crate::cli::Context;

pub async fn run_results(ctx: &Context, id: &JobId, raw: bool) -> Result<()> {
    let manager = ctx.manager();
    let lines = if raw {
        manager.get_status(id).await?;
        manager
            .checkpoints()
            .load_entries(id)
            .await?
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        manager
            .load_partial_results(id)
            .await?
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut out = std::io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
