//! `inlink cleanup` – delete terminal jobs past the retention period.

use anyhow::Result;
use std::time::Duration;

use crate::cli::Context;

pub async fn run_cleanup(ctx: &Context, days: Option<u64>) -> Result<()> {
    let max_age = match days {
        Some(days) => Duration::from_secs(days.saturating_mul(24 * 60 * 60)),
        None => ctx.cfg.retention(),
    };
    let deleted = ctx.manager().purge_expired(max_age).await?;
    if deleted.is_empty() {
        println!("No expired jobs.");
    } else {
        for id in &deleted {
            tracing::debug!(job_id = %id, "expired job deleted");
        }
        println!("Deleted {} expired job(s)", deleted.len());
    }
    Ok(())
}
