//! `inlink submit` – create a job over a list of pages and run it.

use anyhow::{bail, Context as _, Result};
use inlink_core::job_store::{JobConfig, JobId};
use std::path::{Path, PathBuf};

use super::host::{host_job, Start};
use crate::cli::Context;

#[derive(Debug)]
pub struct SubmitArgs {
    pub pages: PathBuf,
    pub command: Option<String>,
    pub id: Option<JobId>,
    pub set: Vec<String>,
}

pub async fn run_submit(ctx: &Context, args: SubmitArgs) -> Result<()> {
    let pages = read_pages(&args.pages)?;
    if pages.is_empty() {
        bail!("no page URLs in {}", args.pages.display());
    }
    if args.command.is_none() && ctx.cfg.analyzer().command.is_none() {
        bail!("no analyzer command: pass --command or set [analyzer] command in the config file");
    }

    let mut config = JobConfig::new();
    for entry in &args.set {
        let (key, value) = parse_set(entry)?;
        config = config.with(key, value);
    }
    if let Some(command) = args.command {
        config = config.with("command", command);
    }
    let total_units = pages.len() as u64;
    config = config.with("pages", pages);

    let job_id = args.id.unwrap_or_else(JobId::generate);
    host_job(
        ctx,
        Start::Submit {
            job_id,
            total_units,
            config,
        },
    )
    .await
}

/// Page URLs from `path`: one per line, blank lines and `#` comments skipped.
pub(crate) fn read_pages(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read pages file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// `KEY=VALUE`, with VALUE parsed as JSON when it is valid JSON.
pub(crate) fn parse_set(entry: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = entry.split_once('=') else {
        bail!("--set expects KEY=VALUE, got {entry:?}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("--set expects KEY=VALUE, got {entry:?}");
    }
    if key == "pages" {
        bail!("--set cannot override pages; use --pages");
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
