//! CLI for InLink background analysis jobs.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use inlink_core::analyzer::CommandAnalyzer;
use inlink_core::checkpoint::CheckpointStore;
use inlink_core::config::{self, InlinkConfig};
use inlink_core::job_store::{JobId, JobRecordStore};
use inlink_core::manager::JobManager;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{
    run_cleanup, run_delete, run_pause, run_results, run_resume, run_status, run_stop,
    run_submit, SubmitArgs,
};

/// Top-level CLI for InLink.
#[derive(Debug, Parser)]
#[command(name = "inlink")]
#[command(about = "InLink: resumable internal-link analysis jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create a job over a list of pages and run it in the foreground.
    Submit {
        /// File with one page URL per line (`#` starts a comment).
        #[arg(long, value_name = "FILE")]
        pages: PathBuf,
        /// Analyzer command run once per page (the URL is passed as $1).
        #[arg(long)]
        command: Option<String>,
        /// Job id to use instead of a generated one.
        #[arg(long)]
        id: Option<JobId>,
        /// Extra job config entries; VALUE is parsed as JSON, or taken as a string.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Resume a paused job in the foreground.
    Resume {
        /// Job identifier.
        id: JobId,
    },

    /// Ask the process running a job to pause it after the current page.
    Pause {
        /// Job identifier.
        id: JobId,
    },

    /// Stop a running or paused job for good.
    Stop {
        /// Job identifier.
        id: JobId,
    },

    /// Delete a completed, failed or stopped job and its results.
    Delete {
        /// Job identifier.
        id: JobId,
    },

    /// Show one job, or all jobs.
    Status {
        /// Job identifier (all jobs if omitted).
        id: Option<JobId>,
    },

    /// Print a job's result rows as JSON lines.
    Results {
        /// Job identifier.
        id: JobId,
        /// Print raw checkpoint entries, reprocessed pages included.
        #[arg(long)]
        raw: bool,
    },

    /// Delete terminal jobs older than the retention period.
    Cleanup {
        /// Override `retention_days` from the config file.
        #[arg(long, value_name = "N")]
        days: Option<u64>,
    },
}

/// Stores and config shared by every command.
pub(crate) struct Context {
    pub cfg: InlinkConfig,
    pub records: Arc<JobRecordStore>,
    pub checkpoints: Arc<CheckpointStore>,
}

impl Context {
    /// Manager for commands that never start a worker.
    pub fn manager(&self) -> JobManager {
        JobManager::new(
            Arc::clone(&self.records),
            Arc::clone(&self.checkpoints),
            Arc::new(CommandAnalyzer::from_config(&self.cfg.analyzer())),
        )
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let ctx = Context {
            records: Arc::new(JobRecordStore::open_default(&cfg).await?),
            checkpoints: Arc::new(CheckpointStore::open_default(&cfg).await?),
            cfg,
        };

        match cli.command {
            CliCommand::Submit {
                pages,
                command,
                id,
                set,
            } => {
                let args = SubmitArgs {
                    pages,
                    command,
                    id,
                    set,
                };
                run_submit(&ctx, args).await?
            }
            CliCommand::Resume { id } => run_resume(&ctx, id).await?,
            CliCommand::Pause { id } => run_pause(&id).await?,
            CliCommand::Stop { id } => run_stop(&ctx, &id).await?,
            CliCommand::Delete { id } => run_delete(&ctx, &id).await?,
            CliCommand::Status { id } => run_status(&ctx, id.as_ref()).await?,
            CliCommand::Results { id, raw } => run_results(&ctx, &id, raw).await?,
            CliCommand::Cleanup { days } => run_cleanup(&ctx, days).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
