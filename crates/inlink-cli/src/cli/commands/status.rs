//! `inlink status [id]` – show one job in detail, or a table of all jobs.

use anyhow::Result;
use inlink_core::job_store::{JobId, JobRecord};

use crate::cli::Context;

pub async fn run_status(ctx: &Context, id: Option<&JobId>) -> Result<()> {
    let manager = ctx.manager();
    match id {
        Some(id) => print_detail(&manager.get_status(id).await?),
        None => {
            let jobs = manager.list_jobs().await?;
            if jobs.is_empty() {
                println!("No jobs.");
            } else {
                println!("{:<34} {:<10} {:<13} {}", "ID", "STATUS", "PAGES", "UPDATED");
                for j in jobs {
                    println!(
                        "{:<34} {:<10} {:<13} {}",
                        j.job_id,
                        j.status,
                        format!("{}/{}", j.completed_units, j.total_units),
                        j.updated_at
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_detail(job: &JobRecord) {
    println!("id:        {}", job.job_id);
    println!("status:    {}", job.status);
    println!("progress:  {}/{} pages", job.completed_units, job.total_units);
    if !job.skipped_units.is_empty() {
        let skipped: Vec<String> = job.skipped_units.iter().map(u64::to_string).collect();
        println!("skipped:   {}", skipped.join(", "));
    }
    println!("created:   {}", job.created_at);
    println!("updated:   {}", job.updated_at);
    if let Some(command) = job.config.get_str("command") {
        println!("command:   {command}");
    }
    if let Some(err) = &job.last_error {
        println!("error:     {err}");
    }
}
