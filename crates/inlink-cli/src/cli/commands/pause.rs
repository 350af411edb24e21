//! `inlink pause <id>` – ask the process running a job to pause it.

use anyhow::{bail, Result};
use inlink_core::control::{default_control_socket_path, ControlRequest};
use inlink_core::job_store::JobId;

use crate::cli::control_socket;

pub async fn run_pause(id: &JobId) -> Result<()> {
    let path = default_control_socket_path()?;
    if !control_socket::is_live(&path).await {
        bail!("no running inlink process is hosting job {id}");
    }
    control_socket::send_request(&path, ControlRequest::Pause, id).await?;
    println!("Pause requested for job {id}; it stops after the current page");
    Ok(())
}
