//! `inlink stop <id>` – stop a job. Running jobs are stopped by their host
//! process; a paused job is stopped directly when no host is running.

use anyhow::{bail, Context as _, Result};
use inlink_core::control::{default_control_socket_path, ControlRequest};
use inlink_core::host_lock::{default_host_lock_path, HostLock};
use inlink_core::job_store::JobId;

use crate::cli::control_socket;
use crate::cli::Context;

pub async fn run_stop(ctx: &Context, id: &JobId) -> Result<()> {
    let path = default_control_socket_path()?;
    if control_socket::is_live(&path).await {
        control_socket::send_request(&path, ControlRequest::Stop, id).await?;
        println!("Stop requested for job {id}");
        return Ok(());
    }

    let lock_path = default_host_lock_path()?;
    let Some(_host_lock) = HostLock::try_acquire(&lock_path)
        .with_context(|| format!("open host lock {}", lock_path.display()))?
    else {
        bail!("an inlink process is running jobs but its control socket is not answering; try again");
    };
    ctx.manager().stop(id).await?;
    println!("Stopped job {id}");
    Ok(())
}
