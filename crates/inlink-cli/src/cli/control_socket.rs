//! Control socket: server (while a job runs in the foreground) and client
//! (for `inlink pause` / `inlink stop`).
//! Protocol: one line per command, "pause <id>" or "stop <id>"; one reply line,
//! "ok" or "error <message>".

use anyhow::{bail, Context, Result};
use inlink_core::control::ControlRequest;
use inlink_core::job_store::JobId;
use inlink_core::manager::JobManager;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `path` and spawns a task that applies each request through `manager`.
pub fn spawn_control_listener(
    manager: JobManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = manager.clone();
                    tokio::spawn(serve_connection(manager, stream));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(manager: JobManager, stream: UnixStream) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match apply(&manager, &line).await {
            Ok(()) => "ok\n".to_string(),
            Err(msg) => format!("error {msg}\n"),
        };
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

async fn apply(manager: &JobManager, line: &str) -> Result<(), String> {
    let (request, id) = parse_request(line)?;
    tracing::debug!(job_id = %id, ?request, "control request");
    let result = match request {
        ControlRequest::Pause => manager.pause(&id).await,
        ControlRequest::Stop => manager.stop(&id).await,
    };
    result.map_err(|e| e.to_string())
}

pub(crate) fn parse_request(line: &str) -> Result<(ControlRequest, JobId), String> {
    let (verb, id) = line
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("malformed request {line:?}"))?;
    let request = match verb {
        "pause" => ControlRequest::Pause,
        "stop" => ControlRequest::Stop,
        other => return Err(format!("unknown command {other:?}")),
    };
    let id = JobId::parse(id.trim()).map_err(|e| e.to_string())?;
    Ok((request, id))
}

pub(crate) fn request_line(request: ControlRequest, job_id: &JobId) -> String {
    let verb = match request {
        ControlRequest::Pause => "pause",
        ControlRequest::Stop => "stop",
    };
    format!("{verb} {job_id}\n")
}

/// True if some process is accepting connections on `socket_path`.
pub async fn is_live(socket_path: &Path) -> bool {
    socket_path.exists() && UnixStream::connect(socket_path).await.is_ok()
}

/// Sends one request and waits for the reply; a refused request becomes an error.
pub async fn send_request(socket_path: &Path, request: ControlRequest, job_id: &JobId) -> Result<()> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(request_line(request, job_id).as_bytes())
        .await?;

    let mut reply = String::new();
    BufReader::new(read).read_line(&mut reply).await?;
    match reply.trim_end() {
        "ok" => Ok(()),
        "" => bail!("control socket closed without a reply"),
        other => bail!("{}", other.strip_prefix("error ").unwrap_or(other)),
    }
}
