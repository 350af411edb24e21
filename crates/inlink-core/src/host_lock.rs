//! Exclusive per-store host lock.
//!
//! Only the process holding this lock may run workers or the recovery scan.
//! The lock is an `flock` on a small file, so it is released when the holder
//! exits for any reason.

use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct HostLock {
    _file: File,
    path: PathBuf,
}

impl HostLock {
    /// Take the lock at `path` without blocking. `Ok(None)` means another
    /// holder has it. The holder's pid is written into the file.
    pub fn try_acquire(path: &Path) -> io::Result<Option<HostLock>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if !try_lock_exclusive(&file)? {
            return Ok(None);
        }
        file.set_len(0)?;
        file.rewind()?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_data()?;
        tracing::debug!(path = %path.display(), "host lock acquired");
        Ok(Some(HostLock {
            _file: file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pid recorded by the current (or last) holder of the lock at `path`.
pub fn holder_pid(path: &Path) -> Option<u32> {
    let mut text = String::new();
    File::open(path).ok()?.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

/// Default host lock path, next to the control socket.
pub fn default_host_lock_path() -> io::Result<PathBuf> {
    Ok(crate::config::state_dir()?.join("host.lock"))
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let r = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if r == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

// No cross-process exclusion off Unix.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}
