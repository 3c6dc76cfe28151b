//! Single-instance guard.
//!
//! Only one monitor may watch the bus: two would each send a power-off for
//! the same standby broadcast. The guard takes an exclusive advisory lock
//! (`flock(LOCK_EX | LOCK_NB)`) on a lock file and holds it until it is
//! dropped or the process exits. The kernel releases the lock on exit, so a
//! crashed monitor never leaves a stale lock behind.
//!
//! The lock lives at a fixed path so every launch of the monitor (login
//! shell, cron, systemd) contends for the same file.
//!
//! When the lock is taken, the process table is scanned only to tell the
//! operator which processes hold it.
//!
//! The lock belongs to the open file description, so a child forked after
//! `acquire` keeps holding it once the parent exits.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Failure to record the PID in the lock file is logged, not fatal

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;

use sysinfo::System;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Name matched when listing conflicting processes.
pub const PROCESS_NAME: &str = "hdmi-cec-monitor";

/// File name of the lock.
pub const LOCK_FILE_NAME: &str = "hdmi-cec-monitor.lock";

/// Directory holding the lock; independent of the caller's environment.
pub const LOCK_DIR: &str = "/tmp";

/// Command-line fragments that mark a process as a wrapper or a search,
/// not a running monitor.
const EXCLUDED_FRAGMENTS: [&str; 4] = ["bash -c", "sh -c", "grep", "/dev/null"];

#[derive(Debug, Error)]
pub enum GuardError {
    /// The lock file could not be created or locked
    #[error("failed to lock {}: {source}", path.display())]
    LockFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another monitor holds the lock
    #[error("monitor is already running (lock {} is held)", path.display())]
    DuplicateInstance {
        path: PathBuf,
        holders: Vec<ConflictingProcess>,
    },
}

/// A process that looks like another running monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingProcess {
    pub pid: u32,
    pub cmdline: String,
}

/// Holds the instance lock; dropping it releases the lock.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

impl InstanceGuard {
    /// Takes the lock at `path`, creating the file and its directory.
    ///
    /// # Errors
    ///
    /// - `GuardError::DuplicateInstance` if another process holds the lock;
    ///   processes matching `process_name` are logged at error level
    /// - `GuardError::LockFile` if the file cannot be opened or locked
    pub fn acquire(path: impl Into<PathBuf>, process_name: &str) -> Result<Self, GuardError> {
        let path = path.into();
        let lock_error = |source| GuardError::LockFile {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(lock_error(err));
            }

            let holders = find_conflicting_processes(process_name);
            error!(
                lock = %path.display(),
                count = holders.len(),
                "Monitor is already running"
            );
            for holder in &holders {
                error!(pid = holder.pid, cmdline = %holder.cmdline, "Existing monitor process");
            }
            return Err(GuardError::DuplicateInstance { path, holders });
        }

        let mut guard = Self { file, path };
        guard.record_pid();
        info!(lock = %guard.path.display(), pid = process::id(), "Instance lock acquired");
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the lock file with the current PID.
    ///
    /// Call again after daemonizing: the lock carries over to the child but
    /// the recorded PID is still the parent's.
    pub fn record_pid(&mut self) {
        if let Err(e) = write_pid(&mut self.file) {
            warn!(lock = %self.path.display(), error = %e, "Failed to record PID in lock file");
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still owned by `self.file`.
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if rc == 0 {
            debug!(lock = %self.path.display(), "Instance lock released");
        }
    }
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", process::id())?;
    file.flush()
}

/// Default lock location, the same for every user session and scheduler.
pub fn default_lock_path() -> PathBuf {
    Path::new(LOCK_DIR).join(LOCK_FILE_NAME)
}

/// Takes the default instance lock for this monitor.
///
/// # Errors
///
/// See [`InstanceGuard::acquire`].
pub fn ensure_single_instance() -> Result<InstanceGuard, GuardError> {
    InstanceGuard::acquire(default_lock_path(), PROCESS_NAME)
}

/// Lists running processes that look like another monitor.
///
/// Excludes the current process, threads, and shell wrappers.
pub fn find_conflicting_processes(process_name: &str) -> Vec<ConflictingProcess> {
    let own_pid = process::id();
    let mut system = System::new();
    system.refresh_all();

    let mut found: Vec<ConflictingProcess> = system
        .processes()
        .iter()
        .filter(|(_, p)| p.thread_kind().is_none())
        .filter_map(|(pid, p)| {
            let name = p.name().to_string_lossy();
            let cmdline = p
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");

            is_conflicting(pid.as_u32(), own_pid, &name, &cmdline, process_name).then(|| {
                ConflictingProcess {
                    pid: pid.as_u32(),
                    cmdline,
                }
            })
        })
        .collect();

    found.sort_by_key(|p| p.pid);
    found
}

/// Decides whether one process table entry is a competing monitor.
pub fn is_conflicting(
    pid: u32,
    own_pid: u32,
    name: &str,
    cmdline: &str,
    process_name: &str,
) -> bool {
    if pid == own_pid {
        return false;
    }
    if name != process_name && !cmdline.contains(process_name) {
        return false;
    }
    !EXCLUDED_FRAGMENTS
        .iter()
        .any(|fragment| cmdline.contains(fragment))
}
