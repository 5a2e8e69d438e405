//! Daemon singleton lock
//!
//! An exclusive lock file at `{WKS_HOME}/daemon.lock` holding the owning
//! PID. Creation uses create-new semantics so two concurrent starts
//! produce exactly one winner; a lock left by a dead process is reclaimed.

use crate::error::WksError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tracing::{info, warn};

/// RAII guard over the daemon lock; the file is removed on drop
#[derive(Debug)]
pub struct DaemonLock {
	path: PathBuf,
}

impl DaemonLock {
	/// Acquire the lock, reclaiming it from a dead owner if needed
	pub fn acquire(lock_path: &Path) -> Result<DaemonLock, WksError> {
		match Self::try_create(lock_path) {
			Ok(lock) => Ok(lock),
			Err(first_err) => {
				// The winner writes its PID right after creating the file;
				// give a racing loser a moment to observe it
				let mut owner = read_owner(lock_path);
				let mut tries = 0;
				while owner.is_none() && lock_path.exists() && tries < 10 {
					std::thread::sleep(std::time::Duration::from_millis(5));
					owner = read_owner(lock_path);
					tries += 1;
				}
				let Some(owner) = owner else {
					// Unreadable or vanished mid-race; surface the original
					// failure
					return Err(first_err);
				};
				if pid_alive(owner) {
					return Err(WksError::AlreadyRunning { pid: owner });
				}
				warn!("reclaiming stale daemon lock from dead pid {}", owner);
				std::fs::remove_file(lock_path)?;
				Self::try_create(lock_path)
			}
		}
	}

	fn try_create(lock_path: &Path) -> Result<DaemonLock, WksError> {
		let mut file = OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(lock_path)
			.map_err(|e| match read_owner(lock_path) {
				Some(pid) if pid_alive(pid) => WksError::AlreadyRunning { pid },
				Some(_) | None => WksError::Io(e),
			})?;
		write!(file, "{}", std::process::id())?;
		info!("daemon lock acquired at {}", lock_path.display());
		Ok(DaemonLock { path: lock_path.to_path_buf() })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for DaemonLock {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.path);
	}
}

/// PID recorded in the lock file, if it parses
pub fn read_owner(lock_path: &Path) -> Option<u32> {
	std::fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

/// Whether a process with this PID exists right now
pub fn pid_alive(pid: u32) -> bool {
	let system = System::new_with_specifics(
		RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()),
	);
	system.process(Pid::from_u32(pid)).is_some()
}


// vim: ts=4
