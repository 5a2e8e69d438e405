//! Daemon status heartbeat
//!
//! A single JSON document at `{WKS_HOME}/daemon.json`, rewritten on every
//! tick and readable by the status command whether or not the daemon is
//! up. Warnings and errors are bounded rings so a noisy subtree cannot
//! grow the file without limit.

use crate::error::WksError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Ring capacity per level
pub const RING_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
	pub timestamp: String,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
	pub pid: u32,
	pub running: bool,
	pub restrict_dir: Option<PathBuf>,
	pub log_path: PathBuf,
	pub last_sync: Option<String>,
	pub warnings: VecDeque<StatusEntry>,
	pub errors: VecDeque<StatusEntry>,
}

impl DaemonStatus {
	pub fn new(restrict_dir: Option<PathBuf>, log_path: PathBuf) -> DaemonStatus {
		DaemonStatus {
			pid: std::process::id(),
			running: true,
			restrict_dir,
			log_path,
			last_sync: None,
			warnings: VecDeque::new(),
			errors: VecDeque::new(),
		}
	}

	pub fn push_warning(&mut self, message: impl Into<String>) {
		push_ring(&mut self.warnings, message.into());
	}

	pub fn push_error(&mut self, message: impl Into<String>) {
		push_ring(&mut self.errors, message.into());
	}

	/// Rewrite the status file (atomic: temp + rename)
	pub fn save(&self, path: &Path) -> Result<(), WksError> {
		let tmp = path.with_extension("json.tmp");
		std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
		std::fs::rename(&tmp, path)?;
		Ok(())
	}

	/// Read the last written status; `running` is recomputed from the
	/// recorded PID so a crashed daemon reads as stopped
	pub fn load(path: &Path) -> Result<Option<DaemonStatus>, WksError> {
		if !path.exists() {
			return Ok(None);
		}
		let raw = std::fs::read_to_string(path)?;
		let mut status: DaemonStatus = serde_json::from_str(&raw)
			.map_err(|e| WksError::other(format!("daemon.json corrupted: {}", e)))?;
		status.running = status.running && super::lock::pid_alive(status.pid);
		Ok(Some(status))
	}
}

fn push_ring(ring: &mut VecDeque<StatusEntry>, message: String) {
	if ring.len() == RING_CAPACITY {
		ring.pop_front();
	}
	ring.push_back(StatusEntry { timestamp: util::iso8601(util::now_utc()), message });
}


// vim: ts=4
