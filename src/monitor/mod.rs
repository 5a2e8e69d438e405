//! Monitor engine: incremental sync of the filesystem into the node store
//!
//! `check` explains the filter decision for one path; `sync` reconciles a
//! path (or subtree) with the collection, with deletion semantics for
//! vanished files and LRU-style pruning against the `max_documents` cap.

mod mutate;

pub use mutate::{
	filter_add, filter_remove, priority_add, priority_remove, priority_set, FilterList,
	PriorityKey,
};

use crate::config::MonitorConfig;
use crate::db::Database;
use crate::error::WksError;
use crate::filter::{Decision, FilterEngine};
use crate::priority;
use crate::store::{NodeRecord, NodeStore};
use crate::uri::Uri;
use crate::util;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of `monitor check`
#[derive(Debug, Serialize)]
pub struct CheckReport {
	pub path: String,
	pub is_monitored: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub priority: Option<f64>,
	pub trace: Vec<crate::filter::TraceStep>,
}

/// Outcome of `monitor sync`
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
	pub files_synced: u64,
	pub files_skipped: u64,
	pub deletions: u64,
	pub pruned: u64,
	pub errors: Vec<String>,
	pub warnings: Vec<String>,
}

pub struct Monitor {
	filter: FilterEngine,
	config: MonitorConfig,
	nodes: NodeStore,
}

impl Monitor {
	pub fn new(config: &MonitorConfig, db: &Database) -> Result<Monitor, WksError> {
		Ok(Monitor {
			filter: FilterEngine::new(&config.filter)?,
			config: config.clone(),
			nodes: NodeStore::open(db)?,
		})
	}

	pub fn nodes(&self) -> &NodeStore {
		&self.nodes
	}

	/// Filter decision plus priority for a single path; read-only
	pub fn check(&self, path: &Path) -> CheckReport {
		let normalized = util::normalize_path(path);
		let Decision { monitored, trace } = self.filter.is_monitored(&normalized);
		let priority = if monitored {
			priority::priority(&normalized, &self.config.priority).ok()
		} else {
			None
		};
		CheckReport {
			path: normalized.display().to_string(),
			is_monitored: monitored,
			priority,
			trace,
		}
	}

	/// Reconcile `path` with the node store
	pub async fn sync(&self, path: &Path, recursive: bool) -> Result<SyncReport, WksError> {
		let normalized = util::normalize_path(path);
		let mut report = SyncReport::default();

		if !normalized.exists() {
			self.sync_missing(&normalized, &mut report).await?;
		} else if normalized.is_file() {
			self.sync_file(&normalized, &mut report).await;
		} else if normalized.is_dir() {
			self.sync_dir(&normalized, recursive, &mut report).await;
		} else {
			report.warnings.push(format!(
				"{}: neither file nor directory, skipped",
				normalized.display()
			));
			report.files_skipped += 1;
		}

		report.pruned = self.nodes.prune_to_cap(self.config.max_documents).await?.len() as u64;
		self.nodes.set_last_sync(&util::iso8601(util::now_utc())).await?;
		Ok(report)
	}

	/// Deletion semantics for a path that is gone from disk. A deleted
	/// directory takes its whole recorded subtree with it.
	async fn sync_missing(&self, path: &Path, report: &mut SyncReport) -> Result<(), WksError> {
		let uri = Uri::local_file(path).to_string();
		if self.nodes.remove(&uri).await? {
			debug!("removed node for vanished path {}", path.display());
			report.deletions += 1;
		}
		let prefix = format!("{}/", uri);
		for stale in self.nodes.with_uri_prefix(&prefix).await? {
			self.nodes.remove(&stale.local_uri).await?;
			report.deletions += 1;
		}
		if report.deletions == 0 {
			report.warnings.push(format!("{}: not found, no record", path.display()));
		}
		Ok(())
	}

	/// The file rule: upsert when monitored and above the priority floor,
	/// otherwise drop any stale record
	async fn sync_file(&self, path: &Path, report: &mut SyncReport) {
		let uri = Uri::local_file(path).to_string();
		let decision = self.filter.is_monitored(path);

		let priority = if decision.monitored {
			match priority::priority(path, &self.config.priority) {
				Ok(p) if p >= self.config.min_priority => Some(p),
				Ok(_) => None,
				Err(e) => {
					report.warnings.push(format!("{}: {}", path.display(), e));
					None
				}
			}
		} else {
			None
		};

		let Some(priority) = priority else {
			match self.nodes.remove(&uri).await {
				Ok(true) => report.deletions += 1,
				Ok(false) => report.files_skipped += 1,
				Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
			}
			return;
		};

		match self.upsert_file(path, &uri, priority).await {
			Ok(true) => report.files_synced += 1,
			Ok(false) => report.files_skipped += 1,
			Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
		}
	}

	/// Returns true when a record was written; an unchanged file keeps its
	/// stored timestamp and is not rewritten
	async fn upsert_file(&self, path: &Path, uri: &str, priority: f64) -> Result<bool, WksError> {
		let metadata = tokio::fs::metadata(path).await?;
		let bytes = metadata.len();
		let checksum = util::sha256_file(path).await?;

		if let Some(existing) = self.nodes.get(uri).await? {
			if existing.checksum == checksum
				&& existing.bytes == bytes
				&& existing.priority == priority
			{
				return Ok(false);
			}
		}

		self.nodes
			.upsert(&NodeRecord {
				local_uri: uri.to_string(),
				remote_uri: None,
				checksum,
				bytes,
				priority,
				timestamp: util::iso8601(util::now_utc()),
			})
			.await?;
		Ok(true)
	}

	async fn sync_dir(&self, dir: &Path, recursive: bool, report: &mut SyncReport) {
		let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
		while let Some(current) = pending.pop() {
			let entries = match std::fs::read_dir(&current) {
				Ok(entries) => entries,
				Err(e) => {
					report.errors.push(format!("{}: {}", current.display(), e));
					continue;
				}
			};
			for entry in entries {
				let entry = match entry {
					Ok(entry) => entry,
					Err(e) => {
						report.errors.push(format!("{}: {}", current.display(), e));
						continue;
					}
				};
				let path = entry.path();
				if path.is_dir() {
					if recursive && self.filter.should_descend(&path) {
						pending.push(path);
					}
				} else if path.is_file() {
					self.sync_file(&path, report).await;
				}
			}
		}
		if !report.errors.is_empty() {
			warn!("sync of {} finished with {} errors", dir.display(), report.errors.len());
		}
	}
}


// vim: ts=4
