//! The event-driven daemon
//!
//! Single instance per home directory, enforced by the PID lock. Watches
//! the configured roots (or the restrict override), coalesces events per
//! path, and drains the queue on a fixed tick: create/modify become
//! monitor syncs (plus link syncs for vault notes), deletes fall out of
//! the monitor's missing-path semantics, and moves arrive as a
//! delete/create pair whose old subtree is enumerated from the store, not
//! the disk. A heartbeat document mirrors progress for the status
//! command.

pub mod lock;
pub mod queue;
pub mod status;
pub mod watcher;

pub use lock::DaemonLock;
pub use status::{DaemonStatus, StatusEntry};

use crate::config::{Config, WksHome};
use crate::db::Database;
use crate::error::WksError;
use crate::links::{is_parseable_note, LinkEngine};
use crate::monitor::Monitor;
use crate::util;
use futures::stream::StreamExt;
use queue::{EventQueue, FsEvent, FsEventKind};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Parallelism for the per-tick sync workers
const SYNC_WORKERS: usize = 4;

pub struct Daemon {
	home: WksHome,
	config: Config,
	db: Database,
	monitor: Monitor,
	links: LinkEngine,
	queue: Arc<EventQueue>,
	status: Mutex<DaemonStatus>,
	restrict: Option<PathBuf>,
}

impl std::fmt::Debug for Daemon {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Daemon").finish_non_exhaustive()
	}
}

impl Daemon {
	/// Build the daemon: lock first (exactly one instance wins), then
	/// verify the database is reachable before any watcher starts.
	pub fn new(
		home: WksHome,
		config: Config,
		restrict: Option<PathBuf>,
	) -> Result<(Daemon, DaemonLock), WksError> {
		let lock = DaemonLock::acquire(&home.lock_path())?;

		let db = Database::open(&config.database)?;
		db.ping()?;

		let restrict = restrict
			.or_else(|| {
				std::env::var(&config.service.restrict_env)
					.ok()
					.filter(|v| !v.is_empty())
					.map(PathBuf::from)
			})
			.map(|p| util::normalize_path(&p));

		let monitor = Monitor::new(&config.monitor, &db)?;
		let links = LinkEngine::new(&config, &db)?;
		let queue = Arc::new(EventQueue::new(config.daemon.queue_capacity));
		let status = Mutex::new(DaemonStatus::new(restrict.clone(), home.logfile_path()));

		Ok((
			Daemon { home, config, db, monitor, links, queue, status, restrict },
			lock,
		))
	}

	/// Roots to watch: the restrict override wins over configured includes
	fn roots(&self) -> Vec<PathBuf> {
		match &self.restrict {
			Some(dir) => vec![dir.clone()],
			None => self.config.monitor.filter.include_paths.clone(),
		}
	}

	/// The event loop. Returns on shutdown signal.
	pub async fn run(&self) -> Result<(), WksError> {
		let _watchers = watcher::watch_roots(&self.roots(), self.queue.clone())?;
		info!("daemon running (pid {})", std::process::id());
		self.heartbeat()?;

		let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
		spawn_signal_task(shutdown_tx);

		let mut sync_tick =
			tokio::time::interval(Duration::from_secs(self.config.daemon.sync_interval_secs));
		sync_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		let mut health_tick =
			tokio::time::interval(Duration::from_secs(self.config.daemon.health_interval_secs));
		health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = sync_tick.tick() => {
					self.process_batch().await;
					self.heartbeat()?;
				}
				_ = health_tick.tick() => {
					if let Err(e) = self.db.ping() {
						error!("database health check failed: {}", e);
						self.with_status(|s| s.push_error(format!("database unreachable: {}", e)));
					}
				}
				_ = shutdown_rx.changed() => {
					info!("shutdown signal received");
					break;
				}
			}
		}

		// Bounded drain of whatever is still queued, then a final status
		let grace = Duration::from_secs(self.config.daemon.grace_period_secs);
		if tokio::time::timeout(grace, self.process_batch()).await.is_err() {
			warn!("shutdown grace period elapsed with events still queued");
		}
		self.with_status(|s| s.running = false);
		self.heartbeat()?;
		info!("daemon stopped");
		Ok(())
	}

	/// Drain the queue and run sync operations with bounded parallelism
	async fn process_batch(&self) {
		let batch = self.queue.drain();
		if batch.is_empty() {
			return;
		}
		debug!("processing {} coalesced events", batch.len());

		futures::stream::iter(batch)
			.for_each_concurrent(SYNC_WORKERS, |event| async move {
				self.handle_event(event).await;
			})
			.await;
		self.with_status(|s| s.last_sync = Some(util::iso8601(util::now_utc())));
	}

	async fn handle_event(&self, event: FsEvent) {
		let path = event.path;
		let recursive = matches!(event.kind, FsEventKind::Create) && path.is_dir();

		match self.monitor.sync(&path, recursive).await {
			Ok(report) => {
				for w in report.warnings {
					// "not found, no record" churn is routine around moves
					debug!("{}", w);
				}
				for e in report.errors {
					warn!("{}", e);
					self.with_status(|s| s.push_warning(e));
				}
			}
			Err(e) => {
				error!("monitor sync of {} failed: {}", path.display(), e);
				self.with_status(|s| s.push_error(format!("{}: {}", path.display(), e)));
			}
		}

		// Notes inside the vault also refresh their edges
		if event.kind != FsEventKind::Delete
			&& path.is_file()
			&& is_parseable_note(&path)
			&& path.starts_with(self.links.vault_base())
		{
			if let Err(e) = self.links.sync(&path, false, false, None).await {
				warn!("link sync of {} failed: {}", path.display(), e);
				self.with_status(|s| s.push_warning(format!("{}: {}", path.display(), e)));
			}
		}
	}

	fn with_status(&self, f: impl FnOnce(&mut DaemonStatus)) {
		let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
		f(&mut status);
	}

	fn heartbeat(&self) -> Result<(), WksError> {
		let status = self.status.lock().unwrap_or_else(|e| e.into_inner());
		status.save(&self.home.status_path())
	}

	#[cfg(test)]
	pub(crate) fn queue(&self) -> &Arc<EventQueue> {
		&self.queue
	}

	#[cfg(test)]
	pub(crate) async fn drain_for_test(&self) {
		self.process_batch().await;
	}
}

fn spawn_signal_task(shutdown_tx: watch::Sender<bool>) {
	tokio::spawn(async move {
		use tokio::signal::unix::{signal, SignalKind};

		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(s) => s,
			Err(e) => {
				warn!("failed to install SIGTERM handler: {}", e);
				return;
			}
		};
		let mut sigint = match signal(SignalKind::interrupt()) {
			Ok(s) => s,
			Err(e) => {
				warn!("failed to install SIGINT handler: {}", e);
				return;
			}
		};

		tokio::select! {
			_ = sigterm.recv() => debug!("SIGTERM"),
			_ = sigint.recv() => debug!("SIGINT"),
		}
		let _ = shutdown_tx.send(true);
	});
}

/// Ask a running daemon to stop by signalling the PID in its lock file
#[allow(unsafe_code)] // kill(2) with SIGTERM has no memory-safety surface
pub fn stop(home: &WksHome) -> Result<u32, WksError> {
	let lock_path = home.lock_path();
	let pid = lock::read_owner(&lock_path).ok_or_else(|| WksError::NotFound {
		what: format!("daemon lock at {}", lock_path.display()),
	})?;
	if !lock::pid_alive(pid) {
		// Crash leftovers: clean the lock and report the stale pid
		let _ = std::fs::remove_file(&lock_path);
		return Err(WksError::NotFound { what: format!("daemon process {}", pid) });
	}

	let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
	if rc != 0 {
		return Err(WksError::other(format!("failed to signal pid {}", pid)));
	}
	Ok(pid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::uri::Uri;
	use std::fs;
	use tempfile::TempDir;

	fn daemon_fixture(tmp: &TempDir) -> (Daemon, DaemonLock, PathBuf) {
		let home = WksHome::at(tmp.path().join("wks")).unwrap();
		let watched = tmp.path().join("watched");
		fs::create_dir_all(&watched).unwrap();

		let mut config = Config::starter(&home);
		config.database.backend = "memory".to_string();
		config.vault.base = watched.clone();
		config.monitor.filter.include_paths.push(watched.clone());
		config.monitor.priority.dirs.insert(watched.clone(), 100.0);

		let (daemon, lock) = Daemon::new(home, config, None).unwrap();
		(daemon, lock, watched)
	}

	#[tokio::test]
	async fn test_second_instance_rejected() {
		let tmp = TempDir::new().unwrap();
		let (daemon, _lock, _watched) = daemon_fixture(&tmp);

		let home = WksHome::at(tmp.path().join("wks")).unwrap();
		let err = Daemon::new(home, daemon.config.clone(), None).unwrap_err();
		assert_eq!(err.kind(), "already_running");
	}

	#[tokio::test]
	async fn test_create_event_syncs_node_and_edges() {
		let tmp = TempDir::new().unwrap();
		let (daemon, _lock, watched) = daemon_fixture(&tmp);

		let note = watched.join("note.md");
		fs::write(&note, "[[Other]]\n").unwrap();
		daemon.queue().push(FsEvent { path: note.clone(), kind: FsEventKind::Create });
		daemon.drain_for_test().await;

		let uri = Uri::local_file(&note).to_string();
		assert!(daemon.monitor.nodes().get(&uri).await.unwrap().is_some());
		let edges = daemon
			.links
			.edges()
			.find_from(&Uri::for_local_path(&note, Some(&watched)).to_string())
			.await
			.unwrap();
		assert_eq!(edges.len(), 1);
	}

	#[tokio::test]
	async fn test_move_pair_converges_to_single_node() {
		let tmp = TempDir::new().unwrap();
		let (daemon, _lock, watched) = daemon_fixture(&tmp);

		let old = watched.join("note.md");
		fs::write(&old, "x\n").unwrap();
		daemon.queue().push(FsEvent { path: old.clone(), kind: FsEventKind::Create });
		daemon.drain_for_test().await;

		let new = watched.join("note2.md");
		fs::rename(&old, &new).unwrap();
		daemon.queue().push(FsEvent { path: old.clone(), kind: FsEventKind::Delete });
		daemon.queue().push(FsEvent { path: new.clone(), kind: FsEventKind::Create });
		daemon.drain_for_test().await;

		let all = daemon.monitor.nodes().all().await.unwrap();
		assert_eq!(all.len(), 1);
		assert!(all[0].local_uri.ends_with("note2.md"));
	}

	#[tokio::test]
	async fn test_directory_delete_clears_recorded_subtree() {
		let tmp = TempDir::new().unwrap();
		let (daemon, _lock, watched) = daemon_fixture(&tmp);

		let dir = watched.join("proj");
		fs::create_dir_all(&dir).unwrap();
		fs::write(dir.join("a.md"), "a\n").unwrap();
		fs::write(dir.join("b.md"), "b\n").unwrap();
		daemon.queue().push(FsEvent { path: dir.clone(), kind: FsEventKind::Create });
		daemon.drain_for_test().await;
		assert_eq!(daemon.monitor.nodes().count().await.unwrap(), 2);

		// The subtree is gone from disk; records must go from the store
		fs::remove_dir_all(&dir).unwrap();
		daemon.queue().push(FsEvent { path: dir.clone(), kind: FsEventKind::Delete });
		daemon.drain_for_test().await;
		assert_eq!(daemon.monitor.nodes().count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_heartbeat_written() {
		let tmp = TempDir::new().unwrap();
		let (daemon, _lock, watched) = daemon_fixture(&tmp);
		fs::write(watched.join("x.md"), "x\n").unwrap();
		daemon.queue().push(FsEvent { path: watched.join("x.md"), kind: FsEventKind::Create });
		daemon.drain_for_test().await;
		daemon.heartbeat().unwrap();

		let status = DaemonStatus::load(&daemon.home.status_path()).unwrap().unwrap();
		assert!(status.running);
		assert!(status.last_sync.is_some());
	}
}

// vim: ts=4
