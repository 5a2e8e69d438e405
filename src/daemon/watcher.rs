//! Filesystem watcher plumbing
//!
//! Wraps the platform notifier and normalizes its event zoo into the
//! three kinds the sync loop handles. A move arrives as a delete at the
//! old path plus a create at the new one.

use super::queue::{EventQueue, FsEvent, FsEventKind};
use crate::error::WksError;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keeps the watcher alive; dropping it stops event delivery
pub struct WatchSet {
	_watcher: RecommendedWatcher,
	pub roots: Vec<PathBuf>,
}

/// Watch every root recursively, feeding normalized events into the queue
pub fn watch_roots(roots: &[PathBuf], queue: Arc<EventQueue>) -> Result<WatchSet, WksError> {
	let queue_for_callback = queue.clone();
	let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
		match res {
			Ok(event) => {
				for fs_event in normalize(&event) {
					queue_for_callback.push(fs_event);
				}
			}
			Err(e) => warn!("watcher error: {}", e),
		}
	})
	.map_err(|e| WksError::other(format!("watcher init: {}", e)))?;

	let mut watched = Vec::new();
	for root in roots {
		match watcher.watch(root, RecursiveMode::Recursive) {
			Ok(()) => {
				debug!("watching {}", root.display());
				watched.push(root.clone());
			}
			// A missing root is not fatal; the rest keep watching
			Err(e) => warn!("cannot watch {}: {}", root.display(), e),
		}
	}
	if watched.is_empty() {
		return Err(WksError::other("no watchable roots"));
	}
	Ok(WatchSet { _watcher: watcher, roots: watched })
}

/// Collapse a notifier event into create/modify/delete per path
pub fn normalize(event: &notify::Event) -> Vec<FsEvent> {
	let mut out = Vec::new();
	match &event.kind {
		EventKind::Create(_) => {
			for path in &event.paths {
				out.push(FsEvent { path: path.clone(), kind: FsEventKind::Create });
			}
		}
		EventKind::Remove(_) => {
			for path in &event.paths {
				out.push(FsEvent { path: path.clone(), kind: FsEventKind::Delete });
			}
		}
		EventKind::Modify(ModifyKind::Name(mode)) => match mode {
			RenameMode::Both if event.paths.len() >= 2 => {
				out.push(FsEvent { path: event.paths[0].clone(), kind: FsEventKind::Delete });
				out.push(FsEvent { path: event.paths[1].clone(), kind: FsEventKind::Create });
			}
			RenameMode::From => {
				for path in &event.paths {
					out.push(FsEvent { path: path.clone(), kind: FsEventKind::Delete });
				}
			}
			RenameMode::To => {
				for path in &event.paths {
					out.push(FsEvent { path: path.clone(), kind: FsEventKind::Create });
				}
			}
			// Ambiguous rename halves: existence decides the side
			_ => {
				for path in &event.paths {
					out.push(FsEvent {
						path: path.clone(),
						kind: if exists(path) { FsEventKind::Create } else { FsEventKind::Delete },
					});
				}
			}
		},
		EventKind::Modify(_) => {
			for path in &event.paths {
				out.push(FsEvent { path: path.clone(), kind: FsEventKind::Modify });
			}
		}
		_ => {}
	}
	out
}

fn exists(path: &Path) -> bool {
	std::fs::symlink_metadata(path).is_ok()
}


// vim: ts=4
