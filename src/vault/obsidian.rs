//! Obsidian vault backend
//!
//! Maintains the `_links/<hostname>/<abs-path>` symlink mirror so external
//! targets referenced by wiki-links stay navigable inside the vault tree.

use crate::error::WksError;
use crate::store::EdgeStore;
use crate::uri::Uri;
use crate::util;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Serialize)]
pub struct MirrorReport {
	pub symlinks_created: u64,
	pub symlinks_removed: u64,
}

/// Bring the `_links` mirror in line with the current edge set: one
/// symlink per locally-resolvable external target, dangling entries
/// removed.
pub async fn maintain_mirror(base: &Path, edges: &EdgeStore) -> Result<MirrorReport, WksError> {
	let mut report = MirrorReport::default();
	let links_dir = base.join("_links");

	for edge in edges.all().await? {
		if !edge.from_uri.starts_with("vault:///") {
			continue;
		}
		let Ok(Uri::File { host, path }) = Uri::parse(&edge.to_uri) else { continue };
		if host != util::hostname() || !path.exists() {
			continue;
		}
		let mirror = links_dir.join(&host).join(path.strip_prefix("/").unwrap_or(&path));
		if std::fs::symlink_metadata(&mirror).is_ok() {
			continue;
		}
		if let Some(parent) = mirror.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::os::unix::fs::symlink(&path, &mirror)?;
		debug!("mirrored {} at {}", path.display(), mirror.display());
		report.symlinks_created += 1;
	}

	report.symlinks_removed = sweep_dangling(&links_dir)?;
	Ok(report)
}

/// Remove mirror entries whose targets vanished; empty directories are
/// left behind (harmless, and keeps the sweep single-pass)
fn sweep_dangling(dir: &Path) -> Result<u64, WksError> {
	if !dir.exists() {
		return Ok(0);
	}
	let mut removed = 0;
	let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
	while let Some(current) = pending.pop() {
		for entry in std::fs::read_dir(&current)? {
			let path = entry?.path();
			let meta = std::fs::symlink_metadata(&path)?;
			if meta.file_type().is_symlink() {
				if !path.exists() {
					std::fs::remove_file(&path)?;
					removed += 1;
				}
			} else if meta.is_dir() {
				pending.push(path);
			}
		}
	}
	Ok(removed)
}


// vim: ts=4
