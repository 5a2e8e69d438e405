//! Link engine
//!
//! Parses notes on demand, resolves targets across vault-relative and
//! absolute URI schemes, and writes idempotent edge documents. `check` is
//! read-only; `sync` replaces a source's edge set atomically from the
//! point of view of any `from_uri` reader; `prune` drops edges whose
//! endpoints no longer exist.

pub mod parsers;

pub use parsers::{is_parseable_note, parser_for, LinkKind, Parser, RawLink};

use crate::config::Config;
use crate::db::Database;
use crate::error::WksError;
use crate::filter::FilterEngine;
use crate::store::{edges::edge_id, EdgeRecord, EdgeStatus, EdgeStore};
use crate::uri::Uri;
use crate::util;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Timeout for remote target probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which edge endpoint `link show` matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	From,
	To,
	Any,
}

impl FromStr for Direction {
	type Err = WksError;

	fn from_str(s: &str) -> Result<Self, WksError> {
		match s {
			"from" => Ok(Direction::From),
			"to" => Ok(Direction::To),
			"any" | "either" => Ok(Direction::Any),
			other => Err(WksError::other(format!(
				"unknown direction '{}' (expected from, to or any)",
				other
			))),
		}
	}
}

/// One resolved link as reported by `link check`
#[derive(Debug, Serialize)]
pub struct LinkInfo {
	pub to_uri: String,
	pub name: String,
	pub line_number: u32,
	pub column_number: u32,
	pub status: EdgeStatus,
}

#[derive(Debug, Serialize)]
pub struct LinkCheckReport {
	pub path: String,
	pub parser: String,
	pub links: Vec<LinkInfo>,
}

#[derive(Debug, Default, Serialize)]
pub struct LinkSyncReport {
	pub files_synced: u64,
	pub files_skipped: u64,
	pub edges_written: u64,
	pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct LinkPruneReport {
	pub removed_missing_source: u64,
	pub removed_missing_target: u64,
	pub removed_remote: u64,
}

/// A target resolved to its stored form
enum ResolvedTarget {
	Uri { uri: Uri, via_symlink: bool },
	Legacy { raw: String },
}

pub struct LinkEngine {
	vault_base: PathBuf,
	filter: FilterEngine,
	edges: EdgeStore,
}

impl LinkEngine {
	pub fn new(config: &Config, db: &Database) -> Result<LinkEngine, WksError> {
		Ok(LinkEngine {
			vault_base: util::normalize_path(&config.vault.base),
			filter: FilterEngine::new(&config.monitor.filter)?,
			edges: EdgeStore::open(db)?,
		})
	}

	pub fn edges(&self) -> &EdgeStore {
		&self.edges
	}

	pub fn vault_base(&self) -> &Path {
		&self.vault_base
	}

	/// Parse and classify without writing anything
	pub async fn check(
		&self,
		path: &Path,
		parser_override: Option<&str>,
		remote: bool,
	) -> Result<LinkCheckReport, WksError> {
		let path = util::normalize_path(path);
		let parser = parser_for(parser_override, &path).ok_or_else(|| WksError::Unsupported {
			message: format!("no parser named {:?}", parser_override.unwrap_or("?")),
		})?;
		let text = tokio::fs::read_to_string(&path).await?;
		let client = remote.then(probe_client).transpose()?;

		let mut links = Vec::new();
		for raw in parser.parse(&text) {
			let resolved = self.resolve(&raw, &path);
			let status = self.classify(&resolved, client.as_ref()).await;
			links.push(LinkInfo {
				to_uri: target_string(&resolved),
				name: raw.name,
				line_number: raw.line,
				column_number: raw.column,
				status,
			});
		}
		Ok(LinkCheckReport {
			path: path.display().to_string(),
			parser: parser.name().to_string(),
			links,
		})
	}

	/// Parse sources and replace their edge sets. The path must be
	/// monitored; directories require `recursive` to walk their notes.
	pub async fn sync(
		&self,
		path: &Path,
		recursive: bool,
		remote: bool,
		parser_override: Option<&str>,
	) -> Result<LinkSyncReport, WksError> {
		let path = util::normalize_path(path);
		let mut report = LinkSyncReport::default();
		let client = remote.then(probe_client).transpose()?;

		if path.is_dir() {
			let mut pending = vec![path];
			while let Some(dir) = pending.pop() {
				for entry in std::fs::read_dir(&dir)? {
					let entry_path = entry?.path();
					if entry_path.is_dir() {
						if recursive && self.filter.should_descend(&entry_path) {
							pending.push(entry_path);
						}
					} else if is_parseable_note(&entry_path) {
						if !self.filter.is_monitored(&entry_path).monitored {
							report.files_skipped += 1;
							continue;
						}
						match self
							.sync_file(&entry_path, parser_override, client.as_ref())
							.await
						{
							Ok(n) => {
								report.files_synced += 1;
								report.edges_written += n;
							}
							Err(e) => {
								report.errors.push(format!("{}: {}", entry_path.display(), e))
							}
						}
					}
				}
			}
			return Ok(report);
		}

		if !self.filter.is_monitored(&path).monitored {
			return Err(WksError::PathNotMonitored { path: path.display().to_string() });
		}
		let written = self.sync_file(&path, parser_override, client.as_ref()).await?;
		report.files_synced = 1;
		report.edges_written = written;
		Ok(report)
	}

	async fn sync_file(
		&self,
		path: &Path,
		parser_override: Option<&str>,
		client: Option<&reqwest::Client>,
	) -> Result<u64, WksError> {
		let parser = parser_for(parser_override, path).ok_or_else(|| WksError::Unsupported {
			message: format!("no parser named {:?}", parser_override.unwrap_or("?")),
		})?;
		let text = tokio::fs::read_to_string(path).await?;
		let from_uri = Uri::for_local_path(path, Some(&self.vault_base)).to_string();

		let now = util::iso8601(util::now_utc());
		let mut records = Vec::new();
		for raw in parser.parse(&text) {
			let resolved = self.resolve(&raw, path);
			let status = self.classify(&resolved, client).await;
			let to_uri = target_string(&resolved);
			records.push(EdgeRecord {
				id: edge_id(&from_uri, raw.line, raw.column, &to_uri),
				from_uri: from_uri.clone(),
				to_uri,
				line_number: raw.line,
				column_number: raw.column,
				name: raw.name,
				parser: parser.name().to_string(),
				status,
				first_seen: now.clone(),
				last_seen: now.clone(),
				last_updated: now.clone(),
			});
		}
		// Two occurrences of the same target on the same position can only
		// happen through pathological input; last write wins there, which
		// the deterministic IDs make stable
		let written = self.edges.replace_for_source(&from_uri, records).await?;
		debug!("replaced {} edges for {}", written, from_uri);
		Ok(written as u64)
	}

	/// List edges touching `uri` in the requested direction
	pub async fn show(
		&self,
		uri: &str,
		direction: Direction,
	) -> Result<Vec<EdgeRecord>, WksError> {
		match direction {
			Direction::From => self.edges.find_from(uri).await,
			Direction::To => self.edges.find_to(uri).await,
			Direction::Any => {
				let mut out = self.edges.find_from(uri).await?;
				for e in self.edges.find_to(uri).await? {
					if !out.iter().any(|o| o.id == e.id) {
						out.push(e);
					}
				}
				Ok(out)
			}
		}
	}

	/// Drop edges whose source or local target no longer exists; with
	/// `remote`, also probe web targets and drop failures
	pub async fn prune(&self, remote: bool) -> Result<LinkPruneReport, WksError> {
		let mut report = LinkPruneReport::default();
		let client = remote.then(probe_client).transpose()?;

		for edge in self.edges.all().await? {
			let source_gone = Uri::parse(&edge.from_uri)
				.ok()
				.and_then(|u| u.to_local_path(Some(&self.vault_base)))
				.map(|p| !p.exists())
				.unwrap_or(false);
			if source_gone {
				self.edges.delete(&edge.id).await?;
				report.removed_missing_source += 1;
				continue;
			}

			match Uri::parse(&edge.to_uri) {
				Ok(Uri::Web { url }) => {
					if let Some(client) = client.as_ref() {
						if !probe(client, &url).await {
							self.edges.delete(&edge.id).await?;
							report.removed_remote += 1;
						}
					}
				}
				Ok(target) => {
					let gone = target
						.to_local_path(Some(&self.vault_base))
						.map(|p| !p.exists())
						.unwrap_or(false);
					if gone {
						self.edges.delete(&edge.id).await?;
						report.removed_missing_target += 1;
					}
				}
				Err(_) => {} // legacy targets age out via source pruning
			}
		}
		Ok(report)
	}

	/// Resolution rules, in order: explicit schemes, wiki targets against
	/// the vault root, `_links/` symlink mirror paths, then plain paths
	/// against the source directory
	fn resolve(&self, raw: &RawLink, source: &Path) -> ResolvedTarget {
		let target = raw.target.as_str();

		if target.starts_with("http://") || target.starts_with("https://") {
			return ResolvedTarget::Uri {
				uri: Uri::Web { url: target.to_string() },
				via_symlink: false,
			};
		}
		if target.contains("://") {
			return match Uri::parse(target) {
				Ok(uri) => ResolvedTarget::Uri { uri, via_symlink: false },
				Err(_) => ResolvedTarget::Legacy { raw: target.to_string() },
			};
		}

		if raw.kind == LinkKind::Wiki {
			if let Some(rest) = target.strip_prefix("_links/") {
				return self.resolve_symlink_target(rest);
			}
			let mut rel = PathBuf::from(target.trim_start_matches('/'));
			if rel.extension().is_none() {
				rel.set_extension("md");
			}
			return ResolvedTarget::Uri { uri: Uri::Vault { path: rel }, via_symlink: false };
		}

		if let Some(rest) = target.strip_prefix("_links/") {
			return self.resolve_symlink_target(rest);
		}

		let path = if Path::new(target).is_absolute() {
			PathBuf::from(target)
		} else {
			source.parent().unwrap_or(Path::new("/")).join(target)
		};
		ResolvedTarget::Uri {
			uri: Uri::for_local_path(&path, Some(&self.vault_base)),
			via_symlink: false,
		}
	}

	/// `_links/<host>/<abs-path>` mirrors an external file inside the vault
	fn resolve_symlink_target(&self, rest: &str) -> ResolvedTarget {
		match rest.split_once('/') {
			Some((host, abs)) if !host.is_empty() && !abs.is_empty() => ResolvedTarget::Uri {
				uri: Uri::File { host: host.to_string(), path: PathBuf::from(format!("/{}", abs)) },
				via_symlink: true,
			},
			_ => ResolvedTarget::Legacy { raw: format!("_links/{}", rest) },
		}
	}

	async fn classify(
		&self,
		resolved: &ResolvedTarget,
		client: Option<&reqwest::Client>,
	) -> EdgeStatus {
		match resolved {
			ResolvedTarget::Legacy { .. } => EdgeStatus::Legacy,
			ResolvedTarget::Uri { uri: Uri::Web { url }, .. } => match client {
				Some(client) => {
					if probe(client, url).await {
						EdgeStatus::Ok
					} else {
						EdgeStatus::MissingTarget
					}
				}
				None => EdgeStatus::Ok,
			},
			ResolvedTarget::Uri { uri: Uri::Vault { path }, .. } => {
				if self.vault_base.join(path).exists() {
					EdgeStatus::Ok
				} else {
					EdgeStatus::MissingTarget
				}
			}
			ResolvedTarget::Uri { uri: uri @ Uri::File { host, path }, via_symlink } => {
				if *via_symlink {
					let mirror =
						self.vault_base.join("_links").join(host).join(
							path.strip_prefix("/").unwrap_or(path),
						);
					if std::fs::symlink_metadata(&mirror).is_err() {
						return EdgeStatus::MissingSymlink;
					}
				}
				match uri.to_local_path(Some(&self.vault_base)) {
					Some(local) => {
						if local.exists() {
							EdgeStatus::Ok
						} else {
							EdgeStatus::MissingTarget
						}
					}
					// A foreign host cannot be checked from here
					None => EdgeStatus::Ok,
				}
			}
		}
	}
}

fn target_string(resolved: &ResolvedTarget) -> String {
	match resolved {
		ResolvedTarget::Uri { uri, .. } => uri.to_string(),
		ResolvedTarget::Legacy { raw } => raw.clone(),
	}
}

fn probe_client() -> Result<reqwest::Client, WksError> {
	reqwest::Client::builder()
		.timeout(PROBE_TIMEOUT)
		.build()
		.map_err(|e| WksError::other(format!("probe client: {}", e)))
}

async fn probe(client: &reqwest::Client, url: &str) -> bool {
	match client.head(url).send().await {
		Ok(resp) => resp.status().is_success() || resp.status().is_redirection(),
		Err(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::WksHome;
	use std::fs;
	use tempfile::TempDir;

	struct Fixture {
		_tmp: TempDir,
		vault: PathBuf,
		engine: LinkEngine,
	}

	fn fixture() -> Fixture {
		let tmp = TempDir::new().unwrap();
		let vault = tmp.path().join("vault");
		fs::create_dir_all(&vault).unwrap();

		let home = WksHome::at(tmp.path().join("wks")).unwrap();
		let mut config = Config::starter(&home);
		config.vault.base = vault.clone();
		config.monitor.filter.include_paths.push(vault.clone());

		let engine = LinkEngine::new(&config, &Database::memory("wks")).unwrap();
		Fixture { _tmp: tmp, vault, engine }
	}

	fn note(vault: &Path, rel: &str, content: &str) -> PathBuf {
		let path = vault.join(rel);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(&path, content).unwrap();
		path
	}

	#[tokio::test]
	async fn test_sync_writes_vault_edges() {
		let f = fixture();
		let path = note(&f.vault, "Projects/A.md", "[[B]]\n![[img.png]]\n");

		let report = f.engine.sync(&path, false, false, None).await.unwrap();
		assert_eq!(report.edges_written, 2);

		let edges = f.engine.edges().find_from("vault:///Projects/A.md").await.unwrap();
		assert_eq!(edges.len(), 2);
		let targets: Vec<&str> = edges.iter().map(|e| e.to_uri.as_str()).collect();
		assert!(targets.contains(&"vault:///B.md"));
		assert!(targets.contains(&"vault:///img.png"));
	}

	#[tokio::test]
	async fn test_sync_replay_is_byte_identical() {
		let f = fixture();
		let path = note(&f.vault, "Projects/A.md", "[[B]]\n![[img.png]]\n");

		f.engine.sync(&path, false, false, None).await.unwrap();
		let mut first = f.engine.edges().find_from("vault:///Projects/A.md").await.unwrap();
		first.sort_by(|a, b| a.id.cmp(&b.id));

		f.engine.sync(&path, false, false, None).await.unwrap();
		let mut second = f.engine.edges().find_from("vault:///Projects/A.md").await.unwrap();
		second.sort_by(|a, b| a.id.cmp(&b.id));

		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn test_sync_requires_monitored_path() {
		let f = fixture();
		let tmp2 = TempDir::new().unwrap();
		let outside = tmp2.path().join("x.md");
		fs::write(&outside, "[[B]]\n").unwrap();

		let err = f.engine.sync(&outside, false, false, None).await.unwrap_err();
		assert_eq!(err.kind(), "path_not_monitored");
	}

	#[tokio::test]
	async fn test_check_classifies_missing_target() {
		let f = fixture();
		note(&f.vault, "B.md", "present\n");
		let path = note(&f.vault, "A.md", "[[B]]\n[[Ghost]]\nhttps://example.org/x\n");

		let report = f.engine.check(&path, None, false).await.unwrap();
		assert_eq!(report.parser, "markdown");
		assert_eq!(report.links.len(), 3);
		assert_eq!(report.links[0].status, EdgeStatus::Ok);
		assert_eq!(report.links[1].status, EdgeStatus::MissingTarget);
		assert_eq!(report.links[2].status, EdgeStatus::Ok);
	}

	#[tokio::test]
	async fn test_relative_target_resolves_against_source_dir() {
		let f = fixture();
		note(&f.vault, "docs/guide.md", "target\n");
		let path = note(&f.vault, "docs/index.md", "[guide](./guide.md)\n");

		f.engine.sync(&path, false, false, None).await.unwrap();
		let edges = f.engine.edges().find_from("vault:///docs/index.md").await.unwrap();
		assert_eq!(edges[0].to_uri, "vault:///docs/guide.md");
		assert_eq!(edges[0].status, EdgeStatus::Ok);
	}

	#[tokio::test]
	async fn test_legacy_scheme_classified() {
		let f = fixture();
		let path = note(&f.vault, "A.md", "[x](obsidian://open?vault=v)\n");

		let report = f.engine.check(&path, None, false).await.unwrap();
		assert_eq!(report.links[0].status, EdgeStatus::Legacy);
	}

	#[tokio::test]
	async fn test_missing_symlink_classification() {
		let f = fixture();
		let path = note(&f.vault, "A.md", "[[_links/otherhost/etc/hosts]]\n");

		let report = f.engine.check(&path, None, false).await.unwrap();
		assert_eq!(report.links[0].status, EdgeStatus::MissingSymlink);
		assert_eq!(report.links[0].to_uri, "file://otherhost/etc/hosts");
	}

	#[tokio::test]
	async fn test_show_directions() {
		let f = fixture();
		let a = note(&f.vault, "A.md", "[[B]]\n");
		note(&f.vault, "B.md", "[[A]]\n");
		f.engine.sync(&a, false, false, None).await.unwrap();
		f.engine.sync(&f.vault.join("B.md"), false, false, None).await.unwrap();

		let from = f.engine.show("vault:///A.md", Direction::From).await.unwrap();
		assert_eq!(from.len(), 1);
		let to = f.engine.show("vault:///A.md", Direction::To).await.unwrap();
		assert_eq!(to.len(), 1);
		let any = f.engine.show("vault:///A.md", Direction::Any).await.unwrap();
		assert_eq!(any.len(), 2);
	}

	#[tokio::test]
	async fn test_prune_removes_dead_edges() {
		let f = fixture();
		let a = note(&f.vault, "A.md", "[[B]]\n");
		let b = note(&f.vault, "B.md", "x\n");
		f.engine.sync(&a, false, false, None).await.unwrap();

		// Target vanishes: its edge goes on the next prune
		fs::remove_file(&b).unwrap();
		let report = f.engine.prune(false).await.unwrap();
		assert_eq!(report.removed_missing_target, 1);

		// Source vanishes: re-sync then prune from the other side
		f.engine.sync(&a, false, false, None).await.unwrap();
		fs::remove_file(&a).unwrap();
		let report = f.engine.prune(false).await.unwrap();
		assert_eq!(report.removed_missing_source, 1);
		assert_eq!(f.engine.edges().count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_directory_sync_walks_notes() {
		let f = fixture();
		note(&f.vault, "a/one.md", "[[B]]\n");
		note(&f.vault, "b/two.md", "[[C]]\n");
		note(&f.vault, "b/skip.bin", "https://example.org\n");

		let report = f.engine.sync(&f.vault, true, false, None).await.unwrap();
		assert_eq!(report.files_synced, 2);
		assert_eq!(report.edges_written, 2);
	}
}

// vim: ts=4
