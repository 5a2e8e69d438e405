//! Vault: a thin specialization of the link engine
//!
//! The vault is a user-chosen root whose notes address each other through
//! portable `vault:///` URIs. Its base is registered as a monitored
//! include path (with `_links/` excluded) through the monitor's mutation
//! API, recorded in `{WKS_HOME}/vault.json` so re-registration only
//! happens when the base moves.

pub mod obsidian;

pub use obsidian::MirrorReport;

use crate::config::{Config, WksHome};
use crate::error::WksError;
use crate::links::{LinkEngine, LinkSyncReport};
use crate::monitor::{self, FilterList};
use crate::store::EdgeStatus;
use crate::util;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Last registered include/exclude paths, persisted as vault.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultState {
	pub include_path: PathBuf,
	pub exclude_path: PathBuf,
}

/// Register the vault base with the monitor configuration when it is new
/// or has moved. Returns true when the configuration was rewritten (the
/// caller owes the user a daemon-restart notice).
pub fn ensure_registered(config: &mut Config, home: &WksHome) -> Result<bool, WksError> {
	let base = util::normalize_path(&config.vault.base);
	let desired =
		VaultState { include_path: base.clone(), exclude_path: base.join("_links") };

	let state_path = home.vault_state_path();
	let current: Option<VaultState> = match std::fs::read_to_string(&state_path) {
		Ok(raw) => serde_json::from_str(&raw).ok(),
		Err(_) => None,
	};
	if current.as_ref() == Some(&desired)
		&& config.monitor.filter.include_paths.contains(&desired.include_path)
	{
		return Ok(false);
	}

	// Retire the previous registration before adding the new one
	if let Some(old) = current {
		let _ = monitor::filter_remove(
			config,
			FilterList::IncludePaths,
			&old.include_path.display().to_string(),
		);
		let _ = monitor::filter_remove(
			config,
			FilterList::ExcludePaths,
			&old.exclude_path.display().to_string(),
		);
	}
	if !config.monitor.filter.include_paths.contains(&desired.include_path) {
		monitor::filter_add(
			config,
			FilterList::IncludePaths,
			&desired.include_path.display().to_string(),
		)?;
	}
	if !config.monitor.filter.exclude_paths.contains(&desired.exclude_path) {
		monitor::filter_add(
			config,
			FilterList::ExcludePaths,
			&desired.exclude_path.display().to_string(),
		)?;
	}

	std::fs::write(&state_path, serde_json::to_string_pretty(&desired)?)?;
	config.save(&home.config_path())?;
	info!("registered vault base {}", desired.include_path.display());
	Ok(true)
}

/// `vault status`: counts for vault-sourced edges plus invariant findings
#[derive(Debug, Serialize)]
pub struct VaultStatusReport {
	pub base: String,
	pub edges_from_vault: u64,
	pub broken: u64,
	pub issues: Vec<String>,
}

/// `vault check`: broken links with their positions
#[derive(Debug, Serialize)]
pub struct VaultCheckEntry {
	pub path: String,
	pub line_number: u32,
	pub to_uri: String,
	pub status: EdgeStatus,
}

#[derive(Debug, Serialize)]
pub struct VaultSyncReport {
	pub links: LinkSyncReport,
	pub mirror: MirrorReport,
}

pub struct Vault<'a> {
	base: PathBuf,
	backend: &'a str,
	links: &'a LinkEngine,
}

impl<'a> Vault<'a> {
	pub fn new(config: &'a Config, links: &'a LinkEngine) -> Vault<'a> {
		Vault {
			base: util::normalize_path(&config.vault.base),
			backend: &config.vault.backend,
			links,
		}
	}

	/// Report on vault-sourced edges only, and verify that nothing outside
	/// the vault claims a `vault:///` target
	pub async fn status(&self) -> Result<VaultStatusReport, WksError> {
		let mut edges_from_vault = 0;
		let mut broken = 0;
		let mut issues = Vec::new();

		for edge in self.links.edges().all().await? {
			let from_vault = edge.from_uri.starts_with("vault:///");
			if from_vault {
				edges_from_vault += 1;
				if edge.status != EdgeStatus::Ok {
					broken += 1;
				}
			} else if edge.to_uri.starts_with("vault:///") {
				issues.push(format!(
					"edge {} -> {} targets the vault from outside it",
					edge.from_uri, edge.to_uri
				));
			}
		}

		Ok(VaultStatusReport {
			base: self.base.display().to_string(),
			edges_from_vault,
			broken,
			issues,
		})
	}

	/// Link-sync the vault (or one path inside it), then run the backend's
	/// post-sync routine
	pub async fn sync(&self, path: Option<&Path>, remote: bool) -> Result<VaultSyncReport, WksError> {
		let target = match path {
			Some(p) => {
				let p = util::normalize_path(p);
				if !p.starts_with(&self.base) {
					return Err(WksError::other(format!(
						"{} is outside the vault base {}",
						p.display(),
						self.base.display()
					)));
				}
				p
			}
			None => self.base.clone(),
		};

		let links = self.links.sync(&target, true, remote, None).await?;
		let mirror = match self.backend {
			"obsidian" => obsidian::maintain_mirror(&self.base, self.links.edges()).await?,
			other => {
				return Err(WksError::Unsupported {
					message: format!("vault backend '{}'", other),
				})
			}
		};
		Ok(VaultSyncReport { links, mirror })
	}

	/// Walk vault notes and report broken links with their positions
	pub async fn check(&self, path: Option<&Path>) -> Result<Vec<VaultCheckEntry>, WksError> {
		let root = match path {
			Some(p) => util::normalize_path(p),
			None => self.base.clone(),
		};

		let mut out = Vec::new();
		let mut pending = vec![root];
		while let Some(dir) = pending.pop() {
			if dir.is_file() {
				self.check_file(&dir, &mut out).await?;
				continue;
			}
			for entry in std::fs::read_dir(&dir)? {
				let path = entry?.path();
				if path.is_dir() {
					if path.file_name().map(|n| n != "_links").unwrap_or(false) {
						pending.push(path);
					}
				} else if crate::links::is_parseable_note(&path) {
					self.check_file(&path, &mut out).await?;
				}
			}
		}
		Ok(out)
	}

	async fn check_file(
		&self,
		path: &Path,
		out: &mut Vec<VaultCheckEntry>,
	) -> Result<(), WksError> {
		let report = self.links.check(path, None, false).await?;
		for link in report.links {
			if link.status != EdgeStatus::Ok {
				out.push(VaultCheckEntry {
					path: report.path.clone(),
					line_number: link.line_number,
					to_uri: link.to_uri,
					status: link.status,
				});
			}
		}
		Ok(())
	}
}


// vim: ts=4
