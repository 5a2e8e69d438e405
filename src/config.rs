//! Configuration loading, validation and persistence
//!
//! A single document at `{WKS_HOME}/config.json` drives every subsystem.
//! Every field is required and unknown keys are rejected; validation names
//! the exact dotted JSON path of anything missing or malformed. Handlers
//! receive a loaded `Config` value and never read the disk themselves.

use crate::error::WksError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolved WKS home directory and the well-known files inside it
#[derive(Debug, Clone)]
pub struct WksHome {
	dir: PathBuf,
}

impl WksHome {
	/// Resolve `WKS_HOME` (default `~/.wks`) and ensure the directory exists
	pub fn resolve() -> Result<Self, WksError> {
		let dir = match std::env::var("WKS_HOME") {
			Ok(d) if !d.is_empty() => util::normalize_path(Path::new(&d)),
			_ => {
				let home = std::env::var("HOME")
					.map_err(|_| WksError::other("could not determine HOME directory"))?;
				PathBuf::from(home).join(".wks")
			}
		};
		Self::at(dir)
	}

	/// Use an explicit home directory, creating it if needed
	pub fn at(dir: PathBuf) -> Result<Self, WksError> {
		if dir.exists() {
			if !dir.is_dir() {
				return Err(WksError::other(format!(
					"{} exists but is not a directory",
					dir.display()
				)));
			}
		} else {
			std::fs::create_dir_all(&dir)?;
		}
		Ok(WksHome { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn config_path(&self) -> PathBuf {
		self.dir.join("config.json")
	}

	pub fn lock_path(&self) -> PathBuf {
		self.dir.join("daemon.lock")
	}

	pub fn status_path(&self) -> PathBuf {
		self.dir.join("daemon.json")
	}

	pub fn vault_state_path(&self) -> PathBuf {
		self.dir.join("vault.json")
	}

	pub fn logfile_path(&self) -> PathBuf {
		self.dir.join("logfile")
	}
}

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub monitor: MonitorConfig,
	pub vault: VaultConfig,
	pub database: DatabaseConfig,
	pub service: ServiceConfig,
	pub daemon: DaemonConfig,
	pub log: LogConfig,
	pub transform: TransformConfig,
	pub diff: DiffConfig,
	pub index: IndexConfig,
	pub search: SearchConfig,
	pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
	/// Records below this priority are not kept
	pub min_priority: f64,

	/// Hard cap on the node collection; lowest priority pruned first
	pub max_documents: u64,

	pub filter: FilterConfig,
	pub priority: PriorityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
	pub include_paths: Vec<PathBuf>,
	pub exclude_paths: Vec<PathBuf>,
	pub include_dirnames: Vec<String>,
	pub exclude_dirnames: Vec<String>,
	pub include_globs: Vec<String>,
	pub exclude_globs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriorityConfig {
	/// Managed directories and their base priorities
	pub dirs: BTreeMap<PathBuf, f64>,

	/// Applied once per component below the managed directory
	pub depth_multiplier: f64,

	/// Applied once per leading underscore of a component
	pub underscore_multiplier: f64,

	/// Applied when a component is exactly `_`
	pub only_underscore_multiplier: f64,

	/// Extension (without dot, lowercase) to weight
	pub extension_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
	/// Absolute path of the vault base directory
	pub base: PathBuf,

	/// Vault backend identifier (`obsidian` is the only registered one)
	pub backend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
	/// Backend identifier: `redb` or `memory`
	pub backend: String,

	/// Store location for file-backed backends
	pub path: PathBuf,

	/// Collection name prefix, mandatory at the handle boundary
	pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
	/// Service unit name used by the OS adapters
	pub name: String,

	/// Environment variable carrying the persisted `--restrict` override
	pub restrict_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
	/// Debounce tick: the queue is drained every this many seconds
	pub sync_interval_secs: u64,

	/// Database health-check interval
	pub health_interval_secs: u64,

	/// Bound on the coalescing event queue
	pub queue_capacity: usize,

	/// Grace period for in-flight syncs on shutdown
	pub grace_period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
	pub debug_retention_days: u32,
	pub info_retention_days: u32,
	pub warning_retention_days: u32,
	pub error_retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
	/// Directory holding `<checksum>.<ext>` artifacts
	pub cache_dir: PathBuf,

	/// On-disk cap for the cache; LRU eviction beyond it
	pub max_size_bytes: u64,

	/// MIME type to default engine name
	pub default_engines: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffConfig {
	pub engine: String,
	pub context_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
	pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
	pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayConfig {
	/// Stage-4 output format: `yaml` or `json`
	pub format: String,

	/// `auto`, `always` or `never`
	pub color: String,
}

impl Config {
	/// Load and validate the configuration document
	pub fn load(path: &Path) -> Result<Config, WksError> {
		let raw = std::fs::read_to_string(path).map_err(|e| WksError::ConfigInvalid {
			path: path.display().to_string(),
			found: format!("unreadable file ({})", e),
			expected: "a JSON configuration document".to_string(),
		})?;

		let mut config: Config =
			serde_json::from_str(&raw).map_err(|e| WksError::ConfigInvalid {
				path: path.display().to_string(),
				found: e.to_string(),
				expected: "a complete configuration document with all sections".to_string(),
			})?;

		config.canonicalize();
		config.validate()?;
		Ok(config)
	}

	/// Persist the document atomically (write-temp then rename) and return
	/// the serialized form
	pub fn save(&self, path: &Path) -> Result<(), WksError> {
		self.validate()?;
		let json = serde_json::to_string_pretty(self)?;
		let tmp = path.with_extension("json.tmp");
		std::fs::write(&tmp, json.as_bytes())?;
		std::fs::rename(&tmp, path)?;
		Ok(())
	}

	/// Normalize every configured path lexically so comparisons are stable
	fn canonicalize(&mut self) {
		for list in [&mut self.monitor.filter.include_paths, &mut self.monitor.filter.exclude_paths]
		{
			for p in list.iter_mut() {
				*p = util::normalize_path(p);
			}
		}
		self.monitor.priority.dirs = self
			.monitor
			.priority
			.dirs
			.iter()
			.map(|(k, v)| (util::normalize_path(k), *v))
			.collect();
		self.vault.base = util::normalize_path(&self.vault.base);
		self.database.path = util::normalize_path(&self.database.path);
		self.transform.cache_dir = util::normalize_path(&self.transform.cache_dir);
	}

	/// Semantic validation with exact dotted paths in every error
	pub fn validate(&self) -> Result<(), WksError> {
		fn positive(path: &str, v: f64) -> Result<(), WksError> {
			if v > 0.0 && v.is_finite() {
				Ok(())
			} else {
				Err(WksError::ConfigInvalid {
					path: path.to_string(),
					found: v.to_string(),
					expected: "a finite number > 0".to_string(),
				})
			}
		}

		positive("monitor.min_priority", self.monitor.min_priority)?;
		if self.monitor.max_documents == 0 {
			return Err(WksError::ConfigInvalid {
				path: "monitor.max_documents".to_string(),
				found: "0".to_string(),
				expected: "an integer > 0".to_string(),
			});
		}

		let pr = &self.monitor.priority;
		positive("monitor.priority.depth_multiplier", pr.depth_multiplier)?;
		positive("monitor.priority.underscore_multiplier", pr.underscore_multiplier)?;
		positive("monitor.priority.only_underscore_multiplier", pr.only_underscore_multiplier)?;
		for (dir, base) in &pr.dirs {
			positive(&format!("monitor.priority.dirs.{}", dir.display()), *base)?;
			if !dir.is_absolute() {
				return Err(WksError::ConfigInvalid {
					path: format!("monitor.priority.dirs.{}", dir.display()),
					found: dir.display().to_string(),
					expected: "an absolute directory path".to_string(),
				});
			}
		}
		for (ext, weight) in &pr.extension_weights {
			positive(&format!("monitor.priority.extension_weights.{}", ext), *weight)?;
		}

		Self::check_list_conflicts(
			"monitor.filter.include_paths",
			"monitor.filter.exclude_paths",
			&self.monitor.filter.include_paths,
			&self.monitor.filter.exclude_paths,
		)?;
		Self::check_name_conflicts(
			"monitor.filter.include_dirnames",
			"monitor.filter.exclude_dirnames",
			&self.monitor.filter.include_dirnames,
			&self.monitor.filter.exclude_dirnames,
		)?;
		Self::check_name_conflicts(
			"monitor.filter.include_globs",
			"monitor.filter.exclude_globs",
			&self.monitor.filter.include_globs,
			&self.monitor.filter.exclude_globs,
		)?;
		for (path, globs) in [
			("monitor.filter.include_globs", &self.monitor.filter.include_globs),
			("monitor.filter.exclude_globs", &self.monitor.filter.exclude_globs),
		] {
			for g in globs {
				if globset::Glob::new(g).is_err() {
					return Err(WksError::ConfigInvalid {
						path: path.to_string(),
						found: g.clone(),
						expected: "a valid glob pattern".to_string(),
					});
				}
			}
		}

		if !self.vault.base.is_absolute() {
			return Err(WksError::ConfigInvalid {
				path: "vault.base".to_string(),
				found: self.vault.base.display().to_string(),
				expected: "an absolute directory path".to_string(),
			});
		}
		if self.vault.backend != "obsidian" {
			return Err(WksError::ConfigInvalid {
				path: "vault.backend".to_string(),
				found: self.vault.backend.clone(),
				expected: "\"obsidian\"".to_string(),
			});
		}

		if self.database.prefix.is_empty() || self.database.prefix.contains('.') {
			return Err(WksError::ConfigInvalid {
				path: "database.prefix".to_string(),
				found: format!("{:?}", self.database.prefix),
				expected: "a non-empty name without dots".to_string(),
			});
		}
		if self.database.backend != "redb" && self.database.backend != "memory" {
			return Err(WksError::ConfigInvalid {
				path: "database.backend".to_string(),
				found: self.database.backend.clone(),
				expected: "\"redb\" or \"memory\"".to_string(),
			});
		}

		for (path, v) in [
			("daemon.sync_interval_secs", self.daemon.sync_interval_secs),
			("daemon.health_interval_secs", self.daemon.health_interval_secs),
			("daemon.grace_period_secs", self.daemon.grace_period_secs),
		] {
			if v == 0 {
				return Err(WksError::ConfigInvalid {
					path: path.to_string(),
					found: "0".to_string(),
					expected: "an integer > 0".to_string(),
				});
			}
		}
		if self.daemon.queue_capacity == 0 {
			return Err(WksError::ConfigInvalid {
				path: "daemon.queue_capacity".to_string(),
				found: "0".to_string(),
				expected: "an integer > 0".to_string(),
			});
		}

		if self.transform.max_size_bytes == 0 {
			return Err(WksError::ConfigInvalid {
				path: "transform.max_size_bytes".to_string(),
				found: "0".to_string(),
				expected: "an integer > 0".to_string(),
			});
		}

		if self.display.format != "yaml" && self.display.format != "json" {
			return Err(WksError::ConfigInvalid {
				path: "display.format".to_string(),
				found: self.display.format.clone(),
				expected: "\"yaml\" or \"json\"".to_string(),
			});
		}
		if !matches!(self.display.color.as_str(), "auto" | "always" | "never") {
			return Err(WksError::ConfigInvalid {
				path: "display.color".to_string(),
				found: self.display.color.clone(),
				expected: "\"auto\", \"always\" or \"never\"".to_string(),
			});
		}

		Ok(())
	}

	fn check_list_conflicts(
		include_path: &str,
		exclude_path: &str,
		include: &[PathBuf],
		exclude: &[PathBuf],
	) -> Result<(), WksError> {
		for (label, list) in [(include_path, include), (exclude_path, exclude)] {
			for (i, a) in list.iter().enumerate() {
				if list[..i].contains(a) {
					return Err(WksError::Conflict {
						message: format!("duplicate entry {} in {}", a.display(), label),
					});
				}
			}
		}
		for a in include {
			if exclude.contains(a) {
				return Err(WksError::Conflict {
					message: format!(
						"{} appears in both {} and {}",
						a.display(),
						include_path,
						exclude_path
					),
				});
			}
		}
		Ok(())
	}

	fn check_name_conflicts(
		include_path: &str,
		exclude_path: &str,
		include: &[String],
		exclude: &[String],
	) -> Result<(), WksError> {
		for (label, list) in [(include_path, include), (exclude_path, exclude)] {
			for (i, a) in list.iter().enumerate() {
				if list[..i].contains(a) {
					return Err(WksError::Conflict {
						message: format!("duplicate entry {:?} in {}", a, label),
					});
				}
			}
		}
		for a in include {
			if exclude.contains(a) {
				return Err(WksError::Conflict {
					message: format!("{:?} appears in both {} and {}", a, include_path, exclude_path),
				});
			}
		}
		Ok(())
	}

	/// A complete starter document for `config init`
	pub fn starter(home: &WksHome) -> Config {
		let home_dir = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
		Config {
			monitor: MonitorConfig {
				min_priority: 1.0,
				max_documents: 10_000,
				filter: FilterConfig::default(),
				priority: PriorityConfig {
					dirs: BTreeMap::new(),
					depth_multiplier: 0.9,
					underscore_multiplier: 0.5,
					only_underscore_multiplier: 0.1,
					extension_weights: BTreeMap::new(),
				},
			},
			vault: VaultConfig {
				base: PathBuf::from(&home_dir).join("vault"),
				backend: "obsidian".to_string(),
			},
			database: DatabaseConfig {
				backend: "redb".to_string(),
				path: home.dir().join("wks.redb"),
				prefix: "wks".to_string(),
			},
			service: ServiceConfig {
				name: "wks-daemon".to_string(),
				restrict_env: "WKS_RESTRICT".to_string(),
			},
			daemon: DaemonConfig {
				sync_interval_secs: 2,
				health_interval_secs: 30,
				queue_capacity: 4096,
				grace_period_secs: 5,
			},
			log: LogConfig {
				debug_retention_days: 1,
				info_retention_days: 7,
				warning_retention_days: 30,
				error_retention_days: 90,
			},
			transform: TransformConfig {
				cache_dir: home.dir().join("cache"),
				max_size_bytes: 1_073_741_824,
				default_engines: BTreeMap::from([
					("text/plain".to_string(), "text".to_string()),
					("text/markdown".to_string(), "text".to_string()),
					("application/octet-stream".to_string(), "hexdump".to_string()),
				]),
			},
			diff: DiffConfig { engine: "unified".to_string(), context_lines: 3 },
			index: IndexConfig { enabled: false },
			search: SearchConfig { enabled: false },
			display: DisplayConfig { format: "yaml".to_string(), color: "auto".to_string() },
		}
	}
}


// vim: ts=4
