//! Transform cache
//!
//! Artifacts are keyed by `(file_checksum, engine, options_hash)` and live
//! at `<cache_dir>/<artifact_checksum>.<ext>`. A metadata row mirrors each
//! artifact one-to-one; every mutation touches both sides in one logical
//! step with compensating cleanup on partial failure, and `audit` corrects
//! any divergence it still finds.

pub mod engine;

pub use engine::{engine_named, engine_names, TransformEngine};

use crate::config::{MonitorConfig, TransformConfig};
use crate::db::Database;
use crate::error::WksError;
use crate::priority;
use crate::store::{
	edges::edge_id, transform::cache_key, EdgeRecord, EdgeStatus, EdgeStore, NodeRecord,
	NodeStore, TransformRecord, TransformStore,
};
use crate::uri::Uri;
use crate::util;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of a transform request
#[derive(Debug, Serialize)]
pub struct TransformOutcome {
	pub checksum: String,
	pub cache_uri: String,
	pub engine: String,
	pub hit: bool,
	pub evicted: u64,
	pub warnings: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct ResetReport {
	pub rows_deleted: u64,
	pub files_deleted: u64,
	pub orphans: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
	pub rows_removed: Vec<String>,
	pub files_removed: Vec<String>,
}

pub struct TransformCache {
	cache_dir: PathBuf,
	max_size_bytes: u64,
	default_engines: BTreeMap<String, String>,
	store: TransformStore,
}

impl TransformCache {
	pub fn new(config: &TransformConfig, db: &Database) -> Result<TransformCache, WksError> {
		Ok(TransformCache {
			cache_dir: util::normalize_path(&config.cache_dir),
			max_size_bytes: config.max_size_bytes,
			default_engines: config.default_engines.clone(),
			store: TransformStore::open(db)?,
		})
	}

	pub fn store(&self) -> &TransformStore {
		&self.store
	}

	pub fn cache_dir(&self) -> &Path {
		&self.cache_dir
	}

	fn artifact_path(&self, checksum: &str, ext: &str) -> PathBuf {
		self.cache_dir.join(format!("{}.{}", checksum, ext))
	}

	/// Run (or reuse) a transformation
	pub async fn transform(
		&self,
		engine_name: &str,
		file: &Path,
		options: &Value,
	) -> Result<TransformOutcome, WksError> {
		let file = util::normalize_path(file);
		if !file.is_file() {
			return Err(WksError::NotFound { what: file.display().to_string() });
		}
		let engine = engine_named(engine_name).ok_or_else(|| WksError::Unsupported {
			message: format!("no transform engine named '{}'", engine_name),
		})?;

		let file_checksum = util::sha256_file(&file).await?;
		let options_hash = util::sha256_bytes(canonical_options(options).as_bytes());
		let key = cache_key(&file_checksum, engine.name(), &options_hash);
		let now = util::iso8601(util::now_utc());
		let mut warnings = Vec::new();

		if let Some(row) = self.store.get(&key).await? {
			let artifact = self.row_artifact_path(&row);
			if artifact.as_ref().map(|p| p.is_file()).unwrap_or(false) {
				self.store.touch(&key, &now).await?;
				debug!("transform cache hit for {}", file.display());
				return Ok(TransformOutcome {
					checksum: row.checksum,
					cache_uri: row.cache_uri,
					engine: engine.name().to_string(),
					hit: true,
					evicted: 0,
					warnings,
				});
			}
			// Row without artifact: heal by dropping the row and redoing
			// the work
			warn!("cache row {} lost its artifact, rebuilding", key);
			warnings.push(format!("cache row {} had no artifact; rebuilt", key));
			self.store.delete(&key).await?;
		}

		tokio::fs::create_dir_all(&self.cache_dir).await?;
		let (tmp, ext) = engine.transform(&file, options, &self.cache_dir).await?;

		let checksum = match util::sha256_file(&tmp).await {
			Ok(c) => c,
			Err(e) => {
				let _ = tokio::fs::remove_file(&tmp).await;
				return Err(e.into());
			}
		};
		let size_bytes = tokio::fs::metadata(&tmp).await?.len();
		let artifact = self.artifact_path(&checksum, &ext);
		if let Err(e) = tokio::fs::rename(&tmp, &artifact).await {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(e.into());
		}

		let row = TransformRecord {
			id: key.clone(),
			file_uri: Uri::local_file(&file).to_string(),
			engine: engine.name().to_string(),
			options_hash,
			checksum: checksum.clone(),
			cache_uri: Uri::local_file(&artifact).to_string(),
			size_bytes,
			created_at: now.clone(),
			last_accessed: now,
		};
		if let Err(e) = self.store.insert(&row).await {
			// Neither side may survive a half-write
			let _ = tokio::fs::remove_file(&artifact).await;
			return Err(e);
		}

		let evicted = self.evict_to_cap().await?;
		Ok(TransformOutcome {
			checksum,
			cache_uri: row.cache_uri,
			engine: engine.name().to_string(),
			hit: false,
			evicted,
			warnings,
		})
	}

	/// Stream back an artifact. A 64-hex target is a checksum and must
	/// have a row (no on-disk fallback); anything else is a file path run
	/// through the default engine for its MIME type.
	pub async fn cat(&self, target: &str) -> Result<Vec<u8>, WksError> {
		if util::is_hex_digest(target) {
			let row = self.store.find_by_checksum(target).await?.ok_or_else(|| {
				WksError::NotFound { what: format!("transform row for checksum {}", target) }
			})?;
			let artifact = self.row_artifact_path(&row).ok_or_else(|| {
				WksError::invariant(format!("row {} has unusable cache_uri {}", row.id, row.cache_uri))
			})?;
			let bytes = tokio::fs::read(&artifact).await.map_err(|e| WksError::Invariant {
				message: format!("artifact {} unreadable: {}", artifact.display(), e),
			})?;
			self.store.touch(&row.id, &util::iso8601(util::now_utc())).await?;
			return Ok(bytes);
		}

		let path = util::normalize_path(Path::new(target));
		let engine = self.default_engine_for(&path)?;
		let outcome = self.transform(&engine, &path, &Value::Object(Default::default())).await?;
		let row = self.store.find_by_checksum(&outcome.checksum).await?.ok_or_else(|| {
			WksError::invariant(format!("row vanished for fresh artifact {}", outcome.checksum))
		})?;
		let artifact = self.row_artifact_path(&row).ok_or_else(|| {
			WksError::invariant(format!("row {} has unusable cache_uri", row.id))
		})?;
		Ok(tokio::fs::read(&artifact).await?)
	}

	/// The configured default engine for a path's MIME type
	pub fn default_engine_for(&self, path: &Path) -> Result<String, WksError> {
		let mime = util::mime_for_path(path);
		self.default_engines
			.get(mime)
			.or_else(|| self.default_engines.get("application/octet-stream"))
			.cloned()
			.ok_or_else(|| WksError::Unsupported {
				message: format!("no default engine for MIME type {}", mime),
			})
	}

	/// Delete every row and every cache file, reporting orphans found on
	/// the way out
	pub async fn reset(&self) -> Result<ResetReport, WksError> {
		let mut report = ResetReport::default();
		let rows = self.store.all().await?;
		let known: Vec<String> = rows.iter().map(|r| r.checksum.clone()).collect();

		for row in rows {
			if let Some(path) = self.row_artifact_path(&row) {
				if tokio::fs::remove_file(&path).await.is_ok() {
					report.files_deleted += 1;
				}
			}
			self.store.delete(&row.id).await?;
			report.rows_deleted += 1;
		}

		if self.cache_dir.is_dir() {
			for entry in std::fs::read_dir(&self.cache_dir)? {
				let path = entry?.path();
				if !path.is_file() {
					continue;
				}
				let orphan = artifact_checksum(&path)
					.map(|c| !known.contains(&c))
					.unwrap_or(true);
				if orphan {
					warn!("removing orphaned cache file {}", path.display());
					report.orphans.push(path.display().to_string());
				}
				std::fs::remove_file(&path)?;
				report.files_deleted += 1;
			}
		}
		Ok(report)
	}

	/// Cross-check rows against the cache directory and delete whichever
	/// side of a mismatch exists. A healthy cache audits to a no-op.
	pub async fn audit(&self) -> Result<AuditReport, WksError> {
		let mut report = AuditReport::default();

		for row in self.store.all().await? {
			let present = self
				.row_artifact_path(&row)
				.map(|p| p.is_file())
				.unwrap_or(false);
			if !present {
				self.store.delete(&row.id).await?;
				report.rows_removed.push(row.id);
			}
		}

		if self.cache_dir.is_dir() {
			for entry in std::fs::read_dir(&self.cache_dir)? {
				let path = entry?.path();
				if !path.is_file() {
					continue;
				}
				let known = match artifact_checksum(&path) {
					Some(checksum) => self.store.find_by_checksum(&checksum).await?.is_some(),
					None => false,
				};
				if !known {
					std::fs::remove_file(&path)?;
					report.files_removed.push(path.display().to_string());
				}
			}
		}
		Ok(report)
	}

	/// Strict LRU eviction by `last_accessed` until the cache fits the
	/// configured cap; row and file go together
	async fn evict_to_cap(&self) -> Result<u64, WksError> {
		let mut rows = self.store.all().await?;
		let mut total: u64 = rows.iter().map(|r| r.size_bytes).sum();
		if total <= self.max_size_bytes {
			return Ok(0);
		}
		rows.sort_by(|a, b| {
			a.last_accessed.cmp(&b.last_accessed).then_with(|| a.id.cmp(&b.id))
		});

		let mut evicted = 0;
		for row in rows {
			if total <= self.max_size_bytes {
				break;
			}
			if let Some(path) = self.row_artifact_path(&row) {
				let _ = tokio::fs::remove_file(&path).await;
			}
			self.store.delete(&row.id).await?;
			total = total.saturating_sub(row.size_bytes);
			evicted += 1;
			debug!("evicted cache entry {} ({} bytes)", row.checksum, row.size_bytes);
		}
		Ok(evicted)
	}

	fn row_artifact_path(&self, row: &TransformRecord) -> Option<PathBuf> {
		Uri::parse(&row.cache_uri).ok()?.to_local_path(None)
	}
}

/// Canonical serialization of engine options (object keys sort, so equal
/// options always hash equal)
fn canonical_options(options: &Value) -> String {
	serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string())
}

/// `<checksum>.<ext>` is the only permissible artifact filename
fn artifact_checksum(path: &Path) -> Option<String> {
	let name = path.file_name()?.to_str()?;
	let (stem, _ext) = name.split_once('.')?;
	util::is_hex_digest(stem).then(|| stem.to_string())
}

/// Best-effort graph integration: refresh nodes for the origin and the
/// artifact and record the transform edge between them. Failures degrade
/// to warnings; the transform itself already succeeded.
pub async fn graph_register(
	monitor_config: &MonitorConfig,
	nodes: &NodeStore,
	edges: &EdgeStore,
	file: &Path,
	outcome: &TransformOutcome,
) -> Vec<String> {
	let mut warnings = Vec::new();
	let now = util::iso8601(util::now_utc());
	let file_uri = Uri::local_file(file).to_string();

	for (path_str, uri) in [
		(file.display().to_string(), file_uri.clone()),
		(
			Uri::parse(&outcome.cache_uri)
				.ok()
				.and_then(|u| u.to_local_path(None))
				.map(|p| p.display().to_string())
				.unwrap_or_default(),
			outcome.cache_uri.clone(),
		),
	] {
		if path_str.is_empty() {
			continue;
		}
		let path = PathBuf::from(&path_str);
		let node = async {
			let checksum = util::sha256_file(&path).await?;
			let bytes = tokio::fs::metadata(&path).await?.len();
			let priority = priority::priority(&path, &monitor_config.priority)
				.unwrap_or(monitor_config.min_priority);
			nodes
				.upsert(&NodeRecord {
					local_uri: uri.clone(),
					remote_uri: None,
					checksum,
					bytes,
					priority,
					timestamp: now.clone(),
				})
				.await
		};
		if let Err(e) = node.await {
			warnings.push(format!("graph node for {} not refreshed: {}", uri, e));
		}
	}

	let edge = EdgeRecord {
		id: edge_id(&file_uri, 1, 1, &outcome.cache_uri),
		from_uri: file_uri,
		to_uri: outcome.cache_uri.clone(),
		line_number: 1,
		column_number: 1,
		name: format!("transform:{}", outcome.engine),
		parser: "transform".to_string(),
		status: EdgeStatus::Ok,
		first_seen: now.clone(),
		last_seen: now.clone(),
		last_updated: now,
	};
	if let Err(e) = edges.upsert(&edge).await {
		warnings.push(format!("transform edge not recorded: {}", e));
	}
	warnings
}


// vim: ts=4
