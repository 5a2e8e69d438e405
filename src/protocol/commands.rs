//! Command handlers shared by the CLI and the RPC server
//!
//! One dispatcher, keyed by `(group, action)`, with JSON arguments on the
//! way in and an envelope on the way out. Both surfaces call exactly this
//! code, which is what makes their envelopes structurally identical.

use super::{data_of, Envelope, Reporter};
use crate::config::{Config, WksHome};
use crate::daemon::{self, DaemonStatus};
use crate::db::{Database, Filter};
use crate::diff;
use crate::error::WksError;
use crate::filter::FilterEngine;
use crate::links::{Direction, LinkEngine};
use crate::logfile::{self, LogLevel};
use crate::monitor::{self, Monitor};
use crate::priority;
use crate::service;
use crate::store::{EdgeStore, NodeStore, TransformStore};
use crate::transform::{self, TransformCache};
use crate::util;
use crate::vault::{self, Vault};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub struct CommandContext {
	pub home: WksHome,
	pub config: Config,
}

impl CommandContext {
	pub fn new(home: WksHome, config: Config) -> CommandContext {
		CommandContext { home, config }
	}

	/// Open the configured backend; each invocation gets its own handle
	pub fn db(&self) -> Result<Database, WksError> {
		Ok(Database::open(&self.config.database)?)
	}
}

fn arg_str(args: &Value, name: &str) -> Result<String, WksError> {
	args.get(name)
		.and_then(|v| v.as_str())
		.map(|s| s.to_string())
		.ok_or_else(|| WksError::other(format!("missing argument '{}'", name)))
}

fn arg_opt_str(args: &Value, name: &str) -> Option<String> {
	args.get(name).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn arg_bool(args: &Value, name: &str) -> bool {
	args.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn arg_f64(args: &Value, name: &str) -> Result<f64, WksError> {
	args.get(name)
		.and_then(|v| v.as_f64())
		.ok_or_else(|| WksError::other(format!("missing numeric argument '{}'", name)))
}

const RESTART_NOTICE: &str = "configuration updated; restart the daemon to apply it";

/// Execute one operation through the 4-stage pattern and return its
/// envelope. Never panics, never throws past this boundary.
pub async fn dispatch(
	ctx: &mut CommandContext,
	group: &str,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Envelope {
	let envelope = match run(ctx, group, action, args, rep).await {
		Ok(envelope) => envelope,
		Err(e) => Envelope::from_error(&e),
	};
	let summary = match envelope.first_error() {
		Some(message) => message.text.clone(),
		None => format!("{} {}", group, action),
	};
	rep.result_line(envelope.success, &summary);
	envelope
}

async fn run(
	ctx: &mut CommandContext,
	group: &str,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	match (group, action) {
		("config", _) => config_command(ctx, action, rep),
		("monitor", _) => monitor_command(ctx, action, args, rep).await,
		("link", _) => link_command(ctx, action, args, rep).await,
		("vault", _) => vault_command(ctx, action, args, rep).await,
		("transform", _) => transform_command(ctx, action, args, rep).await,
		("cat", _) => cat_command(ctx, args, rep).await,
		("diff", _) => diff_command(ctx, args, rep).await,
		("daemon", _) => daemon_command(ctx, action, rep),
		("database", _) => database_command(ctx, action, args, rep).await,
		("log", _) => log_command(ctx, action, args, rep),
		("service", _) => service_command(ctx, action, args, rep),
		_ => Err(WksError::Unsupported {
			message: format!("unknown command {} {}", group, action),
		}),
	}
}

fn config_command(
	ctx: &mut CommandContext,
	action: &str,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	match action {
		"show" => {
			rep.announce("Showing configuration");
			Ok(Envelope::ok(data_of(&ctx.config)))
		}
		"path" => Ok(Envelope::ok(data_of(&json!({
			"path": ctx.home.config_path().display().to_string()
		})))),
		"validate" => {
			rep.announce("Validating configuration");
			let reloaded = Config::load(&ctx.home.config_path())?;
			reloaded.validate()?;
			Ok(Envelope::ok(data_of(&json!({ "valid": true }))))
		}
		"init" => {
			rep.announce("Writing starter configuration");
			let path = ctx.home.config_path();
			if path.exists() {
				return Err(WksError::Conflict {
					message: format!("{} already exists", path.display()),
				});
			}
			let starter = Config::starter(&ctx.home);
			starter.save(&path)?;
			ctx.config = starter;
			Ok(Envelope::ok(data_of(&json!({
				"path": path.display().to_string(),
				"created": true
			}))))
		}
		other => Err(unknown_action("config", other)),
	}
}

async fn monitor_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	match action {
		"check" => {
			let path = PathBuf::from(arg_str(args, "path")?);
			rep.announce(&format!("Checking {}", path.display()));

			// Pure decision, no store access
			let engine = FilterEngine::new(&ctx.config.monitor.filter)?;
			let decision = engine.is_monitored(&path);
			let priority = decision
				.monitored
				.then(|| priority::priority(&path, &ctx.config.monitor.priority).ok())
				.flatten();

			let mut data = Map::new();
			data.insert("path".into(), json!(util::normalize_path(&path).display().to_string()));
			data.insert("is_monitored".into(), json!(decision.monitored));
			if let Some(p) = priority {
				data.insert("priority".into(), json!(p));
			}
			data.insert("trace".into(), serde_json::to_value(&decision.trace)?);
			Ok(Envelope::ok(data))
		}
		"sync" => {
			let path = PathBuf::from(arg_str(args, "path")?);
			let recursive = arg_bool(args, "recursive");
			rep.announce(&format!("Syncing {}", path.display()));

			let db = ctx.db()?;
			let monitor = Monitor::new(&ctx.config.monitor, &db)?;
			let report = monitor.sync(&path, recursive).await?;
			rep.progress(report.files_synced, None, "files synced");

			let mut envelope = Envelope::ok(data_of(&report));
			for w in &report.warnings {
				envelope.push_warning(w.clone());
			}
			for e in &report.errors {
				envelope.push_error(&WksError::other(e.clone()));
			}
			Ok(envelope)
		}
		"filter_list" => Ok(Envelope::ok(data_of(&ctx.config.monitor.filter))),
		"filter_add" | "filter_remove" => {
			let list = arg_str(args, "list")?.parse()?;
			let value = arg_str(args, "value")?;
			rep.announce(&format!("Updating filter {}", arg_str(args, "list")?));

			let mut config = ctx.config.clone();
			if action == "filter_add" {
				monitor::filter_add(&mut config, list, &value)?;
			} else {
				monitor::filter_remove(&mut config, list, &value)?;
			}
			config.save(&ctx.home.config_path())?;
			ctx.config = config;

			let mut envelope = Envelope::ok(data_of(&ctx.config.monitor.filter));
			envelope.push_info(RESTART_NOTICE);
			Ok(envelope)
		}
		"priority_list" => Ok(Envelope::ok(data_of(&ctx.config.monitor.priority))),
		"priority_add" | "priority_remove" | "priority_set" => {
			let mut config = ctx.config.clone();
			match action {
				"priority_add" => {
					let dir = arg_str(args, "dir")?;
					let base = arg_f64(args, "base")?;
					rep.announce(&format!("Managing {}", dir));
					monitor::priority_add(&mut config, &dir, base)?;
				}
				"priority_remove" => {
					let dir = arg_str(args, "dir")?;
					rep.announce(&format!("Unmanaging {}", dir));
					monitor::priority_remove(&mut config, &dir)?;
				}
				_ => {
					let key = arg_str(args, "key")?.parse()?;
					let value = arg_f64(args, "value")?;
					monitor::priority_set(&mut config, &key, value)?;
				}
			}
			config.save(&ctx.home.config_path())?;
			ctx.config = config;

			let mut envelope = Envelope::ok(data_of(&ctx.config.monitor.priority));
			envelope.push_info(RESTART_NOTICE);
			Ok(envelope)
		}
		other => Err(unknown_action("monitor", other)),
	}
}

async fn link_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let db = ctx.db()?;
	let engine = LinkEngine::new(&ctx.config, &db)?;
	match action {
		"check" => {
			let path = PathBuf::from(arg_str(args, "path")?);
			rep.announce(&format!("Checking links in {}", path.display()));
			let report = engine
				.check(&path, arg_opt_str(args, "parser").as_deref(), arg_bool(args, "remote"))
				.await?;
			Ok(Envelope::ok(data_of(&report)))
		}
		"sync" => {
			let path = PathBuf::from(arg_str(args, "path")?);
			rep.announce(&format!("Syncing links in {}", path.display()));
			let report = engine
				.sync(
					&path,
					arg_bool(args, "recursive"),
					arg_bool(args, "remote"),
					arg_opt_str(args, "parser").as_deref(),
				)
				.await?;
			rep.progress(report.edges_written, None, "edges written");

			let mut envelope = Envelope::ok(data_of(&report));
			for e in &report.errors {
				envelope.push_error(&WksError::other(e.clone()));
			}
			Ok(envelope)
		}
		"show" => {
			let uri = arg_str(args, "uri")?;
			let direction: Direction =
				arg_opt_str(args, "direction").as_deref().unwrap_or("any").parse()?;
			let edges = engine.show(&uri, direction).await?;
			let count = edges.len();
			Ok(Envelope::ok(data_of(&json!({ "edges": edges, "count": count }))))
		}
		"prune" => {
			rep.announce("Pruning dead edges");
			let report = engine.prune(arg_bool(args, "remote")).await?;
			Ok(Envelope::ok(data_of(&report)))
		}
		other => Err(unknown_action("link", other)),
	}
}

async fn vault_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	// First use (or a moved base) registers the vault with the monitor
	let mut config = ctx.config.clone();
	let registered = vault::ensure_registered(&mut config, &ctx.home)?;
	ctx.config = config;

	let db = ctx.db()?;
	let engine = LinkEngine::new(&ctx.config, &db)?;
	let vault = Vault::new(&ctx.config, &engine);
	let path = arg_opt_str(args, "path").map(PathBuf::from);

	let mut envelope = match action {
		"status" => {
			rep.announce("Vault status");
			let report = vault.status().await?;
			let mut envelope = Envelope::ok(data_of(&report));
			for issue in &report.issues {
				envelope.push_warning(issue.clone());
			}
			envelope
		}
		"sync" => {
			rep.announce("Syncing vault");
			let report = vault.sync(path.as_deref(), arg_bool(args, "remote")).await?;
			rep.progress(report.links.edges_written, None, "edges written");
			let mut envelope = Envelope::ok(data_of(&report));
			for e in &report.links.errors {
				envelope.push_error(&WksError::other(e.clone()));
			}
			envelope
		}
		"check" => {
			rep.announce("Checking vault links");
			let entries = vault.check(path.as_deref()).await?;
			let count = entries.len();
			Envelope::ok(data_of(&json!({ "broken": entries, "count": count })))
		}
		other => return Err(unknown_action("vault", other)),
	};
	if registered {
		envelope.push_info(RESTART_NOTICE);
	}
	Ok(envelope)
}

async fn transform_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let db = ctx.db()?;
	let cache = TransformCache::new(&ctx.config.transform, &db)?;
	match action {
		"run" => {
			let engine = arg_str(args, "engine")?;
			let file = PathBuf::from(arg_str(args, "file")?);
			let options = args.get("options").cloned().unwrap_or_else(|| json!({}));
			rep.announce(&format!("Transforming {} with {}", file.display(), engine));

			let outcome = cache.transform(&engine, &file, &options).await?;

			// Graph integration is best-effort by design
			let nodes = NodeStore::open(&db)?;
			let edges = EdgeStore::open(&db)?;
			let graph_warnings = transform::graph_register(
				&ctx.config.monitor,
				&nodes,
				&edges,
				&util::normalize_path(&file),
				&outcome,
			)
			.await;

			let mut envelope = Envelope::ok(data_of(&outcome));
			for w in outcome.warnings.iter().chain(graph_warnings.iter()) {
				envelope.push_warning(w.clone());
			}
			Ok(envelope)
		}
		"engines" => Ok(Envelope::ok(data_of(&json!({
			"engines": transform::engine_names()
		})))),
		"audit" => {
			rep.announce("Auditing transform cache");
			let report = cache.audit().await?;
			Ok(Envelope::ok(data_of(&report)))
		}
		other => Err(unknown_action("transform", other)),
	}
}

async fn cat_command(
	ctx: &mut CommandContext,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let target = arg_str(args, "target")?;
	rep.announce(&format!("Reading {}", target));

	let db = ctx.db()?;
	let cache = TransformCache::new(&ctx.config.transform, &db)?;
	let bytes = cache.cat(&target).await?;

	Ok(Envelope::ok(data_of(&json!({
		"content": String::from_utf8_lossy(&bytes),
		"size_bytes": bytes.len(),
	}))))
}

async fn diff_command(
	ctx: &mut CommandContext,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let a = arg_str(args, "a")?;
	let b = arg_str(args, "b")?;
	rep.announce(&format!("Diffing {} against {}", a, b));

	let db = ctx.db()?;
	let cache = TransformCache::new(&ctx.config.transform, &db)?;
	let engine = diff::engine_or_err(&ctx.config.diff.engine)?;

	let a_text = String::from_utf8_lossy(&cache.cat(&a).await?).to_string();
	let b_text = String::from_utf8_lossy(&cache.cat(&b).await?).to_string();
	let diff_text = engine.diff(&a_text, &b_text, ctx.config.diff.context_lines);

	Ok(Envelope::ok(data_of(&json!({
		"engine": engine.name(),
		"identical": diff_text.is_empty(),
		"diff": diff_text,
	}))))
}

fn daemon_command(
	ctx: &mut CommandContext,
	action: &str,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	match action {
		"status" => {
			let status = DaemonStatus::load(&ctx.home.status_path())?;
			match status {
				Some(status) => Ok(Envelope::ok(data_of(&status))),
				None => Ok(Envelope::ok(data_of(&json!({
					"running": false,
					"pid": null,
				})))),
			}
		}
		"stop" => {
			rep.announce("Stopping daemon");
			let pid = daemon::stop(&ctx.home)?;
			Ok(Envelope::ok(data_of(&json!({ "pid": pid, "signalled": true }))))
		}
		// `daemon start` never reaches the dispatcher: the CLI runs the
		// event loop in-process and RPC does not expose it
		other => Err(unknown_action("daemon", other)),
	}
}

async fn database_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let db = ctx.db()?;
	match action {
		"status" => {
			db.ping()?;
			let nodes = NodeStore::open(&db)?.count().await?;
			let edges = EdgeStore::open(&db)?.count().await?;
			let transform = TransformStore::open(&db)?.count().await?;
			Ok(Envelope::ok(data_of(&json!({
				"backend": ctx.config.database.backend,
				"prefix": ctx.config.database.prefix,
				"collections": { "nodes": nodes, "edges": edges, "transform": transform },
			}))))
		}
		"reset" => {
			let collection = arg_str(args, "collection")?;
			rep.announce(&format!("Resetting collection {}", collection));
			match collection.as_str() {
				// Transform rows and artifacts die together
				"transform" => {
					let cache = TransformCache::new(&ctx.config.transform, &db)?;
					let report = cache.reset().await?;
					Ok(Envelope::ok(data_of(&report)))
				}
				"nodes" | "edges" => {
					let removed =
						db.collection(&collection)?.delete_many(&Filter::new()).await?;
					Ok(Envelope::ok(data_of(&json!({ "rows_deleted": removed }))))
				}
				other => Err(WksError::NotFound { what: format!("collection {}", other) }),
			}
		}
		other => Err(unknown_action("database", other)),
	}
}

fn log_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	let path = ctx.home.logfile_path();
	match action {
		"show" => {
			let (entries, pruned) =
				logfile::read_pruned(&path, &ctx.config.log, &LogLevel::ALL)?;
			let level = arg_opt_str(args, "level");
			let mut entries: Vec<_> = entries
				.into_iter()
				.filter(|e| match &level {
					Some(l) => l.parse::<LogLevel>().map(|l| e.level == l).unwrap_or(false),
					None => true,
				})
				.collect();
			if let Some(tail) = args.get("tail").and_then(|v| v.as_u64()) {
				let keep = tail as usize;
				if entries.len() > keep {
					entries.drain(..entries.len() - keep);
				}
			}
			Ok(Envelope::ok(data_of(&json!({
				"entries": entries,
				"pruned": pruned,
			}))))
		}
		"prune" => {
			rep.announce("Pruning log");
			let mut levels = Vec::new();
			for (flag, level) in [
				("debug", LogLevel::Debug),
				("info", LogLevel::Info),
				("warning", LogLevel::Warn),
				("error", LogLevel::Error),
			] {
				if arg_bool(args, flag) {
					levels.push(level);
				}
			}
			if levels.is_empty() {
				levels.extend(LogLevel::ALL);
			}
			let (_, pruned) = logfile::read_pruned(&path, &ctx.config.log, &levels)?;
			Ok(Envelope::ok(data_of(&json!({ "pruned": pruned }))))
		}
		other => Err(unknown_action("log", other)),
	}
}

fn service_command(
	ctx: &mut CommandContext,
	action: &str,
	args: &Value,
	rep: &mut dyn Reporter,
) -> Result<Envelope, WksError> {
	match action {
		"install" => {
			rep.announce("Installing service unit");
			let restrict = arg_opt_str(args, "restrict").map(PathBuf::from);
			let report = service::install(&ctx.config.service, restrict.as_deref())?;
			Ok(Envelope::ok(data_of(&report)))
		}
		"uninstall" => {
			rep.announce("Removing service unit");
			let report = service::uninstall(&ctx.config.service)?;
			Ok(Envelope::ok(data_of(&report)))
		}
		"status" => Ok(Envelope::ok(data_of(&service::status(&ctx.config.service)?))),
		other => Err(unknown_action("service", other)),
	}
}

fn unknown_action(group: &str, action: &str) -> WksError {
	WksError::Unsupported { message: format!("unknown action '{} {}'", group, action) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::SilentReporter;
	use std::fs;
	use tempfile::TempDir;

	async fn fixture() -> (TempDir, CommandContext) {
		let tmp = TempDir::new().unwrap();
		let home = WksHome::at(tmp.path().join("wks")).unwrap();
		let mut config = Config::starter(&home);
		config.database.backend = "memory".to_string();
		config.vault.base = tmp.path().join("vault");
		fs::create_dir_all(&config.vault.base).unwrap();
		let watched = tmp.path().join("watched");
		fs::create_dir_all(&watched).unwrap();
		config.monitor.filter.include_paths.push(watched.clone());
		config.monitor.priority.dirs.insert(watched, 100.0);
		config.save(&home.config_path()).unwrap();

		(tmp, CommandContext::new(home, config))
	}

	#[tokio::test]
	async fn test_monitor_check_envelope() {
		let (tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let args = json!({ "path": tmp.path().join("watched/a.md").display().to_string() });

		let envelope = dispatch(&mut ctx, "monitor", "check", &args, &mut rep).await;
		assert!(envelope.success);
		assert_eq!(envelope.data.get("is_monitored"), Some(&json!(true)));
		assert!(envelope.data.contains_key("priority"));
		assert!(envelope.data.contains_key("trace"));
	}

	#[tokio::test]
	async fn test_monitor_sync_missing_path_warns() {
		let (tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let args = json!({ "path": tmp.path().join("watched/ghost.md").display().to_string() });

		let envelope = dispatch(&mut ctx, "monitor", "sync", &args, &mut rep).await;
		assert!(envelope.success);
		assert!(envelope
			.messages
			.iter()
			.any(|m| m.kind == crate::protocol::MessageKind::Warning));
	}

	#[tokio::test]
	async fn test_failure_produces_empty_data_and_error() {
		let (_tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;

		let envelope = dispatch(&mut ctx, "monitor", "sync", &json!({}), &mut rep).await;
		assert!(!envelope.success);
		assert!(envelope.data.is_empty());
		assert!(envelope.first_error().is_some());
	}

	#[tokio::test]
	async fn test_filter_mutation_persists_and_notices_restart() {
		let (_tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let args = json!({ "list": "exclude_globs", "value": "*.bak" });

		let envelope = dispatch(&mut ctx, "monitor", "filter_add", &args, &mut rep).await;
		assert!(envelope.success);
		assert!(envelope.messages.iter().any(|m| m.text.contains("restart the daemon")));

		let on_disk = Config::load(&ctx.home.config_path()).unwrap();
		assert!(on_disk.monitor.filter.exclude_globs.contains(&"*.bak".to_string()));
	}

	#[tokio::test]
	async fn test_unknown_command_unsupported() {
		let (_tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let envelope = dispatch(&mut ctx, "nope", "nope", &json!({}), &mut rep).await;
		assert!(!envelope.success);
		assert_eq!(
			envelope.first_error().unwrap().details,
			Some(json!({"kind": "unsupported"}))
		);
	}

	#[tokio::test]
	async fn test_database_status_counts() {
		let (_tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let envelope = dispatch(&mut ctx, "database", "status", &json!({}), &mut rep).await;
		assert!(envelope.success);
		assert!(envelope.data.get("collections").is_some());
	}

	#[tokio::test]
	async fn test_config_validate_roundtrip() {
		let (_tmp, mut ctx) = fixture().await;
		let mut rep = SilentReporter;
		let envelope = dispatch(&mut ctx, "config", "validate", &json!({}), &mut rep).await;
		assert!(envelope.success);
		assert_eq!(envelope.data.get("valid"), Some(&json!(true)));
	}
}

// vim: ts=4
