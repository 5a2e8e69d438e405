//! Unified log file reading and retention pruning
//!
//! Line format: `[TIMESTAMP-ISO8601-UTC] [DOMAIN] LEVEL: message`. Every
//! read first drops entries older than the per-level retention, so the file
//! never grows past what the configuration allows to survive.

use crate::config::LogConfig;
use crate::error::WksError;
use crate::util;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Debug,
	Info,
	Warn,
	Error,
}

impl LogLevel {
	pub const ALL: [LogLevel; 4] = [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error];

	fn retention_days(&self, config: &LogConfig) -> u32 {
		match self {
			LogLevel::Debug => config.debug_retention_days,
			LogLevel::Info => config.info_retention_days,
			LogLevel::Warn => config.warning_retention_days,
			LogLevel::Error => config.error_retention_days,
		}
	}
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LogLevel::Debug => write!(f, "DEBUG"),
			LogLevel::Info => write!(f, "INFO"),
			LogLevel::Warn => write!(f, "WARN"),
			LogLevel::Error => write!(f, "ERROR"),
		}
	}
}

impl FromStr for LogLevel {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, ()> {
		match s.to_ascii_uppercase().as_str() {
			"DEBUG" => Ok(LogLevel::Debug),
			"INFO" => Ok(LogLevel::Info),
			"WARN" | "WARNING" => Ok(LogLevel::Warn),
			"ERROR" => Ok(LogLevel::Error),
			_ => Err(()),
		}
	}
}

/// One parsed log line
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
	pub timestamp: String,
	pub domain: String,
	pub level: LogLevel,
	pub message: String,
}

impl LogEntry {
	fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
		util::parse_iso8601(&self.timestamp)
	}
}

fn line_pattern() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| {
		Regex::new(r"^\[([^\]]+)\] \[([^\]]+)\] (DEBUG|INFO|WARN|ERROR): (.*)$")
			.expect("log line pattern is valid")
	})
}

fn parse_line(line: &str) -> Option<LogEntry> {
	let caps = line_pattern().captures(line)?;
	Some(LogEntry {
		timestamp: caps[1].to_string(),
		domain: caps[2].to_string(),
		level: caps[3].parse().ok()?,
		message: caps[4].to_string(),
	})
}

/// Read the log, pruning expired entries for the given levels first.
///
/// Returns the surviving entries and the number pruned. Unparseable lines
/// are dropped silently (they cannot be aged).
pub fn read_pruned(
	path: &Path,
	config: &LogConfig,
	prune_levels: &[LogLevel],
) -> Result<(Vec<LogEntry>, usize), WksError> {
	if !path.exists() {
		return Ok((Vec::new(), 0));
	}

	let raw = std::fs::read_to_string(path)?;
	let now = util::now_utc();
	let mut kept: Vec<LogEntry> = Vec::new();
	let mut pruned = 0usize;

	for line in raw.lines() {
		if line.is_empty() {
			continue;
		}
		let Some(entry) = parse_line(line) else {
			pruned += 1;
			continue;
		};
		let expired = prune_levels.contains(&entry.level)
			&& match entry.parsed_timestamp() {
				Some(ts) => {
					let age = now - ts;
					age > Duration::days(i64::from(entry.level.retention_days(config)))
				}
				None => true,
			};
		if expired {
			pruned += 1;
		} else {
			kept.push(entry);
		}
	}

	if pruned > 0 {
		rewrite(path, &kept)?;
	}
	Ok((kept, pruned))
}

fn rewrite(path: &Path, entries: &[LogEntry]) -> Result<(), WksError> {
	let mut out = String::new();
	for e in entries {
		out.push_str(&format!("[{}] [{}] {}: {}\n", e.timestamp, e.domain, e.level, e.message));
	}
	let tmp = path.with_extension("tmp");
	std::fs::write(&tmp, out.as_bytes())?;
	std::fs::rename(&tmp, path)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn config() -> LogConfig {
		LogConfig {
			debug_retention_days: 1,
			info_retention_days: 7,
			warning_retention_days: 30,
			error_retention_days: 90,
		}
	}

	fn write_lines(path: &Path, lines: &[String]) {
		std::fs::write(path, lines.join("\n") + "\n").unwrap();
	}

	#[test]
	fn test_parse_line_shapes() {
		let entry =
			parse_line("[2026-08-01T10:00:00.000Z] [monitor] INFO: synced 3 files").unwrap();
		assert_eq!(entry.domain, "monitor");
		assert_eq!(entry.level, LogLevel::Info);
		assert_eq!(entry.message, "synced 3 files");

		assert!(parse_line("garbage").is_none());
	}

	#[test]
	fn test_prune_drops_expired_entries() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("logfile");
		let old = util::iso8601(util::now_utc() - Duration::days(10));
		let fresh = util::iso8601(util::now_utc());
		write_lines(
			&path,
			&[
				format!("[{}] [daemon] INFO: old entry", old),
				format!("[{}] [daemon] INFO: fresh entry", fresh),
				format!("[{}] [daemon] ERROR: old but retained", old),
			],
		);

		let (entries, pruned) = read_pruned(&path, &config(), &LogLevel::ALL).unwrap();
		assert_eq!(pruned, 1);
		assert_eq!(entries.len(), 2);
		assert!(entries.iter().all(|e| e.message != "old entry"));

		// The file itself was rewritten without the expired line
		let raw = std::fs::read_to_string(&path).unwrap();
		assert!(!raw.contains("old entry"));
		assert!(raw.contains("old but retained"));
	}

	#[test]
	fn test_prune_respects_level_selection() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("logfile");
		let old = util::iso8601(util::now_utc() - Duration::days(10));
		write_lines(
			&path,
			&[
				format!("[{}] [daemon] INFO: expired info", old),
				format!("[{}] [daemon] DEBUG: expired debug", old),
			],
		);

		// Only prune debug; the expired info entry survives
		let (entries, pruned) = read_pruned(&path, &config(), &[LogLevel::Debug]).unwrap();
		assert_eq!(pruned, 1);
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].level, LogLevel::Info);
	}

	#[test]
	fn test_missing_file_is_empty() {
		let tmp = TempDir::new().unwrap();
		let (entries, pruned) =
			read_pruned(&tmp.path().join("nope"), &config(), &LogLevel::ALL).unwrap();
		assert!(entries.is_empty());
		assert_eq!(pruned, 0);
	}
}

// vim: ts=4
