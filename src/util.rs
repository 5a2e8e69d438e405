//! Utility functions shared across WKS subsystems
//!
//! Checksumming, hostname resolution, lexical path normalization and
//! timestamp formatting live here so the engines stay focused.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncReadExt;

/// Buffer size for streaming checksum reads
const CHECKSUM_BUF_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 checksum of a file, streaming through a fixed buffer
pub async fn sha256_file(path: &Path) -> io::Result<String> {
	let mut file = tokio::fs::File::open(path).await?;
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; CHECKSUM_BUF_SIZE];

	loop {
		let n = file.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 checksum of an in-memory byte slice
pub fn sha256_bytes(bytes: &[u8]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(bytes);
	hex::encode(hasher.finalize())
}

/// True if `s` looks like a SHA-256 hex digest
pub fn is_hex_digest(s: &str) -> bool {
	s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Short hostname of this machine, cached for the process lifetime
pub fn hostname() -> &'static str {
	static HOSTNAME: OnceLock<String> = OnceLock::new();
	HOSTNAME.get_or_init(|| {
		sysinfo::System::host_name()
			.map(|h| h.split('.').next().unwrap_or(&h).to_string())
			.unwrap_or_else(|| "localhost".to_string())
	})
}

/// Normalize a path lexically: expand `~`, make absolute against the current
/// directory, and resolve `.`/`..` components without touching the disk.
///
/// The path need not exist, which matters for deletion handling and for
/// priority lookups on removed files.
pub fn normalize_path(path: &Path) -> PathBuf {
	let expanded = expand_tilde(path);
	let absolute = if expanded.is_absolute() {
		expanded
	} else {
		std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")).join(expanded)
	};

	let mut out = PathBuf::new();
	for comp in absolute.components() {
		match comp {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}

/// Expand a leading `~` or `~/` against $HOME
pub fn expand_tilde(path: &Path) -> PathBuf {
	let Some(s) = path.to_str() else { return path.to_path_buf() };
	if s == "~" {
		if let Ok(home) = std::env::var("HOME") {
			return PathBuf::from(home);
		}
	} else if let Some(rest) = s.strip_prefix("~/") {
		if let Ok(home) = std::env::var("HOME") {
			return PathBuf::from(home).join(rest);
		}
	}
	path.to_path_buf()
}

/// Current time in UTC
pub fn now_utc() -> DateTime<Utc> {
	Utc::now()
}

/// Render a timestamp as ISO-8601 UTC with millisecond precision
pub fn iso8601(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 UTC timestamp produced by [`iso8601`]
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Lowercased extension of a path, if any
pub fn extension(path: &Path) -> Option<String> {
	path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

/// Guess a MIME type from the file extension; fall back to octet-stream
pub fn mime_for_path(path: &Path) -> &'static str {
	match extension(path).as_deref() {
		Some("txt") | Some("text") | Some("log") => "text/plain",
		Some("md") | Some("markdown") => "text/markdown",
		Some("html") | Some("htm") => "text/html",
		Some("rst") => "text/x-rst",
		Some("csv") => "text/csv",
		Some("json") => "application/json",
		Some("yaml") | Some("yml") => "application/yaml",
		Some("pdf") => "application/pdf",
		Some("png") => "image/png",
		Some("jpg") | Some("jpeg") => "image/jpeg",
		_ => "application/octet-stream",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sha256_bytes_stable() {
		let a = sha256_bytes(b"# Test Note\n");
		let b = sha256_bytes(b"# Test Note\n");
		assert_eq!(a, b);
		assert!(is_hex_digest(&a));
		assert_ne!(a, sha256_bytes(b"# Test Note\n\nmore\n"));
	}

	#[test]
	fn test_sha256_empty_input() {
		// sha256 of the empty string, the classic fixture
		assert_eq!(
			sha256_bytes(b""),
			"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
		);
	}

	#[test]
	fn test_is_hex_digest() {
		assert!(is_hex_digest(&"a".repeat(64)));
		assert!(!is_hex_digest(&"a".repeat(63)));
		assert!(!is_hex_digest(&"g".repeat(64)));
	}

	#[test]
	fn test_normalize_path_resolves_dots() {
		let p = normalize_path(Path::new("/a/b/../c/./d"));
		assert_eq!(p, PathBuf::from("/a/c/d"));
	}

	#[test]
	fn test_normalize_path_relative() {
		let p = normalize_path(Path::new("x/y"));
		assert!(p.is_absolute());
		assert!(p.ends_with("x/y"));
	}

	#[test]
	fn test_iso8601_round_trip() {
		let now = now_utc();
		let s = iso8601(now);
		let back = parse_iso8601(&s).unwrap();
		assert_eq!(iso8601(back), s);
	}
}

// vim: ts=4
