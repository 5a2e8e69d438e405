//! Transform engine registry
//!
//! An engine reads an input file, produces a text representation, writes
//! it to a temporary file in the supplied work directory and returns the
//! temp path plus the artifact extension. The cache controller owns the
//! move into place. Heavy extractors (OCR, PDF layout) plug in through
//! the same trait; the built-in engines cover plain text and a binary
//! fallback.

use crate::error::WksError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait TransformEngine: Send + Sync {
	fn name(&self) -> &'static str;

	/// Whether the engine accepts inputs of this MIME type
	fn can_handle(&self, mime: &str) -> bool;

	/// Produce the artifact as `(temp_path, extension)`; `work_dir` exists
	/// and is on the same filesystem as the cache
	async fn transform(
		&self,
		input: &Path,
		options: &Value,
		work_dir: &Path,
	) -> Result<(PathBuf, String), WksError>;
}

/// Look up an engine by its configured name
pub fn engine_named(name: &str) -> Option<&'static dyn TransformEngine> {
	static TEXT: TextEngine = TextEngine;
	static HEXDUMP: HexdumpEngine = HexdumpEngine;
	match name {
		"text" => Some(&TEXT),
		"hexdump" => Some(&HEXDUMP),
		_ => None,
	}
}

/// Names of every registered engine
pub fn engine_names() -> Vec<&'static str> {
	vec!["text", "hexdump"]
}

fn temp_artifact_path(work_dir: &Path, input: &Path) -> PathBuf {
	let stem = input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
	work_dir.join(format!("{}.wks-tmp-{}", stem, std::process::id()))
}

/// Text passthrough: decodes as UTF-8 (lossily) and normalizes line
/// endings, refusing inputs that are clearly binary
pub struct TextEngine;

#[async_trait]
impl TransformEngine for TextEngine {
	fn name(&self) -> &'static str {
		"text"
	}

	fn can_handle(&self, mime: &str) -> bool {
		mime.starts_with("text/") || mime == "application/json" || mime == "application/yaml"
	}

	async fn transform(
		&self,
		input: &Path,
		_options: &Value,
		work_dir: &Path,
	) -> Result<(PathBuf, String), WksError> {
		let bytes = tokio::fs::read(input).await?;
		if bytes.contains(&0u8) {
			return Err(WksError::EngineFailure {
				engine: "text".to_string(),
				message: format!("{} looks binary (NUL bytes)", input.display()),
			});
		}
		let text = String::from_utf8_lossy(&bytes).replace("\r\n", "\n");

		let tmp = temp_artifact_path(work_dir, input);
		tokio::fs::write(&tmp, text.as_bytes()).await?;
		Ok((tmp, "txt".to_string()))
	}
}

/// Binary fallback: canonical hex dump with offsets, 16 bytes per line
pub struct HexdumpEngine;

#[async_trait]
impl TransformEngine for HexdumpEngine {
	fn name(&self) -> &'static str {
		"hexdump"
	}

	fn can_handle(&self, _mime: &str) -> bool {
		true
	}

	async fn transform(
		&self,
		input: &Path,
		_options: &Value,
		work_dir: &Path,
	) -> Result<(PathBuf, String), WksError> {
		let bytes = tokio::fs::read(input).await?;
		let mut out = String::with_capacity(bytes.len() * 4);
		for (i, chunk) in bytes.chunks(16).enumerate() {
			let _ = write!(out, "{:08x}  ", i * 16);
			for b in chunk {
				let _ = write!(out, "{:02x} ", b);
			}
			for _ in chunk.len()..16 {
				out.push_str("   ");
			}
			out.push(' ');
			for b in chunk {
				out.push(if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' });
			}
			out.push('\n');
		}

		let tmp = temp_artifact_path(work_dir, input);
		tokio::fs::write(&tmp, out.as_bytes()).await?;
		Ok((tmp, "txt".to_string()))
	}
}


// vim: ts=4
