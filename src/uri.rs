//! URI model for graph documents
//!
//! Three schemes flow through the stores: `file://<host>/<abs>` for external
//! files, `vault:///<rel>` for notes under the configured vault base, and
//! `http(s)://` for the web. Everything else is rejected as legacy.

use crate::error::WksError;
use crate::util;
use std::fmt;
use std::path::{Path, PathBuf};

/// A parsed resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Uri {
	/// An absolute filesystem path on a named host
	File { host: String, path: PathBuf },

	/// A path relative to the vault base, portable across machines
	Vault { path: PathBuf },

	/// An external web resource, kept verbatim
	Web { url: String },
}

impl Uri {
	/// Parse a URI string into one of the supported schemes
	pub fn parse(s: &str) -> Result<Uri, WksError> {
		if let Some(rest) = s.strip_prefix("vault:///") {
			if rest.is_empty() {
				return Err(WksError::other(format!("empty vault URI: {}", s)));
			}
			return Ok(Uri::Vault { path: PathBuf::from(rest) });
		}
		if let Some(rest) = s.strip_prefix("file://") {
			// file://<host>/<abs>; an empty host means localhost
			let slash = rest.find('/').ok_or_else(|| {
				WksError::other(format!("file URI without an absolute path: {}", s))
			})?;
			let host = &rest[..slash];
			let path = &rest[slash..];
			let host = if host.is_empty() { util::hostname().to_string() } else { host.to_string() };
			return Ok(Uri::File { host, path: PathBuf::from(path) });
		}
		if s.starts_with("https://") || s.starts_with("http://") {
			return Ok(Uri::Web { url: s.to_string() });
		}
		Err(WksError::other(format!("unsupported URI scheme: {}", s)))
	}

	/// Build a `file://` URI for an absolute local path on this host
	pub fn local_file(path: &Path) -> Uri {
		Uri::File { host: util::hostname().to_string(), path: util::normalize_path(path) }
	}

	/// Build a URI for a local path, preferring `vault:///` when the path
	/// sits under `vault_base`
	pub fn for_local_path(path: &Path, vault_base: Option<&Path>) -> Uri {
		let abs = util::normalize_path(path);
		if let Some(base) = vault_base {
			if let Ok(rel) = abs.strip_prefix(base) {
				return Uri::Vault { path: rel.to_path_buf() };
			}
		}
		Uri::local_file(&abs)
	}

	/// Resolve back to an absolute filesystem path, when one exists locally
	pub fn to_local_path(&self, vault_base: Option<&Path>) -> Option<PathBuf> {
		match self {
			Uri::File { host, path } => {
				if host == util::hostname() {
					Some(path.clone())
				} else {
					None
				}
			}
			Uri::Vault { path } => vault_base.map(|b| b.join(path)),
			Uri::Web { .. } => None,
		}
	}

	pub fn is_vault(&self) -> bool {
		matches!(self, Uri::Vault { .. })
	}

	pub fn is_web(&self) -> bool {
		matches!(self, Uri::Web { .. })
	}
}

impl fmt::Display for Uri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Uri::File { host, path } => write!(f, "file://{}{}", host, path.display()),
			Uri::Vault { path } => write!(f, "vault:///{}", path.display()),
			Uri::Web { url } => write!(f, "{}", url),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_vault_uri() {
		let uri = Uri::parse("vault:///Projects/A.md").unwrap();
		assert_eq!(uri, Uri::Vault { path: PathBuf::from("Projects/A.md") });
		assert_eq!(uri.to_string(), "vault:///Projects/A.md");
	}

	#[test]
	fn test_parse_file_uri() {
		let uri = Uri::parse("file://box/home/u/doc.pdf").unwrap();
		match &uri {
			Uri::File { host, path } => {
				assert_eq!(host, "box");
				assert_eq!(path, &PathBuf::from("/home/u/doc.pdf"));
			}
			other => panic!("unexpected: {:?}", other),
		}
		assert_eq!(uri.to_string(), "file://box/home/u/doc.pdf");
	}

	#[test]
	fn test_parse_web_uri() {
		let uri = Uri::parse("https://example.org/a?b=c").unwrap();
		assert!(uri.is_web());
		assert_eq!(uri.to_string(), "https://example.org/a?b=c");
	}

	#[test]
	fn test_reject_unknown_scheme() {
		assert!(Uri::parse("ftp://example.org/x").is_err());
		assert!(Uri::parse("obsidian://open?vault=x").is_err());
	}

	#[test]
	fn test_vault_rewrite_for_local_path() {
		let base = PathBuf::from("/home/u/vault");
		let uri = Uri::for_local_path(Path::new("/home/u/vault/notes/a.md"), Some(&base));
		assert_eq!(uri, Uri::Vault { path: PathBuf::from("notes/a.md") });

		let outside = Uri::for_local_path(Path::new("/etc/hosts"), Some(&base));
		assert!(matches!(outside, Uri::File { .. }));
	}

	#[test]
	fn test_vault_round_trip_to_local() {
		let base = PathBuf::from("/home/u/vault");
		let uri = Uri::parse("vault:///notes/a.md").unwrap();
		assert_eq!(uri.to_local_path(Some(&base)), Some(PathBuf::from("/home/u/vault/notes/a.md")));
	}
}

// vim: ts=4
