//! Priority engine
//!
//! Deterministic float priority for a path under a managed directory. The
//! path need not exist; the computation is a pure function of the path and
//! the priority configuration. The float is stored as-is and only rounded
//! for display.

use crate::config::PriorityConfig;
use crate::error::WksError;
use crate::util;
use std::path::{Path, PathBuf};

/// Find the deepest managed directory that is an ancestor of (or equal to)
/// `path`, together with its base priority
pub fn managed_base(path: &Path, config: &PriorityConfig) -> Option<(PathBuf, f64)> {
	let path = util::normalize_path(path);
	config
		.dirs
		.iter()
		.filter(|(dir, _)| path.starts_with(dir))
		.max_by_key(|(dir, _)| dir.components().count())
		.map(|(dir, base)| (dir.clone(), *base))
}

/// Compute the priority of `path`.
///
/// Callers must have established monitored-ness first; a path with no
/// managed ancestor is a caller bug surfaced as an error.
pub fn priority(path: &Path, config: &PriorityConfig) -> Result<f64, WksError> {
	let normalized = util::normalize_path(path);
	let (dir, base) = managed_base(&normalized, config).ok_or_else(|| WksError::NotFound {
		what: format!("managed directory for {}", normalized.display()),
	})?;

	let mut value = base;
	let below = normalized.strip_prefix(&dir).expect("managed_base returned an ancestor");
	for component in below.components() {
		let name = component.as_os_str().to_string_lossy();
		value *= config.depth_multiplier;
		if name == "_" {
			value *= config.only_underscore_multiplier;
		} else {
			for ch in name.chars() {
				if ch != '_' {
					break;
				}
				value *= config.underscore_multiplier;
			}
		}
	}

	if let Some(ext) = util::extension(&normalized) {
		if let Some(weight) = config.extension_weights.get(&ext) {
			value *= weight;
		}
	}

	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	fn config() -> PriorityConfig {
		PriorityConfig {
			dirs: BTreeMap::from([
				(PathBuf::from("/home/u/Desktop"), 160.0),
				(PathBuf::from("/home/u/Desktop/hot"), 400.0),
			]),
			depth_multiplier: 0.9,
			underscore_multiplier: 0.5,
			only_underscore_multiplier: 0.1,
			extension_weights: BTreeMap::from([("pdf".to_string(), 2.0)]),
		}
	}

	#[test]
	fn test_single_level_below_managed_dir() {
		let p = priority(Path::new("/home/u/Desktop/note.md"), &config()).unwrap();
		assert!((p - 160.0 * 0.9).abs() < 1e-9);
	}

	#[test]
	fn test_file_at_managed_dir_keeps_base() {
		// No components below the managed directory
		let p = priority(Path::new("/home/u/Desktop"), &config()).unwrap();
		assert!((p - 160.0).abs() < 1e-9);
	}

	#[test]
	fn test_deepest_managed_dir_wins() {
		let p = priority(Path::new("/home/u/Desktop/hot/x.txt"), &config()).unwrap();
		assert!((p - 400.0 * 0.9).abs() < 1e-9);
	}

	#[test]
	fn test_underscore_component_multiplier() {
		// `_` alone: depth * only_underscore
		let p = priority(Path::new("/home/u/Desktop/_/x.txt"), &config()).unwrap();
		let expected = 160.0 * 0.9 * 0.1 * 0.9;
		assert!((p - expected).abs() < 1e-9);
	}

	#[test]
	fn test_leading_underscores_stack() {
		let p = priority(Path::new("/home/u/Desktop/__drafts/x.txt"), &config()).unwrap();
		let expected = 160.0 * 0.9 * 0.5 * 0.5 * 0.9;
		assert!((p - expected).abs() < 1e-9);
	}

	#[test]
	fn test_extension_weight_applies() {
		let p = priority(Path::new("/home/u/Desktop/doc.pdf"), &config()).unwrap();
		assert!((p - 160.0 * 0.9 * 2.0).abs() < 1e-9);
	}

	#[test]
	fn test_unmanaged_path_errors() {
		assert!(priority(Path::new("/etc/hosts"), &config()).is_err());
	}

	#[test]
	fn test_priority_is_stable() {
		let a = priority(Path::new("/home/u/Desktop/a/b/c.txt"), &config()).unwrap();
		let b = priority(Path::new("/home/u/Desktop/a/b/c.txt"), &config()).unwrap();
		assert_eq!(a, b);
	}
}

// vim: ts=4
