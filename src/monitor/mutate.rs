//! Configuration mutations for the monitor's filter and priority blocks
//!
//! Pure configuration operations: they edit the in-memory `Config` and the
//! caller persists it. The daemon does not hot-reload, so handlers follow
//! up with a restart notice.

use crate::config::Config;
use crate::error::WksError;
use crate::util;
use std::path::Path;
use std::str::FromStr;

/// The six filter lists addressable from the CLI/RPC surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterList {
	IncludePaths,
	ExcludePaths,
	IncludeDirnames,
	ExcludeDirnames,
	IncludeGlobs,
	ExcludeGlobs,
}

impl FromStr for FilterList {
	type Err = WksError;

	fn from_str(s: &str) -> Result<Self, WksError> {
		match s {
			"include_paths" => Ok(FilterList::IncludePaths),
			"exclude_paths" => Ok(FilterList::ExcludePaths),
			"include_dirnames" => Ok(FilterList::IncludeDirnames),
			"exclude_dirnames" => Ok(FilterList::ExcludeDirnames),
			"include_globs" => Ok(FilterList::IncludeGlobs),
			"exclude_globs" => Ok(FilterList::ExcludeGlobs),
			other => Err(WksError::other(format!(
				"unknown filter list '{}' (expected include/exclude × paths/dirnames/globs)",
				other
			))),
		}
	}
}

/// Add `value` to a filter list; duplicates and include/exclude overlaps
/// are conflicts
pub fn filter_add(config: &mut Config, list: FilterList, value: &str) -> Result<(), WksError> {
	match list {
		FilterList::IncludePaths | FilterList::ExcludePaths => {
			let path = util::normalize_path(Path::new(value));
			let target = match list {
				FilterList::IncludePaths => &mut config.monitor.filter.include_paths,
				_ => &mut config.monitor.filter.exclude_paths,
			};
			if target.contains(&path) {
				return Err(WksError::Conflict {
					message: format!("{} already present", path.display()),
				});
			}
			target.push(path);
		}
		FilterList::IncludeDirnames | FilterList::ExcludeDirnames => {
			let target = match list {
				FilterList::IncludeDirnames => &mut config.monitor.filter.include_dirnames,
				_ => &mut config.monitor.filter.exclude_dirnames,
			};
			if target.iter().any(|v| v == value) {
				return Err(WksError::Conflict { message: format!("{:?} already present", value) });
			}
			target.push(value.to_string());
		}
		FilterList::IncludeGlobs | FilterList::ExcludeGlobs => {
			globset::Glob::new(value).map_err(|e| WksError::ConfigInvalid {
				path: "monitor.filter".to_string(),
				found: value.to_string(),
				expected: format!("a valid glob pattern ({})", e),
			})?;
			let target = match list {
				FilterList::IncludeGlobs => &mut config.monitor.filter.include_globs,
				_ => &mut config.monitor.filter.exclude_globs,
			};
			if target.iter().any(|v| v == value) {
				return Err(WksError::Conflict { message: format!("{:?} already present", value) });
			}
			target.push(value.to_string());
		}
	}
	config.validate()
}

/// Remove `value` from a filter list; absence is NotFound
pub fn filter_remove(config: &mut Config, list: FilterList, value: &str) -> Result<(), WksError> {
	let removed = match list {
		FilterList::IncludePaths | FilterList::ExcludePaths => {
			let path = util::normalize_path(Path::new(value));
			let target = match list {
				FilterList::IncludePaths => &mut config.monitor.filter.include_paths,
				_ => &mut config.monitor.filter.exclude_paths,
			};
			let before = target.len();
			target.retain(|p| p != &path);
			target.len() != before
		}
		_ => {
			let target = match list {
				FilterList::IncludeDirnames => &mut config.monitor.filter.include_dirnames,
				FilterList::ExcludeDirnames => &mut config.monitor.filter.exclude_dirnames,
				FilterList::IncludeGlobs => &mut config.monitor.filter.include_globs,
				_ => &mut config.monitor.filter.exclude_globs,
			};
			let before = target.len();
			target.retain(|v| v != value);
			target.len() != before
		}
	};
	if !removed {
		return Err(WksError::NotFound { what: format!("filter entry {:?}", value) });
	}
	Ok(())
}

/// Scalar keys addressable by `monitor priority set`
#[derive(Debug, Clone, PartialEq)]
pub enum PriorityKey {
	DepthMultiplier,
	UnderscoreMultiplier,
	OnlyUnderscoreMultiplier,
	Extension(String),
}

impl FromStr for PriorityKey {
	type Err = WksError;

	fn from_str(s: &str) -> Result<Self, WksError> {
		match s {
			"depth_multiplier" => Ok(PriorityKey::DepthMultiplier),
			"underscore_multiplier" => Ok(PriorityKey::UnderscoreMultiplier),
			"only_underscore_multiplier" => Ok(PriorityKey::OnlyUnderscoreMultiplier),
			other => match other.strip_prefix("ext.") {
				Some(ext) if !ext.is_empty() => Ok(PriorityKey::Extension(ext.to_string())),
				_ => Err(WksError::other(format!(
					"unknown priority key '{}' (expected a multiplier or ext.<extension>)",
					other
				))),
			},
		}
	}
}

/// Register a managed directory with its base priority
pub fn priority_add(config: &mut Config, dir: &str, base: f64) -> Result<(), WksError> {
	let path = util::normalize_path(Path::new(dir));
	if config.monitor.priority.dirs.contains_key(&path) {
		return Err(WksError::Conflict {
			message: format!("{} is already a managed directory", path.display()),
		});
	}
	config.monitor.priority.dirs.insert(path, base);
	config.validate()
}

pub fn priority_remove(config: &mut Config, dir: &str) -> Result<(), WksError> {
	let path = util::normalize_path(Path::new(dir));
	if config.monitor.priority.dirs.remove(&path).is_none() {
		return Err(WksError::NotFound {
			what: format!("managed directory {}", path.display()),
		});
	}
	Ok(())
}

pub fn priority_set(config: &mut Config, key: &PriorityKey, value: f64) -> Result<(), WksError> {
	match key {
		PriorityKey::DepthMultiplier => config.monitor.priority.depth_multiplier = value,
		PriorityKey::UnderscoreMultiplier => config.monitor.priority.underscore_multiplier = value,
		PriorityKey::OnlyUnderscoreMultiplier => {
			config.monitor.priority.only_underscore_multiplier = value
		}
		PriorityKey::Extension(ext) => {
			config.monitor.priority.extension_weights.insert(ext.clone(), value);
		}
	}
	config.validate()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::WksHome;
	use tempfile::TempDir;

	fn config() -> (TempDir, Config) {
		let tmp = TempDir::new().unwrap();
		let home = WksHome::at(tmp.path().join("wks")).unwrap();
		let config = Config::starter(&home);
		(tmp, config)
	}

	#[test]
	fn test_filter_add_and_remove() {
		let (_tmp, mut config) = config();
		filter_add(&mut config, FilterList::ExcludeGlobs, "*.bak").unwrap();
		assert!(config.monitor.filter.exclude_globs.contains(&"*.bak".to_string()));

		filter_remove(&mut config, FilterList::ExcludeGlobs, "*.bak").unwrap();
		assert!(config.monitor.filter.exclude_globs.is_empty());
	}

	#[test]
	fn test_filter_add_duplicate_conflicts() {
		let (_tmp, mut config) = config();
		filter_add(&mut config, FilterList::IncludePaths, "/tmp/x").unwrap();
		let err = filter_add(&mut config, FilterList::IncludePaths, "/tmp/x").unwrap_err();
		assert_eq!(err.kind(), "conflict");
	}

	#[test]
	fn test_filter_add_cross_list_overlap_conflicts() {
		let (_tmp, mut config) = config();
		filter_add(&mut config, FilterList::IncludePaths, "/tmp/x").unwrap();
		let err = filter_add(&mut config, FilterList::ExcludePaths, "/tmp/x").unwrap_err();
		assert_eq!(err.kind(), "conflict");
	}

	#[test]
	fn test_filter_remove_absent_not_found() {
		let (_tmp, mut config) = config();
		let err = filter_remove(&mut config, FilterList::IncludeGlobs, "*.xyz").unwrap_err();
		assert_eq!(err.kind(), "not_found");
	}

	#[test]
	fn test_priority_add_set_remove() {
		let (_tmp, mut config) = config();
		priority_add(&mut config, "/tmp/managed", 100.0).unwrap();
		assert!(priority_add(&mut config, "/tmp/managed", 50.0).is_err());

		priority_set(&mut config, &"ext.pdf".parse().unwrap(), 2.0).unwrap();
		assert_eq!(config.monitor.priority.extension_weights.get("pdf"), Some(&2.0));

		priority_set(&mut config, &"depth_multiplier".parse().unwrap(), 0.8).unwrap();
		assert_eq!(config.monitor.priority.depth_multiplier, 0.8);

		priority_remove(&mut config, "/tmp/managed").unwrap();
		assert!(priority_remove(&mut config, "/tmp/managed").is_err());
	}

	#[test]
	fn test_priority_set_rejects_nonpositive() {
		let (_tmp, mut config) = config();
		assert!(priority_set(&mut config, &"depth_multiplier".parse().unwrap(), 0.0).is_err());
	}

	#[test]
	fn test_bad_glob_rejected() {
		let (_tmp, mut config) = config();
		assert!(filter_add(&mut config, FilterList::IncludeGlobs, "[").is_err());
	}
}

// vim: ts=4
