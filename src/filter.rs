//! Filter engine: the two-phase monitored/excluded decision
//!
//! Phase 1 walks the path's ancestors (self first) against the include and
//! exclude path roots; the first ancestor present in either list wins.
//! Phase 2 evaluates dirname and glob rules, with include rules reversing a
//! tentative exclusion. Every rule evaluation is recorded in a trace that
//! `monitor check` returns to the caller.

use crate::config::FilterConfig;
use crate::error::WksError;
use crate::util;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One evaluated rule and whether it fired
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
	pub rule: String,
	pub fired: bool,
}

/// Outcome of the two-phase decision
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
	pub monitored: bool,
	pub trace: Vec<TraceStep>,
}

/// Compiled filter rules
pub struct FilterEngine {
	include_paths: Vec<PathBuf>,
	exclude_paths: Vec<PathBuf>,
	include_dirnames: Vec<String>,
	exclude_dirnames: Vec<String>,
	include_globs: CompiledGlobs,
	exclude_globs: CompiledGlobs,
}

struct CompiledGlobs {
	patterns: Vec<String>,
	set: GlobSet,
}

impl CompiledGlobs {
	fn new(patterns: &[String]) -> Result<Self, WksError> {
		let mut builder = GlobSetBuilder::new();
		for p in patterns {
			let glob = Glob::new(p).map_err(|e| WksError::ConfigInvalid {
				path: "monitor.filter".to_string(),
				found: p.clone(),
				expected: format!("a valid glob pattern ({})", e),
			})?;
			builder.add(glob);
		}
		let set = builder.build().map_err(|e| WksError::other(format!("glob set: {}", e)))?;
		Ok(CompiledGlobs { patterns: patterns.to_vec(), set })
	}

	/// Match against the full path or the basename alone
	fn matches(&self, path: &Path) -> bool {
		if self.set.is_match(path) {
			return true;
		}
		match path.file_name() {
			Some(name) => self.set.is_match(Path::new(name)),
			None => false,
		}
	}

	fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}
}

impl FilterEngine {
	pub fn new(config: &FilterConfig) -> Result<Self, WksError> {
		Ok(FilterEngine {
			include_paths: config.include_paths.iter().map(|p| util::normalize_path(p)).collect(),
			exclude_paths: config.exclude_paths.iter().map(|p| util::normalize_path(p)).collect(),
			include_dirnames: config.include_dirnames.clone(),
			exclude_dirnames: config.exclude_dirnames.clone(),
			include_globs: CompiledGlobs::new(&config.include_globs)?,
			exclude_globs: CompiledGlobs::new(&config.exclude_globs)?,
		})
	}

	/// The two-phase decision. Total: every path gets an answer, and the
	/// same path with the same config always gets the same one.
	pub fn is_monitored(&self, path: &Path) -> Decision {
		let path = util::normalize_path(path);
		let mut trace = Vec::new();

		// Phase 1: nearest ancestor in either root list wins
		let mut root_included = false;
		let mut root_decided = false;
		let mut ancestor: Option<&Path> = Some(&path);
		while let Some(current) = ancestor {
			if self.include_paths.iter().any(|p| p == current) {
				trace.push(TraceStep {
					rule: format!("include_paths:{}", current.display()),
					fired: true,
				});
				root_included = true;
				root_decided = true;
				break;
			}
			if self.exclude_paths.iter().any(|p| p == current) {
				trace.push(TraceStep {
					rule: format!("exclude_paths:{}", current.display()),
					fired: true,
				});
				root_decided = true;
				break;
			}
			ancestor = current.parent();
		}
		if !root_decided {
			trace.push(TraceStep { rule: "no_root_match".to_string(), fired: true });
		}
		if !root_included {
			return Decision { monitored: false, trace };
		}

		// Phase 2: dirname and glob rules; includes reverse a tentative
		// exclusion
		let parent_name = path
			.parent()
			.and_then(|p| p.file_name())
			.map(|n| n.to_string_lossy().to_string());

		let mut tentatively_excluded = false;
		for dirname in &self.exclude_dirnames {
			let fired = parent_name.as_deref() == Some(dirname.as_str());
			trace.push(TraceStep { rule: format!("exclude_dirnames:{}", dirname), fired });
			tentatively_excluded |= fired;
		}
		if !self.exclude_globs.is_empty() {
			let fired = self.exclude_globs.matches(&path);
			trace.push(TraceStep {
				rule: format!("exclude_globs:{}", self.exclude_globs.patterns.join(",")),
				fired,
			});
			tentatively_excluded |= fired;
		}

		if tentatively_excluded {
			let mut reversed = false;
			for dirname in &self.include_dirnames {
				let fired = parent_name.as_deref() == Some(dirname.as_str());
				trace.push(TraceStep { rule: format!("include_dirnames:{}", dirname), fired });
				reversed |= fired;
			}
			if !self.include_globs.is_empty() {
				let fired = self.include_globs.matches(&path);
				trace.push(TraceStep {
					rule: format!("include_globs:{}", self.include_globs.patterns.join(",")),
					fired,
				});
				reversed |= fired;
			}
			return Decision { monitored: reversed, trace };
		}

		Decision { monitored: true, trace }
	}

	/// Whether a recursive walk should descend into `dir`.
	///
	/// Prunes subtrees that phase 1 excludes outright and directories whose
	/// name is excluded without an include reversal. Individual files are
	/// still subject to the full decision.
	pub fn should_descend(&self, dir: &Path) -> bool {
		let dir = util::normalize_path(dir);
		let mut ancestor: Option<&Path> = Some(&dir);
		while let Some(current) = ancestor {
			if self.include_paths.iter().any(|p| p == current) {
				break;
			}
			if self.exclude_paths.iter().any(|p| p == current) {
				return false;
			}
			ancestor = current.parent();
		}

		if let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) {
			if self.exclude_dirnames.contains(&name) && !self.include_dirnames.contains(&name) {
				return false;
			}
		}
		true
	}
}


// vim: ts=4
