//! Diff engines
//!
//! A small typed registry, same shape as the transform engines. The
//! built-in `unified` engine produces classic unified hunks from an LCS
//! over lines; inputs arrive as text (binary documents go through the
//! transform cache first).

use crate::error::WksError;
use std::fmt::Write as _;

pub trait DiffEngine: Send + Sync {
	fn name(&self) -> &'static str;
	fn diff(&self, a: &str, b: &str, context: usize) -> String;
}

pub fn engine_named(name: &str) -> Option<&'static dyn DiffEngine> {
	static UNIFIED: UnifiedEngine = UnifiedEngine;
	match name {
		"unified" => Some(&UNIFIED),
		_ => None,
	}
}

pub fn engine_or_err(name: &str) -> Result<&'static dyn DiffEngine, WksError> {
	engine_named(name).ok_or_else(|| WksError::Unsupported {
		message: format!("no diff engine named '{}'", name),
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
	Keep,
	Delete,
	Insert,
}

pub struct UnifiedEngine;

impl DiffEngine for UnifiedEngine {
	fn name(&self) -> &'static str {
		"unified"
	}

	fn diff(&self, a: &str, b: &str, context: usize) -> String {
		let a_lines: Vec<&str> = a.lines().collect();
		let b_lines: Vec<&str> = b.lines().collect();
		let script = edit_script(&a_lines, &b_lines);
		render_hunks(&a_lines, &b_lines, &script, context)
	}
}

/// Classic DP edit script over lines; quadratic, which the text sizes the
/// cache produces tolerate fine
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Op> {
	let (n, m) = (a.len(), b.len());
	let mut lcs = vec![vec![0u32; m + 1]; n + 1];
	for i in (0..n).rev() {
		for j in (0..m).rev() {
			lcs[i][j] = if a[i] == b[j] {
				lcs[i + 1][j + 1] + 1
			} else {
				lcs[i + 1][j].max(lcs[i][j + 1])
			};
		}
	}

	let mut script = Vec::with_capacity(n + m);
	let (mut i, mut j) = (0, 0);
	while i < n && j < m {
		if a[i] == b[j] {
			script.push(Op::Keep);
			i += 1;
			j += 1;
		} else if lcs[i + 1][j] >= lcs[i][j + 1] {
			script.push(Op::Delete);
			i += 1;
		} else {
			script.push(Op::Insert);
			j += 1;
		}
	}
	script.extend(std::iter::repeat(Op::Delete).take(n - i));
	script.extend(std::iter::repeat(Op::Insert).take(m - j));
	script
}

fn render_hunks(a: &[&str], b: &[&str], script: &[Op], context: usize) -> String {
	// Mark which script positions must be shown (changes plus context)
	let mut show = vec![false; script.len()];
	for (idx, op) in script.iter().enumerate() {
		if *op != Op::Keep {
			let start = idx.saturating_sub(context);
			let end = (idx + context + 1).min(script.len());
			for flag in &mut show[start..end] {
				*flag = true;
			}
		}
	}

	let mut out = String::new();
	let (mut i, mut j) = (0usize, 0usize);
	let mut idx = 0usize;
	while idx < script.len() {
		if !show[idx] {
			match script[idx] {
				Op::Keep => {
					i += 1;
					j += 1;
				}
				Op::Delete => i += 1,
				Op::Insert => j += 1,
			}
			idx += 1;
			continue;
		}

		// One hunk: the run of shown positions
		let hunk_start = idx;
		let mut end = idx;
		while end < script.len() && show[end] {
			end += 1;
		}
		let (hunk_i, hunk_j) = (i, j);
		let mut body = String::new();
		for op in &script[hunk_start..end] {
			match op {
				Op::Keep => {
					let _ = writeln!(body, " {}", a[i]);
					i += 1;
					j += 1;
				}
				Op::Delete => {
					let _ = writeln!(body, "-{}", a[i]);
					i += 1;
				}
				Op::Insert => {
					let _ = writeln!(body, "+{}", b[j]);
					j += 1;
				}
			}
		}
		let _ = writeln!(
			out,
			"@@ -{},{} +{},{} @@",
			hunk_i + 1,
			i - hunk_i,
			hunk_j + 1,
			j - hunk_j
		);
		out.push_str(&body);
		idx = end;
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_identical_inputs_produce_empty_diff() {
		let d = UnifiedEngine.diff("a\nb\nc\n", "a\nb\nc\n", 3);
		assert!(d.is_empty());
	}

	#[test]
	fn test_single_line_change() {
		let d = UnifiedEngine.diff("a\nb\nc\n", "a\nx\nc\n", 1);
		assert!(d.contains("-b"));
		assert!(d.contains("+x"));
		assert!(d.contains(" a"));
		assert!(d.contains(" c"));
	}

	#[test]
	fn test_append_only() {
		let d = UnifiedEngine.diff("a\n", "a\nb\n", 0);
		assert!(d.contains("+b"));
		assert!(!d.contains("-"));
	}

	#[test]
	fn test_context_bounds_hunk() {
		let a = "1\n2\n3\n4\n5\n6\n7\n";
		let b = "1\n2\n3\nX\n5\n6\n7\n";
		let d = UnifiedEngine.diff(a, b, 1);
		assert!(d.contains(" 3"));
		assert!(d.contains(" 5"));
		assert!(!d.contains(" 1"));
		assert!(!d.contains(" 7"));
	}

	#[test]
	fn test_registry() {
		assert!(engine_named("unified").is_some());
		assert!(engine_or_err("patience").is_err());
	}
}

// vim: ts=4
