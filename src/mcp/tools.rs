//! Tool schemas advertised by `tools/list`
//!
//! Names mirror the CLI (`wksm_<group>_<subcommand>`). Schemas are plain
//! JSON Schema objects; the `async` flag marks tools that return a queued
//! job instead of an inline envelope.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	#[serde(rename = "inputSchema")]
	pub input_schema: Value,
	pub r#async: bool,
}

fn tool(name: &str, description: &str, schema: Value, is_async: bool) -> ToolSpec {
	ToolSpec {
		name: name.to_string(),
		description: description.to_string(),
		input_schema: schema,
		r#async: is_async,
	}
}

fn schema(required: &[(&str, &str, &str)], optional: &[(&str, &str, &str)]) -> Value {
	let mut properties = serde_json::Map::new();
	for (name, ty, desc) in required.iter().chain(optional.iter()) {
		properties
			.insert(name.to_string(), json!({ "type": ty, "description": desc }));
	}
	json!({
		"type": "object",
		"properties": properties,
		"required": required.iter().map(|(n, _, _)| n).collect::<Vec<_>>(),
	})
}

/// Every advertised tool, in stable order
pub fn tool_specs() -> Vec<ToolSpec> {
	let empty = schema(&[], &[]);
	let path_only = schema(&[("path", "string", "Filesystem path")], &[]);

	vec![
		tool("wksm_config_show", "Show the loaded configuration", empty.clone(), false),
		tool("wksm_config_path", "Path of the configuration document", empty.clone(), false),
		tool("wksm_config_validate", "Re-validate the configuration on disk", empty.clone(), false),
		tool("wksm_monitor_check", "Explain the filter decision for a path", path_only.clone(), false),
		tool(
			"wksm_monitor_sync",
			"Sync a path (or subtree) into the node store",
			schema(
				&[("path", "string", "Filesystem path")],
				&[("recursive", "boolean", "Walk the whole subtree")],
			),
			true,
		),
		tool("wksm_monitor_filter_list", "List filter rules", empty.clone(), false),
		tool(
			"wksm_monitor_filter_add",
			"Add a filter rule",
			schema(
				&[
					("list", "string", "Target list, e.g. exclude_globs"),
					("value", "string", "Rule value"),
				],
				&[],
			),
			false,
		),
		tool(
			"wksm_monitor_filter_remove",
			"Remove a filter rule",
			schema(
				&[
					("list", "string", "Target list, e.g. exclude_globs"),
					("value", "string", "Rule value"),
				],
				&[],
			),
			false,
		),
		tool("wksm_monitor_priority_list", "List priority configuration", empty.clone(), false),
		tool(
			"wksm_monitor_priority_add",
			"Register a managed directory",
			schema(
				&[
					("dir", "string", "Directory path"),
					("base", "number", "Base priority"),
				],
				&[],
			),
			false,
		),
		tool(
			"wksm_monitor_priority_remove",
			"Unregister a managed directory",
			schema(&[("dir", "string", "Directory path")], &[]),
			false,
		),
		tool(
			"wksm_monitor_priority_set",
			"Set a priority multiplier or extension weight",
			schema(
				&[
					("key", "string", "Multiplier name or ext.<extension>"),
					("value", "number", "New value"),
				],
				&[],
			),
			false,
		),
		tool(
			"wksm_link_check",
			"Parse a note and classify its links",
			schema(
				&[("path", "string", "Source file")],
				&[
					("parser", "string", "Parser override"),
					("remote", "boolean", "Probe web targets"),
				],
			),
			false,
		),
		tool(
			"wksm_link_sync",
			"Replace the edge set of a source",
			schema(
				&[("path", "string", "Source file or directory")],
				&[
					("recursive", "boolean", "Walk directories"),
					("remote", "boolean", "Probe web targets"),
					("parser", "string", "Parser override"),
				],
			),
			true,
		),
		tool(
			"wksm_link_show",
			"List edges touching a URI",
			schema(
				&[("uri", "string", "Node URI")],
				&[("direction", "string", "from, to or any")],
			),
			false,
		),
		tool(
			"wksm_link_prune",
			"Remove edges with missing endpoints",
			schema(&[], &[("remote", "boolean", "Probe web targets too")]),
			true,
		),
		tool("wksm_vault_status", "Vault edge counts and invariants", empty.clone(), false),
		tool(
			"wksm_vault_sync",
			"Sync vault notes and the symlink mirror",
			schema(
				&[],
				&[
					("path", "string", "Restrict to a path inside the vault"),
					("remote", "boolean", "Probe web targets"),
				],
			),
			true,
		),
		tool(
			"wksm_vault_check",
			"Report broken links in vault notes",
			schema(&[], &[("path", "string", "Restrict to a path inside the vault")]),
			false,
		),
		tool(
			"wksm_transform_run",
			"Transform a document into a cached text artifact",
			schema(
				&[
					("engine", "string", "Engine name"),
					("file", "string", "Input file"),
				],
				&[("options", "object", "Engine options")],
			),
			true,
		),
		tool("wksm_transform_engines", "List transform engines", empty.clone(), false),
		tool("wksm_transform_audit", "Heal cache/metadata divergences", empty.clone(), false),
		tool(
			"wksm_cat",
			"Stream a cached artifact by checksum or transform a file",
			schema(&[("target", "string", "64-hex checksum or file path")], &[]),
			false,
		),
		tool(
			"wksm_diff",
			"Unified diff of two documents' text forms",
			schema(
				&[
					("a", "string", "First file"),
					("b", "string", "Second file"),
				],
				&[],
			),
			true,
		),
		tool("wksm_daemon_status", "Read the daemon heartbeat", empty.clone(), false),
		tool("wksm_daemon_stop", "Signal the running daemon to stop", empty.clone(), false),
		tool("wksm_database_status", "Backend and collection counts", empty.clone(), false),
		tool(
			"wksm_database_reset",
			"Delete a collection (transform resets its artifacts too)",
			schema(&[("collection", "string", "nodes, edges or transform")], &[]),
			false,
		),
		tool(
			"wksm_log_show",
			"Read the unified log (prunes expired entries first)",
			schema(
				&[],
				&[
					("level", "string", "Filter by level"),
					("tail", "integer", "Keep only the last N entries"),
				],
			),
			false,
		),
		tool(
			"wksm_log_prune",
			"Prune log entries past retention",
			schema(
				&[],
				&[
					("debug", "boolean", "Prune DEBUG"),
					("info", "boolean", "Prune INFO"),
					("warning", "boolean", "Prune WARN"),
					("error", "boolean", "Prune ERROR"),
				],
			),
			false,
		),
		tool(
			"wksm_service_install",
			"Write the OS service unit for the daemon",
			schema(&[], &[("restrict", "string", "Restrict the daemon to one directory")]),
			false,
		),
		tool("wksm_service_uninstall", "Remove the OS service unit", empty.clone(), false),
		tool("wksm_service_status", "Whether the service unit is installed", empty, false),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_names_are_unique_and_prefixed() {
		let specs = tool_specs();
		let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
		names.sort();
		let before = names.len();
		names.dedup();
		assert_eq!(names.len(), before);
		assert!(specs.iter().all(|s| s.name.starts_with("wksm_")));
	}

	#[test]
	fn test_async_flag_serializes_as_async() {
		let spec = tool_specs().into_iter().find(|s| s.name == "wksm_monitor_sync").unwrap();
		let value = serde_json::to_value(&spec).unwrap();
		assert_eq!(value.get("async"), Some(&serde_json::json!(true)));
		assert!(value.get("inputSchema").is_some());
	}
}

// vim: ts=4
