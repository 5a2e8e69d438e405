//! JSON-RPC tool server (MCP)
//!
//! JSON-RPC 2.0 over standard input/output, one request per line. Tools
//! mirror the CLI commands (`wksm_<group>_<subcommand>`) and invoke the
//! same dispatcher, so both surfaces return structurally identical
//! envelopes. Long-running tools are flagged `async`: their call returns
//! a queued job immediately and the terminal envelope arrives as a
//! `notifications/tool_result`.

mod tools;

pub use tools::{tool_specs, ToolSpec};

use crate::config::WksHome;
use crate::error::WksError;
use crate::protocol::{dispatch, CommandContext, Envelope, Reporter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Advertised estimate for queued jobs
const ASYNC_ESTIMATE_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct RpcRequest {
	#[allow(dead_code)]
	jsonrpc: Option<String>,
	id: Option<Value>,
	method: String,
	#[serde(default)]
	params: Value,
}

/// Serialized line writer shared between the reply path and job tasks
#[derive(Clone)]
pub struct OutWriter {
	inner: Arc<Mutex<std::io::Stdout>>,
}

impl OutWriter {
	fn new() -> OutWriter {
		OutWriter { inner: Arc::new(Mutex::new(std::io::stdout())) }
	}

	fn write_line(&self, value: &Value) {
		let mut out = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		if let Ok(line) = serde_json::to_string(value) {
			let _ = writeln!(out, "{}", line);
			let _ = out.flush();
		}
	}

	fn respond(&self, id: &Value, result: Value) {
		self.write_line(&json!({ "jsonrpc": "2.0", "id": id, "result": result }));
	}

	fn respond_error(&self, id: &Value, code: i64, message: &str) {
		self.write_line(&json!({
			"jsonrpc": "2.0",
			"id": id,
			"error": { "code": code, "message": message },
		}));
	}

	fn notify(&self, method: &str, params: Value) {
		self.write_line(&json!({ "jsonrpc": "2.0", "method": method, "params": params }));
	}
}

/// Reporter that forwards stages 1-3 as progress notifications
struct RpcReporter {
	job_id: String,
	out: OutWriter,
}

impl RpcReporter {
	fn notify_progress(&self, progress: f64, message: &str) {
		self.out.notify(
			"notifications/progress",
			json!({
				"job_id": self.job_id,
				"progress": progress,
				"message": message,
				"timestamp": crate::util::iso8601(crate::util::now_utc()),
			}),
		);
	}
}

impl Reporter for RpcReporter {
	fn announce(&mut self, text: &str) {
		self.notify_progress(0.0, text);
	}

	fn progress(&mut self, done: u64, total: Option<u64>, message: &str) {
		let fraction = match total {
			Some(total) if total > 0 => (done as f64 / total as f64).clamp(0.0, 1.0),
			_ => 0.5,
		};
		self.notify_progress(fraction, message);
	}

	fn result_line(&mut self, _success: bool, summary: &str) {
		self.notify_progress(1.0, summary);
	}
}

/// Split `wksm_<group>_<action>` back into dispatcher coordinates
pub fn parse_tool_name(name: &str) -> Option<(String, String)> {
	let rest = name.strip_prefix("wksm_")?;
	match rest {
		"cat" => Some(("cat".to_string(), "run".to_string())),
		"diff" => Some(("diff".to_string(), "run".to_string())),
		_ => {
			let (group, action) = rest.split_once('_')?;
			Some((group.to_string(), action.to_string()))
		}
	}
}

/// Run the server until stdin closes
pub async fn serve(home: WksHome, config: crate::config::Config) -> Result<(), WksError> {
	let out = OutWriter::new();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();

	while let Some(line) = lines.next_line().await? {
		let line = line.trim().to_string();
		if line.is_empty() {
			continue;
		}
		let request: RpcRequest = match serde_json::from_str(&line) {
			Ok(r) => r,
			Err(e) => {
				warn!("unparseable request: {}", e);
				out.respond_error(&Value::Null, -32700, "parse error");
				continue;
			}
		};
		let id = request.id.clone().unwrap_or(Value::Null);
		debug!("rpc {} id={}", request.method, id);

		match request.method.as_str() {
			"tools/list" => {
				out.respond(&id, json!({ "tools": tool_specs() }));
			}
			"tools/call" => {
				handle_call(&home, &config, &out, &id, &request.params).await;
			}
			other => {
				out.respond_error(&id, -32601, &format!("method '{}' not found", other));
			}
		}
	}
	Ok(())
}

async fn handle_call(
	home: &WksHome,
	config: &crate::config::Config,
	out: &OutWriter,
	id: &Value,
	params: &Value,
) {
	let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
		out.respond_error(id, -32602, "missing tool name");
		return;
	};
	let Some((group, action)) = parse_tool_name(name) else {
		out.respond_error(id, -32602, &format!("unknown tool '{}'", name));
		return;
	};
	let Some(spec) = tool_specs().into_iter().find(|t| t.name == name) else {
		out.respond_error(id, -32602, &format!("unknown tool '{}'", name));
		return;
	};
	let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

	if spec.r#async {
		// Queue the job and return immediately; the terminal envelope
		// arrives out-of-band
		let job_id = uuid::Uuid::new_v4().to_string();
		out.respond(
			id,
			json!({
				"job_id": job_id,
				"estimated_runtime_seconds": ASYNC_ESTIMATE_SECS,
				"status": "queued",
			}),
		);

		let out = out.clone();
		let home = home.clone();
		let config = config.clone();
		tokio::spawn(async move {
			let mut ctx = CommandContext::new(home, config);
			let mut rep = RpcReporter { job_id: job_id.clone(), out: out.clone() };
			let envelope = dispatch(&mut ctx, &group, &action, &arguments, &mut rep).await;
			out.notify(
				"notifications/tool_result",
				json!({ "job_id": job_id, "result": envelope }),
			);
		});
		return;
	}

	let mut ctx = CommandContext::new(home.clone(), config.clone());
	let mut rep = RpcReporter { job_id: format!("inline-{}", id), out: out.clone() };
	let envelope: Envelope = dispatch(&mut ctx, &group, &action, &arguments, &mut rep).await;
	out.respond(id, serde_json::to_value(&envelope).unwrap_or(Value::Null));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tool_name_parsing() {
		assert_eq!(
			parse_tool_name("wksm_monitor_sync"),
			Some(("monitor".to_string(), "sync".to_string()))
		);
		assert_eq!(
			parse_tool_name("wksm_monitor_filter_add"),
			Some(("monitor".to_string(), "filter_add".to_string()))
		);
		assert_eq!(parse_tool_name("wksm_cat"), Some(("cat".to_string(), "run".to_string())));
		assert_eq!(parse_tool_name("nope"), None);
	}

	#[test]
	fn test_every_tool_name_round_trips() {
		for spec in tool_specs() {
			let parsed = parse_tool_name(&spec.name);
			assert!(parsed.is_some(), "tool {} does not parse", spec.name);
		}
	}
}

// vim: ts=4
