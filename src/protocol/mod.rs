//! Structured command protocol
//!
//! Every operation, invoked from the CLI or over RPC, runs through the
//! same 4-stage pattern: announce, progress, result line, structured
//! output. The output is always the uniform envelope
//! `{success, data, messages}`; errors never escape a handler as
//! anything else.

pub mod commands;

pub use commands::{dispatch, CommandContext};

use crate::error::WksError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
	Error,
	Warning,
	Info,
	Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
	#[serde(rename = "type")]
	pub kind: MessageKind,
	pub text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// The uniform result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	pub success: bool,
	pub data: Map<String, Value>,
	pub messages: Vec<Message>,
}

impl Envelope {
	pub fn ok(data: Map<String, Value>) -> Envelope {
		Envelope { success: true, data, messages: Vec::new() }
	}

	pub fn from_error(error: &WksError) -> Envelope {
		Envelope {
			success: false,
			data: Map::new(),
			messages: vec![Message {
				kind: MessageKind::Error,
				text: error.to_string(),
				details: Some(serde_json::json!({ "kind": error.kind() })),
			}],
		}
	}

	pub fn push_warning(&mut self, text: impl Into<String>) {
		self.messages.push(Message { kind: MessageKind::Warning, text: text.into(), details: None });
	}

	pub fn push_info(&mut self, text: impl Into<String>) {
		self.messages.push(Message { kind: MessageKind::Info, text: text.into(), details: None });
	}

	/// Fold an error in: success drops, data is kept for partial counts
	pub fn push_error(&mut self, error: &WksError) {
		self.success = false;
		self.messages.push(Message {
			kind: MessageKind::Error,
			text: error.to_string(),
			details: Some(serde_json::json!({ "kind": error.kind() })),
		});
	}

	pub fn first_error(&self) -> Option<&Message> {
		self.messages.iter().find(|m| m.kind == MessageKind::Error)
	}
}

/// Serialize an envelope's data for a report struct
pub fn data_of<T: Serialize>(value: &T) -> Map<String, Value> {
	match serde_json::to_value(value) {
		Ok(Value::Object(map)) => map,
		Ok(other) => {
			let mut map = Map::new();
			map.insert("value".to_string(), other);
			map
		}
		Err(_) => Map::new(),
	}
}

/// Stages 1-3 of the execution pattern; stage 4 is surface-specific
pub trait Reporter: Send {
	fn announce(&mut self, text: &str);
	fn progress(&mut self, done: u64, total: Option<u64>, message: &str);
	fn result_line(&mut self, success: bool, summary: &str);
}

/// CLI reporter: stages 1-3 on standard error, colors when attached to a
/// terminal
pub struct CliReporter {
	color: bool,
	progress_open: bool,
}

impl CliReporter {
	pub fn new(color_mode: &str) -> CliReporter {
		let color = match color_mode {
			"always" => true,
			"never" => false,
			_ => std::io::stderr().is_terminal(),
		};
		CliReporter { color, progress_open: false }
	}

	fn end_progress(&mut self) {
		if self.progress_open {
			eprintln!();
			self.progress_open = false;
		}
	}
}

impl Reporter for CliReporter {
	fn announce(&mut self, text: &str) {
		eprintln!("{}", text);
	}

	fn progress(&mut self, done: u64, total: Option<u64>, message: &str) {
		match total {
			Some(total) => eprint!("\r[{}/{}] {}", done, total, message),
			None => eprint!("\r[{}] {}", done, message),
		}
		let _ = std::io::stderr().flush();
		self.progress_open = true;
	}

	fn result_line(&mut self, success: bool, summary: &str) {
		self.end_progress();
		if success {
			eprintln!("OK: {}", summary);
		} else if self.color {
			eprintln!("\x1b[31mFAIL: {}\x1b[0m", summary);
		} else {
			eprintln!("FAIL: {}", summary);
		}
	}
}

/// Reporter that swallows stages 1-3 (tests, embedded use)
#[derive(Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
	fn announce(&mut self, _text: &str) {}
	fn progress(&mut self, _done: u64, _total: Option<u64>, _message: &str) {}
	fn result_line(&mut self, _success: bool, _summary: &str) {}
}

/// Render stage-4 output in the configured display format
pub fn render_output(envelope: &Envelope, format: &str) -> Result<String, WksError> {
	match format {
		"json" => Ok(serde_json::to_string_pretty(&Value::Object(envelope.data.clone()))?),
		_ => serde_yaml::to_string(&envelope.data)
			.map_err(|e| WksError::other(format!("YAML rendering: {}", e))),
	}
}


// vim: ts=4
