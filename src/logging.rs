//! Tracing initialization
//!
//! Two sinks: human-readable output on stderr (filtered by `RUST_LOG`,
//! default `info`) and the unified log file at `{WKS_HOME}/logfile` in the
//! `[TIMESTAMP] [DOMAIN] LEVEL: message` format that `log show` reads back.

pub use tracing::{debug, error, info, trace, warn};

use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::fmt::format::{FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::prelude::*;

/// Event formatter for the unified log file
struct LogFileFormat;

impl<S, N> FormatEvent<S, N> for LogFileFormat
where
	S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
	N: for<'a> FormatFields<'a> + 'static,
{
	fn format_event(
		&self,
		_ctx: &FmtContext<'_, S, N>,
		mut writer: Writer<'_>,
		event: &tracing::Event<'_>,
	) -> std::fmt::Result {
		let metadata = event.metadata();
		let level = match *metadata.level() {
			tracing::Level::ERROR => "ERROR",
			tracing::Level::WARN => "WARN",
			tracing::Level::INFO => "INFO",
			_ => "DEBUG",
		};

		write!(
			&mut writer,
			"[{}] [{}] {}: ",
			crate::util::iso8601(crate::util::now_utc()),
			domain_of(metadata.target()),
			level
		)?;

		event.record(&mut |field: &tracing::field::Field, value: &dyn std::fmt::Debug| {
			if field.name() == "message" {
				let _ = write!(writer, "{:?}", value);
			}
		});
		writeln!(writer)
	}
}

/// Map a tracing target (`wks::monitor::sync`) to a log domain (`monitor`)
fn domain_of(target: &str) -> &str {
	let rest = target.strip_prefix("wks::").unwrap_or(target);
	rest.split("::").next().unwrap_or(rest)
}

/// Initialize tracing with stderr output plus the unified log file.
///
/// `RUST_LOG` controls verbosity:
///
/// ```bash
/// RUST_LOG=debug wks monitor sync ~/Desktop
/// RUST_LOG=wks::daemon=trace wks daemon start
/// ```
pub fn init_tracing(logfile: PathBuf) {
	let env_filter = || {
		tracing_subscriber::EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
	};

	let stderr_layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_filter(env_filter());

	let file_layer = tracing_subscriber::fmt::layer()
		.with_ansi(false)
		.event_format(LogFileFormat)
		.with_writer(move || open_logfile(&logfile))
		.with_filter(env_filter());

	tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
}

/// Open the log file for appending; fall back to a sink when unwritable so
/// logging never takes an operation down
fn open_logfile(path: &PathBuf) -> Box<dyn Write> {
	match std::fs::OpenOptions::new().create(true).append(true).open(path) {
		Ok(f) => Box::new(f),
		Err(_) => Box::new(std::io::sink()),
	}
}

// vim: ts=4
