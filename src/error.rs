//! Error types for WKS operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for WKS operations
///
/// Every handler converts this into a result envelope at the boundary;
/// errors never cross the CLI/RPC surface as panics.
#[derive(Debug)]
pub enum WksError {
	/// Configuration is missing or malformed; `path` is the dotted JSON path
	ConfigInvalid { path: String, found: String, expected: String },

	/// The operation requires the path to be monitored
	PathNotMonitored { path: String },

	/// A node/edge/row/file is absent
	NotFound { what: String },

	/// Duplicate or overlapping entries in configuration lists
	Conflict { message: String },

	/// Database or local service unreachable
	BackendUnavailable { uri: String, source: Box<dyn Error + Send + Sync> },

	/// A transform/diff/parser engine refused its input
	EngineFailure { engine: String, message: String },

	/// An operation exceeded its deadline
	Timeout { what: String },

	/// The operation was cancelled cooperatively
	Cancelled,

	/// Cache-row/artifact divergence or another broken internal invariant
	Invariant { message: String },

	/// A daemon already owns the lock for this home directory
	AlreadyRunning { pid: u32 },

	/// The engine cannot handle this input type
	Unsupported { message: String },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl WksError {
	/// Stable machine-readable kind, attached to envelope messages as detail
	pub fn kind(&self) -> &'static str {
		match self {
			WksError::ConfigInvalid { .. } => "config_invalid",
			WksError::PathNotMonitored { .. } => "path_not_monitored",
			WksError::NotFound { .. } => "not_found",
			WksError::Conflict { .. } => "conflict",
			WksError::BackendUnavailable { .. } => "backend_unavailable",
			WksError::EngineFailure { .. } => "engine_failure",
			WksError::Timeout { .. } => "timeout",
			WksError::Cancelled => "cancelled",
			WksError::Invariant { .. } => "invariant",
			WksError::AlreadyRunning { .. } => "already_running",
			WksError::Unsupported { .. } => "unsupported",
			WksError::Io(_) => "io",
			WksError::Other { .. } => "other",
		}
	}

	pub fn other(message: impl Into<String>) -> Self {
		WksError::Other { message: message.into() }
	}

	pub fn invariant(message: impl Into<String>) -> Self {
		WksError::Invariant { message: message.into() }
	}
}

impl fmt::Display for WksError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WksError::ConfigInvalid { path, found, expected } => {
				write!(f, "Invalid configuration at {}: found {}, expected {}", path, found, expected)
			}
			WksError::PathNotMonitored { path } => {
				write!(f, "Path is not monitored: {}", path)
			}
			WksError::NotFound { what } => write!(f, "Not found: {}", what),
			WksError::Conflict { message } => write!(f, "Conflict: {}", message),
			WksError::BackendUnavailable { uri, source } => {
				write!(f, "Backend unavailable at {}: {}", uri, source)
			}
			WksError::EngineFailure { engine, message } => {
				write!(f, "Engine '{}' failed: {}", engine, message)
			}
			WksError::Timeout { what } => write!(f, "Timed out: {}", what),
			WksError::Cancelled => write!(f, "Operation cancelled"),
			WksError::Invariant { message } => write!(f, "Invariant violated: {}", message),
			WksError::AlreadyRunning { pid } => {
				write!(f, "Daemon already running (pid {})", pid)
			}
			WksError::Unsupported { message } => write!(f, "Unsupported: {}", message),
			WksError::Io(e) => write!(f, "I/O error: {}", e),
			WksError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for WksError {}

impl From<io::Error> for WksError {
	fn from(e: io::Error) -> Self {
		WksError::Io(e)
	}
}

impl From<serde_json::Error> for WksError {
	fn from(e: serde_json::Error) -> Self {
		WksError::Other { message: format!("JSON error: {}", e) }
	}
}

impl From<DbError> for WksError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Unavailable { uri, source } => WksError::BackendUnavailable { uri, source },
			DbError::BareCollectionName { name } => WksError::Invariant {
				message: format!("collection '{}' reached the backend without a prefix", name),
			},
			DbError::Corrupted { message } => WksError::Invariant { message },
			DbError::Io(e) => WksError::Io(e),
		}
	}
}

/// Database backend errors
#[derive(Debug)]
pub enum DbError {
	/// The backend could not be reached or opened
	Unavailable { uri: String, source: Box<dyn Error + Send + Sync> },

	/// A collection name without the configured prefix reached the backend
	BareCollectionName { name: String },

	/// Stored bytes failed to decode
	Corrupted { message: String },

	/// I/O error
	Io(io::Error),
}

impl DbError {
	pub fn unavailable<E: Error + Send + Sync + 'static>(uri: impl Into<String>, source: E) -> Self {
		DbError::Unavailable { uri: uri.into(), source: Box::new(source) }
	}
}

impl fmt::Display for DbError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DbError::Unavailable { uri, source } => {
				write!(f, "Database unavailable at {}: {}", uri, source)
			}
			DbError::BareCollectionName { name } => {
				write!(f, "Collection name '{}' is missing the configured prefix", name)
			}
			DbError::Corrupted { message } => write!(f, "Stored document corrupted: {}", message),
			DbError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for DbError {}

impl From<io::Error> for DbError {
	fn from(e: io::Error) -> Self {
		DbError::Io(e)
	}
}

// vim: ts=4
