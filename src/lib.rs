//! # WKS - Personal Knowledge-Infrastructure Daemon
//!
//! WKS mirrors a user's filesystem into two linked document stores: a
//! node store of tracked files (checksum, size, priority, timestamps) and
//! an edge store of links parsed from notes. A daemon keeps both fresh
//! from filesystem events; a transform pipeline turns binary documents
//! into cached text artifacts that join the same graph. Everything is
//! reachable through an equivalent CLI and JSON-RPC tool surface.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wks::config::{Config, WksHome};
//! use wks::db::Database;
//! use wks::monitor::Monitor;
//!
//! # async fn example() -> Result<(), wks::error::WksError> {
//! let home = WksHome::resolve()?;
//! let config = Config::load(&home.config_path())?;
//! let db = Database::open(&config.database)?;
//! let monitor = Monitor::new(&config.monitor, &db)?;
//! let report = monitor.sync(std::path::Path::new("/home/u/Desktop"), true).await?;
//! println!("synced {} files", report.files_synced);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod daemon;
pub mod db;
pub mod diff;
pub mod error;
pub mod filter;
pub mod links;
pub mod logfile;
pub mod logging;
pub mod mcp;
pub mod monitor;
pub mod priority;
pub mod protocol;
pub mod service;
pub mod store;
pub mod transform;
pub mod uri;
pub mod util;
pub mod vault;

// Re-export commonly used types
pub use config::{Config, WksHome};
pub use db::Database;
pub use error::WksError;
pub use protocol::{dispatch, CommandContext, Envelope};
pub use uri::Uri;

// vim: ts=4
