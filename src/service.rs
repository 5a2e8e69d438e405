//! OS service glue
//!
//! Renders and places the user-level unit that keeps the daemon running.
//! Bootstrapping (enable/start) stays with the OS service manager; these
//! commands only own the unit file and report where it lives.

use crate::config::ServiceConfig;
use crate::error::WksError;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct ServiceReport {
	pub unit_path: String,
	pub installed: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_step: Option<String>,
}

/// Path of the systemd user unit for this service
pub fn unit_path(service: &ServiceConfig) -> Result<PathBuf, WksError> {
	if !cfg!(target_os = "linux") {
		return Err(WksError::Unsupported {
			message: "service units are only generated for systemd (Linux)".to_string(),
		});
	}
	let home = std::env::var("HOME")
		.map_err(|_| WksError::other("could not determine HOME directory"))?;
	Ok(PathBuf::from(home)
		.join(".config/systemd/user")
		.join(format!("{}.service", service.name)))
}

fn render_unit(service: &ServiceConfig, restrict: Option<&Path>) -> Result<String, WksError> {
	let exe = std::env::current_exe()?;
	let mut unit = format!(
		"[Unit]\n\
		Description=WKS knowledge-infrastructure daemon\n\
		After=default.target\n\
		\n\
		[Service]\n\
		ExecStart={} daemon start\n\
		Restart=on-failure\n\
		RestartSec=5\n",
		exe.display()
	);
	if let Some(dir) = restrict {
		// The restrict override persists through the service environment
		unit.push_str(&format!("Environment={}={}\n", service.restrict_env, dir.display()));
	}
	unit.push_str("\n[Install]\nWantedBy=default.target\n");
	Ok(unit)
}

pub fn install(service: &ServiceConfig, restrict: Option<&Path>) -> Result<ServiceReport, WksError> {
	let path = unit_path(service)?;
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&path, render_unit(service, restrict)?)?;
	Ok(ServiceReport {
		unit_path: path.display().to_string(),
		installed: true,
		next_step: Some(format!(
			"systemctl --user enable --now {}.service",
			service.name
		)),
	})
}

pub fn uninstall(service: &ServiceConfig) -> Result<ServiceReport, WksError> {
	let path = unit_path(service)?;
	if !path.exists() {
		return Err(WksError::NotFound { what: format!("service unit {}", path.display()) });
	}
	std::fs::remove_file(&path)?;
	Ok(ServiceReport {
		unit_path: path.display().to_string(),
		installed: false,
		next_step: Some(format!("systemctl --user disable {}.service", service.name)),
	})
}

pub fn status(service: &ServiceConfig) -> Result<ServiceReport, WksError> {
	let path = unit_path(service)?;
	Ok(ServiceReport {
		unit_path: path.display().to_string(),
		installed: path.exists(),
		next_step: None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn service() -> ServiceConfig {
		ServiceConfig { name: "wks-test".to_string(), restrict_env: "WKS_RESTRICT".to_string() }
	}

	#[test]
	fn test_render_unit_with_restrict() {
		let unit = render_unit(&service(), Some(Path::new("/data/notes"))).unwrap();
		assert!(unit.contains("daemon start"));
		assert!(unit.contains("Environment=WKS_RESTRICT=/data/notes"));
		assert!(unit.contains("[Install]"));
	}

	#[test]
	fn test_render_unit_without_restrict() {
		let unit = render_unit(&service(), None).unwrap();
		assert!(!unit.contains("Environment=WKS_RESTRICT"));
	}
}

// vim: ts=4
