use serde_json::json;
use std::fs;
use tempfile::TempDir;

use wks::config::{Config, WksHome};
use wks::mcp;
use wks::protocol::{dispatch, CommandContext, SilentReporter};

async fn context(tmp: &TempDir) -> CommandContext {
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	let mut config = Config::starter(&home);
	config.database.backend = "memory".to_string();
	config.vault.base = tmp.path().join("vault");
	fs::create_dir_all(&config.vault.base).unwrap();
	let watched = tmp.path().join("watched");
	fs::create_dir_all(&watched).unwrap();
	config.monitor.filter.include_paths.push(watched.clone());
	config.monitor.priority.dirs.insert(watched, 100.0);
	config.save(&home.config_path()).unwrap();
	CommandContext::new(home, config)
}

#[tokio::test]
async fn test_equivalent_invocations_return_identical_envelopes() {
	// The CLI and the RPC server both funnel through dispatch(); two
	// invocations with the same structured arguments must agree field
	// for field
	let tmp = TempDir::new().unwrap();
	let note = tmp.path().join("watched/a.md");
	fs::write(&note, "x\n").unwrap();
	let args = json!({ "path": note.display().to_string() });

	let mut cli_ctx = context(&tmp).await;
	let cli_envelope =
		dispatch(&mut cli_ctx, "monitor", "check", &args, &mut SilentReporter).await;

	let mut rpc_ctx = context(&tmp).await;
	let rpc_envelope =
		dispatch(&mut rpc_ctx, "monitor", "check", &args, &mut SilentReporter).await;

	assert_eq!(cli_envelope.data, rpc_envelope.data);
	assert_eq!(cli_envelope.messages, rpc_envelope.messages);
	assert_eq!(cli_envelope.success, rpc_envelope.success);
}

#[tokio::test]
async fn test_failure_envelope_shape() {
	let tmp = TempDir::new().unwrap();
	let mut ctx = context(&tmp).await;

	let envelope = dispatch(&mut ctx, "link", "sync", &json!({}), &mut SilentReporter).await;
	assert!(!envelope.success);
	assert!(envelope.data.is_empty());
	assert!(envelope.first_error().is_some());
}

#[tokio::test]
async fn test_every_advertised_tool_maps_to_a_dispatchable_command() {
	// tools/list promises names the dispatcher must accept; an unknown
	// (group, action) pair comes back as unsupported, which would mean a
	// drifted schema
	let tmp = TempDir::new().unwrap();
	let mut ctx = context(&tmp).await;

	for spec in mcp::tool_specs() {
		let (group, action) = mcp::parse_tool_name(&spec.name).unwrap();
		if group == "service" {
			// Service units live under the real $HOME; exercised in the
			// service module's own tests instead
			continue;
		}
		let envelope =
			dispatch(&mut ctx, &group, &action, &json!({}), &mut SilentReporter).await;
		if let Some(error) = envelope.first_error() {
			assert_ne!(
				error.details,
				Some(json!({"kind": "unsupported"})),
				"tool {} does not dispatch",
				spec.name
			);
		}
	}
}

#[tokio::test]
async fn test_mutation_info_message_present_on_both_surfaces() {
	let tmp = TempDir::new().unwrap();
	let args = json!({ "list": "exclude_globs", "value": "*.swp" });

	let mut a = context(&tmp).await;
	let first = dispatch(&mut a, "monitor", "filter_add", &args, &mut SilentReporter).await;
	assert!(first.success);
	assert!(first.messages.iter().any(|m| m.text.contains("restart the daemon")));

	// Same call again (fresh context, same home) now conflicts: the
	// persisted config already has the value
	let mut b = CommandContext::new(
		a.home.clone(),
		Config::load(&a.home.config_path()).unwrap(),
	);
	let second = dispatch(&mut b, "monitor", "filter_add", &args, &mut SilentReporter).await;
	assert!(!second.success);
	assert_eq!(
		second.first_error().unwrap().details,
		Some(json!({"kind": "conflict"}))
	);
}
