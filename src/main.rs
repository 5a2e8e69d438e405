use clap::{Arg, ArgAction, Command};
use serde_json::{json, Value};

use wks::config::{Config, WksHome};
use wks::daemon::Daemon;
use wks::error::WksError;
use wks::protocol::{dispatch, CliReporter, CommandContext};
use wks::{logging, mcp, protocol};

fn path_arg(name: &'static str) -> Arg {
	Arg::new(name).required(true).value_name("PATH")
}

fn cli() -> Command {
	Command::new("wks")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Personal knowledge-infrastructure daemon")
		.subcommand_required(true)
		.arg(
			Arg::new("display")
				.long("display")
				.value_name("FORMAT")
				.help("Output format: yaml or json")
				.global(true),
		)
		.subcommand(
			Command::new("config")
				.about("Configuration document")
				.subcommand_required(true)
				.subcommand(Command::new("show"))
				.subcommand(Command::new("path"))
				.subcommand(Command::new("init"))
				.subcommand(Command::new("validate")),
		)
		.subcommand(
			Command::new("monitor")
				.about("Filesystem node store")
				.subcommand_required(true)
				.subcommand(Command::new("check").arg(path_arg("path")))
				.subcommand(
					Command::new("sync").arg(path_arg("path")).arg(
						Arg::new("recursive")
							.short('r')
							.long("recursive")
							.action(ArgAction::SetTrue),
					),
				)
				.subcommand(
					Command::new("filter")
						.subcommand_required(true)
						.subcommand(Command::new("list"))
						.subcommand(
							Command::new("add")
								.arg(Arg::new("list").required(true))
								.arg(Arg::new("value").required(true)),
						)
						.subcommand(
							Command::new("remove")
								.arg(Arg::new("list").required(true))
								.arg(Arg::new("value").required(true)),
						),
				)
				.subcommand(
					Command::new("priority")
						.subcommand_required(true)
						.subcommand(Command::new("list"))
						.subcommand(
							Command::new("add")
								.arg(Arg::new("dir").required(true))
								.arg(Arg::new("base").required(true)),
						)
						.subcommand(Command::new("remove").arg(Arg::new("dir").required(true)))
						.subcommand(
							Command::new("set")
								.arg(Arg::new("key").required(true))
								.arg(Arg::new("value").required(true)),
						),
				),
		)
		.subcommand(
			Command::new("link")
				.about("Edge store")
				.subcommand_required(true)
				.subcommand(
					Command::new("check")
						.arg(path_arg("path"))
						.arg(Arg::new("parser").long("parser").value_name("NAME"))
						.arg(Arg::new("remote").long("remote").action(ArgAction::SetTrue)),
				)
				.subcommand(
					Command::new("sync")
						.arg(path_arg("path"))
						.arg(
							Arg::new("recursive")
								.short('r')
								.long("recursive")
								.action(ArgAction::SetTrue),
						)
						.arg(Arg::new("remote").long("remote").action(ArgAction::SetTrue))
						.arg(Arg::new("parser").long("parser").value_name("NAME")),
				)
				.subcommand(
					Command::new("show")
						.arg(Arg::new("uri").required(true))
						.arg(Arg::new("direction").long("direction").value_name("DIR")),
				)
				.subcommand(
					Command::new("prune")
						.arg(Arg::new("remote").long("remote").action(ArgAction::SetTrue)),
				),
		)
		.subcommand(
			Command::new("vault")
				.about("Vault operations")
				.subcommand_required(true)
				.subcommand(Command::new("status"))
				.subcommand(
					Command::new("sync")
						.arg(Arg::new("path").value_name("PATH"))
						.arg(Arg::new("remote").long("remote").action(ArgAction::SetTrue)),
				)
				.subcommand(Command::new("check").arg(Arg::new("path").value_name("PATH"))),
		)
		.subcommand(
			Command::new("transform")
				.about("Document transformation cache")
				.arg(Arg::new("engine").required(true).value_name("ENGINE"))
				.arg(Arg::new("file").value_name("FILE"))
				.arg(Arg::new("options").long("options").value_name("JSON")),
		)
		.subcommand(Command::new("cat").about("Stream a transformed document").arg(
			Arg::new("target").required(true).value_name("CHECKSUM|PATH"),
		))
		.subcommand(
			Command::new("diff")
				.about("Diff two documents' text forms")
				.arg(path_arg("a"))
				.arg(Arg::new("b").required(true).value_name("PATH")),
		)
		.subcommand(
			Command::new("daemon")
				.about("Event-driven sync daemon")
				.subcommand_required(true)
				.subcommand(
					Command::new("start").arg(
						Arg::new("restrict").long("restrict").value_name("DIR"),
					),
				)
				.subcommand(Command::new("stop"))
				.subcommand(Command::new("status")),
		)
		.subcommand(
			Command::new("database")
				.about("Database backend")
				.subcommand_required(true)
				.subcommand(Command::new("status"))
				.subcommand(
					Command::new("reset").arg(Arg::new("collection").required(true)),
				),
		)
		.subcommand(
			Command::new("log")
				.about("Unified log file")
				.subcommand_required(true)
				.subcommand(
					Command::new("show")
						.arg(Arg::new("level").long("level").value_name("LEVEL"))
						.arg(Arg::new("tail").long("tail").value_name("N")),
				)
				.subcommand(
					Command::new("prune")
						.arg(Arg::new("debug").long("debug").action(ArgAction::SetTrue))
						.arg(Arg::new("info").long("info").action(ArgAction::SetTrue))
						.arg(Arg::new("warning").long("warning").action(ArgAction::SetTrue))
						.arg(Arg::new("error").long("error").action(ArgAction::SetTrue)),
				),
		)
		.subcommand(
			Command::new("service")
				.about("OS service units")
				.subcommand_required(true)
				.subcommand(
					Command::new("install").arg(
						Arg::new("restrict").long("restrict").value_name("DIR"),
					),
				)
				.subcommand(Command::new("uninstall"))
				.subcommand(Command::new("status")),
		)
		.subcommand(
			Command::new("mcp")
				.about("JSON-RPC tool server")
				.subcommand_required(true)
				.subcommand(Command::new("serve"))
				.subcommand(Command::new("tools")),
		)
}

fn get_str(matches: &clap::ArgMatches, name: &str) -> Option<String> {
	matches.get_one::<String>(name).cloned()
}

/// Translate the parsed CLI into dispatcher coordinates and JSON args
fn command_of(matches: &clap::ArgMatches) -> Result<(String, String, Value), WksError> {
	let (group, sub) = matches.subcommand().expect("subcommand required");
	let missing = |what: &str| WksError::other(format!("missing argument '{}'", what));

	let (action, args): (String, Value) = match group {
		"config" | "vault" | "daemon" | "database" | "log" | "service" | "mcp" => {
			let (action, leaf) = sub.subcommand().expect("subcommand required");
			let args = match (group, action) {
				("vault", "sync") => json!({
					"path": get_str(leaf, "path"),
					"remote": leaf.get_flag("remote"),
				}),
				("vault", "check") => json!({ "path": get_str(leaf, "path") }),
				("daemon", "start") => json!({ "restrict": get_str(leaf, "restrict") }),
				("database", "reset") => {
					json!({ "collection": get_str(leaf, "collection").ok_or_else(|| missing("collection"))? })
				}
				("log", "show") => json!({
					"level": get_str(leaf, "level"),
					"tail": get_str(leaf, "tail").and_then(|t| t.parse::<u64>().ok()),
				}),
				("log", "prune") => json!({
					"debug": leaf.get_flag("debug"),
					"info": leaf.get_flag("info"),
					"warning": leaf.get_flag("warning"),
					"error": leaf.get_flag("error"),
				}),
				("service", "install") => json!({ "restrict": get_str(leaf, "restrict") }),
				_ => json!({}),
			};
			(action.to_string(), args)
		}
		"monitor" => match sub.subcommand() {
			Some(("check", leaf)) => (
				"check".to_string(),
				json!({ "path": get_str(leaf, "path").ok_or_else(|| missing("path"))? }),
			),
			Some(("sync", leaf)) => (
				"sync".to_string(),
				json!({
					"path": get_str(leaf, "path").ok_or_else(|| missing("path"))?,
					"recursive": leaf.get_flag("recursive"),
				}),
			),
			Some(("filter", filter_sub)) => {
				let (action, leaf) = filter_sub.subcommand().expect("subcommand required");
				let args = if action == "list" {
					json!({})
				} else {
					json!({
						"list": get_str(leaf, "list").ok_or_else(|| missing("list"))?,
						"value": get_str(leaf, "value").ok_or_else(|| missing("value"))?,
					})
				};
				(format!("filter_{}", action), args)
			}
			Some(("priority", priority_sub)) => {
				let (action, leaf) = priority_sub.subcommand().expect("subcommand required");
				let args = match action {
					"add" => json!({
						"dir": get_str(leaf, "dir").ok_or_else(|| missing("dir"))?,
						"base": get_str(leaf, "base")
							.and_then(|v| v.parse::<f64>().ok())
							.ok_or_else(|| missing("base"))?,
					}),
					"remove" => json!({
						"dir": get_str(leaf, "dir").ok_or_else(|| missing("dir"))?,
					}),
					"set" => json!({
						"key": get_str(leaf, "key").ok_or_else(|| missing("key"))?,
						"value": get_str(leaf, "value")
							.and_then(|v| v.parse::<f64>().ok())
							.ok_or_else(|| missing("value"))?,
					}),
					_ => json!({}),
				};
				(format!("priority_{}", action), args)
			}
			_ => unreachable!("subcommand required"),
		},
		"link" => {
			let (action, leaf) = sub.subcommand().expect("subcommand required");
			let args = match action {
				"check" => json!({
					"path": get_str(leaf, "path").ok_or_else(|| missing("path"))?,
					"parser": get_str(leaf, "parser"),
					"remote": leaf.get_flag("remote"),
				}),
				"sync" => json!({
					"path": get_str(leaf, "path").ok_or_else(|| missing("path"))?,
					"recursive": leaf.get_flag("recursive"),
					"remote": leaf.get_flag("remote"),
					"parser": get_str(leaf, "parser"),
				}),
				"show" => json!({
					"uri": get_str(leaf, "uri").ok_or_else(|| missing("uri"))?,
					"direction": get_str(leaf, "direction"),
				}),
				_ => json!({ "remote": leaf.get_flag("remote") }),
			};
			(action.to_string(), args)
		}
		"transform" => {
			// `transform engines` and `transform audit` share the engine
			// slot with `transform <engine> <file>`
			let engine = get_str(sub, "engine").ok_or_else(|| missing("engine"))?;
			match engine.as_str() {
				"engines" => ("engines".to_string(), json!({})),
				"audit" => ("audit".to_string(), json!({})),
				_ => {
					let options = match get_str(sub, "options") {
						Some(raw) => serde_json::from_str(&raw).map_err(|e| {
							WksError::other(format!("--options is not valid JSON: {}", e))
						})?,
						None => json!({}),
					};
					(
						"run".to_string(),
						json!({
							"engine": engine,
							"file": get_str(sub, "file").ok_or_else(|| missing("file"))?,
							"options": options,
						}),
					)
				}
			}
		}
		"cat" => (
			"run".to_string(),
			json!({ "target": get_str(sub, "target").ok_or_else(|| missing("target"))? }),
		),
		"diff" => (
			"run".to_string(),
			json!({
				"a": get_str(sub, "a").ok_or_else(|| missing("a"))?,
				"b": get_str(sub, "b").ok_or_else(|| missing("b"))?,
			}),
		),
		_ => unreachable!("subcommand required"),
	};
	Ok((group.to_string(), action, args))
}

async fn run() -> i32 {
	let matches = cli().get_matches();

	let home = match WksHome::resolve() {
		Ok(home) => home,
		Err(e) => {
			eprintln!("FAIL: {}", e);
			return 1;
		}
	};
	logging::init_tracing(home.logfile_path());

	let (group, action, args) = match command_of(&matches) {
		Ok(parts) => parts,
		Err(e) => {
			eprintln!("FAIL: {}", e);
			return 1;
		}
	};

	// `config init` runs before a config exists; everything else loads it
	let config = if group == "config" && action == "init" {
		Config::starter(&home)
	} else {
		match Config::load(&home.config_path()) {
			Ok(config) => config,
			Err(e) => {
				eprintln!("FAIL: {}", e);
				eprintln!("hint: run `wks config init` to create a starter configuration");
				return 1;
			}
		}
	};

	let display = get_str(&matches, "display").unwrap_or_else(|| config.display.format.clone());

	// Long-running surfaces bypass the dispatcher
	if group == "daemon" && action == "start" {
		let restrict = args
			.get("restrict")
			.and_then(|v| v.as_str())
			.map(std::path::PathBuf::from);
		return match Daemon::new(home, config, restrict) {
			Ok((daemon, _lock)) => match daemon.run().await {
				Ok(()) => 0,
				Err(e) => {
					eprintln!("FAIL: {}", e);
					1
				}
			},
			Err(e) => {
				eprintln!("FAIL: {}", e);
				1
			}
		};
	}
	if group == "mcp" {
		if action == "serve" {
			return match mcp::serve(home, config).await {
				Ok(()) => 0,
				Err(e) => {
					eprintln!("FAIL: {}", e);
					1
				}
			};
		}
		// mcp tools: print the advertised schemas
		let specs = serde_json::to_value(mcp::tool_specs()).unwrap_or(Value::Null);
		println!("{}", serde_json::to_string_pretty(&specs).unwrap_or_default());
		return 0;
	}

	let mut ctx = CommandContext::new(home, config);
	let mut rep = CliReporter::new(&ctx.config.display.color);
	let envelope = dispatch(&mut ctx, &group, &action, &args, &mut rep).await;

	if !envelope.success {
		// Standard output stays empty on failure
		return 1;
	}

	if group == "cat" {
		// Stage 4 for cat is the artifact itself
		if let Some(content) = envelope.data.get("content").and_then(|v| v.as_str()) {
			print!("{}", content);
		}
		return 0;
	}

	match protocol::render_output(&envelope, &display) {
		Ok(rendered) => {
			print!("{}", rendered);
			if !rendered.ends_with('\n') {
				println!();
			}
			0
		}
		Err(e) => {
			eprintln!("FAIL: {}", e);
			1
		}
	}
}

fn main() {
	let runtime = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("FAIL: failed to start runtime: {}", e);
			std::process::exit(1);
		}
	};
	let code = runtime.block_on(run());
	std::process::exit(code);
}

// vim: ts=4
