use std::path::PathBuf;
use tempfile::TempDir;

use wks::config::{Config, WksHome};
use wks::db::Database;
use wks::monitor::Monitor;
use wks::uri::Uri;

#[test]
fn test_starter_config_round_trips_through_disk() {
	let tmp = TempDir::new().unwrap();
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	Config::starter(&home).save(&home.config_path()).unwrap();

	let loaded = Config::load(&home.config_path()).unwrap();
	assert_eq!(loaded.database.prefix, "wks");
	assert_eq!(loaded.display.format, "yaml");
	assert!(!loaded.index.enabled);
	assert!(!loaded.search.enabled);
}

#[test]
fn test_validation_error_names_the_json_path() {
	let tmp = TempDir::new().unwrap();
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	let mut config = Config::starter(&home);
	config.monitor.priority.underscore_multiplier = -1.0;

	let err = config.validate().unwrap_err();
	let text = err.to_string();
	assert!(text.contains("monitor.priority.underscore_multiplier"));
	assert!(text.contains("-1"));
}

#[test]
fn test_truncated_document_rejected() {
	let tmp = TempDir::new().unwrap();
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	std::fs::write(home.config_path(), "{\"monitor\": {}}").unwrap();

	let err = Config::load(&home.config_path()).unwrap_err();
	assert_eq!(err.kind(), "config_invalid");
}

#[tokio::test]
async fn test_redb_backend_survives_process_style_reopen() {
	// Same flow as two consecutive CLI invocations against one store file
	let tmp = TempDir::new().unwrap();
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	let mut config = Config::starter(&home);
	let watched = tmp.path().join("watched");
	std::fs::create_dir_all(&watched).unwrap();
	config.monitor.filter.include_paths.push(watched.clone());
	config.monitor.priority.dirs.insert(watched.clone(), 50.0);

	let note = watched.join("n.md");
	std::fs::write(&note, "persisted\n").unwrap();
	let uri = Uri::local_file(&note).to_string();

	{
		let db = Database::open(&config.database).unwrap();
		let monitor = Monitor::new(&config.monitor, &db).unwrap();
		monitor.sync(&note, false).await.unwrap();
	}

	let db = Database::open(&config.database).unwrap();
	let monitor = Monitor::new(&config.monitor, &db).unwrap();
	let node = monitor.nodes().get(&uri).await.unwrap();
	assert!(node.is_some());
	assert_eq!(monitor.nodes().last_sync().await.unwrap().is_some(), true);
}

#[test]
fn test_wks_home_rejects_file_collision() {
	let tmp = TempDir::new().unwrap();
	let path = tmp.path().join("wks");
	std::fs::write(&path, "not a dir").unwrap();
	assert!(WksHome::at(PathBuf::from(&path)).is_err());
}
