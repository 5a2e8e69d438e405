use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use wks::config::{Config, WksHome};
use wks::db::Database;
use wks::links::LinkEngine;
use wks::store::EdgeStatus;
use wks::vault::{ensure_registered, Vault};

struct Fixture {
	_tmp: TempDir,
	base: PathBuf,
	config: Config,
	db: Database,
}

fn fixture() -> Fixture {
	let tmp = TempDir::new().unwrap();
	let home = WksHome::at(tmp.path().join("wks")).unwrap();
	let mut config = Config::starter(&home);
	config.vault.base = tmp.path().join("vault");
	fs::create_dir_all(config.vault.base.join("Projects")).unwrap();
	config.save(&home.config_path()).unwrap();
	ensure_registered(&mut config, &home).unwrap();

	let base = config.vault.base.clone();
	Fixture { _tmp: tmp, base, config, db: Database::memory("wks") }
}

#[tokio::test]
async fn test_vault_sync_writes_deterministic_edges() {
	let f = fixture();
	fs::write(f.base.join("Projects/A.md"), "[[B]]\n![[img.png]]\n").unwrap();

	let links = LinkEngine::new(&f.config, &f.db).unwrap();
	let vault = Vault::new(&f.config, &links);
	vault.sync(None, false).await.unwrap();

	let edges = links.edges().find_from("vault:///Projects/A.md").await.unwrap();
	assert_eq!(edges.len(), 2);
	let mut targets: Vec<&str> = edges.iter().map(|e| e.to_uri.as_str()).collect();
	targets.sort();
	assert_eq!(targets, vec!["vault:///B.md", "vault:///img.png"]);

	// Line numbers follow the note layout
	let b_edge = edges.iter().find(|e| e.to_uri == "vault:///B.md").unwrap();
	assert_eq!(b_edge.line_number, 1);
	let img_edge = edges.iter().find(|e| e.to_uri == "vault:///img.png").unwrap();
	assert_eq!(img_edge.line_number, 2);
}

#[tokio::test]
async fn test_vault_sync_twice_is_byte_identical() {
	let f = fixture();
	fs::write(f.base.join("Projects/A.md"), "[[B]]\n![[img.png]]\n").unwrap();

	let links = LinkEngine::new(&f.config, &f.db).unwrap();
	let vault = Vault::new(&f.config, &links);

	vault.sync(None, false).await.unwrap();
	let mut first = links.edges().find_from("vault:///Projects/A.md").await.unwrap();
	first.sort_by(|a, b| a.id.cmp(&b.id));

	vault.sync(None, false).await.unwrap();
	let mut second = links.edges().find_from("vault:///Projects/A.md").await.unwrap();
	second.sort_by(|a, b| a.id.cmp(&b.id));

	assert_eq!(first, second);
}

#[tokio::test]
async fn test_edge_replacement_follows_content() {
	let f = fixture();
	let note = f.base.join("Projects/A.md");
	fs::write(&note, "[[B]]\n").unwrap();

	let links = LinkEngine::new(&f.config, &f.db).unwrap();
	let vault = Vault::new(&f.config, &links);
	vault.sync(None, false).await.unwrap();

	// Rewrite the note: the old edge set is replaced wholesale
	fs::write(&note, "[[C]]\n[[D]]\n").unwrap();
	vault.sync(None, false).await.unwrap();

	let edges = links.edges().find_from("vault:///Projects/A.md").await.unwrap();
	assert_eq!(edges.len(), 2);
	assert!(edges.iter().all(|e| e.to_uri != "vault:///B.md"));
}

#[tokio::test]
async fn test_mirror_symlink_for_external_target() {
	let f = fixture();
	let external = f._tmp.path().join("paper.pdf");
	fs::write(&external, b"pdf").unwrap();
	fs::write(
		f.base.join("Projects/A.md"),
		format!("[paper]({})\n", external.display()),
	)
	.unwrap();

	let links = LinkEngine::new(&f.config, &f.db).unwrap();
	let vault = Vault::new(&f.config, &links);
	let report = vault.sync(None, false).await.unwrap();
	assert_eq!(report.mirror.symlinks_created, 1);

	let mirror = f
		.base
		.join("_links")
		.join(wks::util::hostname())
		.join(external.strip_prefix("/").unwrap());
	assert!(mirror.exists());
}

#[tokio::test]
async fn test_vault_check_classifies_missing() {
	let f = fixture();
	fs::write(f.base.join("Projects/A.md"), "[[B]]\n[[Nowhere]]\n").unwrap();
	fs::write(f.base.join("B.md"), "here\n").unwrap();

	let links = LinkEngine::new(&f.config, &f.db).unwrap();
	let vault = Vault::new(&f.config, &links);

	let broken = vault.check(None).await.unwrap();
	assert_eq!(broken.len(), 1);
	assert_eq!(broken[0].to_uri, "vault:///Nowhere.md");
	assert_eq!(broken[0].line_number, 2);
	assert_eq!(broken[0].status, EdgeStatus::MissingTarget);
}
