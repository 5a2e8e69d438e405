use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

use wks::config::TransformConfig;
use wks::db::Database;
use wks::transform::TransformCache;

fn cache(tmp: &TempDir) -> TransformCache {
	let config = TransformConfig {
		cache_dir: tmp.path().join("cache"),
		max_size_bytes: 1 << 20,
		default_engines: BTreeMap::from([
			("text/plain".to_string(), "text".to_string()),
			("application/octet-stream".to_string(), "hexdump".to_string()),
		]),
	};
	TransformCache::new(&config, &Database::memory("wks")).unwrap()
}

#[tokio::test]
async fn test_transform_idempotence() {
	let tmp = TempDir::new().unwrap();
	let cache = cache(&tmp);
	let doc = tmp.path().join("doc.txt");
	fs::write(&doc, "body text\n").unwrap();

	let first = cache.transform("text", &doc, &json!({})).await.unwrap();
	let row_before = cache.store().find_by_checksum(&first.checksum).await.unwrap().unwrap();

	tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	let second = cache.transform("text", &doc, &json!({})).await.unwrap();

	// Same checksum both times; the row was reused, not recreated
	assert_eq!(first.checksum, second.checksum);
	assert!(second.hit);
	let row_after = cache.store().find_by_checksum(&first.checksum).await.unwrap().unwrap();
	assert_eq!(row_before.created_at, row_after.created_at);
	assert!(row_after.last_accessed > row_before.last_accessed);
}

#[tokio::test]
async fn test_cache_and_rows_stay_coherent() {
	let tmp = TempDir::new().unwrap();
	let cache = cache(&tmp);
	let doc = tmp.path().join("doc.txt");
	fs::write(&doc, "body\n").unwrap();
	cache.transform("text", &doc, &json!({})).await.unwrap();

	// Every row has its artifact; every artifact has its row
	for row in cache.store().all().await.unwrap() {
		let uri = wks::uri::Uri::parse(&row.cache_uri).unwrap();
		assert!(uri.to_local_path(None).unwrap().is_file());
	}
	let audit = cache.audit().await.unwrap();
	assert!(audit.rows_removed.is_empty());
	assert!(audit.files_removed.is_empty());
}

#[tokio::test]
async fn test_reset_then_audit_reports_nothing() {
	let tmp = TempDir::new().unwrap();
	let cache = cache(&tmp);
	for (name, content) in [("a.txt", "one\n"), ("b.txt", "two\n")] {
		let path = tmp.path().join(name);
		fs::write(&path, content).unwrap();
		cache.transform("text", &path, &json!({})).await.unwrap();
	}
	assert_eq!(cache.store().count().await.unwrap(), 2);

	let report = cache.reset().await.unwrap();
	assert_eq!(report.rows_deleted, 2);
	assert_eq!(report.files_deleted, 2);

	assert_eq!(cache.store().count().await.unwrap(), 0);
	let leftovers: Vec<_> = match fs::read_dir(cache.cache_dir()) {
		Ok(entries) => entries.collect(),
		Err(_) => Vec::new(),
	};
	assert!(leftovers.is_empty());

	let audit = cache.audit().await.unwrap();
	assert!(audit.rows_removed.is_empty());
	assert!(audit.files_removed.is_empty());
}

#[tokio::test]
async fn test_cat_path_and_checksum_agree() {
	let tmp = TempDir::new().unwrap();
	let cache = cache(&tmp);
	let doc = tmp.path().join("doc.txt");
	fs::write(&doc, "same bytes\n").unwrap();

	let via_path = cache.cat(&doc.display().to_string()).await.unwrap();
	let outcome = cache.transform("text", &doc, &json!({})).await.unwrap();
	let via_checksum = cache.cat(&outcome.checksum).await.unwrap();
	assert_eq!(via_path, via_checksum);
}
