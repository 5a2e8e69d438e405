//! Transform row store
//!
//! Rows mirror cache artifacts one-to-one; the transform controller is the
//! only writer and keeps both sides coherent.

use super::{from_document, to_document};
use crate::db::{filter_eq, Collection, Database, Filter};
use crate::error::WksError;
use crate::util;
use serde::{Deserialize, Serialize};

const COLLECTION: &str = "transform";

/// One cached transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
	/// Cache key hash: sha256(file_checksum | engine | options_hash)
	#[serde(rename = "_id")]
	pub id: String,
	pub file_uri: String,
	pub engine: String,
	pub options_hash: String,
	/// SHA-256 of the transformed content; also the artifact filename base
	pub checksum: String,
	pub cache_uri: String,
	pub size_bytes: u64,
	pub created_at: String,
	pub last_accessed: String,
}

/// Deterministic row ID from the cache key
pub fn cache_key(file_checksum: &str, engine: &str, options_hash: &str) -> String {
	util::sha256_bytes(format!("{}|{}|{}", file_checksum, engine, options_hash).as_bytes())
}

pub struct TransformStore {
	col: Box<dyn Collection>,
}

impl TransformStore {
	pub fn open(db: &Database) -> Result<TransformStore, WksError> {
		Ok(TransformStore { col: db.collection(COLLECTION)? })
	}

	pub async fn get(&self, key: &str) -> Result<Option<TransformRecord>, WksError> {
		match self.col.find_one(&filter_eq("_id", key)).await? {
			Some(doc) => Ok(Some(from_document(doc)?)),
			None => Ok(None),
		}
	}

	pub async fn find_by_checksum(
		&self,
		checksum: &str,
	) -> Result<Option<TransformRecord>, WksError> {
		match self.col.find_one(&filter_eq("checksum", checksum)).await? {
			Some(doc) => Ok(Some(from_document(doc)?)),
			None => Ok(None),
		}
	}

	pub async fn insert(&self, record: &TransformRecord) -> Result<(), WksError> {
		self.col.update_one(&filter_eq("_id", record.id.clone()), to_document(record)?, true).await?;
		Ok(())
	}

	pub async fn touch(&self, key: &str, when: &str) -> Result<(), WksError> {
		let Some(mut record) = self.get(key).await? else {
			return Err(WksError::NotFound { what: format!("transform row {}", key) });
		};
		record.last_accessed = when.to_string();
		self.insert(&record).await
	}

	pub async fn delete(&self, key: &str) -> Result<bool, WksError> {
		Ok(self.col.delete_one(&filter_eq("_id", key)).await?)
	}

	pub async fn all(&self) -> Result<Vec<TransformRecord>, WksError> {
		self.col.find(&Filter::new()).await?.into_iter().map(from_document).collect()
	}

	pub async fn count(&self) -> Result<u64, WksError> {
		Ok(self.col.count(&Filter::new()).await?)
	}

	/// Total artifact bytes accounted by the rows
	pub async fn total_size(&self) -> Result<u64, WksError> {
		Ok(self.all().await?.iter().map(|r| r.size_bytes).sum())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::Database;

	fn record(key: &str, checksum: &str, size: u64) -> TransformRecord {
		TransformRecord {
			id: key.to_string(),
			file_uri: "file://box/doc.pdf".to_string(),
			engine: "text".to_string(),
			options_hash: util::sha256_bytes(b"{}"),
			checksum: checksum.to_string(),
			cache_uri: format!("file://box/cache/{}.txt", checksum),
			size_bytes: size,
			created_at: "2026-08-01T00:00:00.000Z".to_string(),
			last_accessed: "2026-08-01T00:00:00.000Z".to_string(),
		}
	}

	#[test]
	fn test_cache_key_deterministic() {
		let a = cache_key("f", "text", "o");
		assert_eq!(a, cache_key("f", "text", "o"));
		assert_ne!(a, cache_key("f", "hexdump", "o"));
	}

	#[tokio::test]
	async fn test_touch_updates_last_accessed_only() {
		let db = Database::memory("wks");
		let store = TransformStore::open(&db).unwrap();
		store.insert(&record("k1", &"c".repeat(64), 9)).await.unwrap();

		store.touch("k1", "2026-08-02T00:00:00.000Z").await.unwrap();
		let got = store.get("k1").await.unwrap().unwrap();
		assert_eq!(got.last_accessed, "2026-08-02T00:00:00.000Z");
		assert_eq!(got.created_at, "2026-08-01T00:00:00.000Z");
	}

	#[tokio::test]
	async fn test_total_size_sums_rows() {
		let db = Database::memory("wks");
		let store = TransformStore::open(&db).unwrap();
		store.insert(&record("k1", &"a".repeat(64), 10)).await.unwrap();
		store.insert(&record("k2", &"b".repeat(64), 32)).await.unwrap();
		assert_eq!(store.total_size().await.unwrap(), 42);
	}
}

// vim: ts=4
