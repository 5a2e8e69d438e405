//! In-memory backend
//!
//! Satisfies the same interface as the production backend; used by tests
//! and for running without a store on disk. All collections share one map
//! behind a mutex, so handles opened from the same backend see each
//! other's writes.

use super::{matches, require_prefixed, Backend, Collection, Document, Filter};
use crate::error::DbError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

#[derive(Default)]
pub struct MemoryBackend {
	collections: Arc<Mutex<Collections>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Backend for MemoryBackend {
	fn collection(&self, prefixed_name: &str) -> Result<Box<dyn Collection>, DbError> {
		require_prefixed(prefixed_name)?;
		Ok(Box::new(MemoryCollection {
			name: prefixed_name.to_string(),
			collections: self.collections.clone(),
		}))
	}

	fn ping(&self) -> Result<(), DbError> {
		Ok(())
	}
}

struct MemoryCollection {
	name: String,
	collections: Arc<Mutex<Collections>>,
}

impl MemoryCollection {
	fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Document>) -> T) -> T {
		let mut all = self.collections.lock().unwrap_or_else(|e| e.into_inner());
		f(all.entry(self.name.clone()).or_default())
	}
}

fn id_of(doc: &Document) -> Option<String> {
	doc.get("_id").and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[async_trait]
impl Collection for MemoryCollection {
	async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DbError> {
		Ok(self.with_map(|map| map.values().find(|d| matches(d, filter)).cloned()))
	}

	async fn find(&self, filter: &Filter) -> Result<Vec<Document>, DbError> {
		Ok(self.with_map(|map| map.values().filter(|d| matches(d, filter)).cloned().collect()))
	}

	async fn update_one(
		&self,
		filter: &Filter,
		doc: Document,
		upsert: bool,
	) -> Result<bool, DbError> {
		let new_id = id_of(&doc).ok_or_else(|| DbError::Corrupted {
			message: "document without _id".to_string(),
		})?;
		Ok(self.with_map(|map| {
			let existing = map.iter().find(|(_, d)| matches(d, filter)).map(|(k, _)| k.clone());
			match existing {
				Some(old_id) => {
					if old_id != new_id {
						map.remove(&old_id);
					}
					map.insert(new_id, doc);
					true
				}
				None if upsert => {
					map.insert(new_id, doc);
					true
				}
				None => false,
			}
		}))
	}

	async fn delete_one(&self, filter: &Filter) -> Result<bool, DbError> {
		Ok(self.with_map(|map| {
			let id = map.iter().find(|(_, d)| matches(d, filter)).map(|(k, _)| k.clone());
			match id {
				Some(id) => {
					map.remove(&id);
					true
				}
				None => false,
			}
		}))
	}

	async fn delete_many(&self, filter: &Filter) -> Result<u64, DbError> {
		Ok(self.with_map(|map| {
			let ids: Vec<String> = map
				.iter()
				.filter(|(_, d)| matches(d, filter))
				.map(|(k, _)| k.clone())
				.collect();
			let n = ids.len() as u64;
			for id in ids {
				map.remove(&id);
			}
			n
		}))
	}

	async fn count(&self, filter: &Filter) -> Result<u64, DbError> {
		Ok(self.with_map(|map| map.values().filter(|d| matches(d, filter)).count() as u64))
	}
}

// vim: ts=4
