//! Production document store backed by redb
//!
//! One redb table per prefixed collection; keys are `_id` strings and
//! values are the JSON-serialized document bytes. Queries scan the table
//! and apply the equality filter in memory, which is plenty for the
//! collection sizes the monitor cap allows.

use super::{matches, require_prefixed, Backend, Collection, Document, Filter};
use crate::error::DbError;
use async_trait::async_trait;
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RedbBackend {
	db: Arc<redb::Database>,
	path: PathBuf,
}

impl RedbBackend {
	/// Open or create the store file
	pub fn open(path: &Path) -> Result<Self, DbError> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let db = redb::Database::create(path)
			.map_err(|e| DbError::unavailable(path.display().to_string(), e))?;
		Ok(RedbBackend { db: Arc::new(db), path: path.to_path_buf() })
	}

	fn unavailable<E: Error + Send + Sync + 'static>(&self, e: E) -> DbError {
		DbError::unavailable(self.path.display().to_string(), e)
	}
}

impl Backend for RedbBackend {
	fn collection(&self, prefixed_name: &str) -> Result<Box<dyn Collection>, DbError> {
		require_prefixed(prefixed_name)?;

		// Ensure the table exists so later read transactions cannot trip
		// over a missing table
		let def: TableDefinition<&str, &[u8]> = TableDefinition::new(prefixed_name);
		let write_txn = self.db.begin_write().map_err(|e| self.unavailable(e))?;
		write_txn.open_table(def).map_err(|e| self.unavailable(e))?;
		write_txn.commit().map_err(|e| self.unavailable(e))?;

		Ok(Box::new(RedbCollection {
			name: prefixed_name.to_string(),
			db: self.db.clone(),
			path: self.path.clone(),
		}))
	}

	fn ping(&self) -> Result<(), DbError> {
		// A read transaction exercises the store's health without writing
		self.db.begin_read().map(|_| ()).map_err(|e| self.unavailable(e))
	}
}

struct RedbCollection {
	name: String,
	db: Arc<redb::Database>,
	path: PathBuf,
}

impl RedbCollection {
	fn definition(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
		TableDefinition::new(&self.name)
	}

	fn unavailable<E: Error + Send + Sync + 'static>(&self, e: E) -> DbError {
		DbError::unavailable(self.path.display().to_string(), e)
	}

	fn decode(bytes: &[u8]) -> Result<Document, DbError> {
		serde_json::from_slice(bytes)
			.map_err(|e| DbError::Corrupted { message: format!("undecodable document: {}", e) })
	}

	/// Scan the whole table, returning `(id, document)` pairs that match
	fn scan(&self, filter: &Filter) -> Result<Vec<(String, Document)>, DbError> {
		let read_txn = self.db.begin_read().map_err(|e| self.unavailable(e))?;
		let table = read_txn.open_table(self.definition()).map_err(|e| self.unavailable(e))?;

		let mut out = Vec::new();
		for item in table.iter().map_err(|e| self.unavailable(e))? {
			let (key, value) = item.map_err(|e| self.unavailable(e))?;
			let doc = Self::decode(value.value())?;
			if matches(&doc, filter) {
				out.push((key.value().to_string(), doc));
			}
		}
		Ok(out)
	}
}

fn id_of(doc: &Document) -> Result<String, DbError> {
	doc.get("_id")
		.and_then(|v| v.as_str())
		.map(|s| s.to_string())
		.ok_or_else(|| DbError::Corrupted { message: "document without _id".to_string() })
}

#[async_trait]
impl Collection for RedbCollection {
	async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DbError> {
		// Fast path: filtering by _id alone is a point lookup
		if filter.len() == 1 {
			if let Some(id) = filter.get("_id").and_then(|v| v.as_str()) {
				let read_txn = self.db.begin_read().map_err(|e| self.unavailable(e))?;
				let table =
					read_txn.open_table(self.definition()).map_err(|e| self.unavailable(e))?;
				return match table.get(id).map_err(|e| self.unavailable(e))? {
					Some(value) => Ok(Some(Self::decode(value.value())?)),
					None => Ok(None),
				};
			}
		}
		Ok(self.scan(filter)?.into_iter().next().map(|(_, d)| d))
	}

	async fn find(&self, filter: &Filter) -> Result<Vec<Document>, DbError> {
		Ok(self.scan(filter)?.into_iter().map(|(_, d)| d).collect())
	}

	async fn update_one(
		&self,
		filter: &Filter,
		doc: Document,
		upsert: bool,
	) -> Result<bool, DbError> {
		let new_id = id_of(&doc)?;
		let existing = self.scan(filter)?.into_iter().next().map(|(id, _)| id);
		if existing.is_none() && !upsert {
			return Ok(false);
		}

		let bytes = serde_json::to_vec(&doc)
			.map_err(|e| DbError::Corrupted { message: e.to_string() })?;
		let write_txn = self.db.begin_write().map_err(|e| self.unavailable(e))?;
		{
			let mut table =
				write_txn.open_table(self.definition()).map_err(|e| self.unavailable(e))?;
			if let Some(old_id) = existing {
				if old_id != new_id {
					table.remove(old_id.as_str()).map_err(|e| self.unavailable(e))?;
				}
			}
			table.insert(new_id.as_str(), bytes.as_slice()).map_err(|e| self.unavailable(e))?;
		}
		write_txn.commit().map_err(|e| self.unavailable(e))?;
		Ok(true)
	}

	async fn delete_one(&self, filter: &Filter) -> Result<bool, DbError> {
		let Some((id, _)) = self.scan(filter)?.into_iter().next() else { return Ok(false) };
		let write_txn = self.db.begin_write().map_err(|e| self.unavailable(e))?;
		{
			let mut table =
				write_txn.open_table(self.definition()).map_err(|e| self.unavailable(e))?;
			table.remove(id.as_str()).map_err(|e| self.unavailable(e))?;
		}
		write_txn.commit().map_err(|e| self.unavailable(e))?;
		Ok(true)
	}

	async fn delete_many(&self, filter: &Filter) -> Result<u64, DbError> {
		let ids: Vec<String> = self.scan(filter)?.into_iter().map(|(id, _)| id).collect();
		if ids.is_empty() {
			return Ok(0);
		}
		let write_txn = self.db.begin_write().map_err(|e| self.unavailable(e))?;
		{
			let mut table =
				write_txn.open_table(self.definition()).map_err(|e| self.unavailable(e))?;
			for id in &ids {
				table.remove(id.as_str()).map_err(|e| self.unavailable(e))?;
			}
		}
		write_txn.commit().map_err(|e| self.unavailable(e))?;
		Ok(ids.len() as u64)
	}

	async fn count(&self, filter: &Filter) -> Result<u64, DbError> {
		Ok(self.scan(filter)?.len() as u64)
	}
}


// vim: ts=4
