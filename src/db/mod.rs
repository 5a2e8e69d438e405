//! Database abstraction
//!
//! Collection-oriented key/value + query API over pluggable backends. A
//! `Database` hands out scoped collection handles; names are prefixed with
//! the configured prefix at this boundary and the backends reject bare
//! names outright. Connection failure is always fatal to the operation
//! that hit it, surfaced as a structured error.

mod memory;
mod redb_backend;

pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;

use crate::config::DatabaseConfig;
use crate::error::DbError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A stored document: a JSON object keyed by `_id`
pub type Document = Map<String, Value>;

/// A field-equality filter over documents
pub type Filter = Map<String, Value>;

/// True when every filter field is present in `doc` with an equal value
pub fn matches(doc: &Document, filter: &Filter) -> bool {
	filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

/// Build a single-field equality filter
pub fn filter_eq(field: &str, value: impl Into<Value>) -> Filter {
	let mut f = Filter::new();
	f.insert(field.to_string(), value.into());
	f
}

/// Scoped handle over one collection
#[async_trait]
pub trait Collection: Send + Sync {
	async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DbError>;
	async fn find(&self, filter: &Filter) -> Result<Vec<Document>, DbError>;

	/// Replace the first matching document, inserting when `upsert` is set
	/// and nothing matches. Returns true when a document was written.
	async fn update_one(&self, filter: &Filter, doc: Document, upsert: bool)
		-> Result<bool, DbError>;

	async fn delete_one(&self, filter: &Filter) -> Result<bool, DbError>;
	async fn delete_many(&self, filter: &Filter) -> Result<u64, DbError>;
	async fn count(&self, filter: &Filter) -> Result<u64, DbError>;
}

/// A backend produces collection handles for prefixed names
pub trait Backend: Send + Sync {
	fn collection(&self, prefixed_name: &str) -> Result<Box<dyn Collection>, DbError>;

	/// Cheap reachability probe; the daemon's guard calls this on a timer
	fn ping(&self) -> Result<(), DbError>;
}

/// Entry point: owns the backend and applies the name prefix
#[derive(Clone)]
pub struct Database {
	backend: Arc<dyn Backend>,
	prefix: String,
}

impl Database {
	/// Open the configured backend. The registry is deliberately small and
	/// typed: configuration names map to concrete constructors.
	pub fn open(config: &DatabaseConfig) -> Result<Database, DbError> {
		let backend: Arc<dyn Backend> = match config.backend.as_str() {
			"redb" => Arc::new(RedbBackend::open(&config.path)?),
			"memory" => Arc::new(MemoryBackend::new()),
			other => {
				return Err(DbError::Unavailable {
					uri: config.path.display().to_string(),
					source: format!("unknown backend '{}'", other).into(),
				})
			}
		};
		Ok(Database { backend, prefix: config.prefix.clone() })
	}

	/// In-memory database for tests and database-less runs
	pub fn memory(prefix: &str) -> Database {
		Database { backend: Arc::new(MemoryBackend::new()), prefix: prefix.to_string() }
	}

	/// Open a collection by bare name; the prefix is applied here and only
	/// here
	pub fn collection(&self, name: &str) -> Result<Box<dyn Collection>, DbError> {
		self.backend.collection(&format!("{}.{}", self.prefix, name))
	}

	pub fn ping(&self) -> Result<(), DbError> {
		self.backend.ping()
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}
}

/// Backends call this before touching storage
pub(crate) fn require_prefixed(name: &str) -> Result<(), DbError> {
	match name.split_once('.') {
		Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => Ok(()),
		_ => Err(DbError::BareCollectionName { name: name.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn doc(id: &str, extra: &[(&str, Value)]) -> Document {
		let mut d = Document::new();
		d.insert("_id".to_string(), json!(id));
		for (k, v) in extra {
			d.insert((*k).to_string(), v.clone());
		}
		d
	}

	#[tokio::test]
	async fn test_bare_name_rejected() {
		let db = Database::memory("wks");
		// Going through Database always prefixes; hitting the backend
		// directly with a bare name must fail
		let backend = MemoryBackend::new();
		assert!(backend.collection("nodes").is_err());
		assert!(db.collection("nodes").is_ok());
	}

	#[tokio::test]
	async fn test_upsert_then_find() {
		let db = Database::memory("wks");
		let col = db.collection("nodes").unwrap();

		let inserted = col
			.update_one(&filter_eq("_id", "a"), doc("a", &[("n", json!(1))]), true)
			.await
			.unwrap();
		assert!(inserted);

		let found = col.find_one(&filter_eq("_id", "a")).await.unwrap().unwrap();
		assert_eq!(found.get("n"), Some(&json!(1)));
		assert_eq!(col.count(&Filter::new()).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_update_replaces_in_place() {
		let db = Database::memory("wks");
		let col = db.collection("nodes").unwrap();
		col.update_one(&filter_eq("_id", "a"), doc("a", &[("n", json!(1))]), true).await.unwrap();
		col.update_one(&filter_eq("_id", "a"), doc("a", &[("n", json!(2))]), true).await.unwrap();

		assert_eq!(col.count(&Filter::new()).await.unwrap(), 1);
		let found = col.find_one(&filter_eq("_id", "a")).await.unwrap().unwrap();
		assert_eq!(found.get("n"), Some(&json!(2)));
	}

	#[tokio::test]
	async fn test_delete_many_by_field() {
		let db = Database::memory("wks");
		let col = db.collection("edges").unwrap();
		for i in 0..3 {
			col.update_one(
				&filter_eq("_id", format!("e{}", i)),
				doc(&format!("e{}", i), &[("from", json!("x"))]),
				true,
			)
			.await
			.unwrap();
		}
		col.update_one(&filter_eq("_id", "other"), doc("other", &[("from", json!("y"))]), true)
			.await
			.unwrap();

		let removed = col.delete_many(&filter_eq("from", "x")).await.unwrap();
		assert_eq!(removed, 3);
		assert_eq!(col.count(&Filter::new()).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_collections_are_isolated() {
		let db = Database::memory("wks");
		let nodes = db.collection("nodes").unwrap();
		let edges = db.collection("edges").unwrap();
		nodes.update_one(&filter_eq("_id", "a"), doc("a", &[]), true).await.unwrap();

		assert_eq!(edges.count(&Filter::new()).await.unwrap(), 0);
	}
}

// vim: ts=4
