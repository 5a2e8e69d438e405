//! Node store: one document per tracked filesystem entity

use super::{from_document, to_document};
use crate::db::{filter_eq, Collection, Database, Filter};
use crate::error::WksError;
use serde::{Deserialize, Serialize};

const COLLECTION: &str = "nodes";
const META_ID: &str = "__meta__";

/// One tracked file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
	/// Primary key: `file://<host>/<abs-path>`
	#[serde(rename = "_id")]
	pub local_uri: String,

	/// Optional cloud mirror
	pub remote_uri: Option<String>,

	/// SHA-256 of the contents at last sync
	pub checksum: String,

	/// File size at last sync
	pub bytes: u64,

	/// Computed priority; the float is preserved through writes
	pub priority: f64,

	/// Last sync time for this record, ISO-8601 UTC
	pub timestamp: String,
}

/// Singleton meta record holding collection-level state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaRecord {
	#[serde(rename = "_id")]
	id: String,
	last_sync: String,
}

pub struct NodeStore {
	col: Box<dyn Collection>,
}

impl NodeStore {
	pub fn open(db: &Database) -> Result<NodeStore, WksError> {
		Ok(NodeStore { col: db.collection(COLLECTION)? })
	}

	pub async fn get(&self, local_uri: &str) -> Result<Option<NodeRecord>, WksError> {
		match self.col.find_one(&filter_eq("_id", local_uri)).await? {
			Some(doc) if local_uri != META_ID => Ok(Some(from_document(doc)?)),
			_ => Ok(None),
		}
	}

	pub async fn upsert(&self, record: &NodeRecord) -> Result<(), WksError> {
		let doc = to_document(record)?;
		self.col.update_one(&filter_eq("_id", record.local_uri.clone()), doc, true).await?;
		Ok(())
	}

	/// Remove a record; true when something was deleted
	pub async fn remove(&self, local_uri: &str) -> Result<bool, WksError> {
		Ok(self.col.delete_one(&filter_eq("_id", local_uri)).await?)
	}

	/// Every node record, meta excluded
	pub async fn all(&self) -> Result<Vec<NodeRecord>, WksError> {
		let docs = self.col.find(&Filter::new()).await?;
		let mut out = Vec::with_capacity(docs.len());
		for doc in docs {
			if doc.get("_id").and_then(|v| v.as_str()) == Some(META_ID) {
				continue;
			}
			out.push(from_document(doc)?);
		}
		Ok(out)
	}

	pub async fn count(&self) -> Result<u64, WksError> {
		let n = self.col.count(&Filter::new()).await?;
		let has_meta = self.col.find_one(&filter_eq("_id", META_ID)).await?.is_some();
		Ok(n - u64::from(has_meta))
	}

	/// Nodes whose URI starts with `uri_prefix`; used by the daemon when a
	/// directory moves and the old subtree only exists in the store
	pub async fn with_uri_prefix(&self, uri_prefix: &str) -> Result<Vec<NodeRecord>, WksError> {
		Ok(self
			.all()
			.await?
			.into_iter()
			.filter(|n| n.local_uri.starts_with(uri_prefix))
			.collect())
	}

	/// Enforce the collection cap: drop lowest-priority records until at
	/// most `max_documents` remain. Ties break on the URI so repeated runs
	/// remove the same rows. Returns the pruned URIs.
	pub async fn prune_to_cap(&self, max_documents: u64) -> Result<Vec<String>, WksError> {
		let mut all = self.all().await?;
		if all.len() as u64 <= max_documents {
			return Ok(Vec::new());
		}
		all.sort_by(|a, b| {
			a.priority
				.partial_cmp(&b.priority)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.local_uri.cmp(&b.local_uri))
		});

		let excess = all.len() - max_documents as usize;
		let mut pruned = Vec::with_capacity(excess);
		for record in all.into_iter().take(excess) {
			self.remove(&record.local_uri).await?;
			pruned.push(record.local_uri);
		}
		Ok(pruned)
	}

	pub async fn last_sync(&self) -> Result<Option<String>, WksError> {
		match self.col.find_one(&filter_eq("_id", META_ID)).await? {
			Some(doc) => {
				let meta: MetaRecord = from_document(doc)?;
				Ok(Some(meta.last_sync))
			}
			None => Ok(None),
		}
	}

	pub async fn set_last_sync(&self, when: &str) -> Result<(), WksError> {
		let meta = MetaRecord { id: META_ID.to_string(), last_sync: when.to_string() };
		self.col.update_one(&filter_eq("_id", META_ID), to_document(&meta)?, true).await?;
		Ok(())
	}
}


// vim: ts=4
