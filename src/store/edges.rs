//! Edge store: one document per parsed link
//!
//! Edge IDs are content-derived so repeated parses upsert in place, and a
//! source's edges are replaced as a set on every successful sync.

use super::{from_document, to_document};
use crate::db::{filter_eq, Collection, Database, Filter};
use crate::error::WksError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const COLLECTION: &str = "edges";

/// Link health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
	Ok,
	MissingTarget,
	MissingSymlink,
	Legacy,
}

impl fmt::Display for EdgeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EdgeStatus::Ok => write!(f, "ok"),
			EdgeStatus::MissingTarget => write!(f, "missing_target"),
			EdgeStatus::MissingSymlink => write!(f, "missing_symlink"),
			EdgeStatus::Legacy => write!(f, "legacy"),
		}
	}
}

/// One directional link from a source note to a target resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
	#[serde(rename = "_id")]
	pub id: String,
	pub from_uri: String,
	pub to_uri: String,
	pub line_number: u32,
	pub column_number: u32,
	pub name: String,
	pub parser: String,
	pub status: EdgeStatus,
	pub first_seen: String,
	pub last_seen: String,
	pub last_updated: String,
}

/// Deterministic edge ID: identical links hash to identical documents
pub fn edge_id(from_uri: &str, line: u32, column: u32, to_uri: &str) -> String {
	util::sha256_bytes(format!("{}|{}|{}|{}", from_uri, line, column, to_uri).as_bytes())
}

pub struct EdgeStore {
	col: Box<dyn Collection>,
}

impl EdgeStore {
	pub fn open(db: &Database) -> Result<EdgeStore, WksError> {
		Ok(EdgeStore { col: db.collection(COLLECTION)? })
	}

	/// Replace the edge set of one source: delete all edges with this
	/// `from_uri`, then insert the new set. An edge whose content is
	/// unchanged keeps its previous record wholesale, so replaying sync on
	/// an unchanged file produces byte-identical documents.
	pub async fn replace_for_source(
		&self,
		from_uri: &str,
		mut edges: Vec<EdgeRecord>,
	) -> Result<usize, WksError> {
		let previous: BTreeMap<String, EdgeRecord> = self
			.find_from(from_uri)
			.await?
			.into_iter()
			.map(|e| (e.id.clone(), e))
			.collect();
		for edge in &mut edges {
			if let Some(old) = previous.get(&edge.id) {
				let unchanged = old.to_uri == edge.to_uri
					&& old.status == edge.status
					&& old.name == edge.name
					&& old.parser == edge.parser;
				if unchanged {
					*edge = old.clone();
				} else {
					edge.first_seen = old.first_seen.clone();
				}
			}
		}

		self.col.delete_many(&filter_eq("from_uri", from_uri)).await?;
		let inserted = edges.len();
		for edge in edges {
			let doc = to_document(&edge)?;
			self.col.update_one(&filter_eq("_id", edge.id.clone()), doc, true).await?;
		}
		Ok(inserted)
	}

	/// Insert or refresh a single edge without touching the rest of its
	/// source's set (used by the transform graph integration)
	pub async fn upsert(&self, edge: &EdgeRecord) -> Result<(), WksError> {
		let mut edge = edge.clone();
		if let Some(old) = self
			.col
			.find_one(&filter_eq("_id", edge.id.clone()))
			.await?
			.map(from_document::<EdgeRecord>)
			.transpose()?
		{
			edge.first_seen = old.first_seen;
		}
		self.col.update_one(&filter_eq("_id", edge.id.clone()), to_document(&edge)?, true).await?;
		Ok(())
	}

	pub async fn find_from(&self, from_uri: &str) -> Result<Vec<EdgeRecord>, WksError> {
		self.decode(self.col.find(&filter_eq("from_uri", from_uri)).await?)
	}

	pub async fn find_to(&self, to_uri: &str) -> Result<Vec<EdgeRecord>, WksError> {
		self.decode(self.col.find(&filter_eq("to_uri", to_uri)).await?)
	}

	pub async fn all(&self) -> Result<Vec<EdgeRecord>, WksError> {
		self.decode(self.col.find(&Filter::new()).await?)
	}

	pub async fn count(&self) -> Result<u64, WksError> {
		Ok(self.col.count(&Filter::new()).await?)
	}

	pub async fn delete(&self, id: &str) -> Result<bool, WksError> {
		Ok(self.col.delete_one(&filter_eq("_id", id)).await?)
	}

	pub async fn delete_for_source(&self, from_uri: &str) -> Result<u64, WksError> {
		Ok(self.col.delete_many(&filter_eq("from_uri", from_uri)).await?)
	}

	fn decode(&self, docs: Vec<crate::db::Document>) -> Result<Vec<EdgeRecord>, WksError> {
		docs.into_iter().map(from_document).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::Database;

	fn edge(from: &str, to: &str, line: u32) -> EdgeRecord {
		EdgeRecord {
			id: edge_id(from, line, 1, to),
			from_uri: from.to_string(),
			to_uri: to.to_string(),
			line_number: line,
			column_number: 1,
			name: String::new(),
			parser: "markdown".to_string(),
			status: EdgeStatus::Ok,
			first_seen: "2026-08-01T00:00:00.000Z".to_string(),
			last_seen: "2026-08-01T00:00:00.000Z".to_string(),
			last_updated: "2026-08-01T00:00:00.000Z".to_string(),
		}
	}

	#[test]
	fn test_edge_id_deterministic() {
		let a = edge_id("vault:///A.md", 1, 1, "vault:///B.md");
		let b = edge_id("vault:///A.md", 1, 1, "vault:///B.md");
		assert_eq!(a, b);
		assert_ne!(a, edge_id("vault:///A.md", 2, 1, "vault:///B.md"));
	}

	#[tokio::test]
	async fn test_replace_is_a_set_swap() {
		let db = Database::memory("wks");
		let store = EdgeStore::open(&db).unwrap();
		store
			.replace_for_source(
				"vault:///A.md",
				vec![edge("vault:///A.md", "vault:///B.md", 1), edge("vault:///A.md", "vault:///C.md", 2)],
			)
			.await
			.unwrap();
		store
			.replace_for_source("vault:///A.md", vec![edge("vault:///A.md", "vault:///D.md", 1)])
			.await
			.unwrap();

		let edges = store.find_from("vault:///A.md").await.unwrap();
		assert_eq!(edges.len(), 1);
		assert_eq!(edges[0].to_uri, "vault:///D.md");
	}

	#[tokio::test]
	async fn test_replay_preserves_first_seen() {
		let db = Database::memory("wks");
		let store = EdgeStore::open(&db).unwrap();
		store
			.replace_for_source("vault:///A.md", vec![edge("vault:///A.md", "vault:///B.md", 1)])
			.await
			.unwrap();

		let mut replay = edge("vault:///A.md", "vault:///B.md", 1);
		replay.first_seen = "2026-09-09T00:00:00.000Z".to_string();
		store.replace_for_source("vault:///A.md", vec![replay]).await.unwrap();

		let edges = store.find_from("vault:///A.md").await.unwrap();
		assert_eq!(edges[0].first_seen, "2026-08-01T00:00:00.000Z");
	}

	#[tokio::test]
	async fn test_sources_do_not_interfere() {
		let db = Database::memory("wks");
		let store = EdgeStore::open(&db).unwrap();
		store
			.replace_for_source("vault:///A.md", vec![edge("vault:///A.md", "vault:///B.md", 1)])
			.await
			.unwrap();
		store
			.replace_for_source("vault:///X.md", vec![edge("vault:///X.md", "vault:///B.md", 1)])
			.await
			.unwrap();

		store.replace_for_source("vault:///A.md", Vec::new()).await.unwrap();
		assert_eq!(store.find_to("vault:///B.md").await.unwrap().len(), 1);
	}
}

// vim: ts=4
