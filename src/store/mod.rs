//! Typed collections over the database abstraction
//!
//! Each store wraps one collection and converts between serde types and
//! the raw JSON documents the backends hold.

pub mod edges;
pub mod nodes;
pub mod transform;

pub use edges::{EdgeRecord, EdgeStatus, EdgeStore};
pub use nodes::{NodeRecord, NodeStore};
pub use transform::{TransformRecord, TransformStore};

use crate::db::Document;
use crate::error::WksError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a record into a raw document
pub(crate) fn to_document<T: Serialize>(record: &T) -> Result<Document, WksError> {
	match serde_json::to_value(record)? {
		serde_json::Value::Object(map) => Ok(map),
		other => Err(WksError::invariant(format!("record serialized to non-object: {}", other))),
	}
}

/// Decode a raw document into a record
pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, WksError> {
	Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}

// vim: ts=4
