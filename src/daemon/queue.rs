//! Filesystem event coalescing queue
//!
//! One entry per absolute path; the latest event kind wins. The queue is
//! bounded: when full, inserting a new path drops the oldest entry (which
//! the next full sync of its parent will reconcile anyway).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Normalized filesystem event kinds the sync loop understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
	Create,
	Modify,
	Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
	pub path: PathBuf,
	pub kind: FsEventKind,
}

struct Inner {
	entries: HashMap<PathBuf, (u64, FsEventKind)>,
	next_seq: u64,
}

pub struct EventQueue {
	inner: Mutex<Inner>,
	capacity: usize,
}

impl EventQueue {
	pub fn new(capacity: usize) -> EventQueue {
		EventQueue {
			inner: Mutex::new(Inner { entries: HashMap::new(), next_seq: 0 }),
			capacity,
		}
	}

	/// Record an event; multiple events on one path coalesce to the newest
	pub fn push(&self, event: FsEvent) {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let seq = inner.next_seq;
		inner.next_seq += 1;

		if !inner.entries.contains_key(&event.path) && inner.entries.len() >= self.capacity {
			if let Some(oldest) =
				inner.entries.iter().min_by_key(|(_, (s, _))| *s).map(|(p, _)| p.clone())
			{
				warn!("event queue full, dropping oldest entry {}", oldest.display());
				inner.entries.remove(&oldest);
			}
		}
		inner.entries.insert(event.path, (seq, event.kind));
	}

	/// Take everything, oldest first
	pub fn drain(&self) -> Vec<FsEvent> {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let mut out: Vec<(u64, FsEvent)> = inner
			.entries
			.drain()
			.map(|(path, (seq, kind))| (seq, FsEvent { path, kind }))
			.collect();
		out.sort_by_key(|(seq, _)| *seq);
		out.into_iter().map(|(_, e)| e).collect()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn event(path: &str, kind: FsEventKind) -> FsEvent {
		FsEvent { path: PathBuf::from(path), kind }
	}

	#[test]
	fn test_latest_kind_wins_per_path() {
		let queue = EventQueue::new(16);
		queue.push(event("/a", FsEventKind::Create));
		queue.push(event("/a", FsEventKind::Modify));
		queue.push(event("/a", FsEventKind::Delete));

		let drained = queue.drain();
		assert_eq!(drained.len(), 1);
		assert_eq!(drained[0].kind, FsEventKind::Delete);
	}

	#[test]
	fn test_drain_preserves_arrival_order() {
		let queue = EventQueue::new(16);
		queue.push(event("/b", FsEventKind::Create));
		queue.push(event("/a", FsEventKind::Create));
		queue.push(event("/c", FsEventKind::Create));

		let paths: Vec<String> =
			queue.drain().into_iter().map(|e| e.path.display().to_string()).collect();
		assert_eq!(paths, vec!["/b", "/a", "/c"]);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_overflow_drops_oldest() {
		let queue = EventQueue::new(2);
		queue.push(event("/a", FsEventKind::Create));
		queue.push(event("/b", FsEventKind::Create));
		queue.push(event("/c", FsEventKind::Create));

		let drained = queue.drain();
		assert_eq!(drained.len(), 2);
		assert!(drained.iter().all(|e| e.path != PathBuf::from("/a")));
	}

	#[test]
	fn test_coalescing_does_not_count_against_capacity() {
		let queue = EventQueue::new(2);
		queue.push(event("/a", FsEventKind::Create));
		queue.push(event("/a", FsEventKind::Modify));
		queue.push(event("/b", FsEventKind::Create));

		assert_eq!(queue.len(), 2);
	}
}

// vim: ts=4
