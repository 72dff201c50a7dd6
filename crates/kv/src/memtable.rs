use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_skiplist::SkipMap;

use crate::key::{EntryValue, InternalKey};

/// An in-memory, concurrently-readable table of internal keys, backed by a
/// lock-free skiplist so readers never block behind an in-flight writer
/// (the same concurrency model rust-us-kv-rs's storage layer assumes of its
/// `Engine` implementations, generalized here from a single-threaded
/// `BTreeMap` to a `crossbeam_skiplist::SkipMap` since wiscdb serves many
/// connections concurrently).
///
/// Entries are never removed in place; a delete is recorded as an
/// `EntryValue::Tombstone` at the deleting transaction's commit timestamp,
/// and reclaimed later by compaction.
pub struct MemTable {
	map: SkipMap<InternalKey, EntryValue>,
	approx_size_bytes: AtomicU64,
}

impl MemTable {
	pub fn new() -> Self {
		MemTable { map: SkipMap::new(), approx_size_bytes: AtomicU64::new(0) }
	}

	pub fn insert(&self, key: Vec<u8>, commit_ts: u64, value: EntryValue) {
		let approx = key.len() as u64
			+ match &value {
				EntryValue::Value(crate::key::ValueLocation::Inline(v)) => v.len() as u64,
				_ => 16,
			};
		self.map.insert(InternalKey::new(key, commit_ts), value);
		self.approx_size_bytes.fetch_add(approx, Ordering::Relaxed);
	}

	/// Returns the newest entry for `user_key` with `commit_ts <= read_ts`,
	/// implementing snapshot-isolated visibility at the memtable layer.
	pub fn get(&self, user_key: &[u8], read_ts: u64) -> Option<EntryValue> {
		let lower = InternalKey::new(user_key.to_vec(), u64::MAX);
		for entry in self.map.range(lower..) {
			if entry.key().user_key != user_key {
				break;
			}
			if entry.key().commit_ts <= read_ts {
				return Some(entry.value().clone());
			}
		}
		None
	}

	/// Iterates all versions in `[start, end)` of user-key space visible at
	/// `read_ts`, yielding at most one (newest-visible) entry per user key,
	/// in ascending user-key order.
	pub fn scan_visible(&self, start: &[u8], end: Option<&[u8]>, read_ts: u64) -> Vec<(Vec<u8>, EntryValue)> {
		let mut out = Vec::new();
		let mut last_key: Option<Vec<u8>> = None;
		let lower = InternalKey::new(start.to_vec(), u64::MAX);
		for entry in self.map.range(lower..) {
			let ik = entry.key();
			if let Some(end) = end {
				if ik.user_key.as_slice() >= end {
					break;
				}
			}
			if last_key.as_deref() == Some(ik.user_key.as_slice()) {
				continue;
			}
			if ik.commit_ts <= read_ts {
				last_key = Some(ik.user_key.clone());
				out.push((ik.user_key.clone(), entry.value().clone()));
			}
		}
		out
	}

	pub fn approx_size(&self) -> u64 {
		self.approx_size_bytes.load(Ordering::Relaxed)
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	/// Drains entries in ascending `InternalKey` order for flushing to an
	/// SSTable.
	pub fn iter_for_flush(&self) -> impl Iterator<Item = (InternalKey, EntryValue)> + '_ {
		self.map.iter().map(|e| (e.key().clone(), e.value().clone()))
	}
}

impl Default for MemTable {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::ValueLocation;

	fn inline(v: &[u8]) -> EntryValue {
		EntryValue::Value(ValueLocation::Inline(v.to_vec()))
	}

	#[test]
	fn get_returns_newest_visible_version() {
		let mt = MemTable::new();
		mt.insert(b"k".to_vec(), 1, inline(b"v1"));
		mt.insert(b"k".to_vec(), 5, inline(b"v5"));
		mt.insert(b"k".to_vec(), 10, inline(b"v10"));

		assert!(matches!(mt.get(b"k", 0), None));
		assert!(matches!(mt.get(b"k", 3), Some(EntryValue::Value(ValueLocation::Inline(ref v))) if v == b"v1"));
		assert!(matches!(mt.get(b"k", 7), Some(EntryValue::Value(ValueLocation::Inline(ref v))) if v == b"v5"));
		assert!(matches!(mt.get(b"k", 100), Some(EntryValue::Value(ValueLocation::Inline(ref v))) if v == b"v10"));
	}

	#[test]
	fn tombstone_is_visible_like_any_other_version() {
		let mt = MemTable::new();
		mt.insert(b"k".to_vec(), 1, inline(b"v1"));
		mt.insert(b"k".to_vec(), 5, EntryValue::Tombstone);
		assert!(matches!(mt.get(b"k", 3), Some(EntryValue::Value(_))));
		assert!(matches!(mt.get(b"k", 10), Some(EntryValue::Tombstone)));
	}

	#[test]
	fn scan_visible_yields_one_entry_per_key_in_order() {
		let mt = MemTable::new();
		mt.insert(b"a".to_vec(), 1, inline(b"a1"));
		mt.insert(b"b".to_vec(), 1, inline(b"b1"));
		mt.insert(b"b".to_vec(), 2, inline(b"b2"));
		mt.insert(b"c".to_vec(), 5, inline(b"c5"));

		let got = mt.scan_visible(b"", None, 3);
		let keys: Vec<_> = got.iter().map(|(k, _)| k.clone()).collect();
		assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
	}
}
