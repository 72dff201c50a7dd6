use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A user key tagged with the commit timestamp that wrote it.
///
/// Ordered by user key ascending, then by commit timestamp **descending**
/// within the same user key, so that a forward scan visits the newest
/// version of a key first — the same layout rust-us-kv-rs's MVCC module
/// documents as `Key::Version(key, version)`, generalized here to a single
/// tuple type so it can serve as the skiplist/SSTable sort key directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalKey {
	pub user_key: Vec<u8>,
	pub commit_ts: u64,
}

impl InternalKey {
	pub fn new(user_key: Vec<u8>, commit_ts: u64) -> Self {
		InternalKey { user_key, commit_ts }
	}
}

impl PartialEq for InternalKey {
	fn eq(&self, other: &Self) -> bool {
		self.user_key == other.user_key && self.commit_ts == other.commit_ts
	}
}
impl Eq for InternalKey {}

impl PartialOrd for InternalKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for InternalKey {
	fn cmp(&self, other: &Self) -> Ordering {
		match self.user_key.cmp(&other.user_key) {
			Ordering::Equal => other.commit_ts.cmp(&self.commit_ts),
			ord => ord,
		}
	}
}

/// Where a value is actually stored. Values at or above
/// `ServerConfig::value_log_threshold` are written to the value log
/// (WiscKey-style) and only a pointer is kept in the memtable/SSTable,
/// reducing write amplification for large rows (spec §2 "KV Engine"; spec
/// GLOSSARY "WiscKey").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueLocation {
	Inline(Vec<u8>),
	ValueLog { file_id: u64, offset: u64, len: u32 },
}

/// An entry as stored in the memtable/SSTable: either a value or a
/// tombstone marking a delete at this commit timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryValue {
	Value(ValueLocation),
	Tombstone,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_by_user_key_then_descending_ts() {
		let a = InternalKey::new(b"a".to_vec(), 5);
		let b = InternalKey::new(b"a".to_vec(), 10);
		let c = InternalKey::new(b"b".to_vec(), 1);
		assert!(b < a, "higher commit_ts for same key sorts first");
		assert!(a < c, "user_key dominates ordering");
	}
}
