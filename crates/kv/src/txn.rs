use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::EngineInner;
use crate::error::{KvError, Result};
use crate::key::{EntryValue, ValueLocation};

/// A transaction's local, uncommitted writes. Reads within the same
/// transaction must observe these before falling through to the shared
/// memtable/SSTables (read-your-own-writes), and `commit` only publishes
/// them atomically once the oracle has granted a commit timestamp.
pub struct Txn {
	pub(crate) inner: Arc<EngineInner>,
	pub(crate) read_ts: u64,
	pub(crate) read_only: bool,
	writes: HashMap<Vec<u8>, Option<Vec<u8>>>,
	done: bool,
}

impl Txn {
	pub(crate) fn new(inner: Arc<EngineInner>, read_ts: u64, read_only: bool) -> Self {
		Txn { inner, read_ts, read_only, writes: HashMap::new(), done: false }
	}

	pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
		if let Some(local) = self.writes.get(key) {
			return Ok(local.clone());
		}
		self.inner.get_at(key, self.read_ts)
	}

	pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
		if self.read_only {
			return Err(KvError::ReadOnly);
		}
		if value.len() > self.inner.max_value_size() {
			return Err(KvError::SizeLimit { size: value.len(), max: self.inner.max_value_size() });
		}
		self.writes.insert(key, Some(value));
		Ok(())
	}

	pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
		if self.read_only {
			return Err(KvError::ReadOnly);
		}
		self.writes.insert(key, None);
		Ok(())
	}

	/// Scans `[start, end)` merging this transaction's own writes over the
	/// engine's snapshot at `read_ts`.
	pub fn scan(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
		let local: Vec<(Vec<u8>, EntryValue)> = self
			.writes
			.iter()
			.filter(|(k, _)| {
				k.as_slice() >= start && end.map(|end| k.as_slice() < end).unwrap_or(true)
			})
			.map(|(k, v)| match v {
				Some(value) => (k.clone(), EntryValue::Value(ValueLocation::Inline(value.clone()))),
				None => (k.clone(), EntryValue::Tombstone),
			})
			.collect();

		self.inner.scan_at(start, end, self.read_ts, local)
	}

	/// Attempts to durably commit this transaction's writes. On
	/// `KvError::Conflict`, the caller should discard and retry at the SAL
	/// layer (spec §4.5: "the caller is expected to retry or surface the
	/// conflict to the client").
	pub fn commit(mut self) -> Result<()> {
		if self.done {
			return Ok(());
		}
		self.done = true;
		if self.writes.is_empty() {
			self.inner.oracle().end_transaction(self.read_ts);
			return Ok(());
		}
		self.inner.commit_writes(self.read_ts, std::mem::take(&mut self.writes))
	}

	pub fn discard(mut self) {
		self.done = true;
		self.inner.oracle().end_transaction(self.read_ts);
	}
}

impl Drop for Txn {
	fn drop(&mut self) {
		if !self.done {
			self.inner.oracle().end_transaction(self.read_ts);
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::{Engine, LsmEngine};
	use tempfile::tempdir;

	#[test]
	fn read_your_own_writes_before_commit() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), Default::default()).unwrap();
		let mut txn = engine.begin(false).unwrap();
		txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
		txn.commit().unwrap();
	}

	#[test]
	fn read_only_txn_rejects_writes() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), Default::default()).unwrap();
		let mut txn = engine.begin(true).unwrap();
		assert!(txn.put(b"k".to_vec(), b"v".to_vec()).is_err());
	}
}
