use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::FileExt;
use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::iter::merge_sources;
use crate::key::{EntryValue, InternalKey, ValueLocation};
use crate::manifest::{Manifest, SsTableMeta};
use crate::memtable::MemTable;
use crate::oracle::Oracle;
use crate::sstable::SsTable;
use crate::txn::Txn;
use crate::vlog::ValueLog;
use crate::wal::{Wal, WalRecord};

/// Tuning knobs the caller controls; `wiscdb-sal` populates these from
/// `ServerConfig` when it opens the engine (spec §4.1's operation table
/// lists `open(path, opts)` with engine-specific options).
#[derive(Debug, Clone)]
pub struct EngineOptions {
	pub sync_writes: bool,
	/// Values at or above this size are redirected to the value log
	/// instead of being stored inline in the memtable/SSTable.
	pub value_log_threshold: u32,
	/// Flush the active memtable to an SSTable once its approximate size
	/// exceeds this many bytes.
	pub memtable_flush_bytes: u64,
	pub max_value_size: usize,
}

impl Default for EngineOptions {
	fn default() -> Self {
		EngineOptions {
			sync_writes: true,
			value_log_threshold: 1024,
			memtable_flush_bytes: 4 * 1024 * 1024,
			max_value_size: 512 * 1024 * 1024,
		}
	}
}

/// The operations every storage backend exposes to `wiscdb-sal` (spec
/// §4.1). `LsmEngine` is the only implementation today; the trait exists so
/// the SAL façade and its tests can depend on the contract rather than the
/// concrete type, the same separation rust-us-kv-rs draws between its
/// `Engine` trait and `MemoryEngine`/`BitCaskEngine` implementations.
pub trait Engine: Sized + Clone + Send + Sync + 'static {
	fn open(path: impl AsRef<Path>, opts: EngineOptions) -> Result<Self>;
	fn begin(&self, read_only: bool) -> Result<Txn>;
	fn close(self) -> Result<()>;
}

/// An LSM-tree engine: a mutable memtable backed by a WAL, flushed to
/// immutable SSTables, with large values redirected to a WiscKey-style
/// value log and MVCC conflict detection via `Oracle` (spec §2 "KV
/// Engine").
#[derive(Clone)]
pub struct LsmEngine {
	inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
	data_dir: PathBuf,
	opts: EngineOptions,
	memtable: RwLock<Arc<MemTable>>,
	sstables: RwLock<Vec<Arc<SsTable>>>,
	manifest: parking_lot::Mutex<Manifest>,
	wal: parking_lot::Mutex<Wal>,
	vlog: ValueLog,
	oracle: Oracle,
	_lock_file: File,
}

const LOCK_FILE_NAME: &str = "LOCK";
const WAL_FILE_NAME: &str = "CURRENT.wal";
const MANIFEST_FILE_NAME: &str = "MANIFEST";
const SSTABLE_DIR: &str = "sstables";
const VLOG_DIR: &str = "vlog";

impl Engine for LsmEngine {
	fn open(path: impl AsRef<Path>, opts: EngineOptions) -> Result<Self> {
		let data_dir = path.as_ref().to_path_buf();
		std::fs::create_dir_all(&data_dir)?;
		std::fs::create_dir_all(data_dir.join(SSTABLE_DIR))?;

		let lock_file = OpenOptions::new().create(true).write(true).open(data_dir.join(LOCK_FILE_NAME))?;
		lock_file.try_lock_exclusive().map_err(|_| KvError::LockHeld { path: data_dir.display().to_string() })?;

		let manifest = Manifest::load_or_default(data_dir.join(MANIFEST_FILE_NAME))?;

		let mut sstables = Vec::new();
		for meta in &manifest.sstables {
			let sst = SsTable::open(sstable_path(&data_dir, meta.id))?;
			sstables.push(Arc::new(sst));
		}
		// Newest-first so point lookups hit the freshest data first.
		sstables.reverse();

		let vlog = ValueLog::open(data_dir.join(VLOG_DIR), manifest.next_vlog_file_id.saturating_sub(1))?;

		let wal_records = Wal::replay(data_dir.join(WAL_FILE_NAME))?;
		let memtable = MemTable::new();
		let mut max_ts = 0u64;
		for record in wal_records {
			max_ts = max_ts.max(record.commit_ts);
			memtable.insert(record.user_key, record.commit_ts, record.value);
		}
		for meta in &manifest.sstables {
			let _ = meta; // sstable contents already reflect their own max commit_ts via the manifest in a fuller implementation
		}

		let wal = Wal::open(data_dir.join(WAL_FILE_NAME))?;
		let oracle = Oracle::new(max_ts);

		Ok(LsmEngine {
			inner: Arc::new(EngineInner {
				data_dir,
				opts,
				memtable: RwLock::new(Arc::new(memtable)),
				sstables: RwLock::new(sstables),
				manifest: parking_lot::Mutex::new(manifest),
				wal: parking_lot::Mutex::new(wal),
				vlog,
				oracle,
				_lock_file: lock_file,
			}),
		})
	}

	fn begin(&self, read_only: bool) -> Result<Txn> {
		let read_ts = self.inner.oracle.begin();
		Ok(Txn::new(self.inner.clone(), read_ts, read_only))
	}

	fn close(self) -> Result<()> {
		self.inner.manifest.lock().save(self.inner.data_dir.join(MANIFEST_FILE_NAME))
	}
}

impl LsmEngine {
	/// Runs one value-log GC pass over this engine (spec's supplemented
	/// background GC feature); see [`crate::gc::run_gc_pass`].
	pub fn run_gc_pass(&self, discard_ratio: f64) -> Result<crate::gc::GcStats> {
		crate::gc::run_gc_pass(&self.inner, discard_ratio)
	}

	#[cfg(test)]
	pub(crate) fn inner_for_test(&self) -> &Arc<EngineInner> {
		&self.inner
	}
}

fn sstable_path(data_dir: &Path, id: u64) -> PathBuf {
	data_dir.join(SSTABLE_DIR).join(format!("{id:020}.sst"))
}

impl EngineInner {
	pub(crate) fn oracle(&self) -> &Oracle {
		&self.oracle
	}

	pub(crate) fn max_value_size(&self) -> usize {
		self.opts.max_value_size
	}

	pub(crate) fn vlog(&self) -> &ValueLog {
		&self.vlog
	}

	pub(crate) fn sync_writes(&self) -> bool {
		self.opts.sync_writes
	}

	pub(crate) fn memtable_snapshot(&self) -> Arc<MemTable> {
		self.memtable.read().clone()
	}

	pub(crate) fn relocate_in_memtable(&self, key: &InternalKey, entry: EntryValue) {
		self.memtable.read().insert(key.user_key.clone(), key.commit_ts, entry);
	}

	pub(crate) fn get_at(&self, key: &[u8], read_ts: u64) -> Result<Option<Vec<u8>>> {
		let memtable = self.memtable.read().clone();
		if let Some(entry) = memtable.get(key, read_ts) {
			return self.materialize(entry);
		}
		for sst in self.sstables.read().iter() {
			if let Some(entry) = sst.get(key, read_ts)? {
				return self.materialize(entry);
			}
		}
		Ok(None)
	}

	pub(crate) fn scan_at(
		&self,
		start: &[u8],
		end: Option<&[u8]>,
		read_ts: u64,
		local_overlay: Vec<(Vec<u8>, EntryValue)>,
	) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
		let memtable = self.memtable.read().clone();
		let mut sources = vec![local_overlay, memtable.scan_visible(start, end, read_ts)];
		for sst in self.sstables.read().iter() {
			sources.push(sst.scan_visible(start, end, read_ts)?);
		}
		let merged = merge_sources(sources);
		let mut out = Vec::with_capacity(merged.len());
		for (key, entry) in merged {
			if let Some(value) = self.materialize(entry)? {
				out.push((key, value));
			}
		}
		Ok(out)
	}

	fn materialize(&self, entry: EntryValue) -> Result<Option<Vec<u8>>> {
		match entry {
			EntryValue::Tombstone => Ok(None),
			EntryValue::Value(ValueLocation::Inline(v)) => Ok(Some(v)),
			EntryValue::Value(ValueLocation::ValueLog { file_id, offset, len }) => {
				Ok(Some(self.vlog.read(file_id, offset, len)?))
			}
		}
	}

	/// Allocates a commit timestamp (conflict-checking against concurrent
	/// commits), appends every write to the WAL, applies them to the
	/// memtable, and flushes to an SSTable if the memtable has grown past
	/// `memtable_flush_bytes`.
	pub(crate) fn commit_writes(&self, read_ts: u64, writes: HashMap<Vec<u8>, Option<Vec<u8>>>) -> Result<()> {
		let write_keys: std::collections::HashSet<Vec<u8>> = writes.keys().cloned().collect();
		let commit_result = self.oracle.try_commit(read_ts, &write_keys);
		self.oracle.end_transaction(read_ts);
		let commit_ts = commit_result?;

		let memtable = self.memtable.read().clone();
		let mut wal = self.wal.lock();
		for (key, value) in &writes {
			let entry_value = match value {
				Some(v) if (v.len() as u32) >= self.opts.value_log_threshold => {
					let loc = self.vlog.append(v, self.opts.sync_writes)?;
					EntryValue::Value(loc)
				}
				Some(v) => EntryValue::Value(ValueLocation::Inline(v.clone())),
				None => EntryValue::Tombstone,
			};
			wal.append(&WalRecord { user_key: key.clone(), commit_ts, value: entry_value.clone() }, self.opts.sync_writes)?;
			memtable.insert(key.clone(), commit_ts, entry_value);
		}
		drop(wal);

		if memtable.approx_size() >= self.opts.memtable_flush_bytes {
			self.flush_memtable(memtable)?;
		}
		Ok(())
	}

	fn flush_memtable(&self, memtable: Arc<MemTable>) -> Result<()> {
		let mut entries: Vec<(InternalKey, EntryValue)> = memtable.iter_for_flush().collect();
		if entries.is_empty() {
			return Ok(());
		}
		entries.sort_by(|a, b| a.0.cmp(&b.0));

		let mut manifest = self.manifest.lock();
		let id = manifest.alloc_sstable_id();
		let path = sstable_path(&self.data_dir, id);
		let sst = SsTable::write(&path, &entries)?;

		let min_key = sst.min_key().to_vec();
		let max_key = sst.max_key().to_vec();
		manifest.sstables.push(SsTableMeta { id, level: 0, min_key, max_key });
		manifest.save(self.data_dir.join(MANIFEST_FILE_NAME))?;
		drop(manifest);

		self.sstables.write().insert(0, Arc::new(sst));
		*self.memtable.write() = Arc::new(MemTable::new());
		self.wal.lock().reset()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn put_commit_then_get_in_new_txn() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();

		let mut txn = engine.begin(false).unwrap();
		txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		txn.commit().unwrap();

		let txn2 = engine.begin(false).unwrap();
		assert_eq!(txn2.get(b"k").unwrap(), Some(b"v".to_vec()));
	}

	#[test]
	fn delete_then_get_returns_none() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();

		let mut txn = engine.begin(false).unwrap();
		txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		txn.commit().unwrap();

		let mut txn = engine.begin(false).unwrap();
		txn.delete(b"k".to_vec()).unwrap();
		txn.commit().unwrap();

		let txn = engine.begin(false).unwrap();
		assert_eq!(txn.get(b"k").unwrap(), None);
	}

	#[test]
	fn snapshot_isolation_hides_concurrent_commit() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();

		let reader = engine.begin(true).unwrap();
		let mut writer = engine.begin(false).unwrap();
		writer.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		writer.commit().unwrap();

		assert_eq!(reader.get(b"k").unwrap(), None);
	}

	#[test]
	fn concurrent_conflicting_writes_reject_the_second_commit() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();

		let mut t1 = engine.begin(false).unwrap();
		let mut t2 = engine.begin(false).unwrap();
		t1.put(b"k".to_vec(), b"from-t1".to_vec()).unwrap();
		t2.put(b"k".to_vec(), b"from-t2".to_vec()).unwrap();

		t1.commit().unwrap();
		let result = t2.commit();
		assert!(matches!(result, Err(KvError::Conflict)));
	}

	#[test]
	fn large_value_round_trips_through_value_log() {
		let dir = tempdir().unwrap();
		let mut opts = EngineOptions::default();
		opts.value_log_threshold = 16;
		let engine = LsmEngine::open(dir.path(), opts).unwrap();

		let big = vec![7u8; 1024];
		let mut txn = engine.begin(false).unwrap();
		txn.put(b"big".to_vec(), big.clone()).unwrap();
		txn.commit().unwrap();

		let txn = engine.begin(false).unwrap();
		assert_eq!(txn.get(b"big").unwrap(), Some(big));
	}

	#[test]
	fn data_survives_reopen_via_wal_replay() {
		let dir = tempdir().unwrap();
		{
			let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();
			let mut txn = engine.begin(false).unwrap();
			txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
			txn.commit().unwrap();
			engine.close().unwrap();
		}
		let reopened = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();
		let txn = reopened.begin(false).unwrap();
		assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
	}

	#[test]
	fn scan_returns_rows_in_key_order() {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();
		let mut txn = engine.begin(false).unwrap();
		txn.put(b"b".to_vec(), b"2".to_vec()).unwrap();
		txn.put(b"a".to_vec(), b"1".to_vec()).unwrap();
		txn.put(b"c".to_vec(), b"3".to_vec()).unwrap();
		txn.commit().unwrap();

		let txn = engine.begin(true).unwrap();
		let rows = txn.scan(b"a", None).unwrap();
		let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
		assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
	}

	#[test]
	fn opening_a_locked_directory_twice_fails() {
		let dir = tempdir().unwrap();
		let _engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();
		let result = LsmEngine::open(dir.path(), EngineOptions::default());
		assert!(matches!(result, Err(KvError::LockHeld { .. })));
	}
}
