use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{KvError, Result};
use crate::key::ValueLocation;

/// WiscKey-style separation of large values from the sorted key structure:
/// values are appended to a log of files under `data_dir/vlog/`, and only a
/// `(file_id, offset, len)` pointer travels through the memtable/SSTables.
/// This keeps compaction cheap (it never recopies large payloads) at the
/// cost of an extra read indirection and the need for background GC once a
/// file's live-data ratio drops below `vlog_gc_discard_ratio` (spec §2 "KV
/// Engine"; GLOSSARY "WiscKey").
pub struct ValueLog {
	dir: PathBuf,
	active_file_id: AtomicU64,
	active: Mutex<File>,
	active_offset: AtomicU64,
	/// Bytes known to be dead (overwritten or deleted) per file, used to
	/// decide which files are GC candidates.
	discard_bytes: Mutex<HashMap<u64, u64>>,
}

const RECORD_HEADER_LEN: u64 = 4 + 8; // len + checksum

impl ValueLog {
	pub fn open(dir: impl AsRef<Path>, first_file_id: u64) -> Result<Self> {
		let dir = dir.as_ref().to_path_buf();
		std::fs::create_dir_all(&dir)?;
		let active_path = file_path(&dir, first_file_id);
		let file = OpenOptions::new().create(true).read(true).append(true).open(&active_path)?;
		let offset = file.metadata()?.len();
		Ok(ValueLog {
			dir,
			active_file_id: AtomicU64::new(first_file_id),
			active: Mutex::new(file),
			active_offset: AtomicU64::new(offset),
			discard_bytes: Mutex::new(HashMap::new()),
		})
	}

	/// Appends `value` to the active file and returns a pointer to it.
	pub fn append(&self, value: &[u8], sync: bool) -> Result<ValueLocation> {
		let mut guard = self.active.lock();
		let mut record = Vec::with_capacity(value.len() + RECORD_HEADER_LEN as usize);
		record.write_u32::<LittleEndian>(value.len() as u32)?;
		record.write_all(value)?;
		let checksum = xxh3_64(&record);
		record.write_u64::<LittleEndian>(checksum)?;

		let offset = self.active_offset.load(Ordering::Relaxed);
		guard.write_all(&record)?;
		guard.flush()?;
		if sync {
			guard.sync_data()?;
		}
		self.active_offset.fetch_add(record.len() as u64, Ordering::Relaxed);

		Ok(ValueLocation::ValueLog { file_id: self.active_file_id.load(Ordering::Relaxed), offset, len: value.len() as u32 })
	}

	pub fn read(&self, file_id: u64, offset: u64, len: u32) -> Result<Vec<u8>> {
		let path = file_path(&self.dir, file_id);
		let mut file = File::open(&path)?;
		file.seek(SeekFrom::Start(offset))?;
		let stored_len = file.read_u32::<LittleEndian>()?;
		if stored_len != len {
			return Err(KvError::Corruption { what: "vlog record length", offset });
		}
		let mut value = vec![0u8; len as usize];
		file.read_exact(&mut value)?;
		let checksum = file.read_u64::<LittleEndian>()?;

		let mut check_buf = Vec::with_capacity(4 + value.len());
		check_buf.write_u32::<LittleEndian>(stored_len)?;
		check_buf.write_all(&value)?;
		if xxh3_64(&check_buf) != checksum {
			return Err(KvError::Corruption { what: "vlog record checksum", offset });
		}
		Ok(value)
	}

	/// Rolls over to a new active file, e.g. once the current one exceeds a
	/// size threshold. Returns the new file id.
	pub fn roll(&self, new_file_id: u64) -> Result<()> {
		let path = file_path(&self.dir, new_file_id);
		let file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
		*self.active.lock() = file;
		self.active_file_id.store(new_file_id, Ordering::Relaxed);
		self.active_offset.store(0, Ordering::Relaxed);
		Ok(())
	}

	pub fn active_file_id(&self) -> u64 {
		self.active_file_id.load(Ordering::Relaxed)
	}

	pub fn active_offset(&self) -> u64 {
		self.active_offset.load(Ordering::Relaxed)
	}

	/// Marks `len` bytes in `file_id` as dead: called when a value is
	/// overwritten or its owning row is deleted and compacted away.
	pub fn mark_discarded(&self, file_id: u64, len: u32) {
		*self.discard_bytes.lock().entry(file_id).or_insert(0) += len as u64;
	}

	/// Returns file ids whose discarded bytes exceed `discard_ratio` of the
	/// file's total size, i.e. GC candidates (spec's supplemented "value
	/// log GC by discard ratio" background task).
	pub fn gc_candidates(&self, discard_ratio: f64) -> Result<Vec<u64>> {
		let discard = self.discard_bytes.lock();
		let mut candidates = Vec::new();
		for (&file_id, &discarded) in discard.iter() {
			let path = file_path(&self.dir, file_id);
			if file_id == self.active_file_id.load(Ordering::Relaxed) {
				continue; // never GC the file still being appended to
			}
			let Ok(meta) = std::fs::metadata(&path) else { continue };
			let total = meta.len().max(1);
			if (discarded as f64) / (total as f64) >= discard_ratio {
				candidates.push(file_id);
			}
		}
		candidates.sort_unstable();
		Ok(candidates)
	}

	pub fn remove_file(&self, file_id: u64) -> Result<()> {
		let path = file_path(&self.dir, file_id);
		std::fs::remove_file(path)?;
		self.discard_bytes.lock().remove(&file_id);
		Ok(())
	}
}

fn file_path(dir: &Path, file_id: u64) -> PathBuf {
	dir.join(format!("{file_id:020}.vlog"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn append_then_read_round_trips() {
		let dir = tempdir().unwrap();
		let vlog = ValueLog::open(dir.path(), 0).unwrap();
		let loc = vlog.append(b"hello world", true).unwrap();
		let ValueLocation::ValueLog { file_id, offset, len } = loc else { panic!() };
		let value = vlog.read(file_id, offset, len).unwrap();
		assert_eq!(value, b"hello world");
	}

	#[test]
	fn gc_candidates_respect_discard_ratio() {
		let dir = tempdir().unwrap();
		let vlog = ValueLog::open(dir.path(), 0).unwrap();
		vlog.append(&vec![0u8; 100], true).unwrap();
		vlog.roll(1).unwrap();
		vlog.mark_discarded(0, 90);
		let candidates = vlog.gc_candidates(0.5).unwrap();
		assert_eq!(candidates, vec![0]);
	}

	#[test]
	fn corrupted_length_is_detected() {
		let dir = tempdir().unwrap();
		let vlog = ValueLog::open(dir.path(), 0).unwrap();
		let loc = vlog.append(b"value", true).unwrap();
		let ValueLocation::ValueLog { file_id, offset, .. } = loc else { panic!() };
		assert!(vlog.read(file_id, offset, 999).is_err());
	}
}
