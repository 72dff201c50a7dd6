use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{KvError, Result};
use crate::key::{EntryValue, InternalKey};

/// An immutable, sorted run of internal keys written once by a memtable
/// flush or compaction and never mutated again.
///
/// Real LSM engines split an SSTable into compressed data blocks with a
/// sparse per-block index; this engine keeps the simplification of one
/// `bincode`-serialized sorted `Vec` per file plus a full in-memory index of
/// every key's byte offset (documented as a deliberate simplification in
/// `DESIGN.md` — the ordering and immutability invariants are the same, the
/// block layer is just elided). Binary search over the index still gives
/// O(log n) point lookups without reading the whole file.
pub struct SsTable {
	path: PathBuf,
	index: Vec<IndexEntry>,
	min_key: Vec<u8>,
	max_key: Vec<u8>,
}

#[derive(Clone)]
struct IndexEntry {
	user_key: Vec<u8>,
	commit_ts: u64,
	file_offset: u64,
	file_len: u32,
}

#[derive(Serialize, Deserialize)]
struct OnDiskEntry {
	user_key: Vec<u8>,
	commit_ts: u64,
	value: EntryValue,
}

impl SsTable {
	/// Writes `entries` (already sorted ascending by `InternalKey`) to
	/// `path` and returns a handle with the index loaded in memory.
	pub fn write(path: impl AsRef<Path>, entries: &[(InternalKey, EntryValue)]) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let file = File::create(&path)?;
		let mut writer = BufWriter::new(file);
		let mut index = Vec::with_capacity(entries.len());
		let mut offset: u64 = 0;

		for (ik, value) in entries {
			let on_disk = OnDiskEntry { user_key: ik.user_key.clone(), commit_ts: ik.commit_ts, value: value.clone() };
			let body = bincode::serialize(&on_disk).map_err(|_| KvError::Corruption { what: "sstable encode", offset })?;
			let checksum = xxh3_64(&body);

			let mut record = Vec::with_capacity(body.len() + 12);
			record.extend_from_slice(&(body.len() as u32).to_le_bytes());
			record.extend_from_slice(&body);
			record.extend_from_slice(&checksum.to_le_bytes());
			writer.write_all(&record)?;

			index.push(IndexEntry {
				user_key: ik.user_key.clone(),
				commit_ts: ik.commit_ts,
				file_offset: offset,
				file_len: record.len() as u32,
			});
			offset += record.len() as u64;
		}
		writer.flush()?;
		writer.get_ref().sync_all()?;

		let min_key = entries.first().map(|(ik, _)| ik.user_key.clone()).unwrap_or_default();
		let max_key = entries.last().map(|(ik, _)| ik.user_key.clone()).unwrap_or_default();
		Ok(SsTable { path, index, min_key, max_key })
	}

	/// Opens an existing SSTable file, rebuilding the in-memory index by
	/// scanning it once.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let file = File::open(&path)?;
		let mut reader = BufReader::new(file);
		let mut index = Vec::new();
		let mut offset: u64 = 0;
		let file_len = std::fs::metadata(&path)?.len();

		while offset < file_len {
			let (entry, record_len) = Self::read_record_at(&mut reader, offset)?;
			index.push(IndexEntry {
				user_key: entry.user_key,
				commit_ts: entry.commit_ts,
				file_offset: offset,
				file_len: record_len as u32,
			});
			offset += record_len;
		}

		let min_key = index.first().map(|e| e.user_key.clone()).unwrap_or_default();
		let max_key = index.last().map(|e| e.user_key.clone()).unwrap_or_default();
		Ok(SsTable { path, index, min_key, max_key })
	}

	fn read_record_at(reader: &mut BufReader<File>, _offset: u64) -> Result<(OnDiskEntry, u64)> {
		use byteorder::{LittleEndian, ReadBytesExt};
		let body_len = reader.read_u32::<LittleEndian>()?;
		let mut body = vec![0u8; body_len as usize];
		std::io::Read::read_exact(reader, &mut body)?;
		let checksum = reader.read_u64::<LittleEndian>()?;
		if xxh3_64(&body) != checksum {
			return Err(KvError::Corruption { what: "sstable record checksum", offset: 0 });
		}
		let entry: OnDiskEntry =
			bincode::deserialize(&body).map_err(|_| KvError::Corruption { what: "sstable decode", offset: 0 })?;
		Ok((entry, body_len as u64 + 12))
	}

	fn read_entry_at(&self, idx_entry: &IndexEntry) -> Result<OnDiskEntry> {
		use byteorder::{LittleEndian, ReadBytesExt};
		use std::io::{Read, Seek, SeekFrom};
		let mut file = File::open(&self.path)?;
		file.seek(SeekFrom::Start(idx_entry.file_offset))?;
		let body_len = file.read_u32::<LittleEndian>()?;
		let mut body = vec![0u8; body_len as usize];
		file.read_exact(&mut body)?;
		let checksum = file.read_u64::<LittleEndian>()?;
		if xxh3_64(&body) != checksum {
			return Err(KvError::Corruption { what: "sstable record checksum", offset: idx_entry.file_offset });
		}
		bincode::deserialize(&body).map_err(|_| KvError::Corruption { what: "sstable decode", offset: idx_entry.file_offset })
	}

	/// Returns the newest entry for `user_key` with `commit_ts <= read_ts`.
	pub fn get(&self, user_key: &[u8], read_ts: u64) -> Result<Option<EntryValue>> {
		let start = self.index.partition_point(|e| e.user_key.as_slice() < user_key);
		for idx_entry in &self.index[start..] {
			if idx_entry.user_key.as_slice() != user_key {
				break;
			}
			if idx_entry.commit_ts <= read_ts {
				return Ok(Some(self.read_entry_at(idx_entry)?.value));
			}
		}
		Ok(None)
	}

	/// Returns every (user_key, value) pair visible at `read_ts` in
	/// `[start, end)`, one entry per key, ascending.
	pub fn scan_visible(&self, start: &[u8], end: Option<&[u8]>, read_ts: u64) -> Result<Vec<(Vec<u8>, EntryValue)>> {
		let mut out = Vec::new();
		let mut last_key: Option<&[u8]> = None;
		let from = self.index.partition_point(|e| e.user_key.as_slice() < start);
		for idx_entry in &self.index[from..] {
			if let Some(end) = end {
				if idx_entry.user_key.as_slice() >= end {
					break;
				}
			}
			if last_key == Some(idx_entry.user_key.as_slice()) {
				continue;
			}
			if idx_entry.commit_ts <= read_ts {
				last_key = Some(idx_entry.user_key.as_slice());
				out.push((idx_entry.user_key.clone(), self.read_entry_at(idx_entry)?.value));
			}
		}
		Ok(out)
	}

	pub fn min_key(&self) -> &[u8] {
		&self.min_key
	}

	pub fn max_key(&self) -> &[u8] {
		&self.max_key
	}

	pub fn overlaps(&self, start: &[u8], end: Option<&[u8]>) -> bool {
		if let Some(end) = end {
			if end <= self.min_key.as_slice() {
				return false;
			}
		}
		start <= self.max_key.as_slice()
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::ValueLocation;
	use tempfile::tempdir;

	fn inline(v: &[u8]) -> EntryValue {
		EntryValue::Value(ValueLocation::Inline(v.to_vec()))
	}

	#[test]
	fn write_then_open_reproduces_contents() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("1.sst");
		let entries = vec![
			(InternalKey::new(b"a".to_vec(), 1), inline(b"a1")),
			(InternalKey::new(b"b".to_vec(), 5), inline(b"b5")),
			(InternalKey::new(b"b".to_vec(), 1), inline(b"b1")),
		];
		SsTable::write(&path, &entries).unwrap();

		let reopened = SsTable::open(&path).unwrap();
		assert_eq!(reopened.get(b"a", 10).unwrap(), Some(inline(b"a1")));
		assert_eq!(reopened.get(b"b", 2).unwrap(), Some(inline(b"b1")));
		assert_eq!(reopened.get(b"b", 10).unwrap(), Some(inline(b"b5")));
		assert_eq!(reopened.get(b"missing", 10).unwrap(), None);
	}

	#[test]
	fn overlaps_detects_disjoint_ranges() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("1.sst");
		let entries = vec![(InternalKey::new(b"m".to_vec(), 1), inline(b"v"))];
		SsTable::write(&path, &entries).unwrap();
		let sst = SsTable::open(&path).unwrap();
		assert!(!sst.overlaps(b"a", Some(b"b")));
		assert!(sst.overlaps(b"a", Some(b"z")));
	}
}
