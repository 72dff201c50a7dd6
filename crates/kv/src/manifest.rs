use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Durable record of which SSTable files currently make up the engine's
/// on-disk state, plus the monotonic counters needed to name the next one.
/// Rewritten atomically (write-to-temp, then rename) on every flush or
/// compaction so a crash never observes a half-written manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
	pub sstables: Vec<SsTableMeta>,
	pub next_sstable_id: u64,
	pub next_vlog_file_id: u64,
	pub next_wal_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsTableMeta {
	pub id: u64,
	/// Level 0 holds freshly-flushed memtables (overlapping key ranges
	/// allowed); compaction merges them upward. Only level 0 is populated
	/// by this engine today — see `DESIGN.md` for why leveled compaction
	/// beyond L0→L1 was left out of scope.
	pub level: u32,
	pub min_key: Vec<u8>,
	pub max_key: Vec<u8>,
}

impl Manifest {
	pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		if !path.exists() {
			return Ok(Manifest::default());
		}
		let bytes = fs::read(path)?;
		let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|_| crate::error::KvError::Corruption {
			what: "manifest",
			offset: 0,
		})?;
		Ok(manifest)
	}

	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		let tmp = tmp_path(path);
		{
			let mut f = fs::File::create(&tmp)?;
			let bytes = serde_json::to_vec_pretty(self).expect("Manifest serialization is infallible");
			f.write_all(&bytes)?;
			f.sync_all()?;
		}
		fs::rename(&tmp, path)?;
		if let Some(dir) = path.parent() {
			if let Ok(dir_file) = fs::File::open(dir) {
				let _ = dir_file.sync_all();
			}
		}
		Ok(())
	}

	pub fn alloc_sstable_id(&mut self) -> u64 {
		let id = self.next_sstable_id;
		self.next_sstable_id += 1;
		id
	}

	pub fn alloc_vlog_file_id(&mut self) -> u64 {
		let id = self.next_vlog_file_id;
		self.next_vlog_file_id += 1;
		id
	}

	pub fn alloc_wal_id(&mut self) -> u64 {
		let id = self.next_wal_id;
		self.next_wal_id += 1;
		id
	}
}

fn tmp_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().unwrap_or_default().to_os_string();
	name.push(".tmp");
	path.with_file_name(name)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn save_and_reload_round_trips() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("MANIFEST");
		let mut m = Manifest::default();
		let id = m.alloc_sstable_id();
		m.sstables.push(SsTableMeta { id, level: 0, min_key: b"a".to_vec(), max_key: b"z".to_vec() });
		m.save(&path).unwrap();

		let reloaded = Manifest::load_or_default(&path).unwrap();
		assert_eq!(reloaded.sstables.len(), 1);
		assert_eq!(reloaded.next_sstable_id, 1);
	}

	#[test]
	fn missing_manifest_loads_as_default() {
		let dir = tempdir().unwrap();
		let m = Manifest::load_or_default(dir.path().join("MANIFEST")).unwrap();
		assert_eq!(m.next_sstable_id, 0);
	}
}
