use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{KvError, Result};

/// Allocates read and commit timestamps and performs the write-write
/// conflict check at commit time, implementing snapshot isolation the way
/// rust-us-kv-rs's MVCC module does with its `Key::NextVersion`,
/// `Key::TxnActive`, and `Key::TxnWrite` markers: a transaction takes its
/// `read_ts` as a snapshot of "everything committed so far", runs fully
/// optimistically against that snapshot, and only has its write set
/// checked for overlap with concurrently-committed transactions when it
/// calls `commit` (spec §4.5 "Isolation": "write-write conflicts are
/// detected at commit time, not at write time").
///
/// Committed write sets older than every currently-active transaction's
/// `read_ts` are pruned from `committed_writes` by `advance_watermark` so
/// memory use doesn't grow without bound across a long-running server.
pub struct Oracle {
	next_ts: AtomicU64,
	state: Mutex<OracleState>,
}

struct OracleState {
	active_read_ts: BTreeMap<u64, u32>,
	/// commit_ts -> keys written by that transaction, pruned below the
	/// watermark.
	committed_writes: BTreeMap<u64, HashSet<Vec<u8>>>,
}

impl Oracle {
	/// `last_committed_ts` is the highest commit timestamp recovered from
	/// the WAL/manifest on startup; timestamps resume from there so a
	/// restarted engine never reissues one already visible on disk.
	pub fn new(last_committed_ts: u64) -> Self {
		Oracle {
			next_ts: AtomicU64::new(last_committed_ts + 1),
			state: Mutex::new(OracleState { active_read_ts: BTreeMap::new(), committed_writes: BTreeMap::new() }),
		}
	}

	/// Begins a new transaction, returning the snapshot timestamp it reads
	/// at. The timestamp is registered as active until `end_transaction` is
	/// called (on either commit or rollback) so the watermark never passes
	/// it while it might still need to check its write set.
	pub fn begin(&self) -> u64 {
		let read_ts = self.next_ts.load(Ordering::SeqCst).saturating_sub(1);
		let mut state = self.state.lock();
		*state.active_read_ts.entry(read_ts).or_insert(0) += 1;
		read_ts
	}

	/// Checks `write_keys` against every transaction committed after
	/// `read_ts`, and if none overlap, allocates and records a new commit
	/// timestamp. Returns `KvError::Conflict` otherwise.
	pub fn try_commit(&self, read_ts: u64, write_keys: &HashSet<Vec<u8>>) -> Result<u64> {
		let mut state = self.state.lock();
		for (_, keys) in state.committed_writes.range((read_ts + 1)..) {
			if !keys.is_disjoint(write_keys) {
				return Err(KvError::Conflict);
			}
		}
		let commit_ts = self.next_ts.fetch_add(1, Ordering::SeqCst);
		if !write_keys.is_empty() {
			state.committed_writes.insert(commit_ts, write_keys.clone());
		}
		Ok(commit_ts)
	}

	/// Releases `read_ts`'s hold on the watermark and prunes any
	/// committed-write records no longer needed by a still-active
	/// transaction.
	pub fn end_transaction(&self, read_ts: u64) {
		let mut state = self.state.lock();
		if let Some(count) = state.active_read_ts.get_mut(&read_ts) {
			*count -= 1;
			if *count == 0 {
				state.active_read_ts.remove(&read_ts);
			}
		}
		let watermark = state.active_read_ts.keys().next().copied().unwrap_or(u64::MAX);
		state.committed_writes.retain(|&commit_ts, _| commit_ts > watermark);
	}

	pub fn current_ts(&self) -> u64 {
		self.next_ts.load(Ordering::SeqCst).saturating_sub(1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn keys(items: &[&[u8]]) -> HashSet<Vec<u8>> {
		items.iter().map(|k| k.to_vec()).collect()
	}

	#[test]
	fn disjoint_writes_never_conflict() {
		let oracle = Oracle::new(0);
		let ts1 = oracle.begin();
		let ts2 = oracle.begin();
		let c1 = oracle.try_commit(ts1, &keys(&[b"a"])).unwrap();
		oracle.end_transaction(ts1);
		assert!(oracle.try_commit(ts2, &keys(&[b"b"])).is_ok());
		oracle.end_transaction(ts2);
		assert!(c1 > ts1);
	}

	#[test]
	fn overlapping_writes_conflict() {
		let oracle = Oracle::new(0);
		let ts1 = oracle.begin();
		let ts2 = oracle.begin();
		oracle.try_commit(ts1, &keys(&[b"a"])).unwrap();
		oracle.end_transaction(ts1);
		let result = oracle.try_commit(ts2, &keys(&[b"a"]));
		assert!(matches!(result, Err(KvError::Conflict)));
	}

	#[test]
	fn watermark_prunes_old_committed_writes() {
		let oracle = Oracle::new(0);
		let ts1 = oracle.begin();
		oracle.try_commit(ts1, &keys(&[b"a"])).unwrap();
		oracle.end_transaction(ts1);
		// No active transactions remain below this commit, so it's prunable.
		let ts2 = oracle.begin();
		oracle.end_transaction(ts2);
		let state = oracle.state.lock();
		assert!(state.committed_writes.is_empty());
	}
}
