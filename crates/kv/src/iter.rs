use crate::key::EntryValue;

/// Merges several already-sorted, already-deduplicated `(key, value)`
/// sources into one sorted sequence with a single entry per key, resolving
/// cross-source ties by preferring the lowest-indexed source.
///
/// Callers push sources in freshness order: a transaction's own
/// uncommitted write buffer first, then the memtable's visible view, then
/// SSTables newest to oldest — so on a tie the freshest write wins.
/// Tombstones are dropped from the output entirely, since by the time a
/// caller asks for this merge it wants live rows, not delete markers.
pub fn merge_sources(sources: Vec<Vec<(Vec<u8>, EntryValue)>>) -> Vec<(Vec<u8>, EntryValue)> {
	let mut cursors = vec![0usize; sources.len()];
	let mut out = Vec::new();

	loop {
		let mut best_key: Option<&[u8]> = None;
		for (rank, source) in sources.iter().enumerate() {
			if let Some((k, _)) = source.get(cursors[rank]) {
				if best_key.map(|bk| k.as_slice() < bk).unwrap_or(true) {
					best_key = Some(k.as_slice());
				}
			}
		}
		let Some(best_key) = best_key.map(<[u8]>::to_vec) else { break };

		let mut winner: Option<EntryValue> = None;
		for (rank, source) in sources.iter().enumerate() {
			if let Some((k, v)) = source.get(cursors[rank]) {
				if k.as_slice() == best_key.as_slice() {
					if winner.is_none() {
						winner = Some(v.clone());
					}
					cursors[rank] += 1;
				}
			}
		}

		if let Some(value) = winner {
			if !matches!(value, EntryValue::Tombstone) {
				out.push((best_key, value));
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::ValueLocation;

	fn inline(v: &[u8]) -> EntryValue {
		EntryValue::Value(ValueLocation::Inline(v.to_vec()))
	}

	#[test]
	fn prefers_freshest_source_on_tie() {
		let write_buffer = vec![(b"a".to_vec(), inline(b"fresh"))];
		let memtable = vec![(b"a".to_vec(), inline(b"stale")), (b"b".to_vec(), inline(b"b"))];
		let merged = merge_sources(vec![write_buffer, memtable]);
		assert_eq!(merged, vec![(b"a".to_vec(), inline(b"fresh")), (b"b".to_vec(), inline(b"b"))]);
	}

	#[test]
	fn drops_tombstones() {
		let write_buffer = vec![(b"a".to_vec(), EntryValue::Tombstone)];
		let memtable = vec![(b"a".to_vec(), inline(b"stale"))];
		let merged = merge_sources(vec![write_buffer, memtable]);
		assert!(merged.is_empty());
	}

	#[test]
	fn merges_disjoint_keys_in_order() {
		let a = vec![(b"a".to_vec(), inline(b"1")), (b"c".to_vec(), inline(b"3"))];
		let b = vec![(b"b".to_vec(), inline(b"2"))];
		let merged = merge_sources(vec![a, b]);
		let keys: Vec<_> = merged.iter().map(|(k, _)| k.clone()).collect();
		assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
	}
}
