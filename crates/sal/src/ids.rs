use byteorder::{BigEndian, ByteOrder};
use wiscdb_core::{ColumnId, DatabaseId, Result, TableId};
use wiscdb_kv::Txn;

use crate::error::map_kv_err;

// Fixed keys outside the codec's catalog/row/index namespaces, used only to
// allocate the monotonic IDs the catalog hands out for new databases,
// tables, columns, and indexes. Kept deliberately simple (one counter per
// kind) since ID allocation is never on the hot path.
const NEXT_DATABASE_ID: &[u8] = b"\x00next_database_id";
const NEXT_TABLE_ID: &[u8] = b"\x00next_table_id";
const NEXT_COLUMN_ID: &[u8] = b"\x00next_column_id";
const NEXT_INDEX_ID: &[u8] = b"\x00next_index_id";

fn next_id(txn: &mut Txn, counter_key: &[u8]) -> Result<u64> {
	let current = match txn.get(counter_key).map_err(map_kv_err)? {
		Some(bytes) if bytes.len() == 8 => BigEndian::read_u64(&bytes),
		_ => 0,
	};
	let next = current + 1;
	let mut buf = [0u8; 8];
	BigEndian::write_u64(&mut buf, next);
	txn.put(counter_key.to_vec(), buf.to_vec()).map_err(map_kv_err)?;
	Ok(next)
}

pub fn next_database_id(txn: &mut Txn) -> Result<DatabaseId> {
	next_id(txn, NEXT_DATABASE_ID).map(DatabaseId::new)
}

pub fn next_table_id(txn: &mut Txn) -> Result<TableId> {
	next_id(txn, NEXT_TABLE_ID).map(TableId::new)
}

pub fn next_column_id(txn: &mut Txn) -> Result<ColumnId> {
	next_id(txn, NEXT_COLUMN_ID).map(ColumnId::new)
}

pub fn next_index_id(txn: &mut Txn) -> Result<wiscdb_core::IndexId> {
	next_id(txn, NEXT_INDEX_ID).map(wiscdb_core::IndexId::new)
}

/// Reads-then-writes a per-table sequence counter (a hidden `_rowid`
/// generator, or an `AUTO_INCREMENT` column's counter), returning the value
/// to use next. `floor` lets an explicit `INSERT ... (auto_inc_col)
/// VALUES (n)` push the counter forward to `max(counter, n + 1)` the way
/// MySQL's own `AUTO_INCREMENT` does (spec §4.6).
pub fn next_sequence_value(txn: &mut Txn, key: &[u8], floor: Option<u64>) -> Result<u64> {
	let current = match txn.get(key).map_err(map_kv_err)? {
		Some(bytes) if bytes.len() == 8 => BigEndian::read_u64(&bytes),
		_ => 0,
	};
	let next = current.max(floor.unwrap_or(0)) + 1;
	let mut buf = [0u8; 8];
	BigEndian::write_u64(&mut buf, next);
	txn.put(key.to_vec(), buf.to_vec()).map_err(map_kv_err)?;
	Ok(next)
}
