use byteorder::{BigEndian, ByteOrder};
use wiscdb_core::{ColumnId, DatabaseId, IndexId, RowId, TableId};
use wiscdb_type::Value;

use crate::value::encode_value;

// Single-byte namespace tags partition the KV engine's flat key space into
// disjoint ranges so a prefix scan over one namespace never runs into
// another's keys. Catalog namespaces sort before the row/index data
// namespaces so `SHOW DATABASES`-style catalog scans never need to skip
// over table data.
const NS_DATABASE: u8 = b'D';
const NS_TABLE: u8 = b'T';
const NS_SEQUENCE: u8 = b'S';
const NS_ROW: u8 = b'R';
const NS_INDEX: u8 = b'I';

fn push_u64(buf: &mut Vec<u8>, v: u64) {
	let mut tmp = [0u8; 8];
	BigEndian::write_u64(&mut tmp, v);
	buf.extend_from_slice(&tmp);
}

/// Key for a database's catalog record: `'D' | db_id`.
pub fn database_key(db_id: DatabaseId) -> Vec<u8> {
	let mut buf = vec![NS_DATABASE];
	push_u64(&mut buf, db_id.as_u64());
	buf
}

pub fn database_prefix() -> Vec<u8> {
	vec![NS_DATABASE]
}

/// Key for a table's catalog record: `'T' | db_id | table_id`.
pub fn table_key(db_id: DatabaseId, table_id: TableId) -> Vec<u8> {
	let mut buf = vec![NS_TABLE];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	buf
}

/// Prefix covering every table catalog record belonging to `db_id`.
pub fn table_prefix(db_id: DatabaseId) -> Vec<u8> {
	let mut buf = vec![NS_TABLE];
	push_u64(&mut buf, db_id.as_u64());
	buf
}

/// Key for a sequence's durable counter (auto-increment or a hidden
/// `_rowid` generator): `'S' | db_id | table_id | column_id`. `column_id`
/// is `0` for the table's hidden row-id sequence.
pub fn sequence_key(db_id: DatabaseId, table_id: TableId, column_id: Option<ColumnId>) -> Vec<u8> {
	let mut buf = vec![NS_SEQUENCE];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	push_u64(&mut buf, column_id.map(|c| c.as_u64()).unwrap_or(0));
	buf
}

/// Key for a row keyed by its primary key (or hidden `_rowid` if the table
/// declares none): `'R' | db_id | table_id | encoded_pk`.
pub fn row_key(db_id: DatabaseId, table_id: TableId, pk: &[Value]) -> Vec<u8> {
	let mut buf = vec![NS_ROW];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	for v in pk {
		encode_value(v, &mut buf);
	}
	buf
}

pub fn row_key_for_rowid(db_id: DatabaseId, table_id: TableId, rowid: RowId) -> Vec<u8> {
	row_key(db_id, table_id, &[Value::BigUint(rowid.as_u64())])
}

/// Prefix covering every row of `table_id`, used by full table scans.
pub fn row_prefix(db_id: DatabaseId, table_id: TableId) -> Vec<u8> {
	let mut buf = vec![NS_ROW];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	buf
}

/// Key for a secondary index entry: `'I' | db_id | table_id | index_id |
/// encoded_index_key | encoded_pk`. The primary key is appended so that
/// non-unique indexes can hold multiple rows with the same indexed value
/// without colliding, and so a secondary-index hit carries straight to the
/// primary key without a second encode/decode round trip.
pub fn index_key(db_id: DatabaseId, table_id: TableId, index_id: IndexId, index_values: &[Value], pk: &[Value]) -> Vec<u8> {
	let mut buf = vec![NS_INDEX];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	push_u64(&mut buf, index_id.as_u64());
	for v in index_values {
		encode_value(v, &mut buf);
	}
	for v in pk {
		encode_value(v, &mut buf);
	}
	buf
}

/// Prefix covering every entry of one index, used by full-index scans.
pub fn index_prefix(db_id: DatabaseId, table_id: TableId, index_id: IndexId) -> Vec<u8> {
	let mut buf = vec![NS_INDEX];
	push_u64(&mut buf, db_id.as_u64());
	push_u64(&mut buf, table_id.as_u64());
	push_u64(&mut buf, index_id.as_u64());
	buf
}

/// Prefix covering an index scan bounded to rows whose leading indexed
/// columns equal `index_values` exactly (a partial-key index scan).
pub fn index_prefix_with_values(db_id: DatabaseId, table_id: TableId, index_id: IndexId, index_values: &[Value]) -> Vec<u8> {
	let mut buf = index_prefix(db_id, table_id, index_id);
	for v in index_values {
		encode_value(v, &mut buf);
	}
	buf
}

/// Computes the exclusive upper bound of a prefix scan over `prefix`: the
/// smallest key strictly greater than every key starting with `prefix`, by
/// incrementing the last byte not already `0xFF` and truncating there (the
/// same construction rust-us-kv-rs's `Engine::scan_prefix` default
/// implementation uses).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
	let mut bound = prefix.to_vec();
	while let Some(&last) = bound.last() {
		if last == 0xFF {
			bound.pop();
		} else {
			*bound.last_mut().unwrap() += 1;
			return Some(bound);
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn row_keys_for_different_tables_do_not_overlap() {
		let db = DatabaseId::new(1);
		let t1 = TableId::new(1);
		let t2 = TableId::new(2);
		let k1 = row_key(db, t1, &[Value::Int(1)]);
		let k2 = row_key(db, t2, &[Value::Int(1)]);
		assert_ne!(k1, k2);
		assert!(!k2.starts_with(&row_prefix(db, t1)));
	}

	#[test]
	fn prefix_upper_bound_excludes_longer_keys_with_same_prefix() {
		let db = DatabaseId::new(1);
		let t = TableId::new(1);
		let prefix = row_prefix(db, t);
		let upper = prefix_upper_bound(&prefix).unwrap();
		let row = row_key(db, t, &[Value::Int(5)]);
		assert!(row.as_slice() < upper.as_slice());
		assert!(row.as_slice() >= prefix.as_slice());
	}

	#[test]
	fn row_key_ordering_matches_value_ordering_for_integer_pk() {
		let db = DatabaseId::new(1);
		let t = TableId::new(1);
		let mut keys: Vec<Vec<u8>> =
			[-5, -1, 0, 1, 100].iter().map(|v| row_key(db, t, &[Value::Int(*v)])).collect();
		let original = keys.clone();
		keys.sort();
		assert_eq!(keys, original);
	}
}
