use wiscdb_catalog::TableDef;
use wiscdb_codec::{decode_row, encode_row, index_key, index_prefix_with_values, prefix_upper_bound, row_key, row_prefix};
use wiscdb_core::{ColumnId, Deadline, Error, Result};
use wiscdb_kv::Txn;
use wiscdb_type::Value;

use crate::error::map_kv_err;
use crate::ids;

/// A transactional, row-oriented view of one table. Borrows the
/// transaction it runs against so every operation participates in the
/// caller's current transaction (spec §4.4: "all DML runs inside the
/// session's active or autocommit transaction").
pub struct TableHandle<'t> {
	pub(crate) txn: &'t mut Txn,
	pub(crate) table: TableDef,
}

impl<'t> TableHandle<'t> {
	pub fn new(txn: &'t mut Txn, table: TableDef) -> Self {
		TableHandle { txn, table }
	}

	pub fn table(&self) -> &TableDef {
		&self.table
	}

	/// Inserts a full row given in column-declaration order. Auto-increment
	/// columns (including a synthesized `_rowid`) are filled in when the
	/// caller passes `Value::Null` for them; an explicit value pushes the
	/// sequence counter forward to `max(counter, value + 1)` like MySQL's
	/// own `AUTO_INCREMENT` (spec §4.6).
	pub fn insert(&mut self, mut values: Vec<Value>) -> Result<Option<u64>> {
		if values.len() != self.table.columns.len() {
			return Err(Error::Internal(format!(
				"column count mismatch: table has {} columns, {} values given",
				self.table.columns.len(),
				values.len()
			)));
		}

		// `_rowid` is also `auto_increment` (see catalog), so the first
		// *user-visible* auto-increment column assigned wins, matching
		// MySQL's `LAST_INSERT_ID()` (spec §4.6/§4.7): it never reports the
		// hidden row id.
		let mut last_insert_id = None;
		for (i, col) in self.table.columns.iter().enumerate() {
			if col.auto_increment {
				let floor = match &values[i] {
					Value::Null => None,
					other => Some(other.as_i64().unwrap_or(0).max(0) as u64),
				};
				let seq_key = wiscdb_codec::sequence_key(self.table.database_id, self.table.id, Some(col.id));
				let next = ids::next_sequence_value(self.txn, &seq_key, floor)?;
				values[i] = sequence_value_for(&col.data_type, next)?;
				if last_insert_id.is_none() && col.name != wiscdb_catalog::HIDDEN_ROWID_COLUMN {
					last_insert_id = Some(next);
				}
			} else if values[i].is_null() && !col.nullable {
				if let Some(default) = &col.default {
					values[i] = default.clone();
				} else {
					return Err(Error::NotNull { column: col.name.clone() });
				}
			}
		}

		let pk = self.primary_key_values(&values);
		let key = row_key(self.table.database_id, self.table.id, &pk);
		if self.txn.get(&key).map_err(map_kv_err)?.is_some() {
			return Err(Error::DuplicateKey { key_description: describe_key(&pk) });
		}

		for index in &self.table.indexes {
			if index.unique {
				let index_values = self.column_values(&values, &index.columns);
				let prefix = index_prefix_with_values(self.table.database_id, self.table.id, index.id, &index_values);
				let upper = prefix_upper_bound(&prefix);
				if !self.txn.scan(&prefix, upper.as_deref()).map_err(map_kv_err)?.is_empty() {
					return Err(Error::DuplicateKey { key_description: format!("index '{}'", index.name) });
				}
			}
		}

		self.txn.put(key, encode_row(&values)).map_err(map_kv_err)?;
		for index in &self.table.indexes {
			let index_values = self.column_values(&values, &index.columns);
			let ik = index_key(self.table.database_id, self.table.id, index.id, &index_values, &pk);
			self.txn.put(ik, Vec::new()).map_err(map_kv_err)?;
		}
		Ok(last_insert_id)
	}

	pub fn get(&self, pk: &[Value]) -> Result<Option<Vec<Value>>> {
		let key = row_key(self.table.database_id, self.table.id, pk);
		match self.txn.get(&key).map_err(map_kv_err)? {
			Some(bytes) => {
				let schema: Vec<_> = self.table.columns.iter().map(|c| c.data_type).collect();
				let values = decode_row(&bytes, &schema).map_err(crate::error::map_codec_err)?;
				Ok(Some(values))
			}
			None => Ok(None),
		}
	}

	pub fn update(&mut self, pk: &[Value], new_values: Vec<Value>) -> Result<()> {
		let existing = self.get(pk)?.ok_or(Error::RowNotFound)?;
		for index in &self.table.indexes {
			let old_index_values = self.column_values(&existing, &index.columns);
			let old_key = index_key(self.table.database_id, self.table.id, index.id, &old_index_values, pk);
			self.txn.delete(old_key).map_err(map_kv_err)?;
		}

		let new_pk = self.primary_key_values(&new_values);
		let key = row_key(self.table.database_id, self.table.id, &new_pk);
		if new_pk != pk {
			let old_key = row_key(self.table.database_id, self.table.id, pk);
			self.txn.delete(old_key).map_err(map_kv_err)?;
		}
		self.txn.put(key, encode_row(&new_values)).map_err(map_kv_err)?;

		for index in &self.table.indexes {
			let index_values = self.column_values(&new_values, &index.columns);
			let ik = index_key(self.table.database_id, self.table.id, index.id, &index_values, &new_pk);
			self.txn.put(ik, Vec::new()).map_err(map_kv_err)?;
		}
		Ok(())
	}

	pub fn delete(&mut self, pk: &[Value]) -> Result<()> {
		let existing = self.get(pk)?.ok_or(Error::RowNotFound)?;
		for index in &self.table.indexes {
			let index_values = self.column_values(&existing, &index.columns);
			let ik = index_key(self.table.database_id, self.table.id, index.id, &index_values, pk);
			self.txn.delete(ik).map_err(map_kv_err)?;
		}
		let key = row_key(self.table.database_id, self.table.id, pk);
		self.txn.delete(key).map_err(map_kv_err)
	}

	/// Full table scan in primary-key order.
	pub fn scan(&self, deadline: &Deadline) -> Result<RowIter> {
		let prefix = row_prefix(self.table.database_id, self.table.id);
		let upper = prefix_upper_bound(&prefix);
		let raw = self.txn.scan(&prefix, upper.as_deref()).map_err(map_kv_err)?;
		self.rows_from_raw(raw, deadline)
	}

	/// Scans a unique or non-unique secondary index, narrowed to rows whose
	/// leading indexed columns equal `index_values` exactly. Since
	/// `index_values` covers every indexed column, the portion of each
	/// matching key after the shared prefix is exactly the row's encoded
	/// primary key, decoded forward using the primary key's own column
	/// types.
	pub fn index_scan(&self, index_id: wiscdb_core::IndexId, index_values: &[Value], deadline: &Deadline) -> Result<RowIter> {
		let prefix = index_prefix_with_values(self.table.database_id, self.table.id, index_id, index_values);
		let upper = prefix_upper_bound(&prefix);
		let pairs = self.txn.scan(&prefix, upper.as_deref()).map_err(map_kv_err)?;

		let pk_types: Vec<_> = self
			.table
			.primary_key
			.as_deref()
			.unwrap_or(&[])
			.iter()
			.map(|id| self.table.column(*id).expect("primary key column exists in this table's schema").data_type)
			.collect();

		let mut rows = Vec::with_capacity(pairs.len());
		let schema: Vec<_> = self.table.columns.iter().map(|c| c.data_type).collect();
		for (key, _) in pairs {
			deadline.check()?;
			let pk = decode_values_forward(&key[prefix.len()..], &pk_types)?;
			if let Some(bytes) = self.txn.get(&row_key(self.table.database_id, self.table.id, &pk)).map_err(map_kv_err)? {
				rows.push(decode_row(&bytes, &schema).map_err(crate::error::map_codec_err)?);
			}
		}
		Ok(RowIter::new(rows))
	}

	fn rows_from_raw(&self, raw: Vec<(Vec<u8>, Vec<u8>)>, deadline: &Deadline) -> Result<RowIter> {
		let schema: Vec<_> = self.table.columns.iter().map(|c| c.data_type).collect();
		let mut rows = Vec::with_capacity(raw.len());
		for (_, value) in raw {
			deadline.check()?;
			rows.push(decode_row(&value, &schema).map_err(crate::error::map_codec_err)?);
		}
		Ok(RowIter::new(rows))
	}

	fn primary_key_values(&self, values: &[Value]) -> Vec<Value> {
		self.column_values(values, self.table.primary_key.as_deref().unwrap_or(&[]))
	}

	fn column_values(&self, values: &[Value], column_ids: &[ColumnId]) -> Vec<Value> {
		column_ids
			.iter()
			.map(|id| {
				let pos = self.table.columns.iter().position(|c| c.id == *id).expect("column id from this table's own schema");
				values[pos].clone()
			})
			.collect()
	}
}

/// Decodes a sequence of self-delimiting values front-to-back, one per
/// `data_type` in order.
fn decode_values_forward(mut input: &[u8], data_types: &[wiscdb_type::DataType]) -> Result<Vec<Value>> {
	let mut values = Vec::with_capacity(data_types.len());
	for data_type in data_types {
		let (value, consumed) = wiscdb_codec::decode_value(input, data_type).map_err(crate::error::map_codec_err)?;
		values.push(value);
		input = &input[consumed..];
	}
	Ok(values)
}

fn describe_key(pk: &[Value]) -> String {
	pk.iter().map(|v| format!("{v:?}")).collect::<Vec<_>>().join(",")
}

/// Reshapes a sequence counter's next value into the `Value` variant
/// `data_type` declares, so an `AUTO_INCREMENT` column's stored value
/// always matches what `wiscdb-codec` will decode it back as (it picks
/// the decoded variant from the column's declared type, not a
/// self-describing tag).
fn sequence_value_for(data_type: &wiscdb_type::DataType, next: u64) -> Result<Value> {
	use wiscdb_type::DataType;
	match data_type {
		DataType::TinyInt { unsigned: false } => i8::try_from(next).map(Value::TinyInt).map_err(|_| sequence_overflow("TINYINT")),
		DataType::TinyInt { unsigned: true } => u8::try_from(next).map(Value::TinyUint).map_err(|_| sequence_overflow("TINYINT UNSIGNED")),
		DataType::SmallInt { unsigned: false } => i16::try_from(next).map(Value::SmallInt).map_err(|_| sequence_overflow("SMALLINT")),
		DataType::SmallInt { unsigned: true } => u16::try_from(next).map(Value::SmallUint).map_err(|_| sequence_overflow("SMALLINT UNSIGNED")),
		DataType::Int { unsigned: false } => i32::try_from(next).map(Value::Int).map_err(|_| sequence_overflow("INT")),
		DataType::Int { unsigned: true } => u32::try_from(next).map(Value::Uint).map_err(|_| sequence_overflow("INT UNSIGNED")),
		DataType::BigInt { unsigned: false } => i64::try_from(next).map(Value::BigInt).map_err(|_| sequence_overflow("BIGINT")),
		DataType::BigInt { unsigned: true } => Ok(Value::BigUint(next)),
		other => Err(Error::Internal(format!("AUTO_INCREMENT is not supported on column type {}", other.name()))),
	}
}

fn sequence_overflow(type_name: &str) -> Error {
	Error::Internal(format!("AUTO_INCREMENT sequence value out of range for {type_name}"))
}

/// A materialized set of decoded rows. The engine's range scans already
/// return whole result sets rather than a lazy cursor (see `DESIGN.md`),
/// but this still checks `deadline` between yields the way spec §5
/// requires of every row iterator, so a long-running `SELECT` against an
/// already-fetched buffer still observes cancellation/timeouts promptly.
pub struct RowIter {
	rows: std::vec::IntoIter<Vec<Value>>,
}

impl RowIter {
	fn new(rows: Vec<Vec<Value>>) -> Self {
		RowIter { rows: rows.into_iter() }
	}

	pub fn next_row(&mut self, deadline: &Deadline) -> Result<Option<Vec<Value>>> {
		deadline.check()?;
		Ok(self.rows.next())
	}
}
