use byteorder::{BigEndian, ByteOrder};
use wiscdb_type::{DataType, Value};

use crate::error::{CodecError, Result};
use crate::value::{decode_value, encode_value};

const SCHEMA_VERSION: u16 = 1;

/// Encodes a full row as the KV value stored under a row key: a small
/// header (schema version + flags, reserved for future column-add/rename
/// migrations), a null bitmap, then each non-null column's value
/// back-to-back using the same per-type encoding the key codec uses.
///
/// Row values are *not* required to be order-preserving — only keys are —
/// so this reuses `encode_value`/`decode_value` purely for convenience
/// rather than for their memcomparable property.
pub fn encode_row(values: &[Value]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(values.len() * 8 + 8);
	let mut header = [0u8; 2];
	BigEndian::write_u16(&mut header, SCHEMA_VERSION);
	buf.extend_from_slice(&header);
	buf.push(0); // flags, unused today

	let bitmap_len = values.len().div_ceil(8);
	let mut bitmap = vec![0u8; bitmap_len];
	for (i, v) in values.iter().enumerate() {
		if v.is_null() {
			bitmap[i / 8] |= 1 << (i % 8);
		}
	}
	buf.extend_from_slice(&bitmap);

	for value in values {
		if !value.is_null() {
			encode_value(value, &mut buf);
		}
	}
	buf
}

/// Decodes a row previously written by [`encode_row`] against `schema`,
/// the ordered column data types at the time of writing. `schema` must
/// match the column count and types the row was encoded with; the catalog
/// is responsible for migrating old rows if a table is ever altered (not
/// yet supported — see `DESIGN.md`).
pub fn decode_row(input: &[u8], schema: &[DataType]) -> Result<Vec<Value>> {
	if input.len() < 3 {
		return Err(CodecError::Truncated { what: "row header" });
	}
	let version = BigEndian::read_u16(&input[0..2]);
	if version != SCHEMA_VERSION {
		return Err(CodecError::TypeMismatch);
	}
	let bitmap_len = schema.len().div_ceil(8);
	let bitmap_start = 3;
	let bitmap_end = bitmap_start + bitmap_len;
	if input.len() < bitmap_end {
		return Err(CodecError::Truncated { what: "row null bitmap" });
	}
	let bitmap = &input[bitmap_start..bitmap_end];

	let mut values = Vec::with_capacity(schema.len());
	let mut cursor = bitmap_end;
	for (i, data_type) in schema.iter().enumerate() {
		let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
		if is_null {
			values.push(Value::Null);
			continue;
		}
		let (value, consumed) = decode_value(&input[cursor..], data_type)?;
		values.push(value);
		cursor += consumed;
	}
	Ok(values)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_row_with_mixed_nulls() {
		let schema = vec![DataType::Int { unsigned: false }, DataType::Varchar { max_len: 32 }, DataType::Bool];
		let values = vec![Value::Int(42), Value::Null, Value::Bool(true)];
		let encoded = encode_row(&values);
		let decoded = decode_row(&encoded, &schema).unwrap();
		assert_eq!(decoded.len(), 3);
		assert_eq!(decoded[0], Value::Int(42));
		assert!(decoded[1].is_null());
		assert_eq!(decoded[2], Value::Bool(true));
	}

	#[test]
	fn round_trips_all_null_row() {
		let schema = vec![DataType::Int { unsigned: false }; 10];
		let values = vec![Value::Null; 10];
		let encoded = encode_row(&values);
		let decoded = decode_row(&encoded, &schema).unwrap();
		assert!(decoded.iter().all(|v| v.is_null()));
	}

	#[test]
	fn rejects_mismatched_schema_version() {
		let mut encoded = encode_row(&[Value::Int(1)]);
		encoded[1] = 0xFF;
		let result = decode_row(&encoded, &[DataType::Int { unsigned: false }]);
		assert!(result.is_err());
	}
}
