use wiscdb_core::{Error, Result};
use wiscdb_exec::{Field, OutputSchema};
use wiscdb_type::{DataType, Value};

use crate::packet::{write_lenenc_int, write_lenenc_string, write_nul_string};
use crate::status::DEFAULT_CHARSET;

/// Character set id MySQL clients treat as "raw bytes, no collation"
/// (spec §4.7's framing is silent on this; `binary` is what a real server
/// sends for `BLOB`/`VARBINARY` columns so clients don't try to decode them
/// as text).
const BINARY_CHARSET: u16 = 63;

pub const NOT_NULL_FLAG: u16 = 0x0001;
pub const PRI_KEY_FLAG: u16 = 0x0002;
pub const UNSIGNED_FLAG: u16 = 0x0020;
pub const BINARY_FLAG: u16 = 0x0080;
pub const AUTO_INCREMENT_FLAG: u16 = 0x0200;

/// MySQL's wire type tag for a column definition (spec §4.7's
/// `ColumnDefinition41` packet). Doesn't need to be a lossless inverse of
/// `DataType`: several logical types share a wire representation (e.g.
/// every fixed-point type that isn't itself an integer or float travels as
/// `NEWDECIMAL`/`VAR_STRING`).
fn wire_type(data_type: &DataType) -> u8 {
	match data_type {
		DataType::Bool | DataType::TinyInt { .. } => 0x01,  // MYSQL_TYPE_TINY
		DataType::SmallInt { .. } => 0x02,                  // MYSQL_TYPE_SHORT
		DataType::Int { .. } => 0x03,                       // MYSQL_TYPE_LONG
		DataType::Float4 => 0x04,                           // MYSQL_TYPE_FLOAT
		DataType::Float8 => 0x05,                           // MYSQL_TYPE_DOUBLE
		DataType::BigInt { .. } => 0x08,                    // MYSQL_TYPE_LONGLONG
		DataType::Date => 0x0a,                             // MYSQL_TYPE_DATE
		DataType::Time => 0x0b,                             // MYSQL_TYPE_TIME
		DataType::DateTime => 0x0c,                         // MYSQL_TYPE_DATETIME
		DataType::Timestamp => 0x07,                        // MYSQL_TYPE_TIMESTAMP
		DataType::Decimal { .. } => 0xf6,                   // MYSQL_TYPE_NEWDECIMAL
		DataType::Json => 0xf5,                             // MYSQL_TYPE_JSON
		DataType::Blob => 0xfc,                             // MYSQL_TYPE_BLOB
		DataType::Varchar { .. } | DataType::Char { .. } | DataType::Binary { .. } => 0xfd, // MYSQL_TYPE_VAR_STRING
	}
}

fn column_length(data_type: &DataType) -> u32 {
	match data_type {
		DataType::Bool | DataType::TinyInt { .. } => 4,
		DataType::SmallInt { .. } => 6,
		DataType::Int { .. } => 11,
		DataType::BigInt { .. } => 20,
		DataType::Float4 => 12,
		DataType::Float8 => 22,
		DataType::Decimal { precision, scale } => (*precision as u32) + (*scale as u32 > 0) as u32 + 2,
		DataType::Varchar { max_len } | DataType::Char { len: max_len } | DataType::Binary { max_len } => *max_len,
		DataType::Date => 10,
		DataType::Time => 10,
		DataType::DateTime | DataType::Timestamp => 19,
		DataType::Json | DataType::Blob => u32::MAX,
	}
}

fn column_flags(field: &Field) -> u16 {
	let mut flags = 0;
	if !field.nullable {
		flags |= NOT_NULL_FLAG;
	}
	if matches!(field.data_type, DataType::TinyInt { unsigned: true } | DataType::SmallInt { unsigned: true } | DataType::Int { unsigned: true } | DataType::BigInt { unsigned: true }) {
		flags |= UNSIGNED_FLAG;
	}
	if matches!(field.data_type, DataType::Binary { .. } | DataType::Blob) {
		flags |= BINARY_FLAG;
	}
	flags
}

/// Encodes one `ColumnDefinition41` packet for `field` (spec §4.7: "column
/// count packet, column-definition packets (41 format)"). `table`/`db` name
/// the originating table for clients that display it (`mysql --table`,
/// JDBC's `ResultSetMetaData`); both default to empty for computed columns
/// (aggregates, joins) that have no single originating table.
pub fn encode_column_definition(db: &str, table: &str, field: &Field) -> Vec<u8> {
	let mut out = Vec::new();
	write_lenenc_string(&mut out, b"def");
	write_lenenc_string(&mut out, db.as_bytes());
	write_lenenc_string(&mut out, table.as_bytes());
	write_lenenc_string(&mut out, table.as_bytes()); // org_table
	write_lenenc_string(&mut out, field.name.as_bytes());
	write_lenenc_string(&mut out, field.name.as_bytes()); // org_name
	write_lenenc_int(&mut out, 0x0c); // length of fixed-length fields below
	let charset = if matches!(field.data_type, DataType::Binary { .. } | DataType::Blob) { BINARY_CHARSET } else { DEFAULT_CHARSET as u16 };
	out.extend_from_slice(&charset.to_le_bytes());
	out.extend_from_slice(&column_length(&field.data_type).to_le_bytes());
	out.push(wire_type(&field.data_type));
	out.extend_from_slice(&column_flags(field).to_le_bytes());
	let decimals = match field.data_type {
		DataType::Decimal { scale, .. } => scale,
		_ => 0,
	};
	out.push(decimals);
	out.extend_from_slice(&[0u8, 0u8]); // filler
	out
}

pub fn encode_column_count(count: usize) -> Vec<u8> {
	let mut out = Vec::new();
	write_lenenc_int(&mut out, count as u64);
	out
}

/// Encodes one row under the text protocol (`COM_QUERY`'s result rows,
/// spec §4.7): every column is a length-encoded string regardless of its
/// logical type, with `NULL` given the dedicated `0xFB` marker.
pub fn encode_text_row(values: &[Value]) -> Vec<u8> {
	let mut out = Vec::new();
	for value in values {
		if value.is_null() {
			out.push(0xFB);
		} else {
			write_lenenc_string(&mut out, value.to_string().as_bytes());
		}
	}
	out
}

/// Encodes one row under the binary protocol (`COM_STMT_EXECUTE`'s result
/// rows, spec §4.7): a leading `0x00`, then a NULL bitmap offset by two
/// reserved bits, then a type-specific binary encoding of every non-NULL
/// column (spec's binary-protocol framing note in §C.1).
pub fn encode_binary_row(schema: &OutputSchema, values: &[Value]) -> Result<Vec<u8>> {
	if values.len() != schema.fields.len() {
		return Err(Error::Internal("row width does not match schema".to_string()));
	}
	let mut out = vec![0x00];
	let bitmap_len = (values.len() + 7 + 2) / 8;
	let mut bitmap = vec![0u8; bitmap_len];
	for (i, value) in values.iter().enumerate() {
		if value.is_null() {
			let bit = i + 2;
			bitmap[bit / 8] |= 1 << (bit % 8);
		}
	}
	out.extend_from_slice(&bitmap);

	for (field, value) in schema.fields.iter().zip(values) {
		if value.is_null() {
			continue;
		}
		encode_binary_value(&mut out, &field.data_type, value)?;
	}
	Ok(out)
}

fn encode_binary_value(out: &mut Vec<u8>, data_type: &DataType, value: &Value) -> Result<()> {
	match (data_type, value) {
		(_, Value::TinyInt(v)) => out.push(*v as u8),
		(_, Value::TinyUint(v)) => out.push(*v),
		(_, Value::Bool(v)) => out.push(*v as u8),
		(_, Value::SmallInt(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::SmallUint(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::Int(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::Uint(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::BigInt(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::BigUint(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::Float4(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::Float8(v)) => out.extend_from_slice(&v.to_le_bytes()),
		(_, Value::Date(d)) => encode_binary_date(out, d),
		(_, Value::Time(t)) => encode_binary_time(out, t),
		(_, Value::DateTime(dt)) => encode_binary_datetime(out, dt),
		// Decimal, JSON, text/binary blobs all travel as length-encoded
		// strings even under the binary protocol (true of real MySQL too:
		// `NEWDECIMAL`/`JSON`/`VAR_STRING`/`BLOB` are not fixed-width).
		(_, Value::Decimal(d)) => write_lenenc_string(out, d.to_string().as_bytes()),
		(_, Value::Varchar(s)) => write_lenenc_string(out, s.as_bytes()),
		(_, Value::Char(s)) => write_lenenc_string(out, s.as_bytes()),
		(_, Value::Binary(b)) => write_lenenc_string(out, b),
		(_, Value::Blob(b)) => write_lenenc_string(out, b),
		(_, Value::Json(j)) => write_lenenc_string(out, j.to_string().as_bytes()),
		(_, Value::Null) => unreachable!("NULL values are skipped by the caller via the null bitmap"),
	}
	Ok(())
}

fn encode_binary_date(out: &mut Vec<u8>, date: &chrono::NaiveDate) {
	use chrono::Datelike;
	out.push(4);
	out.extend_from_slice(&(date.year() as u16).to_le_bytes());
	out.push(date.month() as u8);
	out.push(date.day() as u8);
}

fn encode_binary_time(out: &mut Vec<u8>, time: &chrono::NaiveTime) {
	use chrono::Timelike;
	let micros = time.nanosecond() / 1000;
	if micros == 0 {
		out.push(8);
	} else {
		out.push(12);
	}
	out.push(0); // is_negative
	out.extend_from_slice(&0u32.to_le_bytes()); // days
	out.push(time.hour() as u8);
	out.push(time.minute() as u8);
	out.push(time.second() as u8);
	if micros != 0 {
		out.extend_from_slice(&micros.to_le_bytes());
	}
}

fn encode_binary_datetime(out: &mut Vec<u8>, dt: &chrono::NaiveDateTime) {
	use chrono::{Datelike, Timelike};
	let micros = dt.and_utc().timestamp_subsec_micros();
	let has_time = dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0 || micros != 0;
	if !has_time {
		out.push(4);
	} else if micros == 0 {
		out.push(7);
	} else {
		out.push(11);
	}
	out.extend_from_slice(&(dt.year() as u16).to_le_bytes());
	out.push(dt.month() as u8);
	out.push(dt.day() as u8);
	if has_time {
		out.push(dt.hour() as u8);
		out.push(dt.minute() as u8);
		out.push(dt.second() as u8);
		if micros != 0 {
			out.extend_from_slice(&micros.to_le_bytes());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn field(name: &str, data_type: DataType, nullable: bool) -> Field {
		Field { name: name.to_string(), data_type, nullable }
	}

	#[test]
	fn text_row_marks_null_with_the_dedicated_byte() {
		let encoded = encode_text_row(&[Value::Null, Value::BigInt(7)]);
		assert_eq!(encoded[0], 0xFB);
		assert_eq!(&encoded[1..], &{
			let mut v = Vec::new();
			write_lenenc_string(&mut v, b"7");
			v
		}[..]);
	}

	#[test]
	fn binary_row_sets_the_null_bitmap_bit_and_skips_encoding() {
		let schema = OutputSchema { fields: vec![field("a", DataType::BigInt { unsigned: false }, true), field("b", DataType::BigInt { unsigned: false }, true)] };
		let encoded = encode_binary_row(&schema, &[Value::Null, Value::BigInt(5)]).unwrap();
		assert_eq!(encoded[0], 0x00);
		// bitmap starts at byte 1; bit for column 0 is offset 2 -> byte 0, bit 2
		assert_eq!(encoded[1] & 0b0000_0100, 0b0000_0100);
	}

	#[test]
	fn binary_row_rejects_width_mismatch() {
		let schema = OutputSchema { fields: vec![field("a", DataType::Int { unsigned: false }, true)] };
		assert!(encode_binary_row(&schema, &[Value::Int(1), Value::Int(2)]).is_err());
	}

	#[test]
	fn column_definition_carries_the_not_null_flag() {
		let packet = encode_column_definition("db", "t", &field("id", DataType::Int { unsigned: false }, false));
		assert!(!packet.is_empty());
	}
}
