use byteorder::{BigEndian, ByteOrder};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use wiscdb_type::{DataType, Decimal, Value};

use crate::error::{CodecError, Result};

// Every encoded value starts with a one-byte presence tag so NULL always
// sorts lower than any present value regardless of the underlying type's
// own encoding, matching `Value`'s own `PartialOrd` ("Null sorts lowest").
const TAG_NULL: u8 = 0x00;
const TAG_PRESENT: u8 = 0x01;

/// Encodes `value` so that unsigned byte-lexicographic comparison of the
/// output matches `value`'s own logical ordering — the "memcomparable"
/// property the catalog/row keyspace depends on to keep primary-key and
/// secondary-index scans in declared order without decoding every key
/// (testable invariant: key-order preservation).
///
/// Integers are sign-flipped and stored big-endian so two's-complement
/// ordering becomes unsigned ordering; variable-length byte strings are
/// escaped and null-terminated (`0x00` -> `0x00 0xFF`, terminator `0x00
/// 0x00`) so a short string never collides with, or sorts after, a longer
/// string that has it as a prefix.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>) {
	match value {
		Value::Null => buf.push(TAG_NULL),
		other => {
			buf.push(TAG_PRESENT);
			encode_present(other, buf);
		}
	}
}

fn encode_present(value: &Value, buf: &mut Vec<u8>) {
	match value {
		Value::Null => unreachable!("NULL is encoded by the caller before reaching encode_present"),
		Value::Bool(b) => buf.push(if *b { 1 } else { 0 }),
		Value::TinyInt(v) => encode_signed(*v as i64, 1, buf),
		Value::SmallInt(v) => encode_signed(*v as i64, 2, buf),
		Value::Int(v) => encode_signed(*v as i64, 4, buf),
		Value::BigInt(v) => encode_signed(*v, 8, buf),
		Value::TinyUint(v) => buf.push(*v),
		Value::SmallUint(v) => {
			let mut tmp = [0u8; 2];
			BigEndian::write_u16(&mut tmp, *v);
			buf.extend_from_slice(&tmp);
		}
		Value::Uint(v) => {
			let mut tmp = [0u8; 4];
			BigEndian::write_u32(&mut tmp, *v);
			buf.extend_from_slice(&tmp);
		}
		Value::BigUint(v) => {
			let mut tmp = [0u8; 8];
			BigEndian::write_u64(&mut tmp, *v);
			buf.extend_from_slice(&tmp);
		}
		Value::Float4(v) => encode_float_bits(v.to_bits() as u64, 4, buf),
		Value::Float8(v) => encode_float_bits(v.to_bits(), 8, buf),
		Value::Decimal(d) => encode_decimal(d, buf),
		Value::Varchar(s) | Value::Char(s) => encode_escaped(s.as_bytes(), buf),
		Value::Binary(b) | Value::Blob(b) => encode_escaped(b, buf),
		Value::Date(d) => encode_signed(days_from_epoch(d), 4, buf),
		Value::Time(t) => encode_time(t, buf),
		Value::DateTime(dt) => {
			encode_signed(days_from_epoch(&dt.date()), 4, buf);
			encode_time(&dt.time(), buf);
		}
		Value::Json(j) => encode_escaped(j.to_string().as_bytes(), buf),
	}
}

fn days_from_epoch(d: &NaiveDate) -> i64 {
	d.signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date")).num_days()
}

fn encode_time(t: &NaiveTime, buf: &mut Vec<u8>) {
	use chrono::Timelike;
	let nanos_since_midnight = t.num_seconds_from_midnight() as u64 * 1_000_000_000 + t.nanosecond() as u64;
	let mut tmp = [0u8; 8];
	BigEndian::write_u64(&mut tmp, nanos_since_midnight);
	buf.extend_from_slice(&tmp);
}

/// Sign-flip + big-endian: for an N-byte signed integer, flipping the sign
/// bit maps the two's-complement range onto the unsigned range in the same
/// relative order (standard memcomparable-integer trick).
fn encode_signed(v: i64, width: usize, buf: &mut Vec<u8>) {
	let unsigned = (v as u64) ^ (1u64 << 63);
	let mut tmp = [0u8; 8];
	BigEndian::write_u64(&mut tmp, unsigned);
	buf.extend_from_slice(&tmp[8 - width..]);
}

fn decode_signed(input: &[u8], width: usize) -> Result<i64> {
	if input.len() < width {
		return Err(CodecError::Truncated { what: "integer" });
	}
	let mut tmp = [0u8; 8];
	tmp[8 - width..].copy_from_slice(&input[..width]);
	let unsigned = BigEndian::read_u64(&tmp);
	Ok((unsigned ^ (1u64 << 63)) as i64)
}

/// IEEE-754 floats are memcomparable after flipping all bits for negatives
/// and just the sign bit for non-negatives (the standard float-to-sortable
/// -integer trick used by, e.g., CockroachDB's key encoding).
fn encode_float_bits(bits: u64, width: usize, buf: &mut Vec<u8>) {
	let mask = if (bits >> 63) & 1 == 1 { u64::MAX } else { 1u64 << 63 };
	let sortable = bits ^ mask;
	let mut tmp = [0u8; 8];
	BigEndian::write_u64(&mut tmp, sortable);
	buf.extend_from_slice(&tmp[8 - width..]);
}

fn decode_float_bits(input: &[u8], width: usize) -> Result<u64> {
	if input.len() < width {
		return Err(CodecError::Truncated { what: "float" });
	}
	let mut tmp = [0u8; 8];
	tmp[8 - width..].copy_from_slice(&input[..width]);
	let sortable = BigEndian::read_u64(&tmp);
	let mask = if (sortable >> 63) & 1 == 1 { 1u64 << 63 } else { u64::MAX };
	Ok(sortable ^ mask)
}

fn encode_decimal(d: &Decimal, buf: &mut Vec<u8>) {
	// i128's two's-complement order already matches numeric order once the
	// sign bit is flipped; scale is fixed per column so comparisons never
	// need to cross it at the byte level.
	let unsigned = (d.mantissa as u128) ^ (1u128 << 127);
	buf.extend_from_slice(&unsigned.to_be_bytes());
	buf.push(d.scale);
}

fn decode_decimal(input: &[u8]) -> Result<(Decimal, usize)> {
	if input.len() < 17 {
		return Err(CodecError::Truncated { what: "decimal" });
	}
	let mut tmp = [0u8; 16];
	tmp.copy_from_slice(&input[..16]);
	let unsigned = u128::from_be_bytes(tmp);
	let mantissa = (unsigned ^ (1u128 << 127)) as i128;
	let scale = input[16];
	Ok((Decimal::new(mantissa, scale), 17))
}

/// Escapes every `0x00` byte as `0x00 0xFF` and appends a `0x00 0x00`
/// terminator. Any string of a given length sorts immediately before any
/// longer string that extends it, because the terminator byte pair is
/// lexicographically smaller than either an escaped `0x00` or any real
/// non-zero continuation byte.
fn encode_escaped(bytes: &[u8], buf: &mut Vec<u8>) {
	for &b in bytes {
		buf.push(b);
		if b == 0x00 {
			buf.push(0xFF);
		}
	}
	buf.push(0x00);
	buf.push(0x00);
}

fn decode_escaped(input: &[u8]) -> Result<(Vec<u8>, usize)> {
	let mut out = Vec::new();
	let mut i = 0;
	loop {
		if i >= input.len() {
			return Err(CodecError::Truncated { what: "escaped byte string" });
		}
		let b = input[i];
		if b == 0x00 {
			if i + 1 >= input.len() {
				return Err(CodecError::Truncated { what: "escaped byte string" });
			}
			match input[i + 1] {
				0xFF => {
					out.push(0x00);
					i += 2;
				}
				0x00 => return Ok((out, i + 2)),
				_ => return Err(CodecError::Truncated { what: "escaped byte string" }),
			}
		} else {
			out.push(b);
			i += 1;
		}
	}
}

/// Decodes one value of `data_type` from the front of `input`, returning
/// the value and the number of bytes consumed (round-trip invariant:
/// `decode_value(&encode_value(v), v.data_type()) == (v, encoded_len)`).
pub fn decode_value(input: &[u8], data_type: &DataType) -> Result<(Value, usize)> {
	let Some(&tag) = input.first() else {
		return Err(CodecError::Truncated { what: "presence tag" });
	};
	let rest = &input[1..];
	match tag {
		TAG_NULL => Ok((Value::Null, 1)),
		TAG_PRESENT => {
			let (value, consumed) = decode_present(rest, data_type)?;
			Ok((value, consumed + 1))
		}
		other => Err(CodecError::UnknownTag { tag: other }),
	}
}

fn decode_present(input: &[u8], data_type: &DataType) -> Result<(Value, usize)> {
	match data_type {
		DataType::Bool => {
			let b = *input.first().ok_or(CodecError::Truncated { what: "bool" })?;
			Ok((Value::Bool(b != 0), 1))
		}
		DataType::TinyInt { unsigned: false } => Ok((Value::TinyInt(decode_signed(input, 1)? as i8), 1)),
		DataType::TinyInt { unsigned: true } => {
			Ok((Value::TinyUint(*input.first().ok_or(CodecError::Truncated { what: "tinyint unsigned" })?), 1))
		}
		DataType::SmallInt { unsigned: false } => Ok((Value::SmallInt(decode_signed(input, 2)? as i16), 2)),
		DataType::SmallInt { unsigned: true } => {
			if input.len() < 2 {
				return Err(CodecError::Truncated { what: "smallint unsigned" });
			}
			Ok((Value::SmallUint(BigEndian::read_u16(input)), 2))
		}
		DataType::Int { unsigned: false } => Ok((Value::Int(decode_signed(input, 4)? as i32), 4)),
		DataType::Int { unsigned: true } => {
			if input.len() < 4 {
				return Err(CodecError::Truncated { what: "int unsigned" });
			}
			Ok((Value::Uint(BigEndian::read_u32(input)), 4))
		}
		DataType::BigInt { unsigned: false } => Ok((Value::BigInt(decode_signed(input, 8)?), 8)),
		DataType::BigInt { unsigned: true } => {
			if input.len() < 8 {
				return Err(CodecError::Truncated { what: "bigint unsigned" });
			}
			Ok((Value::BigUint(BigEndian::read_u64(input)), 8))
		}
		DataType::Float4 => Ok((Value::Float4(f32::from_bits(decode_float_bits(input, 4)? as u32)), 4)),
		DataType::Float8 => Ok((Value::Float8(f64::from_bits(decode_float_bits(input, 8)?)), 8)),
		DataType::Decimal { .. } => {
			let (d, consumed) = decode_decimal(input)?;
			Ok((Value::Decimal(d), consumed))
		}
		DataType::Varchar { .. } => {
			let (bytes, consumed) = decode_escaped(input)?;
			Ok((Value::Varchar(String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?), consumed))
		}
		DataType::Char { .. } => {
			let (bytes, consumed) = decode_escaped(input)?;
			Ok((Value::Char(String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?), consumed))
		}
		DataType::Binary { .. } => {
			let (bytes, consumed) = decode_escaped(input)?;
			Ok((Value::Binary(bytes), consumed))
		}
		DataType::Blob => {
			let (bytes, consumed) = decode_escaped(input)?;
			Ok((Value::Blob(bytes), consumed))
		}
		DataType::Json => {
			let (bytes, consumed) = decode_escaped(input)?;
			let text = String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
			let json = serde_json::from_str(&text).map_err(|_| CodecError::TypeMismatch)?;
			Ok((Value::Json(json), consumed))
		}
		DataType::Date => {
			let days = decode_signed(input, 4)?;
			let date = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date") + chrono::Duration::days(days);
			Ok((Value::Date(date), 4))
		}
		DataType::Time => {
			let (time, consumed) = decode_time(input)?;
			Ok((Value::Time(time), consumed))
		}
		DataType::DateTime | DataType::Timestamp => {
			let days = decode_signed(input, 4)?;
			let date = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date") + chrono::Duration::days(days);
			let (time, time_len) = decode_time(&input[4..])?;
			let dt = NaiveDateTime::new(date, time);
			Ok((Value::DateTime(dt), 4 + time_len))
		}
	}
}

fn decode_time(input: &[u8]) -> Result<(NaiveTime, usize)> {
	if input.len() < 8 {
		return Err(CodecError::Truncated { what: "time" });
	}
	let nanos = BigEndian::read_u64(input);
	let secs = (nanos / 1_000_000_000) as u32;
	let nano = (nanos % 1_000_000_000) as u32;
	let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nano).ok_or(CodecError::TypeMismatch)?;
	Ok((time, 8))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	fn roundtrip(value: Value, data_type: DataType) {
		let mut buf = Vec::new();
		encode_value(&value, &mut buf);
		let (decoded, consumed) = decode_value(&buf, &data_type).unwrap();
		assert_eq!(consumed, buf.len());
		assert_eq!(decoded.partial_cmp(&value), Some(std::cmp::Ordering::Equal));
	}

	#[test]
	fn round_trips_every_primitive_type() {
		roundtrip(Value::Null, DataType::Int { unsigned: false });
		roundtrip(Value::Bool(true), DataType::Bool);
		roundtrip(Value::Int(-42), DataType::Int { unsigned: false });
		roundtrip(Value::BigInt(i64::MIN), DataType::BigInt { unsigned: false });
		roundtrip(Value::BigUint(u64::MAX), DataType::BigInt { unsigned: true });
		roundtrip(Value::Float8(-3.5), DataType::Float8);
		roundtrip(Value::Varchar("hello\0world".to_string()), DataType::Varchar { max_len: 255 });
		roundtrip(Value::Decimal(Decimal::new(-1234, 2)), DataType::Decimal { precision: 10, scale: 2 });
		roundtrip(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), DataType::Date);
	}

	#[test]
	fn integer_encoding_preserves_numeric_order() {
		let values = [i32::MIN, -100, -1, 0, 1, 100, i32::MAX];
		let mut encoded: Vec<Vec<u8>> = values
			.iter()
			.map(|v| {
				let mut buf = Vec::new();
				encode_value(&Value::Int(*v), &mut buf);
				buf
			})
			.collect();
		let original = encoded.clone();
		encoded.sort();
		assert_eq!(encoded, original, "byte order must match numeric order");
	}

	#[test]
	fn string_encoding_preserves_lexicographic_and_prefix_order() {
		let values = ["", "a", "aa", "ab", "b", "b\0"];
		let mut encoded: Vec<Vec<u8>> = values
			.iter()
			.map(|v| {
				let mut buf = Vec::new();
				encode_value(&Value::Varchar(v.to_string()), &mut buf);
				buf
			})
			.collect();
		let original = encoded.clone();
		encoded.sort();
		assert_eq!(encoded, original, "shorter strings must sort before extensions of themselves");
	}

	#[test]
	fn null_sorts_before_every_encoded_value() {
		let mut null_buf = Vec::new();
		encode_value(&Value::Null, &mut null_buf);
		let mut value_buf = Vec::new();
		encode_value(&Value::Int(i32::MIN), &mut value_buf);
		assert!(null_buf < value_buf);
	}
}
