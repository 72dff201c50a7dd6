use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{Result, TypeError};

/// A fixed-scale decimal: `mantissa * 10^-scale`. Chosen over a floating
/// representation so that codec encoding (spec §4.2: "decimals as
/// fixed-scale biased integers") is exact and order-preserving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Decimal {
	pub mantissa: i128,
	pub scale: u8,
}

impl Decimal {
	pub fn new(mantissa: i128, scale: u8) -> Self {
		Decimal { mantissa, scale }
	}

	pub fn digits(&self) -> u8 {
		let abs = self.mantissa.unsigned_abs();
		if abs == 0 { 1 } else { (abs.ilog10() + 1) as u8 }
	}
}

impl std::fmt::Display for Decimal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let scale = self.scale as u32;
		let divisor = 10i128.pow(scale);
		let negative = self.mantissa < 0;
		let abs = self.mantissa.unsigned_abs();
		let whole = abs / divisor as u128;
		let frac = abs % divisor as u128;
		let sign = if negative { "-" } else { "" };
		if scale == 0 {
			write!(f, "{sign}{whole}")
		} else {
			write!(f, "{sign}{whole}.{:0width$}", frac, width = scale as usize)
		}
	}
}

/// A runtime row value, one variant per [`DataType`].
///
/// `PartialOrd` reflects the *logical* ordering spec §4.2 invariant (ii)
/// requires the codec's byte encoding to preserve; it is the ground truth
/// the codec's property tests compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
	Null,
	Bool(bool),
	TinyInt(i8),
	SmallInt(i16),
	Int(i32),
	BigInt(i64),
	TinyUint(u8),
	SmallUint(u16),
	Uint(u32),
	BigUint(u64),
	Float4(f32),
	Float8(f64),
	Decimal(Decimal),
	Varchar(String),
	Char(String),
	Binary(Vec<u8>),
	Date(NaiveDate),
	Time(NaiveTime),
	DateTime(NaiveDateTime),
	Json(serde_json::Value),
	Blob(Vec<u8>),
}

impl Value {
	pub fn data_type(&self) -> Option<DataType> {
		match self {
			Value::Null => None,
			Value::Bool(_) => Some(DataType::Bool),
			Value::TinyInt(_) => Some(DataType::TinyInt { unsigned: false }),
			Value::SmallInt(_) => Some(DataType::SmallInt { unsigned: false }),
			Value::Int(_) => Some(DataType::Int { unsigned: false }),
			Value::BigInt(_) => Some(DataType::BigInt { unsigned: false }),
			Value::TinyUint(_) => Some(DataType::TinyInt { unsigned: true }),
			Value::SmallUint(_) => Some(DataType::SmallInt { unsigned: true }),
			Value::Uint(_) => Some(DataType::Int { unsigned: true }),
			Value::BigUint(_) => Some(DataType::BigInt { unsigned: true }),
			Value::Float4(_) => Some(DataType::Float4),
			Value::Float8(_) => Some(DataType::Float8),
			Value::Decimal(d) => Some(DataType::Decimal { precision: d.digits().max(1), scale: d.scale }),
			Value::Varchar(s) => Some(DataType::Varchar { max_len: s.len() as u32 }),
			Value::Char(s) => Some(DataType::Char { len: s.len() as u32 }),
			Value::Binary(b) => Some(DataType::Binary { max_len: b.len() as u32 }),
			Value::Date(_) => Some(DataType::Date),
			Value::Time(_) => Some(DataType::Time),
			Value::DateTime(_) => Some(DataType::DateTime),
			Value::Json(_) => Some(DataType::Json),
			Value::Blob(_) => Some(DataType::Blob),
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Coerce an integer-shaped value into an i64, used by the executor
	/// when evaluating auto-increment comparisons (spec §4.6).
	pub fn as_i64(&self) -> Result<i64> {
		match self {
			Value::TinyInt(v) => Ok(*v as i64),
			Value::SmallInt(v) => Ok(*v as i64),
			Value::Int(v) => Ok(*v as i64),
			Value::BigInt(v) => Ok(*v),
			Value::TinyUint(v) => Ok(*v as i64),
			Value::SmallUint(v) => Ok(*v as i64),
			Value::Uint(v) => Ok(*v as i64),
			Value::BigUint(v) => i64::try_from(*v)
				.map_err(|_| TypeError::OutOfRange { type_name: "BIGINT", value: v.to_string() }),
			other => Err(TypeError::Incompatible { from: other.data_type().map(|t| t.name()).unwrap_or("NULL"), to: "BIGINT" }),
		}
	}

	/// Reshapes a literal into the exact variant `data_type` requires,
	/// rejecting it under `STRICT_TRANS_TABLES` semantics (SPEC_FULL.md §D)
	/// instead of silently truncating. The SQL frontend parses every
	/// integer literal as `BigInt` and every string literal as `Varchar`
	/// regardless of the target column's declared width, so this is the
	/// one place that width/length/scale is actually enforced before a row
	/// reaches the codec — `wiscdb-codec::encode_row` trusts the `Value`'s
	/// own variant to match the column's declared type exactly.
	pub fn coerce(self, data_type: &DataType) -> Result<Value> {
		if self.is_null() {
			return Ok(self);
		}
		match (self, data_type) {
			(Value::Bool(b), DataType::Bool) => Ok(Value::Bool(b)),
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::TinyInt { unsigned: false }) => {
				let n = v.as_i64()?;
				i8::try_from(n).map(Value::TinyInt).map_err(|_| TypeError::OutOfRange { type_name: "TINYINT", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::TinyInt { unsigned: true }) => {
				let n = v.as_i64()?;
				u8::try_from(n).map(Value::TinyUint).map_err(|_| TypeError::OutOfRange { type_name: "TINYINT UNSIGNED", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::SmallInt { unsigned: false }) => {
				let n = v.as_i64()?;
				i16::try_from(n).map(Value::SmallInt).map_err(|_| TypeError::OutOfRange { type_name: "SMALLINT", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::SmallInt { unsigned: true }) => {
				let n = v.as_i64()?;
				u16::try_from(n).map(Value::SmallUint).map_err(|_| TypeError::OutOfRange { type_name: "SMALLINT UNSIGNED", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::Int { unsigned: false }) => {
				let n = v.as_i64()?;
				i32::try_from(n).map(Value::Int).map_err(|_| TypeError::OutOfRange { type_name: "INT", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::Int { unsigned: true }) => {
				let n = v.as_i64()?;
				u32::try_from(n).map(Value::Uint).map_err(|_| TypeError::OutOfRange { type_name: "INT UNSIGNED", value: n.to_string() })
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::BigInt { unsigned: false }) => {
				Ok(Value::BigInt(v.as_i64()?))
			}
			(v @ (Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)), DataType::BigInt { unsigned: true }) => {
				let n = v.as_i64()?;
				u64::try_from(n).map(Value::BigUint).map_err(|_| TypeError::OutOfRange { type_name: "BIGINT UNSIGNED", value: n.to_string() })
			}
			(Value::TinyUint(n), DataType::BigInt { unsigned: true }) => Ok(Value::BigUint(n as u64)),
			(Value::SmallUint(n), DataType::BigInt { unsigned: true }) => Ok(Value::BigUint(n as u64)),
			(Value::Uint(n), DataType::BigInt { unsigned: true }) => Ok(Value::BigUint(n as u64)),
			(Value::BigUint(n), DataType::BigInt { unsigned: true }) => Ok(Value::BigUint(n)),
			(Value::Float4(f), DataType::Float4) => Ok(Value::Float4(f)),
			(Value::Float8(f), DataType::Float4) => Ok(Value::Float4(f as f32)),
			(Value::Float4(f), DataType::Float8) => Ok(Value::Float8(f as f64)),
			(Value::Float8(f), DataType::Float8) => Ok(Value::Float8(f)),
			(Value::Decimal(d), DataType::Decimal { precision, scale }) => {
				let rescaled = if d.scale == *scale {
					d
				} else if d.scale < *scale {
					Decimal::new(d.mantissa * 10i128.pow((*scale - d.scale) as u32), *scale)
				} else {
					let drop = d.scale - *scale;
					Decimal::new(d.mantissa / 10i128.pow(drop as u32), *scale)
				};
				if rescaled.digits() > *precision {
					return Err(TypeError::DecimalPrecisionExceeded { actual: rescaled.digits(), precision: *precision });
				}
				Ok(Value::Decimal(rescaled))
			}
			(Value::Varchar(s), DataType::Varchar { max_len }) | (Value::Varchar(s), DataType::Char { len: max_len }) => {
				if s.len() as u32 > *max_len {
					return Err(TypeError::StringTooLong { actual: s.len(), max: *max_len });
				}
				Ok(if matches!(data_type, DataType::Char { .. }) { Value::Char(s) } else { Value::Varchar(s) })
			}
			(Value::Binary(b), DataType::Binary { max_len }) | (Value::Blob(b), DataType::Binary { max_len }) => {
				if b.len() as u32 > *max_len {
					return Err(TypeError::BinaryTooLong { actual: b.len(), max: *max_len });
				}
				Ok(Value::Binary(b))
			}
			(Value::Binary(b), DataType::Blob) | (Value::Blob(b), DataType::Blob) => Ok(Value::Blob(b)),
			(Value::Json(j), DataType::Json) => Ok(Value::Json(j)),
			(Value::Date(d), DataType::Date) => Ok(Value::Date(d)),
			(Value::Time(t), DataType::Time) => Ok(Value::Time(t)),
			(Value::DateTime(dt), DataType::DateTime) => Ok(Value::DateTime(dt)),
			(Value::DateTime(dt), DataType::Timestamp) => Ok(Value::DateTime(dt)),
			(v, dt) => Err(TypeError::Incompatible { from: v.data_type().map(|t| t.name()).unwrap_or("NULL"), to: dt.name() }),
		}
	}
}

/// Cross-variant ordering used only where the comparison is well-defined:
/// NULLs sort lowest (MySQL `ORDER BY` default), then within a type family
/// by the natural numeric/lexicographic order. Comparisons across unrelated
/// families (e.g. `Varchar` vs `Int`) are `None` — the caller (executor or
/// codec test) is responsible for only comparing same-column values.
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.partial_cmp(other) == Some(std::cmp::Ordering::Equal)
	}
}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		use std::cmp::Ordering;
		use Value::*;
		match (self, other) {
			(Null, Null) => Some(Ordering::Equal),
			(Null, _) => Some(Ordering::Less),
			(_, Null) => Some(Ordering::Greater),
			(Bool(a), Bool(b)) => a.partial_cmp(b),
			(TinyInt(a), TinyInt(b)) => a.partial_cmp(b),
			(SmallInt(a), SmallInt(b)) => a.partial_cmp(b),
			(Int(a), Int(b)) => a.partial_cmp(b),
			(BigInt(a), BigInt(b)) => a.partial_cmp(b),
			(TinyUint(a), TinyUint(b)) => a.partial_cmp(b),
			(SmallUint(a), SmallUint(b)) => a.partial_cmp(b),
			(Uint(a), Uint(b)) => a.partial_cmp(b),
			(BigUint(a), BigUint(b)) => a.partial_cmp(b),
			(Float4(a), Float4(b)) => a.partial_cmp(b),
			(Float8(a), Float8(b)) => a.partial_cmp(b),
			(Decimal(a), Decimal(b)) => {
				// normalize scales before comparing mantissas
				let (am, bm) = equalize_scale(*a, *b);
				am.partial_cmp(&bm)
			}
			(Varchar(a), Varchar(b)) => a.partial_cmp(b),
			(Char(a), Char(b)) => a.partial_cmp(b),
			(Binary(a), Binary(b)) => a.partial_cmp(b),
			(Date(a), Date(b)) => a.partial_cmp(b),
			(Time(a), Time(b)) => a.partial_cmp(b),
			(DateTime(a), DateTime(b)) => a.partial_cmp(b),
			(Blob(a), Blob(b)) => a.partial_cmp(b),
			_ => None,
		}
	}
}

fn equalize_scale(a: crate::value::Decimal, b: crate::value::Decimal) -> (i128, i128) {
	if a.scale == b.scale {
		(a.mantissa, b.mantissa)
	} else if a.scale < b.scale {
		(a.mantissa * 10i128.pow((b.scale - a.scale) as u32), b.mantissa)
	} else {
		(a.mantissa, b.mantissa * 10i128.pow((a.scale - b.scale) as u32))
	}
}

/// Renders a value the way the MySQL text protocol expects every column
/// (regardless of logical type) to travel the wire: as a length-encoded
/// string. `NULL` is handled separately by the caller (a distinct null-bitmap
/// bit, not an empty string), so this impl is never asked to render `Null`.
impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => write!(f, "NULL"),
			Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
			Value::TinyInt(v) => write!(f, "{v}"),
			Value::SmallInt(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::BigInt(v) => write!(f, "{v}"),
			Value::TinyUint(v) => write!(f, "{v}"),
			Value::SmallUint(v) => write!(f, "{v}"),
			Value::Uint(v) => write!(f, "{v}"),
			Value::BigUint(v) => write!(f, "{v}"),
			Value::Float4(v) => write!(f, "{v}"),
			Value::Float8(v) => write!(f, "{v}"),
			Value::Decimal(d) => write!(f, "{d}"),
			Value::Varchar(s) => write!(f, "{s}"),
			Value::Char(s) => write!(f, "{s}"),
			Value::Binary(b) => write!(f, "{}", String::from_utf8_lossy(b)),
			Value::Date(d) => write!(f, "{d}"),
			Value::Time(t) => write!(f, "{t}"),
			Value::DateTime(dt) => write!(f, "{dt}"),
			Value::Json(j) => write!(f, "{j}"),
			Value::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_sorts_before_everything() {
		assert!(Value::Null < Value::Int(i32::MIN));
	}

	#[test]
	fn decimal_compares_across_scales() {
		let a = Value::Decimal(Decimal::new(150, 2)); // 1.50
		let b = Value::Decimal(Decimal::new(2, 0)); // 2
		assert!(a < b);
		let c = Value::Decimal(Decimal::new(150, 2));
		let d = Value::Decimal(Decimal::new(15, 1)); // 1.5 == 1.50
		assert_eq!(c, d);
	}

	#[test]
	fn decimal_display() {
		assert_eq!(Decimal::new(150, 2).to_string(), "1.50");
		assert_eq!(Decimal::new(-150, 2).to_string(), "-1.50");
	}

	#[test]
	fn coerce_narrows_the_parsers_bigint_literal_to_the_columns_declared_width() {
		let coerced = Value::BigInt(42).coerce(&DataType::Int { unsigned: false }).unwrap();
		assert_eq!(coerced, Value::Int(42));
	}

	#[test]
	fn coerce_rejects_an_out_of_range_literal() {
		let err = Value::BigInt(1000).coerce(&DataType::TinyInt { unsigned: false });
		assert!(matches!(err, Err(TypeError::OutOfRange { .. })));
	}

	#[test]
	fn coerce_rejects_a_string_too_long_for_its_column() {
		let err = Value::Varchar("hello world".to_string()).coerce(&DataType::Varchar { max_len: 5 });
		assert!(matches!(err, Err(TypeError::StringTooLong { .. })));
	}

	#[test]
	fn coerce_passes_null_through_untouched() {
		assert!(Value::Null.coerce(&DataType::Int { unsigned: false }).unwrap().is_null());
	}

	#[test]
	fn value_display_matches_text_protocol_expectations() {
		assert_eq!(Value::BigInt(42).to_string(), "42");
		assert_eq!(Value::Varchar("pear".to_string()).to_string(), "pear");
		assert_eq!(Value::Bool(true).to_string(), "1");
		assert_eq!(Value::Decimal(Decimal::new(150, 2)).to_string(), "1.50");
	}
}
