use serde::{Deserialize, Serialize};

/// The logical type of a column, mirroring the widths MySQL clients expect
/// on the wire (see `wiscdb-proto`'s column-definition packet).
///
/// Variants are ordered so that their discriminant can double as a stable
/// on-disk schema tag (`wiscdb-codec` relies on `as u8` never changing for
/// an existing variant — new types are appended, never inserted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
	Bool = 0,
	TinyInt { unsigned: bool } = 1,
	SmallInt { unsigned: bool } = 2,
	Int { unsigned: bool } = 3,
	BigInt { unsigned: bool } = 4,
	Float4 = 5,
	Float8 = 6,
	Decimal { precision: u8, scale: u8 } = 7,
	Varchar { max_len: u32 } = 8,
	Char { len: u32 } = 9,
	Binary { max_len: u32 } = 10,
	Date = 11,
	Time = 12,
	DateTime = 13,
	Timestamp = 14,
	Json = 15,
	Blob = 16,
}

impl DataType {
	/// Whether values of this type participate in order-preserving key
	/// encoding (spec §4.2 invariant ii). JSON and BLOB are stored only in
	/// row values, never as part of a primary key or index key.
	pub fn is_order_preserving(&self) -> bool {
		!matches!(self, DataType::Json | DataType::Blob)
	}

	/// Whether an `AUTO_INCREMENT` column of this type is legal (spec §3:
	/// "auto_increment only on integer primary-key columns").
	pub fn is_integer(&self) -> bool {
		matches!(
			self,
			DataType::TinyInt { .. }
				| DataType::SmallInt { .. }
				| DataType::Int { .. }
				| DataType::BigInt { .. }
		)
	}

	pub fn name(&self) -> &'static str {
		match self {
			DataType::Bool => "BOOL",
			DataType::TinyInt { unsigned: false } => "TINYINT",
			DataType::TinyInt { unsigned: true } => "TINYINT UNSIGNED",
			DataType::SmallInt { unsigned: false } => "SMALLINT",
			DataType::SmallInt { unsigned: true } => "SMALLINT UNSIGNED",
			DataType::Int { unsigned: false } => "INT",
			DataType::Int { unsigned: true } => "INT UNSIGNED",
			DataType::BigInt { unsigned: false } => "BIGINT",
			DataType::BigInt { unsigned: true } => "BIGINT UNSIGNED",
			DataType::Float4 => "FLOAT",
			DataType::Float8 => "DOUBLE",
			DataType::Decimal { .. } => "DECIMAL",
			DataType::Varchar { .. } => "VARCHAR",
			DataType::Char { .. } => "CHAR",
			DataType::Binary { .. } => "VARBINARY",
			DataType::Date => "DATE",
			DataType::Time => "TIME",
			DataType::DateTime => "DATETIME",
			DataType::Timestamp => "TIMESTAMP",
			DataType::Json => "JSON",
			DataType::Blob => "BLOB",
		}
	}
}

impl std::fmt::Display for DataType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			DataType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
			DataType::Varchar { max_len } => write!(f, "VARCHAR({max_len})"),
			DataType::Char { len } => write!(f, "CHAR({len})"),
			DataType::Binary { max_len } => write!(f, "VARBINARY({max_len})"),
			_ => write!(f, "{}", self.name()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn auto_increment_allowed_only_on_integers() {
		assert!(DataType::BigInt { unsigned: false }.is_integer());
		assert!(!DataType::Varchar { max_len: 32 }.is_integer());
		assert!(!DataType::Decimal { precision: 10, scale: 2 }.is_integer());
	}

	#[test]
	fn json_and_blob_are_not_order_preserving() {
		assert!(!DataType::Json.is_order_preserving());
		assert!(!DataType::Blob.is_order_preserving());
		assert!(DataType::Int { unsigned: false }.is_order_preserving());
	}
}
