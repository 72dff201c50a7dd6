use thiserror::Error;

/// Errors raised while validating or converting typed values.
///
/// `STRICT_TRANS_TABLES` semantics (see SPEC_FULL.md §D) require these to be
/// surfaced to the caller rather than silently truncating or coercing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
	#[error("value out of range for {type_name}: {value}")]
	OutOfRange { type_name: &'static str, value: String },

	#[error("string of length {actual} exceeds max length {max} for column")]
	StringTooLong { actual: usize, max: u32 },

	#[error("binary of length {actual} exceeds max length {max} for column")]
	BinaryTooLong { actual: usize, max: u32 },

	#[error("decimal with {actual} fractional digits exceeds scale {scale}")]
	DecimalScaleExceeded { actual: u8, scale: u8 },

	#[error("decimal with {actual} digits exceeds precision {precision}")]
	DecimalPrecisionExceeded { actual: u8, precision: u8 },

	#[error("cannot convert {from} to {to}")]
	Incompatible { from: &'static str, to: &'static str },

	#[error("invalid literal for {type_name}: {literal}")]
	InvalidLiteral { type_name: &'static str, literal: String },

	#[error("NULL not allowed for this column")]
	NotNull,
}

pub type Result<T> = std::result::Result<T, TypeError>;
