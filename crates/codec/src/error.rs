use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
	#[error("unexpected end of input decoding {what}")]
	Truncated { what: &'static str },

	#[error("invalid utf-8 in encoded varchar/char value")]
	InvalidUtf8,

	#[error("tag byte {tag:#x} does not match any known value encoding")]
	UnknownTag { tag: u8 },

	#[error("decoded value does not fit the expected data type")]
	TypeMismatch,
}

pub type Result<T> = std::result::Result<T, CodecError>;
