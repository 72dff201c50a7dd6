use thiserror::Error;

/// Errors raised by the KV engine (spec §4.1's per-operation error column).
#[derive(Debug, Error)]
pub enum KvError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("checksum mismatch reading {what} at offset {offset}: on-disk data is corrupt")]
	Corruption { what: &'static str, offset: u64 },

	#[error("transaction is read-only")]
	ReadOnly,

	#[error("value of {size} bytes exceeds the maximum entry size of {max} bytes")]
	SizeLimit { size: usize, max: usize },

	#[error("transaction conflict: a concurrently committed transaction wrote an overlapping key")]
	Conflict,

	#[error("another process holds the data directory lock at {path}")]
	LockHeld { path: String },

	#[error("engine is closed")]
	Closed,
}

pub type Result<T> = std::result::Result<T, KvError>;
