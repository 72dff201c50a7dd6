use wiscdb_core::{Error, StorageErrorKind};
use wiscdb_kv::KvError;

/// Folds a lower-layer KV error into the shared `wiscdb_core::Error`
/// taxonomy, the boundary spec §7 designates for collapsing per-crate error
/// types into the one `wiscdb-proto` maps to MySQL error codes.
pub fn map_kv_err(e: KvError) -> Error {
	match e {
		KvError::Conflict => Error::TransactionConflict,
		KvError::Corruption { .. } => Error::storage(StorageErrorKind::Corruption, e),
		KvError::ReadOnly => Error::Internal("attempted write through a read-only transaction".to_string()),
		KvError::SizeLimit { size, max } => {
			Error::Internal(format!("value of {size} bytes exceeds the maximum of {max} bytes"))
		}
		other => Error::storage(StorageErrorKind::Io, other),
	}
}

pub fn map_codec_err(e: wiscdb_codec::CodecError) -> Error {
	Error::Internal(format!("row codec error: {e}"))
}
