use thiserror::Error;

use wiscdb_type::TypeError;

/// The taxonomy shared by every layer (spec §7). Lower layers (`wiscdb-kv`,
/// `wiscdb-codec`) produce their own narrow error enums; `wiscdb-sal` and
/// above fold those into this one so that `wiscdb-proto` has a single place
/// to map errors onto MySQL error codes (spec §4.7's mandatory table).
///
/// Each variant that wraps a lower-layer error keeps it as `#[source]` so
/// the full cause chain survives up to the protocol layer's logging, even
/// though only `kind()` is used for wire-level error codes.
#[derive(Debug, Error)]
pub enum Error {
	#[error("unknown database '{name}'")]
	UnknownDatabase { name: String },

	#[error("unknown table '{name}'")]
	UnknownTable { name: String },

	#[error("database '{name}' already exists")]
	DatabaseExists { name: String },

	#[error("table '{name}' already exists")]
	TableExists { name: String },

	#[error("duplicate entry for key '{key_description}'")]
	DuplicateKey { key_description: String },

	#[error("access denied for user '{user}'")]
	AccessDenied { user: String },

	#[error("syntax error: {message}")]
	SyntaxError { message: String },

	#[error("lock wait timeout exceeded")]
	LockWaitTimeout,

	#[error("deadlock found when trying to get lock; try restarting transaction")]
	TransactionConflict,

	#[error("column '{column}' cannot be null")]
	NotNull { column: String },

	#[error("check constraint '{name}' violated")]
	CheckFailed { name: String },

	#[error(transparent)]
	TypeMismatch(#[from] TypeError),

	#[error("table '{name}' was dropped")]
	TableDropped { name: String },

	#[error("row not found")]
	RowNotFound,

	#[error("nested transactions are not supported; commit or rollback the active transaction first")]
	NestedTransactionsNotSupported,

	#[error("current transaction is aborted due to a previous error ({cause}); issue ROLLBACK")]
	TransactionAborted { cause: String },

	#[error("query cancelled")]
	QueryCancelled,

	#[error("storage error: {kind}")]
	Storage {
		kind: StorageErrorKind,
		#[source]
		cause: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("internal error: {0}")]
	Internal(String),
}

/// Sub-classification for `Error::Storage`, matching spec §7's "Resource
/// errors" / "Fatal storage errors" split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
	Io,
	Corruption,
	DiskFull,
	TooManyConnections,
	MemoryLimit,
}

impl std::fmt::Display for StorageErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			StorageErrorKind::Io => "io",
			StorageErrorKind::Corruption => "corruption",
			StorageErrorKind::DiskFull => "disk full",
			StorageErrorKind::TooManyConnections => "too many connections",
			StorageErrorKind::MemoryLimit => "memory limit exceeded",
		};
		write!(f, "{s}")
	}
}

impl Error {
	pub fn storage(kind: StorageErrorKind, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
		Error::Storage { kind, cause: Box::new(cause) }
	}

	/// True once a fatal storage error (corruption) has been observed;
	/// the caller should refuse further writes and downgrade to
	/// read-only (spec §7 "Fatal storage errors").
	pub fn is_fatal_storage(&self) -> bool {
		matches!(self, Error::Storage { kind: StorageErrorKind::Corruption, .. })
	}
}

pub type Result<T> = std::result::Result<T, Error>;
