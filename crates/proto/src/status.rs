#![allow(dead_code)]

/// Server status flags carried in OK/EOF packets (spec §4.7's result-set
/// framing: "server status flags including `SERVER_STATUS_IN_TRANS`").
pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
pub const SERVER_STATUS_NO_INDEX_USED: u16 = 0x0020;
pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
pub const SERVER_STATUS_LAST_ROW_SENT: u16 = 0x0080;

/// Default connection character set: utf8mb4 (spec §4.7 "default character
/// set (utf8mb4)"). `45` is `utf8mb4_general_ci` — chosen over the newer
/// `utf8mb4_0900_ai_ci` (255) since 45 is understood by every client back
/// to MySQL 5.5, and the handshake's single collation byte has no room to
/// negotiate per-client.
pub const DEFAULT_CHARSET: u8 = 45;

/// Builds the status flags for an OK/EOF packet given the session's
/// current transaction and autocommit state.
pub fn status_flags(in_explicit_txn: bool, autocommit: bool) -> u16 {
	let mut flags = 0u16;
	if in_explicit_txn {
		flags |= SERVER_STATUS_IN_TRANS;
	}
	if autocommit {
		flags |= SERVER_STATUS_AUTOCOMMIT;
	}
	flags
}
