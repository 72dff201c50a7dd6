#![allow(dead_code)]

/// Client/server capability flags negotiated during the handshake (spec
/// §4.7). Only the subset spec.md calls out as mandatory is advertised by
/// `Handshake::default_server_capabilities`; the rest are defined so a
/// client's `HandshakeResponse41.capabilities` can be inspected bit-by-bit
/// without magic numbers scattered through the handshake code.
pub const CLIENT_LONG_PASSWORD: u32 = 1;
pub const CLIENT_FOUND_ROWS: u32 = 1 << 1;
pub const CLIENT_LONG_FLAG: u32 = 1 << 2;
pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
pub const CLIENT_NO_SCHEMA: u32 = 1 << 4;
pub const CLIENT_COMPRESS: u32 = 1 << 5;
pub const CLIENT_ODBC: u32 = 1 << 6;
pub const CLIENT_LOCAL_FILES: u32 = 1 << 7;
pub const CLIENT_IGNORE_SPACE: u32 = 1 << 8;
pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
pub const CLIENT_INTERACTIVE: u32 = 1 << 10;
pub const CLIENT_SSL: u32 = 1 << 11;
pub const CLIENT_IGNORE_SIGPIPE: u32 = 1 << 12;
pub const CLIENT_TRANSACTIONS: u32 = 1 << 13;
pub const CLIENT_RESERVED: u32 = 1 << 14;
pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
pub const CLIENT_MULTI_STATEMENTS: u32 = 1 << 16;
pub const CLIENT_MULTI_RESULTS: u32 = 1 << 17;
pub const CLIENT_PS_MULTI_RESULTS: u32 = 1 << 18;
pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;
pub const CLIENT_CONNECT_ATTRS: u32 = 1 << 20;
pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 1 << 21;
pub const CLIENT_CAN_HANDLE_EXPIRED_PASSWORDS: u32 = 1 << 22;
pub const CLIENT_SESSION_TRACK: u32 = 1 << 23;
pub const CLIENT_DEPRECATE_EOF: u32 = 1 << 24;

/// Capabilities this server is willing to speak (spec §4.7: "advertising at
/// least" this set). `CLIENT_DEPRECATE_EOF` is offered but not forced —
/// whether the dual-framing code path (spec §C.1) uses EOF or OK packets
/// depends on whether the client echoes it back in `HandshakeResponse41`.
pub fn default_server_capabilities() -> u32 {
	CLIENT_PROTOCOL_41
		| CLIENT_PLUGIN_AUTH
		| CLIENT_SECURE_CONNECTION
		| CLIENT_CONNECT_WITH_DB
		| CLIENT_TRANSACTIONS
		| CLIENT_MULTI_RESULTS
		| CLIENT_LONG_PASSWORD
		| CLIENT_LONG_FLAG
		| CLIENT_DEPRECATE_EOF
}

pub fn has(flags: u32, flag: u32) -> bool {
	flags & flag != 0
}
