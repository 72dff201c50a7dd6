use rand::RngCore;

use wiscdb_core::{Error, Result};

use crate::capability::{self, default_server_capabilities};
use crate::packet::{write_nul_string, PayloadReader};
use crate::status::DEFAULT_CHARSET;

/// The 20-byte challenge sent in `HandshakeV10` (spec §4.7: "an 8+12 byte
/// salt split across two fields"), used as the scramble input to
/// `mysql_native_password`.
pub type Scramble = [u8; 20];

pub fn generate_scramble() -> Scramble {
	let mut scramble = [0u8; 20];
	rand::thread_rng().fill_bytes(&mut scramble);
	// NUL bytes are illegal inside the salt fields (they'd be read back
	// as string terminators), so nudge any into a safe ASCII range.
	for b in scramble.iter_mut() {
		if *b == 0 {
			*b = 1;
		}
	}
	scramble
}

/// Server's greeting, `HandshakeV10` (spec §4.7). Protocol version is
/// always `10`; the salt is transmitted split 8+12 across two packet
/// fields, a quirk of the original protocol this struct preserves on the
/// wire even though callers only ever see the combined 20-byte scramble.
pub struct HandshakeV10 {
	pub server_version: String,
	pub connection_id: u32,
	pub scramble: Scramble,
	pub capabilities: u32,
	pub charset: u8,
	pub status_flags: u16,
}

impl HandshakeV10 {
	pub fn new(server_version: String, connection_id: u32, scramble: Scramble) -> Self {
		HandshakeV10 {
			server_version,
			connection_id,
			scramble,
			capabilities: default_server_capabilities(),
			charset: DEFAULT_CHARSET,
			status_flags: crate::status::SERVER_STATUS_AUTOCOMMIT,
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::new();
		out.push(10); // protocol_version
		write_nul_string(&mut out, &self.server_version);
		out.extend_from_slice(&self.connection_id.to_le_bytes());
		out.extend_from_slice(&self.scramble[..8]);
		out.push(0); // filler
		let cap_lower = (self.capabilities & 0xFFFF) as u16;
		out.extend_from_slice(&cap_lower.to_le_bytes());
		out.push(self.charset);
		out.extend_from_slice(&self.status_flags.to_le_bytes());
		let cap_upper = ((self.capabilities >> 16) & 0xFFFF) as u16;
		out.extend_from_slice(&cap_upper.to_le_bytes());
		out.push(21); // auth-plugin-data-len: fixed at 21 for mysql_native_password's 20-byte scramble + NUL
		out.extend_from_slice(&[0u8; 10]); // reserved
		out.extend_from_slice(&self.scramble[8..]);
		out.push(0); // NUL terminator of the second salt part
		write_nul_string(&mut out, "mysql_native_password");
		out
	}
}

/// The client's reply, `HandshakeResponse41` (spec §4.7). Only the fields
/// the server actually consumes are kept; unrecognized connection
/// attributes (`CLIENT_CONNECT_ATTRS`) are parsed far enough to skip over,
/// never retained.
pub struct HandshakeResponse41 {
	pub capabilities: u32,
	pub max_packet_size: u32,
	pub charset: u8,
	pub username: String,
	pub auth_response: Vec<u8>,
	pub database: Option<String>,
	pub auth_plugin_name: Option<String>,
}

impl HandshakeResponse41 {
	pub fn decode(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let capabilities = reader.read_u32_le()?;
		let max_packet_size = reader.read_u32_le()?;
		let charset = reader.read_u8()?;
		reader.take(23)?; // reserved
		let username = reader.read_nul_string()?;

		let auth_response = if capability::has(capabilities, capability::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
			reader.read_lenenc_string()?
		} else {
			let len = reader.read_u8()? as usize;
			reader.take(len)?.to_vec()
		};

		let database = if capability::has(capabilities, capability::CLIENT_CONNECT_WITH_DB) {
			Some(reader.read_nul_string()?)
		} else {
			None
		};

		let auth_plugin_name = if capability::has(capabilities, capability::CLIENT_PLUGIN_AUTH) {
			Some(reader.read_nul_string()?)
		} else {
			None
		};

		Ok(HandshakeResponse41 { capabilities, max_packet_size, charset, username, auth_response, database, auth_plugin_name })
	}
}

/// Builds the 41-capable handshake greeting and parses the client's reply;
/// the actual credential check is `auth::AuthProvider`'s job so a second
/// plugin (spec §C.2's `caching_sha2_password` stub) can be registered
/// without this module changing.
pub fn encode_handshake(handshake: &HandshakeV10) -> Vec<u8> {
	handshake.encode()
}

pub fn decode_handshake_response(payload: &[u8]) -> Result<HandshakeResponse41> {
	if payload.len() < 32 {
		return Err(Error::SyntaxError { message: "handshake response too short".to_string() });
	}
	HandshakeResponse41::decode(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn handshake_v10_encodes_both_salt_halves() {
		let scramble = [7u8; 20];
		let handshake = HandshakeV10::new("8.0.34-wiscdb".to_string(), 42, scramble);
		let encoded = handshake.encode();
		assert_eq!(encoded[0], 10);
		assert!(encoded.windows(8).any(|w| w == &scramble[..8]));
	}
}
