use wiscdb_core::Error;

use crate::error_map::mysql_error_code;
use crate::packet::{write_lenenc_int, write_lenenc_string};

/// Encodes an OK packet (spec §4.7: "affected rows, last insert id, status
/// flags, warning count").
pub fn encode_ok(affected_rows: u64, last_insert_id: u64, status_flags: u16, warnings: u16) -> Vec<u8> {
	let mut out = vec![0x00];
	write_lenenc_int(&mut out, affected_rows);
	write_lenenc_int(&mut out, last_insert_id);
	out.extend_from_slice(&status_flags.to_le_bytes());
	out.extend_from_slice(&warnings.to_le_bytes());
	out
}

/// Encodes an Err packet: `0xFF`, error code, `#` + SQLSTATE, then the
/// human-readable message (spec §4.7: "a SQLSTATE-like 5-char marker
/// prefixed by `#`").
pub fn encode_err(error: &Error) -> Vec<u8> {
	let (code, sqlstate) = mysql_error_code(error);
	let mut out = vec![0xFF];
	out.extend_from_slice(&code.to_le_bytes());
	out.push(b'#');
	out.extend_from_slice(sqlstate.as_bytes());
	out.extend_from_slice(error.to_string().as_bytes());
	out
}

/// Encodes an Err packet for authentication failure (spec §4.7: "else an
/// Err packet with code `1045`").
pub fn encode_auth_failed(username: &str) -> Vec<u8> {
	encode_err(&Error::AccessDenied { user: username.to_string() })
}

/// Encodes an EOF packet — only legal when the client hasn't negotiated
/// `CLIENT_DEPRECATE_EOF` (spec §C.1's dual framing).
pub fn encode_eof(status_flags: u16, warnings: u16) -> Vec<u8> {
	vec![0xFE, (warnings & 0xFF) as u8, (warnings >> 8) as u8, (status_flags & 0xFF) as u8, (status_flags >> 8) as u8]
}

/// Under `CLIENT_DEPRECATE_EOF`, the terminating packet of a result set is
/// an OK packet carrying the `0xFE` header byte instead of the usual
/// `0x00` (spec §C.1).
pub fn encode_ok_as_eof_replacement(affected_rows: u64, status_flags: u16, warnings: u16) -> Vec<u8> {
	let mut out = vec![0xFE];
	write_lenenc_int(&mut out, affected_rows);
	write_lenenc_int(&mut out, 0);
	out.extend_from_slice(&status_flags.to_le_bytes());
	out.extend_from_slice(&warnings.to_le_bytes());
	out
}

pub fn write_text_string(out: &mut Vec<u8>, value: &str) {
	write_lenenc_string(out, value.as_bytes());
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ok_packet_starts_with_the_ok_header_byte() {
		let packet = encode_ok(1, 0, 0x0002, 0);
		assert_eq!(packet[0], 0x00);
	}

	#[test]
	fn err_packet_carries_the_mapped_code_and_sqlstate() {
		let packet = encode_err(&Error::DuplicateKey { key_description: "1".to_string() });
		assert_eq!(packet[0], 0xFF);
		let code = u16::from_le_bytes([packet[1], packet[2]]);
		assert_eq!(code, 1062);
		assert_eq!(&packet[3..4], b"#");
		assert_eq!(&packet[4..9], b"23000");
	}
}
