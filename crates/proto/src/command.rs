use wiscdb_core::{Error, Result};

use crate::packet::PayloadReader;

/// Command codes the server dispatches on (spec §4.7's command-loop table).
/// Named constants rather than an exhaustive `Command` enum variant per
/// code so an unrecognized code (anything not in the table) falls through
/// to a single "unsupported command" branch instead of needing a match arm
/// added for every code MySQL has ever defined.
pub mod code {
	pub const QUIT: u8 = 0x01;
	pub const INIT_DB: u8 = 0x02;
	pub const QUERY: u8 = 0x03;
	pub const PING: u8 = 0x0E;
	pub const CHANGE_USER: u8 = 0x11;
	pub const STMT_PREPARE: u8 = 0x16;
	pub const STMT_EXECUTE: u8 = 0x17;
	pub const STMT_CLOSE: u8 = 0x19;
}

/// A decoded client command (spec §4.7). `StmtExecute` keeps the raw
/// bound-parameter bytes rather than typed `Value`s: decoding them needs the
/// prepared statement's placeholder count, which only `Connection` (holding
/// the prepared-statement registry) knows.
pub enum Command {
	Quit,
	InitDb(String),
	Query(String),
	Ping,
	ChangeUser { username: String, auth_response: Vec<u8>, database: Option<String> },
	StmtPrepare(String),
	StmtExecute { statement_id: u32, payload_after_id: Vec<u8> },
	StmtClose(u32),
	Unsupported(u8),
}

/// Decodes one command packet's payload (spec §4.7: "reads a one-byte
/// command code followed by arguments").
pub fn decode_command(payload: &[u8]) -> Result<Command> {
	if payload.is_empty() {
		return Err(Error::SyntaxError { message: "empty command packet".to_string() });
	}
	let code = payload[0];
	let args = &payload[1..];
	match code {
		code::QUIT => Ok(Command::Quit),
		code::INIT_DB => Ok(Command::InitDb(String::from_utf8_lossy(args).into_owned())),
		code::QUERY => Ok(Command::Query(String::from_utf8_lossy(args).into_owned())),
		code::PING => Ok(Command::Ping),
		code::STMT_PREPARE => Ok(Command::StmtPrepare(String::from_utf8_lossy(args).into_owned())),
		code::STMT_CLOSE => {
			let mut reader = PayloadReader::new(args);
			Ok(Command::StmtClose(reader.read_u32_le()?))
		}
		code::STMT_EXECUTE => {
			let mut reader = PayloadReader::new(args);
			let statement_id = reader.read_u32_le()?;
			Ok(Command::StmtExecute { statement_id, payload_after_id: reader.read_remaining().to_vec() })
		}
		code::CHANGE_USER => decode_change_user(args),
		other => Ok(Command::Unsupported(other)),
	}
}

fn decode_change_user(args: &[u8]) -> Result<Command> {
	let mut reader = PayloadReader::new(args);
	let username = reader.read_nul_string()?;
	let len = reader.read_u8()? as usize;
	let auth_response = reader.take(len)?.to_vec();
	let database = reader.read_nul_string().ok().filter(|s| !s.is_empty());
	Ok(Command::ChangeUser { username, auth_response, database })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_query_text_after_the_command_byte() {
		let mut payload = vec![code::QUERY];
		payload.extend_from_slice(b"SELECT 1");
		match decode_command(&payload).unwrap() {
			Command::Query(sql) => assert_eq!(sql, "SELECT 1"),
			_ => panic!("expected a Query command"),
		}
	}

	#[test]
	fn unknown_code_becomes_unsupported_rather_than_an_error() {
		match decode_command(&[0xAB]).unwrap() {
			Command::Unsupported(code) => assert_eq!(code, 0xAB),
			_ => panic!("expected Unsupported"),
		}
	}

	#[test]
	fn empty_payload_is_a_syntax_error() {
		assert!(decode_command(&[]).is_err());
	}
}
