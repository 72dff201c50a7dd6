use std::collections::HashMap;

use wiscdb_core::{Error, Result};
use wiscdb_type::Value;

use crate::packet::PayloadReader;

/// A server-side prepared statement (spec §4.7's `STMT_PREPARE`/
/// `STMT_EXECUTE`/`STMT_CLOSE`).
///
/// This workspace's SQL frontend (`wiscdb_exec::frontend`) has no notion of
/// bound parameters — it only parses complete statement text (spec §9's
/// open question: "implementations should state which path they take").
/// `wiscdb-proto` takes the **translate-to-text** path: a prepared
/// statement is stored as SQL text with its `?` placeholders counted up
/// front, and `STMT_EXECUTE` splices the bound parameters back in as SQL
/// literals before handing the result to the same `frontend::parse_statement`
/// path `COM_QUERY` uses. The wire-level difference from `COM_QUERY` is
/// entirely in the result-set encoding (binary rows, see `resultset.rs`),
/// not in how the statement is analyzed.
pub struct PreparedStatement {
	pub sql: String,
	pub param_count: u16,
}

/// Per-connection table of prepared statements, keyed by the server-chosen
/// statement id (spec §4.7: "active prepared statements keyed by stmt-id").
#[derive(Default)]
pub struct PreparedStatements {
	next_id: u32,
	statements: HashMap<u32, PreparedStatement>,
}

impl PreparedStatements {
	pub fn new() -> Self {
		PreparedStatements { next_id: 1, statements: HashMap::new() }
	}

	pub fn prepare(&mut self, sql: String) -> u32 {
		let id = self.next_id;
		self.next_id += 1;
		let param_count = count_placeholders(&sql) as u16;
		self.statements.insert(id, PreparedStatement { sql, param_count });
		id
	}

	pub fn get(&self, id: u32) -> Option<&PreparedStatement> {
		self.statements.get(&id)
	}

	pub fn close(&mut self, id: u32) {
		self.statements.remove(&id);
	}
}

/// Counts `?` placeholders outside of quoted string literals, so a literal
/// question mark inside `'...'`/`"..."` isn't mistaken for a bind parameter.
fn count_placeholders(sql: &str) -> usize {
	let mut count = 0;
	let mut chars = sql.chars().peekable();
	let mut quote: Option<char> = None;
	while let Some(c) = chars.next() {
		match quote {
			Some(q) if c == q => quote = None,
			Some(_) => {}
			None if c == '\'' || c == '"' => quote = Some(c),
			None if c == '?' => count += 1,
			None => {}
		}
	}
	count
}

/// Splices `params` into `sql`'s `?` placeholders, in order, rendering each
/// bound value as a SQL literal (spec §4.7's binary-protocol bind values,
/// translated into the text path `frontend::parse_statement` understands).
pub fn substitute_placeholders(sql: &str, params: &[Value]) -> Result<String> {
	let mut out = String::with_capacity(sql.len());
	let mut chars = sql.chars().peekable();
	let mut quote: Option<char> = None;
	let mut param_iter = params.iter();
	while let Some(c) = chars.next() {
		match quote {
			Some(q) if c == q => {
				quote = None;
				out.push(c);
			}
			Some(_) => out.push(c),
			None if c == '\'' || c == '"' => {
				quote = Some(c);
				out.push(c);
			}
			None if c == '?' => {
				let value = param_iter.next().ok_or_else(|| Error::SyntaxError { message: "not enough bound parameters for placeholders".to_string() })?;
				out.push_str(&literal(value));
			}
			None => out.push(c),
		}
	}
	if param_iter.next().is_some() {
		return Err(Error::SyntaxError { message: "too many bound parameters for placeholders".to_string() });
	}
	Ok(out)
}

fn literal(value: &Value) -> String {
	match value {
		Value::Null => "NULL".to_string(),
		Value::Varchar(s) | Value::Char(s) => format!("'{}'", s.replace('\'', "''")),
		Value::Binary(b) | Value::Blob(b) => format!("'{}'", String::from_utf8_lossy(b).replace('\'', "''")),
		Value::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
		other => other.to_string(),
	}
}

/// Decodes `STMT_EXECUTE`'s bound-parameter section (spec §4.7): a NULL
/// bitmap, a new-types-bound flag, an optional per-parameter type tag, then
/// each non-NULL value encoded per its declared wire type. Types the server
/// never declared (since there's no prior analysis pass) are whatever the
/// client chooses to send — the same latitude real `libmysqlclient`-based
/// drivers rely on.
pub fn decode_bound_params(payload: &[u8], param_count: u16) -> Result<Vec<Value>> {
	if param_count == 0 {
		return Ok(Vec::new());
	}
	let mut reader = PayloadReader::new(payload);
	let bitmap_len = (param_count as usize + 7) / 8;
	let bitmap = reader.take(bitmap_len)?.to_vec();
	let is_null = |i: usize| bitmap[i / 8] & (1 << (i % 8)) != 0;

	let new_params_bound = reader.read_u8()?;
	let mut types = Vec::with_capacity(param_count as usize);
	if new_params_bound == 1 {
		for _ in 0..param_count {
			let wire_type = reader.read_u8()?;
			let unsigned = reader.read_u8()? != 0;
			types.push((wire_type, unsigned));
		}
	}

	let mut values = Vec::with_capacity(param_count as usize);
	for i in 0..param_count as usize {
		if is_null(i) {
			values.push(Value::Null);
			continue;
		}
		let (wire_type, unsigned) = types.get(i).copied().unwrap_or((0xfd, false)); // default: treat as string
		values.push(decode_bound_value(&mut reader, wire_type, unsigned)?);
	}
	Ok(values)
}

fn decode_bound_value(reader: &mut PayloadReader<'_>, wire_type: u8, unsigned: bool) -> Result<Value> {
	let value = match wire_type {
		0x01 => {
			let byte = reader.read_u8()?;
			if unsigned { Value::TinyUint(byte) } else { Value::TinyInt(byte as i8) }
		}
		0x02 => {
			let bytes = reader.take(2)?;
			let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
			if unsigned { Value::SmallUint(raw) } else { Value::SmallInt(raw as i16) }
		}
		0x03 | 0x09 => {
			let raw = reader.read_u32_le()?;
			if unsigned { Value::Uint(raw) } else { Value::Int(raw as i32) }
		}
		0x08 => {
			let bytes = reader.take(8)?;
			let raw = u64::from_le_bytes(bytes.try_into().expect("exactly 8 bytes"));
			if unsigned { Value::BigUint(raw) } else { Value::BigInt(raw as i64) }
		}
		0x04 => {
			let bytes = reader.take(4)?;
			Value::Float4(f32::from_le_bytes(bytes.try_into().expect("exactly 4 bytes")))
		}
		0x05 => {
			let bytes = reader.take(8)?;
			Value::Float8(f64::from_le_bytes(bytes.try_into().expect("exactly 8 bytes")))
		}
		// Every other wire type (strings, blobs, decimals, JSON, dates sent
		// as text) travels as a length-encoded string; the substitution
		// step re-parses it through the normal SQL literal grammar.
		_ => Value::Varchar(String::from_utf8_lossy(&reader.read_lenenc_string()?).into_owned()),
	};
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_placeholders_outside_string_literals() {
		assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b = '?'"), 1);
	}

	#[test]
	fn substitutes_in_declaration_order() {
		let sql = "INSERT INTO t VALUES (?, ?)";
		let out = substitute_placeholders(sql, &[Value::Int(1), Value::Varchar("x".to_string())]).unwrap();
		assert_eq!(out, "INSERT INTO t VALUES (1, 'x')");
	}

	#[test]
	fn escapes_single_quotes_in_string_parameters() {
		let out = substitute_placeholders("SELECT ?", &[Value::Varchar("it's".to_string())]).unwrap();
		assert_eq!(out, "SELECT 'it''s'");
	}

	#[test]
	fn rejects_mismatched_param_counts() {
		assert!(substitute_placeholders("SELECT ?, ?", &[Value::Int(1)]).is_err());
		assert!(substitute_placeholders("SELECT ?", &[Value::Int(1), Value::Int(2)]).is_err());
	}

	#[test]
	fn registry_assigns_increasing_ids_and_tracks_param_count() {
		let mut registry = PreparedStatements::new();
		let id = registry.prepare("SELECT * FROM t WHERE a = ?".to_string());
		assert_eq!(registry.get(id).unwrap().param_count, 1);
		registry.close(id);
		assert!(registry.get(id).is_none());
	}
}
