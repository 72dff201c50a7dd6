use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, instrument, warn};

use wiscdb_core::{ConnectionId, Deadline, Error, Result};
use wiscdb_exec::{ExecOutcome, ExecSession, Executor, OutputSchema};
use wiscdb_kv::Engine;
use wiscdb_sal::Sal;
use wiscdb_type::Value;

use crate::auth::AuthRegistry;
use crate::command::{decode_command, Command};
use crate::handshake::{decode_handshake_response, encode_handshake, generate_scramble, HandshakeV10, Scramble};
use crate::ok::{encode_auth_failed, encode_err, encode_ok, encode_ok_as_eof_replacement};
use crate::packet::PacketChannel;
use crate::prepared::{decode_bound_params, substitute_placeholders, PreparedStatements};
use crate::resultset::{encode_binary_row, encode_column_count, encode_column_definition, encode_text_row};
use crate::status::status_flags;

/// One client connection's lifecycle: handshake, authentication, then the
/// command loop (spec §4.7). Generic over the storage engine for the same
/// reason `wiscdb_exec::ExecSession` is — the reference `LsmEngine` is the
/// only instantiation the server binary uses, but nothing here hardcodes it.
pub struct Connection<E: Engine, S> {
	packets: PacketChannel<S>,
	connection_id: ConnectionId,
	scramble: Scramble,
	auth: Arc<AuthRegistry>,
	sal: Arc<Sal<E>>,
	session: ExecSession<E>,
	prepared: PreparedStatements,
	username: String,
	server_version: String,
	wait_timeout: Duration,
	statement_timeout: Option<Duration>,
}

impl<E: Engine, S: AsyncRead + AsyncWrite + Unpin> Connection<E, S> {
	pub fn new(
		stream: S,
		connection_id: ConnectionId,
		auth: Arc<AuthRegistry>,
		sal: Arc<Sal<E>>,
		server_version: String,
		wait_timeout: Duration,
		statement_timeout: Option<Duration>,
	) -> Self {
		let session = ExecSession::new(sal.clone());
		Connection {
			packets: PacketChannel::new(stream),
			connection_id,
			scramble: generate_scramble(),
			auth,
			sal,
			session,
			prepared: PreparedStatements::new(),
			username: String::new(),
			server_version,
			wait_timeout,
			statement_timeout,
		}
	}

	/// Runs the handshake, then the command loop, until the client quits,
	/// sends an unrecoverable protocol error, or the connection drops.
	/// Any active transaction is rolled back on the way out (spec §4.7
	/// "Session state": "on QUIT or I/O error, any active txn is rolled
	/// back and resources freed").
	#[instrument(skip_all, fields(connection_id = self.connection_id))]
	pub async fn run(mut self) {
		if let Err(e) = self.handshake().await {
			warn!(error = %e, "handshake failed");
			return;
		}
		info!(user = %self.username, "authenticated");

		loop {
			self.packets.reset_sequence();
			let payload = match tokio::time::timeout(self.wait_timeout, self.packets.read_packet()).await {
				Ok(Ok(p)) => p,
				Ok(Err(_)) => break, // client disconnected or a transport error; nothing left to reply to
				Err(_) => {
					info!("closing idle connection past wait_timeout");
					break;
				}
			};
			match decode_command(&payload) {
				Ok(Command::Quit) => break,
				Ok(command) => {
					if self.dispatch(command).await.is_none() {
						break;
					}
				}
				Err(e) => {
					let _ = self.send_err(&e).await;
				}
			}
		}

		let _ = self.session.rollback_active_txn();
	}

	async fn handshake(&mut self) -> Result<()> {
		let greeting = HandshakeV10::new(self.server_version.clone(), self.connection_id, self.scramble);
		self.packets.write_packet(&encode_handshake(&greeting)).await?;

		let response_payload = self.packets.read_packet().await?;
		let response = decode_handshake_response(&response_payload)?;

		let authenticated =
			self.auth.authenticate(response.auth_plugin_name.as_deref(), &response.username, &self.scramble, &response.auth_response)?;
		if !authenticated {
			self.packets.write_packet(&encode_auth_failed(&response.username)).await?;
			return Err(Error::AccessDenied { user: response.username });
		}
		self.username = response.username.clone();

		if let Some(db) = &response.database {
			if let Err(e) = self.session.use_database(db) {
				self.packets.write_packet(&encode_err(&e)).await?;
				return Err(e);
			}
		}

		self.packets.write_packet(&encode_ok(0, 0, status_flags(false, self.session.autocommit()), 0)).await?;
		Ok(())
	}

	/// Dispatches one decoded command. Returns `None` when the connection
	/// should close (fatal I/O error mid-response); `Some(())` otherwise,
	/// including for statement-level errors that were successfully
	/// reported to the client.
	async fn dispatch(&mut self, command: Command) -> Option<()> {
		let result = match command {
			Command::Quit => unreachable!("Quit is handled by the caller before dispatch"),
			Command::Ping => self.reply_ok(0, 0).await,
			Command::InitDb(name) => self.handle_init_db(&name).await,
			Command::Query(sql) => self.handle_query(&sql).await,
			Command::StmtPrepare(sql) => self.handle_stmt_prepare(&sql).await,
			Command::StmtExecute { statement_id, payload_after_id } => self.handle_stmt_execute(statement_id, &payload_after_id).await,
			Command::StmtClose(id) => {
				self.prepared.close(id);
				Ok(()) // STMT_CLOSE gets no response at all (spec §C.1)
			}
			Command::ChangeUser { username, auth_response, database } => self.handle_change_user(&username, &auth_response, database.as_deref()).await,
			Command::Unsupported(code) => {
				self.send_err(&Error::SyntaxError { message: format!("unsupported command code 0x{code:02x}") }).await
			}
		};
		result.ok()?;
		Some(())
	}

	async fn handle_init_db(&mut self, name: &str) -> Result<()> {
		match self.session.use_database(name) {
			Ok(()) => self.reply_ok(0, 0).await,
			Err(e) => self.send_err(&e).await,
		}
	}

	async fn handle_change_user(&mut self, username: &str, auth_response: &[u8], database: Option<&str>) -> Result<()> {
		let authenticated = self.auth.authenticate(None, username, &self.scramble, auth_response)?;
		if !authenticated {
			self.packets.write_packet(&encode_auth_failed(username)).await?;
			return Err(Error::AccessDenied { user: username.to_string() });
		}
		self.username = username.to_string();
		self.session = ExecSession::new(self.sal.clone());
		self.prepared = PreparedStatements::new();
		if let Some(db) = database {
			self.session.use_database(db)?;
		}
		self.reply_ok(0, 0).await
	}

	async fn handle_query(&mut self, sql: &str) -> Result<()> {
		if let Some(reply) = self.try_handle_set(sql) {
			return if reply { self.reply_ok(0, 0).await } else { Ok(()) };
		}
		if self.try_handle_lock(sql) {
			return self.reply_ok(0, 0).await;
		}
		self.set_statement_deadline();
		match wiscdb_exec::frontend::parse_statement(sql) {
			Ok(plan) => match Executor::execute(&mut self.session, &plan) {
				Ok(outcome) => self.send_outcome(outcome, false).await,
				Err(e) => self.send_err(&e).await,
			},
			Err(e) => self.send_err(&e).await,
		}
	}

	async fn handle_stmt_prepare(&mut self, sql: &str) -> Result<()> {
		let id = self.prepared.prepare(sql.to_string());
		let param_count = self.prepared.get(id).expect("just inserted").param_count;
		let mut out = vec![0x00];
		out.extend_from_slice(&id.to_le_bytes());
		out.extend_from_slice(&0u16.to_le_bytes()); // num_columns: unknown until execute, see prepared.rs
		out.extend_from_slice(&param_count.to_le_bytes());
		out.push(0); // filler
		out.extend_from_slice(&0u16.to_le_bytes()); // warning_count
		self.packets.write_packet(&out).await?;
		Ok(())
	}

	async fn handle_stmt_execute(&mut self, statement_id: u32, payload: &[u8]) -> Result<()> {
		let statement = match self.prepared.get(statement_id) {
			Some(s) => s,
			None => return self.send_err(&Error::Internal(format!("unknown prepared statement id {statement_id}"))).await,
		};
		let param_count = statement.param_count;
		let sql_template = statement.sql.clone();

		// flags(1) + iteration_count(4) precede the bound-parameter section.
		if payload.len() < 5 {
			return self.send_err(&Error::SyntaxError { message: "STMT_EXECUTE payload too short".to_string() }).await;
		}
		let param_section = &payload[5..];
		let params = match decode_bound_params(param_section, param_count) {
			Ok(p) => p,
			Err(e) => return self.send_err(&e).await,
		};
		let sql = match substitute_placeholders(&sql_template, &params) {
			Ok(s) => s,
			Err(e) => return self.send_err(&e).await,
		};

		self.set_statement_deadline();
		match wiscdb_exec::frontend::parse_statement(&sql) {
			Ok(plan) => match Executor::execute(&mut self.session, &plan) {
				Ok(outcome) => self.send_outcome(outcome, true).await,
				Err(e) => self.send_err(&e).await,
			},
			Err(e) => self.send_err(&e).await,
		}
	}

	/// Intercepts session-variable assignments before they ever reach the
	/// SQL frontend (spec §6: `autocommit`, `sql_mode`, charset variables
	/// are proto-/session-owned state, not storage-affecting statements).
	/// Returns `None` when `sql` isn't a `SET` statement; `Some(true)` when
	/// handled and an OK reply is owed; `Some(false)` when already replied.
	fn try_handle_set(&mut self, sql: &str) -> Option<bool> {
		let trimmed = sql.trim();
		if !trimmed.get(..3)?.eq_ignore_ascii_case("SET") {
			return None;
		}
		let rest = trimmed[3..].trim();
		let lower = rest.to_ascii_lowercase();
		if let Some(value) = lower.strip_prefix("autocommit").map(str::trim).and_then(|s| s.strip_prefix('=')) {
			let on = matches!(value.trim(), "1" | "on" | "true");
			self.session.set_autocommit(on);
		}
		// `SET NAMES ...`, `SET SESSION sql_mode = ...`, and any other
		// session variable the core doesn't model are accepted and
		// ignored (spec §9: "source accepts them silently").
		Some(true)
	}

	/// `LOCK TABLES` / `UNLOCK TABLES` (spec §5's advisory-lock Open
	/// Question): accepted as a no-op. No pessimistic row/table locks
	/// exist in this engine, so granting the statement without blocking
	/// is the closest honest answer short of rejecting it outright.
	fn try_handle_lock(&self, sql: &str) -> bool {
		let trimmed = sql.trim();
		trimmed.len() >= 11 && trimmed[..11].eq_ignore_ascii_case("LOCK TABLES") || trimmed.eq_ignore_ascii_case("UNLOCK TABLES")
	}

	fn set_statement_deadline(&mut self) {
		let deadline = match self.statement_timeout {
			Some(timeout) => Deadline::after(timeout),
			None => Deadline::none(),
		};
		self.session.set_deadline(deadline);
	}

	async fn send_outcome(&mut self, outcome: ExecOutcome, binary_protocol: bool) -> Result<()> {
		match outcome {
			ExecOutcome::Done => self.reply_ok(0, 0).await,
			ExecOutcome::Affected { count, last_insert_id } => {
				let status = status_flags(self.session.in_explicit_txn(), self.session.autocommit());
				self.packets.write_packet(&encode_ok(count, last_insert_id.unwrap_or(0), status, 0)).await
			}
			ExecOutcome::Query { schema, rows } => self.send_result_set(&schema, &rows, binary_protocol).await,
		}
	}

	async fn send_result_set(&mut self, schema: &OutputSchema, rows: &[Vec<Value>], binary_protocol: bool) -> Result<()> {
		let db = self.session.current_database_name().unwrap_or("").to_string();
		self.packets.write_packet(&encode_column_count(schema.fields.len())).await?;
		for field in &schema.fields {
			self.packets.write_packet(&encode_column_definition(&db, "", field)).await?;
		}
		// `CLIENT_DEPRECATE_EOF` is always advertised (capability.rs), so
		// no EOF packet separates column definitions from rows.

		for row in rows {
			let encoded = if binary_protocol { encode_binary_row(schema, row)? } else { encode_text_row(row) };
			self.packets.write_packet(&encoded).await?;
		}

		let status = status_flags(self.session.in_explicit_txn(), self.session.autocommit());
		self.packets.write_packet(&encode_ok_as_eof_replacement(0, status, 0)).await
	}

	async fn reply_ok(&mut self, affected_rows: u64, last_insert_id: u64) -> Result<()> {
		let status = status_flags(self.session.in_explicit_txn(), self.session.autocommit());
		self.packets.write_packet(&encode_ok(affected_rows, last_insert_id, status, 0)).await
	}

	async fn send_err(&mut self, error: &Error) -> Result<()> {
		self.packets.write_packet(&encode_err(error)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wiscdb_kv::{EngineOptions, LsmEngine};

	use crate::auth::StaticCredentials;
	use crate::handshake::HandshakeResponse41;

	fn native_password_response(scramble: &Scramble, password: &str) -> Vec<u8> {
		use sha1::{Digest, Sha1};
		let stage1 = Sha1::digest(password.as_bytes());
		let stage2 = Sha1::digest(stage1);
		let mut hasher = Sha1::new();
		hasher.update(scramble);
		hasher.update(stage2);
		let mixed = hasher.finalize();
		stage1.iter().zip(mixed.iter()).map(|(a, b)| a ^ b).collect()
	}

	fn encode_handshake_response(username: &str, auth_response: &[u8]) -> Vec<u8> {
		use crate::packet::write_nul_string;
		let mut out = Vec::new();
		out.extend_from_slice(&crate::capability::default_server_capabilities().to_le_bytes());
		out.extend_from_slice(&(16 * 1024 * 1024u32).to_le_bytes());
		out.push(45);
		out.extend_from_slice(&[0u8; 23]);
		write_nul_string(&mut out, username);
		out.push(auth_response.len() as u8);
		out.extend_from_slice(auth_response);
		out
	}

	#[tokio::test]
	async fn full_handshake_then_ping_round_trips_over_a_duplex_stream() {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::<LsmEngine>::open(dir.path(), EngineOptions::default()).unwrap());
		let auth = Arc::new(AuthRegistry::new(StaticCredentials::new().with_user("root", "hunter2")));

		let (client, server) = tokio::io::duplex(8192);
		let connection = Connection::new(server, 1, auth, sal, "8.0.34-wiscdb".to_string(), Duration::from_secs(10), None);
		let handle = tokio::spawn(connection.run());

		let mut client_packets = PacketChannel::new(client);
		let greeting = client_packets.read_packet().await.unwrap();
		assert_eq!(greeting[0], 10);
		// salt's first half starts right after proto_version + server_version NUL + connection_id(4)
		let scramble_start = 1 + "8.0.34-wiscdb".len() + 1 + 4;
		let mut scramble = [0u8; 20];
		scramble[..8].copy_from_slice(&greeting[scramble_start..scramble_start + 8]);
		let second_half_start = scramble_start + 8 + 1 + 2 + 1 + 2 + 2 + 1 + 10;
		scramble[8..].copy_from_slice(&greeting[second_half_start..second_half_start + 12]);

		let response = encode_handshake_response("root", &native_password_response(&scramble, "hunter2"));
		client_packets.write_packet(&response).await.unwrap();

		let ok = client_packets.read_packet().await.unwrap();
		assert_eq!(ok[0], 0x00);

		client_packets.reset_sequence();
		client_packets.write_packet(&[crate::command::code::PING]).await.unwrap();
		let reply = client_packets.read_packet().await.unwrap();
		assert_eq!(reply[0], 0x00);

		client_packets.reset_sequence();
		client_packets.write_packet(&[crate::command::code::QUIT]).await.unwrap();
		drop(client_packets);
		handle.await.unwrap();
	}

	#[test]
	fn handshake_response_decodes_back_what_the_test_helper_encoded() {
		let response = encode_handshake_response("root", b"0123456789012345678\0"[..20].as_ref());
		let decoded = HandshakeResponse41::decode(&response).unwrap();
		assert_eq!(decoded.username, "root");
	}
}
