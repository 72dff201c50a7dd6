//! MySQL wire protocol handler (spec §4.7): packet framing, the V10
//! handshake and `mysql_native_password` authentication, command dispatch,
//! and result-set serialization (text protocol for `COM_QUERY`, binary
//! protocol for `COM_STMT_EXECUTE`). `wiscdb-exec` supplies the
//! `PlanNode` → `(schema, rows)` contract this crate serializes onto the
//! wire; everything upstream of that (SQL parsing/analysis/planning) is
//! out of this crate's scope (spec §1).

mod auth;
mod capability;
mod command;
mod connection;
mod error_map;
mod handshake;
mod ok;
mod packet;
mod prepared;
mod resultset;
mod server;
mod status;

pub use auth::{AuthProvider, AuthRegistry, CredentialStore, MysqlNativePassword, StaticCredentials};
pub use command::{decode_command, Command};
pub use connection::Connection;
pub use error_map::mysql_error_code;
pub use handshake::{decode_handshake_response, encode_handshake, generate_scramble, HandshakeResponse41, HandshakeV10, Scramble};
pub use ok::{encode_auth_failed, encode_eof, encode_err, encode_ok};
pub use packet::PacketChannel;
pub use prepared::{PreparedStatement, PreparedStatements};
pub use server::Server;

pub use wiscdb_core::{Error, Result};
