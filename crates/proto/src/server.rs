use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use wiscdb_core::{ConnectionId, Deadline, Error, Result, ServerConfig};
use wiscdb_kv::Engine;
use wiscdb_sal::Sal;

use crate::auth::AuthRegistry;
use crate::connection::Connection;

/// Per-connection bookkeeping the registry keeps so `shutdown` can reach
/// every in-flight session (spec §5: "Connection registry: thread-safe map
/// from connection id to session; used by `KILL` ... and diagnostics").
struct Registered {
	deadline: Deadline,
	task: tokio::task::JoinHandle<()>,
}

/// Accept loop + connection registry (spec §4.7, §5). Owns the listening
/// socket and hands each accepted connection to its own `tokio` task,
/// bounded by `max_connections`. `E` is the storage engine type the whole
/// server is wired against — the binary instantiates this with
/// `wiscdb_kv::LsmEngine`, the reference implementation (spec §1).
pub struct Server<E: Engine> {
	sal: Arc<Sal<E>>,
	auth: Arc<AuthRegistry>,
	config: Arc<ServerConfig>,
	connections: Arc<DashMap<ConnectionId, Registered>>,
	next_connection_id: AtomicU32,
}

impl<E: Engine> Server<E> {
	pub fn new(sal: Arc<Sal<E>>, auth: AuthRegistry, config: Arc<ServerConfig>) -> Self {
		Server { sal, auth: Arc::new(auth), config, connections: Arc::new(DashMap::new()), next_connection_id: AtomicU32::new(1) }
	}

	/// Binds `config.listen_addr` and accepts connections until `shutdown_rx`
	/// fires (spec §6: "the core exposes `start(listen_addr)` and
	/// `shutdown(grace_period)`"). Each accepted connection is handed to its
	/// own task; connections beyond `max_connections` are refused with a
	/// resource error and the socket is closed (spec §7 "Resource errors").
	pub async fn serve(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
		let listener = TcpListener::bind(&self.config.listen_addr).await.map_err(|e| Error::storage(wiscdb_core::StorageErrorKind::Io, e))?;
		info!(addr = %self.config.listen_addr, "listening");

		loop {
			tokio::select! {
				accepted = listener.accept() => {
					match accepted {
						Ok((stream, peer)) => self.clone().spawn_connection(stream, peer),
						Err(e) => warn!(error = %e, "accept failed"),
					}
				}
				_ = shutdown_rx.changed() => {
					if *shutdown_rx.borrow() {
						break;
					}
				}
			}
		}
		Ok(())
	}

	fn spawn_connection(self: Arc<Self>, stream: TcpStream, peer: std::net::SocketAddr) {
		if self.connections.len() >= self.config.max_connections as usize {
			warn!(%peer, "refusing connection: max_connections reached");
			drop(stream); // closing without a reply is acceptable (spec §7 "Resource errors")
			return;
		}

		let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
		let deadline = Deadline::after(self.config.session_wait_timeout);
		let server = self.clone();

		let task = tokio::spawn(async move {
			let connection = Connection::new(
				stream,
				connection_id,
				server.auth.clone(),
				server.sal.clone(),
				server.config.server_version.clone(),
				server.config.session_wait_timeout,
				server.config.statement_timeout,
			);
			connection.run().await;
			server.connections.remove(&connection_id);
		});

		self.connections.insert(connection_id, Registered { deadline, task });
	}

	/// Delivers a session-level cancel signal to every registered
	/// connection (spec §5 "Cancellation & timeouts"), used during
	/// shutdown and available for an administrative `KILL`.
	pub fn cancel_connection(&self, connection_id: ConnectionId) {
		if let Some(entry) = self.connections.get(&connection_id) {
			entry.deadline.cancel();
		}
	}

	pub fn active_connection_count(&self) -> usize {
		self.connections.len()
	}

	/// Cancels every in-flight statement, waits up to `grace_period` for
	/// tasks to finish on their own, then aborts whatever remains (spec §6
	/// "shutdown: ... cancels idle sessions, waits up to the grace period
	/// for active statements, rolls back remaining txns"). Rollback on a
	/// forced abort happens inside `Connection::run`'s own drop path, not
	/// here, since an aborted task can't run further code.
	pub async fn shutdown(&self, grace_period: Duration) {
		for entry in self.connections.iter() {
			entry.deadline.cancel();
		}
		let deadline = tokio::time::Instant::now() + grace_period;
		loop {
			if self.connections.is_empty() {
				return;
			}
			if tokio::time::Instant::now() >= deadline {
				break;
			}
			tokio::time::sleep(Duration::from_millis(50)).await;
		}
		let remaining = self.connections.len();
		for entry in self.connections.iter() {
			entry.task.abort();
		}
		self.connections.clear();
		if remaining > 0 {
			error!(remaining, "forced shutdown of connections still active past the grace period");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wiscdb_kv::{EngineOptions, LsmEngine};

	use crate::auth::StaticCredentials;

	fn test_server() -> (tempfile::TempDir, Arc<Server<LsmEngine>>) {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::<LsmEngine>::open(dir.path(), EngineOptions::default()).unwrap());
		let auth = AuthRegistry::new(StaticCredentials::new().with_user("root", "hunter2"));
		let mut config = ServerConfig::default();
		config.listen_addr = "127.0.0.1:0".to_string();
		(dir, Arc::new(Server::new(sal, auth, Arc::new(config))))
	}

	#[tokio::test]
	async fn shutdown_with_no_connections_returns_immediately() {
		let (_dir, server) = test_server();
		let start = tokio::time::Instant::now();
		server.shutdown(Duration::from_secs(5)).await;
		assert!(start.elapsed() < Duration::from_secs(1));
	}

	#[tokio::test]
	async fn accept_loop_stops_on_shutdown_signal() {
		let (_dir, server) = test_server();
		let (tx, rx) = watch::channel(false);
		let handle = tokio::spawn(server.clone().serve(rx));
		tx.send(true).unwrap();
		tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
	}
}
