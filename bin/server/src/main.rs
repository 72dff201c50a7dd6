//! Server binary: loads configuration, opens the reference LSM storage
//! engine, and runs the MySQL-protocol listener until shutdown (spec §6
//! "Exit / lifecycle"). Everything here is wiring — the actual protocol,
//! execution, and storage logic lives in `wiscdb-proto`, `wiscdb-exec`, and
//! `wiscdb-sal`/`wiscdb-kv`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wiscdb_core::ServerConfig;
use wiscdb_kv::{Engine, EngineOptions, LsmEngine};
use wiscdb_proto::{AuthRegistry, Server, StaticCredentials};
use wiscdb_sal::Sal;

/// Command-line flags. Deliberately thin (spec §1 lists "CLI tooling" as an
/// external collaborator, not core scope): only what's needed to locate a
/// config file and override its two most commonly-changed settings without
/// editing the file.
#[derive(Parser)]
#[command(name = "wiscdb-server", version, about = "MySQL-wire-compatible server backed by a log-structured KV engine")]
struct Args {
	/// Path to a TOML config file (spec §9: "explicit typed config struct").
	/// When absent, built-in defaults plus `WISCDB_*` env overrides apply.
	#[arg(long)]
	config: Option<PathBuf>,

	#[arg(long)]
	listen_addr: Option<String>,

	#[arg(long)]
	data_dir: Option<PathBuf>,

	/// Grace period for in-flight statements on shutdown (spec §6).
	#[arg(long, default_value = "30")]
	shutdown_grace_seconds: u64,
}

#[tokio::main]
async fn main() {
	let args = Args::parse();

	let mut config = match &args.config {
		Some(path) => match confy::load_path::<ServerConfig>(path) {
			Ok(cfg) => cfg,
			Err(e) => {
				eprintln!("failed to load config from {}: {e}", path.display());
				std::process::exit(1);
			}
		},
		None => ServerConfig::default(),
	};
	if let Some(listen_addr) = args.listen_addr {
		config.listen_addr = listen_addr;
	}
	if let Some(data_dir) = args.data_dir {
		config.data_dir = data_dir;
	}
	config = match config.apply_env_overrides() {
		Ok(c) => c,
		Err(e) => {
			eprintln!("invalid environment override: {e}");
			std::process::exit(1);
		}
	};

	init_tracing(&config.log_level);
	info!(listen_addr = %config.listen_addr, data_dir = %config.data_dir.display(), "starting wiscdb-server");

	let engine_opts = EngineOptions {
		sync_writes: config.sync_writes,
		value_log_threshold: config.value_log_threshold,
		..EngineOptions::default()
	};
	let sal = match Sal::<LsmEngine>::open(&config.data_dir, engine_opts) {
		Ok(sal) => Arc::new(sal),
		Err(e) => {
			error!(error = %e, "failed to open storage engine");
			std::process::exit(1);
		}
	};

	let auth = AuthRegistry::new(root_credentials());
	let config = Arc::new(config);
	let server = Arc::new(Server::new(sal.clone(), auth, config.clone()));

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let serve_handle = tokio::spawn(server.clone().serve(shutdown_rx));

	wait_for_shutdown_signal().await;
	info!("shutdown signal received");
	let _ = shutdown_tx.send(true);
	let _ = serve_handle.await;

	server.shutdown(Duration::from_secs(args.shutdown_grace_seconds)).await;

	match Arc::try_unwrap(sal) {
		Ok(sal) => {
			if let Err(e) = sal.engine().clone().close() {
				error!(error = %e, "error flushing storage engine on shutdown");
			}
		}
		Err(_) => error!("storage engine still has outstanding references at shutdown; manifest flush skipped"),
	}
	info!("shutdown complete");
}

/// Credentials for the `root` user (spec §4.7's handshake/auth). No user
/// management surface exists yet (SPEC_FULL.md's Non-goals); a single
/// statically-configured account, empty password unless overridden, mirrors
/// a fresh MySQL install's default `root@localhost` account closely enough
/// for the wire-compatible clients this core targets.
fn root_credentials() -> StaticCredentials {
	let password = std::env::var("WISCDB_ROOT_PASSWORD").unwrap_or_default();
	StaticCredentials::new().with_user("root", password)
}

fn init_tracing(default_level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		let _ = tokio::signal::ctrl_c().await;
	};
	#[cfg(unix)]
	let terminate = async {
		let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler");
		signal.recv().await;
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}
}
