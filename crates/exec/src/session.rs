use std::sync::Arc;

use wiscdb_core::{Deadline, DatabaseId, Error, Result};
use wiscdb_kv::Engine;
use wiscdb_sal::Sal;
use wiscdb_txn::SessionTxn;

/// Per-connection execution state: the session's transaction (spec §4.5),
/// its currently selected database (`USE`), and the cooperative deadline
/// its row iterators check between yields (spec §5). One `ExecSession` per
/// `wiscdb-proto` connection.
pub struct ExecSession<E: Engine> {
	pub(crate) sal: Arc<Sal<E>>,
	pub(crate) txn: SessionTxn<E>,
	current_database: Option<DatabaseId>,
	current_database_name: Option<String>,
	deadline: Deadline,
}

impl<E: Engine> ExecSession<E> {
	pub fn new(sal: Arc<Sal<E>>) -> Self {
		let engine = sal.engine().clone();
		ExecSession { sal, txn: SessionTxn::new(engine), current_database: None, current_database_name: None, deadline: Deadline::none() }
	}

	pub fn use_database(&mut self, name: &str) -> Result<()> {
		let db = self.sal.get_database(name)?;
		self.current_database = Some(db.id);
		self.current_database_name = Some(db.name);
		Ok(())
	}

	pub fn current_database_id(&self) -> Result<DatabaseId> {
		self.current_database.ok_or_else(|| Error::Internal("no database selected".to_string()))
	}

	pub fn current_database_name(&self) -> Option<&str> {
		self.current_database_name.as_deref()
	}

	pub fn set_deadline(&mut self, deadline: Deadline) {
		self.deadline = deadline;
	}

	pub fn deadline(&self) -> &Deadline {
		&self.deadline
	}

	pub fn autocommit(&self) -> bool {
		self.txn.autocommit()
	}

	pub fn set_autocommit(&mut self, on: bool) {
		self.txn.set_autocommit(on);
	}

	pub fn in_explicit_txn(&self) -> bool {
		self.txn.is_active()
	}

	/// Rolls back any open explicit transaction. Called when a connection
	/// drops (spec §4.7: "on QUIT or I/O error, any active txn is rolled
	/// back"); a no-op when autocommit already closed out the last
	/// statement's one-shot transaction.
	pub fn rollback_active_txn(&mut self) -> Result<()> {
		if self.in_explicit_txn() {
			self.txn.rollback()?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wiscdb_kv::{EngineOptions, LsmEngine};

	#[test]
	fn use_unknown_database_fails() {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::open(dir.path(), EngineOptions::default()).unwrap());
		let mut session = ExecSession::new(sal);
		assert!(matches!(session.use_database("nope"), Err(Error::UnknownDatabase { .. })));
	}

	#[test]
	fn use_existing_database_sets_current() {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::open(dir.path(), EngineOptions::default()).unwrap());
		sal.create_database("app").unwrap();
		let mut session = ExecSession::new(sal);
		session.use_database("app").unwrap();
		assert_eq!(session.current_database_name(), Some("app"));
	}
}
