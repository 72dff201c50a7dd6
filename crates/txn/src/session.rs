use wiscdb_core::{Deadline, Error, Result};
use wiscdb_kv::{Engine, Txn};

/// The visible state of a session's current transaction (spec §4.5's
/// session transaction state table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
	/// No explicit transaction is open. Each statement runs in its own
	/// implicit, auto-committing transaction when `autocommit` is true, or
	/// is rejected as needing an explicit `BEGIN` when it's false and no
	/// transaction is active (mirrors `mysql`'s own `autocommit=0`
	/// behavior, where the first statement implicitly opens one instead).
	Idle,
	/// A transaction opened by `BEGIN`/`START TRANSACTION` is in progress.
	Active,
	/// A statement inside an explicit transaction failed; the transaction
	/// stays open (so `ROLLBACK` still has something to discard) but every
	/// further statement is rejected until `ROLLBACK` (spec §4.6/§7:
	/// "errors inside an explicit transaction mark it error-only").
	Failed,
}

/// One client session's transaction state machine, wrapping at most one
/// `wiscdb_kv::Txn` at a time. `wiscdb-exec` calls `statement_txn` before
/// running a statement's plan and `end_statement` after, so the same type
/// implements both autocommit and explicit-transaction semantics without
/// the executor needing to know which mode it's in.
pub struct SessionTxn<E: Engine> {
	engine: E,
	state: TxnState,
	current: Option<Txn>,
	autocommit: bool,
	/// The message of the statement error that moved an explicit
	/// transaction into `TxnState::Failed`, kept so `commit` can report it
	/// back (spec §7: "COMMIT on an error-only txn ... returns an Err
	/// indicating the original cause").
	failure_cause: Option<String>,
}

impl<E: Engine> SessionTxn<E> {
	pub fn new(engine: E) -> Self {
		SessionTxn { engine, state: TxnState::Idle, current: None, autocommit: true, failure_cause: None }
	}

	pub fn state(&self) -> TxnState {
		self.state
	}

	pub fn autocommit(&self) -> bool {
		self.autocommit
	}

	pub fn set_autocommit(&mut self, on: bool) {
		self.autocommit = on;
	}

	/// True while an explicit transaction is open, whether still healthy
	/// (`Active`) or error-only (`Failed`) — both keep `SERVER_STATUS_IN_TRANS`
	/// set on the wire (spec §4.7) since `ROLLBACK` is still required to
	/// close either one out.
	pub fn is_active(&self) -> bool {
		matches!(self.state, TxnState::Active | TxnState::Failed)
	}

	/// Opens an explicit transaction. Nested `BEGIN` without an
	/// intervening `COMMIT`/`ROLLBACK` is rejected rather than silently
	/// ignored or implicitly committing the outer one, since MySQL's own
	/// behavior here (implicit commit of the prior transaction) is easy to
	/// mis-rely on; spec §4.5 calls for rejecting nested transactions
	/// outright. An error-only transaction also rejects `BEGIN`: it still
	/// needs an explicit `ROLLBACK` first, same as any other statement.
	pub fn begin(&mut self) -> Result<()> {
		if self.is_active() {
			return Err(Error::NestedTransactionsNotSupported);
		}
		self.current = Some(self.engine.begin(false).map_err(map_kv_err)?);
		self.state = TxnState::Active;
		Ok(())
	}

	/// Commits the active transaction. On an error-only (`Failed`)
	/// transaction, this instead discards it and returns
	/// `Error::TransactionAborted` carrying the statement error that
	/// caused the failure — `COMMIT` on a failed transaction behaves like
	/// `ROLLBACK` plus that error (spec §7).
	pub fn commit(&mut self) -> Result<()> {
		if self.state == TxnState::Failed {
			let cause = self.failure_cause.take().unwrap_or_default();
			if let Some(txn) = self.current.take() {
				txn.discard();
			}
			self.state = TxnState::Idle;
			return Err(Error::TransactionAborted { cause });
		}
		match self.current.take() {
			Some(txn) => {
				self.state = TxnState::Idle;
				txn.commit().map_err(map_kv_err)
			}
			None => Ok(()),
		}
	}

	pub fn rollback(&mut self) -> Result<()> {
		if let Some(txn) = self.current.take() {
			txn.discard();
		}
		self.state = TxnState::Idle;
		self.failure_cause = None;
		Ok(())
	}

	/// Returns the transaction a statement should run against: the active
	/// explicit transaction if one is open, or a freshly begun one-shot
	/// transaction under autocommit. `end_statement` must be called
	/// afterward to commit the one-shot case. Rejected outright with
	/// `Error::TransactionAborted` while the session's explicit
	/// transaction is error-only (spec §7: "every subsequent statement
	/// returns Err until ROLLBACK").
	pub fn statement_txn(&mut self, deadline: &Deadline) -> Result<&mut Txn> {
		deadline.check()?;
		if self.state == TxnState::Failed {
			return Err(Error::TransactionAborted { cause: self.failure_cause.clone().unwrap_or_default() });
		}
		if self.current.is_none() {
			if !self.autocommit {
				return Err(Error::Internal(
					"no active transaction and autocommit is disabled; issue BEGIN first".to_string(),
				));
			}
			self.current = Some(self.engine.begin(false).map_err(map_kv_err)?);
		}
		Ok(self.current.as_mut().expect("just ensured current is Some"))
	}

	/// Called after a statement finishes. `cause` is the statement's own
	/// error, if any. Under autocommit with no explicit transaction open,
	/// this commits (or on a failed statement, discards) the one-shot
	/// transaction opened by `statement_txn`. Inside an explicit
	/// transaction, a failing statement instead moves it to
	/// `TxnState::Failed` and leaves the KV transaction open — its writes
	/// so far are still buffered, to be discarded by the eventual
	/// `ROLLBACK` (spec §4.6/§7).
	pub fn end_statement(&mut self, cause: Option<&Error>) -> Result<()> {
		if self.state == TxnState::Active {
			if let Some(err) = cause {
				self.failure_cause = Some(err.to_string());
				self.state = TxnState::Failed;
			}
			return Ok(());
		}
		if let Some(txn) = self.current.take() {
			if cause.is_some() {
				txn.discard();
				Ok(())
			} else {
				txn.commit().map_err(map_kv_err)
			}
		} else {
			Ok(())
		}
	}
}

fn map_kv_err(e: wiscdb_kv::KvError) -> Error {
	use wiscdb_kv::KvError;
	match e {
		KvError::Conflict => Error::TransactionConflict,
		KvError::Corruption { .. } => Error::storage(wiscdb_core::StorageErrorKind::Corruption, e),
		other => Error::storage(wiscdb_core::StorageErrorKind::Io, other),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wiscdb_kv::{EngineOptions, LsmEngine};

	fn engine() -> (tempfile::TempDir, LsmEngine) {
		let dir = tempdir().unwrap();
		let engine = LsmEngine::open(dir.path(), EngineOptions::default()).unwrap();
		(dir, engine)
	}

	#[test]
	fn nested_begin_is_rejected() {
		let (_dir, engine) = engine();
		let mut session = SessionTxn::new(engine);
		session.begin().unwrap();
		assert!(matches!(session.begin(), Err(Error::NestedTransactionsNotSupported)));
	}

	#[test]
	fn autocommit_statement_commits_immediately() {
		let (_dir, engine) = engine();
		let mut session = SessionTxn::new(engine);
		let deadline = Deadline::none();
		{
			let txn = session.statement_txn(&deadline).unwrap();
			txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		}
		session.end_statement(None).unwrap();
		assert_eq!(session.state(), TxnState::Idle);
	}

	#[test]
	fn explicit_transaction_is_not_closed_by_end_statement() {
		let (_dir, engine) = engine();
		let mut session = SessionTxn::new(engine);
		session.begin().unwrap();
		let deadline = Deadline::none();
		{
			let txn = session.statement_txn(&deadline).unwrap();
			txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		}
		session.end_statement(None).unwrap();
		assert_eq!(session.state(), TxnState::Active);
		session.commit().unwrap();
		assert_eq!(session.state(), TxnState::Idle);
	}

	#[test]
	fn failed_statement_in_explicit_txn_rejects_further_statements_until_rollback() {
		let (_dir, engine) = engine();
		let mut session = SessionTxn::new(engine);
		session.begin().unwrap();
		let deadline = Deadline::none();
		{
			let txn = session.statement_txn(&deadline).unwrap();
			txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		}
		session.end_statement(Some(&Error::RowNotFound)).unwrap();
		assert_eq!(session.state(), TxnState::Failed);
		assert!(session.is_active());

		assert!(matches!(session.statement_txn(&deadline), Err(Error::TransactionAborted { .. })));
		assert!(matches!(session.begin(), Err(Error::NestedTransactionsNotSupported)));

		session.rollback().unwrap();
		assert_eq!(session.state(), TxnState::Idle);
		session.statement_txn(&deadline).unwrap();
	}

	#[test]
	fn commit_on_failed_transaction_acts_like_rollback_and_reports_the_cause() {
		let (_dir, engine) = engine();
		let mut session = SessionTxn::new(engine);
		session.begin().unwrap();
		let deadline = Deadline::none();
		{
			let txn = session.statement_txn(&deadline).unwrap();
			txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
		}
		session.end_statement(Some(&Error::RowNotFound)).unwrap();

		match session.commit() {
			Err(Error::TransactionAborted { cause }) => assert!(cause.contains("row not found")),
			other => panic!("expected TransactionAborted, got {other:?}"),
		}
		assert_eq!(session.state(), TxnState::Idle);
		session.statement_txn(&deadline).unwrap();
	}
}
