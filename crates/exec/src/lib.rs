//! The execution engine (spec §4.6): walks a resolved `PlanNode` tree into
//! row iterators and DML effects against a session's `wiscdb-sal`/
//! `wiscdb-txn` state. Everything upstream of a `PlanNode` — parsing,
//! name resolution, cost-based planning — is out of this crate's core
//! scope; `frontend` is this workspace's own minimal stand-in so the
//! engine can be driven end-to-end without a separate SQL front end
//! project (see `DESIGN.md`).

mod ddl;
mod dml;
mod engine;
mod eval;
pub mod frontend;
mod plan;
mod schema;
mod session;

pub use engine::{ExecOutcome, Executor};
pub use plan::{AggregateExpr, AggregateFunc, BinaryOp, ColumnSchema, Expr, IndexSchema, JoinKind, PlanNode, SortKey, TableSchema};
pub use schema::{Field, OutputSchema};
pub use session::ExecSession;

pub use wiscdb_core::{Error, Result};

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use tempfile::tempdir;
	use wiscdb_kv::{EngineOptions, LsmEngine};
	use wiscdb_sal::Sal;
	use wiscdb_type::Value;

	fn new_session() -> (tempfile::TempDir, ExecSession<LsmEngine>) {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::open(dir.path(), EngineOptions::default()).unwrap());
		(dir, ExecSession::new(sal))
	}

	fn run(session: &mut ExecSession<LsmEngine>, sql: &str) -> Result<ExecOutcome> {
		let plan = frontend::parse_statement(sql)?;
		Executor::execute(session, &plan)
	}

	/// Spec seed scenario S1: round-trip DDL+DML through the full
	/// parse -> plan -> execute pipeline.
	#[test]
	fn seed_scenario_round_trip_ddl_and_dml() {
		let (_dir, mut session) = new_session();
		run(&mut session, "CREATE DATABASE shop").unwrap();
		run(&mut session, "USE shop").unwrap();
		run(&mut session, "CREATE TABLE items(id INT, name VARCHAR(32) NOT NULL, qty INT, PRIMARY KEY (id))").unwrap();
		let outcome = run(&mut session, "INSERT INTO items VALUES (1,'apple',10),(2,'pear',5)").unwrap();
		assert!(matches!(outcome, ExecOutcome::Affected { count: 2, .. }));

		match run(&mut session, "SELECT name FROM items WHERE id = 2").unwrap() {
			ExecOutcome::Query { rows, .. } => {
				assert_eq!(rows, vec![vec![Value::Varchar("pear".to_string())]]);
			}
			other => panic!("expected a query result, got a different outcome ({})", outcome_kind(&other)),
		}

		match run(&mut session, "SELECT id FROM items ORDER BY id").unwrap() {
			ExecOutcome::Query { rows, .. } => {
				assert_eq!(rows, vec![vec![Value::BigInt(1)], vec![Value::BigInt(2)]]);
			}
			other => panic!("expected a query result, got a different outcome ({})", outcome_kind(&other)),
		}
	}

	/// Spec seed scenario S2: inserting a duplicate primary key fails.
	#[test]
	fn seed_scenario_duplicate_primary_key_is_rejected() {
		let (_dir, mut session) = new_session();
		run(&mut session, "CREATE DATABASE shop").unwrap();
		run(&mut session, "USE shop").unwrap();
		run(&mut session, "CREATE TABLE items(id INT, name VARCHAR(32) NOT NULL, PRIMARY KEY (id))").unwrap();
		run(&mut session, "INSERT INTO items VALUES (1,'apple')").unwrap();
		assert!(matches!(run(&mut session, "INSERT INTO items VALUES (1,'x')"), Err(Error::DuplicateKey { .. })));
	}

	/// Spec seed scenario S5: auto-increment fills gaps left by explicit
	/// values and keeps handing out ids above the highest one ever seen.
	#[test]
	fn seed_scenario_auto_increment_sequence() {
		let (_dir, mut session) = new_session();
		run(&mut session, "CREATE DATABASE shop").unwrap();
		run(&mut session, "USE shop").unwrap();
		run(&mut session, "CREATE TABLE log(id BIGINT PRIMARY KEY AUTO_INCREMENT, msg VARCHAR(50))").unwrap();
		run(&mut session, "INSERT INTO log(msg) VALUES ('a'),('b')").unwrap();
		run(&mut session, "INSERT INTO log VALUES (100,'c')").unwrap();
		run(&mut session, "INSERT INTO log(msg) VALUES ('d')").unwrap();

		match run(&mut session, "SELECT id FROM log ORDER BY id").unwrap() {
			ExecOutcome::Query { rows, .. } => {
				let ids: Vec<_> = rows.into_iter().map(|r| r[0].clone()).collect();
				assert_eq!(ids, vec![Value::BigInt(1), Value::BigInt(2), Value::BigInt(100), Value::BigInt(101)]);
			}
			other => panic!("expected a query result, got a different outcome ({})", outcome_kind(&other)),
		}
	}

	/// Spec seed scenario S3: a transaction's reads stay pinned to the
	/// snapshot taken at `BEGIN`, even after another session commits a
	/// conflicting write.
	#[test]
	fn seed_scenario_snapshot_isolation() {
		let (_dir, mut a) = new_session();
		run(&mut a, "CREATE DATABASE shop").unwrap();
		run(&mut a, "USE shop").unwrap();
		run(&mut a, "CREATE TABLE items(id INT, qty INT, PRIMARY KEY (id))").unwrap();
		run(&mut a, "INSERT INTO items VALUES (1,10)").unwrap();

		let mut b = ExecSession::new(a.sal.clone());
		run(&mut b, "USE shop").unwrap();

		run(&mut a, "BEGIN").unwrap();
		assert_eq!(read_qty(&mut a), 10);

		run(&mut b, "UPDATE items SET qty = 99 WHERE id = 1").unwrap();

		assert_eq!(read_qty(&mut a), 10);
		run(&mut a, "COMMIT").unwrap();

		assert_eq!(read_qty(&mut b), 99);
	}

	fn read_qty(session: &mut ExecSession<LsmEngine>) -> i64 {
		match run(session, "SELECT qty FROM items WHERE id = 1").unwrap() {
			ExecOutcome::Query { rows, .. } => rows[0][0].as_i64().unwrap(),
			other => panic!("expected a query result, got a different outcome ({})", outcome_kind(&other)),
		}
	}

	fn outcome_kind(outcome: &ExecOutcome) -> &'static str {
		match outcome {
			ExecOutcome::Query { .. } => "Query",
			ExecOutcome::Affected { .. } => "Affected",
			ExecOutcome::Done => "Done",
		}
	}
}
