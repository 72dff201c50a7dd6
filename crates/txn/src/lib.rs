//! Per-session transaction state machine sitting between `wiscdb-exec` and
//! `wiscdb-kv`: autocommit vs. explicit `BEGIN`/`COMMIT`/`ROLLBACK`, and the
//! rejection of nested transactions (spec §4.5).

mod session;

pub use session::{SessionTxn, TxnState};
