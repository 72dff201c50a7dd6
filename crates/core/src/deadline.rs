use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Cooperative cancellation + optional wall-clock deadline, checked between
/// row yields by every `RowIter` implementation (spec §5 "Cancellation &
/// timeouts": "Row iterators must check the deadline between rows").
///
/// Cloning shares the same cancellation flag; a `Deadline` handed to a
/// statement's row iterator and the session-level cancel signal that calls
/// `cancel()` are the same underlying flag.
#[derive(Clone)]
pub struct Deadline {
	cancelled: Arc<AtomicBool>,
	expires_at: Option<Instant>,
}

impl Deadline {
	pub fn none() -> Self {
		Deadline { cancelled: Arc::new(AtomicBool::new(false)), expires_at: None }
	}

	pub fn after(timeout: Duration) -> Self {
		Deadline { cancelled: Arc::new(AtomicBool::new(false)), expires_at: Some(Instant::now() + timeout) }
	}

	/// Delivers a session-level cancel signal (spec §5). Idempotent.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	/// Returns `Err(QueryCancelled)` if cancelled or past deadline;
	/// called between row yields and before starting a new statement.
	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			return Err(Error::QueryCancelled);
		}
		if let Some(expires_at) = self.expires_at {
			if Instant::now() >= expires_at {
				self.cancel();
				return Err(Error::QueryCancelled);
			}
		}
		Ok(())
	}
}

impl Default for Deadline {
	fn default() -> Self {
		Deadline::none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn cancel_is_observed_immediately() {
		let d = Deadline::none();
		assert!(d.check().is_ok());
		d.cancel();
		assert!(matches!(d.check(), Err(Error::QueryCancelled)));
	}

	#[test]
	fn expired_deadline_cancels_and_sticks() {
		let d = Deadline::after(Duration::from_millis(1));
		sleep(Duration::from_millis(10));
		assert!(matches!(d.check(), Err(Error::QueryCancelled)));
		assert!(d.is_cancelled());
	}

	#[test]
	fn clone_shares_cancellation() {
		let d = Deadline::none();
		let d2 = d.clone();
		d.cancel();
		assert!(d2.is_cancelled());
	}
}
