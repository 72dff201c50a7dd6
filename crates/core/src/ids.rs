use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
	($name:ident) => {
		/// Monotonically issued, never-reused 64-bit identifier (spec §3).
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub struct $name(pub u64);

		impl $name {
			pub const fn new(v: u64) -> Self {
				$name(v)
			}

			pub fn as_u64(self) -> u64 {
				self.0
			}
		}

		impl From<u64> for $name {
			fn from(v: u64) -> Self {
				$name(v)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

id_newtype!(DatabaseId);
id_newtype!(TableId);
id_newtype!(ColumnId);
id_newtype!(IndexId);
id_newtype!(RowId);

/// Identifies a connection for the server's connection registry (spec §5)
/// and `KILL <connection_id>` (SPEC_FULL.md §C.4).
pub type ConnectionId = u32;
