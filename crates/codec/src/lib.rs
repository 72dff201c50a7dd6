//! Order-preserving key encoding and row-value encoding shared by
//! `wiscdb-catalog` and `wiscdb-sal`.
//!
//! `value` implements the memcomparable encoding keys depend on; `row`
//! encodes whole rows for storage as KV values; `keyspace` lays out the
//! byte ranges (`'D'`, `'T'`, `'S'`, `'R'`, `'I'`) that partition the
//! engine's flat key space into catalog, sequence, row, and index data.

mod error;
mod keyspace;
mod row;
mod value;

pub use error::{CodecError, Result};
pub use keyspace::{
	database_key, database_prefix, index_key, index_prefix, index_prefix_with_values, prefix_upper_bound, row_key,
	row_key_for_rowid, row_prefix, sequence_key, table_key, table_prefix,
};
pub use row::{decode_row, encode_row};
pub use value::{decode_value, encode_value};
