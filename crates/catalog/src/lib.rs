//! Catalog metadata records and the in-memory materialized cache built on
//! top of them.
//!
//! This crate is deliberately storage-agnostic: it defines what a
//! database/table/column/index record looks like and how to cache them by
//! name, but not how they're read from or written to durable storage.
//! `wiscdb-sal` owns that wiring, since it already depends on both this
//! crate and `wiscdb-kv`/`wiscdb-codec` (see `DESIGN.md`).

mod materialized;
mod records;

pub use materialized::MaterializedCatalog;
pub use records::{ColumnDef, DatabaseDef, IndexDef, TableDef, HIDDEN_ROWID_COLUMN};
