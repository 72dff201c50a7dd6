use serde::{Deserialize, Serialize};
use wiscdb_core::{ColumnId, DatabaseId, IndexId, TableId};
use wiscdb_type::DataType;

/// A database's durable catalog record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseDef {
	pub id: DatabaseId,
	pub name: String,
}

/// A table's durable catalog record, including its columns and indexes so
/// a single read materializes everything needed to plan a query against it
/// (spec §4.3's "Catalog" component: table lookup returns schema +
/// indexes in one call).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
	pub id: TableId,
	pub database_id: DatabaseId,
	pub name: String,
	pub columns: Vec<ColumnDef>,
	pub indexes: Vec<IndexDef>,
	/// `None` when the table has no declared primary key; in that case a
	/// hidden `_rowid` BIGINT UNSIGNED sequence column stands in as the
	/// storage key (spec §4.3 "Primary key / hidden rowid").
	pub primary_key: Option<Vec<ColumnId>>,
}

impl TableDef {
	pub fn column(&self, id: ColumnId) -> Option<&ColumnDef> {
		self.columns.iter().find(|c| c.id == id)
	}

	pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
		self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
	}

	pub fn has_explicit_primary_key(&self) -> bool {
		self.primary_key.is_some()
	}

	/// Column positions making up the primary key, in declaration order,
	/// whether that's the user's explicit PK or the hidden `_rowid`.
	pub fn primary_key_columns(&self) -> Vec<&ColumnDef> {
		match &self.primary_key {
			Some(ids) => ids.iter().filter_map(|id| self.column(*id)).collect(),
			None => self.columns.iter().filter(|c| c.name == HIDDEN_ROWID_COLUMN).collect(),
		}
	}
}

pub const HIDDEN_ROWID_COLUMN: &str = "_rowid";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
	pub id: ColumnId,
	pub name: String,
	pub data_type: DataType,
	pub nullable: bool,
	pub auto_increment: bool,
	pub default: Option<wiscdb_type::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
	pub id: IndexId,
	pub name: String,
	pub columns: Vec<ColumnId>,
	pub unique: bool,
}
