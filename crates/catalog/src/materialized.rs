use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use wiscdb_core::{DatabaseId, TableId};

use crate::records::{DatabaseDef, TableDef};

/// An in-memory cache of the durable catalog, keyed by case-folded name so
/// `USE mydb` and `USE MyDb` resolve to the same entry (MySQL database/table
/// names are case-insensitive on the common case-insensitive filesystem
/// configurations this server targets).
///
/// Every DDL commit bumps `version`; a lookup at catalog version N is only
/// trusted if it was filled at or after N, following the three-tier lookup
/// pattern reifydb's `Catalog` uses: check the cache, and on a miss or a
/// stale version fall through to durable storage and repopulate.
pub struct MaterializedCatalog {
	databases_by_name: DashMap<String, DatabaseDef>,
	databases_by_id: DashMap<DatabaseId, DatabaseDef>,
	tables_by_name: DashMap<(DatabaseId, String), TableDef>,
	tables_by_id: DashMap<TableId, TableDef>,
	version: AtomicU64,
}

impl MaterializedCatalog {
	pub fn new() -> Self {
		MaterializedCatalog {
			databases_by_name: DashMap::new(),
			databases_by_id: DashMap::new(),
			tables_by_name: DashMap::new(),
			tables_by_id: DashMap::new(),
			version: AtomicU64::new(0),
		}
	}

	pub fn version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	fn bump_version(&self) -> u64 {
		self.version.fetch_add(1, Ordering::AcqRel) + 1
	}

	pub fn get_database_by_name(&self, name: &str) -> Option<DatabaseDef> {
		self.databases_by_name.get(&fold(name)).map(|e| e.clone())
	}

	pub fn get_database_by_id(&self, id: DatabaseId) -> Option<DatabaseDef> {
		self.databases_by_id.get(&id).map(|e| e.clone())
	}

	pub fn list_databases(&self) -> Vec<DatabaseDef> {
		self.databases_by_id.iter().map(|e| e.value().clone()).collect()
	}

	pub fn insert_database(&self, def: DatabaseDef) -> u64 {
		self.databases_by_name.insert(fold(&def.name), def.clone());
		self.databases_by_id.insert(def.id, def);
		self.bump_version()
	}

	pub fn remove_database(&self, id: DatabaseId) -> u64 {
		if let Some((_, def)) = self.databases_by_id.remove(&id) {
			self.databases_by_name.remove(&fold(&def.name));
			self.tables_by_id.retain(|_, t| t.database_id != id);
			self.tables_by_name.retain(|(db, _), _| *db != id);
		}
		self.bump_version()
	}

	pub fn get_table_by_name(&self, db_id: DatabaseId, name: &str) -> Option<TableDef> {
		self.tables_by_name.get(&(db_id, fold(name))).map(|e| e.clone())
	}

	pub fn get_table_by_id(&self, id: TableId) -> Option<TableDef> {
		self.tables_by_id.get(&id).map(|e| e.clone())
	}

	pub fn list_tables(&self, db_id: DatabaseId) -> Vec<TableDef> {
		self.tables_by_id.iter().filter(|e| e.value().database_id == db_id).map(|e| e.value().clone()).collect()
	}

	pub fn insert_table(&self, def: TableDef) -> u64 {
		self.tables_by_name.insert((def.database_id, fold(&def.name)), def.clone());
		self.tables_by_id.insert(def.id, def);
		self.bump_version()
	}

	pub fn remove_table(&self, id: TableId) -> u64 {
		if let Some((_, def)) = self.tables_by_id.remove(&id) {
			self.tables_by_name.remove(&(def.database_id, fold(&def.name)));
		}
		self.bump_version()
	}
}

impl Default for MaterializedCatalog {
	fn default() -> Self {
		Self::new()
	}
}

fn fold(name: &str) -> String {
	name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn db(id: u64, name: &str) -> DatabaseDef {
		DatabaseDef { id: DatabaseId::new(id), name: name.to_string() }
	}

	#[test]
	fn lookup_is_case_insensitive() {
		let cat = MaterializedCatalog::new();
		cat.insert_database(db(1, "MyDb"));
		assert!(cat.get_database_by_name("mydb").is_some());
		assert!(cat.get_database_by_name("MYDB").is_some());
	}

	#[test]
	fn insert_and_remove_bump_version_monotonically() {
		let cat = MaterializedCatalog::new();
		let v1 = cat.insert_database(db(1, "a"));
		let v2 = cat.insert_database(db(2, "b"));
		assert!(v2 > v1);
		let v3 = cat.remove_database(DatabaseId::new(1));
		assert!(v3 > v2);
		assert!(cat.get_database_by_name("a").is_none());
	}

	#[test]
	fn removing_database_cascades_to_its_tables() {
		use crate::records::TableDef;
		let cat = MaterializedCatalog::new();
		cat.insert_database(db(1, "d"));
		cat.insert_table(TableDef {
			id: TableId::new(10),
			database_id: DatabaseId::new(1),
			name: "t".to_string(),
			columns: vec![],
			indexes: vec![],
			primary_key: None,
		});
		cat.remove_database(DatabaseId::new(1));
		assert!(cat.get_table_by_id(TableId::new(10)).is_none());
	}
}
