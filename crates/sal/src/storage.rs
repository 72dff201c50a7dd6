use std::path::Path;

use wiscdb_catalog::{DatabaseDef, MaterializedCatalog, TableDef};
use wiscdb_core::{DatabaseId, Error, Result, TableId};
use wiscdb_kv::{Engine, EngineOptions, LsmEngine};

use crate::catalog_store;
use crate::ddl::{self, NewTable};
use crate::error::map_kv_err;
use crate::table::TableHandle;

/// The storage abstraction layer: the single entry point `wiscdb-exec`
/// holds onto. Wraps an `Engine` plus the materialized catalog built on top
/// of it, and exposes DDL as one-shot, internally-transactional operations
/// (mirroring MySQL's own implicit commit around DDL) alongside
/// transactional row access via `TableHandle`.
#[derive(Clone)]
pub struct Sal<E: Engine = LsmEngine> {
	engine: E,
	catalog: std::sync::Arc<MaterializedCatalog>,
}

impl Sal<LsmEngine> {
	pub fn open(path: impl AsRef<Path>, opts: EngineOptions) -> Result<Self> {
		let engine = LsmEngine::open(path, opts).map_err(map_kv_err)?;
		Self::from_engine(engine)
	}
}

impl<E: Engine> Sal<E> {
	pub fn from_engine(engine: E) -> Result<Self> {
		let catalog = MaterializedCatalog::new();
		let txn = engine.begin(true).map_err(map_kv_err)?;
		catalog_store::bootstrap(&txn, &catalog)?;
		txn.discard();
		Ok(Sal { engine, catalog: std::sync::Arc::new(catalog) })
	}

	pub fn engine(&self) -> &E {
		&self.engine
	}

	pub fn catalog(&self) -> &MaterializedCatalog {
		&self.catalog
	}

	pub fn create_database(&self, name: &str) -> Result<DatabaseId> {
		ddl::create_database(&self.engine, &self.catalog, name)
	}

	pub fn drop_database(&self, name: &str) -> Result<()> {
		ddl::drop_database(&self.engine, &self.catalog, name)
	}

	pub fn get_database(&self, name: &str) -> Result<DatabaseDef> {
		self.catalog.get_database_by_name(name).ok_or_else(|| Error::UnknownDatabase { name: name.to_string() })
	}

	pub fn list_databases(&self) -> Vec<DatabaseDef> {
		self.catalog.list_databases()
	}

	pub fn create_table(&self, db_id: DatabaseId, spec: NewTable) -> Result<TableId> {
		ddl::create_table(&self.engine, &self.catalog, db_id, spec)
	}

	pub fn drop_table(&self, db_id: DatabaseId, name: &str) -> Result<()> {
		ddl::drop_table(&self.engine, &self.catalog, db_id, name)
	}

	pub fn get_table(&self, db_id: DatabaseId, name: &str) -> Result<TableDef> {
		self.catalog.get_table_by_name(db_id, name).ok_or_else(|| Error::UnknownTable { name: name.to_string() })
	}

	pub fn list_tables(&self, db_id: DatabaseId) -> Vec<TableDef> {
		self.catalog.list_tables(db_id)
	}

	/// Borrows `txn` for row access against `table`. The caller (usually
	/// `wiscdb-exec`, via `wiscdb-txn`'s `SessionTxn`) owns the
	/// transaction's lifetime; `Sal` itself is stateless with respect to
	/// any one session's in-flight transaction.
	pub fn table_handle<'t>(&self, txn: &'t mut wiscdb_kv::Txn, table: TableDef) -> TableHandle<'t> {
		TableHandle::new(txn, table)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wiscdb_type::{DataType, Value};

	fn open() -> (tempfile::TempDir, Sal<LsmEngine>) {
		let dir = tempdir().unwrap();
		let sal = Sal::open(dir.path(), EngineOptions::default()).unwrap();
		(dir, sal)
	}

	#[test]
	fn create_and_list_database() {
		let (_dir, sal) = open();
		sal.create_database("app").unwrap();
		let dbs = sal.list_databases();
		assert_eq!(dbs.len(), 1);
		assert_eq!(dbs[0].name, "app");
	}

	#[test]
	fn creating_duplicate_database_fails() {
		let (_dir, sal) = open();
		sal.create_database("app").unwrap();
		assert!(matches!(sal.create_database("app"), Err(Error::DatabaseExists { .. })));
	}

	#[test]
	fn create_table_synthesizes_hidden_rowid_when_no_primary_key() {
		let (_dir, sal) = open();
		let db_id = sal.create_database("app").unwrap();
		let spec = NewTable {
			name: "users".to_string(),
			columns: vec![crate::ddl::NewColumn {
				name: "name".to_string(),
				data_type: DataType::Varchar { max_len: 64 },
				nullable: false,
				auto_increment: false,
				default: None,
			}],
			primary_key: None,
			indexes: vec![],
		};
		let table_id = sal.create_table(db_id, spec).unwrap();
		let table = sal.catalog().get_table_by_id(table_id).unwrap();
		assert_eq!(table.columns.len(), 2);
		assert!(table.columns.iter().any(|c| c.name == "_rowid"));
	}

	#[test]
	fn insert_then_get_round_trips_a_row() {
		let (_dir, sal) = open();
		let db_id = sal.create_database("app").unwrap();
		let spec = NewTable {
			name: "users".to_string(),
			columns: vec![
				crate::ddl::NewColumn {
					name: "id".to_string(),
					data_type: DataType::Int { unsigned: false },
					nullable: false,
					auto_increment: false,
					default: None,
				},
				crate::ddl::NewColumn {
					name: "name".to_string(),
					data_type: DataType::Varchar { max_len: 64 },
					nullable: false,
					auto_increment: false,
					default: None,
				},
			],
			primary_key: Some(vec!["id".to_string()]),
			indexes: vec![],
		};
		let table_id = sal.create_table(db_id, spec).unwrap();
		let table = sal.get_table(db_id, "users").unwrap();

		let mut txn = sal.engine().begin(false).unwrap();
		{
			let mut handle = sal.table_handle(&mut txn, table.clone());
			handle.insert(vec![Value::Int(1), Value::Varchar("alice".to_string())]).unwrap();
		}
		txn.commit().unwrap();

		let mut txn = sal.engine().begin(true).unwrap();
		let handle = sal.table_handle(&mut txn, table);
		let row = handle.get(&[Value::Int(1)]).unwrap().unwrap();
		assert_eq!(row[1], Value::Varchar("alice".to_string()));
		let _ = table_id;
	}
}
