use wiscdb_catalog::{DatabaseDef, MaterializedCatalog, TableDef};
use wiscdb_codec::{database_key, database_prefix, prefix_upper_bound, table_key, table_prefix};
use wiscdb_core::{DatabaseId, Result, TableId};
use wiscdb_kv::Txn;

use crate::error::map_kv_err;

pub fn store_database(txn: &mut Txn, def: &DatabaseDef) -> Result<()> {
	let bytes = bincode::serialize(def).expect("DatabaseDef serialization is infallible");
	txn.put(database_key(def.id), bytes).map_err(map_kv_err)
}

pub fn delete_database(txn: &mut Txn, id: DatabaseId) -> Result<()> {
	txn.delete(database_key(id)).map_err(map_kv_err)
}

pub fn load_database(txn: &Txn, id: DatabaseId) -> Result<Option<DatabaseDef>> {
	match txn.get(&database_key(id)).map_err(map_kv_err)? {
		Some(bytes) => Ok(Some(bincode::deserialize(&bytes).expect("stored DatabaseDef is well-formed"))),
		None => Ok(None),
	}
}

pub fn store_table(txn: &mut Txn, def: &TableDef) -> Result<()> {
	let bytes = bincode::serialize(def).expect("TableDef serialization is infallible");
	txn.put(table_key(def.database_id, def.id), bytes).map_err(map_kv_err)
}

pub fn delete_table(txn: &mut Txn, db_id: DatabaseId, id: TableId) -> Result<()> {
	txn.delete(table_key(db_id, id)).map_err(map_kv_err)
}

/// Loads every database and table catalog record durably stored, used once
/// at startup to populate a fresh `MaterializedCatalog` (spec §4.3: the
/// catalog must survive a restart).
pub fn bootstrap(txn: &Txn, catalog: &MaterializedCatalog) -> Result<()> {
	let db_prefix = database_prefix();
	let db_upper = prefix_upper_bound(&db_prefix);
	for (_, value) in txn.scan(&db_prefix, db_upper.as_deref()).map_err(map_kv_err)? {
		let def: DatabaseDef = bincode::deserialize(&value).expect("stored DatabaseDef is well-formed");
		catalog.insert_database(def);
	}

	let tbl_prefix = table_prefix_root();
	let tbl_upper = prefix_upper_bound(&tbl_prefix);
	for (_, value) in txn.scan(&tbl_prefix, tbl_upper.as_deref()).map_err(map_kv_err)? {
		let def: TableDef = bincode::deserialize(&value).expect("stored TableDef is well-formed");
		catalog.insert_table(def);
	}
	Ok(())
}

/// The `'T'` namespace root, covering every table of every database —
/// `table_prefix(db_id)` only covers one database, so bootstrap needs the
/// bare namespace tag instead.
fn table_prefix_root() -> Vec<u8> {
	table_prefix(DatabaseId::new(0))[..1].to_vec()
}
