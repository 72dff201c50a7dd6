use wiscdb_catalog::{ColumnDef, DatabaseDef, IndexDef, MaterializedCatalog, TableDef, HIDDEN_ROWID_COLUMN};
use wiscdb_codec::{index_prefix, prefix_upper_bound, row_prefix};
use wiscdb_core::{DatabaseId, Error, Result};
use wiscdb_kv::Engine;
use wiscdb_type::DataType;

use crate::catalog_store;
use crate::error::map_kv_err;
use crate::ids;

/// A column as requested by `CREATE TABLE`, before IDs are allocated.
pub struct NewColumn {
	pub name: String,
	pub data_type: DataType,
	pub nullable: bool,
	pub auto_increment: bool,
	pub default: Option<wiscdb_type::Value>,
}

pub struct NewIndex {
	pub name: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

pub struct NewTable {
	pub name: String,
	pub columns: Vec<NewColumn>,
	/// Column names making up the primary key; `None` synthesizes a hidden
	/// `_rowid` column (spec §4.3).
	pub primary_key: Option<Vec<String>>,
	pub indexes: Vec<NewIndex>,
}

pub fn create_database<E: Engine>(engine: &E, catalog: &MaterializedCatalog, name: &str) -> Result<DatabaseId> {
	if catalog.get_database_by_name(name).is_some() {
		return Err(Error::DatabaseExists { name: name.to_string() });
	}
	let mut txn = engine.begin(false).map_err(map_kv_err)?;
	let id = ids::next_database_id(&mut txn)?;
	let def = DatabaseDef { id, name: name.to_string() };
	catalog_store::store_database(&mut txn, &def)?;
	txn.commit().map_err(map_kv_err)?;
	catalog.insert_database(def);
	Ok(id)
}

pub fn drop_database<E: Engine>(engine: &E, catalog: &MaterializedCatalog, name: &str) -> Result<()> {
	let def = catalog.get_database_by_name(name).ok_or_else(|| Error::UnknownDatabase { name: name.to_string() })?;
	for table in catalog.list_tables(def.id) {
		drop_table_by_def(engine, catalog, &def, &table.name)?;
	}
	let mut txn = engine.begin(false).map_err(map_kv_err)?;
	catalog_store::delete_database(&mut txn, def.id)?;
	txn.commit().map_err(map_kv_err)?;
	catalog.remove_database(def.id);
	Ok(())
}

pub fn create_table<E: Engine>(
	engine: &E,
	catalog: &MaterializedCatalog,
	db_id: DatabaseId,
	spec: NewTable,
) -> Result<wiscdb_core::TableId> {
	if catalog.get_table_by_name(db_id, &spec.name).is_some() {
		return Err(Error::TableExists { name: spec.name });
	}

	let mut txn = engine.begin(false).map_err(map_kv_err)?;
	let table_id = ids::next_table_id(&mut txn)?;

	let mut columns = Vec::with_capacity(spec.columns.len() + 1);
	for c in spec.columns {
		let id = ids::next_column_id(&mut txn)?;
		columns.push(ColumnDef { id, name: c.name, data_type: c.data_type, nullable: c.nullable, auto_increment: c.auto_increment, default: c.default });
	}

	let primary_key = match spec.primary_key {
		Some(names) => {
			let mut ids_out = Vec::with_capacity(names.len());
			for name in &names {
				let col = columns
					.iter()
					.find(|c| c.name.eq_ignore_ascii_case(name))
					.ok_or_else(|| Error::Internal(format!("unknown primary key column '{name}'")))?;
				ids_out.push(col.id);
			}
			Some(ids_out)
		}
		None => {
			let rowid_id = ids::next_column_id(&mut txn)?;
			columns.push(ColumnDef {
				id: rowid_id,
				name: HIDDEN_ROWID_COLUMN.to_string(),
				data_type: DataType::BigInt { unsigned: true },
				nullable: false,
				auto_increment: true,
				default: None,
			});
			Some(vec![rowid_id])
		}
	};

	let mut indexes = Vec::with_capacity(spec.indexes.len());
	for idx in spec.indexes {
		let id = ids::next_index_id(&mut txn)?;
		let mut col_ids = Vec::with_capacity(idx.columns.len());
		for name in &idx.columns {
			let col = columns
				.iter()
				.find(|c| c.name.eq_ignore_ascii_case(name))
				.ok_or_else(|| Error::Internal(format!("unknown index column '{name}'")))?;
			col_ids.push(col.id);
		}
		indexes.push(IndexDef { id, name: idx.name, columns: col_ids, unique: idx.unique });
	}

	let def = TableDef { id: table_id, database_id: db_id, name: spec.name, columns, indexes, primary_key };
	catalog_store::store_table(&mut txn, &def)?;
	txn.commit().map_err(map_kv_err)?;
	catalog.insert_table(def);
	Ok(table_id)
}

pub fn drop_table<E: Engine>(engine: &E, catalog: &MaterializedCatalog, db_id: DatabaseId, name: &str) -> Result<()> {
	let db = catalog.get_database_by_id(db_id).ok_or(Error::UnknownDatabase { name: db_id.to_string() })?;
	drop_table_by_def(engine, catalog, &db, name)
}

fn drop_table_by_def<E: Engine>(
	engine: &E,
	catalog: &MaterializedCatalog,
	db: &DatabaseDef,
	name: &str,
) -> Result<()> {
	let table = catalog.get_table_by_name(db.id, name).ok_or_else(|| Error::UnknownTable { name: name.to_string() })?;

	let mut txn = engine.begin(false).map_err(map_kv_err)?;
	let row_prefix_bytes = row_prefix(db.id, table.id);
	let row_upper = prefix_upper_bound(&row_prefix_bytes);
	for (key, _) in txn.scan(&row_prefix_bytes, row_upper.as_deref()).map_err(map_kv_err)? {
		txn.delete(key).map_err(map_kv_err)?;
	}
	for index in &table.indexes {
		let idx_prefix = index_prefix(db.id, table.id, index.id);
		let idx_upper = prefix_upper_bound(&idx_prefix);
		for (key, _) in txn.scan(&idx_prefix, idx_upper.as_deref()).map_err(map_kv_err)? {
			txn.delete(key).map_err(map_kv_err)?;
		}
	}
	catalog_store::delete_table(&mut txn, db.id, table.id)?;
	txn.commit().map_err(map_kv_err)?;
	catalog.remove_table(table.id);
	Ok(())
}
