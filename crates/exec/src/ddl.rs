use wiscdb_core::{DatabaseId, Error, Result};
use wiscdb_kv::Engine;
use wiscdb_sal::{NewColumn, NewIndex, NewTable};

use crate::plan::TableSchema;
use crate::session::ExecSession;

/// Maps the plan layer's `TableSchema` onto `wiscdb-sal`'s `NewTable` DDL
/// request and delegates to `Sal::create_table`. Kept separate from
/// `plan::TableSchema` itself (see that type's doc comment) so the plan
/// crate boundary doesn't leak storage-layer request shapes.
fn to_new_table(name: String, schema: TableSchema) -> NewTable {
	NewTable {
		name,
		columns: schema
			.columns
			.into_iter()
			.map(|c| NewColumn { name: c.name, data_type: c.data_type, nullable: c.nullable, auto_increment: c.auto_increment, default: c.default })
			.collect(),
		primary_key: schema.primary_key,
		indexes: schema.indexes.into_iter().map(|i| NewIndex { name: i.name, columns: i.columns, unique: i.unique }).collect(),
	}
}

pub fn create_database<E: Engine>(session: &ExecSession<E>, name: &str, if_not_exists: bool) -> Result<()> {
	match session.sal.create_database(name) {
		Ok(_) => Ok(()),
		Err(Error::DatabaseExists { .. }) if if_not_exists => Ok(()),
		Err(e) => Err(e),
	}
}

pub fn drop_database<E: Engine>(session: &ExecSession<E>, name: &str, if_exists: bool) -> Result<()> {
	match session.sal.drop_database(name) {
		Ok(()) => Ok(()),
		Err(Error::UnknownDatabase { .. }) if if_exists => Ok(()),
		Err(e) => Err(e),
	}
}

pub fn create_table<E: Engine>(session: &ExecSession<E>, db_id: DatabaseId, name: &str, schema: TableSchema, if_not_exists: bool) -> Result<()> {
	match session.sal.create_table(db_id, to_new_table(name.to_string(), schema)) {
		Ok(_) => Ok(()),
		Err(Error::TableExists { .. }) if if_not_exists => Ok(()),
		Err(e) => Err(e),
	}
}

pub fn drop_table<E: Engine>(session: &ExecSession<E>, db_id: DatabaseId, name: &str, if_exists: bool) -> Result<()> {
	match session.sal.drop_table(db_id, name) {
		Ok(()) => Ok(()),
		Err(Error::UnknownTable { .. }) if if_exists => Ok(()),
		Err(e) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use tempfile::tempdir;
	use wiscdb_kv::EngineOptions;
	use wiscdb_sal::Sal;

	#[test]
	fn create_database_if_not_exists_is_idempotent() {
		let dir = tempdir().unwrap();
		let sal = Arc::new(Sal::open(dir.path(), EngineOptions::default()).unwrap());
		let session = ExecSession::new(sal);
		create_database(&session, "app", false).unwrap();
		assert!(create_database(&session, "app", false).is_err());
		create_database(&session, "app", true).unwrap();
	}
}
