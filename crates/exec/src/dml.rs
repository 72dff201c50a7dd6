use wiscdb_catalog::{TableDef, HIDDEN_ROWID_COLUMN};
use wiscdb_core::{Deadline, Error, Result};
use wiscdb_kv::Engine;
use wiscdb_type::Value;

use crate::eval::{eval, no_columns};
use crate::plan::Expr;
use crate::session::ExecSession;

/// Builds a `resolve_column` closure (see `eval::eval`) that looks a name
/// up against `table`'s schema and pulls the value out of `row`.
fn row_resolver<'a>(table: &'a TableDef, row: &'a [Value]) -> impl Fn(&str) -> Result<Value> + 'a {
	move |name: &str| {
		let col = table.column_by_name(name).ok_or_else(|| Error::Internal(format!("unknown column '{name}'")))?;
		let pos = table.columns.iter().position(|c| c.id == col.id).expect("resolved column belongs to this table");
		Ok(row[pos].clone())
	}
}

/// `INSERT`'s row-building step: a column list (or the table's declared
/// order when omitted) plus one `Vec<Expr>` per row, evaluated with no row
/// context (spec §4.6 allows only literals/constant expressions in
/// `VALUES`, never references to other rows or columns).
pub fn insert<E: Engine>(
	session: &mut ExecSession<E>,
	table_name: &str,
	columns: &Option<Vec<String>>,
	rows: &[Vec<Expr>],
	deadline: &Deadline,
) -> Result<(u64, Option<u64>)> {
	let db_id = session.current_database_id()?;
	let table = session.sal.get_table(db_id, table_name)?;
	let order = column_order(&table, columns)?;

	let txn = session.txn.statement_txn(deadline)?;
	let mut handle = session.sal.table_handle(txn, table.clone());

	let mut inserted = 0u64;
	// MySQL's `LAST_INSERT_ID()` reports the value generated for the
	// *first* row of a multi-row `INSERT`, not the last (spec §4.6/§4.7).
	let mut first_insert_id = None;
	for row in rows {
		if row.len() != order.len() {
			return Err(Error::Internal(format!("column count mismatch: {} columns given, {} expected", row.len(), order.len())));
		}
		let mut values = vec![Value::Null; table.columns.len()];
		for (expr, &pos) in row.iter().zip(order.iter()) {
			let raw = eval(expr, &no_columns)?;
			values[pos] = raw.coerce(&table.columns[pos].data_type)?;
		}
		let assigned = handle.insert(values)?;
		if inserted == 0 {
			first_insert_id = assigned;
		}
		inserted += 1;
	}
	Ok((inserted, first_insert_id))
}

/// `UPDATE table SET col = expr, ... [WHERE predicate]`. Scans the whole
/// table (spec's optimizer-free core has no predicate pushdown to an
/// index here, see `DESIGN.md`), evaluates `filter` per row, and for each
/// match builds a new row by applying every assignment in order before
/// handing it to `TableHandle::update`.
pub fn update<E: Engine>(
	session: &mut ExecSession<E>,
	table_name: &str,
	assignments: &[(String, Expr)],
	filter: &Option<Expr>,
	deadline: &Deadline,
) -> Result<u64> {
	let db_id = session.current_database_id()?;
	let table = session.sal.get_table(db_id, table_name)?;

	let txn = session.txn.statement_txn(deadline)?;
	let mut handle = session.sal.table_handle(txn, table.clone());

	let mut matched_rows = Vec::new();
	let mut cursor = handle.scan(deadline)?;
	while let Some(row) = cursor.next_row(deadline)? {
		let passes = match filter {
			Some(expr) => crate::eval::truthy(&eval(expr, &row_resolver(&table, &row))?),
			None => true,
		};
		if passes {
			matched_rows.push(row);
		}
	}

	let mut updated = 0u64;
	for row in matched_rows {
		let pk = primary_key_values(&table, &row);
		let mut new_row = row.clone();
		for (col_name, expr) in assignments {
			let pos = table
				.column_by_name(col_name)
				.and_then(|col| table.columns.iter().position(|c| c.id == col.id))
				.ok_or_else(|| Error::Internal(format!("unknown column '{col_name}'")))?;
			let raw = eval(expr, &row_resolver(&table, &row))?;
			new_row[pos] = raw.coerce(&table.columns[pos].data_type)?;
		}
		handle.update(&pk, new_row)?;
		updated += 1;
	}
	Ok(updated)
}

pub fn delete<E: Engine>(session: &mut ExecSession<E>, table_name: &str, filter: &Option<Expr>, deadline: &Deadline) -> Result<u64> {
	let db_id = session.current_database_id()?;
	let table = session.sal.get_table(db_id, table_name)?;

	let txn = session.txn.statement_txn(deadline)?;
	let mut handle = session.sal.table_handle(txn, table.clone());

	let mut matched_pks = Vec::new();
	let mut cursor = handle.scan(deadline)?;
	while let Some(row) = cursor.next_row(deadline)? {
		let passes = match filter {
			Some(expr) => crate::eval::truthy(&eval(expr, &row_resolver(&table, &row))?),
			None => true,
		};
		if passes {
			matched_pks.push(primary_key_values(&table, &row));
		}
	}

	let mut deleted = 0u64;
	for pk in matched_pks {
		handle.delete(&pk)?;
		deleted += 1;
	}
	Ok(deleted)
}

fn primary_key_values(table: &TableDef, row: &[Value]) -> Vec<Value> {
	table
		.primary_key_columns()
		.iter()
		.map(|col| {
			let pos = table.columns.iter().position(|c| c.id == col.id).expect("primary key column belongs to this table");
			row[pos].clone()
		})
		.collect()
}

/// Resolves an `INSERT`'s target column positions. With an explicit column
/// list, each name is looked up directly; with none, every *user-visible*
/// column is used in declaration order, skipping a synthesized
/// `_rowid` (spec §4.3) since the caller never names or supplies it.
fn column_order(table: &TableDef, columns: &Option<Vec<String>>) -> Result<Vec<usize>> {
	match columns {
		Some(names) => names
			.iter()
			.map(|name| {
				table
					.columns
					.iter()
					.position(|c| c.name.eq_ignore_ascii_case(name))
					.ok_or_else(|| Error::Internal(format!("unknown column '{name}'")))
			})
			.collect(),
		None => Ok(table.columns.iter().enumerate().filter(|(_, c)| c.name != HIDDEN_ROWID_COLUMN).map(|(i, _)| i).collect()),
	}
}
