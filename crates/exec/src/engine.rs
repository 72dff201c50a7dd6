use wiscdb_catalog::TableDef;
use wiscdb_core::{Deadline, Error, Result};
use wiscdb_kv::Engine;
use wiscdb_type::{DataType, Value};

use crate::ddl;
use crate::dml;
use crate::eval::{eval, truthy};
use crate::plan::{AggregateFunc, JoinKind, PlanNode, SortKey};
use crate::schema::{Field, OutputSchema};
use crate::session::ExecSession;

/// What running a `PlanNode` produces: a row set with its shape (`SELECT`,
/// `SHOW ...`), an affected-row count plus the last auto-increment value
/// assigned (`INSERT`/`UPDATE`/`DELETE`, spec §4.7's OK-packet fields), or
/// nothing beyond success (DDL, transaction control).
pub enum ExecOutcome {
	Query { schema: OutputSchema, rows: Vec<Vec<Value>> },
	Affected { count: u64, last_insert_id: Option<u64> },
	Done,
}

/// Walks a resolved `PlanNode` against one session's storage and
/// transaction state (spec §4.6: "the execution engine's only obligation
/// is to walk a plan tree it's handed"). Stateless itself; all state lives
/// in the `ExecSession`.
pub struct Executor;

impl Executor {
	pub fn execute<E: Engine>(session: &mut ExecSession<E>, plan: &PlanNode) -> Result<ExecOutcome> {
		let deadline = session.deadline().clone();
		match plan {
			PlanNode::CreateDatabase { name, if_not_exists } => {
				ddl::create_database(session, name, *if_not_exists)?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::DropDatabase { name, if_exists } => {
				ddl::drop_database(session, name, *if_exists)?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::CreateTable { name, schema, if_not_exists } => {
				let db_id = session.current_database_id()?;
				ddl::create_table(session, db_id, name, schema.clone(), *if_not_exists)?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::DropTable { name, if_exists } => {
				let db_id = session.current_database_id()?;
				ddl::drop_table(session, db_id, name, *if_exists)?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::Use { database } => {
				session.use_database(database)?;
				Ok(ExecOutcome::Done)
			}

			PlanNode::Insert { table, columns, rows } => {
				let result = dml::insert(session, table, columns, rows, &deadline);
				session.txn.end_statement(result.as_ref().err())?;
				let (count, last_insert_id) = result?;
				Ok(ExecOutcome::Affected { count, last_insert_id })
			}
			PlanNode::Update { table, assignments, filter } => {
				let result = dml::update(session, table, assignments, filter, &deadline);
				session.txn.end_statement(result.as_ref().err())?;
				let count = result?;
				Ok(ExecOutcome::Affected { count, last_insert_id: None })
			}
			PlanNode::Delete { table, filter } => {
				let result = dml::delete(session, table, filter, &deadline);
				session.txn.end_statement(result.as_ref().err())?;
				let count = result?;
				Ok(ExecOutcome::Affected { count, last_insert_id: None })
			}

			PlanNode::BeginTxn => {
				session.txn.begin()?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::Commit => {
				session.txn.commit()?;
				Ok(ExecOutcome::Done)
			}
			PlanNode::Rollback => {
				session.txn.rollback()?;
				Ok(ExecOutcome::Done)
			}

			PlanNode::ShowDatabases => {
				let mut rows: Vec<_> = session.sal.list_databases().into_iter().map(|d| vec![Value::Varchar(d.name)]).collect();
				rows.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(std::cmp::Ordering::Equal));
				Ok(ExecOutcome::Query { schema: single_text_column("Database"), rows })
			}
			PlanNode::ShowTables => {
				let db_id = session.current_database_id()?;
				let mut rows: Vec<_> = session.sal.list_tables(db_id).into_iter().map(|t| vec![Value::Varchar(t.name)]).collect();
				rows.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(std::cmp::Ordering::Equal));
				Ok(ExecOutcome::Query { schema: single_text_column("Tables"), rows })
			}
			PlanNode::ShowVariables { like } => {
				let rows = show_variables(like.as_deref());
				Ok(ExecOutcome::Query {
					schema: OutputSchema {
						fields: vec![
							Field { name: "Variable_name".to_string(), data_type: DataType::Varchar { max_len: 64 }, nullable: false },
							Field { name: "Value".to_string(), data_type: DataType::Varchar { max_len: 255 }, nullable: false },
						],
					},
					rows,
				})
			}

			// Row-producing plans: handled by the recursive evaluator below
			// since they can nest (Project over Filter over TableScan, ...).
			PlanNode::TableScan { .. }
			| PlanNode::IndexScan { .. }
			| PlanNode::Project { .. }
			| PlanNode::Filter { .. }
			| PlanNode::Limit { .. }
			| PlanNode::Sort { .. }
			| PlanNode::Aggregate { .. }
			| PlanNode::Join { .. } => {
				let (schema, rows) = eval_rows(session, plan, &deadline)?;
				Ok(ExecOutcome::Query { schema, rows })
			}
		}
	}
}

fn single_text_column(name: &str) -> OutputSchema {
	OutputSchema { fields: vec![Field { name: name.to_string(), data_type: DataType::Varchar { max_len: 64 }, nullable: false }] }
}

/// The session variables `SHOW VARIABLES` exposes (spec §C.5 /
/// SPEC_FULL.md §C: "SHOW ... as catalog-listing sugar"). A small fixed
/// set rather than MySQL's full sysvar table, since nothing in this
/// system reads most of them.
fn show_variables(like: Option<&str>) -> Vec<Vec<Value>> {
	let all = [("autocommit", "ON"), ("version", "8.0.34-wiscdb"), ("character_set_server", "utf8mb4"), ("max_allowed_packet", "67108864")];
	all.iter()
		.filter(|(name, _)| match like {
			Some(pattern) => sql_like(name, pattern),
			None => true,
		})
		.map(|(name, value)| vec![Value::Varchar(name.to_string()), Value::Varchar(value.to_string())])
		.collect()
}

/// A minimal SQL `LIKE` matcher supporting `%` and `_`, enough for `SHOW
/// VARIABLES LIKE '...'` patterns.
fn sql_like(text: &str, pattern: &str) -> bool {
	let text: Vec<char> = text.chars().collect();
	let pattern: Vec<char> = pattern.chars().collect();
	like_match(&text, &pattern)
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
	match pattern.first() {
		None => text.is_empty(),
		Some('%') => like_match(text, &pattern[1..]) || (!text.is_empty() && like_match(&text[1..], pattern)),
		Some('_') => !text.is_empty() && like_match(&text[1..], &pattern[1..]),
		Some(c) => text.first() == Some(c) && like_match(&text[1..], &pattern[1..]),
	}
}

/// Recursively materializes a row-producing plan node into `(schema,
/// rows)`. Every intermediate result is a fully materialized `Vec`, same
/// as `wiscdb-sal`'s own `RowIter` (see that type's doc comment); the
/// cooperative `deadline` is still checked between rows at every level so
/// a `LIMIT`-less scan over a huge table stays cancellable.
fn eval_rows<E: Engine>(session: &mut ExecSession<E>, plan: &PlanNode, deadline: &Deadline) -> Result<(OutputSchema, Vec<Vec<Value>>)> {
	match plan {
		PlanNode::TableScan { table, projection, filter } => {
			let db_id = session.current_database_id()?;
			let table_def = session.sal.get_table(db_id, table)?;
			let txn = session.txn.statement_txn(deadline)?;
			let handle = session.sal.table_handle(txn, table_def.clone());
			let mut cursor = handle.scan(deadline)?;
			let mut rows = Vec::new();
			while let Some(row) = cursor.next_row(deadline)? {
				if matches_filter(&table_def, &row, filter)? {
					rows.push(row);
				}
			}
			let schema = table_schema(&table_def);
			apply_projection(schema, rows, projection)
		}
		PlanNode::IndexScan { table, index, values, projection } => {
			let db_id = session.current_database_id()?;
			let table_def = session.sal.get_table(db_id, table)?;
			let txn = session.txn.statement_txn(deadline)?;
			let handle = session.sal.table_handle(txn, table_def.clone());
			let mut cursor = handle.index_scan(*index, values, deadline)?;
			let mut rows = Vec::new();
			while let Some(row) = cursor.next_row(deadline)? {
				rows.push(row);
			}
			let schema = table_schema(&table_def);
			apply_projection(schema, rows, projection)
		}
		PlanNode::Project { input, columns } => {
			let (schema, rows) = eval_rows(session, input, deadline)?;
			apply_projection(schema, rows, &Some(columns.clone()))
		}
		PlanNode::Filter { input, predicate } => {
			let (schema, rows) = eval_rows(session, input, deadline)?;
			let mut kept = Vec::with_capacity(rows.len());
			for row in rows {
				deadline.check()?;
				if truthy(&eval_against_schema(predicate, &schema, &row)?) {
					kept.push(row);
				}
			}
			Ok((schema, kept))
		}
		PlanNode::Limit { input, limit, offset } => {
			let (schema, rows) = eval_rows(session, input, deadline)?;
			let start = (*offset as usize).min(rows.len());
			let end = match limit {
				Some(n) => (start + *n as usize).min(rows.len()),
				None => rows.len(),
			};
			Ok((schema, rows[start..end].to_vec()))
		}
		PlanNode::Sort { input, keys } => {
			let (schema, mut rows) = eval_rows(session, input, deadline)?;
			sort_rows(&schema, &mut rows, keys)?;
			Ok((schema, rows))
		}
		PlanNode::Aggregate { input, group_by, aggregates } => {
			let (schema, rows) = eval_rows(session, input, deadline)?;
			aggregate_rows(&schema, rows, group_by, aggregates)
		}
		PlanNode::Join { left, right, left_key, right_key, kind } => {
			let (left_schema, left_rows) = eval_rows(session, left, deadline)?;
			let (right_schema, right_rows) = eval_rows(session, right, deadline)?;
			hash_join(deadline, left_schema, left_rows, left_key, right_schema, right_rows, right_key, *kind)
		}
		other => unreachable!("eval_rows called on non-row-producing plan node {other:?}"),
	}
}

fn matches_filter(table: &TableDef, row: &[Value], filter: &Option<crate::plan::Expr>) -> Result<bool> {
	match filter {
		Some(expr) => {
			let value = eval(expr, &|name| {
				let col = table.column_by_name(name).ok_or_else(|| Error::Internal(format!("unknown column '{name}'")))?;
				let pos = table.columns.iter().position(|c| c.id == col.id).expect("resolved column belongs to this table");
				Ok(row[pos].clone())
			})?;
			Ok(truthy(&value))
		}
		None => Ok(true),
	}
}

fn table_schema(table: &TableDef) -> OutputSchema {
	OutputSchema { fields: table.columns.iter().map(|c| Field { name: c.name.clone(), data_type: c.data_type, nullable: c.nullable }).collect() }
}

fn apply_projection(schema: OutputSchema, rows: Vec<Vec<Value>>, projection: &Option<Vec<String>>) -> Result<(OutputSchema, Vec<Vec<Value>>)> {
	match projection {
		None => Ok((schema, rows)),
		Some(columns) => {
			let positions: Vec<usize> = columns
				.iter()
				.map(|name| schema.column_index(name).ok_or_else(|| Error::Internal(format!("unknown column '{name}'"))))
				.collect::<Result<_>>()?;
			let projected_schema = OutputSchema { fields: positions.iter().map(|&i| schema.fields[i].clone()).collect() };
			let projected_rows = rows.into_iter().map(|row| positions.iter().map(|&i| row[i].clone()).collect()).collect();
			Ok((projected_schema, projected_rows))
		}
	}
}

/// Evaluates `expr` against a row whose column order is given by `schema`
/// rather than a `TableDef`, for use after `Project`/`Join`/`Aggregate`
/// have already reshaped the row (those stages drop the original
/// `TableDef`, so `Expr::Column` must resolve by `OutputSchema` position
/// instead).
fn eval_against_schema(expr: &crate::plan::Expr, schema: &OutputSchema, row: &[Value]) -> Result<Value> {
	eval(expr, &|name| {
		let pos = schema.column_index(name).ok_or_else(|| Error::Internal(format!("unknown column '{name}'")))?;
		Ok(row[pos].clone())
	})
}

fn sort_rows(schema: &OutputSchema, rows: &mut [Vec<Value>], keys: &[SortKey]) -> Result<()> {
	let positions: Vec<(usize, bool)> = keys
		.iter()
		.map(|k| schema.column_index(&k.column).map(|i| (i, k.ascending)).ok_or_else(|| Error::Internal(format!("unknown column '{}'", k.column))))
		.collect::<Result<_>>()?;
	rows.sort_by(|a, b| {
		for &(pos, ascending) in &positions {
			let ord = a[pos].partial_cmp(&b[pos]).unwrap_or(std::cmp::Ordering::Equal);
			let ord = if ascending { ord } else { ord.reverse() };
			if ord != std::cmp::Ordering::Equal {
				return ord;
			}
		}
		std::cmp::Ordering::Equal
	});
	Ok(())
}

fn aggregate_rows(
	schema: &OutputSchema,
	rows: Vec<Vec<Value>>,
	group_by: &[String],
	aggregates: &[crate::plan::AggregateExpr],
) -> Result<(OutputSchema, Vec<Vec<Value>>)> {
	let group_positions: Vec<usize> =
		group_by.iter().map(|name| schema.column_index(name).ok_or_else(|| Error::Internal(format!("unknown column '{name}'")))).collect::<Result<_>>()?;
	let agg_positions: Vec<Option<usize>> = aggregates
		.iter()
		.map(|a| match &a.column {
			Some(name) => schema.column_index(name).map(Some).ok_or_else(|| Error::Internal(format!("unknown column '{name}'"))),
			None => Ok(None),
		})
		.collect::<Result<_>>()?;

	// `Value` has no `Hash`/`Eq` (NaN-bearing floats make a total equality
	// relation impossible), so groups are keyed by each row's debug-printed
	// group-by values; `IndexMap` keeps first-seen group order stable.
	let mut groups: indexmap::IndexMap<String, (Vec<Value>, Vec<Vec<Value>>)> = indexmap::IndexMap::new();
	for row in rows {
		let key_values: Vec<Value> = group_positions.iter().map(|&i| row[i].clone()).collect();
		let key = format!("{key_values:?}");
		groups.entry(key).or_insert_with(|| (key_values, Vec::new())).1.push(row);
	}

	let mut out_rows = Vec::with_capacity(groups.len());
	for (_, (key_values, group_rows)) in groups {
		let mut out = key_values;
		for (agg, pos) in aggregates.iter().zip(agg_positions.iter()) {
			out.push(compute_aggregate(agg.func, *pos, &group_rows));
		}
		out_rows.push(out);
	}

	let mut fields: Vec<Field> = group_positions.iter().map(|&i| schema.fields[i].clone()).collect();
	for agg in aggregates {
		fields.push(Field { name: agg.output_name.clone(), data_type: aggregate_output_type(agg.func), nullable: true });
	}
	Ok((OutputSchema { fields }, out_rows))
}

fn aggregate_output_type(func: AggregateFunc) -> DataType {
	match func {
		AggregateFunc::Count => DataType::BigInt { unsigned: false },
		AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max | AggregateFunc::Avg => DataType::Float8,
	}
}

/// Coerces a numeric-shaped `Value` into `f64` for aggregate math.
/// `Sum`/`Avg` only make sense over numeric columns; a non-numeric value
/// (including `NULL`) is simply excluded rather than erroring, matching
/// MySQL's own NULL-skipping aggregate semantics.
fn value_as_f64(v: &Value) -> Option<f64> {
	match v {
		Value::TinyInt(n) => Some(*n as f64),
		Value::SmallInt(n) => Some(*n as f64),
		Value::Int(n) => Some(*n as f64),
		Value::BigInt(n) => Some(*n as f64),
		Value::TinyUint(n) => Some(*n as f64),
		Value::SmallUint(n) => Some(*n as f64),
		Value::Uint(n) => Some(*n as f64),
		Value::BigUint(n) => Some(*n as f64),
		Value::Float4(n) => Some(*n as f64),
		Value::Float8(n) => Some(*n),
		Value::Decimal(d) => Some(d.mantissa as f64 / 10f64.powi(d.scale as i32)),
		_ => None,
	}
}

fn compute_aggregate(func: AggregateFunc, pos: Option<usize>, rows: &[Vec<Value>]) -> Value {
	match func {
		AggregateFunc::Count => match pos {
			Some(p) => Value::BigInt(rows.iter().filter(|r| !r[p].is_null()).count() as i64),
			None => Value::BigInt(rows.len() as i64),
		},
		AggregateFunc::Sum => Value::Float8(rows.iter().filter_map(|r| pos.and_then(|p| value_as_f64(&r[p]))).sum()),
		AggregateFunc::Avg => {
			let values: Vec<f64> = rows.iter().filter_map(|r| pos.and_then(|p| value_as_f64(&r[p]))).collect();
			if values.is_empty() {
				Value::Null
			} else {
				Value::Float8(values.iter().sum::<f64>() / values.len() as f64)
			}
		}
		AggregateFunc::Min => rows
			.iter()
			.filter_map(|r| pos.map(|p| r[p].clone()))
			.filter(|v| !v.is_null())
			.reduce(|a, b| if b.partial_cmp(&a) == Some(std::cmp::Ordering::Less) { b } else { a })
			.unwrap_or(Value::Null),
		AggregateFunc::Max => rows
			.iter()
			.filter_map(|r| pos.map(|p| r[p].clone()))
			.filter(|v| !v.is_null())
			.reduce(|a, b| if b.partial_cmp(&a) == Some(std::cmp::Ordering::Greater) { b } else { a })
			.unwrap_or(Value::Null),
	}
}

#[allow(clippy::too_many_arguments)]
fn hash_join(
	deadline: &Deadline,
	left_schema: OutputSchema,
	left_rows: Vec<Vec<Value>>,
	left_key: &str,
	right_schema: OutputSchema,
	right_rows: Vec<Vec<Value>>,
	right_key: &str,
	kind: JoinKind,
) -> Result<(OutputSchema, Vec<Vec<Value>>)> {
	let left_pos = left_schema.column_index(left_key).ok_or_else(|| Error::Internal(format!("unknown column '{left_key}'")))?;
	let right_pos = right_schema.column_index(right_key).ok_or_else(|| Error::Internal(format!("unknown column '{right_key}'")))?;

	let mut by_key: std::collections::HashMap<String, Vec<&Vec<Value>>> = std::collections::HashMap::new();
	for row in &right_rows {
		by_key.entry(format!("{:?}", row[right_pos])).or_default().push(row);
	}

	let right_width = right_schema.fields.len();
	let mut out_rows = Vec::new();
	for left_row in &left_rows {
		deadline.check()?;
		let matches = by_key.get(&format!("{:?}", left_row[left_pos]));
		match matches {
			Some(matches) if !matches.is_empty() => {
				for right_row in matches {
					let mut combined = left_row.clone();
					combined.extend((*right_row).clone());
					out_rows.push(combined);
				}
			}
			_ if kind == JoinKind::Left => {
				let mut combined = left_row.clone();
				combined.extend(std::iter::repeat(Value::Null).take(right_width));
				out_rows.push(combined);
			}
			_ => {}
		}
	}

	let mut fields = left_schema.fields;
	fields.extend(right_schema.fields);
	Ok((OutputSchema { fields }, out_rows))
}
