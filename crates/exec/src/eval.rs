use wiscdb_core::{Error, Result};
use wiscdb_type::Value;

use crate::plan::{ArithOp, BinaryOp, Expr};

/// Evaluates a scalar expression. `Column` references are resolved through
/// `resolve_column` rather than a fixed row shape, so the same evaluator
/// serves both a `TableDef`-backed row (DML, `Filter` over a raw table
/// scan) and an `OutputSchema`-backed row (`Filter`/`Project` stacked on
/// top of `Join`/`Aggregate`, which no longer carry a `TableDef`).
pub fn eval(expr: &Expr, resolve_column: &dyn Fn(&str) -> Result<Value>) -> Result<Value> {
	match expr {
		Expr::Literal(v) => Ok(v.clone()),
		Expr::Column(name) => resolve_column(name),
		Expr::Not(inner) => {
			let v = eval(inner, resolve_column)?;
			Ok(Value::Bool(!truthy(&v)))
		}
		Expr::IsNull(inner) => {
			let v = eval(inner, resolve_column)?;
			Ok(Value::Bool(v.is_null()))
		}
		Expr::Arith { op, left, right } => {
			let lv = eval(left, resolve_column)?;
			let rv = eval(right, resolve_column)?;
			arith(*op, &lv, &rv)
		}
		Expr::BinaryOp { op, left, right } => {
			let lv = eval(left, resolve_column)?;
			match op {
				BinaryOp::And => {
					if !truthy(&lv) {
						return Ok(Value::Bool(false));
					}
					let rv = eval(right, resolve_column)?;
					Ok(Value::Bool(truthy(&rv)))
				}
				BinaryOp::Or => {
					if truthy(&lv) {
						return Ok(Value::Bool(true));
					}
					let rv = eval(right, resolve_column)?;
					Ok(Value::Bool(truthy(&rv)))
				}
				_ => {
					let rv = eval(right, resolve_column)?;
					let ord = lv.partial_cmp(&rv);
					Ok(Value::Bool(match op {
						BinaryOp::Eq => ord == Some(std::cmp::Ordering::Equal),
						BinaryOp::Ne => ord != Some(std::cmp::Ordering::Equal),
						BinaryOp::Lt => ord == Some(std::cmp::Ordering::Less),
						BinaryOp::Le => matches!(ord, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)),
						BinaryOp::Gt => ord == Some(std::cmp::Ordering::Greater),
						BinaryOp::Ge => matches!(ord, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)),
						BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
					}))
				}
			}
		}
	}
}

/// A `resolve_column` that always fails, for contexts where the grammar
/// forbids column references (`INSERT ... VALUES`, spec §4.6).
pub fn no_columns(name: &str) -> Result<Value> {
	Err(Error::Internal(format!("column '{name}' is not allowed here")))
}

/// Arithmetic over two values. `+`/`-`/`*` over two integers stay integral,
/// reshaped back into the left operand's own variant (`qty - 1` on an
/// `Int` column must still encode as an `Int`, since the codec's decoder
/// picks its byte width from the column's declared type, not a
/// self-describing tag — see `wiscdb-codec`'s `encode_value`). Division,
/// or either side already being floating-point, promotes to `Float8`.
fn arith(op: ArithOp, l: &Value, r: &Value) -> Result<Value> {
	if op == ArithOp::Div || is_float(l) || is_float(r) {
		let lf = as_f64(l)?;
		let rf = as_f64(r)?;
		return Ok(Value::Float8(match op {
			ArithOp::Add => lf + rf,
			ArithOp::Sub => lf - rf,
			ArithOp::Mul => lf * rf,
			ArithOp::Div => lf / rf,
		}));
	}
	let li = l.as_i64()?;
	let ri = r.as_i64()?;
	let result = match op {
		ArithOp::Add => li.checked_add(ri),
		ArithOp::Sub => li.checked_sub(ri),
		ArithOp::Mul => li.checked_mul(ri),
		ArithOp::Div => unreachable!("handled above"),
	}
	.ok_or_else(|| Error::Internal("integer overflow in arithmetic expression".to_string()))?;
	reshape_int(l, result)
}

fn is_float(v: &Value) -> bool {
	matches!(v, Value::Float4(_) | Value::Float8(_) | Value::Decimal(_))
}

fn as_f64(v: &Value) -> Result<f64> {
	match v {
		Value::Float4(n) => Ok(*n as f64),
		Value::Float8(n) => Ok(*n),
		Value::Decimal(d) => Ok(d.mantissa as f64 / 10f64.powi(d.scale as i32)),
		other => other.as_i64().map(|n| n as f64),
	}
}

fn reshape_int(template: &Value, n: i64) -> Result<Value> {
	match template {
		Value::TinyInt(_) => i8::try_from(n).map(Value::TinyInt).map_err(|_| overflow("TINYINT")),
		Value::SmallInt(_) => i16::try_from(n).map(Value::SmallInt).map_err(|_| overflow("SMALLINT")),
		Value::Int(_) => i32::try_from(n).map(Value::Int).map_err(|_| overflow("INT")),
		Value::BigInt(_) => Ok(Value::BigInt(n)),
		Value::TinyUint(_) => u8::try_from(n).map(Value::TinyUint).map_err(|_| overflow("TINYINT UNSIGNED")),
		Value::SmallUint(_) => u16::try_from(n).map(Value::SmallUint).map_err(|_| overflow("SMALLINT UNSIGNED")),
		Value::Uint(_) => u32::try_from(n).map(Value::Uint).map_err(|_| overflow("INT UNSIGNED")),
		Value::BigUint(_) => u64::try_from(n).map(Value::BigUint).map_err(|_| overflow("BIGINT UNSIGNED")),
		_ => Ok(Value::BigInt(n)),
	}
}

fn overflow(type_name: &str) -> Error {
	Error::Internal(format!("arithmetic result out of range for {type_name}"))
}

/// MySQL-style truthiness: `NULL` and `false`/`0` are falsy, everything else
/// is truthy. Used by `Filter` to decide whether a row passes the predicate.
pub fn truthy(v: &Value) -> bool {
	match v {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::TinyInt(n) => *n != 0,
		Value::SmallInt(n) => *n != 0,
		Value::Int(n) => *n != 0,
		Value::BigInt(n) => *n != 0,
		Value::TinyUint(n) => *n != 0,
		Value::SmallUint(n) => *n != 0,
		Value::Uint(n) => *n != 0,
		Value::BigUint(n) => *n != 0,
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn literal_equality_with_no_row_context() {
		let expr = Expr::BinaryOp { op: BinaryOp::Eq, left: Box::new(Expr::Literal(Value::Int(1))), right: Box::new(Expr::Literal(Value::Int(1))) };
		let result = eval(&expr, &no_columns).unwrap();
		assert!(truthy(&result));
	}

	#[test]
	fn and_short_circuits_on_falsy_left() {
		let expr = Expr::BinaryOp {
			op: BinaryOp::And,
			left: Box::new(Expr::Literal(Value::Bool(false))),
			right: Box::new(Expr::Column("whatever".to_string())),
		};
		// no column resolver given; if short-circuit didn't happen this would error
		let result = eval(&expr, &no_columns).unwrap();
		assert!(!truthy(&result));
	}

	#[test]
	fn subtraction_stays_in_the_left_operands_integer_variant() {
		let expr = Expr::Arith { op: ArithOp::Sub, left: Box::new(Expr::Literal(Value::Int(10))), right: Box::new(Expr::Literal(Value::Int(1))) };
		assert_eq!(eval(&expr, &no_columns).unwrap(), Value::Int(9));
	}

	#[test]
	fn division_promotes_to_float() {
		let expr = Expr::Arith { op: ArithOp::Div, left: Box::new(Expr::Literal(Value::Int(7))), right: Box::new(Expr::Literal(Value::Int(2))) };
		assert_eq!(eval(&expr, &no_columns).unwrap(), Value::Float8(3.5));
	}
}
