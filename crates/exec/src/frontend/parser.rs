use wiscdb_core::{Error, Result};
use wiscdb_type::{DataType, Value};

use super::lexer::{Lexer, Token};
use crate::plan::{ArithOp, BinaryOp, ColumnSchema, Expr, IndexSchema, PlanNode, SortKey, TableSchema};

/// Parses one SQL statement into a `PlanNode`. Covers the DDL/DML/`SHOW`
/// subset this workspace's end-to-end tests exercise (see the `frontend`
/// module doc comment) — not a general SQL grammar.
pub fn parse_statement(sql: &str) -> Result<PlanNode> {
	let tokens = Lexer::new(sql).tokenize()?;
	let mut parser = Parser { tokens, pos: 0 };
	let plan = parser.statement()?;
	parser.expect_statement_end()?;
	Ok(plan)
}

struct Parser {
	tokens: Vec<Token>,
	pos: usize,
}

impl Parser {
	fn peek(&self) -> &Token {
		&self.tokens[self.pos]
	}

	fn advance(&mut self) -> Token {
		let tok = self.tokens[self.pos].clone();
		if self.pos + 1 < self.tokens.len() {
			self.pos += 1;
		}
		tok
	}

	fn expect_statement_end(&mut self) -> Result<()> {
		if matches!(self.peek(), Token::Semicolon) {
			self.advance();
		}
		match self.peek() {
			Token::Eof => Ok(()),
			other => Err(Error::SyntaxError { message: format!("unexpected trailing input near {other:?}") }),
		}
	}

	/// Consumes the next token as an identifier, case-insensitively
	/// matching `keyword`.
	fn eat_keyword(&mut self, keyword: &str) -> bool {
		if let Token::Ident(s) = self.peek() {
			if s.eq_ignore_ascii_case(keyword) {
				self.advance();
				return true;
			}
		}
		false
	}

	fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
		if self.eat_keyword(keyword) {
			Ok(())
		} else {
			Err(Error::SyntaxError { message: format!("expected keyword '{keyword}', found {:?}", self.peek()) })
		}
	}

	fn peek_keyword(&self, keyword: &str) -> bool {
		matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
	}

	fn expect_ident(&mut self) -> Result<String> {
		match self.advance() {
			Token::Ident(s) => Ok(s),
			other => Err(Error::SyntaxError { message: format!("expected identifier, found {other:?}") }),
		}
	}

	fn expect(&mut self, tok: Token) -> Result<()> {
		let next = self.advance();
		if next == tok {
			Ok(())
		} else {
			Err(Error::SyntaxError { message: format!("expected {tok:?}, found {next:?}") })
		}
	}

	fn eat(&mut self, tok: &Token) -> bool {
		if self.peek() == tok {
			self.advance();
			true
		} else {
			false
		}
	}

	fn statement(&mut self) -> Result<PlanNode> {
		if self.eat_keyword("CREATE") {
			if self.eat_keyword("DATABASE") || self.eat_keyword("SCHEMA") {
				return self.create_database();
			}
			self.expect_keyword("TABLE")?;
			return self.create_table();
		}
		if self.eat_keyword("DROP") {
			if self.eat_keyword("DATABASE") || self.eat_keyword("SCHEMA") {
				return self.drop_database();
			}
			self.expect_keyword("TABLE")?;
			return self.drop_table();
		}
		if self.eat_keyword("USE") {
			let database = self.expect_ident()?;
			return Ok(PlanNode::Use { database });
		}
		if self.eat_keyword("INSERT") {
			self.expect_keyword("INTO")?;
			return self.insert();
		}
		if self.eat_keyword("UPDATE") {
			return self.update();
		}
		if self.eat_keyword("DELETE") {
			self.expect_keyword("FROM")?;
			return self.delete();
		}
		if self.eat_keyword("SELECT") {
			return self.select();
		}
		if self.eat_keyword("BEGIN") {
			let _ = self.eat_keyword("WORK");
			return Ok(PlanNode::BeginTxn);
		}
		if self.eat_keyword("START") {
			self.expect_keyword("TRANSACTION")?;
			return Ok(PlanNode::BeginTxn);
		}
		if self.eat_keyword("COMMIT") {
			let _ = self.eat_keyword("WORK");
			return Ok(PlanNode::Commit);
		}
		if self.eat_keyword("ROLLBACK") {
			let _ = self.eat_keyword("WORK");
			return Ok(PlanNode::Rollback);
		}
		if self.eat_keyword("SHOW") {
			return self.show();
		}
		Err(Error::SyntaxError { message: format!("unrecognized statement starting at {:?}", self.peek()) })
	}

	fn if_not_exists(&mut self) -> bool {
		if self.peek_keyword("IF") {
			let save = self.pos;
			self.advance();
			if self.eat_keyword("NOT") && self.eat_keyword("EXISTS") {
				return true;
			}
			self.pos = save;
		}
		false
	}

	fn if_exists(&mut self) -> bool {
		if self.peek_keyword("IF") {
			let save = self.pos;
			self.advance();
			if self.eat_keyword("EXISTS") {
				return true;
			}
			self.pos = save;
		}
		false
	}

	fn create_database(&mut self) -> Result<PlanNode> {
		let if_not_exists = self.if_not_exists();
		let name = self.expect_ident()?;
		Ok(PlanNode::CreateDatabase { name, if_not_exists })
	}

	fn drop_database(&mut self) -> Result<PlanNode> {
		let if_exists = self.if_exists();
		let name = self.expect_ident()?;
		Ok(PlanNode::DropDatabase { name, if_exists })
	}

	fn create_table(&mut self) -> Result<PlanNode> {
		let if_not_exists = self.if_not_exists();
		let name = self.expect_ident()?;
		self.expect(Token::LParen)?;

		let mut columns = Vec::new();
		let mut primary_key = None;
		let mut indexes = Vec::new();

		loop {
			if self.peek_keyword("PRIMARY") {
				self.advance();
				self.expect_keyword("KEY")?;
				primary_key = Some(self.parenthesized_column_list()?);
			} else if self.peek_keyword("UNIQUE") || self.peek_keyword("INDEX") || self.peek_keyword("KEY") {
				let unique = self.eat_keyword("UNIQUE");
				let _ = self.eat_keyword("INDEX") || self.eat_keyword("KEY");
				let index_name = self.expect_ident()?;
				let index_columns = self.parenthesized_column_list()?;
				indexes.push(IndexSchema { name: index_name, columns: index_columns, unique });
			} else {
				columns.push(self.column_def()?);
			}
			if self.eat(&Token::Comma) {
				continue;
			}
			break;
		}
		self.expect(Token::RParen)?;

		Ok(PlanNode::CreateTable { name, schema: TableSchema { columns, primary_key, indexes }, if_not_exists })
	}

	fn parenthesized_column_list(&mut self) -> Result<Vec<String>> {
		self.expect(Token::LParen)?;
		let mut names = vec![self.expect_ident()?];
		while self.eat(&Token::Comma) {
			names.push(self.expect_ident()?);
		}
		self.expect(Token::RParen)?;
		Ok(names)
	}

	fn column_def(&mut self) -> Result<ColumnSchema> {
		let name = self.expect_ident()?;
		let data_type = self.data_type()?;
		let mut nullable = true;
		let mut auto_increment = false;
		let mut default = None;
		loop {
			if self.eat_keyword("NOT") {
				self.expect_keyword("NULL")?;
				nullable = false;
			} else if self.peek_keyword("NULL") {
				self.advance();
				nullable = true;
			} else if self.eat_keyword("AUTO_INCREMENT") {
				auto_increment = true;
			} else if self.eat_keyword("PRIMARY") {
				self.expect_keyword("KEY")?;
				nullable = false;
			} else if self.eat_keyword("DEFAULT") {
				default = Some(self.literal_value()?);
			} else {
				break;
			}
		}
		Ok(ColumnSchema { name, data_type, nullable, auto_increment, default })
	}

	fn data_type(&mut self) -> Result<DataType> {
		let name = self.expect_ident()?;
		let upper = name.to_ascii_uppercase();
		let data_type = match upper.as_str() {
			"BOOL" | "BOOLEAN" => DataType::Bool,
			"TINYINT" => DataType::TinyInt { unsigned: self.eat_unsigned() },
			"SMALLINT" => DataType::SmallInt { unsigned: self.eat_unsigned() },
			"INT" | "INTEGER" => DataType::Int { unsigned: self.eat_unsigned() },
			"BIGINT" => DataType::BigInt { unsigned: self.eat_unsigned() },
			"FLOAT" => DataType::Float4,
			"DOUBLE" => DataType::Float8,
			"DECIMAL" | "NUMERIC" => {
				let (precision, scale) = self.decimal_params()?;
				DataType::Decimal { precision, scale }
			}
			"VARCHAR" => DataType::Varchar { max_len: self.paren_u32()?.unwrap_or(255) },
			"CHAR" => DataType::Char { len: self.paren_u32()?.unwrap_or(1) },
			"TEXT" => DataType::Varchar { max_len: 65535 },
			"BINARY" | "VARBINARY" => DataType::Binary { max_len: self.paren_u32()?.unwrap_or(1) },
			"BLOB" => DataType::Blob,
			"DATE" => DataType::Date,
			"TIME" => DataType::Time,
			"DATETIME" => DataType::DateTime,
			"TIMESTAMP" => DataType::Timestamp,
			"JSON" => DataType::Json,
			other => return Err(Error::SyntaxError { message: format!("unknown data type '{other}'") }),
		};
		Ok(data_type)
	}

	fn eat_unsigned(&mut self) -> bool {
		self.eat_keyword("UNSIGNED")
	}

	fn paren_u32(&mut self) -> Result<Option<u32>> {
		if !self.eat(&Token::LParen) {
			return Ok(None);
		}
		let n = self.expect_number_u32()?;
		self.expect(Token::RParen)?;
		Ok(Some(n))
	}

	fn decimal_params(&mut self) -> Result<(u8, u8)> {
		if !self.eat(&Token::LParen) {
			return Ok((10, 0));
		}
		let precision = self.expect_number_u32()? as u8;
		let scale = if self.eat(&Token::Comma) { self.expect_number_u32()? as u8 } else { 0 };
		self.expect(Token::RParen)?;
		Ok((precision, scale))
	}

	fn expect_number_u32(&mut self) -> Result<u32> {
		match self.advance() {
			Token::NumberLit(s) => s.parse().map_err(|_| Error::SyntaxError { message: format!("invalid number literal '{s}'") }),
			other => Err(Error::SyntaxError { message: format!("expected number, found {other:?}") }),
		}
	}

	fn drop_table(&mut self) -> Result<PlanNode> {
		let if_exists = self.if_exists();
		let name = self.expect_ident()?;
		Ok(PlanNode::DropTable { name, if_exists })
	}

	fn insert(&mut self) -> Result<PlanNode> {
		let table = self.expect_ident()?;
		let columns = if self.eat(&Token::LParen) {
			let mut names = vec![self.expect_ident()?];
			while self.eat(&Token::Comma) {
				names.push(self.expect_ident()?);
			}
			self.expect(Token::RParen)?;
			Some(names)
		} else {
			None
		};
		self.expect_keyword("VALUES")?;
		let mut rows = vec![self.value_row()?];
		while self.eat(&Token::Comma) {
			rows.push(self.value_row()?);
		}
		Ok(PlanNode::Insert { table, columns, rows })
	}

	fn value_row(&mut self) -> Result<Vec<Expr>> {
		self.expect(Token::LParen)?;
		let mut exprs = vec![self.expr()?];
		while self.eat(&Token::Comma) {
			exprs.push(self.expr()?);
		}
		self.expect(Token::RParen)?;
		Ok(exprs)
	}

	fn update(&mut self) -> Result<PlanNode> {
		let table = self.expect_ident()?;
		self.expect_keyword("SET")?;
		let mut assignments = vec![self.assignment()?];
		while self.eat(&Token::Comma) {
			assignments.push(self.assignment()?);
		}
		let filter = self.optional_where()?;
		Ok(PlanNode::Update { table, assignments, filter })
	}

	fn assignment(&mut self) -> Result<(String, Expr)> {
		let name = self.expect_ident()?;
		self.expect(Token::Eq)?;
		let expr = self.expr()?;
		Ok((name, expr))
	}

	fn delete(&mut self) -> Result<PlanNode> {
		let table = self.expect_ident()?;
		let filter = self.optional_where()?;
		Ok(PlanNode::Delete { table, filter })
	}

	fn optional_where(&mut self) -> Result<Option<Expr>> {
		if self.eat_keyword("WHERE") {
			Ok(Some(self.expr()?))
		} else {
			Ok(None)
		}
	}

	fn select(&mut self) -> Result<PlanNode> {
		let projection = if self.eat(&Token::Star) {
			None
		} else {
			let mut names = vec![self.expect_ident()?];
			while self.eat(&Token::Comma) {
				names.push(self.expect_ident()?);
			}
			Some(names)
		};
		self.expect_keyword("FROM")?;
		let table = self.expect_ident()?;
		let filter = self.optional_where()?;

		let mut plan = PlanNode::TableScan { table, projection: projection.clone(), filter };

		if self.eat_keyword("ORDER") {
			self.expect_keyword("BY")?;
			let mut keys = vec![self.order_key()?];
			while self.eat(&Token::Comma) {
				keys.push(self.order_key()?);
			}
			plan = PlanNode::Sort { input: Box::new(plan), keys };
		}

		if self.eat_keyword("LIMIT") {
			let limit = self.expect_number_u32()? as u64;
			let offset = if self.eat_keyword("OFFSET") { self.expect_number_u32()? as u64 } else { 0 };
			plan = PlanNode::Limit { input: Box::new(plan), limit: Some(limit), offset };
		}

		Ok(plan)
	}

	fn order_key(&mut self) -> Result<SortKey> {
		let column = self.expect_ident()?;
		let ascending = if self.eat_keyword("DESC") {
			false
		} else {
			let _ = self.eat_keyword("ASC");
			true
		};
		Ok(SortKey { column, ascending })
	}

	fn show(&mut self) -> Result<PlanNode> {
		if self.eat_keyword("DATABASES") {
			return Ok(PlanNode::ShowDatabases);
		}
		if self.eat_keyword("TABLES") {
			return Ok(PlanNode::ShowTables);
		}
		if self.eat_keyword("VARIABLES") {
			let like = if self.eat_keyword("LIKE") { Some(self.expect_string()?) } else { None };
			return Ok(PlanNode::ShowVariables { like });
		}
		Err(Error::SyntaxError { message: format!("unsupported SHOW statement near {:?}", self.peek()) })
	}

	fn expect_string(&mut self) -> Result<String> {
		match self.advance() {
			Token::StringLit(s) => Ok(s),
			other => Err(Error::SyntaxError { message: format!("expected string literal, found {other:?}") }),
		}
	}

	fn literal_value(&mut self) -> Result<Value> {
		match self.advance() {
			Token::StringLit(s) => Ok(Value::Varchar(s)),
			Token::NumberLit(s) => Ok(parse_number(&s)),
			Token::Ident(s) if s.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
			Token::Ident(s) if s.eq_ignore_ascii_case("TRUE") => Ok(Value::Bool(true)),
			Token::Ident(s) if s.eq_ignore_ascii_case("FALSE") => Ok(Value::Bool(false)),
			other => Err(Error::SyntaxError { message: format!("expected a literal value, found {other:?}") }),
		}
	}

	// Expression grammar, weakest to strongest binding:
	//   or_expr   := and_expr (OR and_expr)*
	//   and_expr  := not_expr (AND not_expr)*
	//   not_expr  := NOT? comparison
	//   comparison:= additive ((= | <> | < | <= | > | >=) additive)?
	//                | additive IS [NOT] NULL
	//   additive  := term (('+' | '-') term)*
	//   term      := primary (('*' | '/') primary)*
	//   primary   := literal | column | '(' or_expr ')' | '-' primary
	fn expr(&mut self) -> Result<Expr> {
		self.or_expr()
	}

	fn or_expr(&mut self) -> Result<Expr> {
		let mut left = self.and_expr()?;
		while self.eat_keyword("OR") {
			let right = self.and_expr()?;
			left = Expr::BinaryOp { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right) };
		}
		Ok(left)
	}

	fn and_expr(&mut self) -> Result<Expr> {
		let mut left = self.not_expr()?;
		while self.eat_keyword("AND") {
			let right = self.not_expr()?;
			left = Expr::BinaryOp { op: BinaryOp::And, left: Box::new(left), right: Box::new(right) };
		}
		Ok(left)
	}

	fn not_expr(&mut self) -> Result<Expr> {
		if self.eat_keyword("NOT") {
			Ok(Expr::Not(Box::new(self.comparison()?)))
		} else {
			self.comparison()
		}
	}

	fn comparison(&mut self) -> Result<Expr> {
		let left = self.additive()?;
		if self.eat_keyword("IS") {
			let negate = self.eat_keyword("NOT");
			self.expect_keyword("NULL")?;
			let is_null = Expr::IsNull(Box::new(left));
			return Ok(if negate { Expr::Not(Box::new(is_null)) } else { is_null });
		}
		let op = match self.peek() {
			Token::Eq => Some(BinaryOp::Eq),
			Token::NotEq => Some(BinaryOp::Ne),
			Token::Lt => Some(BinaryOp::Lt),
			Token::LtEq => Some(BinaryOp::Le),
			Token::Gt => Some(BinaryOp::Gt),
			Token::GtEq => Some(BinaryOp::Ge),
			_ => None,
		};
		match op {
			Some(op) => {
				self.advance();
				let right = self.additive()?;
				Ok(Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) })
			}
			None => Ok(left),
		}
	}

	fn additive(&mut self) -> Result<Expr> {
		let mut left = self.term()?;
		loop {
			let op = match self.peek() {
				Token::Plus => ArithOp::Add,
				Token::Minus => ArithOp::Sub,
				_ => break,
			};
			self.advance();
			let right = self.term()?;
			left = Expr::Arith { op, left: Box::new(left), right: Box::new(right) };
		}
		Ok(left)
	}

	fn term(&mut self) -> Result<Expr> {
		let mut left = self.primary()?;
		loop {
			let op = match self.peek() {
				Token::Star => ArithOp::Mul,
				Token::Slash => ArithOp::Div,
				_ => break,
			};
			self.advance();
			let right = self.primary()?;
			left = Expr::Arith { op, left: Box::new(left), right: Box::new(right) };
		}
		Ok(left)
	}

	fn primary(&mut self) -> Result<Expr> {
		if self.eat(&Token::LParen) {
			let inner = self.or_expr()?;
			self.expect(Token::RParen)?;
			return Ok(inner);
		}
		if self.eat(&Token::Minus) {
			let inner = self.primary()?;
			return Ok(Expr::Arith { op: ArithOp::Sub, left: Box::new(Expr::Literal(Value::Int(0))), right: Box::new(inner) });
		}
		match self.advance() {
			Token::StringLit(s) => Ok(Expr::Literal(Value::Varchar(s))),
			Token::NumberLit(s) => Ok(Expr::Literal(parse_number(&s))),
			Token::Ident(s) if s.eq_ignore_ascii_case("NULL") => Ok(Expr::Literal(Value::Null)),
			Token::Ident(s) if s.eq_ignore_ascii_case("TRUE") => Ok(Expr::Literal(Value::Bool(true))),
			Token::Ident(s) if s.eq_ignore_ascii_case("FALSE") => Ok(Expr::Literal(Value::Bool(false))),
			Token::Ident(s) => Ok(Expr::Column(s)),
			other => Err(Error::SyntaxError { message: format!("expected an expression, found {other:?}") }),
		}
	}
}

/// Picks `Int` for a plain integer literal and `Float8` for anything with a
/// decimal point; the executor's own coercions (e.g. auto-increment column
/// insertion) widen further as needed.
fn parse_number(text: &str) -> Value {
	if text.contains('.') {
		Value::Float8(text.parse().unwrap_or(0.0))
	} else {
		match text.parse::<i64>() {
			Ok(n) => Value::BigInt(n),
			Err(_) => Value::Float8(text.parse().unwrap_or(0.0)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_create_table_with_primary_key() {
		let plan = parse_statement("CREATE TABLE users (id INT, name VARCHAR(64), PRIMARY KEY (id))").unwrap();
		match plan {
			PlanNode::CreateTable { name, schema, if_not_exists } => {
				assert_eq!(name, "users");
				assert!(!if_not_exists);
				assert_eq!(schema.columns.len(), 2);
				assert_eq!(schema.primary_key, Some(vec!["id".to_string()]));
			}
			other => panic!("unexpected plan {other:?}"),
		}
	}

	#[test]
	fn parses_insert_with_column_list() {
		let plan = parse_statement("INSERT INTO users (id, name) VALUES (1, 'alice')").unwrap();
		match plan {
			PlanNode::Insert { table, columns, rows } => {
				assert_eq!(table, "users");
				assert_eq!(columns, Some(vec!["id".to_string(), "name".to_string()]));
				assert_eq!(rows.len(), 1);
			}
			other => panic!("unexpected plan {other:?}"),
		}
	}

	#[test]
	fn parses_select_with_where_order_and_limit() {
		let plan = parse_statement("SELECT id, name FROM users WHERE id > 1 ORDER BY name DESC LIMIT 10 OFFSET 5").unwrap();
		match plan {
			PlanNode::Limit { limit, offset, .. } => {
				assert_eq!(limit, Some(10));
				assert_eq!(offset, 5);
			}
			other => panic!("unexpected plan {other:?}"),
		}
	}

	#[test]
	fn parses_show_variables_like() {
		let plan = parse_statement("SHOW VARIABLES LIKE 'auto%'").unwrap();
		assert!(matches!(plan, PlanNode::ShowVariables { like: Some(ref s) } if s == "auto%"));
	}

	#[test]
	fn rejects_garbage_trailing_input() {
		assert!(parse_statement("SELECT * FROM users; garbage").is_err());
	}

	#[test]
	fn parses_update_with_arithmetic_assignment() {
		let plan = parse_statement("UPDATE items SET qty = qty - 1 WHERE id = 1").unwrap();
		match plan {
			PlanNode::Update { table, assignments, filter } => {
				assert_eq!(table, "items");
				assert_eq!(assignments.len(), 1);
				assert_eq!(assignments[0].0, "qty");
				assert!(matches!(assignments[0].1, Expr::Arith { op: ArithOp::Sub, .. }));
				assert!(filter.is_some());
			}
			other => panic!("unexpected plan {other:?}"),
		}
	}
}
