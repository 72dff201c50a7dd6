use wiscdb_core::IndexId;
use wiscdb_type::Value;

/// The resolved plan nodes the execution engine accepts (spec §4.6). In the
/// full system these are produced by an external SQL frontend (parser +
/// analyzer + cost-based optimizer); the core's obligation starts at "given
/// a plan, produce a row iterator and schema" (spec §1). `wiscdb-exec`'s own
/// `frontend` module is a minimal stand-in that satisfies that contract for
/// this workspace's end-to-end tests — see `DESIGN.md`.
#[derive(Debug, Clone)]
pub enum PlanNode {
	CreateDatabase { name: String, if_not_exists: bool },
	DropDatabase { name: String, if_exists: bool },
	CreateTable { name: String, schema: TableSchema, if_not_exists: bool },
	DropTable { name: String, if_exists: bool },
	Use { database: String },

	Insert { table: String, columns: Option<Vec<String>>, rows: Vec<Vec<Expr>> },
	Update { table: String, assignments: Vec<(String, Expr)>, filter: Option<Expr> },
	Delete { table: String, filter: Option<Expr> },

	TableScan { table: String, projection: Option<Vec<String>>, filter: Option<Expr> },
	IndexScan { table: String, index: IndexId, values: Vec<Value>, projection: Option<Vec<String>> },

	BeginTxn,
	Commit,
	Rollback,

	/// Wraps an input plan and restricts its columns to `columns` by name.
	Project { input: Box<PlanNode>, columns: Vec<String> },
	/// Wraps an input plan and keeps only rows for which `predicate` is
	/// truthy.
	Filter { input: Box<PlanNode>, predicate: Expr },
	Limit { input: Box<PlanNode>, limit: Option<u64>, offset: u64 },
	Sort { input: Box<PlanNode>, keys: Vec<SortKey> },
	Aggregate { input: Box<PlanNode>, group_by: Vec<String>, aggregates: Vec<AggregateExpr> },
	Join { left: Box<PlanNode>, right: Box<PlanNode>, left_key: String, right_key: String, kind: JoinKind },

	ShowDatabases,
	ShowTables,
	ShowVariables { like: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
	Inner,
	Left,
}

#[derive(Debug, Clone)]
pub struct SortKey {
	pub column: String,
	pub ascending: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateExpr {
	pub func: AggregateFunc,
	/// `None` for `COUNT(*)`.
	pub column: Option<String>,
	pub output_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
	Count,
	Sum,
	Min,
	Max,
	Avg,
}

/// A column/type pair plus the table-level constraints `CREATE TABLE`
/// collects, independent of `wiscdb-sal`'s `NewTable` so the plan layer
/// doesn't need to depend on the storage crate's DDL request shape directly
/// (kept anyway as a near-mirror; see `ddl::to_new_table`).
#[derive(Debug, Clone)]
pub struct TableSchema {
	pub columns: Vec<ColumnSchema>,
	pub primary_key: Option<Vec<String>>,
	pub indexes: Vec<IndexSchema>,
}

#[derive(Debug, Clone)]
pub struct ColumnSchema {
	pub name: String,
	pub data_type: wiscdb_type::DataType,
	pub nullable: bool,
	pub auto_increment: bool,
	pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct IndexSchema {
	pub name: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

/// A scalar expression evaluated row-at-a-time by `Filter`, `Project`'s
/// computed columns (not yet supported — only column references today, see
/// `DESIGN.md`), `INSERT ... VALUES`, and `UPDATE ... SET`.
#[derive(Debug, Clone)]
pub enum Expr {
	Literal(Value),
	Column(String),
	BinaryOp { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
	Arith { op: ArithOp, left: Box<Expr>, right: Box<Expr> },
	Not(Box<Expr>),
	IsNull(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
	Add,
	Sub,
	Mul,
	Div,
}
