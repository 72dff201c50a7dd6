//! A minimal recursive-descent SQL-to-`PlanNode` frontend. Not part of the
//! execution engine proper (spec §1 treats an external SQL frontend as a
//! given); this is this workspace's own stand-in so the engine can be
//! exercised end-to-end without pulling in a full parser/planner project.
//! See `DESIGN.md` for why this boundary is drawn here.

mod lexer;
mod parser;

pub use parser::parse_statement;
