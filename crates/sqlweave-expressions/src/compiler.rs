//! Depth-first compilation of resolved trees

use crate::error::Result;
use crate::expression::Expr;
use crate::query::QueryContext;
use sqlweave_backends::{DatabaseOperations, SqlFragment, Statement, finalize_sql};

/// Walks a resolved tree and asks every node for its SQL.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{IntoExpr, SqlCompiler, Value};
///
/// let ops = PostgresOperations::new();
/// let compiler = SqlCompiler::new(&ops);
/// let expr = Value::new(2).into_expr() + 3;
/// let statement = compiler.compile_statement(&expr).unwrap();
/// assert_eq!(statement.sql, "($1 + $2)");
/// ```
#[derive(Clone, Copy)]
pub struct SqlCompiler<'a> {
	ops: &'a dyn DatabaseOperations,
	query: Option<&'a dyn QueryContext>,
}

impl<'a> SqlCompiler<'a> {
	pub fn new(ops: &'a dyn DatabaseOperations) -> Self {
		Self { ops, query: None }
	}

	/// Use `query` to decide which aliases stay unquoted.
	pub fn with_query(mut self, query: &'a dyn QueryContext) -> Self {
		self.query = Some(query);
		self
	}

	pub fn ops(&self) -> &'a dyn DatabaseOperations {
		self.ops
	}

	/// Render one node, preferring its vendor-specific form.
	pub fn compile(&self, expr: &Expr) -> Result<SqlFragment> {
		let fragment = match expr.as_vendor_sql(self, self.ops.vendor()) {
			Some(rendered) => rendered?,
			None => expr.as_sql(self)?,
		};
		tracing::trace!(
			node = expr.name(),
			sql = %fragment.0,
			params = fragment.1.len(),
			"compiled expression"
		);
		Ok(fragment)
	}

	/// Quote `name` unless the query registered it as a generated alias.
	pub fn quote_name_unless_alias(&self, name: &str) -> String {
		if self.query.is_some_and(|q| q.is_unquoted_alias(name)) {
			return name.to_string();
		}
		self.ops.quote_name(name)
	}

	/// Compile `expr` and rewrite its placeholders for the vendor.
	pub fn compile_statement(&self, expr: &Expr) -> Result<Statement> {
		let (sql, params) = self.compile(expr)?;
		let sql = finalize_sql(&sql, self.ops.vendor());
		tracing::debug!(vendor = %self.ops.vendor(), sql = %sql, params = ?params, "compiled statement");
		Ok(Statement { sql, params })
	}
}

impl std::fmt::Debug for SqlCompiler<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqlCompiler")
			.field("vendor", &self.ops.vendor())
			.field("has_query", &self.query.is_some())
			.finish()
	}
}
