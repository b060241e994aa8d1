//! `ORDER BY` terms

use crate::compiler::SqlCompiler;
use crate::error::Result;
use crate::expression::{Expr, Expression, take_sources};
use sqlweave_backends::{SqlFragment, Vendor};
use std::fmt;

/// Where `NULL`s sort relative to other values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
	First,
	Last,
}

/// An expression with a sort direction.
#[derive(Debug, Clone)]
pub struct OrderBy {
	expression: Expr,
	descending: bool,
	nulls: Option<NullsOrder>,
}

impl OrderBy {
	pub fn new(expression: Expr, descending: bool) -> Self {
		Self {
			expression,
			descending,
			nulls: None,
		}
	}

	pub fn nulls_first(mut self) -> Self {
		self.nulls = Some(NullsOrder::First);
		self
	}

	pub fn nulls_last(mut self) -> Self {
		self.nulls = Some(NullsOrder::Last);
		self
	}

	pub fn asc(mut self) -> Self {
		self.descending = false;
		self
	}

	pub fn desc(mut self) -> Self {
		self.descending = true;
		self
	}

	pub fn is_descending(&self) -> bool {
		self.descending
	}

	pub fn expression(&self) -> &Expr {
		&self.expression
	}

	fn direction(&self) -> &'static str {
		if self.descending { "DESC" } else { "ASC" }
	}
}

impl fmt::Display for OrderBy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "OrderBy({}, descending={})", self.expression, self.descending)
	}
}

impl Expression for OrderBy {
	fn name(&self) -> &str {
		"OrderBy"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let (sql, params) = compiler.compile(&self.expression)?;
		let mut ordered = format!("{} {}", sql, self.direction());
		match self.nulls {
			Some(NullsOrder::First) => ordered.push_str(" NULLS FIRST"),
			Some(NullsOrder::Last) => ordered.push_str(" NULLS LAST"),
			None => {}
		}
		Ok((ordered, params))
	}

	// MySQL and SQLite have no NULLS FIRST/LAST; sort on a null test first.
	fn as_vendor_sql(&self, compiler: &SqlCompiler<'_>, vendor: Vendor) -> Option<Result<SqlFragment>> {
		let nulls = self.nulls?;
		if vendor == Vendor::Postgresql {
			return None;
		}
		Some(compiler.compile(&self.expression).map(|(sql, params)| {
			let null_test = match (vendor, nulls) {
				(Vendor::Mysql, NullsOrder::Last) => format!("IF(ISNULL({}),1,0)", sql),
				(Vendor::Mysql, NullsOrder::First) => format!("IF(ISNULL({}),0,1)", sql),
				(_, NullsOrder::Last) => format!("{} IS NULL", sql),
				(_, NullsOrder::First) => format!("{} IS NOT NULL", sql),
			};
			let mut all_params = params.clone();
			all_params.extend(params);
			(format!("{}, {} {}", null_test, sql, self.direction()), all_params)
		}))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.expression.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [expression] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self {
			expression,
			descending: self.descending,
			nulls: self.nulls,
		}))
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		self.expression.group_by_cols()
	}

	fn reverse_ordering(&self) -> Expr {
		let nulls = self.nulls.map(|nulls| match nulls {
			NullsOrder::First => NullsOrder::Last,
			NullsOrder::Last => NullsOrder::First,
		});
		Expr::new(Self {
			expression: self.expression.clone(),
			descending: !self.descending,
			nulls,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::combinable::IntoExpr;
	use crate::leaves::{Col, Value};
	use crate::query::Column;
	use rstest::rstest;
	use sqlweave_backends::{DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations};
	use sqlweave_core::FieldType;

	fn rank() -> Expr {
		Col::new("player", Column::new("rank", FieldType::IntegerField)).into_expr()
	}

	fn sql(ops: &dyn DatabaseOperations, expr: &Expr) -> SqlFragment {
		SqlCompiler::new(ops).compile(expr).unwrap()
	}

	#[rstest]
	fn test_asc_and_desc() {
		let ops = PostgresOperations::new();
		assert_eq!(sql(&ops, &rank().asc()).0, "\"player\".\"rank\" ASC");
		assert_eq!(sql(&ops, &rank().desc()).0, "\"player\".\"rank\" DESC");
	}

	#[rstest]
	fn test_reverse_ordering_flips() {
		let ordered = rank().desc();
		let reversed = ordered.reverse_ordering();
		let reversed = reversed.downcast_ref::<OrderBy>().unwrap();
		assert!(!reversed.is_descending());
		assert!(OrderBy::new(rank(), false).desc().is_descending());
	}

	#[rstest]
	#[case(Vendor::Postgresql, "\"player\".\"rank\" DESC NULLS LAST")]
	#[case(Vendor::Sqlite, "\"player\".\"rank\" IS NULL, \"player\".\"rank\" DESC")]
	#[case(Vendor::Mysql, "IF(ISNULL(`player`.`rank`),1,0), `player`.`rank` DESC")]
	fn test_nulls_last(#[case] vendor: Vendor, #[case] expected: &str) {
		let ordering = OrderBy::new(rank(), true).nulls_last().into_expr();
		let (out, _) = match vendor {
			Vendor::Postgresql => sql(&PostgresOperations::new(), &ordering),
			Vendor::Mysql => sql(&MySqlOperations::default(), &ordering),
			Vendor::Sqlite => sql(&SqliteOperations::new(), &ordering),
		};
		assert_eq!(out, expected);
	}

	#[rstest]
	fn test_emulated_nulls_order_repeats_params() {
		let ordering = OrderBy::new(Value::new(1).into_expr(), false).nulls_first().into_expr();
		let (out, params) = sql(&SqliteOperations::new(), &ordering);
		assert_eq!(out, "%s IS NOT NULL, %s ASC");
		assert_eq!(params.len(), 2);
	}

	#[rstest]
	fn test_group_by_comes_from_expression() {
		let cols = rank().asc().group_by_cols();
		assert_eq!(cols.len(), 1);
		assert!(cols[0].is::<Col>());
	}
}
