//! Built-in database functions

use crate::compiler::SqlCompiler;
use crate::combinable::IntoExpr;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression};
use crate::func::Func;
use sqlweave_backends::{SqlFragment, Vendor};
use sqlweave_core::FieldType;
use std::fmt;

fn at_least_two(name: &str, expressions: Vec<Expr>) -> Result<Vec<Expr>> {
	if expressions.len() < 2 {
		return Err(ExpressionError::value(format!(
			"{} must take at least two expressions",
			name
		)));
	}
	Ok(expressions)
}

/// `COALESCE(a, b, ...)`: the first non-null argument.
pub struct Coalesce;

impl Coalesce {
	pub fn new(expressions: Vec<Expr>) -> Result<Func> {
		Ok(Func::new("COALESCE", at_least_two("Coalesce", expressions)?).named("Coalesce"))
	}
}

/// `GREATEST(a, b, ...)`; `MAX` on SQLite.
pub struct Greatest;

impl Greatest {
	pub fn new(expressions: Vec<Expr>) -> Result<Func> {
		Ok(Func::new("GREATEST", at_least_two("Greatest", expressions)?)
			.named("Greatest")
			.vendor_function(Vendor::Sqlite, "MAX"))
	}
}

/// `LEAST(a, b, ...)`; `MIN` on SQLite.
pub struct Least;

impl Least {
	pub fn new(expressions: Vec<Expr>) -> Result<Func> {
		Ok(Func::new("LEAST", at_least_two("Least", expressions)?)
			.named("Least")
			.vendor_function(Vendor::Sqlite, "MIN"))
	}
}

/// `NULLIF(a, b)`
pub struct NullIf;

impl NullIf {
	pub fn new(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Result<Func> {
		Func::with_arity("NullIf", "NULLIF", 2, vec![lhs.into_expr(), rhs.into_expr()])
	}
}

pub struct Lower;

impl Lower {
	pub fn new(expression: impl IntoExpr) -> Result<Func> {
		Func::with_arity("Lower", "LOWER", 1, vec![expression.into_expr()])
	}
}

pub struct Upper;

impl Upper {
	pub fn new(expression: impl IntoExpr) -> Result<Func> {
		Func::with_arity("Upper", "UPPER", 1, vec![expression.into_expr()])
	}
}

/// Character length of a string; `CHAR_LENGTH` on MySQL.
pub struct Length;

impl Length {
	pub fn new(expression: impl IntoExpr) -> Result<Func> {
		Ok(
			Func::with_arity("Length", "LENGTH", 1, vec![expression.into_expr()])?
				.with_output_field(FieldType::IntegerField)
				.vendor_function(Vendor::Mysql, "CHAR_LENGTH"),
		)
	}
}

/// `CURRENT_TIMESTAMP`
pub struct Now;

impl Now {
	pub fn new() -> Func {
		Func::new("", Vec::new())
			.named("Now")
			.template("CURRENT_TIMESTAMP")
			.with_output_field(FieldType::DateTimeField)
	}
}

/// `CAST(expression AS <type>)` with the vendor's type for `output_field`.
#[derive(Debug, Clone)]
pub struct Cast {
	func: Func,
	output_field: FieldType,
}

impl Cast {
	pub fn new(expression: impl IntoExpr, output_field: FieldType) -> Self {
		let func = Func::new("CAST", vec![expression.into_expr()])
			.named("Cast")
			.template("%(function)s(%(expressions)s AS %(db_type)s)")
			.with_output_field(output_field.clone());
		Self { func, output_field }
	}

	fn db_type(&self, compiler: &SqlCompiler<'_>) -> Result<String> {
		compiler.ops().cast_db_type(&self.output_field).ok_or_else(|| {
			ExpressionError::value(format!(
				"{} has no database type to cast to",
				self.output_field
			))
		})
	}
}

impl fmt::Display for Cast {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.func)
	}
}

impl Expression for Cast {
	fn name(&self) -> &str {
		"Cast"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let db_type = self.db_type(compiler)?;
		self.func.as_sql_with(compiler, None, None, &[("db_type", db_type)])
	}

	fn as_vendor_sql(&self, compiler: &SqlCompiler<'_>, vendor: Vendor) -> Option<Result<SqlFragment>> {
		if vendor != Vendor::Postgresql {
			return None;
		}
		Some(self.db_type(compiler).and_then(|db_type| {
			self.func.as_sql_with(
				compiler,
				None,
				Some("(%(expressions)s)::%(db_type)s"),
				&[("db_type", db_type)],
			)
		}))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.func.source_expressions()
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		Ok(Expr::new(Self {
			func: self.func.with_arguments(exprs),
			output_field: self.output_field.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(self.output_field.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::leaves::Col;
	use crate::query::Column;
	use crate::{F, Value};
	use rstest::rstest;
	use sqlweave_backends::{DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations};

	fn col(name: &str, field_type: FieldType) -> Expr {
		Col::new("t", Column::new(name, field_type)).into_expr()
	}

	fn sql(ops: &dyn DatabaseOperations, expr: Expr) -> String {
		SqlCompiler::new(ops).compile(&expr).unwrap().0
	}

	#[rstest]
	#[case(Coalesce::new(vec![F::new("a").into_expr()]).map(|_| ()), "Coalesce must take at least two expressions")]
	#[case(Greatest::new(Vec::new()).map(|_| ()), "Greatest must take at least two expressions")]
	#[case(Least::new(vec![F::new("a").into_expr()]).map(|_| ()), "Least must take at least two expressions")]
	fn test_variadic_minimums(#[case] result: Result<()>, #[case] message: &str) {
		assert_eq!(result.unwrap_err().to_string(), message);
	}

	#[rstest]
	fn test_coalesce_infers_type() {
		let func = Coalesce::new(vec![
			col("nick", FieldType::TextField),
			col("name", FieldType::TextField),
		])
		.unwrap();
		assert_eq!(func.output_field().unwrap(), FieldType::TextField);
		assert_eq!(
			sql(&PostgresOperations::new(), func.into_expr()),
			"COALESCE(\"t\".\"nick\", \"t\".\"name\")"
		);
	}

	#[rstest]
	fn test_greatest_on_sqlite() {
		let func = Greatest::new(vec![
			col("a", FieldType::IntegerField),
			col("b", FieldType::IntegerField),
		])
		.unwrap()
		.into_expr();
		assert_eq!(sql(&SqliteOperations::new(), func.clone()), "MAX(\"t\".\"a\", \"t\".\"b\")");
		assert_eq!(sql(&PostgresOperations::new(), func), "GREATEST(\"t\".\"a\", \"t\".\"b\")");
	}

	#[rstest]
	fn test_least_on_sqlite() {
		let func = Least::new(vec![Value::new(1).into_expr(), Value::new(2).into_expr()])
			.unwrap()
			.into_expr();
		assert_eq!(sql(&SqliteOperations::new(), func), "MIN(%s, %s)");
	}

	#[rstest]
	fn test_length_per_vendor() {
		let func = Length::new(col("name", FieldType::TextField)).unwrap();
		assert_eq!(func.output_field().unwrap(), FieldType::IntegerField);
		let expr = func.into_expr();
		assert_eq!(sql(&MySqlOperations::default(), expr.clone()), "CHAR_LENGTH(`t`.`name`)");
		assert_eq!(sql(&PostgresOperations::new(), expr), "LENGTH(\"t\".\"name\")");
	}

	#[rstest]
	fn test_single_argument_functions() {
		assert_eq!(
			sql(&PostgresOperations::new(), Lower::new(col("n", FieldType::TextField)).unwrap().into_expr()),
			"LOWER(\"t\".\"n\")"
		);
		assert_eq!(
			sql(&PostgresOperations::new(), Upper::new(col("n", FieldType::TextField)).unwrap().into_expr()),
			"UPPER(\"t\".\"n\")"
		);
		assert!(NullIf::new(F::new("a"), Value::new("")).is_ok());
	}

	#[rstest]
	fn test_now() {
		let now = Now::new();
		assert_eq!(now.output_field().unwrap(), FieldType::DateTimeField);
		assert_eq!(sql(&MySqlOperations::default(), now.into_expr()), "CURRENT_TIMESTAMP");
	}

	#[rstest]
	fn test_cast_per_vendor() {
		let cast = Cast::new(col("n", FieldType::TextField), FieldType::IntegerField).into_expr();
		assert_eq!(sql(&PostgresOperations::new(), cast.clone()), "(\"t\".\"n\")::integer");
		assert_eq!(sql(&MySqlOperations::default(), cast.clone()), "CAST(`t`.`n` AS signed integer)");
		assert_eq!(sql(&SqliteOperations::new(), cast.clone()), "CAST(\"t\".\"n\" AS integer)");
		assert_eq!(cast.output_field().unwrap(), FieldType::IntegerField);
	}

	#[rstest]
	fn test_cast_without_type_fails() {
		let cast = Cast::new(F::new("x"), FieldType::Field).into_expr();
		let ops = SqliteOperations::new();
		assert!(SqlCompiler::new(&ops).compile(&cast).is_err());
	}
}
