//! Binary nodes: arithmetic, duration arithmetic and temporal subtraction

use crate::compiler::SqlCompiler;
use crate::error::Result;
use crate::expression::{Expr, Expression, take_sources};
use crate::leaves::DurationValue;
use sqlweave_backends::{SqlFragment, SupportCheck};
use sqlweave_core::{Connector, FieldType};
use std::fmt;

fn output_or_none(expr: &Expr) -> Option<FieldType> {
	expr.output_field_or_none().ok().flatten()
}

fn is_duration(field: &Option<FieldType>) -> bool {
	matches!(field, Some(FieldType::DurationField))
}

/// `lhs <connector> rhs`
///
/// Rendering depends on the operand types: durations on engines without an
/// interval type go through [`DurationExpression`], and subtracting two values
/// of the same temporal type goes through [`TemporalSubtraction`].
#[derive(Debug, Clone)]
pub struct CombinedExpression {
	lhs: Expr,
	connector: Connector,
	rhs: Expr,
	output_field: Option<FieldType>,
}

impl CombinedExpression {
	pub fn new(lhs: Expr, connector: Connector, rhs: Expr) -> Self {
		Self {
			lhs,
			connector,
			rhs,
			output_field: None,
		}
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = Some(field);
		self
	}

	pub fn lhs(&self) -> &Expr {
		&self.lhs
	}

	pub fn rhs(&self) -> &Expr {
		&self.rhs
	}

	pub fn connector(&self) -> Connector {
		self.connector
	}
}

impl fmt::Display for CombinedExpression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, self.connector, self.rhs)
	}
}

impl Expression for CombinedExpression {
	fn name(&self) -> &str {
		"CombinedExpression"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let lhs_output = output_or_none(&self.lhs);
		let rhs_output = output_or_none(&self.rhs);

		if !compiler.ops().features().has_native_duration_field
			&& (is_duration(&lhs_output) || is_duration(&rhs_output))
		{
			return DurationExpression::new(self.lhs.clone(), self.connector, self.rhs.clone())
				.as_sql(compiler);
		}

		if let (Some(lhs_field), Some(rhs_field)) = (&lhs_output, &rhs_output)
			&& self.connector == Connector::Sub
			&& lhs_field.is_temporal()
			&& lhs_field.internal_type() == rhs_field.internal_type()
		{
			return TemporalSubtraction::new(self.lhs.clone(), self.rhs.clone()).as_sql(compiler);
		}

		let (lhs_sql, mut params) = compiler.compile(&self.lhs)?;
		let (rhs_sql, rhs_params) = compiler.compile(&self.rhs)?;
		params.extend(rhs_params);
		let sql = compiler
			.ops()
			.combine_expression(self.connector, &[lhs_sql, rhs_sql])?;
		Ok((format!("({})", sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [lhs, rhs] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self {
			lhs,
			rhs,
			connector: self.connector,
			output_field: self.output_field.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		self.output_field.clone()
	}
}

/// Arithmetic with a duration operand on engines that store durations as
/// microseconds.
#[derive(Debug, Clone)]
pub struct DurationExpression {
	lhs: Expr,
	connector: Connector,
	rhs: Expr,
}

impl DurationExpression {
	pub fn new(lhs: Expr, connector: Connector, rhs: Expr) -> Self {
		Self { lhs, connector, rhs }
	}

	fn compile_side(&self, side: &Expr, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let (sql, params) = compiler.compile(side)?;
		if !side.is::<DurationValue>() && is_duration(&output_or_none(side)) {
			let sql = compiler.ops().format_for_duration_arithmetic(&sql)?;
			return Ok((sql, params));
		}
		Ok((sql, params))
	}
}

impl fmt::Display for DurationExpression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, self.connector, self.rhs)
	}
}

impl Expression for DurationExpression {
	fn name(&self) -> &str {
		"DurationExpression"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(
			&SupportCheck::new(self.name()).with_source_fields(self.source_fields()?),
		)?;
		let (lhs_sql, mut params) = self.compile_side(&self.lhs, compiler)?;
		let (rhs_sql, rhs_params) = self.compile_side(&self.rhs, compiler)?;
		params.extend(rhs_params);
		let sql = ops.combine_duration_expression(self.connector, &[lhs_sql, rhs_sql])?;
		Ok((format!("({})", sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [lhs, rhs] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self {
			lhs,
			rhs,
			connector: self.connector,
		}))
	}
}

/// `lhs - rhs` for two dates, datetimes or times, producing a duration.
#[derive(Debug, Clone)]
pub struct TemporalSubtraction {
	lhs: Expr,
	rhs: Expr,
}

impl TemporalSubtraction {
	pub fn new(lhs: Expr, rhs: Expr) -> Self {
		Self { lhs, rhs }
	}
}

impl fmt::Display for TemporalSubtraction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, Connector::Sub, self.rhs)
	}
}

impl Expression for TemporalSubtraction {
	fn name(&self) -> &str {
		"TemporalSubtraction"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(
			&SupportCheck::new(self.name()).with_source_fields(self.source_fields()?),
		)?;
		let lhs = compiler.compile(&self.lhs)?;
		let rhs = compiler.compile(&self.rhs)?;
		let lhs_type = self.lhs.output_field()?;
		Ok(ops.subtract_temporals(lhs_type.internal_type(), lhs, rhs)?)
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [lhs, rhs] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self { lhs, rhs }))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::DurationField)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::leaves::Col;
	use crate::query::Column;
	use crate::{Combinable, IntoExpr, Value};
	use chrono::TimeDelta;
	use rstest::rstest;
	use sqlweave_backends::{
		BackendError, DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations,
	};

	fn col(name: &str, field_type: FieldType) -> Expr {
		Col::new("e", Column::new(name, field_type)).into_expr()
	}

	fn compile(ops: &dyn DatabaseOperations, expr: &Expr) -> Result<SqlFragment> {
		SqlCompiler::new(ops).compile(expr)
	}

	#[rstest]
	fn test_plain_arithmetic_is_parenthesized() {
		let expr = col("a", FieldType::IntegerField) + 1;
		let (sql, params) = compile(&PostgresOperations::new(), &expr).unwrap();
		assert_eq!(sql, "(\"e\".\"a\" + %s)");
		assert_eq!(params.len(), 1);
	}

	#[rstest]
	fn test_mod_keeps_escaped_percent() {
		let expr = col("a", FieldType::IntegerField) % 2;
		let (sql, _) = compile(&PostgresOperations::new(), &expr).unwrap();
		assert_eq!(sql, "(\"e\".\"a\" %% %s)");
	}

	#[rstest]
	fn test_pow_per_vendor() {
		let expr = col("a", FieldType::IntegerField).pow(2);
		assert_eq!(compile(&PostgresOperations::new(), &expr).unwrap().0, "(\"e\".\"a\" ^ %s)");
		assert_eq!(compile(&SqliteOperations::new(), &expr).unwrap().0, "(POWER(\"e\".\"a\",%s))");
		assert_eq!(compile(&MySqlOperations::default(), &expr).unwrap().0, "(POW(`e`.`a`,%s))");
	}

	#[rstest]
	fn test_duration_column_plus_date_on_sqlite() {
		let expr = col("start", FieldType::DateTimeField) + col("length", FieldType::DurationField);
		let (sql, _) = compile(&SqliteOperations::new(), &expr).unwrap();
		assert_eq!(sql, "(sqlweave_format_dtdelta('+', \"e\".\"start\", \"e\".\"length\"))");
	}

	#[rstest]
	fn test_duration_column_on_mysql_is_formatted() {
		let expr = col("start", FieldType::DateTimeField) + col("length", FieldType::DurationField);
		let (sql, _) = compile(&MySqlOperations::default(), &expr).unwrap();
		assert_eq!(sql, "(`e`.`start` + INTERVAL `e`.`length` MICROSECOND)");
	}

	#[rstest]
	fn test_duration_literal_is_not_formatted() {
		let expr = col("start", FieldType::DateTimeField) + TimeDelta::days(1);
		let (sql, params) = compile(&MySqlOperations::default(), &expr).unwrap();
		assert_eq!(sql, "(`e`.`start` + INTERVAL '1 0:0:0:0' DAY_MICROSECOND)");
		assert!(params.is_empty());
	}

	#[rstest]
	fn test_duration_on_postgres_is_plain() {
		let expr = col("start", FieldType::DateTimeField) + TimeDelta::days(1);
		let (sql, params) = compile(&PostgresOperations::new(), &expr).unwrap();
		assert_eq!(sql, "(\"e\".\"start\" + %s)");
		assert_eq!(params.len(), 1);
	}

	#[rstest]
	fn test_invalid_duration_connector() {
		let expr = col("length", FieldType::DurationField) * 2;
		let err = compile(&SqliteOperations::new(), &expr).unwrap_err();
		assert_eq!(err, BackendError::InvalidConnector("*".to_string()).into());
	}

	#[rstest]
	fn test_temporal_subtraction() {
		let expr = col("end", FieldType::DateField) - col("start", FieldType::DateField);
		assert_eq!(
			compile(&PostgresOperations::new(), &expr).unwrap().0,
			"age(\"e\".\"end\", \"e\".\"start\")"
		);
		assert_eq!(
			compile(&SqliteOperations::new(), &expr).unwrap().0,
			"sqlweave_timestamp_diff(\"e\".\"end\", \"e\".\"start\")"
		);
	}

	#[rstest]
	fn test_mixed_temporal_subtraction_is_plain() {
		let expr = col("end", FieldType::DateTimeField) - col("start", FieldType::DateField);
		assert_eq!(
			compile(&PostgresOperations::new(), &expr).unwrap().0,
			"(\"e\".\"end\" - \"e\".\"start\")"
		);
	}

	#[rstest]
	fn test_temporal_subtraction_output() {
		let node = TemporalSubtraction::new(col("a", FieldType::TimeField), col("b", FieldType::TimeField));
		assert_eq!(node.output_field().unwrap(), FieldType::DurationField);
	}

	#[rstest]
	fn test_inferred_and_mixed_types() {
		let same = col("a", FieldType::IntegerField) + col("b", FieldType::IntegerField);
		assert_eq!(same.output_field().unwrap(), FieldType::IntegerField);
		let mixed = col("a", FieldType::IntegerField) + col("b", FieldType::FloatField);
		assert!(mixed.output_field().is_err());
		let declared = CombinedExpression::new(
			col("a", FieldType::IntegerField),
			Connector::Add,
			col("b", FieldType::FloatField),
		)
		.with_output_field(FieldType::FloatField);
		assert_eq!(declared.output_field().unwrap(), FieldType::FloatField);
	}

	#[rstest]
	fn test_values_only_have_no_type() {
		let expr = Value::new(1).into_expr() + 2;
		assert_eq!(expr.output_field_or_none().unwrap(), None);
	}
}
