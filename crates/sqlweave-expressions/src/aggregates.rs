//! Aggregate functions
//!
//! An [`Aggregate`] is a [`Func`] that collapses rows. It may be `DISTINCT`
//! (only where the aggregate allows it) and may carry a filter condition,
//! rendered as `FILTER (WHERE ...)` where the backend supports the clause and
//! as a `CASE WHEN` around the first argument elsewhere.

use crate::combinable::IntoExpr;
use crate::compiler::SqlCompiler;
use crate::conditional::{Case, When};
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, ResolveOptions, convert_to_field};
use crate::func::Func;
use crate::leaves::Star;
use crate::query::QueryContext;
use crate::reference::F;
use sqlweave_backends::{SqlFragment, Vendor};
use sqlweave_core::{FieldType, QueryValue};
use std::fmt;

const AGGREGATE_TEMPLATE: &str = "%(function)s(%(distinct)s%(expressions)s)";

/// An aggregate function call.
#[derive(Debug, Clone)]
pub struct Aggregate {
	func: Func,
	allow_distinct: bool,
	distinct: bool,
	filter: Option<Expr>,
	null_as_zero: bool,
}

impl Aggregate {
	pub fn new(name: impl Into<String>, function: impl Into<String>, expression: impl IntoExpr) -> Self {
		Self {
			func: Func::new(function, vec![expression.into_expr()])
				.named(name)
				.template(AGGREGATE_TEMPLATE),
			allow_distinct: false,
			distinct: false,
			filter: None,
			null_as_zero: false,
		}
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.func = self.func.with_output_field(field);
		self
	}

	/// Aggregate over distinct values only.
	pub fn distinct(mut self) -> Result<Self> {
		if !self.allow_distinct {
			return Err(ExpressionError::type_error(format!(
				"{} does not allow distinct.",
				self.func.name()
			)));
		}
		self.distinct = true;
		Ok(self)
	}

	/// Only aggregate rows matching `condition` (usually a [`crate::Q`]).
	pub fn filter(mut self, condition: impl IntoExpr) -> Result<Self> {
		if self.func.arguments().iter().any(|arg| arg.is::<Star>()) {
			return Err(ExpressionError::value(
				"Star cannot be used with filter. Please specify a field.",
			));
		}
		self.filter = Some(condition.into_expr());
		Ok(self)
	}

	pub fn is_distinct(&self) -> bool {
		self.distinct
	}

	pub fn filter_condition(&self) -> Option<&Expr> {
		self.filter.as_ref()
	}

	/// `<field>__<name>` for an aggregate over a single field reference.
	pub fn default_alias(&self) -> Result<String> {
		match self.func.arguments() {
			[single] => single
				.downcast_ref::<F>()
				.map(|f| format!("{}__{}", f.field_name(), self.func.name().to_lowercase()))
				.ok_or_else(|| ExpressionError::type_error("Complex expressions require an alias")),
			_ => Err(ExpressionError::type_error("Complex expressions require an alias")),
		}
	}

	fn render(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let distinct = ("distinct", if self.distinct { "DISTINCT " } else { "" }.to_string());
		let Some(filter) = &self.filter else {
			return self.func.as_sql_with(compiler, None, None, &[distinct]);
		};

		if compiler.ops().features().supports_aggregate_filter_clause {
			let (filter_sql, filter_params) = compiler.compile(filter)?;
			let template = format!("{} FILTER (WHERE %(filter)s)", AGGREGATE_TEMPLATE);
			let (sql, mut params) = self.func.as_sql_with(
				compiler,
				None,
				Some(&template),
				&[distinct, ("filter", filter_sql)],
			)?;
			params.extend(filter_params);
			return Ok((sql, params));
		}

		let mut arguments = self.func.arguments().to_vec();
		if arguments.is_empty() {
			return self.func.as_sql_with(compiler, None, None, &[distinct]);
		}
		let first = arguments.remove(0);
		let case = Case::new(vec![When::new(filter.clone(), first)?], None);
		arguments.insert(0, case.into_expr());
		self.func
			.with_arguments(arguments)
			.as_sql_with(compiler, None, None, &[distinct])
	}
}

impl fmt::Display for Aggregate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let args: Vec<String> = self.func.arguments().iter().map(ToString::to_string).collect();
		write!(f, "{}({}", self.func.name(), args.join(", "))?;
		if self.distinct {
			f.write_str(", distinct=True")?;
		}
		if let Some(filter) = &self.filter {
			write!(f, ", filter={}", filter)?;
		}
		f.write_str(")")
	}
}

impl Expression for Aggregate {
	fn name(&self) -> &str {
		self.func.name()
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		self.render(compiler)
	}

	fn as_vendor_sql(&self, compiler: &SqlCompiler<'_>, vendor: Vendor) -> Option<Result<SqlFragment>> {
		if vendor != Vendor::Sqlite {
			return None;
		}
		Some(self.render(compiler).map(|(sql, params)| {
			match self.output_field_or_none() {
				Ok(Some(FieldType::DecimalField { .. })) => (format!("CAST({} AS NUMERIC)", sql), params),
				_ => (sql, params),
			}
		}))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		let mut sources = self.func.arguments().to_vec();
		sources.extend(self.filter.clone());
		sources
	}

	fn with_source_expressions(&self, mut exprs: Vec<Expr>) -> Result<Expr> {
		let mut rebuilt = self.clone();
		if self.filter.is_some() {
			rebuilt.filter = exprs.pop();
		}
		rebuilt.func = self.func.with_arguments(exprs);
		Ok(Expr::new(rebuilt))
	}

	// The filter is not a source of the output type.
	fn source_fields(&self) -> Result<Vec<Option<FieldType>>> {
		self.func.source_fields()
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		self.func.declared_output_field()
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let mut options = options.clone();
		options.for_save = false;

		let arguments = self
			.func
			.arguments()
			.iter()
			.map(|arg| arg.resolve_expression(query, &options))
			.collect::<Result<Vec<_>>>()?;
		let filter = self
			.filter
			.as_ref()
			.map(|filter| filter.resolve_expression(query, &options))
			.transpose()?;

		if !options.summarize {
			let nested = arguments.iter().position(|arg| arg.contains_aggregate());
			if let Some(index) = nested {
				let before = &self.func.arguments()[index];
				let name = before
					.downcast_ref::<F>()
					.map(|f| f.field_name().to_string())
					.unwrap_or_else(|| before.to_string());
				return Err(ExpressionError::field(format!(
					"Cannot compute {}('{}'): '{}' is an aggregate",
					self.func.name(),
					name,
					name
				)));
			}
		}

		let mut resolved = self.clone();
		resolved.func = self.func.with_arguments(arguments);
		resolved.filter = filter;
		Ok(Expr::new(resolved))
	}

	fn contains_aggregate(&self) -> bool {
		true
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		Vec::new()
	}

	fn convert_value(&self, value: QueryValue) -> Result<QueryValue> {
		if value.is_null() {
			return Ok(if self.null_as_zero { QueryValue::Int(0) } else { value });
		}
		match self.output_field_or_none()? {
			Some(field) => convert_to_field(&field, value),
			None => Ok(value),
		}
	}
}

/// `COUNT(expression)`; `Count::all()` counts rows.
pub struct Count;

impl Count {
	pub fn new(expression: impl IntoExpr) -> Aggregate {
		let mut aggregate = Aggregate::new("Count", "COUNT", expression)
			.with_output_field(FieldType::IntegerField);
		aggregate.allow_distinct = true;
		aggregate.null_as_zero = true;
		aggregate
	}

	/// `COUNT(*)`
	pub fn all() -> Aggregate {
		Self::new(Star)
	}
}

pub struct Sum;

impl Sum {
	pub fn new(expression: impl IntoExpr) -> Aggregate {
		Aggregate::new("Sum", "SUM", expression)
	}
}

/// `AVG(expression)`, always a float.
pub struct Avg;

impl Avg {
	pub fn new(expression: impl IntoExpr) -> Aggregate {
		Aggregate::new("Avg", "AVG", expression).with_output_field(FieldType::FloatField)
	}
}

pub struct Max;

impl Max {
	pub fn new(expression: impl IntoExpr) -> Aggregate {
		Aggregate::new("Max", "MAX", expression)
	}
}

pub struct Min;

impl Min {
	pub fn new(expression: impl IntoExpr) -> Aggregate {
		Aggregate::new("Min", "MIN", expression)
	}
}

/// Population (or, with `sample`, sample) standard deviation.
pub struct StdDev;

impl StdDev {
	pub fn new(expression: impl IntoExpr, sample: bool) -> Aggregate {
		let function = if sample { "STDDEV_SAMP" } else { "STDDEV_POP" };
		Aggregate::new("StdDev", function, expression).with_output_field(FieldType::FloatField)
	}
}

/// Population (or, with `sample`, sample) variance.
pub struct Variance;

impl Variance {
	pub fn new(expression: impl IntoExpr, sample: bool) -> Aggregate {
		let function = if sample { "VAR_SAMP" } else { "VAR_POP" };
		Aggregate::new("Variance", function, expression).with_output_field(FieldType::FloatField)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::q::Q;
	use crate::query::{Model, Query};
	use rstest::rstest;
	use sqlweave_backends::{DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations};

	fn query() -> Query {
		Query::new(
			Model::new("sale")
				.field("amount", FieldType::DecimalField { max_digits: 10, decimal_places: 2 })
				.field("qty", FieldType::IntegerField)
				.field("day", FieldType::DateField)
				.field("region", FieldType::CharField { max_length: 20 }),
		)
	}

	fn compile(ops: &dyn DatabaseOperations, query: &Query, expr: &Expr) -> Result<SqlFragment> {
		SqlCompiler::new(ops).with_query(query).compile(expr)
	}

	#[rstest]
	fn test_count_star() {
		let query = query();
		let expr = Count::all().into_expr();
		let (sql, _) = compile(&PostgresOperations::new(), &query, &expr).unwrap();
		assert_eq!(sql, "COUNT(*)");
		assert_eq!(expr.output_field().unwrap(), FieldType::IntegerField);
		assert_eq!(expr.convert_value(QueryValue::Null).unwrap(), QueryValue::Int(0));
	}

	#[rstest]
	fn test_count_distinct() {
		let mut query = query();
		let expr = Count::new(F::new("region")).distinct().unwrap().into_expr().resolve(&mut query).unwrap();
		let (sql, _) = compile(&PostgresOperations::new(), &query, &expr).unwrap();
		assert_eq!(sql, "COUNT(DISTINCT \"sale\".\"region\")");
	}

	#[rstest]
	fn test_distinct_not_allowed() {
		let err = Sum::new(F::new("qty")).distinct().unwrap_err();
		assert_eq!(err.to_string(), "Sum does not allow distinct.");
	}

	#[rstest]
	fn test_star_with_filter_rejected() {
		assert!(Count::all().filter(Q::new("qty__gt", 1)).is_err());
	}

	#[rstest]
	fn test_filter_clause_on_postgres() {
		let mut query = query();
		let expr = Sum::new(F::new("qty"))
			.filter(Q::new("region", "EU"))
			.unwrap()
			.into_expr()
			.resolve(&mut query)
			.unwrap();
		let (sql, params) = compile(&PostgresOperations::new(), &query, &expr).unwrap();
		assert_eq!(sql, "SUM(\"sale\".\"qty\") FILTER (WHERE \"sale\".\"region\" = %s)");
		assert_eq!(params, vec![QueryValue::from("EU")]);
	}

	#[rstest]
	fn test_filter_becomes_case_elsewhere() {
		let mut query = query();
		let expr = Sum::new(F::new("qty"))
			.filter(Q::new("region", "EU"))
			.unwrap()
			.into_expr()
			.resolve(&mut query)
			.unwrap();
		let (sql, params) = compile(&MySqlOperations::default(), &query, &expr).unwrap();
		assert_eq!(
			sql,
			"SUM(CASE WHEN `sale`.`region` = %s THEN `sale`.`qty` ELSE NULL END)"
		);
		assert_eq!(params, vec![QueryValue::from("EU")]);
	}

	#[rstest]
	fn test_aggregate_over_aggregate() {
		let mut query = query();
		query.add_annotation("total", Sum::new(F::new("qty")).into_expr(), false).unwrap();
		let err = Max::new(F::new("total")).into_expr().resolve(&mut query).unwrap_err();
		assert_eq!(err.to_string(), "Cannot compute Max('total'): 'total' is an aggregate");

		let summarized = Max::new(F::new("total"))
			.into_expr()
			.resolve_expression(&mut query, &ResolveOptions::default().summarize())
			.unwrap();
		let ops = PostgresOperations::new();
		assert_eq!(compile(&ops, &query, &summarized).unwrap().0, "MAX(\"total\")");
	}

	#[rstest]
	fn test_sqlite_rejects_sum_over_dates() {
		let mut query = query();
		let expr = Sum::new(F::new("day")).into_expr().resolve(&mut query).unwrap();
		assert!(compile(&SqliteOperations::new(), &query, &expr).is_err());
		assert!(compile(&PostgresOperations::new(), &query, &expr).is_ok());
	}

	#[rstest]
	fn test_sqlite_casts_decimal_sum() {
		let mut query = query();
		let expr = Sum::new(F::new("amount")).into_expr().resolve(&mut query).unwrap();
		assert_eq!(
			compile(&SqliteOperations::new(), &query, &expr).unwrap().0,
			"CAST(SUM(\"sale\".\"amount\") AS NUMERIC)"
		);
	}

	#[rstest]
	#[case(StdDev::new(F::new("qty"), false), "STDDEV_POP")]
	#[case(StdDev::new(F::new("qty"), true), "STDDEV_SAMP")]
	#[case(Variance::new(F::new("qty"), false), "VAR_POP")]
	#[case(Variance::new(F::new("qty"), true), "VAR_SAMP")]
	fn test_statistics_functions(#[case] aggregate: Aggregate, #[case] function: &str) {
		let mut query = query();
		let expr = aggregate.into_expr().resolve(&mut query).unwrap();
		let (sql, _) = compile(&PostgresOperations::new(), &query, &expr).unwrap();
		assert!(sql.starts_with(function), "{}", sql);
		assert_eq!(expr.output_field().unwrap(), FieldType::FloatField);
	}

	#[rstest]
	fn test_aggregates_do_not_group() {
		let aggregate = Avg::new(F::new("qty"));
		assert!(aggregate.contains_aggregate());
		assert!(aggregate.group_by_cols().is_empty());
		assert_eq!(aggregate.default_alias().unwrap(), "qty__avg");
		assert!(Avg::new(F::new("a") + F::new("b")).default_alias().is_err());
	}

	#[rstest]
	fn test_display() {
		let aggregate = Count::new(F::new("id")).distinct().unwrap();
		assert_eq!(aggregate.to_string(), "Count(F(id), distinct=True)");
	}
}
