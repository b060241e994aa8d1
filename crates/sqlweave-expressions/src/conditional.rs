//! `CASE WHEN` expressions

use crate::combinable::IntoExpr;
use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, ResolveOptions, take_sources};
use crate::leaves::Value;
use crate::q::Q;
use crate::query::QueryContext;
use sqlweave_backends::{SqlFragment, SupportCheck};
use sqlweave_core::FieldType;
use std::fmt;

/// One `WHEN condition THEN result` branch.
#[derive(Debug, Clone)]
pub struct When {
	condition: Expr,
	result: Expr,
}

impl When {
	/// `condition` must be a non-empty [`Q`] or a boolean expression.
	pub fn new(condition: impl IntoExpr, then: impl IntoExpr) -> Result<Self> {
		let condition = condition.into_expr();
		if let Some(q) = condition.downcast_ref::<Q>() {
			if q.is_empty() {
				return Err(ExpressionError::value(
					"An empty Q() can't be used as a When() condition.",
				));
			}
		} else if !condition.conditional() {
			return Err(ExpressionError::type_error(
				"When() supports a Q object, a boolean expression, or lookups as a condition.",
			));
		}
		Ok(Self {
			condition,
			result: then.into_expr(),
		})
	}

	pub fn condition(&self) -> &Expr {
		&self.condition
	}

	pub fn result(&self) -> &Expr {
		&self.result
	}
}

impl fmt::Display for When {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "WHEN {} THEN {}", self.condition, self.result)
	}
}

impl Expression for When {
	fn name(&self) -> &str {
		"When"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		compiler
			.ops()
			.check_expression_support(&SupportCheck::new(self.name()))?;
		let (mut condition_sql, mut params) = compiler.compile(&self.condition)?;
		if condition_sql.is_empty() {
			condition_sql = "1 = 1".to_string();
		}
		let (result_sql, result_params) = compiler.compile(&self.result)?;
		params.extend(result_params);
		Ok((format!("WHEN {} THEN {}", condition_sql, result_sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.condition.clone(), self.result.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [condition, result] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self { condition, result }))
	}

	// Only the result decides the type.
	fn source_fields(&self) -> Result<Vec<Option<FieldType>>> {
		Ok(vec![self.result.output_field_or_none()?])
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let mut condition_options = options.clone();
		condition_options.for_save = false;
		let condition = self.condition.resolve_expression(query, &condition_options)?;
		let result = self.result.resolve_expression(query, options)?;
		Ok(Expr::new(Self { condition, result }))
	}

	// A branch is not a complete expression and cannot be grouped by itself.
	fn group_by_cols(&self) -> Vec<Expr> {
		self.source_expressions()
			.iter()
			.flat_map(|source| source.group_by_cols())
			.collect()
	}
}

/// A searched `CASE` expression.
///
/// # Examples
///
/// ```
/// use sqlweave_core::FieldType;
/// use sqlweave_expressions::{Case, IntoExpr, Model, Q, Query, SqlCompiler, Value, When};
/// use sqlweave_backends::PostgresOperations;
///
/// let mut query = Query::new(Model::new("account").field("balance", FieldType::IntegerField));
/// let case = Case::new(
///     vec![
///         When::new(Q::new("balance__gt", 0), Value::new("positive")).unwrap(),
///         When::new(Q::new("balance__lt", 0), Value::new("negative")).unwrap(),
///     ],
///     Some(Value::new("zero").into_expr()),
/// );
/// let resolved = case.into_expr().resolve(&mut query).unwrap();
/// let ops = PostgresOperations::new();
/// let (sql, params) = SqlCompiler::new(&ops).with_query(&query).compile(&resolved).unwrap();
/// assert_eq!(
///     sql,
///     "CASE WHEN \"account\".\"balance\" > %s THEN %s WHEN \"account\".\"balance\" < %s THEN %s ELSE %s END"
/// );
/// assert_eq!(params.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct Case {
	cases: Vec<Expr>,
	default: Expr,
	output_field: Option<FieldType>,
}

impl Case {
	/// Branches are tried in order; `default` (SQL `NULL` when omitted) is
	/// used when none matches.
	pub fn new(cases: Vec<When>, default: Option<Expr>) -> Self {
		Self {
			cases: cases.into_iter().map(Expr::new).collect(),
			default: default.unwrap_or_else(|| Value::null().into_expr()),
			output_field: None,
		}
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = Some(field);
		self
	}

	pub fn cases(&self) -> &[Expr] {
		&self.cases
	}

	pub fn default_expression(&self) -> &Expr {
		&self.default
	}
}

impl fmt::Display for Case {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let cases: Vec<String> = self.cases.iter().map(ToString::to_string).collect();
		write!(f, "CASE {}, ELSE {}", cases.join(", "), self.default)
	}
}

impl Expression for Case {
	fn name(&self) -> &str {
		"Case"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(&SupportCheck::new(self.name()))?;

		let mut case_parts = Vec::with_capacity(self.cases.len());
		let mut params = Vec::new();
		for case in &self.cases {
			match compiler.compile(case) {
				Ok((case_sql, case_params)) => {
					case_parts.push(case_sql);
					params.extend(case_params);
				}
				Err(ExpressionError::EmptyResultSet) => continue,
				Err(e) => return Err(e),
			}
		}
		if case_parts.is_empty() {
			return compiler.compile(&self.default);
		}

		let (default_sql, default_params) = compiler.compile(&self.default)?;
		params.extend(default_params);
		let mut sql = format!("CASE {} ELSE {} END", case_parts.join(" "), default_sql);
		if let Some(output_field) = self.output_field_or_none()? {
			sql = ops.unification_cast_sql(&output_field).replacen("%s", &sql, 1);
		}
		Ok((sql, params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		let mut sources = self.cases.clone();
		sources.push(self.default.clone());
		sources
	}

	fn with_source_expressions(&self, mut exprs: Vec<Expr>) -> Result<Expr> {
		let default = exprs
			.pop()
			.ok_or_else(|| ExpressionError::value("Case expects at least a default expression"))?;
		Ok(Expr::new(Self {
			cases: exprs,
			default,
			output_field: self.output_field.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		self.output_field.clone()
	}
}
