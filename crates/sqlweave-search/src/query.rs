//! `plainto_tsquery` search terms

use crate::error::{Result, SearchError};
use crate::fields::search_query_type;
use crate::require_postgres;
use sqlweave_backends::SqlFragment;
use sqlweave_core::{FieldType, QueryValue};
use sqlweave_expressions::{Expr, Expression, ExpressionError, IntoExpr, SqlCompiler};
use std::fmt;
use std::ops::Not;

/// Anything that renders a `tsquery` and may be combined with `&&` or `||`.
pub trait SearchQueryCombinable: IntoExpr + Sized {
	fn search_config(&self) -> Option<&Expr>;

	/// `(self && other)`
	fn and(self, other: impl SearchQueryCombinable) -> Result<CombinedSearchQuery> {
		combine(self, "&&", other)
	}

	/// `(self || other)`
	fn or(self, other: impl SearchQueryCombinable) -> Result<CombinedSearchQuery> {
		combine(self, "||", other)
	}
}

fn combine(
	lhs: impl SearchQueryCombinable,
	connector: &'static str,
	rhs: impl SearchQueryCombinable,
) -> Result<CombinedSearchQuery> {
	let lhs_config = lhs.search_config().map(ToString::to_string);
	let rhs_config = rhs.search_config().map(ToString::to_string);
	if lhs_config != rhs_config {
		tracing::debug!(lhs = ?lhs_config, rhs = ?rhs_config, "search query configs differ");
		return Err(SearchError::QueryConfigMismatch);
	}
	let config = lhs.search_config().cloned();
	Ok(CombinedSearchQuery {
		lhs: lhs.into_expr(),
		connector,
		rhs: rhs.into_expr(),
		config,
	})
}

/// User supplied search text, parsed by `plainto_tsquery`.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{IntoExpr, SqlCompiler};
/// use sqlweave_search::{SearchQuery, SearchQueryCombinable};
///
/// let query = SearchQuery::new("cheese").and(!SearchQuery::new("toast")).unwrap();
/// let ops = PostgresOperations::new();
/// let (sql, params) = SqlCompiler::new(&ops).compile(&query.into_expr()).unwrap();
/// assert_eq!(sql, "(plainto_tsquery(%s) && !!(plainto_tsquery(%s)))");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SearchQuery {
	value: String,
	config: Option<Expr>,
	invert: bool,
}

impl SearchQuery {
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			value: value.into(),
			config: None,
			invert: false,
		}
	}

	pub fn config(mut self, config: impl IntoExpr) -> Self {
		self.config = Some(config.into_expr());
		self
	}

	pub(crate) fn with_config(mut self, config: Option<Expr>) -> Self {
		self.config = config;
		self
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	pub fn is_inverted(&self) -> bool {
		self.invert
	}
}

impl Not for SearchQuery {
	type Output = SearchQuery;

	fn not(mut self) -> Self::Output {
		self.invert = !self.invert;
		self
	}
}

impl SearchQueryCombinable for SearchQuery {
	fn search_config(&self) -> Option<&Expr> {
		self.config.as_ref()
	}
}

impl fmt::Display for SearchQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.invert {
			f.write_str("~")?;
		}
		write!(f, "SearchQuery('{}'", self.value)?;
		if let Some(config) = &self.config {
			write!(f, ", config={}", config)?;
		}
		f.write_str(")")
	}
}

impl Expression for SearchQuery {
	fn name(&self) -> &str {
		"SearchQuery"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		let (mut sql, mut params) = match &self.config {
			Some(config) => {
				let (config_sql, config_params) = compiler.compile(config)?;
				(format!("plainto_tsquery({}::regconfig, %s)", config_sql), config_params)
			}
			None => ("plainto_tsquery(%s)".to_string(), Vec::new()),
		};
		params.push(QueryValue::String(self.value.clone()));
		if self.invert {
			sql = format!("!!({})", sql);
		}
		Ok((sql, params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.config.iter().cloned().collect()
	}

	fn with_source_expressions(&self, mut exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		let expected = usize::from(self.config.is_some());
		if exprs.len() != expected {
			return Err(ExpressionError::ValueError(format!(
				"SearchQuery expects {} source expression(s), got {}",
				expected,
				exprs.len()
			)));
		}
		let mut rebuilt = self.clone();
		rebuilt.config = exprs.pop();
		Ok(Expr::new(rebuilt))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(search_query_type())
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		Vec::new()
	}
}

/// `(lhs && rhs)` or `(lhs || rhs)` of two search queries.
#[derive(Debug, Clone)]
pub struct CombinedSearchQuery {
	lhs: Expr,
	connector: &'static str,
	rhs: Expr,
	config: Option<Expr>,
}

impl CombinedSearchQuery {
	pub fn connector(&self) -> &str {
		self.connector
	}
}

impl SearchQueryCombinable for CombinedSearchQuery {
	fn search_config(&self) -> Option<&Expr> {
		self.config.as_ref()
	}
}

impl fmt::Display for CombinedSearchQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, self.connector, self.rhs)
	}
}

impl Expression for CombinedSearchQuery {
	fn name(&self) -> &str {
		"CombinedSearchQuery"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		let (lhs_sql, mut params) = compiler.compile(&self.lhs)?;
		let (rhs_sql, rhs_params) = compiler.compile(&self.rhs)?;
		params.extend(rhs_params);
		Ok((format!("({} {} {})", lhs_sql, self.connector, rhs_sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		let [lhs, rhs]: [Expr; 2] = exprs.try_into().map_err(|given: Vec<Expr>| {
			ExpressionError::ValueError(format!(
				"CombinedSearchQuery expects 2 source expression(s), got {}",
				given.len()
			))
		})?;
		Ok(Expr::new(Self {
			lhs,
			connector: self.connector,
			rhs,
			config: self.config.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(search_query_type())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use sqlweave_backends::PostgresOperations;

	fn compile(expr: impl IntoExpr) -> SqlFragment {
		let ops = PostgresOperations::new();
		SqlCompiler::new(&ops).compile(&expr.into_expr()).unwrap()
	}

	#[rstest]
	fn test_plain_query() {
		let (sql, params) = compile(SearchQuery::new("red wine"));
		assert_eq!(sql, "plainto_tsquery(%s)");
		assert_eq!(params, vec![QueryValue::String("red wine".to_string())]);
	}

	#[rstest]
	fn test_config_precedes_value() {
		let (sql, params) = compile(SearchQuery::new("vin rouge").config("french"));
		assert_eq!(sql, "plainto_tsquery(%s::regconfig, %s)");
		assert_eq!(
			params,
			vec![
				QueryValue::String("french".to_string()),
				QueryValue::String("vin rouge".to_string())
			]
		);
	}

	#[rstest]
	fn test_double_negation_restores() {
		let query = !!SearchQuery::new("cheese");
		assert!(!query.is_inverted());
		let (sql, _) = compile(!query);
		assert_eq!(sql, "!!(plainto_tsquery(%s))");
	}

	#[rstest]
	#[case(true)]
	#[case(false)]
	fn test_or_and_connectors(#[case] use_and: bool) {
		let lhs = SearchQuery::new("a");
		let rhs = SearchQuery::new("b");
		let combined = if use_and { lhs.and(rhs) } else { lhs.or(rhs) }.unwrap();
		let expected = if use_and { "&&" } else { "||" };
		assert_eq!(combined.connector(), expected);
		assert_eq!(
			compile(combined).0,
			format!("(plainto_tsquery(%s) {} plainto_tsquery(%s))", expected)
		);
	}

	#[rstest]
	fn test_combined_queries_nest() {
		let combined = SearchQuery::new("a")
			.config("english")
			.or(SearchQuery::new("b").config("english"))
			.unwrap()
			.and(SearchQuery::new("c").config("english"))
			.unwrap();
		let (sql, params) = compile(combined);
		assert_eq!(
			sql,
			"((plainto_tsquery(%s::regconfig, %s) || plainto_tsquery(%s::regconfig, %s)) && \
			 plainto_tsquery(%s::regconfig, %s))"
		);
		assert_eq!(params.len(), 6);
	}

	#[rstest]
	fn test_configs_must_match() {
		let err = SearchQuery::new("a")
			.config("english")
			.and(SearchQuery::new("b"))
			.unwrap_err();
		assert_eq!(err, SearchError::QueryConfigMismatch);
	}
}
