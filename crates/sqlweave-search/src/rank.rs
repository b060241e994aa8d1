//! Ranking and matching of documents against search queries

use crate::query::{CombinedSearchQuery, SearchQuery};
use crate::require_postgres;
use crate::vector::{CombinedSearchVector, SearchVector, SearchVectorCombinable};
use sqlweave_backends::SqlFragment;
use sqlweave_core::{FieldType, QueryValue};
use sqlweave_expressions::{Expr, Expression, ExpressionError, Func, IntoExpr, SqlCompiler, Value};
use std::fmt;

/// `ts_rank([weights, ]vector, query)`
///
/// `weights` are the `D`, `C`, `B` and `A` multipliers in that order.
#[derive(Debug, Clone)]
pub struct SearchRank {
	func: Func,
	weights: Option<Expr>,
}

impl SearchRank {
	pub fn new(vector: impl IntoExpr, query: impl IntoExpr) -> Self {
		let func = Func::new("ts_rank", vec![vector.into_expr(), query.into_expr()])
			.named("SearchRank")
			.with_output_field(FieldType::FloatField);
		Self { func, weights: None }
	}

	pub fn weights(mut self, weights: [f64; 4]) -> Self {
		let array = QueryValue::Array(weights.into_iter().map(QueryValue::Float).collect());
		self.weights = Some(Value::new(array).into_expr());
		self
	}
}

impl fmt::Display for SearchRank {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.func)?;
		if let Some(weights) = &self.weights {
			write!(f, ", weights={}", weights)?;
		}
		Ok(())
	}
}

impl Expression for SearchRank {
	fn name(&self) -> &str {
		"SearchRank"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		let Some(weights) = &self.weights else {
			return self.func.as_sql_with(compiler, None, None, &[]);
		};
		let (weights_sql, mut params) = compiler.compile(weights)?;
		let (sql, func_params) = self.func.as_sql_with(
			compiler,
			None,
			Some("%(function)s(%(weights)s, %(expressions)s)"),
			&[("weights", weights_sql)],
		)?;
		params.extend(func_params);
		Ok((sql, params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		let mut sources = self.func.arguments().to_vec();
		sources.extend(self.weights.iter().cloned());
		sources
	}

	fn with_source_expressions(&self, mut exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		let expected = 2 + usize::from(self.weights.is_some());
		if exprs.len() != expected {
			return Err(ExpressionError::ValueError(format!(
				"SearchRank expects {} source expression(s), got {}",
				expected,
				exprs.len()
			)));
		}
		let weights = if self.weights.is_some() { exprs.pop() } else { None };
		Ok(Expr::new(Self {
			func: self.func.with_arguments(exprs),
			weights,
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::FloatField)
	}
}

/// Right-hand side of a document match.
#[derive(Debug, Clone)]
pub enum SearchTerm {
	/// Plain text, searched with the document's configuration.
	Text(String),
	Expression(Expr),
}

impl From<&str> for SearchTerm {
	fn from(value: &str) -> Self {
		SearchTerm::Text(value.to_string())
	}
}

impl From<String> for SearchTerm {
	fn from(value: String) -> Self {
		SearchTerm::Text(value)
	}
}

impl From<SearchQuery> for SearchTerm {
	fn from(value: SearchQuery) -> Self {
		SearchTerm::Expression(value.into_expr())
	}
}

impl From<CombinedSearchQuery> for SearchTerm {
	fn from(value: CombinedSearchQuery) -> Self {
		SearchTerm::Expression(value.into_expr())
	}
}

impl From<Expr> for SearchTerm {
	fn from(value: Expr) -> Self {
		SearchTerm::Expression(value)
	}
}

/// `vector @@ query = true`
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{IntoExpr, SqlCompiler, Value};
/// use sqlweave_search::{SearchVector, SearchVectorExact};
///
/// let document = SearchVector::new(vec![Value::new("Potato soup").into_expr()])
///     .unwrap()
///     .config("english");
/// let matches = SearchVectorExact::new(document, "potatoes");
/// let ops = PostgresOperations::new();
/// let (sql, params) = SqlCompiler::new(&ops).compile(&matches.into_expr()).unwrap();
/// assert_eq!(
///     sql,
///     "to_tsvector(%s::regconfig, COALESCE(%s, %s)) @@ plainto_tsquery(%s::regconfig, %s) = true"
/// );
/// assert_eq!(params.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct SearchVectorExact {
	lhs: Expr,
	rhs: Expr,
}

impl SearchVectorExact {
	/// Text on the right becomes a [`SearchQuery`] using the configuration of
	/// `lhs` when it is a search vector.
	pub fn new(lhs: impl IntoExpr, rhs: impl Into<SearchTerm>) -> Self {
		let lhs = lhs.into_expr();
		let rhs = match rhs.into() {
			SearchTerm::Expression(expr) => expr,
			SearchTerm::Text(text) => SearchQuery::new(text)
				.with_config(vector_config(&lhs))
				.into_expr(),
		};
		Self { lhs, rhs }
	}
}

fn vector_config(expr: &Expr) -> Option<Expr> {
	if let Some(vector) = expr.downcast_ref::<SearchVector>() {
		return vector.search_config().cloned();
	}
	expr.downcast_ref::<CombinedSearchVector>()
		.and_then(|vector| vector.search_config().cloned())
}

impl fmt::Display for SearchVectorExact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} @@ {}", self.lhs, self.rhs)
	}
}

impl Expression for SearchVectorExact {
	fn name(&self) -> &str {
		"SearchVectorExact"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		if let Some(field) = self.lhs.output_field_or_none()? {
			if field.internal_type() != "SearchVectorField" {
				return Err(ExpressionError::TypeError(format!(
					"Cannot match a search query against a {}.",
					field.internal_type()
				)));
			}
		}
		let (lhs_sql, mut params) = compiler.compile(&self.lhs)?;
		let (rhs_sql, rhs_params) = compiler.compile(&self.rhs)?;
		params.extend(rhs_params);
		Ok((format!("{} @@ {} = true", lhs_sql, rhs_sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		let [lhs, rhs]: [Expr; 2] = exprs.try_into().map_err(|given: Vec<Expr>| {
			ExpressionError::ValueError(format!(
				"SearchVectorExact expects 2 source expression(s), got {}",
				given.len()
			))
		})?;
		Ok(Expr::new(Self { lhs, rhs }))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::BooleanField)
	}

	fn conditional(&self) -> bool {
		true
	}
}
