//! `to_tsvector` documents

use crate::error::{Result, SearchError};
use crate::fields::{Weight, search_vector_type};
use crate::require_postgres;
use sqlweave_backends::SqlFragment;
use sqlweave_core::FieldType;
use sqlweave_expressions::{Coalesce, Expr, Expression, Func, IntoExpr, SqlCompiler, Value};
use std::fmt;

/// Anything that renders a `tsvector` and may be concatenated with `||`.
pub trait SearchVectorCombinable: IntoExpr + Sized {
	/// Text search configuration, if one was given.
	fn search_config(&self) -> Option<&Expr>;

	/// `self || other`; both sides must use the same configuration.
	fn concat(self, other: impl SearchVectorCombinable) -> Result<CombinedSearchVector> {
		let lhs_config = self.search_config().map(ToString::to_string);
		let rhs_config = other.search_config().map(ToString::to_string);
		if lhs_config != rhs_config {
			return Err(SearchError::VectorConfigMismatch);
		}
		let config = self.search_config().cloned();
		Ok(CombinedSearchVector {
			lhs: self.into_expr(),
			rhs: other.into_expr(),
			config,
		})
	}
}

/// `to_tsvector([config::regconfig, ]COALESCE(a, '') || ' ' || ...)`,
/// optionally weighted with `setweight`.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{IntoExpr, SqlCompiler, Value};
/// use sqlweave_search::{SearchVector, Weight};
///
/// let vector = SearchVector::new(vec![Value::new("hello").into_expr()])
///     .unwrap()
///     .config("english")
///     .weight(Weight::A);
/// let ops = PostgresOperations::new();
/// let (sql, params) = SqlCompiler::new(&ops).compile(&vector.into_expr()).unwrap();
/// assert_eq!(sql, "setweight(to_tsvector(%s::regconfig, COALESCE(%s, %s)), %s)");
/// assert_eq!(params.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SearchVector {
	func: Func,
	config: Option<Expr>,
	weight: Option<Expr>,
}

impl SearchVector {
	/// Each expression is wrapped in `COALESCE(expression, '')` so a null
	/// column does not null the whole document.
	pub fn new(expressions: Vec<Expr>) -> Result<Self> {
		let coalesced = expressions
			.into_iter()
			.map(|e| Coalesce::new(vec![e, Value::new("").into_expr()]).map(IntoExpr::into_expr))
			.collect::<std::result::Result<Vec<_>, _>>()?;
		let func = Func::new("to_tsvector", coalesced)
			.named("SearchVector")
			.arg_joiner(" || ' ' || ")
			.with_output_field(search_vector_type());
		Ok(Self {
			func,
			config: None,
			weight: None,
		})
	}

	/// Text search configuration, e.g. `"english"` or a reference to a column
	/// holding one.
	pub fn config(mut self, config: impl IntoExpr) -> Self {
		self.config = Some(config.into_expr());
		self
	}

	pub fn weight(mut self, weight: Weight) -> Self {
		self.weight = Some(Value::new(weight.as_str()).into_expr());
		self
	}

	fn rebuild(&self, mut exprs: Vec<Expr>) -> sqlweave_expressions::Result<Self> {
		let weight = match self.weight {
			Some(_) => exprs.pop(),
			None => None,
		};
		let config = match self.config {
			Some(_) => exprs.pop(),
			None => None,
		};
		if exprs.len() != self.func.arguments().len() {
			return Err(sqlweave_expressions::ExpressionError::ValueError(format!(
				"SearchVector expects {} source expression(s), got {}",
				self.func.arguments().len(),
				exprs.len()
			)));
		}
		Ok(Self {
			func: self.func.with_arguments(exprs),
			config,
			weight,
		})
	}
}

impl SearchVectorCombinable for SearchVector {
	fn search_config(&self) -> Option<&Expr> {
		self.config.as_ref()
	}
}

impl fmt::Display for SearchVector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.func)?;
		if let Some(config) = &self.config {
			write!(f, ", config={}", config)?;
		}
		if let Some(weight) = &self.weight {
			write!(f, ", weight={}", weight)?;
		}
		Ok(())
	}
}

impl Expression for SearchVector {
	fn name(&self) -> &str {
		"SearchVector"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		let mut params = Vec::new();
		let (mut sql, func_params) = match &self.config {
			Some(config) => {
				let (config_sql, config_params) = compiler.compile(config)?;
				params.extend(config_params);
				let template = format!(
					"%(function)s({}::regconfig, %(expressions)s)",
					config_sql.replace('%', "%%")
				);
				self.func.as_sql_with(compiler, None, Some(&template), &[])?
			}
			None => self.func.as_sql_with(compiler, None, None, &[])?,
		};
		params.extend(func_params);
		if let Some(weight) = &self.weight {
			let (weight_sql, weight_params) = compiler.compile(weight)?;
			sql = format!("setweight({}, {})", sql, weight_sql);
			params.extend(weight_params);
		}
		Ok((sql, params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		let mut sources = self.func.arguments().to_vec();
		sources.extend(self.config.iter().cloned());
		sources.extend(self.weight.iter().cloned());
		sources
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		Ok(Expr::new(self.rebuild(exprs)?))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(search_vector_type())
	}
}

/// `(lhs || rhs)` of two search vectors.
#[derive(Debug, Clone)]
pub struct CombinedSearchVector {
	lhs: Expr,
	rhs: Expr,
	config: Option<Expr>,
}

impl SearchVectorCombinable for CombinedSearchVector {
	fn search_config(&self) -> Option<&Expr> {
		self.config.as_ref()
	}
}

impl fmt::Display for CombinedSearchVector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} || {}", self.lhs, self.rhs)
	}
}

impl Expression for CombinedSearchVector {
	fn name(&self) -> &str {
		"CombinedSearchVector"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
		require_postgres(compiler, self.name())?;
		let (lhs_sql, mut params) = compiler.compile(&self.lhs)?;
		let (rhs_sql, rhs_params) = compiler.compile(&self.rhs)?;
		params.extend(rhs_params);
		Ok((format!("({} || {})", lhs_sql, rhs_sql), params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.lhs.clone(), self.rhs.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
		let [lhs, rhs]: [Expr; 2] = exprs.try_into().map_err(|given: Vec<Expr>| {
			sqlweave_expressions::ExpressionError::ValueError(format!(
				"CombinedSearchVector expects 2 source expression(s), got {}",
				given.len()
			))
		})?;
		Ok(Expr::new(Self {
			lhs,
			rhs,
			config: self.config.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(search_vector_type())
	}
}
