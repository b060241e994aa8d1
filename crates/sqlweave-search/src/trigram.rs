//! `pg_trgm` similarity

use crate::require_postgres;
use sqlweave_backends::SqlFragment;
use sqlweave_core::FieldType;
use sqlweave_expressions::{Expr, Expression, Func, IntoExpr, SqlCompiler, Value};
use std::fmt;

macro_rules! trigram_node {
	($(#[$meta:meta])* $node:ident, $function:expr, $joiner:expr) => {
		$(#[$meta])*
		#[derive(Debug, Clone)]
		pub struct $node(Func);

		impl $node {
			/// Compare `expression` with the literal `text`.
			pub fn new(expression: impl IntoExpr, text: impl Into<String>) -> Self {
				Self::with_expression(expression, Value::new(text.into()))
			}

			/// Compare two expressions.
			pub fn with_expression(expression: impl IntoExpr, other: impl IntoExpr) -> Self {
				Self(
					Func::new($function, vec![expression.into_expr(), other.into_expr()])
						.named(stringify!($node))
						.arg_joiner($joiner)
						.with_output_field(FieldType::FloatField),
				)
			}
		}

		impl fmt::Display for $node {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				fmt::Display::fmt(&self.0, f)
			}
		}

		impl Expression for $node {
			fn name(&self) -> &str {
				stringify!($node)
			}

			fn as_sql(&self, compiler: &SqlCompiler<'_>) -> sqlweave_expressions::Result<SqlFragment> {
				require_postgres(compiler, self.name())?;
				self.0.as_sql_with(compiler, None, None, &[])
			}

			fn source_expressions(&self) -> Vec<Expr> {
				self.0.arguments().to_vec()
			}

			fn with_source_expressions(&self, exprs: Vec<Expr>) -> sqlweave_expressions::Result<Expr> {
				if exprs.len() != 2 {
					return Err(sqlweave_expressions::ExpressionError::ValueError(format!(
						"{} expects 2 source expression(s), got {}",
						stringify!($node),
						exprs.len()
					)));
				}
				Ok(Expr::new(Self(self.0.with_arguments(exprs))))
			}

			fn declared_output_field(&self) -> Option<FieldType> {
				Some(FieldType::FloatField)
			}
		}
	};
}

trigram_node!(
	/// `SIMILARITY(expression, text)`, between 0 and 1.
	TrigramSimilarity,
	"SIMILARITY",
	", "
);

trigram_node!(
	/// `expression <-> text`, one minus the similarity.
	TrigramDistance,
	"",
	" <-> "
);

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use sqlweave_backends::{MySqlOperations, PostgresOperations};
	use sqlweave_core::QueryValue;
	use sqlweave_expressions::{Col, Column, ExpressionError, OrderBy};

	fn name() -> Expr {
		Col::new("author", Column::new("name", FieldType::TextField)).into_expr()
	}

	#[rstest]
	fn test_similarity() {
		let ops = PostgresOperations::new();
		let (sql, params) = SqlCompiler::new(&ops)
			.compile(&TrigramSimilarity::new(name(), "Katy Stevens").into_expr())
			.unwrap();
		assert_eq!(sql, "SIMILARITY(\"author\".\"name\", %s)");
		assert_eq!(params, vec![QueryValue::String("Katy Stevens".to_string())]);
	}

	#[rstest]
	fn test_distance_in_ordering() {
		let ops = PostgresOperations::new();
		let ordering = OrderBy::new(TrigramDistance::new(name(), "Katy").into_expr(), false).into_expr();
		let (sql, _) = SqlCompiler::new(&ops).compile(&ordering).unwrap();
		assert_eq!(sql, "(\"author\".\"name\" <-> %s) ASC");
	}

	#[rstest]
	fn test_output_is_float() {
		let expr = TrigramDistance::new(name(), "Katy").into_expr();
		assert_eq!(expr.output_field().unwrap(), FieldType::FloatField);
	}

	#[rstest]
	fn test_requires_postgres() {
		let ops = MySqlOperations::default();
		let err = SqlCompiler::new(&ops)
			.compile(&TrigramSimilarity::new(name(), "Katy").into_expr())
			.unwrap_err();
		assert!(matches!(err, ExpressionError::Backend(_)));
	}
}
