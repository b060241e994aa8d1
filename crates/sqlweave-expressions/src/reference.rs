//! Named references to fields and annotations

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, ResolveOptions};
use crate::query::{LOOKUP_SEP, QueryContext};
use indexmap::IndexMap;
use sqlweave_backends::SqlFragment;
use std::fmt;

/// A reference to a field, a related field (`author__name`) or an
/// annotation, bound when the tree is resolved against a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct F {
	name: String,
}

impl F {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}

	pub fn field_name(&self) -> &str {
		&self.name
	}
}

impl fmt::Display for F {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "F({})", self.name)
	}
}

impl Expression for F {
	fn name(&self) -> &str {
		"F"
	}

	fn as_sql(&self, _compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Err(ExpressionError::Unresolved(format!(
			"{} must be resolved against a query before it can be compiled",
			self
		)))
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		query.resolve_ref(
			&self.name,
			options.allow_joins,
			options.reuse.as_ref(),
			options.summarize,
		)
	}

	fn refs_aggregate(&self, existing: &IndexMap<String, Expr>) -> Option<(Expr, Vec<String>)> {
		refs_aggregate(&self.name, existing)
	}
}

/// The shortest `__` prefix of `name` naming an aggregate in `existing`,
/// with the remaining lookup parts.
pub fn refs_aggregate(name: &str, existing: &IndexMap<String, Expr>) -> Option<(Expr, Vec<String>)> {
	let parts: Vec<&str> = name.split(LOOKUP_SEP).collect();
	(0..=parts.len()).find_map(|n| {
		let prefix = parts[..n].join(LOOKUP_SEP);
		existing
			.get(&prefix)
			.filter(|aggregate| aggregate.contains_aggregate())
			.map(|aggregate| {
				(
					aggregate.clone(),
					parts[n..].iter().map(|s| s.to_string()).collect(),
				)
			})
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::aggregates::Sum;
	use crate::query::{Model, Query};
	use crate::{IntoExpr, Value};
	use rstest::rstest;
	use sqlweave_backends::PostgresOperations;
	use sqlweave_core::FieldType;

	#[rstest]
	fn test_unresolved_reference_cannot_compile() {
		let ops = PostgresOperations::new();
		let err = SqlCompiler::new(&ops).compile(&F::new("x").into_expr()).unwrap_err();
		assert!(matches!(err, ExpressionError::Unresolved(_)));
	}

	#[rstest]
	fn test_resolves_to_column() {
		let mut query = Query::new(Model::new("item").field("price", FieldType::FloatField));
		let resolved = F::new("price").into_expr().resolve(&mut query).unwrap();
		assert_eq!(resolved.to_string(), "Col(item, price)");
		assert_eq!(resolved.output_field().unwrap(), FieldType::FloatField);
	}

	#[rstest]
	fn test_refs_aggregate_matches_prefix() {
		let mut existing = IndexMap::new();
		existing.insert("total".to_string(), Sum::new(F::new("price")).into_expr());
		existing.insert("plain".to_string(), Value::new(1).into_expr());

		let (found, rest) = F::new("total__gt").refs_aggregate(&existing).unwrap();
		assert_eq!(found.name(), "Sum");
		assert_eq!(rest, vec!["gt".to_string()]);
		assert!(F::new("plain").refs_aggregate(&existing).is_none());
		assert!(F::new("other").refs_aggregate(&existing).is_none());
	}
}
