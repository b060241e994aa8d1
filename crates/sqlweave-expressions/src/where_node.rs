//! Resolved filter trees

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, join_display};
use sqlweave_backends::SqlFragment;
use sqlweave_core::FieldType;
use std::fmt;

/// How the children of a filter node are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QOperator {
	#[default]
	And,
	Or,
}

impl QOperator {
	pub fn as_sql(&self) -> &'static str {
		match self {
			QOperator::And => "AND",
			QOperator::Or => "OR",
		}
	}
}

impl fmt::Display for QOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_sql())
	}
}

/// A resolved `AND`/`OR` tree of boolean conditions.
///
/// Children that can never match raise [`ExpressionError::EmptyResultSet`]
/// and children that always match render as empty SQL; the node folds both
/// into its own result.
#[derive(Debug, Clone)]
pub struct WhereNode {
	children: Vec<Expr>,
	connector: QOperator,
	negated: bool,
}

impl WhereNode {
	pub fn new(children: Vec<Expr>, connector: QOperator, negated: bool) -> Self {
		Self {
			children,
			connector,
			negated,
		}
	}

	pub fn children(&self) -> &[Expr] {
		&self.children
	}

	pub fn connector(&self) -> QOperator {
		self.connector
	}

	pub fn is_negated(&self) -> bool {
		self.negated
	}
}

impl fmt::Display for WhereNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = format!("({}: {})", self.connector, join_display(&self.children));
		if self.negated {
			write!(f, "(NOT {})", inner)
		} else {
			f.write_str(&inner)
		}
	}
}

impl Expression for WhereNode {
	fn name(&self) -> &str {
		"WhereNode"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let (mut full_needed, mut empty_needed) = match self.connector {
			QOperator::And => (self.children.len(), 1),
			QOperator::Or => (1, self.children.len()),
		};
		let mut result = Vec::new();
		let mut params = Vec::new();

		for child in &self.children {
			match compiler.compile(child) {
				Err(ExpressionError::EmptyResultSet) => empty_needed -= 1,
				Err(e) => return Err(e),
				Ok((sql, child_params)) => {
					if sql.is_empty() {
						full_needed -= 1;
					} else {
						result.push(sql);
						params.extend(child_params);
					}
				}
			}
			// Everything or nothing matches; the remaining children can't change that.
			if empty_needed == 0 {
				return if self.negated {
					Ok((String::new(), Vec::new()))
				} else {
					Err(ExpressionError::EmptyResultSet)
				};
			}
			if full_needed == 0 {
				return if self.negated {
					Err(ExpressionError::EmptyResultSet)
				} else {
					Ok((String::new(), Vec::new()))
				};
			}
		}

		let mut sql = result.join(&format!(" {} ", self.connector));
		if !sql.is_empty() {
			if self.negated {
				sql = format!("NOT ({})", sql);
			} else if result.len() > 1 {
				sql = format!("({})", sql);
			}
		}
		Ok((sql, params))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.children.clone()
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		if exprs.len() != self.children.len() {
			return Err(ExpressionError::value(format!(
				"WhereNode expects {} source expression(s), got {}",
				self.children.len(),
				exprs.len()
			)));
		}
		Ok(Expr::new(Self::new(exprs, self.connector, self.negated)))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::BooleanField)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::combinable::IntoExpr;
	use crate::leaves::{Col, RawSql};
	use crate::lookups::{Lookup, LookupType};
	use crate::query::Column;
	use rstest::rstest;
	use sqlweave_backends::PostgresOperations;
	use sqlweave_core::QueryValue;

	fn exact(name: &str, value: i64) -> Expr {
		let col = Col::new("t", Column::new(name, FieldType::IntegerField)).into_expr();
		Lookup::new(LookupType::Exact, col, value.into()).unwrap().into_expr()
	}

	fn never() -> Expr {
		let col = Col::new("t", Column::new("id", FieldType::IntegerField)).into_expr();
		Lookup::new(LookupType::In, col, Vec::<i64>::new().into())
			.unwrap()
			.into_expr()
	}

	fn always() -> Expr {
		WhereNode::new(Vec::new(), QOperator::And, false).into_expr()
	}

	fn compile(node: WhereNode) -> Result<SqlFragment> {
		let ops = PostgresOperations::new();
		SqlCompiler::new(&ops).compile(&node.into_expr())
	}

	#[rstest]
	fn test_single_child_has_no_parentheses() {
		let (sql, params) = compile(WhereNode::new(vec![exact("a", 1)], QOperator::And, false)).unwrap();
		assert_eq!(sql, "\"t\".\"a\" = %s");
		assert_eq!(params, vec![QueryValue::Int(1)]);
	}

	#[rstest]
	fn test_or_of_two() {
		let node = WhereNode::new(vec![exact("a", 1), exact("b", 2)], QOperator::Or, false);
		let (sql, params) = compile(node).unwrap();
		assert_eq!(sql, "(\"t\".\"a\" = %s OR \"t\".\"b\" = %s)");
		assert_eq!(params.len(), 2);
	}

	#[rstest]
	fn test_negated() {
		let node = WhereNode::new(vec![exact("a", 1), exact("b", 2)], QOperator::And, true);
		let (sql, _) = compile(node).unwrap();
		assert_eq!(sql, "NOT (\"t\".\"a\" = %s AND \"t\".\"b\" = %s)");
	}

	#[rstest]
	#[case(QOperator::And, false, Err(ExpressionError::EmptyResultSet))]
	#[case(QOperator::And, true, Ok(String::new()))]
	#[case(QOperator::Or, false, Ok("\"t\".\"a\" = %s".to_string()))]
	#[case(QOperator::Or, true, Ok("NOT (\"t\".\"a\" = %s)".to_string()))]
	fn test_child_that_never_matches(
		#[case] connector: QOperator,
		#[case] negated: bool,
		#[case] expected: Result<String>,
	) {
		let node = WhereNode::new(vec![never(), exact("a", 1)], connector, negated);
		assert_eq!(compile(node).map(|(sql, _)| sql), expected);
	}

	#[rstest]
	fn test_child_that_always_matches() {
		let and = WhereNode::new(vec![always(), exact("a", 1)], QOperator::And, false);
		assert_eq!(compile(and).unwrap().0, "\"t\".\"a\" = %s");

		let or = WhereNode::new(vec![always(), exact("a", 1)], QOperator::Or, false);
		assert_eq!(compile(or).unwrap().0, "");

		let negated_or = WhereNode::new(vec![always(), exact("a", 1)], QOperator::Or, true);
		assert_eq!(compile(negated_or).unwrap_err(), ExpressionError::EmptyResultSet);
	}

	#[rstest]
	fn test_only_empty_children_of_or() {
		let node = WhereNode::new(vec![never(), never()], QOperator::Or, false);
		assert_eq!(compile(node).unwrap_err(), ExpressionError::EmptyResultSet);
	}

	#[rstest]
	fn test_raw_condition_is_boolean() {
		let raw = RawSql::new("1 = 1", Vec::new()).into_expr();
		let node = WhereNode::new(vec![raw], QOperator::And, false);
		assert!(node.conditional());
		assert_eq!(compile(node).unwrap().0, "(1 = 1)");
	}
}
