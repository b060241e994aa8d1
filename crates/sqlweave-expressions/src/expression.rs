//! The protocol shared by every expression node
//!
//! Every node implements [`Expression`]: it lists its source expressions,
//! knows how to rebuild itself from new sources, infers its output type and
//! renders itself to a `(sql, params)` fragment. Trees are immutable; resolving
//! or relabelling produces a new tree sharing the untouched subtrees.
//!
//! [`Expr`] is the cheap, cloneable handle used to hold nodes of any type.

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::ordering::OrderBy;
use crate::query::QueryContext;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlweave_backends::{SqlFragment, Vendor};
use sqlweave_core::{FieldType, QueryValue};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

/// Options threaded through [`Expression::resolve_expression`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
	/// Whether `__` references may add joins.
	pub allow_joins: bool,
	/// Join aliases that may be reused.
	pub reuse: Option<HashSet<String>>,
	/// Resolving for a terminal aggregate; annotations become [`crate::Ref`]s.
	pub summarize: bool,
	/// Resolving a value about to be saved.
	pub for_save: bool,
}

impl Default for ResolveOptions {
	fn default() -> Self {
		Self {
			allow_joins: true,
			reuse: None,
			summarize: false,
			for_save: false,
		}
	}
}

impl ResolveOptions {
	pub fn without_joins(mut self) -> Self {
		self.allow_joins = false;
		self
	}

	pub fn summarize(mut self) -> Self {
		self.summarize = true;
		self
	}

	pub fn for_save(mut self) -> Self {
		self.for_save = true;
		self
	}

	pub fn reuse(mut self, aliases: HashSet<String>) -> Self {
		self.reuse = Some(aliases);
		self
	}
}

/// Object-safe helpers implemented for every cloneable node.
pub trait DynExpression {
	/// Clone this node into a new handle.
	fn clone_expr(&self) -> Expr;

	fn as_any(&self) -> &dyn Any;
}

impl<T: Expression + Clone + 'static> DynExpression for T {
	fn clone_expr(&self) -> Expr {
		Expr::new(self.clone())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// Resolution and compilation protocol for expression nodes.
pub trait Expression: DynExpression + fmt::Debug + fmt::Display + Send + Sync {
	/// Node name used in error messages and support checks.
	fn name(&self) -> &str;

	/// Render this node to a SQL fragment.
	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment>;

	/// Vendor-specific rendering; consulted by the compiler before
	/// [`Expression::as_sql`].
	fn as_vendor_sql(&self, _compiler: &SqlCompiler<'_>, _vendor: Vendor) -> Option<Result<SqlFragment>> {
		None
	}

	fn source_expressions(&self) -> Vec<Expr> {
		Vec::new()
	}

	/// Rebuild this node with `exprs` in place of its sources.
	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		if exprs.is_empty() {
			Ok(self.clone_expr())
		} else {
			Err(ExpressionError::value(format!(
				"{} takes no source expressions ({} given)",
				self.name(),
				exprs.len()
			)))
		}
	}

	/// Output type set explicitly on this node.
	fn declared_output_field(&self) -> Option<FieldType> {
		None
	}

	/// Output types of the sources used for inference.
	fn source_fields(&self) -> Result<Vec<Option<FieldType>>> {
		self.source_expressions()
			.iter()
			.map(|e| e.output_field_or_none())
			.collect()
	}

	/// Declared or inferred output type, `None` when nothing is known.
	fn output_field_or_none(&self) -> Result<Option<FieldType>> {
		if let Some(field) = self.declared_output_field() {
			return Ok(Some(field));
		}
		infer_output_field(&self.source_fields()?)
	}

	fn output_field(&self) -> Result<FieldType> {
		self.output_field_or_none()?.ok_or_else(|| {
			ExpressionError::field("Cannot resolve expression type, unknown output_field")
		})
	}

	/// Bind references against `query` and return the resolved node.
	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let sources = self
			.source_expressions()
			.iter()
			.map(|e| e.resolve_expression(query, options))
			.collect::<Result<Vec<_>>>()?;
		self.with_source_expressions(sources)
	}

	fn contains_aggregate(&self) -> bool {
		self.source_expressions().iter().any(|e| e.contains_aggregate())
	}

	fn contains_column_references(&self) -> bool {
		self.source_expressions()
			.iter()
			.any(|e| e.contains_column_references())
	}

	fn contributes_to_group_by(&self) -> bool {
		self.source_expressions()
			.iter()
			.any(|e| e.contributes_to_group_by())
			|| self.contains_column_references()
	}

	/// Whether this node can stand as a `WHEN` or `WHERE` condition.
	fn conditional(&self) -> bool {
		matches!(self.output_field_or_none(), Ok(Some(FieldType::BooleanField)))
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		if !self.contains_aggregate() {
			return vec![self.clone_expr()];
		}
		self.source_expressions()
			.iter()
			.flat_map(|e| e.group_by_cols())
			.collect()
	}

	/// Copy of this node with table aliases renamed through `change_map`.
	fn relabeled_clone(&self, change_map: &HashMap<String, String>) -> Result<Expr> {
		let sources = self
			.source_expressions()
			.iter()
			.map(|e| e.relabeled_clone(change_map))
			.collect::<Result<Vec<_>>>()?;
		self.with_source_expressions(sources)
	}

	/// The aggregate (and remaining lookup parts) this node refers to, if
	/// any of `existing` is referenced.
	fn refs_aggregate(&self, existing: &IndexMap<String, Expr>) -> Option<(Expr, Vec<String>)> {
		self.source_expressions()
			.iter()
			.find_map(|e| e.refs_aggregate(existing))
	}

	/// Convert a value read from the database to this node's output type.
	fn convert_value(&self, value: QueryValue) -> Result<QueryValue> {
		if value.is_null() {
			return Ok(value);
		}
		convert_to_field(&self.output_field()?, value)
	}

	fn reverse_ordering(&self) -> Expr {
		self.clone_expr()
	}
}

/// Output type inference over source types.
///
/// The first known type wins, but it must be an instance of every other
/// known source type.
///
/// # Examples
///
/// ```
/// use sqlweave_core::FieldType;
/// use sqlweave_expressions::expression::infer_output_field;
///
/// let sources = [None, Some(FieldType::BigIntegerField), Some(FieldType::IntegerField)];
/// assert_eq!(infer_output_field(&sources).unwrap(), Some(FieldType::BigIntegerField));
///
/// let mixed = [Some(FieldType::IntegerField), Some(FieldType::FloatField)];
/// assert!(infer_output_field(&mixed).is_err());
/// ```
pub fn infer_output_field(sources: &[Option<FieldType>]) -> Result<Option<FieldType>> {
	let mut output: Option<&FieldType> = None;
	for source in sources {
		if output.is_none() {
			output = source.as_ref();
		}
		if let (Some(current), Some(source)) = (output, source)
			&& !current.is_instance_of(source)
		{
			return Err(ExpressionError::field(
				"Expression contains mixed types. You must set output_field",
			));
		}
	}
	Ok(output.cloned())
}

/// Coerce a database value to the Rust type matching `field`.
pub fn convert_to_field(field: &FieldType, value: QueryValue) -> Result<QueryValue> {
	let internal_type = field.internal_type();
	if value.is_null() {
		Ok(value)
	} else if internal_type == "FloatField" {
		to_float(value)
	} else if internal_type.ends_with("IntegerField") {
		to_int(value)
	} else if internal_type == "DecimalField" {
		to_decimal(value)
	} else {
		Ok(value)
	}
}

fn conversion_error(value: &QueryValue, target: &str) -> ExpressionError {
	ExpressionError::value(format!("cannot convert {} value {} to {}", value.type_name(), value, target))
}

fn to_float(value: QueryValue) -> Result<QueryValue> {
	let converted = match &value {
		QueryValue::Float(f) => Some(*f),
		QueryValue::Int(i) => Some(*i as f64),
		QueryValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
		QueryValue::Decimal(d) => d.to_f64(),
		QueryValue::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	};
	converted
		.map(QueryValue::Float)
		.ok_or_else(|| conversion_error(&value, "float"))
}

fn to_int(value: QueryValue) -> Result<QueryValue> {
	let converted = match &value {
		QueryValue::Int(i) => Some(*i),
		QueryValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
		QueryValue::Bool(b) => Some(i64::from(*b)),
		QueryValue::Decimal(d) => d.trunc().to_i64(),
		QueryValue::String(s) => s.trim().parse::<i64>().ok(),
		_ => None,
	};
	converted
		.map(QueryValue::Int)
		.ok_or_else(|| conversion_error(&value, "int"))
}

fn to_decimal(value: QueryValue) -> Result<QueryValue> {
	let converted = match &value {
		QueryValue::Decimal(d) => Some(*d),
		QueryValue::Int(i) => Some(Decimal::from(*i)),
		QueryValue::Float(f) => Decimal::try_from(*f).ok(),
		QueryValue::String(s) => Decimal::from_str(s.trim()).ok(),
		_ => None,
	};
	converted
		.map(QueryValue::Decimal)
		.ok_or_else(|| conversion_error(&value, "decimal"))
}

/// Shared handle to an expression node.
#[derive(Clone)]
pub struct Expr(Arc<dyn Expression>);

impl Expr {
	pub fn new<E: Expression + 'static>(expression: E) -> Self {
		Self(Arc::new(expression))
	}

	/// Borrow the node as a concrete type.
	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		self.0.as_any().downcast_ref::<T>()
	}

	pub fn is<T: 'static>(&self) -> bool {
		self.downcast_ref::<T>().is_some()
	}

	/// Resolve with default options.
	pub fn resolve(&self, query: &mut dyn QueryContext) -> Result<Expr> {
		self.0.resolve_expression(query, &ResolveOptions::default())
	}

	/// This node and all of its descendants, depth first.
	pub fn flatten(&self) -> Vec<Expr> {
		let mut out = vec![self.clone()];
		for source in self.0.source_expressions() {
			out.extend(source.flatten());
		}
		out
	}

	pub fn asc(&self) -> Expr {
		Expr::new(OrderBy::new(self.clone(), false))
	}

	pub fn desc(&self) -> Expr {
		Expr::new(OrderBy::new(self.clone(), true))
	}

	/// Both handles point at the same node.
	pub fn ptr_eq(&self, other: &Expr) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Deref for Expr {
	type Target = dyn Expression;

	fn deref(&self) -> &Self::Target {
		self.0.as_ref()
	}
}

impl fmt::Debug for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&*self.0, f)
	}
}

/// Render `items` separated by `", "`.
pub(crate) fn join_display<T: fmt::Display>(items: &[T]) -> String {
	items
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}

/// Take exactly `N` expressions out of `exprs` or fail with a message naming
/// `node`.
pub(crate) fn take_sources<const N: usize>(node: &str, exprs: Vec<Expr>) -> Result<[Expr; N]> {
	let given = exprs.len();
	exprs.try_into().map_err(|_| {
		ExpressionError::value(format!(
			"{} expects {} source expression(s), got {}",
			node, N, given
		))
	})
}
