//! `Q` objects: filter conditions combined with `&`, `|` and `!`

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, ResolveOptions};
use crate::lookups::{Lookup, LookupType, LookupValue};
use crate::query::{LOOKUP_SEP, QueryContext};
use crate::reference;
use crate::where_node::{QOperator, WhereNode};
use indexmap::IndexMap;
use sqlweave_backends::SqlFragment;
use sqlweave_core::{FieldType, QueryValue};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// A child of a [`Q`]: a `path__lookup=value` filter or a nested node.
#[derive(Debug, Clone)]
pub enum QChild {
	Filter(String, LookupValue),
	Node(Q),
}

impl fmt::Display for QChild {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			QChild::Filter(path, value) => write!(f, "('{}', {})", path, value),
			QChild::Node(q) => write!(f, "{}", q),
		}
	}
}

/// An unresolved filter condition.
///
/// Resolving a `Q` against a query turns each filter into a [`Lookup`] and
/// the whole tree into a [`WhereNode`].
///
/// # Examples
///
/// ```
/// use sqlweave_expressions::Q;
///
/// let q = Q::new("kind", "G") | Q::new("balance__gt", 100);
/// assert_eq!(q.to_string(), "(OR: ('kind', 'G'), ('balance__gt', 100))");
/// assert_eq!((!Q::new("kind", "G")).to_string(), "(NOT (AND: ('kind', 'G')))");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Q {
	children: Vec<QChild>,
	connector: QOperator,
	negated: bool,
}

impl Q {
	/// A single filter; `path` may end in a lookup name such as `__gte`.
	pub fn new(path: impl Into<String>, value: impl Into<LookupValue>) -> Self {
		Self {
			children: vec![QChild::Filter(path.into(), value.into())],
			connector: QOperator::And,
			negated: false,
		}
	}

	/// All of `filters`, `AND`-ed together.
	pub fn all<P, V>(filters: impl IntoIterator<Item = (P, V)>) -> Self
	where
		P: Into<String>,
		V: Into<LookupValue>,
	{
		Self {
			children: filters
				.into_iter()
				.map(|(path, value)| QChild::Filter(path.into(), value.into()))
				.collect(),
			connector: QOperator::And,
			negated: false,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	pub fn children(&self) -> &[QChild] {
		&self.children
	}

	pub fn connector(&self) -> QOperator {
		self.connector
	}

	pub fn is_negated(&self) -> bool {
		self.negated
	}

	/// Append `other`, flattening it when its children can be merged into
	/// this node without changing the meaning.
	fn add(&mut self, other: Q) {
		if !other.negated && (other.connector == self.connector || other.children.len() == 1) {
			self.children.extend(other.children);
		} else {
			self.children.push(QChild::Node(other));
		}
	}

	fn combine(self, other: Q, connector: QOperator) -> Q {
		if other.is_empty() {
			return self;
		}
		if self.is_empty() {
			return other;
		}
		let mut combined = Q {
			children: Vec::new(),
			connector,
			negated: false,
		};
		combined.add(self);
		combined.add(other);
		combined
	}

	/// Resolve every filter into a [`Lookup`] and build the filter tree.
	pub fn build_where(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<WhereNode> {
		let children = self
			.children
			.iter()
			.map(|child| match child {
				QChild::Filter(path, value) => build_lookup(query, path, value, options),
				QChild::Node(q) => q.build_where(query, options).map(Expr::new),
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(WhereNode::new(children, self.connector, self.negated))
	}
}

/// Split `path` into the field reference and the lookup; a trailing part that
/// is not a lookup name is part of the reference and the lookup is `exact`.
fn split_lookup(path: &str) -> (&str, LookupType) {
	if let Some((field, last)) = path.rsplit_once(LOOKUP_SEP) {
		if let Some(lookup) = LookupType::from_name(last) {
			return (field, lookup);
		}
	}
	(path, LookupType::Exact)
}

fn build_lookup(
	query: &mut dyn QueryContext,
	path: &str,
	value: &LookupValue,
	options: &ResolveOptions,
) -> Result<Expr> {
	let (field, mut lookup_type) = split_lookup(path);
	let lhs = query.resolve_ref(
		field,
		options.allow_joins,
		options.reuse.as_ref(),
		options.summarize,
	)?;

	let rhs = match value {
		LookupValue::Value(QueryValue::Null) => match lookup_type {
			LookupType::Exact | LookupType::IExact => {
				lookup_type = LookupType::IsNull;
				LookupValue::Value(QueryValue::Bool(true))
			}
			_ => return Err(ExpressionError::value("Cannot use None as a query value")),
		},
		LookupValue::Expression(expr) => {
			let mut rhs_options = options.clone();
			rhs_options.for_save = false;
			LookupValue::Expression(expr.resolve_expression(query, &rhs_options)?)
		}
		other => other.clone(),
	};
	Ok(Expr::new(Lookup::new(lookup_type, lhs, rhs)?))
}

impl fmt::Display for Q {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let children = self
			.children
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(", ");
		let inner = format!("({}: {})", self.connector, children);
		if self.negated {
			write!(f, "(NOT {})", inner)
		} else {
			f.write_str(&inner)
		}
	}
}

impl BitAnd for Q {
	type Output = Q;

	fn bitand(self, rhs: Q) -> Q {
		self.combine(rhs, QOperator::And)
	}
}

impl BitOr for Q {
	type Output = Q;

	fn bitor(self, rhs: Q) -> Q {
		self.combine(rhs, QOperator::Or)
	}
}

impl Not for Q {
	type Output = Q;

	fn not(self) -> Q {
		let mut negated = Q::default();
		negated.add(self);
		negated.negated = true;
		negated
	}
}

impl Expression for Q {
	fn name(&self) -> &str {
		"Q"
	}

	fn as_sql(&self, _compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Err(ExpressionError::Unresolved(format!(
			"{} must be resolved against a query before it can be compiled",
			self
		)))
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		self.build_where(query, options).map(Expr::new)
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::BooleanField)
	}

	fn refs_aggregate(&self, existing: &IndexMap<String, Expr>) -> Option<(Expr, Vec<String>)> {
		self.children.iter().find_map(|child| match child {
			QChild::Filter(path, LookupValue::Expression(expr)) => {
				reference::refs_aggregate(path, existing).or_else(|| expr.refs_aggregate(existing))
			}
			QChild::Filter(path, _) => reference::refs_aggregate(path, existing),
			QChild::Node(q) => q.refs_aggregate(existing),
		})
	}
}
