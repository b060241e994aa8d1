//! Field lookups: the `path__lookup=value` leaves of a filter

use crate::combinable::IntoExpr;
use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, take_sources};
use crate::reference::F;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use sqlweave_backends::{DatabaseOperations, SqlFragment, SupportCheck};
use sqlweave_core::{FieldType, QueryValue};
use std::fmt;
use uuid::Uuid;

/// Lookup type for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupType {
	Exact,
	IExact,
	Gt,
	Gte,
	Lt,
	Lte,
	In,
	Contains,
	IContains,
	StartsWith,
	IStartsWith,
	EndsWith,
	IEndsWith,
	Range,
	IsNull,
	Regex,
	IRegex,
}

impl LookupType {
	/// Parse the name used after `__` in a filter path.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_expressions::LookupType;
	///
	/// assert_eq!(LookupType::from_name("istartswith"), Some(LookupType::IStartsWith));
	/// assert_eq!(LookupType::from_name("name"), None);
	/// ```
	pub fn from_name(name: &str) -> Option<Self> {
		let lookup = match name {
			"exact" => LookupType::Exact,
			"iexact" => LookupType::IExact,
			"gt" => LookupType::Gt,
			"gte" => LookupType::Gte,
			"lt" => LookupType::Lt,
			"lte" => LookupType::Lte,
			"in" => LookupType::In,
			"contains" => LookupType::Contains,
			"icontains" => LookupType::IContains,
			"startswith" => LookupType::StartsWith,
			"istartswith" => LookupType::IStartsWith,
			"endswith" => LookupType::EndsWith,
			"iendswith" => LookupType::IEndsWith,
			"range" => LookupType::Range,
			"isnull" => LookupType::IsNull,
			"regex" => LookupType::Regex,
			"iregex" => LookupType::IRegex,
			_ => return None,
		};
		Some(lookup)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LookupType::Exact => "exact",
			LookupType::IExact => "iexact",
			LookupType::Gt => "gt",
			LookupType::Gte => "gte",
			LookupType::Lt => "lt",
			LookupType::Lte => "lte",
			LookupType::In => "in",
			LookupType::Contains => "contains",
			LookupType::IContains => "icontains",
			LookupType::StartsWith => "startswith",
			LookupType::IStartsWith => "istartswith",
			LookupType::EndsWith => "endswith",
			LookupType::IEndsWith => "iendswith",
			LookupType::Range => "range",
			LookupType::IsNull => "isnull",
			LookupType::Regex => "regex",
			LookupType::IRegex => "iregex",
		}
	}

	/// `LIKE` lookups whose value is wrapped in wildcards.
	pub fn is_pattern(&self) -> bool {
		matches!(
			self,
			LookupType::Contains
				| LookupType::IContains
				| LookupType::StartsWith
				| LookupType::IStartsWith
				| LookupType::EndsWith
				| LookupType::IEndsWith
		)
	}

	/// Wrap an escaped literal in the wildcards of this pattern lookup.
	fn wrap_pattern(&self, escaped: &str) -> String {
		match self {
			LookupType::Contains | LookupType::IContains => format!("%{}%", escaped),
			LookupType::StartsWith | LookupType::IStartsWith => format!("{}%", escaped),
			LookupType::EndsWith | LookupType::IEndsWith => format!("%{}", escaped),
			_ => escaped.to_string(),
		}
	}
}

impl fmt::Display for LookupType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Right-hand side of a lookup.
#[derive(Debug, Clone)]
pub enum LookupValue {
	Value(QueryValue),
	List(Vec<QueryValue>),
	Expression(Expr),
}

impl LookupValue {
	pub fn is_null(&self) -> bool {
		matches!(self, LookupValue::Value(QueryValue::Null))
	}
}

impl fmt::Display for LookupValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LookupValue::Value(value) => write!(f, "{}", value),
			LookupValue::List(values) => write!(f, "{}", QueryValue::Array(values.clone())),
			LookupValue::Expression(expr) => write!(f, "{}", expr),
		}
	}
}

macro_rules! impl_from_for_lookup_value {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<$ty> for LookupValue {
				fn from(value: $ty) -> Self {
					LookupValue::Value(value.into())
				}
			}

			impl From<Vec<$ty>> for LookupValue {
				fn from(values: Vec<$ty>) -> Self {
					LookupValue::List(values.into_iter().map(Into::into).collect())
				}
			}
		)*
	};
}

impl_from_for_lookup_value!(
	bool,
	i32,
	i64,
	f64,
	&str,
	String,
	Decimal,
	NaiveDate,
	NaiveDateTime,
	DateTime<Utc>,
	NaiveTime,
	TimeDelta,
	Uuid,
	QueryValue,
);

impl<T: Into<LookupValue>> From<Option<T>> for LookupValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(LookupValue::Value(QueryValue::Null), Into::into)
	}
}

impl<A: Into<QueryValue>, B: Into<QueryValue>> From<(A, B)> for LookupValue {
	fn from((low, high): (A, B)) -> Self {
		LookupValue::List(vec![low.into(), high.into()])
	}
}

impl From<Expr> for LookupValue {
	fn from(expr: Expr) -> Self {
		LookupValue::Expression(expr)
	}
}

impl From<F> for LookupValue {
	fn from(reference: F) -> Self {
		LookupValue::Expression(reference.into_expr())
	}
}

/// Text of a value used inside a `LIKE` pattern.
fn pattern_text(value: &QueryValue) -> String {
	match value {
		QueryValue::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// `lhs <operator> rhs`, a boolean condition.
#[derive(Debug, Clone)]
pub struct Lookup {
	lookup_type: LookupType,
	lhs: Expr,
	rhs: LookupValue,
}

impl Lookup {
	/// Check the shape of `rhs` for `lookup_type`.
	pub fn new(lookup_type: LookupType, lhs: Expr, rhs: LookupValue) -> Result<Self> {
		match (&lookup_type, &rhs) {
			(LookupType::In, LookupValue::List(_)) => {}
			(LookupType::In, _) => {
				return Err(ExpressionError::value("The 'in' lookup requires a list of values"));
			}
			(LookupType::Range, LookupValue::List(values)) if values.len() == 2 => {}
			(LookupType::Range, _) => {
				return Err(ExpressionError::value(
					"The 'range' lookup requires exactly two values",
				));
			}
			(LookupType::IsNull, LookupValue::Value(QueryValue::Bool(_))) => {}
			(LookupType::IsNull, _) => {
				return Err(ExpressionError::value(
					"The QuerySet value for an isnull lookup must be True or False.",
				));
			}
			(_, LookupValue::List(_)) => {
				return Err(ExpressionError::value(format!(
					"The '{}' lookup does not accept a list of values",
					lookup_type
				)));
			}
			(_, LookupValue::Value(QueryValue::Null)) => {
				return Err(ExpressionError::value("Cannot use None as a query value"));
			}
			_ => {}
		}
		Ok(Self { lookup_type, lhs, rhs })
	}

	pub fn lookup_type(&self) -> LookupType {
		self.lookup_type
	}

	pub fn lhs(&self) -> &Expr {
		&self.lhs
	}

	pub fn rhs(&self) -> &LookupValue {
		&self.rhs
	}

	fn adapt(&self, ops: &dyn DatabaseOperations, field: &Option<FieldType>, value: &QueryValue) -> QueryValue {
		match field {
			Some(field) => ops.adapt_value(field, value.clone()),
			None => value.clone(),
		}
	}

	/// Prepared parameter for a single-value right-hand side.
	fn prepare_value(&self, ops: &dyn DatabaseOperations, field: &Option<FieldType>, value: &QueryValue) -> QueryValue {
		match self.lookup_type {
			lookup if lookup.is_pattern() => {
				QueryValue::String(lookup.wrap_pattern(&ops.prep_for_like_query(&pattern_text(value))))
			}
			LookupType::IExact => match value {
				QueryValue::String(s) => QueryValue::String(ops.prep_for_iexact_query(s)),
				other => self.adapt(ops, field, other),
			},
			LookupType::Regex | LookupType::IRegex => value.clone(),
			_ => self.adapt(ops, field, value),
		}
	}

	fn operator(&self, ops: &dyn DatabaseOperations) -> Result<&'static str> {
		ops.lookup_operator(self.lookup_type.as_str()).ok_or_else(|| {
			ExpressionError::field(format!(
				"Unsupported lookup '{}' for {}",
				self.lookup_type,
				ops.vendor()
			))
		})
	}
}

impl fmt::Display for Lookup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}__{}={}", self.lhs, self.lookup_type, self.rhs)
	}
}

impl Expression for Lookup {
	fn name(&self) -> &str {
		"Lookup"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(&SupportCheck::new(self.name()))?;

		let field = self.lhs.output_field_or_none()?;
		let internal_type = field.as_ref().map_or("Field", |f| f.internal_type());
		let (lhs_sql, mut params) = compiler.compile(&self.lhs)?;
		let lhs_sql = ops
			.lookup_cast(self.lookup_type.as_str(), internal_type)
			.replacen("%s", &lhs_sql, 1);

		match (&self.lookup_type, &self.rhs) {
			(LookupType::IsNull, LookupValue::Value(QueryValue::Bool(is_null))) => {
				let test = if *is_null { "IS NULL" } else { "IS NOT NULL" };
				Ok((format!("{} {}", lhs_sql, test), params))
			}
			(LookupType::In, LookupValue::List(values)) => {
				let values: Vec<QueryValue> = values
					.iter()
					.filter(|v| !v.is_null())
					.map(|v| self.adapt(ops, &field, v))
					.collect();
				if values.is_empty() {
					return Err(ExpressionError::EmptyResultSet);
				}
				let placeholders = vec!["%s"; values.len()].join(", ");
				params.extend(values);
				Ok((format!("{} IN ({})", lhs_sql, placeholders), params))
			}
			(LookupType::Range, LookupValue::List(values)) => {
				params.extend(values.iter().map(|v| self.adapt(ops, &field, v)));
				Ok((format!("{} BETWEEN %s AND %s", lhs_sql), params))
			}
			(lookup, LookupValue::Expression(rhs)) => {
				let (rhs_sql, rhs_params) = compiler.compile(rhs)?;
				params.extend(rhs_params);
				let rhs_op = match ops.pattern_operator(lookup.as_str()) {
					Some(pattern) => pattern.replace("{}", &ops.pattern_escape().replace("{}", &rhs_sql)),
					None => self.operator(ops)?.replacen("%s", &rhs_sql, 1),
				};
				Ok((format!("{} {}", lhs_sql, rhs_op), params))
			}
			(_, LookupValue::Value(value)) => {
				params.push(self.prepare_value(ops, &field, value));
				Ok((format!("{} {}", lhs_sql, self.operator(ops)?), params))
			}
			(lookup, rhs) => Err(ExpressionError::value(format!(
				"Invalid value {} for the '{}' lookup",
				rhs, lookup
			))),
		}
	}

	fn source_expressions(&self) -> Vec<Expr> {
		let mut sources = vec![self.lhs.clone()];
		if let LookupValue::Expression(rhs) = &self.rhs {
			sources.push(rhs.clone());
		}
		sources
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let (lhs, rhs) = match &self.rhs {
			LookupValue::Expression(_) => {
				let [lhs, rhs] = take_sources(self.name(), exprs)?;
				(lhs, LookupValue::Expression(rhs))
			}
			other => {
				let [lhs] = take_sources(self.name(), exprs)?;
				(lhs, other.clone())
			}
		};
		Ok(Expr::new(Self {
			lookup_type: self.lookup_type,
			lhs,
			rhs,
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::BooleanField)
	}
}
