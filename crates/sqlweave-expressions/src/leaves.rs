//! Leaf nodes: literals, raw SQL, columns and alias references

use crate::compiler::SqlCompiler;
use crate::error::Result;
use crate::expression::{Expr, Expression, ResolveOptions, take_sources};
use crate::query::{Column, QueryContext};
use chrono::TimeDelta;
use sqlweave_backends::{SqlFragment, SupportCheck};
use sqlweave_core::{FieldType, QueryValue};
use std::collections::HashMap;
use std::fmt;

/// A literal bound as a query parameter.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{IntoExpr, SqlCompiler, Value};
/// use sqlweave_core::QueryValue;
///
/// let ops = PostgresOperations::new();
/// let compiler = SqlCompiler::new(&ops);
/// assert_eq!(compiler.compile(&Value::new(5).into_expr()).unwrap(), ("%s".to_string(), vec![QueryValue::Int(5)]));
/// assert_eq!(compiler.compile(&Value::null().into_expr()).unwrap().0, "NULL");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
	value: QueryValue,
	output_field: Option<FieldType>,
	for_save: bool,
}

impl Value {
	pub fn new(value: impl Into<QueryValue>) -> Self {
		Self {
			value: value.into(),
			output_field: None,
			for_save: false,
		}
	}

	pub fn null() -> Self {
		Self::new(QueryValue::Null)
	}

	/// Adapt the value through `field` when rendering.
	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = Some(field);
		self
	}

	pub fn value(&self) -> &QueryValue {
		&self.value
	}

	pub fn for_save(&self) -> bool {
		self.for_save
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Value({})", self.value)
	}
}

impl Expression for Value {
	fn name(&self) -> &str {
		"Value"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(&SupportCheck::new(self.name()))?;
		let value = match &self.output_field {
			Some(field) if self.for_save => ops.adapt_save_value(field, self.value.clone()),
			Some(field) => ops.adapt_value(field, self.value.clone()),
			None => self.value.clone(),
		};
		// A literal NULL keeps its type open inside CASE branches.
		if value.is_null() {
			return Ok(("NULL".to_string(), Vec::new()));
		}
		Ok(("%s".to_string(), vec![value]))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		self.output_field.clone()
	}

	fn resolve_expression(&self, _query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let mut resolved = self.clone();
		resolved.for_save = options.for_save;
		Ok(Expr::new(resolved))
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		Vec::new()
	}
}

/// A duration literal.
///
/// Bound as a parameter where the engine has an interval type, otherwise
/// rendered by the backend as an interval literal.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationValue {
	value: TimeDelta,
}

impl DurationValue {
	pub fn new(value: TimeDelta) -> Self {
		Self { value }
	}

	pub fn value(&self) -> TimeDelta {
		self.value
	}
}

impl fmt::Display for DurationValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DurationValue({})", QueryValue::Duration(self.value))
	}
}

impl Expression for DurationValue {
	fn name(&self) -> &str {
		"DurationValue"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let ops = compiler.ops();
		ops.check_expression_support(&SupportCheck::new(self.name()))?;
		let features = ops.features();
		if features.has_native_duration_field && features.driver_supports_timedelta_args {
			return Ok(("%s".to_string(), vec![QueryValue::Duration(self.value)]));
		}
		Ok(ops.date_interval_sql(&self.value)?)
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::DurationField)
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		Vec::new()
	}
}

/// A verbatim SQL snippet with its own parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
	sql: String,
	params: Vec<QueryValue>,
	output_field: FieldType,
}

impl RawSql {
	pub fn new(sql: impl Into<String>, params: Vec<QueryValue>) -> Self {
		Self {
			sql: sql.into(),
			params,
			output_field: FieldType::Field,
		}
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = field;
		self
	}
}

impl fmt::Display for RawSql {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RawSQL({}, {})", self.sql, QueryValue::Array(self.params.clone()))
	}
}

impl Expression for RawSql {
	fn name(&self) -> &str {
		"RawSQL"
	}

	fn as_sql(&self, _compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Ok((format!("({})", self.sql), self.params.clone()))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(self.output_field.clone())
	}

	fn contributes_to_group_by(&self) -> bool {
		true
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		vec![Expr::new(self.clone())]
	}
}

/// `*`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Star;

impl fmt::Display for Star {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("'*'")
	}
}

impl Expression for Star {
	fn name(&self) -> &str {
		"Star"
	}

	fn as_sql(&self, _compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Ok(("*".to_string(), Vec::new()))
	}
}

/// The vendor's random number function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Random;

impl fmt::Display for Random {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Random()")
	}
}

impl Expression for Random {
	fn name(&self) -> &str {
		"Random"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Ok((compiler.ops().random_function_sql().to_string(), Vec::new()))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::FloatField)
	}
}

/// A column of a table alias in the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Col {
	alias: String,
	target: Column,
	output_field: FieldType,
}

impl Col {
	/// A column whose output type is the column's own type.
	pub fn new(alias: impl Into<String>, target: Column) -> Self {
		Self {
			alias: alias.into(),
			output_field: target.field_type.clone(),
			target,
		}
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = field;
		self
	}

	pub fn alias(&self) -> &str {
		&self.alias
	}

	pub fn target(&self) -> &Column {
		&self.target
	}
}

impl fmt::Display for Col {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Col({}, {})", self.alias, self.target)
	}
}

impl Expression for Col {
	fn name(&self) -> &str {
		"Col"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Ok((
			format!(
				"{}.{}",
				compiler.quote_name_unless_alias(&self.alias),
				compiler.quote_name_unless_alias(&self.target.column)
			),
			Vec::new(),
		))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(self.output_field.clone())
	}

	fn contains_column_references(&self) -> bool {
		true
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		vec![Expr::new(self.clone())]
	}

	fn relabeled_clone(&self, change_map: &HashMap<String, String>) -> Result<Expr> {
		let mut relabeled = self.clone();
		if let Some(alias) = change_map.get(&self.alias) {
			relabeled.alias = alias.clone();
		}
		Ok(Expr::new(relabeled))
	}
}

/// Reference to a column alias already selected by the query, e.g. an
/// annotation.
#[derive(Debug, Clone)]
pub struct Ref {
	refs: String,
	source: Expr,
}

impl Ref {
	pub fn new(refs: impl Into<String>, source: Expr) -> Self {
		Self {
			refs: refs.into(),
			source,
		}
	}

	pub fn refs(&self) -> &str {
		&self.refs
	}

	pub fn source(&self) -> &Expr {
		&self.source
	}
}

impl fmt::Display for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Ref({}, {})", self.refs, self.source)
	}
}

impl Expression for Ref {
	fn name(&self) -> &str {
		"Ref"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		Ok((compiler.ops().quote_name(&self.refs), Vec::new()))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.source.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [source] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self {
			refs: self.refs.clone(),
			source,
		}))
	}

	// The source was resolved when the alias was added.
	fn resolve_expression(&self, _query: &mut dyn QueryContext, _options: &ResolveOptions) -> Result<Expr> {
		Ok(Expr::new(self.clone()))
	}

	fn relabeled_clone(&self, _change_map: &HashMap<String, String>) -> Result<Expr> {
		Ok(Expr::new(self.clone()))
	}

	fn group_by_cols(&self) -> Vec<Expr> {
		vec![Expr::new(self.clone())]
	}
}

/// Gives an inner expression an explicit output type.
#[derive(Debug, Clone)]
pub struct ExpressionWrapper {
	expression: Expr,
	output_field: FieldType,
}

impl ExpressionWrapper {
	pub fn new(expression: impl crate::IntoExpr, output_field: FieldType) -> Self {
		Self {
			expression: expression.into_expr(),
			output_field,
		}
	}

	pub fn expression(&self) -> &Expr {
		&self.expression
	}
}

impl fmt::Display for ExpressionWrapper {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ExpressionWrapper({})", self.expression)
	}
}

impl Expression for ExpressionWrapper {
	fn name(&self) -> &str {
		"ExpressionWrapper"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		self.expression.as_sql(compiler)
	}

	fn source_expressions(&self) -> Vec<Expr> {
		vec![self.expression.clone()]
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let [expression] = take_sources(self.name(), exprs)?;
		Ok(Expr::new(Self {
			expression,
			output_field: self.output_field.clone(),
		}))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(self.output_field.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::IntoExpr;
	use crate::query::{Model, Query};
	use chrono::NaiveDate;
	use rstest::rstest;
	use rust_decimal::Decimal;
	use sqlweave_backends::{MySqlOperations, PostgresOperations, SqliteOperations};

	#[rstest]
	fn test_value_adapts_through_output_field() {
		let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
		let expr = Value::new(date).with_output_field(FieldType::DateField).into_expr();
		let ops = SqliteOperations::new();
		let (_, params) = SqlCompiler::new(&ops).compile(&expr).unwrap();
		assert_eq!(params, vec![QueryValue::from("2020-01-02")]);

		let ops = PostgresOperations::new();
		let (_, params) = SqlCompiler::new(&ops).compile(&expr).unwrap();
		assert_eq!(params, vec![QueryValue::Date(date)]);
	}

	#[rstest]
	fn test_value_has_no_group_by_and_no_type() {
		let value = Value::new("x");
		assert!(value.group_by_cols().is_empty());
		assert_eq!(value.output_field_or_none().unwrap(), None);
	}

	#[rstest]
	fn test_value_resolve_sets_for_save() {
		let mut query = Query::new(Model::new("t"));
		let resolved = Value::new(1)
			.into_expr()
			.resolve_expression(&mut query, &ResolveOptions::default().for_save())
			.unwrap();
		assert!(resolved.downcast_ref::<Value>().unwrap().for_save());
	}

	#[rstest]
	#[case::save(true, QueryValue::Decimal(Decimal::new(314, 2)))]
	#[case::filter(false, QueryValue::Decimal(Decimal::new(314159, 5)))]
	fn test_value_rounds_decimals_only_when_saving(#[case] for_save: bool, #[case] expected: QueryValue) {
		let mut query = Query::new(Model::new("t"));
		let options = if for_save {
			ResolveOptions::default().for_save()
		} else {
			ResolveOptions::default()
		};
		let field = FieldType::DecimalField { max_digits: 5, decimal_places: 2 };
		let resolved = Value::new(Decimal::new(314159, 5))
			.with_output_field(field)
			.into_expr()
			.resolve_expression(&mut query, &options)
			.unwrap();

		let ops = PostgresOperations::new();
		let (sql, params) = SqlCompiler::new(&ops).compile(&resolved).unwrap();
		assert_eq!(sql, "%s");
		assert_eq!(params, vec![expected]);

		let ops = SqliteOperations::new();
		let (_, params) = SqlCompiler::new(&ops).compile(&resolved).unwrap();
		assert_eq!(params, vec![QueryValue::from("3.14")]);
	}

	#[rstest]
	fn test_duration_value_per_vendor() {
		let expr = DurationValue::new(TimeDelta::days(1)).into_expr();
		let pg = PostgresOperations::new();
		assert_eq!(
			SqlCompiler::new(&pg).compile(&expr).unwrap(),
			("%s".to_string(), vec![QueryValue::Duration(TimeDelta::days(1))])
		);
		let my = MySqlOperations::default();
		assert_eq!(
			SqlCompiler::new(&my).compile(&expr).unwrap().0,
			"INTERVAL '1 0:0:0:0' DAY_MICROSECOND"
		);
	}

	#[rstest]
	fn test_raw_sql() {
		let raw = RawSql::new("SELECT MAX(id) FROM t WHERE id > %s", vec![QueryValue::Int(3)]);
		let ops = PostgresOperations::new();
		let (sql, params) = SqlCompiler::new(&ops).compile(&raw.clone().into_expr()).unwrap();
		assert_eq!(sql, "(SELECT MAX(id) FROM t WHERE id > %s)");
		assert_eq!(params, vec![QueryValue::Int(3)]);
		assert!(raw.contributes_to_group_by());
		assert_eq!(raw.output_field().unwrap(), FieldType::Field);
		assert_eq!(raw.group_by_cols().len(), 1);
	}

	#[rstest]
	fn test_star_and_random() {
		let ops = MySqlOperations::default();
		let compiler = SqlCompiler::new(&ops);
		assert_eq!(compiler.compile(&Star.into_expr()).unwrap().0, "*");
		assert_eq!(compiler.compile(&Random.into_expr()).unwrap().0, "RAND()");
		assert_eq!(Random.output_field().unwrap(), FieldType::FloatField);
	}

	#[rstest]
	fn test_col_relabel() {
		let col = Col::new("T2", Column::new("name", FieldType::TextField));
		let mut change_map = HashMap::new();
		change_map.insert("T2".to_string(), "T5".to_string());
		let relabeled = col.relabeled_clone(&change_map).unwrap();
		assert_eq!(relabeled.downcast_ref::<Col>().unwrap().alias(), "T5");
		assert!(col.contains_column_references());
		assert!(col.contributes_to_group_by());
	}

	#[rstest]
	fn test_col_quoting() {
		let col = Col::new("book", Column::new("title", FieldType::TextField).db_column("book_title"));
		let ops = MySqlOperations::default();
		assert_eq!(
			SqlCompiler::new(&ops).compile(&col.into_expr()).unwrap().0,
			"`book`.`book_title`"
		);
	}

	#[rstest]
	fn test_ref_renders_alias_and_ignores_relabel() {
		let source = Col::new("t", Column::new("n", FieldType::IntegerField)).into_expr();
		let reference = Ref::new("total", source);
		let ops = PostgresOperations::new();
		assert_eq!(SqlCompiler::new(&ops).compile(&reference.clone().into_expr()).unwrap().0, "\"total\"");
		assert_eq!(reference.output_field().unwrap(), FieldType::IntegerField);
		let mut change_map = HashMap::new();
		change_map.insert("t".to_string(), "u".to_string());
		let relabeled = reference.relabeled_clone(&change_map).unwrap();
		let inner = relabeled.downcast_ref::<Ref>().unwrap().source();
		assert_eq!(inner.downcast_ref::<Col>().unwrap().alias(), "t");
	}

	#[rstest]
	fn test_wrapper_overrides_output_field() {
		let wrapped = ExpressionWrapper::new(Value::new(1), FieldType::BigIntegerField);
		assert_eq!(wrapped.output_field().unwrap(), FieldType::BigIntegerField);
		let ops = PostgresOperations::new();
		assert_eq!(SqlCompiler::new(&ops).compile(&wrapped.into_expr()).unwrap().0, "%s");
	}
}
