//! SQL function calls rendered from a template

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression};
use crate::combinable::IntoExpr;
use indexmap::IndexMap;
use sqlweave_backends::{SqlFragment, SupportCheck, Vendor};
use sqlweave_core::FieldType;
use std::fmt;

pub const DEFAULT_TEMPLATE: &str = "%(function)s(%(expressions)s)";

/// Substitute `%(key)s` slots in `template` and collapse `%%` to `%`.
///
/// # Examples
///
/// ```
/// use indexmap::IndexMap;
/// use sqlweave_expressions::func::render_template;
///
/// let mut params = IndexMap::new();
/// params.insert("function".to_string(), "LOWER".to_string());
/// params.insert("expressions".to_string(), "%s".to_string());
/// assert_eq!(render_template("%(function)s(%(expressions)s)", &params).unwrap(), "LOWER(%s)");
/// assert_eq!(render_template("100%%", &params).unwrap(), "100%");
/// assert!(render_template("%(missing)s", &params).is_err());
/// ```
pub fn render_template(template: &str, params: &IndexMap<String, String>) -> Result<String> {
	let mut out = String::with_capacity(template.len() * 2);
	let mut rest = template;

	while let Some(pos) = rest.find('%') {
		out.push_str(&rest[..pos]);
		let tail = &rest[pos + 1..];
		if let Some(after) = tail.strip_prefix('%') {
			out.push('%');
			rest = after;
			continue;
		}
		let Some(body) = tail.strip_prefix('(') else {
			return Err(ExpressionError::value(format!(
				"unsupported format sequence at index {} in template {:?}",
				template.len() - rest.len() + pos,
				template
			)));
		};
		let Some(close) = body.find(")s") else {
			return Err(ExpressionError::value(format!(
				"unterminated key in template {:?}",
				template
			)));
		};
		let key = &body[..close];
		let value = params.get(key).ok_or_else(|| {
			ExpressionError::value(format!("template key '{}' has no value", key))
		})?;
		out.push_str(value);
		rest = &body[close + 2..];
	}
	out.push_str(rest);
	Ok(out)
}

/// A function call node.
///
/// The node renders `template` with `function`, the compiled arguments
/// joined by `arg_joiner` (as `expressions`, also available as `field`) and
/// any `extra` entries.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::PostgresOperations;
/// use sqlweave_expressions::{F, Func, IntoExpr, SqlCompiler, Value};
///
/// let func = Func::new("REPLACE", vec![Value::new("a").into_expr(), Value::new("b").into_expr()])
///     .template("%(function)s(%(expressions)s, '')");
/// let ops = PostgresOperations::new();
/// assert_eq!(SqlCompiler::new(&ops).compile(&func.into_expr()).unwrap().0, "REPLACE(%s, %s, '')");
/// ```
#[derive(Debug, Clone)]
pub struct Func {
	name: String,
	function: String,
	template: String,
	arg_joiner: String,
	source_expressions: Vec<Expr>,
	extra: IndexMap<String, String>,
	output_field: Option<FieldType>,
	vendor_functions: Vec<(Vendor, String)>,
}

impl Func {
	/// A call to `function` with no arity check.
	pub fn new(function: impl Into<String>, expressions: Vec<Expr>) -> Self {
		Self {
			name: "Func".to_string(),
			function: function.into(),
			template: DEFAULT_TEMPLATE.to_string(),
			arg_joiner: ", ".to_string(),
			source_expressions: expressions,
			extra: IndexMap::new(),
			output_field: None,
			vendor_functions: Vec::new(),
		}
	}

	/// A named function taking exactly `arity` arguments.
	pub fn with_arity(
		name: impl Into<String>,
		function: impl Into<String>,
		arity: usize,
		expressions: Vec<Expr>,
	) -> Result<Self> {
		let name = name.into();
		if expressions.len() != arity {
			return Err(ExpressionError::type_error(format!(
				"'{}' takes exactly {} {} ({} given)",
				name,
				arity,
				if arity == 1 { "argument" } else { "arguments" },
				expressions.len()
			)));
		}
		Ok(Self::new(function, expressions).named(name))
	}

	/// Convenience for building from anything convertible to expressions.
	pub fn call<I, E>(function: impl Into<String>, expressions: I) -> Self
	where
		I: IntoIterator<Item = E>,
		E: IntoExpr,
	{
		Self::new(function, expressions.into_iter().map(IntoExpr::into_expr).collect())
	}

	/// Name used in error messages, `Display` and support checks.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn template(mut self, template: impl Into<String>) -> Self {
		self.template = template.into();
		self
	}

	pub fn arg_joiner(mut self, joiner: impl Into<String>) -> Self {
		self.arg_joiner = joiner.into();
		self
	}

	/// Extra template value.
	pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.insert(key.into(), value.into());
		self
	}

	pub fn with_output_field(mut self, field: FieldType) -> Self {
		self.output_field = Some(field);
		self
	}

	/// Call `function` instead on `vendor`.
	pub fn vendor_function(mut self, vendor: Vendor, function: impl Into<String>) -> Self {
		self.vendor_functions.push((vendor, function.into()));
		self
	}

	pub fn function(&self) -> &str {
		&self.function
	}

	pub fn arguments(&self) -> &[Expr] {
		&self.source_expressions
	}

	/// Same call with `arguments` in place of the current ones.
	pub fn with_arguments(&self, arguments: Vec<Expr>) -> Self {
		let mut rebuilt = self.clone();
		rebuilt.source_expressions = arguments;
		rebuilt
	}

	/// Render with optional overrides of the function name and template and
	/// additional template values.
	pub fn as_sql_with(
		&self,
		compiler: &SqlCompiler<'_>,
		function: Option<&str>,
		template: Option<&str>,
		extra: &[(&str, String)],
	) -> Result<SqlFragment> {
		compiler.ops().check_expression_support(
			&SupportCheck::new(&self.name).with_source_fields(self.source_fields()?),
		)?;

		let mut sql_parts = Vec::with_capacity(self.source_expressions.len());
		let mut params = Vec::new();
		for arg in &self.source_expressions {
			let (arg_sql, arg_params) = compiler.compile(arg)?;
			sql_parts.push(arg_sql);
			params.extend(arg_params);
		}

		let mut template_params = self.extra.clone();
		for (key, value) in extra {
			template_params.insert(key.to_string(), value.clone());
		}
		let function = function
			.map(str::to_string)
			.or_else(|| template_params.get("function").cloned())
			.unwrap_or_else(|| self.function.clone());
		template_params.insert("function".to_string(), function);
		let joined = sql_parts.join(&self.arg_joiner);
		template_params.insert("expressions".to_string(), joined.clone());
		template_params.insert("field".to_string(), joined);

		let template = template
			.map(str::to_string)
			.or_else(|| template_params.get("template").cloned())
			.unwrap_or_else(|| self.template.clone());
		Ok((render_template(&template, &template_params)?, params))
	}

	fn vendor_function_for(&self, vendor: Vendor) -> Option<&str> {
		self.vendor_functions
			.iter()
			.find(|(v, _)| *v == vendor)
			.map(|(_, function)| function.as_str())
	}
}

impl fmt::Display for Func {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let args: Vec<String> = self.source_expressions.iter().map(ToString::to_string).collect();
		write!(f, "{}({}", self.name, args.join(&self.arg_joiner))?;
		for (key, value) in &self.extra {
			write!(f, ", {}={}", key, value)?;
		}
		f.write_str(")")
	}
}

impl Expression for Func {
	fn name(&self) -> &str {
		&self.name
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		self.as_sql_with(compiler, None, None, &[])
	}

	fn as_vendor_sql(&self, compiler: &SqlCompiler<'_>, vendor: Vendor) -> Option<Result<SqlFragment>> {
		let function = self.vendor_function_for(vendor);
		if vendor != Vendor::Sqlite {
			return function.map(|function| self.as_sql_with(compiler, Some(function), None, &[]));
		}
		Some(self.as_sql_with(compiler, function, None, &[]).map(|(sql, params)| {
			match self.output_field_or_none() {
				Ok(Some(FieldType::DecimalField { .. })) => (format!("CAST({} AS NUMERIC)", sql), params),
				_ => (sql, params),
			}
		}))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.source_expressions.clone()
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		Ok(Expr::new(self.with_arguments(exprs)))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		self.output_field.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::leaves::Col;
	use crate::query::Column;
	use crate::{F, Value};
	use rstest::rstest;
	use sqlweave_backends::{MySqlOperations, PostgresOperations, SqliteOperations};

	fn decimal_col(name: &str) -> Expr {
		Col::new(
			"t",
			Column::new(
				name,
				FieldType::DecimalField {
					max_digits: 8,
					decimal_places: 2,
				},
			),
		)
		.into_expr()
	}

	#[rstest]
	#[case(1, 2, "'Lower' takes exactly 1 argument (2 given)")]
	#[case(2, 1, "'Lower' takes exactly 2 arguments (1 given)")]
	fn test_arity_message(#[case] arity: usize, #[case] given: usize, #[case] expected: &str) {
		let args = (0..given).map(|i| Value::new(i as i64).into_expr()).collect();
		let err = Func::with_arity("Lower", "LOWER", arity, args).unwrap_err();
		assert!(matches!(err, ExpressionError::TypeError(_)));
		assert_eq!(err.to_string(), expected);
	}

	#[rstest]
	fn test_default_template_and_params() {
		let func = Func::call("CONCAT", [Value::new("a"), Value::new("b")]);
		let ops = PostgresOperations::new();
		let (sql, params) = SqlCompiler::new(&ops).compile(&func.into_expr()).unwrap();
		assert_eq!(sql, "CONCAT(%s, %s)");
		assert_eq!(params.len(), 2);
	}

	#[rstest]
	fn test_extra_and_custom_joiner() {
		let func = Func::call("", [decimal_col("a"), decimal_col("b")])
			.arg_joiner(" + ")
			.template("(%(expressions)s) %(suffix)s")
			.extra("suffix", "AS total");
		let ops = PostgresOperations::new();
		assert_eq!(
			SqlCompiler::new(&ops).compile(&func.clone().into_expr()).unwrap().0,
			"(\"t\".\"a\" + \"t\".\"b\") AS total"
		);
		assert_eq!(func.to_string(), "Func(Col(t, a) + Col(t, b), suffix=AS total)");
	}

	#[rstest]
	fn test_sqlite_casts_decimal_output() {
		let func = Func::call("ABS", [decimal_col("a")]).into_expr();
		let lite = SqliteOperations::new();
		assert_eq!(
			SqlCompiler::new(&lite).compile(&func).unwrap().0,
			"CAST(ABS(\"t\".\"a\") AS NUMERIC)"
		);
		let my = MySqlOperations::default();
		assert_eq!(SqlCompiler::new(&my).compile(&func).unwrap().0, "ABS(`t`.`a`)");
	}

	#[rstest]
	fn test_vendor_function_override() {
		let func = Func::call("GREATEST", [F::new("a"), F::new("b")])
			.vendor_function(Vendor::Sqlite, "MAX");
		assert_eq!(func.vendor_function_for(Vendor::Sqlite), Some("MAX"));
		assert_eq!(func.vendor_function_for(Vendor::Mysql), None);
	}

	#[rstest]
	fn test_template_errors() {
		let params = IndexMap::new();
		assert!(render_template("%d", &params).is_err());
		assert!(render_template("%(open", &params).is_err());
	}
}
