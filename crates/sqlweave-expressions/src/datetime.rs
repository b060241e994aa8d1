//! Date and datetime truncation of a model field
//!
//! [`Date`] and [`DateTime`] name a field by reference and truncate it to a
//! calendar unit. They resolve the field through the query, check its type
//! and, for datetimes, capture the time zone to truncate in.

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, Expression, ResolveOptions};
use crate::query::QueryContext;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlweave_backends::SqlFragment;
use sqlweave_core::{FieldType, QueryValue};
use std::fmt;

const DATE_KINDS: &[&str] = &["year", "month", "week", "day"];
const DATETIME_KINDS: &[&str] = &["year", "month", "week", "day", "hour", "minute", "second"];

fn check_kind(kind: &str, allowed: &[&str]) -> Result<()> {
	if allowed.contains(&kind) {
		return Ok(());
	}
	let quoted: Vec<String> = allowed.iter().map(|k| format!("'{}'", k)).collect();
	let (last, rest) = quoted.split_last().map_or(("", &[][..]), |(l, r)| (l.as_str(), r));
	Err(ExpressionError::value(format!(
		"'kind' must be one of {}, or {}.",
		rest.join(", "),
		last
	)))
}

fn unresolved(node: &dyn fmt::Display) -> ExpressionError {
	ExpressionError::Unresolved(format!(
		"{} must be resolved against a query before it can be compiled",
		node
	))
}

/// Compile the resolved column; a truncated column takes no parameters.
fn compile_column(compiler: &SqlCompiler<'_>, col: &Expr) -> Result<String> {
	let (sql, params) = compiler.compile(col)?;
	if !params.is_empty() {
		return Err(ExpressionError::value(format!(
			"Truncated column {} must not take parameters",
			col
		)));
	}
	Ok(sql)
}

/// `field` truncated to a date unit.
#[derive(Debug, Clone)]
pub struct Date {
	lookup: String,
	kind: String,
	col: Option<Expr>,
}

impl Date {
	/// `kind` is one of `year`, `month`, `week` or `day`.
	pub fn new(lookup: impl Into<String>, kind: impl Into<String>) -> Result<Self> {
		let kind = kind.into();
		check_kind(&kind, DATE_KINDS)?;
		Ok(Self {
			lookup: lookup.into(),
			kind,
			col: None,
		})
	}

	pub fn kind(&self) -> &str {
		&self.kind
	}
}

impl fmt::Display for Date {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Date({}, {})", self.lookup, self.kind)
	}
}

impl Expression for Date {
	fn name(&self) -> &str {
		"Date"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let col = self.col.as_ref().ok_or_else(|| unresolved(self))?;
		let sql = compile_column(compiler, col)?;
		Ok((compiler.ops().date_trunc_sql(&self.kind, &sql)?, Vec::new()))
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.col.iter().cloned().collect()
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let mut copy = self.clone();
		copy.col = exprs.into_iter().next();
		Ok(Expr::new(copy))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::DateField)
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let col = query.resolve_ref(
			&self.lookup,
			options.allow_joins,
			options.reuse.as_ref(),
			options.summarize,
		)?;
		let field = col.output_field()?;
		if !field.is_instance_of(&FieldType::DateField) {
			return Err(ExpressionError::type_error(format!(
				"'{}' isn't a DateField.",
				self.lookup
			)));
		}
		if query.use_tz() && field.is_instance_of(&FieldType::DateTimeField) {
			return Err(ExpressionError::type_error(format!(
				"'{}' is a DateTimeField, not a DateField.",
				self.lookup
			)));
		}
		Ok(Expr::new(Self {
			col: Some(col),
			..self.clone()
		}))
	}

	fn convert_value(&self, value: QueryValue) -> Result<QueryValue> {
		Ok(match value {
			QueryValue::DateTime(dt) => QueryValue::Date(dt.date()),
			QueryValue::DateTimeUtc(dt) => QueryValue::Date(dt.date_naive()),
			other => other,
		})
	}
}

/// `field` truncated to a datetime unit, in the current or given time zone
/// when time zone support is on.
#[derive(Debug, Clone)]
pub struct DateTime {
	lookup: String,
	kind: String,
	tzinfo: Option<Tz>,
	col: Option<Expr>,
	// Captured at resolve time under time zone support.
	tz: Option<Tz>,
}

impl DateTime {
	/// `kind` is one of `year`, `month`, `week`, `day`, `hour`, `minute` or
	/// `second`.
	pub fn new(lookup: impl Into<String>, kind: impl Into<String>, tzinfo: Option<Tz>) -> Result<Self> {
		let kind = kind.into();
		check_kind(&kind, DATETIME_KINDS)?;
		Ok(Self {
			lookup: lookup.into(),
			kind,
			tzinfo,
			col: None,
			tz: None,
		})
	}

	pub fn kind(&self) -> &str {
		&self.kind
	}

	fn make_aware(&self, tz: Tz, naive: NaiveDateTime) -> Result<QueryValue> {
		tz.from_local_datetime(&naive)
			.single()
			.map(|aware| QueryValue::DateTimeUtc(aware.with_timezone(&Utc)))
			.ok_or_else(|| {
				ExpressionError::value(format!("{} is ambiguous or does not exist in {}", naive, tz.name()))
			})
	}
}

impl fmt::Display for DateTime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DateTime({}, {})", self.lookup, self.kind)
	}
}

impl Expression for DateTime {
	fn name(&self) -> &str {
		"DateTime"
	}

	fn as_sql(&self, compiler: &SqlCompiler<'_>) -> Result<SqlFragment> {
		let col = self.col.as_ref().ok_or_else(|| unresolved(self))?;
		let sql = compile_column(compiler, col)?;
		let tzname = self.tz.map(|tz| tz.name());
		Ok(compiler.ops().datetime_trunc_sql(&self.kind, &sql, tzname)?)
	}

	fn source_expressions(&self) -> Vec<Expr> {
		self.col.iter().cloned().collect()
	}

	fn with_source_expressions(&self, exprs: Vec<Expr>) -> Result<Expr> {
		let mut copy = self.clone();
		copy.col = exprs.into_iter().next();
		Ok(Expr::new(copy))
	}

	fn declared_output_field(&self) -> Option<FieldType> {
		Some(FieldType::DateTimeField)
	}

	fn resolve_expression(&self, query: &mut dyn QueryContext, options: &ResolveOptions) -> Result<Expr> {
		let col = query.resolve_ref(
			&self.lookup,
			options.allow_joins,
			options.reuse.as_ref(),
			options.summarize,
		)?;
		if !col.output_field()?.is_instance_of(&FieldType::DateTimeField) {
			return Err(ExpressionError::type_error(format!(
				"'{}' isn't a DateTimeField.",
				self.lookup
			)));
		}
		let tz = query
			.use_tz()
			.then(|| self.tzinfo.unwrap_or_else(|| query.time_zone()));
		Ok(Expr::new(Self {
			col: Some(col),
			tz,
			..self.clone()
		}))
	}

	fn convert_value(&self, value: QueryValue) -> Result<QueryValue> {
		let Some(tz) = self.tz else {
			return Ok(value);
		};
		match value {
			QueryValue::Null => Err(ExpressionError::value(
				"Database returned an invalid value in QuerySet.datetimes(). \
				 Are time zone definitions for your database installed?",
			)),
			QueryValue::DateTime(naive) => self.make_aware(tz, naive),
			QueryValue::DateTimeUtc(dt) => self.make_aware(tz, dt.naive_utc()),
			other => Ok(other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::combinable::IntoExpr;
	use crate::query::{Model, Query};
	use chrono::NaiveDate;
	use rstest::rstest;
	use sqlweave_backends::{DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations};

	fn query(use_tz: bool) -> Query {
		Query::new(
			Model::new("event")
				.field("day", FieldType::DateField)
				.field("starts", FieldType::DateTimeField)
				.field("title", FieldType::TextField),
		)
		.with_use_tz(use_tz)
	}

	fn compile(ops: &dyn DatabaseOperations, query: &mut Query, node: impl IntoExpr) -> Result<SqlFragment> {
		let resolved = node.into_expr().resolve(query)?;
		SqlCompiler::new(ops).with_query(query).compile(&resolved)
	}

	#[rstest]
	fn test_date_trunc() {
		let mut query = query(false);
		let (sql, params) = compile(&PostgresOperations::new(), &mut query, Date::new("day", "month").unwrap()).unwrap();
		assert_eq!(sql, "DATE_TRUNC('month', \"event\".\"day\")");
		assert!(params.is_empty());

		let (sql, _) = compile(&SqliteOperations::new(), &mut query, Date::new("day", "year").unwrap()).unwrap();
		assert_eq!(sql, "sqlweave_date_trunc('year', \"event\".\"day\")");
	}

	#[rstest]
	fn test_date_accepts_datetime_without_tz_support() {
		let mut query = query(false);
		assert!(compile(&PostgresOperations::new(), &mut query, Date::new("starts", "day").unwrap()).is_ok());

		let mut query = self::query(true);
		let err = compile(&PostgresOperations::new(), &mut query, Date::new("starts", "day").unwrap()).unwrap_err();
		assert_eq!(err.to_string(), "'starts' is a DateTimeField, not a DateField.");
	}

	#[rstest]
	fn test_type_checks() {
		let mut query = query(false);
		let err = compile(&PostgresOperations::new(), &mut query, Date::new("title", "day").unwrap()).unwrap_err();
		assert_eq!(err.to_string(), "'title' isn't a DateField.");
		let err = compile(&PostgresOperations::new(), &mut query, DateTime::new("day", "hour", None).unwrap())
			.unwrap_err();
		assert_eq!(err.to_string(), "'day' isn't a DateTimeField.");
	}

	#[rstest]
	fn test_kind_is_validated() {
		let err = Date::new("day", "hour").unwrap_err();
		assert_eq!(
			err.to_string(),
			"'kind' must be one of 'year', 'month', 'week', or 'day'."
		);
		assert!(DateTime::new("starts", "second", None).is_ok());
	}

	#[rstest]
	fn test_datetime_trunc_uses_time_zone_only_with_tz_support() {
		let mut naive = query(false);
		let (sql, params) = compile(&PostgresOperations::new(), &mut naive, DateTime::new("starts", "hour", None).unwrap()).unwrap();
		assert_eq!(sql, "DATE_TRUNC('hour', \"event\".\"starts\")");
		assert!(params.is_empty());

		let mut aware = query(true);
		let node = DateTime::new("starts", "hour", Some(chrono_tz::Europe::Paris)).unwrap();
		let (sql, params) = compile(&PostgresOperations::new(), &mut aware, node).unwrap();
		assert_eq!(sql, "DATE_TRUNC('hour', \"event\".\"starts\" AT TIME ZONE %s)");
		assert_eq!(params, vec![QueryValue::from("Europe/Paris")]);

		let (sql, params) = compile(&MySqlOperations::default(), &mut aware, DateTime::new("starts", "day", None).unwrap()).unwrap();
		assert!(sql.contains("CONVERT_TZ(`event`.`starts`, 'UTC', %s)"));
		assert_eq!(params, vec![QueryValue::from("UTC")]);
	}

	#[rstest]
	fn test_date_convert_value() {
		let node = Date::new("starts", "day").unwrap();
		let dt = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
		assert_eq!(
			node.convert_value(QueryValue::DateTime(dt)).unwrap(),
			QueryValue::Date(dt.date())
		);
	}

	#[rstest]
	fn test_datetime_convert_value_under_tz() {
		let mut query = query(true);
		let node = DateTime::new("starts", "day", Some(chrono_tz::Europe::Paris))
			.unwrap()
			.into_expr()
			.resolve(&mut query)
			.unwrap();
		let local = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
		let expected = Utc.with_ymd_and_hms(2024, 1, 14, 23, 0, 0).unwrap();
		assert_eq!(
			node.convert_value(QueryValue::DateTime(local)).unwrap(),
			QueryValue::DateTimeUtc(expected)
		);
		assert!(node.convert_value(QueryValue::Null).is_err());

		let naive = DateTime::new("starts", "day", None).unwrap();
		assert_eq!(naive.convert_value(QueryValue::Null).unwrap(), QueryValue::Null);
	}

	#[rstest]
	#[case::nonexistent(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(2, 30, 0).unwrap())]
	#[case::ambiguous(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap().and_hms_opt(2, 30, 0).unwrap())]
	fn test_datetime_convert_value_rejects_unclear_local_time(#[case] local: NaiveDateTime) {
		let mut query = query(true);
		let node = DateTime::new("starts", "minute", Some(chrono_tz::Europe::Paris))
			.unwrap()
			.into_expr()
			.resolve(&mut query)
			.unwrap();

		let err = node.convert_value(QueryValue::DateTime(local)).unwrap_err();
		assert!(matches!(err, ExpressionError::ValueError(_)));
		assert_eq!(
			err.to_string(),
			format!("{} is ambiguous or does not exist in Europe/Paris", local)
		);
	}
}
