//! Per-vendor SQL rendering hooks
//!
//! [`DatabaseOperations`] collects every decision an expression delegates to
//! the backend: quoting, operator spelling, duration and temporal arithmetic,
//! date truncation, data types, value adaptation and lookup operators. The
//! provided methods implement the generic SQL behaviour; each dialect
//! overrides what its engine does differently.

use crate::error::{BackendError, Result};
use crate::features::{DatabaseFeatures, Vendor};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use rust_decimal::Decimal;
use sqlweave_core::value::duration_microseconds;
use sqlweave_core::{Connector, FieldType, QueryValue};
use std::fmt;

/// A rendered SQL fragment with its parameters.
pub type SqlFragment = (String, Vec<QueryValue>);

/// What an expression node tells the backend when asking whether it can be
/// rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportCheck<'a> {
	/// Node name, e.g. `Sum` or `DurationExpression`.
	pub node: &'a str,
	/// Output types of the node's sources (`None` when unknown).
	pub source_fields: Vec<Option<FieldType>>,
}

impl<'a> SupportCheck<'a> {
	pub fn new(node: &'a str) -> Self {
		Self {
			node,
			source_fields: Vec::new(),
		}
	}

	pub fn with_source_fields(mut self, fields: Vec<Option<FieldType>>) -> Self {
		self.source_fields = fields;
		self
	}
}

/// Vendor-specific rendering operations.
pub trait DatabaseOperations: Send + Sync + fmt::Debug {
	fn vendor(&self) -> Vendor;

	fn features(&self) -> &DatabaseFeatures;

	/// Quote a table or column name; already quoted names pass through.
	fn quote_name(&self, name: &str) -> String {
		if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
			return name.to_string();
		}
		format!("\"{}\"", name)
	}

	/// Join operand fragments with an arithmetic or bitwise connector.
	fn combine_expression(&self, connector: Connector, sub_expressions: &[String]) -> Result<String> {
		Ok(sub_expressions.join(&format!(" {} ", connector)))
	}

	/// Join operands of which at least one is a duration.
	fn combine_duration_expression(
		&self,
		connector: Connector,
		sub_expressions: &[String],
	) -> Result<String> {
		self.combine_expression(connector, sub_expressions)
	}

	/// Turn a duration operand (stored as microseconds) into something the
	/// engine can add to a date.
	fn format_for_duration_arithmetic(&self, _sql: &str) -> Result<String> {
		Err(BackendError::NotSupported(
			"This backend does not implement duration arithmetic.".to_string(),
		))
	}

	/// Render a literal duration on engines without a native interval type.
	fn date_interval_sql(&self, _delta: &TimeDelta) -> Result<SqlFragment> {
		Err(BackendError::NotSupported(
			"This backend does not support interval literals.".to_string(),
		))
	}

	/// Render `lhs - rhs` for two temporal operands of `internal_type`.
	fn subtract_temporals(
		&self,
		internal_type: &str,
		lhs: SqlFragment,
		rhs: SqlFragment,
	) -> Result<SqlFragment> {
		if !self.features().supports_temporal_subtraction {
			return Err(BackendError::NotSupported(format!(
				"This backend does not support {} subtraction.",
				internal_type
			)));
		}
		Ok(wrap_fragments("({} - {})", lhs, rhs))
	}

	fn random_function_sql(&self) -> &'static str {
		"RANDOM()"
	}

	/// Template (with one `%s` slot) that unifies the branches of a `CASE`.
	fn unification_cast_sql(&self, _output_field: &FieldType) -> String {
		"%s".to_string()
	}

	/// Reject expressions the engine cannot evaluate.
	fn check_expression_support(&self, _check: &SupportCheck<'_>) -> Result<()> {
		Ok(())
	}

	/// Truncate a date column to `kind` (`year`, `month`, `day`).
	fn date_trunc_sql(&self, kind: &str, sql: &str) -> Result<String>;

	/// Truncate a datetime column to `kind`, converting to `tzname` first when
	/// given.
	fn datetime_trunc_sql(&self, kind: &str, sql: &str, tzname: Option<&str>) -> Result<SqlFragment>;

	/// Column type for a field, `None` for fields without storage.
	fn db_type(&self, field: &FieldType) -> Option<String>;

	/// Type used in `CAST(... AS type)`.
	fn cast_db_type(&self, field: &FieldType) -> Option<String> {
		self.db_type(field)
	}

	fn adapt_datefield_value(&self, value: QueryValue) -> QueryValue {
		match value {
			QueryValue::Date(d) => QueryValue::String(d.format("%Y-%m-%d").to_string()),
			QueryValue::DateTime(dt) => QueryValue::String(dt.date().format("%Y-%m-%d").to_string()),
			other => other,
		}
	}

	fn adapt_datetimefield_value(&self, value: QueryValue) -> QueryValue {
		let keep_micros = self.features().supports_microsecond_precision;
		match value {
			QueryValue::DateTime(dt) => QueryValue::String(datetime_string(&dt, keep_micros)),
			QueryValue::DateTimeUtc(dt) => {
				QueryValue::String(datetime_string(&dt.naive_utc(), keep_micros))
			}
			other => other,
		}
	}

	fn adapt_timefield_value(&self, value: QueryValue) -> QueryValue {
		match value {
			QueryValue::Time(t) => QueryValue::String(time_string(&t)),
			other => other,
		}
	}

	fn adapt_decimalfield_value(&self, value: QueryValue, decimal_places: u32) -> QueryValue {
		match value {
			QueryValue::Decimal(d) => QueryValue::String(format_decimal(d, decimal_places)),
			other => other,
		}
	}

	/// Prepare a parameter for a column of type `field`.
	fn adapt_value(&self, field: &FieldType, value: QueryValue) -> QueryValue {
		if value.is_null() {
			return value;
		}
		match field {
			FieldType::DateField => self.adapt_datefield_value(value),
			FieldType::DateTimeField => self.adapt_datetimefield_value(value),
			FieldType::TimeField => self.adapt_timefield_value(value),
			FieldType::DecimalField { decimal_places, .. } => {
				self.adapt_decimalfield_value(value, *decimal_places)
			}
			FieldType::DurationField if !self.features().has_native_duration_field => match value {
				QueryValue::Duration(d) => QueryValue::Int(duration_microseconds(&d)),
				other => other,
			},
			_ => value,
		}
	}

	/// Prepare a parameter being written into a column of type `field`.
	///
	/// Decimals are rounded to the column's scale on every backend before the
	/// usual [`adapt_value`](Self::adapt_value) step.
	fn adapt_save_value(&self, field: &FieldType, value: QueryValue) -> QueryValue {
		let value = match (field, value) {
			(FieldType::DecimalField { decimal_places, .. }, QueryValue::Decimal(d)) => {
				let mut rounded = d.round_dp(*decimal_places);
				rounded.rescale(*decimal_places);
				QueryValue::Decimal(rounded)
			}
			(_, other) => other,
		};
		self.adapt_value(field, value)
	}

	/// Right-hand operator of a lookup, e.g. `= %s` for `exact`.
	fn lookup_operator(&self, lookup: &str) -> Option<&'static str>;

	/// Operator template for pattern lookups whose right-hand side is an
	/// expression; `{}` is replaced by the escaped operand.
	fn pattern_operator(&self, lookup: &str) -> Option<&'static str>;

	/// Template escaping `%`, `_` and `\` inside an expression operand.
	fn pattern_escape(&self) -> &'static str;

	/// Wrapper applied to the left-hand side of a lookup.
	fn lookup_cast(&self, _lookup: &str, _internal_type: &str) -> String {
		"%s".to_string()
	}

	/// Escape LIKE wildcards in a literal pattern value.
	fn prep_for_like_query(&self, value: &str) -> String {
		value
			.replace('\\', "\\\\")
			.replace('%', "\\%")
			.replace('_', "\\_")
	}

	/// Prepare the value of an `iexact` lookup.
	fn prep_for_iexact_query(&self, value: &str) -> String {
		self.prep_for_like_query(value)
	}
}

/// Fill the two `{}` slots of `template` with `lhs` and `rhs`, concatenating
/// their parameters in the same order.
pub fn wrap_fragments(template: &str, lhs: SqlFragment, rhs: SqlFragment) -> SqlFragment {
	let (lhs_sql, mut params) = lhs;
	let (rhs_sql, rhs_params) = rhs;
	params.extend(rhs_params);
	let mut slots = template.splitn(3, "{}");
	let mut sql = String::with_capacity(template.len() + lhs_sql.len() + rhs_sql.len());
	sql.push_str(slots.next().unwrap_or_default());
	sql.push_str(&lhs_sql);
	sql.push_str(slots.next().unwrap_or_default());
	sql.push_str(&rhs_sql);
	sql.push_str(slots.next().unwrap_or_default());
	(sql, params)
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`
pub fn datetime_string(dt: &NaiveDateTime, keep_micros: bool) -> String {
	let base = dt.format("%Y-%m-%d %H:%M:%S").to_string();
	let micros = dt.and_utc().timestamp_subsec_micros();
	if keep_micros && micros != 0 {
		format!("{}.{:06}", base, micros)
	} else {
		base
	}
}

/// `HH:MM:SS[.ffffff]`
pub fn time_string(t: &NaiveTime) -> String {
	let micros = t.nanosecond() / 1_000;
	if micros == 0 {
		t.format("%H:%M:%S").to_string()
	} else {
		format!("{}.{:06}", t.format("%H:%M:%S"), micros)
	}
}

/// Quantize a decimal to exactly `decimal_places` digits after the point.
pub fn format_decimal(value: Decimal, decimal_places: u32) -> String {
	let mut rounded = value.round_dp(decimal_places);
	rounded.rescale(decimal_places);
	rounded.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use rstest::rstest;
	use std::str::FromStr;

	#[rstest]
	#[case("1.5", 2, "1.50")]
	#[case("3.14159", 2, "3.14")]
	#[case("2.7", 0, "3")]
	fn test_format_decimal(#[case] value: &str, #[case] places: u32, #[case] expected: &str) {
		let value = Decimal::from_str(value).unwrap();
		assert_eq!(format_decimal(value, places), expected);
	}

	#[rstest]
	fn test_wrap_fragments_keeps_param_order() {
		let (sql, params) = wrap_fragments(
			"f({}, {})",
			("{}".into(), vec![QueryValue::Int(1)]),
			("%s".into(), vec![QueryValue::Int(2)]),
		);
		assert_eq!(sql, "f({}, %s)");
		assert_eq!(params, vec![QueryValue::Int(1), QueryValue::Int(2)]);
	}

	#[rstest]
	fn test_datetime_string() {
		let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
			.unwrap()
			.and_hms_micro_opt(8, 5, 1, 250)
			.unwrap();
		assert_eq!(datetime_string(&dt, true), "2024-03-09 08:05:01.000250");
		assert_eq!(datetime_string(&dt, false), "2024-03-09 08:05:01");
	}
}
