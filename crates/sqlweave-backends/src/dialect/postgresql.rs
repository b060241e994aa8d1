//! PostgreSQL dialect implementation

use crate::error::Result;
use crate::features::{DatabaseFeatures, Vendor};
use crate::operations::{DatabaseOperations, SqlFragment, wrap_fragments};
use sqlweave_core::{FieldType, QueryValue};

/// PostgreSQL operations
#[derive(Debug, Clone)]
pub struct PostgresOperations {
	features: DatabaseFeatures,
}

impl PostgresOperations {
	pub fn new() -> Self {
		Self {
			features: DatabaseFeatures::postgresql(),
		}
	}
}

impl Default for PostgresOperations {
	fn default() -> Self {
		Self::new()
	}
}

impl DatabaseOperations for PostgresOperations {
	fn vendor(&self) -> Vendor {
		Vendor::Postgresql
	}

	fn features(&self) -> &DatabaseFeatures {
		&self.features
	}

	fn subtract_temporals(
		&self,
		internal_type: &str,
		lhs: SqlFragment,
		rhs: SqlFragment,
	) -> Result<SqlFragment> {
		if internal_type == "DateField" {
			return Ok(wrap_fragments("age({}, {})", lhs, rhs));
		}
		Ok(wrap_fragments("({} - {})", lhs, rhs))
	}

	fn unification_cast_sql(&self, output_field: &FieldType) -> String {
		match output_field {
			FieldType::GenericIpAddressField | FieldType::TimeField | FieldType::UuidField => {
				match self.db_type(output_field) {
					Some(db_type) => format!("CAST(%s AS {})", db_type),
					None => "%s".to_string(),
				}
			}
			_ => "%s".to_string(),
		}
	}

	fn date_trunc_sql(&self, kind: &str, sql: &str) -> Result<String> {
		Ok(format!("DATE_TRUNC('{}', {})", kind, sql))
	}

	fn datetime_trunc_sql(&self, kind: &str, sql: &str, tzname: Option<&str>) -> Result<SqlFragment> {
		match tzname {
			Some(tz) => Ok((
				format!("DATE_TRUNC('{}', {} AT TIME ZONE %s)", kind, sql),
				vec![QueryValue::from(tz)],
			)),
			None => Ok((format!("DATE_TRUNC('{}', {})", kind, sql), Vec::new())),
		}
	}

	fn db_type(&self, field: &FieldType) -> Option<String> {
		let db_type = match field {
			FieldType::Field => return None,
			FieldType::AutoField => "serial".to_string(),
			FieldType::BigAutoField => "bigserial".to_string(),
			FieldType::BinaryField => "bytea".to_string(),
			FieldType::BooleanField => "boolean".to_string(),
			FieldType::CharField { max_length } => format!("varchar({})", max_length),
			FieldType::DateField => "date".to_string(),
			FieldType::DateTimeField => "timestamp with time zone".to_string(),
			FieldType::DecimalField {
				max_digits,
				decimal_places,
			} => format!("numeric({}, {})", max_digits, decimal_places),
			FieldType::DurationField => "interval".to_string(),
			FieldType::FloatField => "double precision".to_string(),
			FieldType::IntegerField | FieldType::PositiveIntegerField => "integer".to_string(),
			FieldType::BigIntegerField => "bigint".to_string(),
			FieldType::SmallIntegerField | FieldType::PositiveSmallIntegerField => {
				"smallint".to_string()
			}
			FieldType::GenericIpAddressField => "inet".to_string(),
			FieldType::TextField => "text".to_string(),
			FieldType::TimeField => "time".to_string(),
			FieldType::UuidField => "uuid".to_string(),
			FieldType::JsonField => "jsonb".to_string(),
			FieldType::Custom { db_type, .. } => db_type.clone(),
		};
		Some(db_type)
	}

	fn cast_db_type(&self, field: &FieldType) -> Option<String> {
		match field {
			FieldType::AutoField => Some("integer".to_string()),
			FieldType::BigAutoField => Some("bigint".to_string()),
			other => self.db_type(other),
		}
	}

	// The driver binds chrono and decimal values natively.
	fn adapt_datefield_value(&self, value: QueryValue) -> QueryValue {
		value
	}

	fn adapt_datetimefield_value(&self, value: QueryValue) -> QueryValue {
		value
	}

	fn adapt_timefield_value(&self, value: QueryValue) -> QueryValue {
		value
	}

	fn adapt_decimalfield_value(&self, value: QueryValue, _decimal_places: u32) -> QueryValue {
		value
	}

	fn lookup_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"exact" => "= %s",
			"iexact" => "= UPPER(%s)",
			"contains" => "LIKE %s",
			"icontains" => "LIKE UPPER(%s)",
			"regex" => "~ %s",
			"iregex" => "~* %s",
			"gt" => "> %s",
			"gte" => ">= %s",
			"lt" => "< %s",
			"lte" => "<= %s",
			"startswith" => "LIKE %s",
			"endswith" => "LIKE %s",
			"istartswith" => "LIKE UPPER(%s)",
			"iendswith" => "LIKE UPPER(%s)",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"contains" => "LIKE '%%' || {} || '%%'",
			"icontains" => "LIKE '%%' || UPPER({}) || '%%'",
			"startswith" => "LIKE {} || '%%'",
			"istartswith" => "LIKE UPPER({}) || '%%'",
			"endswith" => "LIKE '%%' || {}",
			"iendswith" => "LIKE '%%' || UPPER({})",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_escape(&self) -> &'static str {
		r"REPLACE(REPLACE(REPLACE({}, E'\\', E'\\\\'), E'%%', E'\\%%'), E'_', E'\\_')"
	}

	fn prep_for_iexact_query(&self, value: &str) -> String {
		value.to_string()
	}

	fn lookup_cast(&self, lookup: &str, internal_type: &str) -> String {
		let mut cast = "%s".to_string();
		if matches!(
			lookup,
			"iexact"
				| "contains" | "icontains"
				| "startswith" | "istartswith"
				| "endswith" | "iendswith"
				| "regex" | "iregex"
		) {
			cast = if internal_type == "GenericIPAddressField" {
				"HOST(%s)".to_string()
			} else {
				"%s::text".to_string()
			};
		}
		if matches!(lookup, "iexact" | "icontains" | "istartswith" | "iendswith") {
			cast = format!("UPPER({})", cast);
		}
		cast
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_quote_name() {
		let ops = PostgresOperations::new();
		assert_eq!(ops.quote_name("author"), "\"author\"");
		assert_eq!(ops.quote_name("\"author\""), "\"author\"");
	}

	#[rstest]
	fn test_date_subtraction_uses_age() {
		let ops = PostgresOperations::new();
		let (sql, params) = ops
			.subtract_temporals(
				"DateField",
				("\"a\".\"start\"".into(), vec![]),
				("%s".into(), vec![QueryValue::Int(1)]),
			)
			.unwrap();
		assert_eq!(sql, "age(\"a\".\"start\", %s)");
		assert_eq!(params, vec![QueryValue::Int(1)]);
	}

	#[rstest]
	fn test_datetime_subtraction_is_plain_minus() {
		let ops = PostgresOperations::new();
		let (sql, _) = ops
			.subtract_temporals("DateTimeField", ("a".into(), vec![]), ("b".into(), vec![]))
			.unwrap();
		assert_eq!(sql, "(a - b)");
	}

	#[rstest]
	#[case(FieldType::TimeField, "CAST(%s AS time)")]
	#[case(FieldType::UuidField, "CAST(%s AS uuid)")]
	#[case(FieldType::GenericIpAddressField, "CAST(%s AS inet)")]
	#[case(FieldType::IntegerField, "%s")]
	fn test_unification_cast(#[case] field: FieldType, #[case] expected: &str) {
		assert_eq!(PostgresOperations::new().unification_cast_sql(&field), expected);
	}

	#[rstest]
	fn test_datetime_trunc_with_zone() {
		let ops = PostgresOperations::new();
		let (sql, params) = ops
			.datetime_trunc_sql("month", "\"e\".\"at\"", Some("Europe/Paris"))
			.unwrap();
		assert_eq!(sql, "DATE_TRUNC('month', \"e\".\"at\" AT TIME ZONE %s)");
		assert_eq!(params, vec![QueryValue::from("Europe/Paris")]);
	}

	#[rstest]
	#[case("icontains", "CharField", "UPPER(%s::text)")]
	#[case("contains", "GenericIPAddressField", "HOST(%s)")]
	#[case("exact", "CharField", "%s")]
	fn test_lookup_cast(#[case] lookup: &str, #[case] internal_type: &str, #[case] expected: &str) {
		assert_eq!(PostgresOperations::new().lookup_cast(lookup, internal_type), expected);
	}

	#[rstest]
	fn test_cast_types_for_auto_fields() {
		let ops = PostgresOperations::new();
		assert_eq!(ops.cast_db_type(&FieldType::AutoField).as_deref(), Some("integer"));
		assert_eq!(ops.db_type(&FieldType::AutoField).as_deref(), Some("serial"));
	}
}
