//! SQLite dialect implementation
//!
//! SQLite stores dates as text, so temporal arithmetic and truncation go
//! through user-defined functions the connection is expected to register:
//! `sqlweave_format_dtdelta`, `sqlweave_time_diff`, `sqlweave_timestamp_diff`,
//! `sqlweave_date_trunc` and `sqlweave_datetime_trunc`.

use crate::error::{BackendError, Result};
use crate::features::{DatabaseFeatures, Vendor};
use crate::operations::{DatabaseOperations, SqlFragment, SupportCheck, wrap_fragments};
use chrono::TimeDelta;
use sqlweave_core::value::duration_string;
use sqlweave_core::{Connector, FieldType, QueryValue};

const TEXT_STORED_AGGREGATES: &[&str] = &["Sum", "Avg", "StdDev", "Variance"];

/// SQLite operations
#[derive(Debug, Clone)]
pub struct SqliteOperations {
	features: DatabaseFeatures,
}

impl SqliteOperations {
	pub fn new() -> Self {
		Self {
			features: DatabaseFeatures::sqlite(),
		}
	}
}

impl Default for SqliteOperations {
	fn default() -> Self {
		Self::new()
	}
}

impl DatabaseOperations for SqliteOperations {
	fn vendor(&self) -> Vendor {
		Vendor::Sqlite
	}

	fn features(&self) -> &DatabaseFeatures {
		&self.features
	}

	fn combine_expression(&self, connector: Connector, sub_expressions: &[String]) -> Result<String> {
		if connector == Connector::Pow {
			return Ok(format!("POWER({})", sub_expressions.join(",")));
		}
		Ok(sub_expressions.join(&format!(" {} ", connector)))
	}

	fn combine_duration_expression(
		&self,
		connector: Connector,
		sub_expressions: &[String],
	) -> Result<String> {
		if !matches!(connector, Connector::Add | Connector::Sub) {
			return Err(BackendError::InvalidConnector(connector.to_string()));
		}
		if sub_expressions.len() > 2 {
			return Err(BackendError::TooManyOperands);
		}
		let mut args = vec![format!("'{}'", connector)];
		args.extend(sub_expressions.iter().cloned());
		Ok(format!("sqlweave_format_dtdelta({})", args.join(", ")))
	}

	fn format_for_duration_arithmetic(&self, sql: &str) -> Result<String> {
		Ok(sql.to_string())
	}

	fn date_interval_sql(&self, delta: &TimeDelta) -> Result<SqlFragment> {
		Ok((format!("'{}'", duration_string(delta)), Vec::new()))
	}

	fn subtract_temporals(
		&self,
		internal_type: &str,
		lhs: SqlFragment,
		rhs: SqlFragment,
	) -> Result<SqlFragment> {
		if internal_type == "TimeField" {
			return Ok(wrap_fragments("sqlweave_time_diff({}, {})", lhs, rhs));
		}
		Ok(wrap_fragments("sqlweave_timestamp_diff({}, {})", lhs, rhs))
	}

	fn check_expression_support(&self, check: &SupportCheck<'_>) -> Result<()> {
		if !TEXT_STORED_AGGREGATES.contains(&check.node) {
			return Ok(());
		}
		let over_temporal = check
			.source_fields
			.iter()
			.flatten()
			.any(|field| field.is_instance_of(&FieldType::DateField) || *field == FieldType::TimeField);
		if over_temporal {
			return Err(BackendError::NotSupported(
				"You cannot use Sum, Avg, StdDev, and Variance aggregations on date/time fields \
				 in sqlite3 since date/time is saved as text."
					.to_string(),
			));
		}
		Ok(())
	}

	fn date_trunc_sql(&self, kind: &str, sql: &str) -> Result<String> {
		Ok(format!("sqlweave_date_trunc('{}', {})", kind, sql))
	}

	fn datetime_trunc_sql(&self, kind: &str, sql: &str, tzname: Option<&str>) -> Result<SqlFragment> {
		Ok((
			format!("sqlweave_datetime_trunc('{}', {}, %s)", kind.to_lowercase(), sql),
			vec![QueryValue::from(tzname)],
		))
	}

	fn db_type(&self, field: &FieldType) -> Option<String> {
		let db_type = match field {
			FieldType::Field => return None,
			FieldType::AutoField | FieldType::BigAutoField | FieldType::IntegerField => {
				"integer".to_string()
			}
			FieldType::BinaryField => "BLOB".to_string(),
			FieldType::BooleanField => "bool".to_string(),
			FieldType::CharField { max_length } => format!("varchar({})", max_length),
			FieldType::DateField => "date".to_string(),
			FieldType::DateTimeField => "datetime".to_string(),
			FieldType::DecimalField { .. } => "decimal".to_string(),
			FieldType::DurationField | FieldType::BigIntegerField => "bigint".to_string(),
			FieldType::FloatField => "real".to_string(),
			FieldType::SmallIntegerField => "smallint".to_string(),
			FieldType::PositiveIntegerField => "integer unsigned".to_string(),
			FieldType::PositiveSmallIntegerField => "smallint unsigned".to_string(),
			FieldType::GenericIpAddressField => "char(39)".to_string(),
			FieldType::TextField | FieldType::JsonField => "text".to_string(),
			FieldType::TimeField => "time".to_string(),
			FieldType::UuidField => "char(32)".to_string(),
			FieldType::Custom { db_type, .. } => db_type.clone(),
		};
		Some(db_type)
	}

	fn lookup_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"exact" => "= %s",
			"iexact" => r"LIKE %s ESCAPE '\'",
			"contains" => r"LIKE %s ESCAPE '\'",
			"icontains" => r"LIKE %s ESCAPE '\'",
			"regex" => "REGEXP %s",
			"iregex" => "REGEXP '(?i)' || %s",
			"gt" => "> %s",
			"gte" => ">= %s",
			"lt" => "< %s",
			"lte" => "<= %s",
			"startswith" => r"LIKE %s ESCAPE '\'",
			"endswith" => r"LIKE %s ESCAPE '\'",
			"istartswith" => r"LIKE %s ESCAPE '\'",
			"iendswith" => r"LIKE %s ESCAPE '\'",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"contains" => r"LIKE '%%' || {} || '%%' ESCAPE '\'",
			"icontains" => r"LIKE '%%' || UPPER({}) || '%%' ESCAPE '\'",
			"startswith" => r"LIKE {} || '%%' ESCAPE '\'",
			"istartswith" => r"LIKE UPPER({}) || '%%' ESCAPE '\'",
			"endswith" => r"LIKE '%%' || {} ESCAPE '\'",
			"iendswith" => r"LIKE '%%' || UPPER({}) ESCAPE '\'",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_escape(&self) -> &'static str {
		r"REPLACE(REPLACE(REPLACE({}, '\', '\\'), '%%', '\%%'), '_', '\_')"
	}
}
