//! MySQL dialect implementation

use crate::dialect::DATETIME_TRUNC_KINDS;
use crate::error::Result;
use crate::features::{DatabaseFeatures, Vendor};
use crate::operations::{DatabaseOperations, SqlFragment, wrap_fragments};
use chrono::TimeDelta;
use sqlweave_core::value::duration_components;
use sqlweave_core::{Connector, FieldType, QueryValue};

const DATETIME_FORMAT: [&str; 6] = ["%%Y-", "%%m", "-%%d", " %%H:", "%%i", ":%%s"];
const DATETIME_FORMAT_DEFAULTS: [&str; 6] = ["0000-", "01", "-01", " 00:", "00", ":00"];

/// MySQL operations
#[derive(Debug, Clone)]
pub struct MySqlOperations {
	features: DatabaseFeatures,
}

impl MySqlOperations {
	/// `microsecond_precision` is false for servers storing datetimes
	/// without fractional seconds.
	pub fn new(microsecond_precision: bool) -> Self {
		Self {
			features: DatabaseFeatures::mysql(microsecond_precision),
		}
	}
}

impl Default for MySqlOperations {
	fn default() -> Self {
		Self::new(true)
	}
}

impl DatabaseOperations for MySqlOperations {
	fn vendor(&self) -> Vendor {
		Vendor::Mysql
	}

	fn features(&self) -> &DatabaseFeatures {
		&self.features
	}

	fn quote_name(&self, name: &str) -> String {
		if name.len() >= 2 && name.starts_with('`') && name.ends_with('`') {
			return name.to_string();
		}
		format!("`{}`", name)
	}

	fn combine_expression(&self, connector: Connector, sub_expressions: &[String]) -> Result<String> {
		match connector {
			Connector::Pow => Ok(format!("POW({})", sub_expressions.join(","))),
			Connector::BitAnd | Connector::BitOr => Ok(format!(
				"CONVERT({}, SIGNED)",
				sub_expressions.join(&format!(" {} ", connector))
			)),
			_ => Ok(sub_expressions.join(&format!(" {} ", connector))),
		}
	}

	fn format_for_duration_arithmetic(&self, sql: &str) -> Result<String> {
		if self.features.supports_microsecond_precision {
			Ok(format!("INTERVAL {} MICROSECOND", sql))
		} else {
			Ok(format!("INTERVAL FLOOR({} / 1000000) SECOND", sql))
		}
	}

	fn date_interval_sql(&self, delta: &TimeDelta) -> Result<SqlFragment> {
		let (days, seconds, micros) = duration_components(delta);
		Ok((
			format!("INTERVAL '{} 0:0:{}:{}' DAY_MICROSECOND", days, seconds, micros),
			Vec::new(),
		))
	}

	fn subtract_temporals(
		&self,
		internal_type: &str,
		lhs: SqlFragment,
		rhs: SqlFragment,
	) -> Result<SqlFragment> {
		if internal_type == "TimeField" {
			let (lhs_sql, lhs_params) = lhs;
			let (rhs_sql, rhs_params) = rhs;
			let sql = format!(
				"((TIME_TO_SEC({lhs}) * 1000000 + MICROSECOND({lhs})) - \
				 (TIME_TO_SEC({rhs}) * 1000000 + MICROSECOND({rhs})))",
				lhs = lhs_sql,
				rhs = rhs_sql
			);
			let mut params = Vec::with_capacity(2 * (lhs_params.len() + rhs_params.len()));
			params.extend(lhs_params.iter().cloned());
			params.extend(lhs_params);
			params.extend(rhs_params.iter().cloned());
			params.extend(rhs_params);
			return Ok((sql, params));
		}
		Ok(wrap_fragments("TIMESTAMPDIFF(MICROSECOND, {}, {})", rhs, lhs))
	}

	fn random_function_sql(&self) -> &'static str {
		"RAND()"
	}

	fn date_trunc_sql(&self, kind: &str, sql: &str) -> Result<String> {
		let format = match kind {
			"year" => "%%Y-01-01",
			"month" => "%%Y-%%m-01",
			_ => return Ok(format!("DATE({})", sql)),
		};
		Ok(format!("CAST(DATE_FORMAT({}, '{}') AS DATE)", sql, format))
	}

	fn datetime_trunc_sql(&self, kind: &str, sql: &str, tzname: Option<&str>) -> Result<SqlFragment> {
		let (field, params) = match tzname {
			Some(tz) => (
				format!("CONVERT_TZ({}, 'UTC', %s)", sql),
				vec![QueryValue::from(tz)],
			),
			None => (sql.to_string(), Vec::new()),
		};
		let Some(position) = DATETIME_TRUNC_KINDS.iter().position(|k| *k == kind) else {
			return Ok((field, params));
		};
		let cut = position + 1;
		let format: String = DATETIME_FORMAT[..cut]
			.iter()
			.chain(DATETIME_FORMAT_DEFAULTS[cut..].iter())
			.copied()
			.collect();
		Ok((
			format!("CAST(DATE_FORMAT({}, '{}') AS DATETIME)", field, format),
			params,
		))
	}

	fn db_type(&self, field: &FieldType) -> Option<String> {
		let precise = self.features.supports_microsecond_precision;
		let db_type = match field {
			FieldType::Field => return None,
			FieldType::AutoField => "integer AUTO_INCREMENT".to_string(),
			FieldType::BigAutoField => "bigint AUTO_INCREMENT".to_string(),
			FieldType::BinaryField => "longblob".to_string(),
			FieldType::BooleanField => "bool".to_string(),
			FieldType::CharField { max_length } => format!("varchar({})", max_length),
			FieldType::DateField => "date".to_string(),
			FieldType::DateTimeField if precise => "datetime(6)".to_string(),
			FieldType::DateTimeField => "datetime".to_string(),
			FieldType::DecimalField {
				max_digits,
				decimal_places,
			} => format!("numeric({}, {})", max_digits, decimal_places),
			FieldType::DurationField => "bigint".to_string(),
			FieldType::FloatField => "double precision".to_string(),
			FieldType::IntegerField => "integer".to_string(),
			FieldType::BigIntegerField => "bigint".to_string(),
			FieldType::SmallIntegerField => "smallint".to_string(),
			FieldType::PositiveIntegerField => "integer UNSIGNED".to_string(),
			FieldType::PositiveSmallIntegerField => "smallint UNSIGNED".to_string(),
			FieldType::GenericIpAddressField => "char(39)".to_string(),
			FieldType::TextField => "longtext".to_string(),
			FieldType::TimeField if precise => "time(6)".to_string(),
			FieldType::TimeField => "time".to_string(),
			FieldType::UuidField => "char(32)".to_string(),
			FieldType::JsonField => "json".to_string(),
			FieldType::Custom { db_type, .. } => db_type.clone(),
		};
		Some(db_type)
	}

	fn cast_db_type(&self, field: &FieldType) -> Option<String> {
		let cast = match field {
			FieldType::AutoField
			| FieldType::BigAutoField
			| FieldType::IntegerField
			| FieldType::BigIntegerField
			| FieldType::SmallIntegerField
			| FieldType::BooleanField => "signed integer".to_string(),
			FieldType::PositiveIntegerField | FieldType::PositiveSmallIntegerField => {
				"unsigned integer".to_string()
			}
			FieldType::CharField { max_length } => format!("char({})", max_length),
			FieldType::TextField => "char".to_string(),
			FieldType::FloatField => "double".to_string(),
			FieldType::DecimalField {
				max_digits,
				decimal_places,
			} => format!("decimal({}, {})", max_digits, decimal_places),
			other => return self.db_type(other),
		};
		Some(cast)
	}

	fn lookup_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"exact" => "= %s",
			"iexact" => "LIKE %s",
			"contains" => "LIKE BINARY %s",
			"icontains" => "LIKE %s",
			"regex" => "REGEXP BINARY %s",
			"iregex" => "REGEXP %s",
			"gt" => "> %s",
			"gte" => ">= %s",
			"lt" => "< %s",
			"lte" => "<= %s",
			"startswith" => "LIKE BINARY %s",
			"endswith" => "LIKE BINARY %s",
			"istartswith" => "LIKE %s",
			"iendswith" => "LIKE %s",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_operator(&self, lookup: &str) -> Option<&'static str> {
		let op = match lookup {
			"contains" => "LIKE BINARY CONCAT('%%', {}, '%%')",
			"icontains" => "LIKE CONCAT('%%', {}, '%%')",
			"startswith" => "LIKE BINARY CONCAT({}, '%%')",
			"istartswith" => "LIKE CONCAT({}, '%%')",
			"endswith" => "LIKE BINARY CONCAT('%%', {})",
			"iendswith" => "LIKE CONCAT('%%', {})",
			_ => return None,
		};
		Some(op)
	}

	fn pattern_escape(&self) -> &'static str {
		r"REPLACE(REPLACE(REPLACE({}, '\\', '\\\\'), '%%', '\%%'), '_', '\_')"
	}
}
