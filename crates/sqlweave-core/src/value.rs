//! Parameter values bound to placeholders in compiled SQL.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Query value types
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Decimal(Decimal),
	String(String),
	Bytes(Vec<u8>),
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	DateTimeUtc(DateTime<Utc>),
	Time(NaiveTime),
	Duration(TimeDelta),
	Uuid(Uuid),
	Json(serde_json::Value),
	Array(Vec<QueryValue>),
}

impl QueryValue {
	/// Returns `true` if this value is SQL `NULL`.
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}

	/// Short type name used in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			QueryValue::Null => "null",
			QueryValue::Bool(_) => "bool",
			QueryValue::Int(_) => "int",
			QueryValue::Float(_) => "float",
			QueryValue::Decimal(_) => "decimal",
			QueryValue::String(_) => "string",
			QueryValue::Bytes(_) => "bytes",
			QueryValue::Date(_) => "date",
			QueryValue::DateTime(_) | QueryValue::DateTimeUtc(_) => "datetime",
			QueryValue::Time(_) => "time",
			QueryValue::Duration(_) => "duration",
			QueryValue::Uuid(_) => "uuid",
			QueryValue::Json(_) => "json",
			QueryValue::Array(_) => "array",
		}
	}
}

impl fmt::Display for QueryValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			QueryValue::Null => f.write_str("None"),
			QueryValue::Bool(b) => write!(f, "{}", b),
			QueryValue::Int(i) => write!(f, "{}", i),
			QueryValue::Float(v) => write!(f, "{}", v),
			QueryValue::Decimal(d) => write!(f, "{}", d),
			QueryValue::String(s) => write!(f, "'{}'", s),
			QueryValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
			QueryValue::Date(d) => write!(f, "{}", d),
			QueryValue::DateTime(dt) => write!(f, "{}", dt),
			QueryValue::DateTimeUtc(dt) => write!(f, "{}", dt.to_rfc3339()),
			QueryValue::Time(t) => write!(f, "{}", t),
			QueryValue::Duration(d) => f.write_str(&duration_string(d)),
			QueryValue::Uuid(u) => write!(f, "{}", u),
			QueryValue::Json(j) => write!(f, "{}", j),
			QueryValue::Array(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", item)?;
				}
				f.write_str("]")
			}
		}
	}
}

/// Total number of microseconds in a duration, saturating on overflow.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use sqlweave_core::value::duration_microseconds;
///
/// assert_eq!(duration_microseconds(&TimeDelta::milliseconds(1500)), 1_500_000);
/// assert_eq!(duration_microseconds(&TimeDelta::seconds(-2)), -2_000_000);
/// ```
pub fn duration_microseconds(duration: &TimeDelta) -> i64 {
	duration
		.num_seconds()
		.saturating_mul(MICROS_PER_SECOND)
		.saturating_add(i64::from(duration.subsec_nanos()) / 1_000)
}

/// Normalized `(days, seconds, microseconds)` with `seconds` in `0..86400`
/// and `microseconds` in `0..1_000_000`; only `days` may be negative.
pub fn duration_components(duration: &TimeDelta) -> (i64, i64, i64) {
	let total = duration_microseconds(duration);
	let days = total.div_euclid(MICROS_PER_DAY);
	let rest = total.rem_euclid(MICROS_PER_DAY);
	(days, rest / MICROS_PER_SECOND, rest % MICROS_PER_SECOND)
}

/// Render a duration as `[D ]HH:MM:SS[.ffffff]`.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use sqlweave_core::value::duration_string;
///
/// assert_eq!(duration_string(&TimeDelta::minutes(90)), "01:30:00");
/// assert_eq!(duration_string(&(TimeDelta::days(2) + TimeDelta::microseconds(5))), "2 00:00:00.000005");
/// ```
pub fn duration_string(duration: &TimeDelta) -> String {
	let (days, seconds, micros) = duration_components(duration);
	let hours = seconds / 3600;
	let minutes = (seconds % 3600) / 60;
	let secs = seconds % 60;
	let mut out = format!("{:02}:{:02}:{:02}", hours, minutes, secs);
	if days != 0 {
		out = format!("{} {}", days, out);
	}
	if micros != 0 {
		out.push_str(&format!(".{:06}", micros));
	}
	out
}

macro_rules! impl_from_for_query_value {
	($($ty:ty => $variant:ident),* $(,)?) => {
		$(
			impl From<$ty> for QueryValue {
				fn from(v: $ty) -> Self {
					QueryValue::$variant(v.into())
				}
			}
		)*
	};
}

impl_from_for_query_value! {
	bool => Bool,
	i8 => Int,
	i16 => Int,
	i32 => Int,
	i64 => Int,
	u8 => Int,
	u16 => Int,
	u32 => Int,
	f32 => Float,
	f64 => Float,
	Decimal => Decimal,
	String => String,
	Vec<u8> => Bytes,
	NaiveDate => Date,
	NaiveDateTime => DateTime,
	DateTime<Utc> => DateTimeUtc,
	NaiveTime => Time,
	TimeDelta => Duration,
	Uuid => Uuid,
	serde_json::Value => Json,
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(QueryValue::Null, Into::into)
	}
}

macro_rules! impl_from_vec_for_query_value {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<Vec<$ty>> for QueryValue {
				fn from(items: Vec<$ty>) -> Self {
					QueryValue::Array(items.into_iter().map(Into::into).collect())
				}
			}
		)*
	};
}

// `Vec<u8>` is bytes, every other vector is an array parameter.
impl_from_vec_for_query_value!(i32, i64, f64, String, &str, QueryValue);
