//! Vendor identity and feature flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
	Postgresql,
	Mysql,
	Sqlite,
}

impl Vendor {
	/// Bind placeholder for the parameter at `index` (1-based).
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_backends::Vendor;
	///
	/// assert_eq!(Vendor::Postgresql.placeholder(2), "$2");
	/// assert_eq!(Vendor::Sqlite.placeholder(2), "?");
	/// ```
	pub fn placeholder(&self, index: usize) -> String {
		match self {
			Vendor::Postgresql => format!("${}", index),
			Vendor::Mysql | Vendor::Sqlite => "?".to_string(),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Vendor::Postgresql => "postgresql",
			Vendor::Mysql => "mysql",
			Vendor::Sqlite => "sqlite",
		}
	}
}

impl fmt::Display for Vendor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Capabilities that change how expressions render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseFeatures {
	pub has_native_duration_field: bool,
	pub driver_supports_timedelta_args: bool,
	pub supports_temporal_subtraction: bool,
	pub supports_microsecond_precision: bool,
	pub supports_aggregate_filter_clause: bool,
}

impl DatabaseFeatures {
	pub fn postgresql() -> Self {
		Self {
			has_native_duration_field: true,
			driver_supports_timedelta_args: true,
			supports_temporal_subtraction: true,
			supports_microsecond_precision: true,
			supports_aggregate_filter_clause: true,
		}
	}

	pub fn mysql(microsecond_precision: bool) -> Self {
		Self {
			has_native_duration_field: false,
			driver_supports_timedelta_args: false,
			supports_temporal_subtraction: true,
			supports_microsecond_precision: microsecond_precision,
			supports_aggregate_filter_clause: false,
		}
	}

	pub fn sqlite() -> Self {
		Self {
			has_native_duration_field: false,
			driver_supports_timedelta_args: false,
			supports_temporal_subtraction: true,
			supports_microsecond_precision: true,
			supports_aggregate_filter_clause: false,
		}
	}
}
