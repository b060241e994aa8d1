//! Backend selection from settings

use crate::dialect::{MySqlOperations, PostgresOperations, SqliteOperations};
use crate::error::{BackendError, Result};
use crate::operations::DatabaseOperations;
use sqlweave_conf::DatabaseSettings;
use std::sync::Arc;

/// Build the operations for the configured engine.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::{load_backend, Vendor};
/// use sqlweave_conf::DatabaseSettings;
///
/// let settings = DatabaseSettings { engine: "postgres".into(), ..Default::default() };
/// let ops = load_backend(&settings).unwrap();
/// assert_eq!(ops.vendor(), Vendor::Postgresql);
/// ```
pub fn load_backend(settings: &DatabaseSettings) -> Result<Arc<dyn DatabaseOperations>> {
	let engine = settings.engine.trim().to_lowercase();
	let ops: Arc<dyn DatabaseOperations> = match engine.as_str() {
		"postgresql" | "postgres" => Arc::new(PostgresOperations::new()),
		"mysql" => Arc::new(MySqlOperations::new(settings.microsecond_precision)),
		"sqlite" | "sqlite3" => Arc::new(SqliteOperations::new()),
		_ => return Err(BackendError::UnknownEngine(settings.engine.clone())),
	};
	tracing::debug!(engine = %engine, vendor = %ops.vendor(), "loaded database operations");
	Ok(ops)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::features::Vendor;
	use rstest::rstest;

	#[rstest]
	#[case("postgresql", Vendor::Postgresql)]
	#[case("Postgres", Vendor::Postgresql)]
	#[case("mysql", Vendor::Mysql)]
	#[case("sqlite3", Vendor::Sqlite)]
	fn test_engine_names(#[case] engine: &str, #[case] vendor: Vendor) {
		let settings = DatabaseSettings {
			engine: engine.to_string(),
			..Default::default()
		};
		assert_eq!(load_backend(&settings).unwrap().vendor(), vendor);
	}

	#[rstest]
	fn test_unknown_engine() {
		let settings = DatabaseSettings {
			engine: "oracle".to_string(),
			..Default::default()
		};
		assert_eq!(
			load_backend(&settings).unwrap_err(),
			BackendError::UnknownEngine("oracle".to_string())
		);
	}

	#[rstest]
	fn test_mysql_precision_is_forwarded() {
		let settings = DatabaseSettings {
			engine: "mysql".to_string(),
			microsecond_precision: false,
		};
		let ops = load_backend(&settings).unwrap();
		assert!(!ops.features().supports_microsecond_precision);
	}
}
