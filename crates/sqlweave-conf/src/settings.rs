//! Typed settings.

use crate::sources::SourceError;
use serde::{Deserialize, Serialize};

/// Engines understood by `sqlweave-backends`.
pub const KNOWN_ENGINES: &[&str] = &["postgresql", "postgres", "mysql", "sqlite", "sqlite3"];

/// Error type for building settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Source error: {0}")]
	Source(#[from] SourceError),

	#[error("Deserialize error: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid setting {key}: {message}")]
	Invalid { key: String, message: String },
}

/// Database section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
	/// Backend engine name, e.g. `postgresql`, `mysql` or `sqlite`.
	pub engine: String,
	/// MySQL only: whether datetime columns keep microseconds.
	pub microsecond_precision: bool,
}

impl Default for DatabaseSettings {
	fn default() -> Self {
		Self {
			engine: "sqlite".to_string(),
			microsecond_precision: true,
		}
	}
}

/// Settings that affect how expressions resolve and compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Store datetimes in UTC and convert truncations to `time_zone`.
	pub use_tz: bool,
	/// IANA name of the current time zone.
	pub time_zone: String,
	pub database: DatabaseSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			use_tz: false,
			time_zone: "UTC".to_string(),
			database: DatabaseSettings::default(),
		}
	}
}

impl Settings {
	/// Check cross-field constraints that serde cannot express.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_conf::Settings;
	///
	/// let mut settings = Settings::default();
	/// assert!(settings.validate().is_ok());
	///
	/// settings.time_zone = "Mars/Olympus_Mons".to_string();
	/// assert!(settings.validate().is_err());
	/// ```
	pub fn validate(&self) -> Result<(), SettingsError> {
		self.tz()?;
		let engine = self.database.engine.to_lowercase();
		if !KNOWN_ENGINES.contains(&engine.as_str()) {
			return Err(SettingsError::Invalid {
				key: "database.engine".to_string(),
				message: format!(
					"unknown engine '{}', expected one of: {}",
					self.database.engine,
					KNOWN_ENGINES.join(", ")
				),
			});
		}
		Ok(())
	}

	/// The configured time zone.
	pub fn tz(&self) -> Result<chrono_tz::Tz, SettingsError> {
		self.time_zone
			.parse::<chrono_tz::Tz>()
			.map_err(|e| SettingsError::Invalid {
				key: "time_zone".to_string(),
				message: e.to_string(),
			})
	}
}
