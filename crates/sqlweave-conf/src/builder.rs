//! Settings builder merging layered sources.

use crate::settings::{Settings, SettingsError};
use crate::sources::ConfigSource;
use indexmap::IndexMap;
use serde_json::Value;

/// Collects sources and merges them into [`Settings`].
///
/// Sources are applied from the lowest to the highest priority; objects are
/// merged key by key, any other value replaces what was there.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a configuration source
	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merge every source into one JSON object.
	pub fn merged(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> =
			self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|s| s.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			tracing::debug!(source = %source.description(), priority = source.priority(), "loading settings source");
			for (key, value) in source.load()? {
				match merged.get_mut(&key) {
					Some(existing) => deep_merge(existing, value),
					None => {
						merged.insert(key, value);
					}
				}
			}
		}
		Ok(merged)
	}

	/// Build and validate the settings.
	pub fn build(self) -> Result<Settings, SettingsError> {
		let merged = self.merged()?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		let settings: Settings = serde_json::from_value(Value::Object(object))?;
		settings.validate()?;
		tracing::info!(
			engine = %settings.database.engine,
			use_tz = settings.use_tz,
			time_zone = %settings.time_zone,
			"settings loaded"
		);
		Ok(settings)
	}
}

fn deep_merge(target: &mut Value, incoming: Value) {
	match (target, incoming) {
		(Value::Object(target), Value::Object(incoming)) => {
			for (key, value) in incoming {
				match target.get_mut(&key) {
					Some(existing) => deep_merge(existing, value),
					None => {
						target.insert(key, value);
					}
				}
			}
		}
		(target, incoming) => *target = incoming,
	}
}
