//! Configuration sources for layered settings
//!
//! Sources are merged together in priority order
//! (environment variables > config files > defaults).

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Separator used by [`EnvSource`] to address nested keys.
pub const NESTING_SEPARATOR: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variable configuration source
///
/// `SQLWEAVE_DATABASE__ENGINE=mysql` becomes `{"database": {"engine": "mysql"}}`.
pub struct EnvSource {
	prefix: Option<String>,
}

impl EnvSource {
	/// Create a source reading every environment variable.
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// Only read variables starting with `prefix`, and strip it from keys.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_conf::EnvSource;
	///
	/// let source = EnvSource::new().with_prefix("SQLWEAVE_");
	/// ```
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	fn parse_value(value: String) -> Value {
		match value.trim().to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => return Value::Bool(true),
			"false" | "0" | "no" | "off" => return Value::Bool(false),
			_ => {}
		}
		if let Ok(num) = value.parse::<i64>() {
			Value::Number(num.into())
		} else {
			Value::String(value)
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(rest) => rest.to_string(),
					None => continue,
				},
				None => key.clone(),
			};
			if clean_key.is_empty() {
				continue;
			}

			let path: Vec<String> = clean_key
				.to_lowercase()
				.split(NESTING_SEPARATOR)
				.map(str::to_string)
				.collect();
			if path.iter().any(String::is_empty) {
				tracing::warn!(variable = %key, "ignoring environment variable with empty key segment");
				continue;
			}
			insert_path(&mut config, &path, Self::parse_value(value));
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

fn insert_path(config: &mut IndexMap<String, Value>, path: &[String], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		return;
	};
	if rest.is_empty() {
		config.insert(head.clone(), value);
		return;
	}
	let entry = config
		.entry(head.clone())
		.or_insert_with(|| Value::Object(serde_json::Map::new()));
	insert_nested(entry, rest, value);
}

fn insert_nested(target: &mut Value, path: &[String], value: Value) {
	if !target.is_object() {
		*target = Value::Object(serde_json::Map::new());
	}
	let (Value::Object(map), Some((head, rest))) = (target, path.split_first()) else {
		return;
	};
	if rest.is_empty() {
		map.insert(head.clone(), value);
		return;
	}
	let entry = map
		.entry(head.clone())
		.or_insert_with(|| Value::Object(serde_json::Map::new()));
	insert_nested(entry, rest, value);
}

/// TOML file configuration source
///
/// A missing file loads as an empty layer.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_conf::TomlFileSource;
	///
	/// let source = TomlFileSource::new("sqlweave.toml");
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			tracing::debug!(path = %self.path.display(), "settings file not found, skipping");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(&toml_value)?;

		match json_value {
			Value::Object(map) => Ok(map.into_iter().collect()),
			_ => Err(SourceError::Parse(format!(
				"TOML root of {} must be a table",
				self.path.display()
			))),
		}
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_conf::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("use_tz", Value::Bool(false));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}
