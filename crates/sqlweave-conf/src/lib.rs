//! # sqlweave-conf
//!
//! Settings that influence SQL generation: time zone handling and the
//! database engine. Values are merged from layered sources in priority order
//! (environment variables > TOML file > defaults).
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlweave_conf::{EnvSource, SettingsBuilder, TomlFileSource};
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(TomlFileSource::new("sqlweave.toml"))
//!     .add_source(EnvSource::new().with_prefix("SQLWEAVE_"))
//!     .build()
//!     .unwrap();
//! println!("engine = {}", settings.database.engine);
//! ```

pub mod builder;
pub mod settings;
pub mod sources;

pub use builder::SettingsBuilder;
pub use settings::{DatabaseSettings, Settings, SettingsError};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
