//! Settings module.
//!
//! Layered configuration: built-in defaults, then TOML files, then
//! `SQLWEAVE_`-prefixed environment variables.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sqlweave::conf::{Settings, SettingsBuilder};
//! ```

#[cfg(feature = "conf")]
pub use sqlweave_conf::*;
