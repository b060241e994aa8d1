//! Database backends module.
//!
//! Per-vendor operator tables, quoting, placeholders, date truncation and
//! value adaptation.
//!
//! # Examples
//!
//! ```rust
//! use sqlweave::backends::{DatabaseOperations, PostgresOperations};
//!
//! assert_eq!(PostgresOperations::new().quote_name("order"), "\"order\"");
//! ```

#[cfg(feature = "backends")]
pub use sqlweave_backends::*;
