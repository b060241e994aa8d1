//! Field types, parameter values and connectors shared by every crate.
//!
//! # Examples
//!
//! ```rust
//! use sqlweave::core::{FieldType, QueryValue};
//!
//! assert_eq!(FieldType::IntegerField.internal_type(), "IntegerField");
//! assert!(QueryValue::Null.is_null());
//! ```

pub use sqlweave_core::*;
