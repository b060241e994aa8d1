//! # sqlweave-core
//!
//! Types shared by every layer of sqlweave:
//!
//! - [`QueryValue`]: a parameter value bound to a `%s` placeholder
//! - [`FieldType`]: the output type of an expression, modelled on model field classes
//! - [`Connector`]: the operators that join two expressions

pub mod connector;
pub mod fields;
pub mod value;

pub use connector::Connector;
pub use fields::FieldType;
pub use value::QueryValue;
