//! Expression trees module.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sqlweave::expressions::{F, Q, Sum, When};
//! ```

#[cfg(feature = "expressions")]
pub use sqlweave_expressions::*;
