//! # sqlweave-backends
//!
//! Vendor knowledge for the expression compiler: how PostgreSQL, MySQL and
//! SQLite spell operators, durations, temporal subtraction, truncation, data
//! types and lookups.
//!
//! Expression nodes never branch on the vendor themselves. They ask a
//! [`DatabaseOperations`] implementation, obtained with [`load_backend`] or by
//! constructing a dialect directly.
//!
//! ```
//! use sqlweave_backends::{DatabaseOperations, PostgresOperations, SqliteOperations};
//! use sqlweave_core::Connector;
//!
//! let parts = vec!["2".to_string(), "3".to_string()];
//! assert_eq!(PostgresOperations::new().combine_expression(Connector::Pow, &parts).unwrap(), "2 ^ 3");
//! assert_eq!(SqliteOperations::new().combine_expression(Connector::Pow, &parts).unwrap(), "POWER(2,3)");
//! ```

pub mod dialect;
pub mod error;
pub mod features;
pub mod loader;
pub mod operations;
pub mod statement;

pub use dialect::{MySqlOperations, PostgresOperations, SqliteOperations};
pub use error::{BackendError, Result};
pub use features::{DatabaseFeatures, Vendor};
pub use loader::load_backend;
pub use operations::{DatabaseOperations, SqlFragment, SupportCheck};
pub use statement::{Statement, finalize_sql};
