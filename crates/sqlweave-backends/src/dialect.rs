//! Vendor dialects

pub mod mysql;
pub mod postgresql;
pub mod sqlite;

pub use mysql::MySqlOperations;
pub use postgresql::PostgresOperations;
pub use sqlite::SqliteOperations;

/// Kinds accepted by the truncation functions.
pub const DATE_TRUNC_KINDS: &[&str] = &["year", "month", "day"];
pub const DATETIME_TRUNC_KINDS: &[&str] = &["year", "month", "day", "hour", "minute", "second"];
