//! PostgreSQL search module.
//!
//! Full-text search (`tsvector`/`tsquery`) and `pg_trgm` similarity nodes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sqlweave::search::{SearchQuery, SearchRank, SearchVector};
//! ```

#[cfg(feature = "postgres-search")]
pub use sqlweave_search::*;
