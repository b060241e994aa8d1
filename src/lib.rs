//! # sqlweave
//!
//! Composable SQL expression trees that resolve against a query and compile
//! to parameterized SQL for PostgreSQL, MySQL and SQLite.
//!
//! A tree is assembled from field references, literals, arithmetic,
//! functions, aggregates, conditions and orderings. Resolving it against a
//! [`Query`](crate::expressions::Query) binds references to columns and sets
//! up the joins they need; a [`SqlCompiler`](crate::expressions::SqlCompiler)
//! then renders it for one backend.
//!
//! ## Feature Flags
//!
//! - `standard` (default) - settings, backends and expressions
//! - `full` - everything, including PostgreSQL search
//!
//! ### Fine-grained Control
//!
//! - `conf` - layered settings (defaults, TOML files, environment)
//! - `backends` - per-vendor operators, quoting and placeholders
//! - `expressions` - the expression tree and compiler
//! - `postgres-search` - full-text search and trigram nodes
//!
//! ## Example
//!
//! ```
//! use sqlweave::prelude::*;
//!
//! let mut query = Query::new(
//!     Model::new("account")
//!         .field("kind", FieldType::CharField { max_length: 1 })
//!         .field("balance", FieldType::IntegerField),
//! );
//! let discount = Case::new(
//!     vec![When::new(Q::new("kind", "G"), Value::new(5)).unwrap()],
//!     Some(Value::new(0).into_expr()),
//! );
//! let discount = query.add_annotation("discount", discount.into_expr(), false).unwrap();
//!
//! let ops = PostgresOperations::new();
//! let statement = SqlCompiler::new(&ops)
//!     .with_query(&query)
//!     .compile_statement(&discount)
//!     .unwrap();
//! assert_eq!(
//!     statement.sql,
//!     "CASE WHEN \"account\".\"kind\" = $1 THEN $2 ELSE $3 END"
//! );
//! ```

pub mod core;

#[cfg(feature = "backends")]
pub mod backends;
#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "expressions")]
pub mod expressions;
#[cfg(feature = "postgres-search")]
pub mod search;

pub use sqlweave_core::{Connector, FieldType, QueryValue};

#[cfg(feature = "conf")]
pub use sqlweave_conf::{DatabaseSettings, Settings, SettingsBuilder, SettingsError};

#[cfg(feature = "backends")]
pub use sqlweave_backends::{
	BackendError, DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations,
	Statement, Vendor, load_backend,
};

#[cfg(feature = "expressions")]
pub use sqlweave_expressions::{Expr, Expression, ExpressionError, Query, SqlCompiler};

/// Prelude module for convenient imports
///
/// Import everything you need with `use sqlweave::prelude::*;`
pub mod prelude {
	pub use crate::{Connector, FieldType, QueryValue};

	#[cfg(feature = "conf")]
	pub use crate::{DatabaseSettings, Settings, SettingsBuilder};

	#[cfg(feature = "backends")]
	pub use crate::{
		DatabaseOperations, MySqlOperations, PostgresOperations, SqliteOperations, Vendor,
		load_backend,
	};

	#[cfg(feature = "expressions")]
	pub use sqlweave_expressions::{
		// Aggregates
		Avg, Count, Max, Min, StdDev, Sum, Variance,
		// Conditions
		Case, Q, When,
		// Dates
		Date, DateTime,
		// Functions
		Cast, Coalesce, Func, Greatest, Least, Length, Lower, Now, NullIf, Upper,
		// Leaves
		ExpressionWrapper, F, RawSql, Value,
		// Ordering
		OrderBy,
		// Query
		Model, Query,
		// Protocol
		Combinable, Expr, Expression, ExpressionError, IntoExpr, ResolveOptions, SqlCompiler,
	};

	#[cfg(feature = "postgres-search")]
	pub use sqlweave_search::{
		SearchQuery, SearchQueryCombinable, SearchRank, SearchVector, SearchVectorCombinable,
		SearchVectorExact, TrigramDistance, TrigramSimilarity, Weight,
	};
}
