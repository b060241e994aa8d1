//! # sqlweave-search
//!
//! PostgreSQL full-text search and trigram similarity nodes for
//! sqlweave-expressions trees.
//!
//! Documents are built with [`SearchVector`], matched against a
//! [`SearchQuery`] with [`SearchVectorExact`] and ordered by [`SearchRank`].
//! Every node here compiles only on PostgreSQL; other backends report
//! [`BackendError::NotSupported`].
//!
//! ```
//! use sqlweave_backends::PostgresOperations;
//! use sqlweave_core::FieldType;
//! use sqlweave_expressions::{F, IntoExpr, Model, Query, SqlCompiler};
//! use sqlweave_search::{SearchQuery, SearchRank, SearchVector};
//!
//! let mut query = Query::new(Model::new("entry").field("body", FieldType::TextField));
//! let rank = SearchRank::new(
//!     SearchVector::new(vec![F::new("body").into_expr()]).unwrap(),
//!     SearchQuery::new("cheese"),
//! );
//! let rank = query.add_annotation("rank", rank.into_expr(), false).unwrap();
//!
//! let ops = PostgresOperations::new();
//! let statement = SqlCompiler::new(&ops).with_query(&query).compile_statement(&rank).unwrap();
//! assert_eq!(
//!     statement.sql,
//!     "ts_rank(to_tsvector(COALESCE(\"entry\".\"body\", $1)), plainto_tsquery($2))"
//! );
//! ```

pub mod error;
pub mod fields;
pub mod query;
pub mod rank;
pub mod trigram;
pub mod vector;

pub use error::{Result, SearchError};
pub use fields::{SearchVectorField, Weight, WeightedColumn, search_query_type, search_vector_type};
pub use query::{CombinedSearchQuery, SearchQuery, SearchQueryCombinable};
pub use rank::{SearchRank, SearchTerm, SearchVectorExact};
pub use trigram::{TrigramDistance, TrigramSimilarity};
pub use vector::{CombinedSearchVector, SearchVector, SearchVectorCombinable};

use sqlweave_backends::{BackendError, Vendor};
use sqlweave_expressions::{ExpressionError, SqlCompiler};

pub(crate) fn require_postgres(compiler: &SqlCompiler<'_>, node: &str) -> sqlweave_expressions::Result<()> {
	let vendor = compiler.ops().vendor();
	if vendor == Vendor::Postgresql {
		return Ok(());
	}
	tracing::debug!(node, %vendor, "search expression used outside PostgreSQL");
	Err(ExpressionError::Backend(BackendError::NotSupported(format!(
		"{} is only supported on PostgreSQL, not {}.",
		node, vendor
	))))
}
