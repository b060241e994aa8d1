//! Search error types

use sqlweave_expressions::ExpressionError;

/// Errors raised while building search expressions.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
	#[error("SearchVector can only be combined with other SearchVectors")]
	VectorConfigMismatch,

	#[error("SearchQuery configs don't match.")]
	QueryConfigMismatch,

	#[error("Weight must be one of 'A', 'B', 'C' or 'D', got '{0}'")]
	InvalidWeight(String),

	/// A search vector field failed its definition checks.
	#[error("{message} ({id})")]
	Check { id: &'static str, message: String },

	#[error(transparent)]
	Expression(#[from] ExpressionError),
}

pub type Result<T> = std::result::Result<T, SearchError>;
