//! Expression error types

use sqlweave_backends::BackendError;

/// Errors raised while building, resolving or compiling expressions.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
	/// A reference or output type could not be resolved.
	#[error("{0}")]
	FieldError(String),

	/// A node was built with the wrong number or kind of arguments.
	#[error("{0}")]
	TypeError(String),

	#[error("{0}")]
	ValueError(String),

	/// The condition can never match; callers may drop the branch.
	#[error("Nothing can match this condition")]
	EmptyResultSet,

	/// The node must be resolved against a query before compiling.
	#[error("{0}")]
	Unresolved(String),

	#[error(transparent)]
	Backend(#[from] BackendError),
}

impl ExpressionError {
	pub(crate) fn field(message: impl Into<String>) -> Self {
		Self::FieldError(message.into())
	}

	pub(crate) fn type_error(message: impl Into<String>) -> Self {
		Self::TypeError(message.into())
	}

	pub(crate) fn value(message: impl Into<String>) -> Self {
		Self::ValueError(message.into())
	}
}

pub type Result<T> = std::result::Result<T, ExpressionError>;
