//! Backend error types

/// Errors raised while rendering vendor-specific SQL.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
	/// The backend cannot express the requested operation.
	#[error("{0}")]
	NotSupported(String),

	#[error("Invalid connector for timedelta: {0}.")]
	InvalidConnector(String),

	#[error("Too many params for timedelta operations.")]
	TooManyOperands,

	#[error("Unknown database engine: {0}")]
	UnknownEngine(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
