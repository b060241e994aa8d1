//! Connectors used by combined expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator joining the two sides of a combined expression.
///
/// The SQL token for [`Connector::Mod`] is `%%` because fragments keep `%s`
/// placeholders until the statement is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connector {
	Add,
	Sub,
	Mul,
	Div,
	Mod,
	Pow,
	BitAnd,
	BitOr,
	/// `||`, string and tsvector concatenation, tsquery OR
	Concat,
	/// `&&`, tsquery AND
	SearchAnd,
}

impl Connector {
	/// SQL token for this connector.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_core::Connector;
	///
	/// assert_eq!(Connector::Add.as_str(), "+");
	/// assert_eq!(Connector::Mod.as_str(), "%%");
	/// ```
	pub fn as_str(&self) -> &'static str {
		match self {
			Connector::Add => "+",
			Connector::Sub => "-",
			Connector::Mul => "*",
			Connector::Div => "/",
			Connector::Mod => "%%",
			Connector::Pow => "^",
			Connector::BitAnd => "&",
			Connector::BitOr => "|",
			Connector::Concat => "||",
			Connector::SearchAnd => "&&",
		}
	}

	/// Whether this connector is an arithmetic operator.
	pub fn is_arithmetic(&self) -> bool {
		matches!(
			self,
			Connector::Add
				| Connector::Sub
				| Connector::Mul
				| Connector::Div
				| Connector::Mod
				| Connector::Pow
		)
	}
}

impl fmt::Display for Connector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
