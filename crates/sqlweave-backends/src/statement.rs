//! Final `(sql, params)` statements
//!
//! Expression fragments are written with `%s` placeholders and `%%` for a
//! literal percent sign so that they can be nested freely. Only the outermost
//! statement is rewritten to the vendor's bind syntax.

use crate::features::Vendor;
use sqlweave_core::QueryValue;

/// A finalized statement ready to hand to a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub params: Vec<QueryValue>,
}

impl Statement {
	pub fn new(sql: impl Into<String>, params: Vec<QueryValue>) -> Self {
		Self {
			sql: sql.into(),
			params,
		}
	}
}

/// Rewrite `%s` placeholders to the vendor's bind syntax and `%%` to `%`.
///
/// A `%` followed by anything else is kept as is.
///
/// # Examples
///
/// ```
/// use sqlweave_backends::{finalize_sql, Vendor};
///
/// let sql = "\"price\" %% %s > %s";
/// assert_eq!(finalize_sql(sql, Vendor::Postgresql), "\"price\" % $1 > $2");
/// assert_eq!(finalize_sql(sql, Vendor::Mysql), "\"price\" % ? > ?");
/// ```
pub fn finalize_sql(sql: &str, vendor: Vendor) -> String {
	let mut out = String::with_capacity(sql.len() + 8);
	let mut index = 0;
	let mut chars = sql.chars().peekable();

	while let Some(c) = chars.next() {
		if c != '%' {
			out.push(c);
			continue;
		}
		match chars.peek() {
			Some('%') => {
				chars.next();
				out.push('%');
			}
			Some('s') => {
				chars.next();
				index += 1;
				out.push_str(&vendor.placeholder(index));
			}
			_ => out.push('%'),
		}
	}

	out
}

/// Count the `%s` placeholders in a fragment.
pub fn count_placeholders(sql: &str) -> usize {
	let mut count = 0;
	let mut chars = sql.chars();
	while let Some(c) = chars.next() {
		if c == '%' {
			match chars.next() {
				Some('s') => count += 1,
				Some(_) | None => {}
			}
		}
	}
	count
}
