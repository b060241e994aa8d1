//! `tsvector` and `tsquery` field types

use crate::error::{Result, SearchError};
use sqlweave_core::FieldType;
use std::fmt;
use std::str::FromStr;

/// Output type of search vectors.
pub fn search_vector_type() -> FieldType {
	FieldType::Custom {
		internal_type: "SearchVectorField".to_string(),
		db_type: "tsvector".to_string(),
	}
}

/// Output type of search queries.
pub fn search_query_type() -> FieldType {
	FieldType::Custom {
		internal_type: "SearchQueryField".to_string(),
		db_type: "tsquery".to_string(),
	}
}

/// `setweight` label, from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
	A,
	B,
	C,
	D,
}

impl Weight {
	pub fn as_str(&self) -> &'static str {
		match self {
			Weight::A => "A",
			Weight::B => "B",
			Weight::C => "C",
			Weight::D => "D",
		}
	}
}

impl fmt::Display for Weight {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Weight {
	type Err = SearchError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"A" => Ok(Weight::A),
			"B" => Ok(Weight::B),
			"C" => Ok(Weight::C),
			"D" => Ok(Weight::D),
			other => Err(SearchError::InvalidWeight(other.to_string())),
		}
	}
}

/// A source column of a stored search vector with its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedColumn {
	pub name: String,
	pub weight: Weight,
}

impl WeightedColumn {
	pub fn new(name: impl Into<String>, weight: Weight) -> Self {
		Self {
			name: name.into(),
			weight,
		}
	}
}

/// Definition of a stored `tsvector` column.
///
/// The column is always nullable and indexed. When it is computed from
/// `columns` a `language` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchVectorField {
	pub columns: Option<Vec<WeightedColumn>>,
	pub language: Option<String>,
}

impl SearchVectorField {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn columns(mut self, columns: Vec<WeightedColumn>) -> Self {
		self.columns = Some(columns);
		self
	}

	pub fn language(mut self, language: impl Into<String>) -> Self {
		self.language = Some(language.into());
		self
	}

	/// Definition problems, empty when the field is valid.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_search::{SearchVectorField, Weight, WeightedColumn};
	///
	/// let field = SearchVectorField::new().columns(vec![WeightedColumn::new("title", Weight::A)]);
	/// assert_eq!(field.check().len(), 1);
	/// assert!(field.language("english").check().is_empty());
	/// ```
	pub fn check(&self) -> Vec<SearchError> {
		let mut errors = Vec::new();
		if self.columns.is_some() {
			match &self.language {
				None => errors.push(SearchError::Check {
					id: "fields.E403",
					message: "SearchVectorField must define a 'language' attribute.".to_string(),
				}),
				Some(language) if language.trim().is_empty() => errors.push(SearchError::Check {
					id: "fields.E404",
					message: "'language' must be a non-empty string.".to_string(),
				}),
				Some(_) => {}
			}
		}
		errors
	}

	pub fn field_type(&self) -> FieldType {
		search_vector_type()
	}

	pub fn is_nullable(&self) -> bool {
		true
	}

	pub fn db_index(&self) -> bool {
		true
	}
}
