//! Output field types.
//!
//! An expression's output type is described by the model field class it
//! produces. The class hierarchy matters for type inference: a
//! `DateTimeField` is a `DateField`, a `BigIntegerField` is an
//! `IntegerField`, and every type is a generic `Field`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output type of an expression or column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
	/// Generic field with no specific behaviour (used by raw SQL).
	Field,
	AutoField,
	BigAutoField,
	IntegerField,
	BigIntegerField,
	SmallIntegerField,
	PositiveIntegerField,
	PositiveSmallIntegerField,
	FloatField,
	DecimalField {
		max_digits: u32,
		decimal_places: u32,
	},
	BooleanField,
	CharField {
		max_length: usize,
	},
	TextField,
	DateField,
	DateTimeField,
	TimeField,
	DurationField,
	BinaryField,
	UuidField,
	GenericIpAddressField,
	JsonField,
	/// Extension types such as `tsvector` columns.
	Custom {
		internal_type: String,
		db_type: String,
	},
}

const FIELD: &str = "Field";

impl FieldType {
	/// The field class name.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_core::FieldType;
	///
	/// assert_eq!(FieldType::DateTimeField.internal_type(), "DateTimeField");
	/// assert_eq!(FieldType::CharField { max_length: 10 }.internal_type(), "CharField");
	/// ```
	pub fn internal_type(&self) -> &str {
		match self {
			FieldType::Field => FIELD,
			FieldType::AutoField => "AutoField",
			FieldType::BigAutoField => "BigAutoField",
			FieldType::IntegerField => "IntegerField",
			FieldType::BigIntegerField => "BigIntegerField",
			FieldType::SmallIntegerField => "SmallIntegerField",
			FieldType::PositiveIntegerField => "PositiveIntegerField",
			FieldType::PositiveSmallIntegerField => "PositiveSmallIntegerField",
			FieldType::FloatField => "FloatField",
			FieldType::DecimalField { .. } => "DecimalField",
			FieldType::BooleanField => "BooleanField",
			FieldType::CharField { .. } => "CharField",
			FieldType::TextField => "TextField",
			FieldType::DateField => "DateField",
			FieldType::DateTimeField => "DateTimeField",
			FieldType::TimeField => "TimeField",
			FieldType::DurationField => "DurationField",
			FieldType::BinaryField => "BinaryField",
			FieldType::UuidField => "UUIDField",
			FieldType::GenericIpAddressField => "GenericIPAddressField",
			FieldType::JsonField => "JSONField",
			FieldType::Custom { internal_type, .. } => internal_type,
		}
	}

	/// Class names from the most specific to `Field`.
	pub fn ancestry(&self) -> Vec<&str> {
		let parents: &[&str] = match self {
			FieldType::Field => &[],
			FieldType::AutoField => &["AutoField"],
			FieldType::BigAutoField => &["BigAutoField", "AutoField"],
			FieldType::IntegerField => &["IntegerField"],
			FieldType::BigIntegerField => &["BigIntegerField", "IntegerField"],
			FieldType::SmallIntegerField => &["SmallIntegerField", "IntegerField"],
			FieldType::PositiveIntegerField => &["PositiveIntegerField", "IntegerField"],
			FieldType::PositiveSmallIntegerField => &[
				"PositiveSmallIntegerField",
				"SmallIntegerField",
				"IntegerField",
			],
			FieldType::DateTimeField => &["DateTimeField", "DateField"],
			FieldType::Custom { internal_type, .. } => {
				return vec![internal_type.as_str(), FIELD];
			}
			other => {
				return vec![other.internal_type(), FIELD];
			}
		};
		let mut chain = parents.to_vec();
		chain.push(FIELD);
		chain
	}

	/// `isinstance(self, other.__class__)`.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_core::FieldType;
	///
	/// assert!(FieldType::DateTimeField.is_instance_of(&FieldType::DateField));
	/// assert!(!FieldType::DateField.is_instance_of(&FieldType::DateTimeField));
	/// assert!(FieldType::TextField.is_instance_of(&FieldType::Field));
	/// ```
	pub fn is_instance_of(&self, other: &FieldType) -> bool {
		let target = other.internal_type();
		self.ancestry().contains(&target)
	}

	/// Date, datetime or time.
	pub fn is_temporal(&self) -> bool {
		matches!(
			self,
			FieldType::DateField | FieldType::DateTimeField | FieldType::TimeField
		)
	}

	/// Any integer field, matching `*IntegerField` and the auto fields.
	pub fn is_integer(&self) -> bool {
		self.internal_type().ends_with("IntegerField")
			|| matches!(self, FieldType::AutoField | FieldType::BigAutoField)
	}

	/// Textual fields.
	pub fn is_text(&self) -> bool {
		matches!(self, FieldType::CharField { .. } | FieldType::TextField)
	}
}

impl fmt::Display for FieldType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}()", self.internal_type())
	}
}
