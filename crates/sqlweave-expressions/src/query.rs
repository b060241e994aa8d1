//! Query context that expressions resolve against
//!
//! [`QueryContext`] is the narrow interface nodes need while resolving:
//! turning a `__`-separated reference into a column (adding joins as it goes),
//! knowing which names are unquoted aliases, and whether time zone support is
//! active. [`Query`] is the in-crate implementation over a [`Model`] schema.

use crate::compiler::SqlCompiler;
use crate::error::{ExpressionError, Result};
use crate::expression::{Expr, ResolveOptions};
use crate::leaves::{Col, Ref};
use indexmap::IndexMap;
use sqlweave_backends::SqlFragment;
use sqlweave_conf::Settings;
use sqlweave_core::FieldType;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Separator between relation hops and lookups in a reference.
pub const LOOKUP_SEP: &str = "__";

/// What a node can ask of the query while resolving.
pub trait QueryContext {
	/// Resolve `name` to an expression: an annotation, a [`Ref`] to one when
	/// summarizing, or a [`Col`] (joining relations as needed).
	fn resolve_ref(
		&mut self,
		name: &str,
		allow_joins: bool,
		reuse: Option<&HashSet<String>>,
		summarize: bool,
	) -> Result<Expr>;

	/// `name` is a table alias that must not be quoted.
	fn is_unquoted_alias(&self, name: &str) -> bool;

	/// Datetimes are stored in UTC and truncated in the current time zone.
	fn use_tz(&self) -> bool;

	/// The current time zone.
	fn time_zone(&self) -> chrono_tz::Tz {
		chrono_tz::UTC
	}
}

/// A concrete model column targeted by a [`Col`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
	/// Attribute name used in references.
	pub name: String,
	/// Column name in the table.
	pub column: String,
	pub field_type: FieldType,
}

impl Column {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			field_type,
		}
	}

	pub fn db_column(mut self, column: impl Into<String>) -> Self {
		self.column = column.into();
		self
	}
}

impl fmt::Display for Column {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name)
	}
}

/// A forward relation to another model.
#[derive(Debug, Clone)]
pub struct Relation {
	pub name: String,
	/// Local column holding the key.
	pub column: String,
	pub target: Arc<Model>,
	pub nullable: bool,
}

/// Schema description used to resolve references.
#[derive(Debug, Clone)]
pub struct Model {
	pub table: String,
	pub pk: Column,
	fields: Vec<Column>,
	relations: Vec<Relation>,
}

impl Model {
	/// A model with an `id` auto field as primary key.
	///
	/// # Examples
	///
	/// ```
	/// use sqlweave_core::FieldType;
	/// use sqlweave_expressions::Model;
	///
	/// let author = Model::new("author").field("name", FieldType::CharField { max_length: 100 });
	/// let book = Model::new("book")
	///     .field("title", FieldType::TextField)
	///     .foreign_key("author", author);
	/// assert!(book.get_field("author").is_some());
	/// ```
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			pk: Column::new("id", FieldType::AutoField),
			fields: Vec::new(),
			relations: Vec::new(),
		}
	}

	pub fn primary_key(mut self, column: Column) -> Self {
		self.pk = column;
		self
	}

	pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
		self.fields.push(Column::new(name, field_type));
		self
	}

	pub fn column(mut self, column: Column) -> Self {
		self.fields.push(column);
		self
	}

	/// Add a non-null relation stored in `<name>_id`.
	pub fn foreign_key(self, name: impl Into<String>, target: Model) -> Self {
		self.relation(name, target, false)
	}

	pub fn nullable_foreign_key(self, name: impl Into<String>, target: Model) -> Self {
		self.relation(name, target, true)
	}

	fn relation(mut self, name: impl Into<String>, target: Model, nullable: bool) -> Self {
		let name = name.into();
		self.relations.push(Relation {
			column: format!("{}_id", name),
			name,
			target: Arc::new(target),
			nullable,
		});
		self
	}

	/// Field by attribute name; relations resolve to their key column.
	pub fn get_field(&self, name: &str) -> Option<Column> {
		if name == self.pk.name || name == "pk" {
			return Some(self.pk.clone());
		}
		if let Some(column) = self.fields.iter().find(|c| c.name == name) {
			return Some(column.clone());
		}
		self.get_relation(name).map(|rel| Column {
			name: rel.name.clone(),
			column: rel.column.clone(),
			field_type: key_type(&rel.target.pk.field_type),
		})
	}

	pub fn get_relation(&self, name: &str) -> Option<&Relation> {
		self.relations.iter().find(|r| r.name == name)
	}

	/// Sorted names accepted by [`Model::get_field`].
	pub fn field_names(&self) -> Vec<String> {
		let mut names: Vec<String> = std::iter::once(self.pk.name.clone())
			.chain(self.fields.iter().map(|c| c.name.clone()))
			.chain(self.relations.iter().map(|r| r.name.clone()))
			.collect();
		names.sort();
		names
	}
}

/// Column type of a key pointing at `pk`.
fn key_type(pk: &FieldType) -> FieldType {
	match pk {
		FieldType::AutoField => FieldType::IntegerField,
		FieldType::BigAutoField => FieldType::BigIntegerField,
		other => other.clone(),
	}
}

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
	Inner,
	LeftOuter,
}

impl JoinType {
	pub fn as_sql(&self) -> &'static str {
		match self {
			JoinType::Inner => "INNER JOIN",
			JoinType::LeftOuter => "LEFT OUTER JOIN",
		}
	}
}

/// An entry of the alias map: the base table or a join to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
	pub table_name: String,
	pub table_alias: String,
	/// `None` for the base table.
	pub parent_alias: Option<String>,
	pub join_type: JoinType,
	/// `(parent column, joined column)`
	pub join_cols: (String, String),
	pub nullable: bool,
}

impl Join {
	/// Two joins are interchangeable when they join the same table from the
	/// same parent on the same columns.
	pub fn equals(&self, other: &Join) -> bool {
		self.table_name == other.table_name
			&& self.parent_alias == other.parent_alias
			&& self.join_cols == other.join_cols
	}

	/// Render the `FROM` or `JOIN` clause for this entry.
	pub fn as_sql(&self, compiler: &SqlCompiler<'_>) -> SqlFragment {
		let qn = |name: &str| compiler.quote_name_unless_alias(name);
		let table = if self.table_alias == self.table_name {
			qn(&self.table_name)
		} else {
			format!("{} {}", qn(&self.table_name), qn(&self.table_alias))
		};
		let Some(parent) = &self.parent_alias else {
			return (table, Vec::new());
		};
		(
			format!(
				"{} {} ON ({}.{} = {}.{})",
				self.join_type.as_sql(),
				table,
				qn(parent),
				qn(&self.join_cols.0),
				qn(&self.table_alias),
				qn(&self.join_cols.1)
			),
			Vec::new(),
		)
	}
}

/// Resolution target over a model, tracking joins and annotations.
#[derive(Debug, Clone)]
pub struct Query {
	model: Arc<Model>,
	alias_map: IndexMap<String, Join>,
	table_map: HashMap<String, Vec<String>>,
	annotations: IndexMap<String, Expr>,
	use_tz: bool,
	time_zone: chrono_tz::Tz,
}

impl Query {
	pub fn new(model: Model) -> Self {
		let mut query = Self {
			model: Arc::new(model),
			alias_map: IndexMap::new(),
			table_map: HashMap::new(),
			annotations: IndexMap::new(),
			use_tz: false,
			time_zone: chrono_tz::UTC,
		};
		let table = query.model.table.clone();
		query.register_alias(Join {
			table_name: table.clone(),
			table_alias: table,
			parent_alias: None,
			join_type: JoinType::Inner,
			join_cols: (String::new(), String::new()),
			nullable: false,
		});
		query
	}

	/// Apply the time zone settings.
	pub fn with_settings(mut self, settings: &Settings) -> Result<Self> {
		self.use_tz = settings.use_tz;
		self.time_zone = settings
			.tz()
			.map_err(|e| ExpressionError::value(e.to_string()))?;
		Ok(self)
	}

	pub fn with_use_tz(mut self, use_tz: bool) -> Self {
		self.use_tz = use_tz;
		self
	}

	pub fn model(&self) -> &Model {
		&self.model
	}

	pub fn base_alias(&self) -> &str {
		&self.model.table
	}

	pub fn alias_map(&self) -> &IndexMap<String, Join> {
		&self.alias_map
	}

	/// Joins added by resolved references, in creation order.
	pub fn joins(&self) -> impl Iterator<Item = &Join> {
		self.alias_map.values().filter(|j| j.parent_alias.is_some())
	}

	pub fn annotations(&self) -> &IndexMap<String, Expr> {
		&self.annotations
	}

	/// Resolve `expression` and store it under `alias`.
	pub fn add_annotation(&mut self, alias: impl Into<String>, expression: Expr, summarize: bool) -> Result<Expr> {
		let alias = alias.into();
		let mut options = ResolveOptions::default();
		options.summarize = summarize;
		let resolved = expression.resolve_expression(self, &options)?;
		tracing::debug!(alias = %alias, expression = %resolved, "added annotation");
		self.annotations.insert(alias, resolved.clone());
		Ok(resolved)
	}

	/// Render the `FROM` clause with every join.
	pub fn from_clause_sql(&self, compiler: &SqlCompiler<'_>) -> SqlFragment {
		let parts: Vec<String> = self
			.alias_map
			.values()
			.map(|join| join.as_sql(compiler).0)
			.collect();
		(parts.join(" "), Vec::new())
	}

	fn register_alias(&mut self, join: Join) -> String {
		let alias = join.table_alias.clone();
		self.table_map
			.entry(join.table_name.clone())
			.or_default()
			.push(alias.clone());
		self.alias_map.insert(alias.clone(), join);
		alias
	}

	/// Reuse an equal join or create a new alias for it.
	fn join(&mut self, mut join: Join, reuse: Option<&HashSet<String>>) -> String {
		let existing = self.alias_map.iter().find(|(alias, candidate)| {
			candidate.equals(&join) && reuse.is_none_or(|allowed| allowed.contains(*alias))
		});
		if let Some((alias, _)) = existing {
			return alias.clone();
		}

		join.table_alias = if self.table_map.contains_key(&join.table_name) {
			format!("T{}", self.alias_map.len() + 1)
		} else {
			join.table_name.clone()
		};
		tracing::debug!(
			table = %join.table_name,
			alias = %join.table_alias,
			parent = ?join.parent_alias,
			"creating join"
		);
		self.register_alias(join)
	}

	fn unknown_field(&self, model: &Model, name: &str) -> ExpressionError {
		let mut choices = model.field_names();
		if std::ptr::eq(model, self.model.as_ref()) {
			choices.extend(self.annotations.keys().cloned());
			choices.sort();
		}
		ExpressionError::field(format!(
			"Cannot resolve keyword '{}' into field. Choices are: {}",
			name,
			choices.join(", ")
		))
	}

	/// Walk `parts`, joining through relations, and return the final column.
	fn setup_joins(&mut self, parts: &[&str], reuse: Option<&HashSet<String>>) -> Result<Col> {
		let mut model = Arc::clone(&self.model);
		let mut alias = self.model.table.clone();

		for (position, part) in parts.iter().enumerate() {
			let is_last = position + 1 == parts.len();
			if is_last {
				let column = model
					.get_field(part)
					.ok_or_else(|| self.unknown_field(&model, part))?;
				return Ok(Col::new(alias, column));
			}

			let Some(relation) = model.get_relation(part).cloned() else {
				if model.get_field(part).is_some() {
					return Err(ExpressionError::field(format!(
						"Cannot resolve keyword '{}' into field. Join on '{}' not permitted.",
						parts[position + 1],
						part
					)));
				}
				return Err(self.unknown_field(&model, part));
			};

			let next = parts[position + 1];
			let target_is_pk = position + 2 == parts.len()
				&& (next == relation.target.pk.name || next == "pk");
			if target_is_pk {
				// The key already lives on this side of the relation.
				return Ok(Col::new(
					alias,
					Column {
						name: relation.name.clone(),
						column: relation.column.clone(),
						field_type: key_type(&relation.target.pk.field_type),
					},
				));
			}

			alias = self.join(
				Join {
					table_name: relation.target.table.clone(),
					table_alias: String::new(),
					parent_alias: Some(alias),
					join_type: JoinType::Inner,
					join_cols: (relation.column.clone(), relation.target.pk.column.clone()),
					nullable: relation.nullable,
				},
				reuse,
			);
			model = Arc::clone(&relation.target);
		}

		Err(ExpressionError::field("Empty field reference"))
	}
}

impl QueryContext for Query {
	fn resolve_ref(
		&mut self,
		name: &str,
		allow_joins: bool,
		reuse: Option<&HashSet<String>>,
		summarize: bool,
	) -> Result<Expr> {
		if !allow_joins && name.contains(LOOKUP_SEP) {
			return Err(ExpressionError::field(
				"Joined field references are not permitted in this query",
			));
		}
		if let Some(annotation) = self.annotations.get(name) {
			if summarize {
				return Ok(Expr::new(Ref::new(name, annotation.clone())));
			}
			return Ok(annotation.clone());
		}
		let parts: Vec<&str> = name.split(LOOKUP_SEP).collect();
		let col = self.setup_joins(&parts, reuse)?;
		tracing::trace!(reference = %name, column = %col, "resolved reference");
		Ok(Expr::new(col))
	}

	fn is_unquoted_alias(&self, name: &str) -> bool {
		self.alias_map.contains_key(name) && !self.table_map.contains_key(name)
	}

	fn use_tz(&self) -> bool {
		self.use_tz
	}

	fn time_zone(&self) -> chrono_tz::Tz {
		self.time_zone
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn publisher() -> Model {
		Model::new("publisher").field("name", FieldType::CharField { max_length: 50 })
	}

	fn author() -> Model {
		Model::new("author")
			.field("name", FieldType::CharField { max_length: 100 })
			.foreign_key("publisher", publisher())
	}

	fn book() -> Model {
		Model::new("book")
			.field("title", FieldType::TextField)
			.field("pages", FieldType::IntegerField)
			.foreign_key("author", author())
			.nullable_foreign_key("editor", author())
	}

	fn col(expr: &Expr) -> &Col {
		expr.downcast_ref::<Col>().unwrap()
	}

	#[rstest]
	fn test_local_field() {
		let mut query = Query::new(book());
		let expr = query.resolve_ref("pages", true, None, false).unwrap();
		assert_eq!(col(&expr).alias(), "book");
		assert_eq!(col(&expr).target().column, "pages");
		assert_eq!(query.joins().count(), 0);
	}

	#[rstest]
	fn test_join_is_created_and_reused() {
		let mut query = Query::new(book());
		let first = query.resolve_ref("author__name", true, None, false).unwrap();
		let second = query.resolve_ref("author__name", true, None, false).unwrap();
		assert_eq!(col(&first).alias(), "author");
		assert_eq!(col(&second).alias(), "author");
		assert_eq!(query.joins().count(), 1);
	}

	#[rstest]
	fn test_second_join_to_same_table_gets_t_alias() {
		let mut query = Query::new(book());
		query.resolve_ref("author__name", true, None, false).unwrap();
		let editor = query.resolve_ref("editor__name", true, None, false).unwrap();
		assert_eq!(col(&editor).alias(), "T3");
		assert!(query.is_unquoted_alias("T3"));
		assert!(!query.is_unquoted_alias("author"));
	}

	#[rstest]
	fn test_reuse_set_restricts_join_reuse() {
		let mut query = Query::new(book());
		query.resolve_ref("author__name", true, None, false).unwrap();
		let reuse = HashSet::new();
		let expr = query.resolve_ref("author__name", true, Some(&reuse), false).unwrap();
		assert_eq!(col(&expr).alias(), "T3");
	}

	#[rstest]
	fn test_pk_through_relation_is_trimmed() {
		let mut query = Query::new(book());
		let expr = query.resolve_ref("author__id", true, None, false).unwrap();
		assert_eq!(col(&expr).alias(), "book");
		assert_eq!(col(&expr).target().column, "author_id");
		assert_eq!(query.joins().count(), 0);
	}

	#[rstest]
	fn test_two_hops() {
		let mut query = Query::new(book());
		let expr = query.resolve_ref("author__publisher__name", true, None, false).unwrap();
		assert_eq!(col(&expr).alias(), "publisher");
		assert_eq!(query.joins().count(), 2);
	}

	#[rstest]
	fn test_joins_not_allowed() {
		let mut query = Query::new(book());
		let err = query.resolve_ref("author__name", false, None, false).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Joined field references are not permitted in this query"
		);
	}

	#[rstest]
	fn test_unknown_field_lists_choices() {
		let mut query = Query::new(book());
		let err = query.resolve_ref("isbn", true, None, false).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Cannot resolve keyword 'isbn' into field. Choices are: author, editor, id, pages, title"
		);
	}

	#[rstest]
	fn test_join_through_plain_field() {
		let mut query = Query::new(book());
		let err = query.resolve_ref("title__foo", true, None, false).unwrap_err();
		assert!(err.to_string().contains("Join on 'title' not permitted"));
	}

	#[rstest]
	fn test_relation_resolves_to_key_column() {
		let mut query = Query::new(book());
		let expr = query.resolve_ref("author", true, None, false).unwrap();
		assert_eq!(col(&expr).target().column, "author_id");
		assert_eq!(expr.output_field().unwrap(), FieldType::IntegerField);
	}
}
