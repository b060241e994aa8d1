//! Search nodes resolved against a query and compiled to PostgreSQL

use rstest::{fixture, rstest};
use sqlweave_backends::{PostgresOperations, SqliteOperations};
use sqlweave_core::{FieldType, QueryValue};
use sqlweave_expressions::{Case, ExpressionError, F, IntoExpr, Model, Query, SqlCompiler, Value, When};
use sqlweave_search::{
	SearchQuery, SearchQueryCombinable, SearchRank, SearchVector, SearchVectorCombinable, SearchVectorExact,
	TrigramSimilarity, Weight, search_vector_type,
};

#[fixture]
fn entries() -> Query {
	Query::new(
		Model::new("entry")
			.field("headline", FieldType::CharField { max_length: 255 })
			.field("body", FieldType::TextField)
			.field("document", search_vector_type())
			.foreign_key("blog", Model::new("blog").field("tagline", FieldType::TextField)),
	)
}

fn compile(query: &Query, expr: &sqlweave_expressions::Expr) -> (String, Vec<QueryValue>) {
	let ops = PostgresOperations::new();
	let statement = SqlCompiler::new(&ops)
		.with_query(query)
		.compile_statement(expr)
		.unwrap();
	(statement.sql, statement.params)
}

// ============================================================================
// Documents
// ============================================================================

#[rstest]
fn test_weighted_document_across_a_join(mut entries: Query) {
	let document = SearchVector::new(vec![F::new("headline").into_expr()])
		.unwrap()
		.weight(Weight::A)
		.concat(
			SearchVector::new(vec![F::new("blog__tagline").into_expr()])
				.unwrap()
				.weight(Weight::B),
		)
		.unwrap()
		.into_expr();
	let document = entries.add_annotation("search", document, false).unwrap();

	let (sql, params) = compile(&entries, &document);
	assert_eq!(
		sql,
		"(setweight(to_tsvector(COALESCE(\"entry\".\"headline\", $1)), $2) || \
		 setweight(to_tsvector(COALESCE(\"blog\".\"tagline\", $3)), $4))"
	);
	assert_eq!(
		params,
		vec![
			QueryValue::from(""),
			QueryValue::from("A"),
			QueryValue::from(""),
			QueryValue::from("B")
		]
	);
	assert_eq!(entries.joins().count(), 1);
}

#[rstest]
fn test_config_from_a_column(mut entries: Query) {
	let document = SearchVector::new(vec![F::new("body").into_expr()])
		.unwrap()
		.config(F::new("blog__tagline"))
		.into_expr()
		.resolve(&mut entries)
		.unwrap();
	let (sql, params) = compile(&entries, &document);
	assert_eq!(
		sql,
		"to_tsvector(\"blog\".\"tagline\"::regconfig, COALESCE(\"entry\".\"body\", $1))"
	);
	assert_eq!(params.len(), 1);
}

// ============================================================================
// Matching and ranking
// ============================================================================

#[rstest]
fn test_match_inherits_document_config(mut entries: Query) {
	let document = SearchVector::new(vec![F::new("body").into_expr()])
		.unwrap()
		.config("english");
	let matched = SearchVectorExact::new(document, "cheeses")
		.into_expr()
		.resolve(&mut entries)
		.unwrap();

	let (sql, params) = compile(&entries, &matched);
	assert_eq!(
		sql,
		"to_tsvector($1::regconfig, COALESCE(\"entry\".\"body\", $2)) @@ plainto_tsquery($3::regconfig, $4) = true"
	);
	assert_eq!(params[2], QueryValue::from("english"));
	assert_eq!(params[3], QueryValue::from("cheeses"));
}

#[rstest]
fn test_match_as_case_condition(mut entries: Query) {
	let query = SearchQuery::new("cheese").or(SearchQuery::new("toast")).unwrap();
	let flagged = Case::new(
		vec![When::new(SearchVectorExact::new(F::new("document"), query), Value::new(1)).unwrap()],
		Some(Value::new(0).into_expr()),
	)
	.into_expr()
	.resolve(&mut entries)
	.unwrap();

	let (sql, _) = compile(&entries, &flagged);
	assert_eq!(
		sql,
		"CASE WHEN \"entry\".\"document\" @@ (plainto_tsquery($1) || plainto_tsquery($2)) = true \
		 THEN $3 ELSE $4 END"
	);
}

#[rstest]
fn test_weighted_rank_over_stored_document(mut entries: Query) {
	let rank = SearchRank::new(F::new("document"), !SearchQuery::new("toast"))
		.weights([0.1, 0.2, 0.4, 1.0])
		.into_expr();
	let rank = entries.add_annotation("rank", rank, false).unwrap();

	let (sql, params) = compile(&entries, &rank);
	assert_eq!(sql, "ts_rank($1, \"entry\".\"document\", !!(plainto_tsquery($2)))");
	assert_eq!(params.len(), 2);
	assert_eq!(rank.output_field().unwrap(), FieldType::FloatField);
}

#[rstest]
fn test_similarity_ordering(mut entries: Query) {
	let similarity = TrigramSimilarity::new(F::new("headline"), "Cheese shop")
		.into_expr()
		.desc()
		.resolve(&mut entries)
		.unwrap();
	let (sql, _) = compile(&entries, &similarity);
	assert_eq!(sql, "SIMILARITY(\"entry\".\"headline\", $1) DESC");
}

// ============================================================================
// Backends
// ============================================================================

#[rstest]
fn test_other_backends_are_rejected(mut entries: Query) {
	let document = SearchVector::new(vec![F::new("body").into_expr()])
		.unwrap()
		.into_expr()
		.resolve(&mut entries)
		.unwrap();
	let ops = SqliteOperations::new();
	let err = SqlCompiler::new(&ops).with_query(&entries).compile(&document).unwrap_err();
	assert!(matches!(err, ExpressionError::Backend(_)));
	assert!(err.to_string().contains("only supported on PostgreSQL"));
}
