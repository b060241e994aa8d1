//! # sqlweave-expressions
//!
//! Composable SQL expression trees. A tree is built from references ([`F`]),
//! literals ([`Value`]), arithmetic, functions, aggregates and conditions,
//! resolved against a [`Query`] (binding references to columns and adding
//! joins) and compiled by a [`SqlCompiler`] into parameterized SQL for one
//! backend.
//!
//! ```
//! use sqlweave_backends::PostgresOperations;
//! use sqlweave_core::FieldType;
//! use sqlweave_expressions::{F, IntoExpr, Model, Query, SqlCompiler, Sum};
//!
//! let mut query = Query::new(
//!     Model::new("item")
//!         .field("price", FieldType::IntegerField)
//!         .field("qty", FieldType::IntegerField),
//! );
//! let total = Sum::new(F::new("price") * F::new("qty"));
//! let resolved = query.add_annotation("total", total.into_expr(), false).unwrap();
//!
//! let ops = PostgresOperations::new();
//! let statement = SqlCompiler::new(&ops)
//!     .with_query(&query)
//!     .compile_statement(&resolved)
//!     .unwrap();
//! assert_eq!(statement.sql, "SUM((\"item\".\"price\" * \"item\".\"qty\"))");
//! ```

pub mod aggregates;
pub mod combinable;
pub mod combined;
pub mod compiler;
pub mod conditional;
pub mod datetime;
pub mod error;
pub mod expression;
pub mod func;
pub mod functions;
pub mod leaves;
pub mod lookups;
pub mod ordering;
pub mod q;
pub mod query;
pub mod reference;
pub mod where_node;

pub use aggregates::{Aggregate, Avg, Count, Max, Min, StdDev, Sum, Variance};
pub use combinable::{Combinable, IntoExpr};
pub use combined::{CombinedExpression, DurationExpression, TemporalSubtraction};
pub use compiler::SqlCompiler;
pub use conditional::{Case, When};
pub use datetime::{Date, DateTime};
pub use error::{ExpressionError, Result};
pub use expression::{Expr, Expression, ResolveOptions};
pub use func::Func;
pub use functions::{Cast, Coalesce, Greatest, Least, Length, Lower, Now, NullIf, Upper};
pub use leaves::{Col, DurationValue, ExpressionWrapper, Random, RawSql, Ref, Star, Value};
pub use lookups::{Lookup, LookupType, LookupValue};
pub use ordering::{NullsOrder, OrderBy};
pub use q::{Q, QChild};
pub use query::{Column, Join, JoinType, LOOKUP_SEP, Model, Query, QueryContext, Relation};
pub use reference::F;
pub use where_node::{QOperator, WhereNode};
