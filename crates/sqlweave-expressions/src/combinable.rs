//! Operator overloading for building combined expressions
//!
//! `+ - * / %` on [`Expr`], [`F`] and the concrete node types produce a
//! [`CombinedExpression`]. Plain Rust values on either side become
//! [`Value`] leaves and `TimeDelta`s become [`DurationValue`]s. `&` and `|`
//! are reserved for [`crate::Q`]; bitwise SQL operators are spelled
//! [`Combinable::bitand`] and [`Combinable::bitor`].

use crate::aggregates::Aggregate;
use crate::combined::CombinedExpression;
use crate::conditional::Case;
use crate::expression::{Expr, Expression};
use crate::func::Func;
use crate::leaves::{Col, DurationValue, ExpressionWrapper, Random, RawSql, Value};
use crate::reference::F;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use sqlweave_core::{Connector, QueryValue};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use uuid::Uuid;

/// Conversion into an expression operand.
pub trait IntoExpr {
	fn into_expr(self) -> Expr;
}

impl<E: Expression + 'static> IntoExpr for E {
	fn into_expr(self) -> Expr {
		Expr::new(self)
	}
}

impl IntoExpr for Expr {
	fn into_expr(self) -> Expr {
		self
	}
}

impl IntoExpr for &Expr {
	fn into_expr(self) -> Expr {
		self.clone()
	}
}

impl IntoExpr for TimeDelta {
	fn into_expr(self) -> Expr {
		Expr::new(DurationValue::new(self))
	}
}

macro_rules! impl_into_expr_for_values {
	($($ty:ty),* $(,)?) => {
		$(
			impl IntoExpr for $ty {
				fn into_expr(self) -> Expr {
					Expr::new(Value::new(self))
				}
			}
		)*
	};
}

impl_into_expr_for_values!(
	bool,
	i32,
	i64,
	f64,
	&str,
	String,
	Decimal,
	NaiveDate,
	NaiveDateTime,
	DateTime<Utc>,
	NaiveTime,
	Uuid,
	QueryValue,
);

fn combine(lhs: Expr, connector: Connector, rhs: Expr) -> Expr {
	Expr::new(CombinedExpression::new(lhs, connector, rhs))
}

/// Combinators that have no Rust operator.
pub trait Combinable: IntoExpr + Sized {
	/// `self ^ rhs` (power).
	fn pow(self, rhs: impl IntoExpr) -> Expr {
		combine(self.into_expr(), Connector::Pow, rhs.into_expr())
	}

	fn bitand(self, rhs: impl IntoExpr) -> Expr {
		combine(self.into_expr(), Connector::BitAnd, rhs.into_expr())
	}

	fn bitor(self, rhs: impl IntoExpr) -> Expr {
		combine(self.into_expr(), Connector::BitOr, rhs.into_expr())
	}
}

macro_rules! impl_combinable {
	($($node:ty),* $(,)?) => {
		$(
			impl Combinable for $node {}

			impl<R: IntoExpr> Add<R> for $node {
				type Output = Expr;

				fn add(self, rhs: R) -> Expr {
					combine(self.into_expr(), Connector::Add, rhs.into_expr())
				}
			}

			impl<R: IntoExpr> Sub<R> for $node {
				type Output = Expr;

				fn sub(self, rhs: R) -> Expr {
					combine(self.into_expr(), Connector::Sub, rhs.into_expr())
				}
			}

			impl<R: IntoExpr> Mul<R> for $node {
				type Output = Expr;

				fn mul(self, rhs: R) -> Expr {
					combine(self.into_expr(), Connector::Mul, rhs.into_expr())
				}
			}

			impl<R: IntoExpr> Div<R> for $node {
				type Output = Expr;

				fn div(self, rhs: R) -> Expr {
					combine(self.into_expr(), Connector::Div, rhs.into_expr())
				}
			}

			impl<R: IntoExpr> Rem<R> for $node {
				type Output = Expr;

				fn rem(self, rhs: R) -> Expr {
					combine(self.into_expr(), Connector::Mod, rhs.into_expr())
				}
			}

			impl Neg for $node {
				type Output = Expr;

				fn neg(self) -> Expr {
					combine(self.into_expr(), Connector::Mul, Value::new(-1).into_expr())
				}
			}
		)*
	};
}

impl_combinable!(
	Expr,
	F,
	Value,
	DurationValue,
	RawSql,
	Random,
	Col,
	ExpressionWrapper,
	Func,
	Aggregate,
	Case,
	CombinedExpression,
);

// `2 * F("price")`: the value is the left operand.
macro_rules! impl_reversed_ops {
	($($lhs:ty),* $(,)?) => {
		$(
			impl_reversed_ops!(@node $lhs, Expr);
			impl_reversed_ops!(@node $lhs, F);
		)*
	};
	(@node $lhs:ty, $rhs:ty) => {
		impl Add<$rhs> for $lhs {
			type Output = Expr;

			fn add(self, rhs: $rhs) -> Expr {
				combine(self.into_expr(), Connector::Add, rhs.into_expr())
			}
		}

		impl Sub<$rhs> for $lhs {
			type Output = Expr;

			fn sub(self, rhs: $rhs) -> Expr {
				combine(self.into_expr(), Connector::Sub, rhs.into_expr())
			}
		}

		impl Mul<$rhs> for $lhs {
			type Output = Expr;

			fn mul(self, rhs: $rhs) -> Expr {
				combine(self.into_expr(), Connector::Mul, rhs.into_expr())
			}
		}

		impl Div<$rhs> for $lhs {
			type Output = Expr;

			fn div(self, rhs: $rhs) -> Expr {
				combine(self.into_expr(), Connector::Div, rhs.into_expr())
			}
		}

		impl Rem<$rhs> for $lhs {
			type Output = Expr;

			fn rem(self, rhs: $rhs) -> Expr {
				combine(self.into_expr(), Connector::Mod, rhs.into_expr())
			}
		}
	};
}

impl_reversed_ops!(i32, i64, f64, Decimal, TimeDelta);

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn combined(expr: &Expr) -> &CombinedExpression {
		expr.downcast_ref::<CombinedExpression>().unwrap()
	}

	#[rstest]
	fn test_values_wrap_plain_operands() {
		let expr = F::new("price") * 2;
		let node = combined(&expr);
		assert_eq!(node.connector(), Connector::Mul);
		assert!(node.lhs().is::<F>());
		assert!(node.rhs().is::<Value>());
	}

	#[rstest]
	fn test_reversed_operand_order() {
		let expr = 2 - F::new("price");
		let node = combined(&expr);
		assert_eq!(node.connector(), Connector::Sub);
		assert!(node.lhs().is::<Value>());
		assert!(node.rhs().is::<F>());
	}

	#[rstest]
	fn test_timedelta_becomes_duration_value() {
		let expr = F::new("start") + TimeDelta::days(1);
		assert!(combined(&expr).rhs().is::<DurationValue>());
		let expr = TimeDelta::hours(1) + F::new("start");
		assert!(combined(&expr).lhs().is::<DurationValue>());
	}

	#[rstest]
	#[case(F::new("flags").bitand(4), Connector::BitAnd)]
	#[case(F::new("flags").bitor(4), Connector::BitOr)]
	#[case(F::new("base").pow(2), Connector::Pow)]
	#[case(F::new("a") % 3, Connector::Mod)]
	fn test_named_combinators(#[case] expr: Expr, #[case] connector: Connector) {
		assert_eq!(combined(&expr).connector(), connector);
	}

	#[rstest]
	fn test_nested_combination_display() {
		let expr = (F::new("a") + F::new("b")) * F::new("c");
		assert_eq!(expr.to_string(), "F(a) + F(b) * F(c)");
	}

	#[rstest]
	fn test_negation_multiplies_by_minus_one() {
		let expr = -F::new("a");
		let node = combined(&expr);
		assert_eq!(node.connector(), Connector::Mul);
		assert_eq!(node.rhs().to_string(), "Value(-1)");
	}
}
