//! Arithmetic, concatenation and comparison operators.

use core::cmp::Ordering;

use formula_model::{Number, Scalar, Size};

use crate::ast::traversal::TraversalEventOutcome;
use crate::ast::{BinaryOp, UnaryOp};
use crate::eval::ExecutionContext;

/// Applies a binary operator to two evaluated operands.
///
/// Operands are coerced left to right, so an error on the left wins.
pub fn apply_binary(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> Scalar {
    match op {
        BinaryOp::Concat => match (lhs.coerce_to_text(), rhs.coerce_to_text()) {
            (Err(e), _) | (_, Err(e)) => Scalar::Error(e),
            (Ok(mut a), Ok(b)) => {
                a.push_str(&b);
                Scalar::Text(a)
            }
        },
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            match lhs.compare(rhs) {
                Err(e) => Scalar::Error(e),
                Ok(ord) => Scalar::Bool(match op {
                    BinaryOp::Eq => ord == Ordering::Equal,
                    BinaryOp::Ne => ord != Ordering::Equal,
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    BinaryOp::Le => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                }),
            }
        }
        BinaryOp::Pow | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Add | BinaryOp::Sub => {
            let (a, b) = match (lhs.coerce_to_number(), rhs.coerce_to_number()) {
                (Err(e), _) | (_, Err(e)) => return Scalar::Error(e),
                (Ok(a), Ok(b)) => (a, b),
            };
            let result = match op {
                BinaryOp::Pow => a.pow(b),
                BinaryOp::Mul => a.mul(b),
                BinaryOp::Div => a.div(b),
                BinaryOp::Add => a.add(b),
                _ => a.sub(b),
            };
            result.into()
        }
    }
}

pub fn apply_unary(op: UnaryOp, value: &Scalar) -> Scalar {
    let n = match value.coerce_to_number() {
        Ok(n) => n,
        Err(e) => return Scalar::Error(e),
    };
    match op {
        UnaryOp::Plus => Scalar::Number(n),
        UnaryOp::Minus => Scalar::number(-n.value()),
        UnaryOp::Percent => n.div(Number::from(100u32)).into(),
    }
}

/// Frame of a binary operator node. The result extent covers both operands.
#[derive(Debug, Default)]
pub(crate) struct BinaryFrame {
    lhs: Scalar,
    value: Scalar,
    extent: Size,
}

impl BinaryFrame {
    pub fn after_argument(
        &mut self,
        op: BinaryOp,
        index: usize,
        ctx: &mut ExecutionContext<'_>,
    ) -> TraversalEventOutcome {
        if !ctx.state.suppress_evaluation {
            let Some((operand, _)) = ctx.generate_returned() else {
                return TraversalEventOutcome::Pause;
            };
            if index == 0 {
                self.lhs = operand;
            } else {
                self.value = apply_binary(op, &self.lhs, &operand);
            }
        }
        if index == 0 {
            self.extent = ctx.state.returned_extent;
        } else {
            self.extent.extend_to(ctx.state.returned_extent);
        }
        TraversalEventOutcome::Continue
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        ctx.set_returned(std::mem::take(&mut self.value), self.extent);
    }
}

/// Frame of a prefix or postfix operator node. The operand's extent passes through.
#[derive(Debug, Default)]
pub(crate) struct UnaryFrame {
    value: Scalar,
}

impl UnaryFrame {
    pub fn after_argument(
        &mut self,
        op: UnaryOp,
        ctx: &mut ExecutionContext<'_>,
    ) -> TraversalEventOutcome {
        if !ctx.state.suppress_evaluation {
            let Some((operand, _)) = ctx.generate_returned() else {
                return TraversalEventOutcome::Pause;
            };
            self.value = apply_unary(op, &operand);
        }
        TraversalEventOutcome::Continue
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        ctx.state.returned_value = std::mem::take(&mut self.value).into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_model::ErrorCode;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> Scalar {
        Scalar::from(v)
    }

    #[test]
    fn arithmetic_coerces_operands() {
        assert_eq!(apply_binary(BinaryOp::Add, &n(1.0), &Scalar::text("2")), n(3.0));
        assert_eq!(apply_binary(BinaryOp::Mul, &Scalar::Bool(true), &Scalar::Blank), n(0.0));
        assert_eq!(apply_binary(BinaryOp::Pow, &n(2.0), &n(10.0)), n(1024.0));
        assert_eq!(
            apply_binary(BinaryOp::Div, &n(1.0), &n(0.0)),
            Scalar::Error(ErrorCode::DivisionByZero)
        );
        assert_eq!(
            apply_binary(BinaryOp::Sub, &Scalar::text("a"), &Scalar::Error(ErrorCode::Spill)),
            Scalar::Error(ErrorCode::InvalidValue)
        );
    }

    #[test]
    fn concatenation_renders_text() {
        assert_eq!(
            apply_binary(BinaryOp::Concat, &n(1.5), &Scalar::Bool(true)),
            Scalar::text("1.5TRUE")
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(apply_binary(BinaryOp::Lt, &n(1.0), &Scalar::text("0")), Scalar::Bool(true));
        assert_eq!(apply_binary(BinaryOp::Eq, &Scalar::Blank, &n(0.0)), Scalar::Bool(true));
        assert_eq!(
            apply_binary(BinaryOp::Ge, &Scalar::text("b"), &Scalar::text("A")),
            Scalar::Bool(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::Ne, &Scalar::Error(ErrorCode::NullRange), &n(0.0)),
            Scalar::Error(ErrorCode::NullRange)
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(apply_unary(UnaryOp::Minus, &Scalar::text("4")), n(-4.0));
        assert_eq!(apply_unary(UnaryOp::Percent, &n(50.0)), n(0.5));
        assert_eq!(
            apply_unary(UnaryOp::Plus, &Scalar::text("x")),
            Scalar::Error(ErrorCode::InvalidValue)
        );
    }
}
