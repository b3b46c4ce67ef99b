//! Functions that map scalar arguments to one scalar, offset by offset.

use formula_model::{ErrorCode, Number, Scalar, Size};
use smallvec::SmallVec;

use crate::ast::traversal::TraversalEventOutcome;
use crate::eval::ExecutionContext;

use super::{FunctionKind, FunctionSpec, VAR_ARGS};

macro_rules! elementwise_spec {
    ($name:literal, $min:expr, $max:expr, $f:path) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: $min,
                max_args: $max,
                kind: FunctionKind::Elementwise($f),
            }
        }
    };
}

elementwise_spec!("NOT", 1, 1, not_fn);
elementwise_spec!("ABS", 1, 1, abs_fn);
elementwise_spec!("INT", 1, 1, int_fn);
elementwise_spec!("MOD", 2, 2, mod_fn);
elementwise_spec!("ROUND", 1, 2, round_fn);
elementwise_spec!("SIGN", 1, 1, sign_fn);
elementwise_spec!("LEN", 1, 1, len_fn);
elementwise_spec!("UPPER", 1, 1, upper_fn);
elementwise_spec!("LOWER", 1, 1, lower_fn);
elementwise_spec!("TRIM", 1, 1, trim_fn);
elementwise_spec!("ISBLANK", 1, 1, isblank_fn);
elementwise_spec!("ISERROR", 1, 1, iserror_fn);
elementwise_spec!("ISNUMBER", 1, 1, isnumber_fn);
elementwise_spec!("ISTEXT", 1, 1, istext_fn);
elementwise_spec!("ISLOGICAL", 1, 1, islogical_fn);
elementwise_spec!("CONCATENATE", 1, VAR_ARGS, concatenate_fn);

fn number_arg(args: &[Scalar], idx: usize) -> Result<Number, ErrorCode> {
    args.get(idx).map_or(Ok(Number::ZERO), Scalar::coerce_to_number)
}

fn text_arg(args: &[Scalar], idx: usize) -> Result<String, ErrorCode> {
    args.get(idx).map_or(Ok(String::new()), Scalar::coerce_to_text)
}

fn numeric(args: &[Scalar], f: impl FnOnce(f64) -> f64) -> Scalar {
    match number_arg(args, 0) {
        Ok(n) => Scalar::number(f(n.value())),
        Err(e) => Scalar::Error(e),
    }
}

fn textual(args: &[Scalar], f: impl FnOnce(&str) -> Scalar) -> Scalar {
    match text_arg(args, 0) {
        Ok(s) => f(&s),
        Err(e) => Scalar::Error(e),
    }
}

fn not_fn(args: &[Scalar]) -> Scalar {
    match args.first().map_or(Ok(false), Scalar::coerce_to_bool) {
        Ok(b) => Scalar::Bool(!b),
        Err(e) => Scalar::Error(e),
    }
}

fn abs_fn(args: &[Scalar]) -> Scalar {
    numeric(args, f64::abs)
}

fn int_fn(args: &[Scalar]) -> Scalar {
    numeric(args, f64::floor)
}

fn sign_fn(args: &[Scalar]) -> Scalar {
    numeric(args, |v| if v == 0.0 { 0.0 } else { v.signum() })
}

fn mod_fn(args: &[Scalar]) -> Scalar {
    let (n, d) = match (number_arg(args, 0), number_arg(args, 1)) {
        (Err(e), _) | (_, Err(e)) => return Scalar::Error(e),
        (Ok(n), Ok(d)) => (n.value(), d.value()),
    };
    if d == 0.0 {
        return Scalar::Error(ErrorCode::DivisionByZero);
    }
    // Result takes the sign of the divisor.
    Scalar::number(n - d * (n / d).floor())
}

fn round_fn(args: &[Scalar]) -> Scalar {
    let (n, digits) = match (number_arg(args, 0), number_arg(args, 1)) {
        (Err(e), _) | (_, Err(e)) => return Scalar::Error(e),
        (Ok(n), Ok(d)) => (n.value(), d.value().trunc()),
    };
    if !(-308.0..=308.0).contains(&digits) {
        return Scalar::Error(ErrorCode::NotANumber);
    }
    // f64::round is half away from zero.
    let digits = digits as i32;
    let rounded = if digits >= 0 {
        let scale = 10f64.powi(digits);
        (n * scale).round() / scale
    } else {
        let scale = 10f64.powi(-digits);
        (n / scale).round() * scale
    };
    Scalar::number(rounded)
}

fn len_fn(args: &[Scalar]) -> Scalar {
    textual(args, |s| Scalar::from(Number::from(s.chars().count() as u32)))
}

fn upper_fn(args: &[Scalar]) -> Scalar {
    textual(args, |s| Scalar::text(s.to_uppercase()))
}

fn lower_fn(args: &[Scalar]) -> Scalar {
    textual(args, |s| Scalar::text(s.to_lowercase()))
}

fn trim_fn(args: &[Scalar]) -> Scalar {
    textual(args, |s| {
        Scalar::text(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    })
}

fn isblank_fn(args: &[Scalar]) -> Scalar {
    Scalar::Bool(args.first().is_some_and(Scalar::is_blank))
}

fn iserror_fn(args: &[Scalar]) -> Scalar {
    Scalar::Bool(args.first().is_some_and(Scalar::is_error))
}

fn isnumber_fn(args: &[Scalar]) -> Scalar {
    Scalar::Bool(matches!(args.first(), Some(Scalar::Number(_))))
}

fn istext_fn(args: &[Scalar]) -> Scalar {
    Scalar::Bool(matches!(args.first(), Some(Scalar::Text(_))))
}

fn islogical_fn(args: &[Scalar]) -> Scalar {
    Scalar::Bool(matches!(args.first(), Some(Scalar::Bool(_))))
}

fn concatenate_fn(args: &[Scalar]) -> Scalar {
    let mut out = String::new();
    for arg in args {
        match arg.coerce_to_text() {
            Ok(s) => out.push_str(&s),
            Err(e) => return Scalar::Error(e),
        }
    }
    Scalar::Text(out)
}

/// Frame of an element-wise call: collects one scalar per argument at the current offset.
#[derive(Debug, Default)]
pub(crate) struct ElementwiseFrame {
    args: SmallVec<[Scalar; 4]>,
    extent: Size,
}

impl ElementwiseFrame {
    pub fn after_argument(&mut self, ctx: &mut ExecutionContext<'_>) -> TraversalEventOutcome {
        if !ctx.state.suppress_evaluation {
            let Some((value, _)) = ctx.generate_returned() else {
                return TraversalEventOutcome::Pause;
            };
            self.args.push(value);
        }
        self.extent.extend_to(ctx.state.returned_extent);
        TraversalEventOutcome::Continue
    }

    pub fn execute(&mut self, f: fn(&[Scalar]) -> Scalar, ctx: &mut ExecutionContext<'_>) {
        let value = if ctx.state.suppress_evaluation {
            Scalar::Blank
        } else {
            f(&self.args)
        };
        ctx.set_returned(value, self.extent);
    }
}
