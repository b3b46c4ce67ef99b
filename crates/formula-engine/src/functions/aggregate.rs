//! Aggregating functions (`SUM`, `COUNT`, `AND`, `CONCAT`, ...).
//!
//! Values reach an aggregator two ways. *Direct* values are written as arguments and are
//! coerced, so `SUM("2")` is 2. *Indirect* values come from cells and arrays and are mostly
//! filtered by type, so a text cell inside `SUM(A1:A9)` is ignored.

use formula_model::{ErrorCode, Number, Point, Scalar, Size};

use crate::ast::traversal::TraversalEventOutcome;
use crate::eval::{AggregateOutcome, ExecutionContext, ScalarGenerator};

use super::{FunctionKind, FunctionSpec, VAR_ARGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Average,
    Count,
    CountA,
    Min,
    Max,
    And,
    Or,
    Xor,
    Concat,
}

macro_rules! aggregate_spec {
    ($name:literal, $kind:ident) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: 1,
                max_args: VAR_ARGS,
                kind: FunctionKind::Aggregate(AggregateKind::$kind),
            }
        }
    };
}

aggregate_spec!("SUM", Sum);
aggregate_spec!("AVERAGE", Average);
aggregate_spec!("COUNT", Count);
aggregate_spec!("COUNTA", CountA);
aggregate_spec!("MIN", Min);
aggregate_spec!("MAX", Max);
aggregate_spec!("AND", And);
aggregate_spec!("OR", Or);
aggregate_spec!("XOR", Xor);
aggregate_spec!("CONCAT", Concat);

/// Running state of one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    Sum(Number),
    Average { sum: Number, count: u32 },
    Count(u32),
    CountA(u32),
    Min(Option<Number>),
    Max(Option<Number>),
    And(Option<bool>),
    Or(Option<bool>),
    Xor(Option<bool>),
    Concat(String),
    /// An error stopped the aggregation; it is the result.
    Failed(ErrorCode),
}

impl Aggregator {
    pub fn new(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Sum => Aggregator::Sum(Number::ZERO),
            AggregateKind::Average => Aggregator::Average {
                sum: Number::ZERO,
                count: 0,
            },
            AggregateKind::Count => Aggregator::Count(0),
            AggregateKind::CountA => Aggregator::CountA(0),
            AggregateKind::Min => Aggregator::Min(None),
            AggregateKind::Max => Aggregator::Max(None),
            AggregateKind::And => Aggregator::And(None),
            AggregateKind::Or => Aggregator::Or(None),
            AggregateKind::Xor => Aggregator::Xor(None),
            AggregateKind::Concat => Aggregator::Concat(String::new()),
        }
    }

    /// Adds a value written as an argument. Returns false once the result is final.
    pub fn add_direct(&mut self, value: &Scalar) -> bool {
        match self {
            Aggregator::Sum(_)
            | Aggregator::Average { .. }
            | Aggregator::Min(_)
            | Aggregator::Max(_) => match value.coerce_to_number() {
                Ok(n) => self.add_number(n),
                Err(e) => self.fail(e),
            },
            Aggregator::Count(count) => {
                if value.coerce_to_number().is_ok() {
                    *count += 1;
                }
                true
            }
            _ => self.add_indirect(value),
        }
    }

    /// Adds a value read from a cell or an array element. Returns false once the result is
    /// final.
    pub fn add_indirect(&mut self, value: &Scalar) -> bool {
        if let Aggregator::CountA(count) = self {
            if !value.is_blank() {
                *count += 1;
            }
            return true;
        }
        if let Aggregator::Count(count) = self {
            if matches!(value, Scalar::Number(_)) {
                *count += 1;
            }
            return true;
        }
        if let Scalar::Error(e) = value {
            return self.fail(*e);
        }
        match self {
            Aggregator::Sum(_)
            | Aggregator::Average { .. }
            | Aggregator::Min(_)
            | Aggregator::Max(_) => match value {
                Scalar::Number(n) => self.add_number(*n),
                _ => true,
            },
            Aggregator::And(state) => {
                if let Some(b) = logical(value) {
                    *state = Some(state.map_or(b, |acc| acc && b));
                }
                true
            }
            Aggregator::Or(state) => {
                if let Some(b) = logical(value) {
                    *state = Some(state.map_or(b, |acc| acc || b));
                }
                true
            }
            Aggregator::Xor(state) => {
                if let Some(b) = logical(value) {
                    *state = Some(state.map_or(b, |acc| acc ^ b));
                }
                true
            }
            Aggregator::Concat(text) => {
                if let Ok(piece) = value.coerce_to_text() {
                    text.push_str(&piece);
                }
                true
            }
            Aggregator::Count(_) | Aggregator::CountA(_) | Aggregator::Failed(_) => true,
        }
    }

    fn add_number(&mut self, n: Number) -> bool {
        let next = match self {
            Aggregator::Sum(sum) => sum.add(n).map(|s| *sum = s),
            Aggregator::Average { sum, count } => sum.add(n).map(|s| {
                *sum = s;
                *count += 1;
            }),
            Aggregator::Min(min) => {
                *min = Some(min.map_or(n, |m| if n.value() < m.value() { n } else { m }));
                Ok(())
            }
            Aggregator::Max(max) => {
                *max = Some(max.map_or(n, |m| if n.value() > m.value() { n } else { m }));
                Ok(())
            }
            _ => Ok(()),
        };
        match next {
            Ok(()) => true,
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: ErrorCode) -> bool {
        *self = Aggregator::Failed(error);
        false
    }

    pub fn result(&self) -> Scalar {
        match self {
            Aggregator::Sum(sum) => Scalar::Number(*sum),
            Aggregator::Average { count: 0, .. } => Scalar::Error(ErrorCode::DivisionByZero),
            Aggregator::Average { sum, count } => sum.div(Number::from(*count)).into(),
            Aggregator::Count(n) | Aggregator::CountA(n) => Scalar::Number(Number::from(*n)),
            Aggregator::Min(m) | Aggregator::Max(m) => Scalar::Number(m.unwrap_or(Number::ZERO)),
            Aggregator::And(state) | Aggregator::Or(state) | Aggregator::Xor(state) => {
                state.map_or(Scalar::Error(ErrorCode::InvalidValue), Scalar::Bool)
            }
            Aggregator::Concat(text) => Scalar::Text(text.clone()),
            Aggregator::Failed(e) => Scalar::Error(*e),
        }
    }
}

/// Booleans and numbers take part in logical folds; everything else is skipped.
fn logical(value: &Scalar) -> Option<bool> {
    match value {
        Scalar::Bool(b) => Some(*b),
        Scalar::Number(n) => Some(n.value() != 0.0),
        _ => None,
    }
}

/// Evaluation frame of an aggregating call.
#[derive(Debug)]
pub(crate) struct AggregateFrame {
    aggregator: Aggregator,
    saved_offset: Point,
}

const SKIP_ALL: TraversalEventOutcome = TraversalEventOutcome::ContinueAndSkip(u16::MAX);

impl AggregateFrame {
    pub fn new(kind: AggregateKind) -> Self {
        Self {
            aggregator: Aggregator::new(kind),
            saved_offset: Point::default(),
        }
    }

    /// Arguments are walked from their own origin, whatever offset the call is at.
    pub fn before_arguments(&mut self, ctx: &mut ExecutionContext<'_>) {
        self.saved_offset = ctx.state.offset;
        ctx.state.offset = Point::default();
    }

    pub fn after_argument(&mut self, ctx: &mut ExecutionContext<'_>) -> TraversalEventOutcome {
        if ctx.state.suppress_evaluation {
            return SKIP_ALL;
        }
        let extent = ctx.state.returned_extent;
        match ctx.state.returned_value.clone() {
            ScalarGenerator::Scalar(value) => {
                if !self.aggregator.add_direct(&value) {
                    return SKIP_ALL;
                }
            }
            ScalarGenerator::Point(pt) => {
                let Some(value) = ctx.evaluate_cell(pt) else {
                    return TraversalEventOutcome::Pause;
                };
                if !self.aggregator.add_indirect(&value) {
                    return SKIP_ALL;
                }
            }
            ScalarGenerator::Array(array) => {
                if !array.iter().all(|v| self.aggregator.add_indirect(v)) {
                    return SKIP_ALL;
                }
                ctx.state.offset = Point::default();
                return TraversalEventOutcome::Continue;
            }
            ScalarGenerator::Rect(rect) => {
                let snapshot = self.aggregator.clone();
                let aggregator = &mut self.aggregator;
                let outcome = ctx.aggregate_rect(rect, &mut |v| aggregator.add_indirect(v));
                match outcome {
                    AggregateOutcome::Success => {}
                    AggregateOutcome::Aborted => return SKIP_ALL,
                    AggregateOutcome::HasDependencies => {
                        self.aggregator = snapshot;
                        return TraversalEventOutcome::Pause;
                    }
                }
                ctx.state.offset = Point::default();
                return TraversalEventOutcome::Continue;
            }
        }
        if ctx.increment_offset(extent) {
            TraversalEventOutcome::RepeatChild
        } else {
            ctx.state.offset = Point::default();
            TraversalEventOutcome::Continue
        }
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        ctx.state.offset = self.saved_offset;
        ctx.set_returned(self.aggregator.result(), Size::ONE);
    }
}
