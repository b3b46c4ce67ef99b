//! Functions that look at where their argument points rather than at its value:
//! `ROW`, `COLUMN` and `TRANSPOSE`.

use formula_model::{Array, Axis, ErrorCode, Point, Rect, Scalar, Size};

use crate::ast::traversal::TraversalEventOutcome;
use crate::eval::{ExecutionContext, ScalarGenerator};

use super::{FunctionKind, FunctionSpec};

inventory::submit! {
    FunctionSpec {
        name: "ROW",
        min_args: 0,
        max_args: 1,
        kind: FunctionKind::Position(Axis::Row),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "COLUMN",
        min_args: 0,
        max_args: 1,
        kind: FunctionKind::Position(Axis::Column),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "TRANSPOSE",
        min_args: 1,
        max_args: 1,
        kind: FunctionKind::Transpose,
    }
}

/// `ROW`/`COLUMN`: 1-based line numbers of the referenced area, or of the formula itself
/// when called without an argument. The referenced cells are never read.
#[derive(Debug)]
pub(crate) struct PositionFrame {
    axis: Axis,
    area: Option<Rect>,
    error: Option<ErrorCode>,
}

impl PositionFrame {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            area: None,
            error: None,
        }
    }

    pub fn after_argument(&mut self, ctx: &mut ExecutionContext<'_>) -> TraversalEventOutcome {
        let (at, extent) = (ctx.at(), ctx.state.returned_extent);
        match &ctx.state.returned_value {
            ScalarGenerator::Point(pt) => self.area = Some(Rect::single(*pt)),
            ScalarGenerator::Rect(rect) => self.area = Some(*rect),
            // Not a reference; a `#REF!` left behind by a deletion passes through.
            ScalarGenerator::Scalar(value) => {
                self.area = Some(Rect::new(at, extent));
                self.error = Some(value.as_error().unwrap_or(ErrorCode::InvalidValue));
            }
            ScalarGenerator::Array(_) => {
                self.area = Some(Rect::new(at, extent));
                self.error = Some(ErrorCode::InvalidValue);
            }
        }
        TraversalEventOutcome::Continue
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        let area = self.area.unwrap_or_else(|| Rect::single(ctx.at()));
        let extent = match self.axis {
            Axis::Row => Size::new(1, area.size.height),
            Axis::Column => Size::new(area.size.width, 1),
        };
        let value = if ctx.state.suppress_evaluation {
            Scalar::Blank
        } else if let Some(error) = self.error {
            Scalar::Error(error)
        } else {
            let line = self.axis.of_point(area.origin) as u64
                + self.axis.of_point(ctx.state.offset) as u64
                + 1;
            Scalar::number(line as f64)
        };
        ctx.set_returned(value, extent);
    }
}

/// `TRANSPOSE`: the argument is evaluated with the offset mirrored, so each result
/// position reads the argument's value across the diagonal.
#[derive(Debug, Default)]
pub(crate) struct TransposeFrame {
    value: Option<ScalarGenerator>,
    extent: Size,
    swapped: bool,
}

impl TransposeFrame {
    pub fn before_arguments(&mut self, ctx: &mut ExecutionContext<'_>) {
        if !self.swapped {
            mirror(&mut ctx.state.offset);
            self.swapped = true;
        }
    }

    pub fn after_argument(&mut self, ctx: &mut ExecutionContext<'_>) -> TraversalEventOutcome {
        let extent = ctx.state.returned_extent;
        self.extent = Size::new(extent.height, extent.width);
        if !ctx.state.suppress_evaluation {
            let offset = ctx.state.offset;
            let value: Option<ScalarGenerator> = match ctx.state.returned_value.clone() {
                ScalarGenerator::Scalar(value) => Some(value.into()),
                ScalarGenerator::Array(array) => Some(transposed(&array)),
                ScalarGenerator::Point(pt) => ctx.evaluate_cell(pt).map(ScalarGenerator::from),
                ScalarGenerator::Rect(rect) => match ctx.generate_point(rect, offset) {
                    Some(pt) => ctx.evaluate_cell(pt).map(ScalarGenerator::from),
                    None => Some(Scalar::Error(ErrorCode::InvalidArgs).into()),
                },
            };
            // The offset stays mirrored while paused; the same event fires again.
            let Some(value) = value else {
                return TraversalEventOutcome::Pause;
            };
            self.value = Some(value);
        }
        mirror(&mut ctx.state.offset);
        self.swapped = false;
        TraversalEventOutcome::Continue
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        let value = match self.value.take() {
            Some(value) if !ctx.state.suppress_evaluation => value,
            _ => Scalar::Blank.into(),
        };
        ctx.set_returned(value, self.extent);
    }
}

fn mirror(offset: &mut Point) {
    std::mem::swap(&mut offset.x, &mut offset.y);
}

fn transposed(array: &Array) -> ScalarGenerator {
    let size = array.size();
    let flipped = Size::new(size.height, size.width);
    let values = Rect::new(Point::default(), flipped)
        .points()
        .map(|pt| array.eval(Point::new(pt.y, pt.x)))
        .collect();
    match Array::new(flipped, values) {
        Some(array) => ScalarGenerator::Array(array),
        None => ScalarGenerator::Scalar(Scalar::Error(ErrorCode::InvalidArgs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transposed_arrays_swap_rows_and_columns() {
        let array = Array::new(
            Size::new(3, 1),
            vec![Scalar::from(1.0), Scalar::from(2.0), Scalar::from(3.0)],
        )
        .expect("array");
        let ScalarGenerator::Array(flipped) = transposed(&array) else {
            panic!("not an array");
        };
        assert_eq!(flipped.size(), Size::new(1, 3));
        assert_eq!(flipped.eval(Point::new(0, 2)), Scalar::from(3.0));
    }

    #[test]
    fn registered_arities() {
        let row = super::super::lookup_function("row").expect("ROW");
        assert!(row.accepts(0) && row.accepts(1) && !row.accepts(2));
        let transpose = super::super::lookup_function("TRANSPOSE").expect("TRANSPOSE");
        assert!(!transpose.accepts(0) && transpose.accepts(1));
    }
}
