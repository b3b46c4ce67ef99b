use formula_model::{Axis, Point, Size};
use thiserror::Error;

/// Misuse of the [`Sheet`](crate::Sheet) API.
///
/// Problems inside formulas are never reported here; they surface as error values in cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("cell {point} is outside the {max} grid")]
    OutOfBounds { point: Point, max: Size },
    #[error("{} span of {count} starting at {start} does not fit the grid", axis_name(*.axis))]
    InvalidSpan { axis: Axis, start: u32, count: u32 },
    #[error("inserting {count} {} would push used cells off the grid", axis_plural(*.axis))]
    GridOverflow { axis: Axis, count: u32 },
    #[error("resume_recalc called without a matching suspend_recalc")]
    UnbalancedResume,
    #[error("invalid grid size {0}")]
    InvalidMaxSize(Size),
}

fn axis_name(axis: Axis) -> &'static str {
    match axis {
        Axis::Column => "column",
        Axis::Row => "row",
    }
}

fn axis_plural(axis: Axis) -> &'static str {
    match axis {
        Axis::Column => "columns",
        Axis::Row => "rows",
    }
}
