//! `formula-model` defines the leaf value types of the calculation engine.
//!
//! Everything here is plain data with pure operations:
//! - scalar values and error codes ([`Scalar`], [`ErrorCode`], [`Number`], [`Array`])
//! - grid geometry and A1 naming ([`Point`], [`Size`], [`Rect`])
//! - relative/absolute references and their adjustment under structural edits

#![forbid(unsafe_code)]

mod address;
mod array;
mod error;
mod geometry;
mod number;
pub mod reference;
mod scalar;

pub use address::{column_index, column_name, row_index, A1ParseError, RangeParseError};
pub use array::Array;
pub use error::ErrorCode;
pub use geometry::{Point, Rect, Size, MAX_GRID_SIZE};
pub use number::Number;
pub use reference::{
    AnyReference, AreaReference, Axis, CellReference, LineReference, ReferenceType,
    ReferenceValue, Resolved,
};
pub use scalar::Scalar;
