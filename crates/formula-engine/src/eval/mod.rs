//! Formula execution.
//!
//! [`FormulaEvaluator`] runs the execution traversal over one formula at one offset of its
//! result at a time. Reads of cells that are not evaluated yet pause the traversal; the
//! caller evaluates the recorded dependencies and resumes or restarts.

mod context;
mod evaluator;

pub use context::{
    AggregateOutcome, CellLookup, CellSource, EvalState, ExecutionContext, ScalarGenerator,
};
pub use evaluator::{EvaluatorStorage, FormulaEvaluator};

#[cfg(test)]
pub(crate) use context::tests::TestCells;
