//! `IF` and `CHOOSE`: the first argument selects which later argument is the result.
//!
//! Unselected arguments are still walked, with evaluation suppressed, so the result
//! extent covers every branch.

use formula_model::{ErrorCode, Scalar, Size};

use crate::ast::traversal::TraversalEventOutcome;
use crate::eval::{ExecutionContext, ScalarGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selector {
    If,
    Choose,
}

#[derive(Debug)]
pub(crate) struct BranchFrame {
    selector: Selector,
    outer_suppress: bool,
    /// 1-based index of the selected argument; 0 when none is.
    chosen: usize,
    value: ScalarGenerator,
    extent: Size,
}

impl BranchFrame {
    pub fn new(selector: Selector) -> Self {
        let value = match selector {
            // IF without an else branch.
            Selector::If => Scalar::Bool(false),
            Selector::Choose => Scalar::Error(ErrorCode::InvalidValue),
        };
        Self {
            selector,
            outer_suppress: false,
            chosen: 0,
            value: value.into(),
            extent: Size::ONE,
        }
    }

    pub fn before_arguments(&mut self, ctx: &mut ExecutionContext<'_>) {
        self.outer_suppress = ctx.state.suppress_evaluation;
    }

    pub fn after_argument(
        &mut self,
        index: usize,
        ctx: &mut ExecutionContext<'_>,
    ) -> TraversalEventOutcome {
        if index == 0 {
            if !self.outer_suppress {
                let Some((selector, _)) = ctx.generate_returned() else {
                    return TraversalEventOutcome::Pause;
                };
                match self.select(&selector) {
                    Ok(chosen) => self.chosen = chosen,
                    Err(e) => self.value = Scalar::Error(e).into(),
                }
                ctx.state.suppress_evaluation = self.chosen != 1;
            }
            self.extent = ctx.state.returned_extent;
        } else {
            if !self.outer_suppress {
                if index == self.chosen {
                    self.value = ctx.state.returned_value.clone();
                }
                ctx.state.suppress_evaluation = self.chosen != index + 1;
            }
            self.extent.extend_to(ctx.state.returned_extent);
        }
        TraversalEventOutcome::Continue
    }

    fn select(&self, selector: &Scalar) -> Result<usize, ErrorCode> {
        match self.selector {
            Selector::If => Ok(if selector.coerce_to_bool()? { 1 } else { 2 }),
            Selector::Choose => {
                let index = selector.coerce_to_number()?.value().trunc();
                if index >= 1.0 && index < u16::MAX as f64 {
                    Ok(index as usize)
                } else {
                    Err(ErrorCode::InvalidValue)
                }
            }
        }
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) {
        ctx.state.suppress_evaluation = self.outer_suppress;
        let value = ctx.singlify(std::mem::take(&mut self.value), self.extent);
        ctx.set_returned(value, self.extent);
    }
}
