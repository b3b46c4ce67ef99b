use formula_model::{AnyReference, ErrorCode, Point, Rect, Resolved, Scalar, Size};
use smallvec::SmallVec;

use super::{CellSource, EvalState, ExecutionContext, ScalarGenerator};
use crate::ast::traversal::{
    StackEntry, Traversal, TraversalEvent, TraversalEventOutcome, TraversalHandler,
    TraversalResult, TraversalStorage,
};
use crate::ast::{AstNode, BinaryOp, NodeKind, Operation, UnaryOp};
use crate::functions::aggregate::AggregateFrame;
use crate::functions::branch::{BranchFrame, Selector};
use crate::functions::elementwise::ElementwiseFrame;
use crate::functions::operators::{BinaryFrame, UnaryFrame};
use crate::functions::position::{PositionFrame, TransposeFrame};
use crate::functions::{ElementwiseFn, FunctionKind};
use crate::{Formula, FormulaId, FormulaReferences};

/// Per-node evaluation state kept on the traversal stack.
#[derive(Debug)]
pub(crate) enum Frame {
    Leaf,
    Formula,
    Binary(BinaryOp, BinaryFrame),
    Unary(UnaryOp, UnaryFrame),
    Aggregate(AggregateFrame),
    Branch(BranchFrame),
    Elementwise(ElementwiseFn, ElementwiseFrame),
    Position(PositionFrame),
    Transpose(TransposeFrame),
}

impl Frame {
    fn for_node(node: &AstNode) -> Self {
        let NodeKind::Function(op) = node.kind() else {
            return Frame::Leaf;
        };
        match *op {
            Operation::Formula => Frame::Formula,
            Operation::Binary(op) => Frame::Binary(op, BinaryFrame::default()),
            Operation::Unary(op) => Frame::Unary(op, UnaryFrame::default()),
            Operation::Call(spec) => match spec.kind {
                FunctionKind::Aggregate(kind) => Frame::Aggregate(AggregateFrame::new(kind)),
                FunctionKind::If => Frame::Branch(BranchFrame::new(Selector::If)),
                FunctionKind::Choose => Frame::Branch(BranchFrame::new(Selector::Choose)),
                FunctionKind::Elementwise(f) => Frame::Elementwise(f, ElementwiseFrame::default()),
                FunctionKind::Position(axis) => Frame::Position(PositionFrame::new(axis)),
                FunctionKind::Transpose => Frame::Transpose(TransposeFrame::default()),
            },
        }
    }
}

struct Executor<'c, 'a> {
    ctx: &'c mut ExecutionContext<'a>,
}

impl<'t> TraversalHandler<'t, AstNode> for Executor<'_, '_> {
    type Frame = Frame;

    fn create_frame(&mut self, node: &'t AstNode) -> Frame {
        Frame::for_node(node)
    }

    fn handle(
        &mut self,
        event: TraversalEvent,
        entry: &mut StackEntry<'t, AstNode, Frame>,
    ) -> TraversalEventOutcome {
        let ctx = &mut *self.ctx;
        let node = entry.node();
        let index = entry.child_index();
        match event {
            TraversalEvent::Enter => TraversalEventOutcome::Continue,
            TraversalEvent::BeforeChild => {
                if index == 0 {
                    match &mut entry.frame {
                        Frame::Aggregate(frame) => frame.before_arguments(ctx),
                        Frame::Branch(frame) => frame.before_arguments(ctx),
                        Frame::Transpose(frame) => frame.before_arguments(ctx),
                        _ => {}
                    }
                }
                TraversalEventOutcome::Continue
            }
            TraversalEvent::AfterChild => match &mut entry.frame {
                Frame::Binary(op, frame) => frame.after_argument(*op, index, ctx),
                Frame::Unary(op, frame) => frame.after_argument(*op, ctx),
                Frame::Aggregate(frame) => frame.after_argument(ctx),
                Frame::Branch(frame) => frame.after_argument(index, ctx),
                Frame::Elementwise(_, frame) => frame.after_argument(ctx),
                Frame::Position(frame) => frame.after_argument(ctx),
                Frame::Transpose(frame) => frame.after_argument(ctx),
                Frame::Formula | Frame::Leaf => TraversalEventOutcome::Continue,
            },
            TraversalEvent::Exit => {
                match &mut entry.frame {
                    Frame::Leaf => exit_leaf(node, ctx),
                    Frame::Formula => exit_formula(ctx),
                    Frame::Binary(_, frame) => frame.execute(ctx),
                    Frame::Unary(_, frame) => frame.execute(ctx),
                    Frame::Aggregate(frame) => frame.execute(ctx),
                    Frame::Branch(frame) => frame.execute(ctx),
                    Frame::Elementwise(f, frame) => frame.execute(*f, ctx),
                    Frame::Position(frame) => frame.execute(ctx),
                    Frame::Transpose(frame) => frame.execute(ctx),
                }
                TraversalEventOutcome::Continue
            }
        }
    }
}

fn exit_leaf(node: &AstNode, ctx: &mut ExecutionContext<'_>) {
    match node.kind() {
        NodeKind::Scalar(value) => ctx.set_returned(value.clone(), Size::ONE),
        NodeKind::Array(array) => {
            ctx.set_returned(ScalarGenerator::Array(array.clone()), array.size());
        }
        NodeKind::Reference(index) => exit_reference(*index, ctx),
        NodeKind::ParseError { error, .. } => ctx.set_returned(Scalar::Error(*error), Size::ONE),
        NodeKind::Function(_) => unreachable!("function nodes have their own frames"),
    }
}

fn exit_reference(index: usize, ctx: &mut ExecutionContext<'_>) {
    let reference = *ctx.reference(index);
    match reference.dereference(ctx.at(), ctx.max_size()) {
        None => ctx.set_returned(Scalar::Error(ErrorCode::InvalidReference), Size::ONE),
        Some(Resolved::Cell(pt)) => ctx.set_returned(ScalarGenerator::Point(pt), Size::ONE),
        Some(Resolved::Range(mut rect)) => {
            // Whole columns and rows only reach as far as the cells in use.
            let used = ctx.used_size();
            match reference {
                AnyReference::Column(_) => rect.size.height = used.height.max(1),
                AnyReference::Row(_) => rect.size.width = used.width.max(1),
                _ => {}
            }
            ctx.set_returned(ScalarGenerator::Rect(rect), rect.size);
        }
    }
}

/// The root decides how far the result spills.
fn exit_formula(ctx: &mut ExecutionContext<'_>) {
    let at = ctx.at();
    let mut extent = ctx.state.returned_extent.clamped_at(at, ctx.max_size());
    if extent.is_empty() {
        extent = Size::ONE;
    }
    if ctx.state.offset == Point::default()
        && !extent.is_single()
        && ctx.is_spill_blocked(Rect::new(at, extent))
    {
        ctx.set_returned(Scalar::Error(ErrorCode::Spill), Size::ONE);
    } else {
        ctx.state.returned_extent = extent;
    }
}

/// Traversal stack kept between evaluations so that a recalculation pass allocates it once.
#[derive(Debug, Default)]
pub struct EvaluatorStorage(TraversalStorage<AstNode, Frame>);

impl EvaluatorStorage {
    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

/// Evaluates one formula, one result offset at a time.
///
/// [`eval`](Self::eval) returns false when the formula reads cells that must be evaluated
/// first; [`take_dependencies`](Self::take_dependencies) lists them. Calling `eval` again
/// resumes where it stopped.
pub struct FormulaEvaluator<'f> {
    traversal: Traversal<'f, AstNode, Frame>,
    references: &'f FormulaReferences,
    at: Point,
    state: EvalState,
    extent: Size,
    traversed: bool,
    /// The root returned a generator covering the whole extent, so later offsets read
    /// from it instead of re-running the tree.
    full_result: bool,
    value: Option<Scalar>,
}

impl<'f> FormulaEvaluator<'f> {
    pub fn new(formula: &'f Formula, references: &'f FormulaReferences, at: Point) -> Self {
        Self::with_storage(formula, references, at, EvaluatorStorage::default())
    }

    /// Like [`new`](Self::new), reusing the stack of an earlier evaluator.
    pub fn with_storage(
        formula: &'f Formula,
        references: &'f FormulaReferences,
        at: Point,
        storage: EvaluatorStorage,
    ) -> Self {
        Self {
            traversal: Traversal::with_storage(formula.root(), storage.0),
            references,
            at,
            state: EvalState::default(),
            extent: Size::ONE,
            traversed: false,
            full_result: false,
            value: None,
        }
    }

    /// Computes the value at the current offset. Returns true when a value is available
    /// or a circular dependency was found.
    pub fn eval(&mut self, cells: &dyn CellSource) -> bool {
        let mut ctx = ExecutionContext::new(&mut self.state, cells, self.references, self.at);
        if !self.traversed {
            let mut executor = Executor { ctx: &mut ctx };
            if self.traversal.traverse(&mut executor) == TraversalResult::Paused {
                return ctx.state.circular_dependency;
            }
            self.traversed = true;
            if ctx.state.offset == Point::default() {
                self.extent = ctx.state.returned_extent;
                self.full_result = !matches!(ctx.state.returned_value, ScalarGenerator::Scalar(_))
                    && !self.extent.is_single();
            }
        }
        match ctx.generate_returned() {
            Some((value, _)) => {
                self.value = Some(value);
                true
            }
            None => ctx.state.circular_dependency,
        }
    }

    /// Moves to the next offset of the result. Returns false after the last one.
    pub fn next_offset(&mut self) -> bool {
        if !self.state.increment_offset(self.extent) {
            return false;
        }
        self.value = None;
        if !self.full_result {
            self.traversal.reset();
            self.traversed = false;
        }
        true
    }

    #[inline]
    pub fn is_circular(&self) -> bool {
        self.state.circular_dependency
    }

    #[inline]
    pub fn offset(&self) -> Point {
        self.state.offset
    }

    /// Size of the result, known once offset 0 has been evaluated.
    #[inline]
    pub fn extent(&self) -> Size {
        self.extent
    }

    pub fn take_value(&mut self) -> Option<Scalar> {
        self.value.take()
    }

    /// Formulas whose cells were read before they were evaluated.
    pub fn take_dependencies(&mut self) -> SmallVec<[FormulaId; 4]> {
        std::mem::take(&mut self.state.dependencies)
    }

    pub fn into_storage(self) -> EvaluatorStorage {
        EvaluatorStorage(self.traversal.into_storage())
    }
}
