use formula_model::{Point, Size};

use super::traversal::{
    StackEntry, Traversal, TraversalEvent, TraversalEventOutcome, TraversalHandler,
};
use super::{AstNode, NodeKind, Operation};
use crate::FormulaReferences;

struct Reconstructor<'r> {
    references: &'r FormulaReferences,
    at: Point,
    max: Size,
    out: String,
}

impl<'t> TraversalHandler<'t, AstNode> for Reconstructor<'_> {
    type Frame = ();

    fn create_frame(&mut self, _node: &'t AstNode) {}

    fn handle(
        &mut self,
        event: TraversalEvent,
        entry: &mut StackEntry<'t, AstNode, ()>,
    ) -> TraversalEventOutcome {
        let node = entry.node();
        match event {
            TraversalEvent::Enter => {
                if node.is_bracketed() {
                    self.out.push('(');
                }
                match node.kind() {
                    NodeKind::Scalar(value) => self.out.push_str(&value.to_formula_literal()),
                    NodeKind::Array(value) => self.out.push_str(&value.to_formula_literal()),
                    NodeKind::Reference(idx) => match self.references.get(*idx) {
                        Some(reference) => self.out.push_str(&reference.to_a1(self.at, self.max)),
                        None => self.out.push_str("#REF!"),
                    },
                    NodeKind::ParseError { text, .. } => self.out.push_str(text),
                    NodeKind::Function(Operation::Call(spec)) => {
                        self.out.push_str(spec.name);
                        self.out.push('(');
                    }
                    NodeKind::Function(Operation::Unary(op)) if !op.is_postfix() => {
                        self.out.push_str(op.as_str());
                    }
                    NodeKind::Function(_) => {}
                }
            }
            TraversalEvent::BeforeChild if entry.child_index() > 0 => match node.kind() {
                NodeKind::Function(Operation::Call(_)) => self.out.push_str(", "),
                NodeKind::Function(Operation::Binary(op)) => {
                    self.out.push(' ');
                    self.out.push_str(op.as_str());
                    self.out.push(' ');
                }
                _ => {}
            },
            TraversalEvent::BeforeChild | TraversalEvent::AfterChild => {}
            TraversalEvent::Exit => {
                match node.kind() {
                    NodeKind::Function(Operation::Call(_)) => self.out.push(')'),
                    NodeKind::Function(Operation::Unary(op)) if op.is_postfix() => {
                        self.out.push_str(op.as_str());
                    }
                    _ => {}
                }
                if node.is_bracketed() {
                    self.out.push(')');
                }
            }
        }
        TraversalEventOutcome::Continue
    }
}

/// Formula text of the tree under `root` as seen from `at`, without a leading `=`.
///
/// Relative references render relative to `at`, so the same tree reads differently
/// from different cells.
pub fn reconstruct(root: &AstNode, references: &FormulaReferences, at: Point, max: Size) -> String {
    let mut handler = Reconstructor {
        references,
        at,
        max,
        out: String::new(),
    };
    let mut traversal = Traversal::new(root);
    traversal.traverse(&mut handler);
    handler.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};
    use crate::functions::lookup_function;
    use formula_model::{AnyReference, CellReference, Scalar, MAX_GRID_SIZE};
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<AstNode>) -> AstNode {
        let spec = lookup_function(name).expect("registered");
        AstNode::function(Operation::Call(spec), args.into_iter())
    }

    #[test]
    fn operators_and_calls() {
        let at = Point::new(1, 1);
        let refs = FormulaReferences::new(vec![
            AnyReference::Cell(CellReference::relative(Point::new(0, 0), at)),
            AnyReference::Cell(CellReference::absolute(Point::new(2, 4))),
        ]);
        let mut sum = AstNode::function(
            Operation::Binary(BinaryOp::Add),
            [AstNode::reference(0), AstNode::scalar(Scalar::from(2.0))].into_iter(),
        );
        sum.set_bracketed(true);
        let tree = call(
            "SUM",
            vec![
                sum,
                AstNode::function(
                    Operation::Unary(UnaryOp::Minus),
                    [AstNode::reference(1)].into_iter(),
                ),
                AstNode::function(
                    Operation::Unary(UnaryOp::Percent),
                    [AstNode::scalar(Scalar::text("a\"b"))].into_iter(),
                ),
            ],
        );
        assert_eq!(
            reconstruct(&tree, &refs, at, MAX_GRID_SIZE),
            "SUM((A1 + 2), -$C$5, \"a\"\"b\"%)"
        );
        // Relative references follow the evaluation point.
        assert_eq!(
            reconstruct(&tree, &refs, Point::new(2, 2), MAX_GRID_SIZE),
            "SUM((B2 + 2), -$C$5, \"a\"\"b\"%)"
        );
    }

    #[test]
    fn unresolvable_references_render_as_ref_errors() {
        let refs = FormulaReferences::new(vec![AnyReference::Illegal]);
        let tree = AstNode::function(
            Operation::Binary(BinaryOp::Mul),
            [AstNode::reference(0), AstNode::reference(5)].into_iter(),
        );
        assert_eq!(
            reconstruct(&tree, &refs, Point::new(0, 0), MAX_GRID_SIZE),
            "#REF! * #REF!"
        );
    }
}
