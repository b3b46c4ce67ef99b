use std::rc::Rc;

use formula_model::{Point, Size};

use crate::ast::{reconstruct, AstNode};
use crate::parser::{parse, Builder};
use crate::FormulaReferences;

/// A parsed formula: an expression tree rooted at a `Formula` operation node.
///
/// The tree refers to references by index only, so one tree can be shared by every cell
/// holding the same formula text relative to its own position.
#[derive(Debug)]
pub struct Formula {
    root: AstNode,
}

impl Formula {
    pub fn new(root: AstNode) -> Self {
        Self { root }
    }

    /// Parses `text` as typed into the cell at `at`. Syntax errors produce a formula that
    /// evaluates to `#ERROR!` and reconstructs to the original text.
    pub fn parse(text: &str, at: Point, max: Size) -> (Rc<Formula>, Rc<FormulaReferences>) {
        let mut builder = Builder::new(at, max);
        parse(text, &mut builder);
        builder.build()
    }

    #[inline]
    pub fn root(&self) -> &AstNode {
        &self.root
    }

    /// Formula text as it reads from `at`, without the leading `=`.
    pub fn reconstruct_at(&self, references: &FormulaReferences, at: Point, max: Size) -> String {
        reconstruct(&self.root, references, at, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_model::MAX_GRID_SIZE;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_tree_reads_differently_elsewhere() {
        let (formula, refs) = Formula::parse("=A1+$B$1", Point::new(2, 2), MAX_GRID_SIZE);
        assert_eq!(
            formula.reconstruct_at(&refs, Point::new(2, 2), MAX_GRID_SIZE),
            "A1 + $B$1"
        );
        assert_eq!(
            formula.reconstruct_at(&refs, Point::new(3, 5), MAX_GRID_SIZE),
            "B4 + $B$1"
        );
    }

    #[test]
    fn relative_reference_off_the_grid_reads_as_ref_error() {
        let (formula, refs) = Formula::parse("=A1", Point::new(1, 1), MAX_GRID_SIZE);
        assert_eq!(formula.reconstruct_at(&refs, Point::new(0, 0), MAX_GRID_SIZE), "#REF!");
    }
}
