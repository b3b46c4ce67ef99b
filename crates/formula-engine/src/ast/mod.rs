//! Expression tree.
//!
//! Nodes are stored first-child / next-sibling: every node owns its first child and its
//! next sibling, so an n-ary call is a chain of boxed siblings. Dropping, traversing and
//! building a tree are all iterative.

use core::fmt;

use formula_model::{Array, ErrorCode, Scalar};

use crate::functions::FunctionSpec;

mod reconstruct;
pub mod traversal;

pub use reconstruct::reconstruct;
use traversal::TreeNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Add,
    Sub,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    /// Binding strength; all binary operators are left-associative.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow => 5,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// Postfix `%`.
    Percent,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Percent => "%",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::Percent)
    }
}

/// What a function node computes from its children.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Root of every formula; one child. Owns the spill check.
    Formula,
    Binary(BinaryOp),
    Unary(UnaryOp),
    Call(&'static FunctionSpec),
}

#[derive(Debug)]
pub enum NodeKind {
    Scalar(Scalar),
    Array(Array),
    /// Index into the formula's [`FormulaReferences`](crate::FormulaReferences).
    Reference(usize),
    /// Stands in for a whole formula whose text failed to parse.
    ParseError { error: ErrorCode, text: String },
    Function(Operation),
}

pub struct AstNode {
    kind: NodeKind,
    bracketed: bool,
    first_child: Option<Box<AstNode>>,
    next_sibling: Option<Box<AstNode>>,
}

impl AstNode {
    fn leaf(kind: NodeKind) -> Self {
        Self {
            kind,
            bracketed: false,
            first_child: None,
            next_sibling: None,
        }
    }

    pub fn scalar(value: Scalar) -> Self {
        Self::leaf(NodeKind::Scalar(value))
    }

    pub fn array(value: Array) -> Self {
        Self::leaf(NodeKind::Array(value))
    }

    pub fn reference(index: usize) -> Self {
        Self::leaf(NodeKind::Reference(index))
    }

    pub fn parse_error(error: ErrorCode, text: impl Into<String>) -> Self {
        Self::leaf(NodeKind::ParseError {
            error,
            text: text.into(),
        })
    }

    /// Builds a function node over `children`, linking them as siblings in order.
    pub fn function(op: Operation, children: impl DoubleEndedIterator<Item = AstNode>) -> Self {
        let mut first: Option<Box<AstNode>> = None;
        for mut child in children.rev() {
            child.next_sibling = first;
            first = Some(Box::new(child));
        }
        Self {
            kind: NodeKind::Function(op),
            bracketed: false,
            first_child: first,
            next_sibling: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether the node was written inside parentheses. Only affects reconstruction.
    #[inline]
    pub fn is_bracketed(&self) -> bool {
        self.bracketed
    }

    pub fn set_bracketed(&mut self, bracketed: bool) {
        self.bracketed = bracketed;
    }

    pub fn children(&self) -> impl Iterator<Item = &AstNode> {
        std::iter::successors(self.first_child(), |node| node.next_sibling())
    }
}

impl TreeNode for AstNode {
    #[inline]
    fn first_child(&self) -> Option<&Self> {
        self.first_child.as_deref()
    }

    #[inline]
    fn next_sibling(&self) -> Option<&Self> {
        self.next_sibling.as_deref()
    }
}

impl Drop for AstNode {
    fn drop(&mut self) {
        let mut pending: Vec<Box<AstNode>> = Vec::new();
        pending.extend(self.first_child.take());
        pending.extend(self.next_sibling.take());
        while let Some(mut node) = pending.pop() {
            pending.extend(node.first_child.take());
            pending.extend(node.next_sibling.take());
        }
    }
}

impl fmt::Debug for AstNode {
    // Shallow: prints the child count, not the subtree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstNode")
            .field("kind", &self.kind)
            .field("bracketed", &self.bracketed)
            .field("children", &self.children().count())
            .finish()
    }
}
