//! Formula text to expression tree.
//!
//! [`parse`] drives a [`Builder`]: references are registered (and deduplicated) as they
//! are read, the finished tree is handed over with [`Builder::on_root_node`], and any
//! syntax error replaces the whole formula with a parse-error node. The parser keeps its
//! operator and operand stacks on the heap, so nesting depth is bounded by memory only.

use std::rc::Rc;

use ahash::AHashMap;

use formula_model::{
    AnyReference, AreaReference, Array, CellReference, ErrorCode, LineReference, Point,
    ReferenceType, ReferenceValue, Scalar, Size,
};

use crate::ast::{AstNode, BinaryOp, Operation, UnaryOp};
use crate::functions::{lookup_function, FunctionSpec};
use crate::{Formula, FormulaReferences};

mod lexer;

use lexer::{lex, Coord, Line, RefToken, Token};

/// Collects the pieces of one parsed formula.
#[derive(Debug)]
pub struct Builder {
    at: Point,
    max: Size,
    references: Vec<AnyReference>,
    index: AHashMap<AnyReference, usize>,
    root: Option<AstNode>,
}

impl Builder {
    pub fn new(at: Point, max: Size) -> Self {
        Self {
            at,
            max,
            references: Vec::new(),
            index: AHashMap::new(),
            root: None,
        }
    }

    /// The cell relative references are encoded against.
    #[inline]
    pub fn eval_point(&self) -> Point {
        self.at
    }

    #[inline]
    pub fn max_size(&self) -> Size {
        self.max
    }

    /// Registers `reference` and returns its index; equal references share one entry.
    pub fn add_reference(&mut self, reference: AnyReference) -> usize {
        *self.index.entry(reference).or_insert_with(|| {
            self.references.push(reference);
            self.references.len() - 1
        })
    }

    pub fn on_root_node(&mut self, node: AstNode) {
        self.root = Some(node);
    }

    /// Replaces the formula with a parse-error node that reproduces `text`.
    pub fn on_syntax_error(&mut self, text: &str) {
        self.references.clear();
        self.index.clear();
        self.root = Some(AstNode::parse_error(ErrorCode::InvalidFormula, text));
    }

    pub fn build(self) -> (Rc<Formula>, Rc<FormulaReferences>) {
        let root = self
            .root
            .unwrap_or_else(|| AstNode::parse_error(ErrorCode::InvalidFormula, ""));
        let formula = Formula::new(AstNode::function(Operation::Formula, std::iter::once(root)));
        (
            Rc::new(formula),
            Rc::new(FormulaReferences::new(self.references)),
        )
    }
}

/// Parses `text`, with or without a leading `=`, into `builder`.
pub fn parse(text: &str, builder: &mut Builder) {
    let body = text.strip_prefix('=').unwrap_or(text);
    match Parser::new(builder).run(body) {
        Ok(root) => builder.on_root_node(root),
        Err(SyntaxError) => {
            log::trace!("syntax error in formula {text:?}");
            builder.on_syntax_error(body);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyntaxError;

impl From<lexer::LexError> for SyntaxError {
    fn from(_: lexer::LexError) -> Self {
        SyntaxError
    }
}

enum Pending {
    Binary(BinaryOp),
    Prefix(UnaryOp),
    Paren,
    Call {
        spec: &'static FunctionSpec,
        args: usize,
    },
}

struct Parser<'b> {
    builder: &'b mut Builder,
    operands: Vec<AstNode>,
    pending: Vec<Pending>,
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Caret => BinaryOp::Pow,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Amp => BinaryOp::Concat,
        Token::Eq => BinaryOp::Eq,
        Token::Ne => BinaryOp::Ne,
        Token::Lt => BinaryOp::Lt,
        Token::Gt => BinaryOp::Gt,
        Token::Le => BinaryOp::Le,
        Token::Ge => BinaryOp::Ge,
        _ => return None,
    })
}

fn literal(token: Token) -> Option<Scalar> {
    Some(match token {
        Token::Number(n) => Scalar::Number(n),
        Token::Text(s) => Scalar::Text(s),
        Token::Bool(b) => Scalar::Bool(b),
        Token::Error(e) => Scalar::Error(e),
        _ => return None,
    })
}

impl<'b> Parser<'b> {
    fn new(builder: &'b mut Builder) -> Self {
        Self {
            builder,
            operands: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn run(mut self, body: &str) -> Result<AstNode, SyntaxError> {
        let mut tokens = lex(body, self.builder.max_size())?.into_iter().peekable();
        let mut expect_operand = true;
        while let Some(token) = tokens.next() {
            if expect_operand {
                match token {
                    Token::Minus => self.pending.push(Pending::Prefix(UnaryOp::Minus)),
                    Token::Plus => self.pending.push(Pending::Prefix(UnaryOp::Plus)),
                    Token::LParen => self.pending.push(Pending::Paren),
                    Token::Function(name) => {
                        let spec = lookup_function(&name).ok_or(SyntaxError)?;
                        if tokens.next() != Some(Token::LParen) {
                            return Err(SyntaxError);
                        }
                        if tokens.peek() == Some(&Token::RParen) {
                            tokens.next();
                            self.finish_call(spec, 0)?;
                            expect_operand = false;
                        } else {
                            self.pending.push(Pending::Call { spec, args: 0 });
                        }
                    }
                    Token::LBrace => {
                        let array = parse_array(&mut tokens)?;
                        self.operands.push(AstNode::array(array));
                        expect_operand = false;
                    }
                    Token::Reference(r) => {
                        let reference = self.reference(r);
                        let index = self.builder.add_reference(reference);
                        self.operands.push(AstNode::reference(index));
                        expect_operand = false;
                    }
                    other => {
                        let value = literal(other).ok_or(SyntaxError)?;
                        self.operands.push(AstNode::scalar(value));
                        expect_operand = false;
                    }
                }
                continue;
            }

            match token {
                Token::Percent => {
                    let operand = self.operands.pop().ok_or(SyntaxError)?;
                    self.operands.push(AstNode::function(
                        Operation::Unary(UnaryOp::Percent),
                        std::iter::once(operand),
                    ));
                }
                Token::RParen => match self.reduce_to_group()? {
                    Pending::Paren => {
                        let top = self.operands.last_mut().ok_or(SyntaxError)?;
                        top.set_bracketed(true);
                    }
                    Pending::Call { spec, args } => self.finish_call(spec, args + 1)?,
                    _ => unreachable!("reduce_to_group stops at a group"),
                },
                Token::Comma => match self.reduce_to_group()? {
                    Pending::Call { spec, args } => {
                        self.pending.push(Pending::Call {
                            spec,
                            args: args + 1,
                        });
                        expect_operand = true;
                    }
                    _ => return Err(SyntaxError),
                },
                other => {
                    let op = binary_op(&other).ok_or(SyntaxError)?;
                    while let Some(top) = self.pending.last() {
                        let binds_tighter = match top {
                            Pending::Prefix(_) => true,
                            Pending::Binary(prev) => prev.precedence() >= op.precedence(),
                            _ => false,
                        };
                        if !binds_tighter {
                            break;
                        }
                        self.reduce_top()?;
                    }
                    self.pending.push(Pending::Binary(op));
                    expect_operand = true;
                }
            }
        }

        if expect_operand {
            return Err(SyntaxError);
        }
        while !self.pending.is_empty() {
            if matches!(
                self.pending.last(),
                Some(Pending::Paren | Pending::Call { .. })
            ) {
                return Err(SyntaxError);
            }
            self.reduce_top()?;
        }
        match (self.operands.pop(), self.operands.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(SyntaxError),
        }
    }

    fn reference(&self, token: RefToken) -> AnyReference {
        let at = self.builder.eval_point();
        let value = |line: Line, at: u32| {
            let ty = if line.absolute {
                ReferenceType::Absolute
            } else {
                ReferenceType::Relative
            };
            ReferenceValue::new(ty, line.index, at)
        };
        let cell = |c: Coord| CellReference::new(value(c.x, at.x), value(c.y, at.y));
        match token {
            RefToken::Illegal => AnyReference::Illegal,
            RefToken::Cell(c) => AnyReference::Cell(cell(c)),
            RefToken::Area(a, b) => AnyReference::Area(AreaReference::new(cell(a), cell(b))),
            RefToken::Columns(a, b) => {
                AnyReference::Column(LineReference::new(value(a, at.x), value(b, at.x)))
            }
            RefToken::Rows(a, b) => {
                AnyReference::Row(LineReference::new(value(a, at.y), value(b, at.y)))
            }
        }
    }

    /// Reduces pending operators up to the innermost parenthesis or call and pops it.
    fn reduce_to_group(&mut self) -> Result<Pending, SyntaxError> {
        loop {
            match self.pending.last() {
                None => return Err(SyntaxError),
                Some(Pending::Paren | Pending::Call { .. }) => {
                    return self.pending.pop().ok_or(SyntaxError);
                }
                Some(_) => self.reduce_top()?,
            }
        }
    }

    fn reduce_top(&mut self) -> Result<(), SyntaxError> {
        let node = match self.pending.pop() {
            Some(Pending::Binary(op)) => {
                let rhs = self.operands.pop().ok_or(SyntaxError)?;
                let lhs = self.operands.pop().ok_or(SyntaxError)?;
                AstNode::function(Operation::Binary(op), [lhs, rhs].into_iter())
            }
            Some(Pending::Prefix(op)) => {
                let operand = self.operands.pop().ok_or(SyntaxError)?;
                AstNode::function(Operation::Unary(op), std::iter::once(operand))
            }
            _ => return Err(SyntaxError),
        };
        self.operands.push(node);
        Ok(())
    }

    fn finish_call(&mut self, spec: &'static FunctionSpec, args: usize) -> Result<(), SyntaxError> {
        // Skip counts in the evaluator are 16 bits wide.
        if !spec.accepts(args) || args > u16::MAX as usize || args > self.operands.len() {
            return Err(SyntaxError);
        }
        let first = self.operands.len() - args;
        let children: Vec<AstNode> = self.operands.drain(first..).collect();
        self.operands
            .push(AstNode::function(Operation::Call(spec), children.into_iter()));
        Ok(())
    }
}

/// `{1,2;3,4}` after the opening brace: constant scalars, `,` between columns and `;`
/// between rows.
fn parse_array(tokens: &mut impl Iterator<Item = Token>) -> Result<Array, SyntaxError> {
    let mut values = Vec::new();
    let mut width = None;
    let mut row_len = 0u32;
    let mut height = 0u32;
    loop {
        let value = match tokens.next().ok_or(SyntaxError)? {
            sign @ (Token::Minus | Token::Plus) => match tokens.next() {
                Some(Token::Number(n)) if sign == Token::Minus => Scalar::number(-n.value()),
                Some(Token::Number(n)) => Scalar::Number(n),
                _ => return Err(SyntaxError),
            },
            other => literal(other).ok_or(SyntaxError)?,
        };
        values.push(value);
        row_len += 1;
        match tokens.next().ok_or(SyntaxError)? {
            Token::Comma => {}
            end @ (Token::Semicolon | Token::RBrace) => {
                if *width.get_or_insert(row_len) != row_len {
                    return Err(SyntaxError);
                }
                height += 1;
                row_len = 0;
                if end == Token::RBrace {
                    break;
                }
            }
            _ => return Err(SyntaxError),
        }
    }
    let width = width.ok_or(SyntaxError)?;
    Array::new(Size::new(width, height), values).ok_or(SyntaxError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_model::MAX_GRID_SIZE;
    use pretty_assertions::assert_eq;

    fn round_trip(text: &str) -> String {
        let at = Point::new(2, 3);
        let (formula, refs) = Formula::parse(text, at, MAX_GRID_SIZE);
        formula.reconstruct_at(&refs, at, MAX_GRID_SIZE)
    }

    #[test]
    fn reconstruction_normalizes_spacing() {
        assert_eq!(round_trip("=1+2*3"), "1 + 2 * 3");
        assert_eq!(round_trip("=(1+2)*3"), "(1 + 2) * 3");
        assert_eq!(round_trip("=-A1^2"), "-A1 ^ 2");
        assert_eq!(round_trip("=sum( A1:B2 ,$C$3,4:5,C:$D)"), "SUM(A1:B2, $C$3, 4:5, C:$D)");
        assert_eq!(round_trip("=50%&\"x\"\"y\""), "50% & \"x\"\"y\"");
        assert_eq!(round_trip("={1,-2;\"a\",TRUE}"), "{1,-2;\"a\",TRUE}");
        assert_eq!(round_trip("=a1<>b1"), "A1 <> B1");
    }

    #[test]
    fn precedence_and_associativity() {
        let (formula, _) = Formula::parse("=1-2-3", Point::new(0, 0), MAX_GRID_SIZE);
        let root = formula.root().children().next().expect("expression");
        // (1-2)-3: the left operand is the nested subtraction.
        let lhs = root.children().next().expect("lhs");
        assert!(matches!(
            lhs.kind(),
            crate::ast::NodeKind::Function(Operation::Binary(BinaryOp::Sub))
        ));
    }

    #[test]
    fn references_are_deduplicated() {
        let at = Point::new(0, 0);
        let (_, refs) = Formula::parse("=A1+A1*B2+A1", at, MAX_GRID_SIZE);
        assert_eq!(refs.len(), 2);
        let (_, refs) = Formula::parse("=A1+$A$1", at, MAX_GRID_SIZE);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn syntax_errors_keep_the_text() {
        for text in [
            "=1+", "=SUM(", "=(1", "=1)", "=NOPE(1)", "=IF(1)", "={1,2;3}", "=A1 B1",
            "=\"open", "=SUM(,1)",
        ] {
            let at = Point::new(0, 0);
            let (formula, refs) = Formula::parse(text, at, MAX_GRID_SIZE);
            assert!(refs.is_empty(), "{text}");
            assert_eq!(formula.reconstruct_at(&refs, at, MAX_GRID_SIZE), &text[1..]);
        }
    }

    #[test]
    fn ref_error_literal_is_an_illegal_reference() {
        let at = Point::new(0, 0);
        let (formula, refs) = Formula::parse("=#REF!+1", at, MAX_GRID_SIZE);
        assert_eq!(refs.iter().collect::<Vec<_>>(), vec![&AnyReference::Illegal]);
        assert_eq!(formula.reconstruct_at(&refs, at, MAX_GRID_SIZE), "#REF! + 1");
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let depth = 50_000;
        let text = format!("={}1{}", "(1+".repeat(depth), ")".repeat(depth));
        let (formula, refs) = Formula::parse(&text, Point::new(0, 0), MAX_GRID_SIZE);
        assert_eq!(
            formula.reconstruct_at(&refs, Point::new(0, 0), MAX_GRID_SIZE),
            format!("{}1{}", "(1 + ".repeat(depth), ")".repeat(depth))
        );
    }
}
