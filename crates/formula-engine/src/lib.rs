#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Formula parsing, evaluation and recalculation for a single sheet.
//!
//! A formula is parsed once into an expression tree ([`ast::AstNode`]) plus a deduplicated
//! list of the references it uses ([`FormulaReferences`]). Evaluation and text
//! reconstruction both run over the tree with the resumable, non-recursive traversal in
//! [`ast::traversal`], so arbitrarily deep formulas never grow the native stack.
//!
//! [`Sheet`] owns the cells and keeps formula results consistent under edits:
//! - value, formula and spill-extension cells share one sparse grid
//! - a flipping generation flag marks formula cells stale; a pass re-evaluates them,
//!   reordering the formula list on demand when a cell depends on a stale one
//! - structural edits adjust every formula's references in one copy-on-write pass
//! - row heights, column widths and hidden flags follow the lines they belong to
//!
//! ```
//! use formula_engine::Sheet;
//! use formula_model::{Point, Scalar};
//!
//! let mut sheet = Sheet::new();
//! sheet.set_value_cell(Point::new(0, 0), 2.0).unwrap();
//! sheet.set_value_cell(Point::new(0, 1), 3.0).unwrap();
//! sheet.set_formula_cell(Point::new(0, 2), "=A1+A2").unwrap();
//! assert_eq!(sheet.get_value(Point::new(0, 2)), Scalar::number(5.0));
//! ```

pub mod ast;
pub mod eval;
pub mod functions;
pub mod parser;

mod cell;
mod config;
mod error;
mod formula;
mod formula_references;
mod grid;
mod lengths;
mod sheet;

pub use cell::FormulaId;
pub use config::SheetConfig;
pub use error::SheetError;
pub use formula::Formula;
pub use formula_references::FormulaReferences;
pub use lengths::{IntervalMap, LengthInfo};
pub use sheet::{FormulaInfo, RecalcStatus, Sheet};
