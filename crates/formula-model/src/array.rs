use std::rc::Rc;

use crate::{ErrorCode, Point, Scalar, Size};

/// An immutable, shared, rectangular block of scalars stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Array(Rc<ArrayData>);

#[derive(Debug, PartialEq)]
struct ArrayData {
    size: Size,
    values: Box<[Scalar]>,
}

impl Array {
    /// Creates an array from row-major values.
    ///
    /// Returns `None` when the size is empty or does not match the number of values.
    pub fn new(size: Size, values: Vec<Scalar>) -> Option<Array> {
        if size.is_empty() || size.cell_count() != values.len() as u64 {
            return None;
        }
        Some(Array(Rc::new(ArrayData {
            size,
            values: values.into_boxed_slice(),
        })))
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.0.size
    }

    /// Value at `pt`; positions outside the array yield `#N/A`.
    pub fn eval(&self, pt: Point) -> Scalar {
        if !self.0.size.contains_offset(pt) {
            return Scalar::Error(ErrorCode::InvalidArgs);
        }
        let idx = pt.y as usize * self.0.size.width as usize + pt.x as usize;
        self.0.values[idx].clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
        self.0.values.iter()
    }

    /// Returns true if both handles share the same storage.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Renders the array as a literal: `{1,2;3,4}`.
    pub fn to_formula_literal(&self) -> String {
        let width = self.0.size.width as usize;
        let mut out = String::from("{");
        for (idx, value) in self.0.values.iter().enumerate() {
            if idx > 0 {
                out.push(if idx % width == 0 { ';' } else { ',' });
            }
            out.push_str(&value.to_formula_literal());
        }
        out.push('}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Array {
        Array::new(
            Size::new(2, 2),
            vec![
                Scalar::from(1.0),
                Scalar::from(2.0),
                Scalar::text("x"),
                Scalar::Bool(true),
            ],
        )
        .expect("valid array")
    }

    #[test]
    fn rejects_mismatched_sizes() {
        assert!(Array::new(Size::new(0, 1), vec![]).is_none());
        assert!(Array::new(Size::new(2, 1), vec![Scalar::Blank]).is_none());
    }

    #[test]
    fn out_of_bounds_is_na() {
        let arr = two_by_two();
        assert_eq!(arr.eval(Point::new(0, 1)), Scalar::text("x"));
        assert_eq!(arr.eval(Point::new(2, 0)), Scalar::Error(ErrorCode::InvalidArgs));
    }

    #[test]
    fn literal_text() {
        assert_eq!(two_by_two().to_formula_literal(), r#"{1,2;"x",TRUE}"#);
    }
}
