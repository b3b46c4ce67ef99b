//! Relative/absolute references and their adjustment under structural edits.
//!
//! A reference component is either **absolute** (a fixed 0-based index) or **relative**
//! (a signed offset from the cell that evaluates it). Every adjustment here is a pure
//! function: it returns a new value and never mutates shared state.

use serde::{Deserialize, Serialize};

use crate::address::column_name;
use crate::{Point, Rect, Size};

/// Grid axis a component or edit applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal: columns, `x`.
    Column,
    /// Vertical: rows, `y`.
    Row,
}

impl Axis {
    #[inline]
    pub const fn of_point(self, pt: Point) -> u32 {
        match self {
            Axis::Column => pt.x,
            Axis::Row => pt.y,
        }
    }

    #[inline]
    pub const fn of_size(self, size: Size) -> u32 {
        match self {
            Axis::Column => size.width,
            Axis::Row => size.height,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    Relative,
    Absolute,
}

/// A single coordinate component of a reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceValue {
    /// Signed offset from the evaluation point.
    Relative(i32),
    /// Fixed 0-based index.
    Absolute(u32),
}

fn clamp_offset(offset: i64) -> i32 {
    i32::try_from(offset).unwrap_or(if offset < 0 { i32::MIN } else { i32::MAX })
}

impl ReferenceValue {
    /// Encodes `target` as seen from `at`.
    #[must_use]
    pub fn new(ty: ReferenceType, target: u32, at: u32) -> Self {
        match ty {
            ReferenceType::Absolute => ReferenceValue::Absolute(target),
            ReferenceType::Relative => {
                ReferenceValue::Relative(clamp_offset(target as i64 - at as i64))
            }
        }
    }

    #[inline]
    pub const fn reference_type(self) -> ReferenceType {
        match self {
            ReferenceValue::Relative(_) => ReferenceType::Relative,
            ReferenceValue::Absolute(_) => ReferenceType::Absolute,
        }
    }

    #[inline]
    pub const fn is_absolute(self) -> bool {
        matches!(self, ReferenceValue::Absolute(_))
    }

    /// Unchecked target coordinate; may be negative or beyond the grid for relative values.
    #[inline]
    pub const fn target(self, at: u32) -> i64 {
        match self {
            ReferenceValue::Relative(dist) => at as i64 + dist as i64,
            ReferenceValue::Absolute(pos) => pos as i64,
        }
    }

    /// Returns true if the component resolves inside `[0, max)` when evaluated at `at`.
    pub fn is_dereferencable(self, at: u32, max: u32) -> bool {
        match self {
            ReferenceValue::Absolute(_) => true,
            ReferenceValue::Relative(dist) => {
                if dist < 0 {
                    at as i64 >= -(dist as i64)
                } else {
                    (max as i64 - dist as i64) > at as i64
                }
            }
        }
    }

    pub fn dereference(self, at: u32, max: u32) -> Option<u32> {
        if !self.is_dereferencable(at, max) {
            return None;
        }
        u32::try_from(self.target(at)).ok()
    }

    /// Keeps the target fixed while the referencing cell moves by `dist`.
    #[must_use]
    pub fn adjusted_to_move(self, dist: i64) -> Self {
        match self {
            ReferenceValue::Absolute(_) => self,
            ReferenceValue::Relative(d) => ReferenceValue::Relative(clamp_offset(d as i64 - dist)),
        }
    }

    /// Adjusts for removal of `size` lines starting at `from`, seen from the referencing
    /// cell's pre-edit position `at`.
    ///
    /// A target inside the removed span collapses onto `from`; callers that need to treat
    /// that as invalid check the target first.
    #[must_use]
    pub fn adjusted_to_erasure(self, at: u32, from: u32, size: u32) -> Self {
        let (at, from, size) = (at as i64, from as i64, size as i64);
        match self {
            ReferenceValue::Absolute(pos) => {
                let pos = pos as i64;
                if pos >= from {
                    ReferenceValue::Absolute((pos - (pos - from).min(size)) as u32)
                } else {
                    self
                }
            }
            ReferenceValue::Relative(d) => {
                let dist = d as i64;
                let pos = at + dist;
                if at < from && pos >= from {
                    ReferenceValue::Relative(clamp_offset(dist - (pos - from).min(size)))
                } else if at >= from + size && pos < from + size {
                    ReferenceValue::Relative(clamp_offset(dist + (from + size - pos).min(size)))
                } else {
                    self
                }
            }
        }
    }

    /// Adjusts for insertion of `size` lines before `before`, seen from the referencing
    /// cell's pre-edit position `at`.
    ///
    /// Returns `None` if the target would be pushed past `max`.
    #[must_use]
    pub fn adjusted_to_insertion(self, at: u32, before: u32, size: u32, max: u32) -> Option<Self> {
        let (at, before, size, max) = (at as i64, before as i64, size as i64, max as i64);
        match self {
            ReferenceValue::Absolute(pos) => {
                let pos = pos as i64;
                if pos < before {
                    return Some(self);
                }
                if pos >= max - size {
                    return None;
                }
                Some(ReferenceValue::Absolute((pos + size) as u32))
            }
            ReferenceValue::Relative(d) => {
                let dist = d as i64;
                let pos = at + dist;
                if at < before && pos >= before {
                    if pos >= max - size {
                        return None;
                    }
                    Some(ReferenceValue::Relative(clamp_offset(dist + size)))
                } else if at >= before && pos < before {
                    Some(ReferenceValue::Relative(clamp_offset(dist - size)))
                } else {
                    Some(self)
                }
            }
        }
    }

    fn dollar(self) -> &'static str {
        if self.is_absolute() {
            "$"
        } else {
            ""
        }
    }
}

/// Reference to a single cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellReference {
    pub x: ReferenceValue,
    pub y: ReferenceValue,
}

impl CellReference {
    #[must_use]
    pub const fn new(x: ReferenceValue, y: ReferenceValue) -> Self {
        Self { x, y }
    }

    /// Relative reference to `target` as seen from `at`.
    #[must_use]
    pub fn relative(target: Point, at: Point) -> Self {
        Self::new(
            ReferenceValue::new(ReferenceType::Relative, target.x, at.x),
            ReferenceValue::new(ReferenceType::Relative, target.y, at.y),
        )
    }

    /// Absolute reference to `target`.
    #[must_use]
    pub const fn absolute(target: Point) -> Self {
        Self::new(
            ReferenceValue::Absolute(target.x),
            ReferenceValue::Absolute(target.y),
        )
    }

    fn component(&self, axis: Axis) -> ReferenceValue {
        match axis {
            Axis::Column => self.x,
            Axis::Row => self.y,
        }
    }

    fn with_component(mut self, axis: Axis, value: ReferenceValue) -> Self {
        match axis {
            Axis::Column => self.x = value,
            Axis::Row => self.y = value,
        }
        self
    }

    pub fn is_dereferencable(&self, at: Point, max: Size) -> bool {
        self.x.is_dereferencable(at.x, max.width) && self.y.is_dereferencable(at.y, max.height)
    }

    pub fn dereference(&self, at: Point, max: Size) -> Option<Point> {
        Some(Point::new(
            self.x.dereference(at.x, max.width)?,
            self.y.dereference(at.y, max.height)?,
        ))
    }

    fn adjusted_to_move(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x.adjusted_to_move(dx), self.y.adjusted_to_move(dy))
    }

    fn write_a1(&self, at: Point, max: Size, out: &mut String) -> bool {
        let Some(pt) = self.dereference(at, max) else {
            return false;
        };
        out.push_str(self.x.dollar());
        out.push_str(&column_name(pt.x));
        out.push_str(self.y.dollar());
        out.push_str(&(pt.y as u64 + 1).to_string());
        true
    }
}

/// Reference to a rectangle given by two corners, in the order they were written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaReference {
    pub start: CellReference,
    pub end: CellReference,
}

impl AreaReference {
    #[must_use]
    pub const fn new(start: CellReference, end: CellReference) -> Self {
        Self { start, end }
    }

    pub fn is_dereferencable(&self, at: Point, max: Size) -> bool {
        self.start.is_dereferencable(at, max) && self.end.is_dereferencable(at, max)
    }

    /// Resolves to a top-left anchored rectangle regardless of corner order.
    pub fn dereference(&self, at: Point, max: Size) -> Option<Rect> {
        Some(Rect::from_corners(
            self.start.dereference(at, max)?,
            self.end.dereference(at, max)?,
        ))
    }
}

/// A span of whole columns or rows; the axis is implied by the wrapping variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineReference {
    pub start: ReferenceValue,
    pub end: ReferenceValue,
}

impl LineReference {
    #[must_use]
    pub const fn new(start: ReferenceValue, end: ReferenceValue) -> Self {
        Self { start, end }
    }

    pub fn is_dereferencable(&self, at: u32, max: u32) -> bool {
        self.start.is_dereferencable(at, max) && self.end.is_dereferencable(at, max)
    }

    /// Resolves to `(first, count)`, normalized so `first` is the smaller index.
    pub fn dereference(&self, at: u32, max: u32) -> Option<(u32, u32)> {
        let a = self.start.dereference(at, max)?;
        let b = self.end.dereference(at, max)?;
        Some((a.min(b), a.abs_diff(b) + 1))
    }

    fn adjusted_to_move(&self, dist: i64) -> Self {
        Self::new(
            self.start.adjusted_to_move(dist),
            self.end.adjusted_to_move(dist),
        )
    }
}

/// Any reference that can appear in a formula.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnyReference {
    /// A reference invalidated by an edit; always evaluates to `#REF!`.
    Illegal,
    Cell(CellReference),
    Area(AreaReference),
    Column(LineReference),
    Row(LineReference),
}

/// What a reference resolves to at a particular evaluation point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Cell(Point),
    Range(Rect),
}

fn in_span(pos: i64, start: u32, count: u32) -> bool {
    pos >= start as i64 && pos < start as i64 + count as i64
}

impl AnyReference {
    pub fn is_dereferencable(&self, at: Point, max: Size) -> bool {
        match self {
            AnyReference::Illegal => false,
            AnyReference::Cell(r) => r.is_dereferencable(at, max),
            AnyReference::Area(r) => r.is_dereferencable(at, max),
            AnyReference::Column(r) => r.is_dereferencable(at.x, max.width),
            AnyReference::Row(r) => r.is_dereferencable(at.y, max.height),
        }
    }

    /// Resolves the reference at `at`. Whole columns/rows span the full grid.
    pub fn dereference(&self, at: Point, max: Size) -> Option<Resolved> {
        match self {
            AnyReference::Illegal => None,
            AnyReference::Cell(r) => r.dereference(at, max).map(Resolved::Cell),
            AnyReference::Area(r) => r.dereference(at, max).map(Resolved::Range),
            AnyReference::Column(r) => {
                let (x, width) = r.dereference(at.x, max.width)?;
                Some(Resolved::Range(Rect::new(
                    Point::new(x, 0),
                    Size::new(width, max.height),
                )))
            }
            AnyReference::Row(r) => {
                let (y, height) = r.dereference(at.y, max.height)?;
                Some(Resolved::Range(Rect::new(
                    Point::new(0, y),
                    Size::new(max.width, height),
                )))
            }
        }
    }

    /// Keeps targets fixed while the referencing cell moves by `(dx, dy)`.
    #[must_use]
    pub fn adjusted_to_move(&self, dx: i64, dy: i64) -> AnyReference {
        match self {
            AnyReference::Illegal => AnyReference::Illegal,
            AnyReference::Cell(r) => AnyReference::Cell(r.adjusted_to_move(dx, dy)),
            AnyReference::Area(r) => AnyReference::Area(AreaReference::new(
                r.start.adjusted_to_move(dx, dy),
                r.end.adjusted_to_move(dx, dy),
            )),
            AnyReference::Column(r) => AnyReference::Column(r.adjusted_to_move(dx)),
            AnyReference::Row(r) => AnyReference::Row(r.adjusted_to_move(dy)),
        }
    }

    /// Keeps the reference valid only if it still resolves from `dest`.
    #[must_use]
    pub fn adjusted_to_copy(&self, dest: Point, max: Size) -> AnyReference {
        if self.is_dereferencable(dest, max) {
            *self
        } else {
            AnyReference::Illegal
        }
    }

    /// Adjusts for deletion of `count` columns or rows starting at `start`.
    ///
    /// `at` is the referencing cell's position before the edit. A single cell inside the
    /// span, or a range with both ends inside it, becomes [`AnyReference::Illegal`].
    #[must_use]
    pub fn adjusted_to_deletion(
        &self,
        axis: Axis,
        at: Point,
        start: u32,
        count: u32,
    ) -> AnyReference {
        let at_a = axis.of_point(at);
        let erase = |v: ReferenceValue| v.adjusted_to_erasure(at_a, start, count);
        match (self, axis) {
            (AnyReference::Cell(r), _) => {
                let comp = r.component(axis);
                if in_span(comp.target(at_a), start, count) {
                    AnyReference::Illegal
                } else {
                    AnyReference::Cell(r.with_component(axis, erase(comp)))
                }
            }
            (AnyReference::Area(r), _) => {
                let (s, e) = (r.start.component(axis), r.end.component(axis));
                if in_span(s.target(at_a), start, count) && in_span(e.target(at_a), start, count) {
                    AnyReference::Illegal
                } else {
                    AnyReference::Area(AreaReference::new(
                        r.start.with_component(axis, erase(s)),
                        r.end.with_component(axis, erase(e)),
                    ))
                }
            }
            (AnyReference::Column(r), Axis::Column) | (AnyReference::Row(r), Axis::Row) => {
                if in_span(r.start.target(at_a), start, count)
                    && in_span(r.end.target(at_a), start, count)
                {
                    return AnyReference::Illegal;
                }
                let adjusted = LineReference::new(erase(r.start), erase(r.end));
                match axis {
                    Axis::Column => AnyReference::Column(adjusted),
                    Axis::Row => AnyReference::Row(adjusted),
                }
            }
            _ => *self,
        }
    }

    /// Adjusts for insertion of `count` columns or rows before `before`.
    ///
    /// `at` is the referencing cell's position before the edit. Any endpoint pushed off
    /// the grid makes the whole reference [`AnyReference::Illegal`].
    #[must_use]
    pub fn adjusted_to_insertion(
        &self,
        axis: Axis,
        at: Point,
        before: u32,
        count: u32,
        max: Size,
    ) -> AnyReference {
        let at_a = axis.of_point(at);
        let max_a = axis.of_size(max);
        let insert = |v: ReferenceValue| v.adjusted_to_insertion(at_a, before, count, max_a);
        let adjusted = match (self, axis) {
            (AnyReference::Cell(r), _) => insert(r.component(axis))
                .map(|v| AnyReference::Cell(r.with_component(axis, v))),
            (AnyReference::Area(r), _) => insert(r.start.component(axis)).and_then(|s| {
                insert(r.end.component(axis)).map(|e| {
                    AnyReference::Area(AreaReference::new(
                        r.start.with_component(axis, s),
                        r.end.with_component(axis, e),
                    ))
                })
            }),
            (AnyReference::Column(r), Axis::Column) => insert(r.start)
                .and_then(|s| insert(r.end).map(|e| AnyReference::Column(LineReference::new(s, e)))),
            (AnyReference::Row(r), Axis::Row) => insert(r.start)
                .and_then(|s| insert(r.end).map(|e| AnyReference::Row(LineReference::new(s, e)))),
            _ => Some(*self),
        };
        adjusted.unwrap_or(AnyReference::Illegal)
    }

    /// Formula text for the reference as seen from `at`; `#REF!` if it does not resolve.
    pub fn to_a1(&self, at: Point, max: Size) -> String {
        let mut out = String::new();
        let ok = match self {
            AnyReference::Illegal => false,
            AnyReference::Cell(r) => r.write_a1(at, max, &mut out),
            AnyReference::Area(r) => {
                r.start.write_a1(at, max, &mut out) && {
                    out.push(':');
                    r.end.write_a1(at, max, &mut out)
                }
            }
            AnyReference::Column(r) => {
                match (r.start.dereference(at.x, max.width), r.end.dereference(at.x, max.width)) {
                    (Some(a), Some(b)) => {
                        out = format!(
                            "{}{}:{}{}",
                            r.start.dollar(),
                            column_name(a),
                            r.end.dollar(),
                            column_name(b)
                        );
                        true
                    }
                    _ => false,
                }
            }
            AnyReference::Row(r) => {
                match (r.start.dereference(at.y, max.height), r.end.dereference(at.y, max.height)) {
                    (Some(a), Some(b)) => {
                        out = format!(
                            "{}{}:{}{}",
                            r.start.dollar(),
                            a as u64 + 1,
                            r.end.dollar(),
                            b as u64 + 1
                        );
                        true
                    }
                    _ => false,
                }
            }
        };
        if ok {
            out
        } else {
            "#REF!".to_string()
        }
    }
}
