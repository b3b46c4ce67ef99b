//! Sparse cell storage.
//!
//! Cells live in an ordered map keyed `(y, x)` so that iteration and range scans run in
//! row-major order and never touch empty positions. The grid also tracks the bounding
//! size of the area in use, and the row heights and column widths; structural edits grow
//! and shrink both the way the cells move.

use std::collections::BTreeMap;

use formula_model::{Axis, Point, Rect, Scalar, Size};

use crate::cell::{Cell, FormulaCells};
use crate::eval::{CellLookup, CellSource};
use crate::lengths::{IntervalMap, LengthInfo};
use crate::SheetError;

#[derive(Debug)]
pub(crate) struct Grid {
    cells: BTreeMap<(u32, u32), Cell>,
    size: Size,
    max: Size,
    column_widths: IntervalMap<LengthInfo>,
    row_heights: IntervalMap<LengthInfo>,
}

#[inline]
fn key(pt: Point) -> (u32, u32) {
    (pt.y, pt.x)
}

#[inline]
fn point((y, x): (u32, u32)) -> Point {
    Point::new(x, y)
}

impl Grid {
    pub fn new(max: Size) -> Self {
        Self {
            cells: BTreeMap::new(),
            size: Size::new(0, 0),
            max,
            column_widths: IntervalMap::new(),
            row_heights: IntervalMap::new(),
        }
    }

    #[inline]
    pub fn max_size(&self) -> Size {
        self.max
    }

    /// Bounding size of the used area. Clearing cells never shrinks it; deleting rows or
    /// columns does.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Number of stored cells, spilled positions included.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn check_point(&self, point: Point) -> Result<(), SheetError> {
        if point.x < self.max.width && point.y < self.max.height {
            Ok(())
        } else {
            Err(SheetError::OutOfBounds {
                point,
                max: self.max,
            })
        }
    }

    pub fn check_rect(&self, rect: Rect) -> Result<(), SheetError> {
        self.check_point(rect.origin)?;
        if rect.right() > self.max.width as u64 || rect.bottom() > self.max.height as u64 {
            let corner = Point::new(
                u32::try_from(rect.right() - 1).unwrap_or(u32::MAX),
                u32::try_from(rect.bottom() - 1).unwrap_or(u32::MAX),
            );
            return Err(SheetError::OutOfBounds {
                point: corner,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn get(&self, pt: Point) -> Option<&Cell> {
        self.cells.get(&key(pt))
    }

    pub fn get_mut(&mut self, pt: Point) -> Option<&mut Cell> {
        self.cells.get_mut(&key(pt))
    }

    /// Stores `cell` at `pt`, growing the used area to cover it.
    pub fn set(&mut self, pt: Point, cell: Cell) -> Option<Cell> {
        self.extend_to(Rect::single(pt));
        self.cells.insert(key(pt), cell)
    }

    pub fn remove(&mut self, pt: Point) -> Option<Cell> {
        self.cells.remove(&key(pt))
    }

    /// Grows the used area to cover `rect`.
    pub fn extend_to(&mut self, rect: Rect) {
        if rect.size.is_empty() {
            return;
        }
        let clamped = rect.clamped_to(self.max);
        self.size
            .extend_to(Size::new(clamped.right() as u32, clamped.bottom() as u32));
    }

    /// Grows the used area to at least `end` lines along `axis`.
    pub fn extend_axis(&mut self, axis: Axis, end: u32) {
        match axis {
            Axis::Column => self.size.width = self.size.width.max(end),
            Axis::Row => self.size.height = self.size.height.max(end),
        }
    }

    pub fn lengths(&self, axis: Axis) -> &IntervalMap<LengthInfo> {
        match axis {
            Axis::Column => &self.column_widths,
            Axis::Row => &self.row_heights,
        }
    }

    /// Rewrites the lengths of `count` lines from `start`, growing the used area to cover
    /// them.
    pub fn modify_lengths(
        &mut self,
        axis: Axis,
        start: u32,
        count: u32,
        f: impl FnMut(Option<&LengthInfo>) -> Option<LengthInfo>,
    ) -> Result<(), SheetError> {
        self.check_span(axis, start, count)?;
        let end = start + count;
        self.extend_axis(axis, end);
        self.lengths_mut(axis).modify(start, end, f);
        Ok(())
    }

    /// Stored cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Point, &Cell)> + '_ {
        self.cells.iter().map(|(k, cell)| (point(*k), cell))
    }

    /// Stored cells inside `area` in row-major order.
    pub fn range(&self, area: Rect) -> impl Iterator<Item = (Point, &Cell)> + '_ {
        let area = area.clamped_to(self.max);
        let bounds = if area.size.is_empty() {
            None
        } else {
            let last = ((area.bottom() - 1) as u32, (area.right() - 1) as u32);
            Some((area.origin.y, area.origin.x)..=last)
        };
        bounds
            .into_iter()
            .flat_map(move |bounds| self.cells.range(bounds))
            .map(|(k, cell)| (point(*k), cell))
            .filter(move |(pt, _)| area.contains(*pt))
    }

    /// Checks a column or row span against the grid limits.
    fn check_span(&self, axis: Axis, start: u32, count: u32) -> Result<u32, SheetError> {
        let max = axis.of_size(self.max);
        if start >= max || count > max || max - count < start {
            return Err(SheetError::InvalidSpan { axis, start, count });
        }
        Ok(max)
    }

    /// Validates an insertion without changing anything.
    pub fn check_insertion(&self, axis: Axis, before: u32, count: u32) -> Result<(), SheetError> {
        let max = self.check_span(axis, before, count)?;
        if max - count < axis.of_size(self.size) {
            return Err(SheetError::GridOverflow { axis, count });
        }
        Ok(())
    }

    /// Inserts `count` empty columns or rows before `before`, shifting later cells.
    pub fn insert(&mut self, axis: Axis, before: u32, count: u32) -> Result<(), SheetError> {
        self.check_insertion(axis, before, count)?;
        let used = axis.of_size(self.size);
        let new_len = if before < used {
            self.shift(axis, before, |pos| Some(pos + count));
            used + count
        } else {
            before + count
        };
        self.lengths_mut(axis).insert_indices(before, count);
        match axis {
            Axis::Column => self.size.width = new_len,
            Axis::Row => self.size.height = new_len,
        }
        Ok(())
    }

    pub fn check_deletion(&self, axis: Axis, start: u32, count: u32) -> Result<(), SheetError> {
        self.check_span(axis, start, count).map(|_| ())
    }

    /// Deletes `count` columns or rows starting at `start`, shifting later cells back.
    pub fn delete(&mut self, axis: Axis, start: u32, count: u32) -> Result<(), SheetError> {
        self.check_deletion(axis, start, count)?;
        let used = axis.of_size(self.size);
        if count == 0 || start >= used {
            return Ok(());
        }
        let count = count.min(used - start);
        let end = start + count;
        self.shift(axis, start, |pos| (pos >= end).then(|| pos - count));
        self.lengths_mut(axis).erase_indices(start, end);
        match axis {
            Axis::Column => self.size.width -= count,
            Axis::Row => self.size.height -= count,
        }
        Ok(())
    }

    fn lengths_mut(&mut self, axis: Axis) -> &mut IntervalMap<LengthInfo> {
        match axis {
            Axis::Column => &mut self.column_widths,
            Axis::Row => &mut self.row_heights,
        }
    }

    /// Re-keys every cell at or after `from` on `axis`; cells mapped to `None` are dropped.
    fn shift(&mut self, axis: Axis, from: u32, mut map: impl FnMut(u32) -> Option<u32>) {
        let moved: Vec<((u32, u32), Cell)> = match axis {
            Axis::Row => self.cells.split_off(&(from, 0)).into_iter().collect(),
            Axis::Column => {
                let keys: Vec<_> = self
                    .cells
                    .keys()
                    .filter(|(_, x)| *x >= from)
                    .copied()
                    .collect();
                keys.into_iter()
                    .filter_map(|k| self.cells.remove(&k).map(|cell| (k, cell)))
                    .collect()
            }
        };
        for ((y, x), cell) in moved {
            let target = match axis {
                Axis::Row => map(y).map(|y| (y, x)),
                Axis::Column => map(x).map(|x| (y, x)),
            };
            if let Some(target) = target {
                self.cells.insert(target, cell);
            }
        }
    }
}

/// Read-only view of a sheet's cells for the evaluator.
pub(crate) struct SheetCells<'a> {
    pub grid: &'a Grid,
    pub formulas: &'a FormulaCells,
    /// Generation of the pass in progress.
    pub generation: bool,
}

static BLANK: Scalar = Scalar::Blank;

impl SheetCells<'_> {
    fn lookup_cell<'c>(&'c self, cell: &'c Cell) -> CellLookup<'c> {
        let Some(id) = cell.owner() else {
            return CellLookup::Value(cell.stored_value().unwrap_or(&BLANK));
        };
        let Some(formula) = self.formulas.get(id) else {
            return CellLookup::Value(&BLANK);
        };
        if formula.in_progress {
            CellLookup::Circular
        } else if formula.generation != self.generation {
            CellLookup::Stale(id)
        } else if formula.blocked {
            CellLookup::Circular
        } else {
            CellLookup::Value(cell.stored_value().unwrap_or(&formula.value))
        }
    }
}

impl CellSource for SheetCells<'_> {
    fn max_size(&self) -> Size {
        self.grid.max_size()
    }

    fn used_size(&self) -> Size {
        self.grid.size()
    }

    fn lookup(&self, at: Point) -> CellLookup<'_> {
        match self.grid.get(at) {
            Some(cell) => self.lookup_cell(cell),
            None => CellLookup::Value(&BLANK),
        }
    }

    fn visit_range(&self, area: Rect, visit: &mut dyn FnMut(CellLookup<'_>) -> bool) {
        for (_, cell) in self.grid.range(area) {
            if !visit(self.lookup_cell(cell)) {
                return;
            }
        }
    }

    fn is_spill_blocked(&self, owner: Point, area: Rect) -> bool {
        let owner_id = self.grid.get(owner).and_then(Cell::owner);
        self.grid.range(area).any(|(pt, cell)| {
            pt != owner
                && match cell.owner() {
                    None => cell.stored_value().is_some_and(|value| !value.is_blank()),
                    // Another formula, or a stale spill of another formula.
                    id => id != owner_id,
                }
        })
    }
}
