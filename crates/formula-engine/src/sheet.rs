//! The recalculation engine.
//!
//! A [`Sheet`] owns a sparse [`Grid`] of cells and the list of its formula cells. Every
//! pass flips the sheet's generation flag, which makes each formula stale, then walks the
//! formula list in order. A formula that reads a stale cell pauses; the formulas it waits
//! for are moved in front of it and the walk continues from the first of them. The list
//! order therefore converges towards a topological order and later passes rarely pause.
//! A formula that reads a cell of a formula still in progress is part of a cycle and
//! evaluates to `#REF!`.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ahash::AHashSet;
use formula_model::{Axis, ErrorCode, Point, Rect, Scalar, Size};

use crate::cell::{Cell, FormulaCell, FormulaCells};
use crate::eval::{EvaluatorStorage, FormulaEvaluator};
use crate::grid::{Grid, SheetCells};
use crate::lengths::LengthInfo;
use crate::{Formula, FormulaId, FormulaReferences, SheetConfig, SheetError};

/// Formula text and result size of a formula cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaInfo {
    /// Reconstructed text without the leading `=`.
    pub text: String,
    pub extent: Size,
}

/// Result of [`Sheet::recalculate_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcStatus {
    Done,
    /// The budget ran out; call again to continue the pass.
    Yielded,
}

/// A single worksheet with automatic recalculation.
#[derive(Debug)]
pub struct Sheet {
    config: SheetConfig,
    grid: Grid,
    formulas: FormulaCells,
    generation: bool,
    suspend_count: u32,
    /// Next formula to visit when a pass has yielded.
    pass: Option<Option<FormulaId>>,
    /// Evaluation stack handed from one formula to the next.
    storage: EvaluatorStorage,
}

/// What an edit copies into a destination cell.
#[derive(Clone)]
enum Source {
    Empty,
    Value(Scalar),
    Formula(Rc<Formula>, Rc<FormulaReferences>),
}

enum Evaluation {
    Finished { extent: Size, values: Vec<Scalar> },
    Circular,
    Waiting(Vec<FormulaId>),
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::build(SheetConfig::default())
    }

    pub fn with_config(config: SheetConfig) -> Result<Self, SheetError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SheetConfig) -> Self {
        Self {
            grid: Grid::new(config.max_size),
            config,
            formulas: FormulaCells::default(),
            generation: false,
            suspend_count: 0,
            pass: None,
            storage: EvaluatorStorage::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    #[inline]
    pub fn max_size(&self) -> Size {
        self.grid.max_size()
    }

    /// Bounding size of the cells in use.
    #[inline]
    pub fn size(&self) -> Size {
        self.grid.size()
    }

    /// Number of occupied cells, spilled result positions included.
    #[inline]
    pub fn non_null_cell_count(&self) -> usize {
        self.grid.len()
    }

    pub fn get_value(&self, at: Point) -> Scalar {
        let Some(cell) = self.grid.get(at) else {
            return Scalar::Blank;
        };
        match cell.stored_value() {
            Some(value) => value.clone(),
            None => cell
                .owner()
                .and_then(|id| self.formulas.get(id))
                .map_or(Scalar::Blank, |formula| formula.value.clone()),
        }
    }

    /// `None` unless `at` holds the top-left cell of a formula.
    pub fn get_formula_info(&self, at: Point) -> Option<FormulaInfo> {
        let Some(Cell::Formula(id)) = self.grid.get(at) else {
            return None;
        };
        let cell = self.formulas.get(*id)?;
        Some(FormulaInfo {
            text: cell
                .formula
                .reconstruct_at(&cell.references, cell.at, self.max_size()),
            extent: cell.extent,
        })
    }

    /// Stores a literal value. Setting [`Scalar::Blank`] clears the cell.
    pub fn set_value_cell(&mut self, at: Point, value: impl Into<Scalar>) -> Result<(), SheetError> {
        self.grid.check_point(at)?;
        let value = value.into();
        self.pass = None;
        if value == Scalar::Blank {
            self.clear_at(at);
        } else {
            self.place(at, &Source::Value(value));
        }
        self.recalc_if_not_suspended();
        Ok(())
    }

    /// Stores a formula. Text that does not parse still creates a formula cell; it
    /// evaluates to `#ERROR!` and keeps the text.
    pub fn set_formula_cell(&mut self, at: Point, text: &str) -> Result<(), SheetError> {
        self.grid.check_point(at)?;
        let (formula, references) = Formula::parse(text, at, self.max_size());
        self.pass = None;
        match self.grid.get(at) {
            Some(Cell::Formula(id)) => {
                let id = *id;
                if let Some(cell) = self.formulas.get_mut(id) {
                    cell.formula = formula;
                    cell.references = references;
                }
            }
            _ => self.place(at, &Source::Formula(formula, references)),
        }
        self.recalc_if_not_suspended();
        Ok(())
    }

    /// Empties a cell. Spilled positions of a formula result are left alone.
    pub fn clear_cell(&mut self, at: Point) -> Result<(), SheetError> {
        self.grid.check_point(at)?;
        self.pass = None;
        self.clear_at(at);
        self.recalc_if_not_suspended();
        Ok(())
    }

    /// Copies one cell into every position of `to`. Relative references in a copied
    /// formula keep their offsets; those that leave the grid become `#REF!`.
    pub fn copy_cell(&mut self, from: Point, to: Rect) -> Result<(), SheetError> {
        self.grid.check_point(from)?;
        self.grid.check_rect(to)?;
        self.pass = None;
        let source = self.snapshot(from);
        for dest in to.points() {
            if dest != from {
                self.place(dest, &source);
            }
        }
        self.grid.extend_to(to);
        self.recalc_if_not_suspended();
        Ok(())
    }

    /// Copies the block `from` so that its top-left corner lands on `to`.
    pub fn copy_cells(&mut self, from: Rect, to: Point) -> Result<(), SheetError> {
        self.grid.check_rect(from)?;
        let dest = Rect::new(to, from.size);
        self.grid.check_rect(dest)?;
        self.pass = None;
        let sources: BTreeMap<(u32, u32), Source> = self
            .grid
            .range(from)
            .map(|(pt, _)| (offset_key(from.origin, pt), self.snapshot(pt)))
            .collect();
        self.paste(&sources, from.origin, dest);
        self.recalc_if_not_suspended();
        Ok(())
    }

    pub fn move_cell(&mut self, from: Point, to: Point) -> Result<(), SheetError> {
        self.move_cells(Rect::single(from), to)
    }

    /// Moves the block `from` so that its top-left corner lands on `to`. Moved formulas
    /// keep referring to the same cells; references to the moved block from elsewhere
    /// are not rewritten.
    pub fn move_cells(&mut self, from: Rect, to: Point) -> Result<(), SheetError> {
        self.grid.check_rect(from)?;
        let dest = Rect::new(to, from.size);
        self.grid.check_rect(dest)?;
        self.pass = None;

        let taken: Vec<Point> = self
            .grid
            .range(from)
            .filter(|(_, cell)| !matches!(cell, Cell::Extension { .. }))
            .map(|(pt, _)| pt)
            .collect();
        let mut sources = BTreeMap::new();
        for pt in taken {
            let source = match self.grid.get(pt) {
                Some(Cell::Value(value)) => Source::Value(value.clone()),
                Some(Cell::Formula(id)) => {
                    let id = *id;
                    self.clear_extensions(id);
                    let moved = self.formulas.remove(id).map(|cell| {
                        let target = translate(pt, from.origin, to);
                        let references =
                            FormulaReferences::adjusted_to_move(&cell.references, pt, target);
                        Source::Formula(cell.formula, references)
                    });
                    moved.unwrap_or(Source::Empty)
                }
                _ => Source::Empty,
            };
            self.grid.remove(pt);
            sources.insert(offset_key(from.origin, pt), source);
        }
        self.paste(&sources, from.origin, dest);
        log::trace!("moved {} cells from {} to {}", sources.len(), from.origin, to);
        self.recalc_if_not_suspended();
        Ok(())
    }

    pub fn insert_rows(&mut self, before: u32, count: u32) -> Result<(), SheetError> {
        self.insert(Axis::Row, before, count)
    }

    pub fn insert_columns(&mut self, before: u32, count: u32) -> Result<(), SheetError> {
        self.insert(Axis::Column, before, count)
    }

    pub fn delete_rows(&mut self, start: u32, count: u32) -> Result<(), SheetError> {
        self.delete(Axis::Row, start, count)
    }

    pub fn delete_columns(&mut self, start: u32, count: u32) -> Result<(), SheetError> {
        self.delete(Axis::Column, start, count)
    }

    /// Sets the height of `count` rows from `y`; hidden flags are kept.
    pub fn set_row_height(&mut self, y: u32, count: u32, height: u32) -> Result<(), SheetError> {
        self.set_length(Axis::Row, y, count, height)
    }

    /// Returns `count` rows from `y` to the default height; hidden flags are kept.
    pub fn clear_row_height(&mut self, y: u32, count: u32) -> Result<(), SheetError> {
        self.clear_length(Axis::Row, y, count)
    }

    pub fn hide_rows(&mut self, y: u32, count: u32, hidden: bool) -> Result<(), SheetError> {
        self.hide_lines(Axis::Row, y, count, hidden)
    }

    pub fn row_height(&self, y: u32) -> LengthInfo {
        self.length(Axis::Row, y)
    }

    /// Runs of equal rows from `y` to `y + count` as `(start, end, info)`; rows without a
    /// custom height or flag report [`LengthInfo::DEFAULT`].
    pub fn row_heights(
        &self,
        y: u32,
        count: u32,
    ) -> impl Iterator<Item = (u32, u32, LengthInfo)> + '_ {
        self.lengths(Axis::Row, y, count)
    }

    pub fn set_column_width(&mut self, x: u32, count: u32, width: u32) -> Result<(), SheetError> {
        self.set_length(Axis::Column, x, count, width)
    }

    pub fn clear_column_width(&mut self, x: u32, count: u32) -> Result<(), SheetError> {
        self.clear_length(Axis::Column, x, count)
    }

    pub fn hide_columns(&mut self, x: u32, count: u32, hidden: bool) -> Result<(), SheetError> {
        self.hide_lines(Axis::Column, x, count, hidden)
    }

    pub fn column_width(&self, x: u32) -> LengthInfo {
        self.length(Axis::Column, x)
    }

    pub fn column_widths(
        &self,
        x: u32,
        count: u32,
    ) -> impl Iterator<Item = (u32, u32, LengthInfo)> + '_ {
        self.lengths(Axis::Column, x, count)
    }

    /// Defers recalculation until the matching [`resume_recalc`](Self::resume_recalc).
    /// Calls nest.
    pub fn suspend_recalc(&mut self) {
        self.suspend_count += 1;
    }

    pub fn resume_recalc(&mut self) -> Result<(), SheetError> {
        self.suspend_count = self
            .suspend_count
            .checked_sub(1)
            .ok_or(SheetError::UnbalancedResume)?;
        self.recalc_if_not_suspended();
        Ok(())
    }

    /// Runs a full pass, finishing any pass that has yielded.
    pub fn recalculate(&mut self) {
        while self.recalculate_step(Duration::MAX) == RecalcStatus::Yielded {}
    }

    /// Runs the current pass, or a new one, until it completes or `budget` has elapsed.
    /// At least one formula is visited per call.
    pub fn recalculate_step(&mut self, budget: Duration) -> RecalcStatus {
        let deadline = Instant::now().checked_add(budget);
        let mut cursor = match self.pass.take() {
            Some(cursor) => cursor,
            None => self.begin_pass(),
        };
        let mut visited = 0usize;
        while let Some(id) = cursor {
            cursor = self.visit(id);
            visited += 1;
            if cursor.is_some() && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                log::trace!("recalculation yielded after {visited} visits");
                self.pass = Some(cursor);
                return RecalcStatus::Yielded;
            }
        }
        log::debug!("recalculation pass finished after {visited} visits");
        RecalcStatus::Done
    }

    fn recalc_if_not_suspended(&mut self) {
        if self.suspend_count == 0 {
            self.recalculate();
        }
    }

    fn begin_pass(&mut self) -> Option<FormulaId> {
        self.generation = !self.generation;
        for id in self.formulas.ids() {
            if let Some(cell) = self.formulas.get_mut(id) {
                cell.in_progress = false;
            }
        }
        log::debug!(
            "recalculation pass over {} formula cells",
            self.formulas.len()
        );
        self.formulas.first()
    }

    /// Evaluates `id` if it is stale and returns the next formula to visit.
    fn visit(&mut self, id: FormulaId) -> Option<FormulaId> {
        let cell = self.formulas.get(id)?;
        if !cell.needs_recalc(self.generation) {
            return self.formulas.next(id);
        }
        let formula = Rc::clone(&cell.formula);
        let references = Rc::clone(&cell.references);
        let at = cell.at;
        if let Some(cell) = self.formulas.get_mut(id) {
            cell.in_progress = true;
        }

        let mut storage = std::mem::take(&mut self.storage);
        let evaluation = self.evaluate(&formula, &references, at, &mut storage);
        self.storage = storage;
        match evaluation {
            Evaluation::Waiting(mut dependencies) => {
                let mut seen = AHashSet::new();
                dependencies.retain(|dep| *dep != id && seen.insert(*dep));
                let Some(&first) = dependencies.first() else {
                    self.clear_extensions(id);
                    self.finish(id, Scalar::Error(ErrorCode::InvalidReference), true);
                    return self.formulas.next(id);
                };
                log::trace!(
                    "formula at {at} waits for {} other formulas",
                    dependencies.len()
                );
                for &dep in &dependencies {
                    self.formulas.move_before(dep, id);
                }
                Some(first)
            }
            Evaluation::Circular => {
                log::debug!("circular dependency through formula at {at}");
                self.clear_extensions(id);
                self.finish(id, Scalar::Error(ErrorCode::InvalidReference), true);
                self.formulas.next(id)
            }
            Evaluation::Finished { extent, values } => {
                self.reserve_extent(id, extent);
                let mut values = values.into_iter();
                let first = values.next().unwrap_or(Scalar::Blank);
                for (pt, value) in Rect::new(at, extent).points().skip(1).zip(values) {
                    self.grid.set(pt, Cell::Extension { parent: id, value });
                }
                self.finish(id, first, false);
                self.formulas.next(id)
            }
        }
    }

    fn evaluate(
        &self,
        formula: &Formula,
        references: &FormulaReferences,
        at: Point,
        storage: &mut EvaluatorStorage,
    ) -> Evaluation {
        let cells = SheetCells {
            grid: &self.grid,
            formulas: &self.formulas,
            generation: self.generation,
        };
        let mut evaluator =
            FormulaEvaluator::with_storage(formula, references, at, std::mem::take(storage));
        let evaluation = run_to_completion(&mut evaluator, &cells);
        *storage = evaluator.into_storage();
        evaluation
    }

    fn finish(&mut self, id: FormulaId, value: Scalar, blocked: bool) {
        let generation = self.generation;
        if let Some(cell) = self.formulas.get_mut(id) {
            cell.value = value;
            cell.blocked = blocked;
            cell.in_progress = false;
            cell.generation = generation;
        }
    }

    /// Sets the extent of `id`, dropping its spilled cells outside the new one.
    fn reserve_extent(&mut self, id: FormulaId, extent: Size) {
        let Some(cell) = self.formulas.get(id) else {
            return;
        };
        let (old, new) = (cell.area(), Rect::new(cell.at, extent));
        if old != new {
            self.remove_extensions(id, old, |pt| !new.contains(pt));
        }
        if let Some(cell) = self.formulas.get_mut(id) {
            cell.extent = extent;
        }
    }

    /// Drops every spilled cell of `id` and shrinks it to a single cell.
    fn clear_extensions(&mut self, id: FormulaId) {
        let Some(cell) = self.formulas.get(id) else {
            return;
        };
        if cell.extent.is_single() {
            return;
        }
        let (at, area) = (cell.at, cell.area());
        self.remove_extensions(id, area, |pt| pt != at);
        if let Some(cell) = self.formulas.get_mut(id) {
            cell.extent = Size::ONE;
        }
    }

    /// Removes the cells of `id` inside `area` that `filter` accepts. The filter must
    /// reject the formula's own position.
    fn remove_extensions(&mut self, id: FormulaId, area: Rect, filter: impl Fn(Point) -> bool) {
        let doomed: Vec<Point> = self
            .grid
            .range(area)
            .filter(|(pt, cell)| filter(*pt) && cell.owner() == Some(id))
            .map(|(pt, _)| pt)
            .collect();
        for pt in doomed {
            self.grid.remove(pt);
        }
    }

    /// Removes whatever occupies `at` so that new contents can go there. An extension
    /// cell gives up its formula's whole spill.
    fn vacate(&mut self, at: Point) {
        if let Some(cell) = self.grid.get(at) {
            let anchor = matches!(cell, Cell::Formula(_));
            if let Some(id) = cell.owner() {
                self.clear_extensions(id);
                if anchor {
                    self.formulas.remove(id);
                }
            }
        }
        self.grid.remove(at);
    }

    /// Clears a cell unless it is a spilled position.
    fn clear_at(&mut self, at: Point) {
        if !matches!(self.grid.get(at), Some(Cell::Extension { .. })) {
            self.vacate(at);
        }
    }

    fn snapshot(&self, at: Point) -> Source {
        match self.grid.get(at) {
            Some(Cell::Value(value)) => Source::Value(value.clone()),
            Some(Cell::Formula(id)) => match self.formulas.get(*id) {
                Some(cell) => Source::Formula(Rc::clone(&cell.formula), Rc::clone(&cell.references)),
                None => Source::Empty,
            },
            Some(Cell::Extension { .. }) | None => Source::Empty,
        }
    }

    /// Writes `source` at `at`. Formula references are validated against the new position.
    fn place(&mut self, at: Point, source: &Source) {
        match source {
            Source::Empty => self.clear_at(at),
            Source::Value(value) => {
                self.vacate(at);
                self.grid.set(at, Cell::Value(value.clone()));
            }
            Source::Formula(formula, references) => {
                self.vacate(at);
                let references =
                    FormulaReferences::adjusted_to_copy(references, at, self.max_size());
                let cell = FormulaCell::new(Rc::clone(formula), references, at, self.generation);
                let id = self.formulas.push_back(cell);
                self.grid.set(at, Cell::Formula(id));
            }
        }
    }

    /// Fills `dest` from `sources`, keyed by offset from `origin`. Positions without a
    /// source are cleared.
    fn paste(&mut self, sources: &BTreeMap<(u32, u32), Source>, origin: Point, dest: Rect) {
        let emptied: Vec<Point> = self
            .grid
            .range(dest)
            .map(|(pt, _)| pt)
            .filter(|pt| !sources.contains_key(&offset_key(dest.origin, *pt)))
            .collect();
        for pt in emptied {
            self.clear_at(pt);
        }
        for (&(dy, dx), source) in sources {
            let target = Point::new(dest.origin.x + dx, dest.origin.y + dy);
            self.place(target, source);
        }
        self.grid.extend_to(dest);
        log::trace!("pasted {} cells from {origin} into {}", sources.len(), dest.origin);
    }

    fn set_length(
        &mut self,
        axis: Axis,
        start: u32,
        count: u32,
        length: u32,
    ) -> Result<(), SheetError> {
        self.grid.modify_lengths(axis, start, count, |old| {
            Some(LengthInfo::new(Some(length), old.is_some_and(|info| info.hidden)))
        })
    }

    fn clear_length(&mut self, axis: Axis, start: u32, count: u32) -> Result<(), SheetError> {
        self.grid.modify_lengths(axis, start, count, |old| {
            old.filter(|info| info.hidden).map(|_| LengthInfo::new(None, true))
        })
    }

    fn hide_lines(
        &mut self,
        axis: Axis,
        start: u32,
        count: u32,
        hidden: bool,
    ) -> Result<(), SheetError> {
        log::trace!("hidden={hidden} for {count} {axis:?} lines from {start}");
        self.grid.modify_lengths(axis, start, count, |old| {
            let length = old.and_then(|info| info.length);
            if hidden {
                Some(LengthInfo::new(length, true))
            } else {
                length.map(|length| LengthInfo::new(Some(length), false))
            }
        })
    }

    fn length(&self, axis: Axis, index: u32) -> LengthInfo {
        self.grid
            .lengths(axis)
            .get(index)
            .copied()
            .unwrap_or(LengthInfo::DEFAULT)
    }

    fn lengths(
        &self,
        axis: Axis,
        start: u32,
        count: u32,
    ) -> impl Iterator<Item = (u32, u32, LengthInfo)> + '_ {
        let end = start.saturating_add(count);
        self.grid
            .lengths(axis)
            .iter_with_default(start, end, LengthInfo::DEFAULT)
    }

    fn insert(&mut self, axis: Axis, before: u32, count: u32) -> Result<(), SheetError> {
        self.grid.check_insertion(axis, before, count)?;
        self.pass = None;
        let max = self.max_size();

        // Spills crossing the insertion line are recomputed from scratch.
        let crossing: Vec<FormulaId> = self
            .formulas
            .iter()
            .filter(|(_, cell)| {
                let start = axis.of_point(cell.at);
                start < before && start as u64 + axis.of_size(cell.extent) as u64 > before as u64
            })
            .map(|(id, _)| id)
            .collect();
        for id in crossing {
            self.clear_extensions(id);
        }

        self.grid.insert(axis, before, count)?;
        for id in self.formulas.ids() {
            let Some(cell) = self.formulas.get_mut(id) else {
                continue;
            };
            let at = cell.at;
            cell.references =
                FormulaReferences::adjusted_to_insertion(&cell.references, axis, at, before, count, max);
            if axis.of_point(at) >= before {
                cell.at = shifted(at, axis, count as i64);
            }
        }
        log::trace!("inserted {count} {axis:?} lines before {before}");
        self.recalc_if_not_suspended();
        Ok(())
    }

    fn delete(&mut self, axis: Axis, start: u32, count: u32) -> Result<(), SheetError> {
        self.grid.check_deletion(axis, start, count)?;
        if count == 0 {
            return Ok(());
        }
        self.pass = None;
        let end = start + count;

        for id in self.formulas.ids() {
            let Some(cell) = self.formulas.get(id) else {
                continue;
            };
            let at = cell.at;
            let loc = axis.of_point(at);
            if (start..end).contains(&loc) {
                self.clear_extensions(id);
                self.formulas.remove(id);
                continue;
            }
            let Some(cell) = self.formulas.get_mut(id) else {
                continue;
            };
            if loc < start {
                let len = axis.of_size(cell.extent);
                if loc + len > start {
                    let len = len - count.min(loc + len - start);
                    cell.extent = match axis {
                        Axis::Column => Size::new(len, cell.extent.height),
                        Axis::Row => Size::new(cell.extent.width, len),
                    };
                }
            } else {
                cell.at = shifted(at, axis, -(count as i64));
            }
            cell.references =
                FormulaReferences::adjusted_to_deletion(&cell.references, axis, at, start, count);
        }

        self.grid.delete(axis, start, count)?;
        log::trace!("deleted {count} {axis:?} lines from {start}");
        self.recalc_if_not_suspended();
        Ok(())
    }
}

/// Evaluates every offset of the result, stopping at the first pause.
fn run_to_completion(evaluator: &mut FormulaEvaluator<'_>, cells: &SheetCells<'_>) -> Evaluation {
    let mut values = Vec::new();
    loop {
        if !evaluator.eval(cells) {
            let dependencies = evaluator.take_dependencies().into_vec();
            debug_assert!(!dependencies.is_empty(), "paused without dependencies");
            if dependencies.is_empty() {
                return Evaluation::Circular;
            }
            return Evaluation::Waiting(dependencies);
        }
        if evaluator.is_circular() {
            return Evaluation::Circular;
        }
        values.push(evaluator.take_value().unwrap_or(Scalar::Blank));
        if !evaluator.next_offset() {
            return Evaluation::Finished {
                extent: evaluator.extent(),
                values,
            };
        }
    }
}

/// Row-major key of `pt` relative to `origin`.
#[inline]
fn offset_key(origin: Point, pt: Point) -> (u32, u32) {
    (pt.y - origin.y, pt.x - origin.x)
}

#[inline]
fn translate(pt: Point, from: Point, to: Point) -> Point {
    Point::new(to.x + (pt.x - from.x), to.y + (pt.y - from.y))
}

fn shifted(pt: Point, axis: Axis, by: i64) -> Point {
    let moved = |v: u32| (v as i64 + by) as u32;
    match axis {
        Axis::Column => Point::new(moved(pt.x), pt.y),
        Axis::Row => Point::new(pt.x, moved(pt.y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pt(a1: &str) -> Point {
        Point::from_a1(a1).expect("valid A1")
    }

    fn num(v: f64) -> Scalar {
        Scalar::from(v)
    }

    #[test]
    fn formulas_follow_their_inputs() {
        let mut sheet = Sheet::new();
        sheet.set_value_cell(pt("A1"), 2.0).unwrap();
        sheet.set_value_cell(pt("A2"), 3.0).unwrap();
        sheet.set_formula_cell(pt("A3"), "=A1+A2").unwrap();
        assert_eq!(sheet.get_value(pt("A3")), num(5.0));
        sheet.set_value_cell(pt("A1"), 10.0).unwrap();
        assert_eq!(sheet.get_value(pt("A3")), num(13.0));
        assert_eq!(
            sheet.get_formula_info(pt("A3")),
            Some(FormulaInfo {
                text: "A1 + A2".into(),
                extent: Size::ONE
            })
        );
        assert_eq!(sheet.get_formula_info(pt("A1")), None);
    }

    #[test]
    fn dependencies_are_evaluated_first_regardless_of_entry_order() {
        let mut sheet = Sheet::new();
        sheet.suspend_recalc();
        sheet.set_formula_cell(pt("A1"), "=B1*2").unwrap();
        sheet.set_formula_cell(pt("B1"), "=C1+1").unwrap();
        sheet.set_formula_cell(pt("C1"), "=D1+1").unwrap();
        sheet.set_value_cell(pt("D1"), 1.0).unwrap();
        sheet.resume_recalc().unwrap();
        assert_eq!(sheet.get_value(pt("A1")), num(6.0));
        assert_eq!(sheet.get_value(pt("B1")), num(3.0));
        // The list has been reordered; the next pass runs straight through.
        let order: Vec<Point> = sheet.formulas.iter().map(|(_, c)| c.at).collect();
        assert_eq!(order, vec![pt("C1"), pt("B1"), pt("A1")]);
    }

    #[test]
    fn self_reference_is_circular() {
        let mut sheet = Sheet::new();
        sheet.set_formula_cell(pt("A1"), "=A1+1").unwrap();
        assert_eq!(
            sheet.get_value(pt("A1")),
            Scalar::Error(ErrorCode::InvalidReference)
        );
        sheet.set_formula_cell(pt("A1"), "=1").unwrap();
        assert_eq!(sheet.get_value(pt("A1")), num(1.0));
    }

    #[test]
    fn unbalanced_resume_is_an_error() {
        let mut sheet = Sheet::new();
        assert_eq!(sheet.resume_recalc(), Err(SheetError::UnbalancedResume));
        sheet.suspend_recalc();
        sheet.suspend_recalc();
        sheet.set_value_cell(pt("A1"), 1.0).unwrap();
        sheet.set_formula_cell(pt("B1"), "=A1").unwrap();
        sheet.resume_recalc().unwrap();
        assert_eq!(sheet.get_value(pt("B1")), Scalar::Blank);
        sheet.resume_recalc().unwrap();
        assert_eq!(sheet.get_value(pt("B1")), num(1.0));
    }

    #[test]
    fn out_of_grid_edits_are_rejected() {
        let config = SheetConfig {
            max_size: Size::new(4, 4),
            ..SheetConfig::default()
        };
        let mut sheet = Sheet::with_config(config).unwrap();
        assert!(matches!(
            sheet.set_value_cell(Point::new(4, 0), 1.0),
            Err(SheetError::OutOfBounds { .. })
        ));
        assert!(sheet
            .copy_cell(Point::new(0, 0), Rect::new(Point::new(2, 2), Size::new(3, 1)))
            .is_err());
        assert_eq!(sheet.non_null_cell_count(), 0);
    }

    #[test]
    fn spilled_results_occupy_extension_cells() {
        let mut sheet = Sheet::new();
        sheet.set_formula_cell(pt("A1"), "={1,2;3,4}").unwrap();
        assert_eq!(sheet.non_null_cell_count(), 4);
        assert_eq!(sheet.get_value(pt("B2")), num(4.0));
        assert_eq!(sheet.get_formula_info(pt("B2")), None);
        assert_eq!(
            sheet.get_formula_info(pt("A1")).map(|info| info.extent),
            Some(Size::new(2, 2))
        );

        sheet.set_formula_cell(pt("A1"), "={1,2}").unwrap();
        assert_eq!(sheet.non_null_cell_count(), 2);
        assert_eq!(sheet.get_value(pt("B2")), Scalar::Blank);
    }

    #[test]
    fn clearing_a_spilled_position_keeps_it() {
        let mut sheet = Sheet::new();
        sheet.set_formula_cell(pt("A1"), "={1;2}").unwrap();
        sheet.clear_cell(pt("A2")).unwrap();
        assert_eq!(sheet.get_value(pt("A2")), num(2.0));
    }

    #[test]
    fn writing_into_a_spill_gives_up_the_whole_spill() {
        let mut sheet = Sheet::new();
        sheet.set_formula_cell(pt("A1"), "={1;2;3}").unwrap();
        sheet.set_value_cell(pt("A2"), 9.0).unwrap();
        assert_eq!(sheet.non_null_cell_count(), 2);
        assert_eq!(sheet.get_value(pt("A1")), Scalar::Error(ErrorCode::Spill));
        assert_eq!(sheet.get_value(pt("A2")), num(9.0));
        assert_eq!(sheet.get_value(pt("A3")), Scalar::Blank);
    }

    #[test]
    fn step_with_zero_budget_still_makes_progress() {
        let mut sheet = Sheet::new();
        sheet.suspend_recalc();
        for row in 0..5 {
            sheet
                .set_formula_cell(Point::new(0, row), &format!("={}", row + 1))
                .unwrap();
        }
        let mut steps = 0;
        while sheet.recalculate_step(Duration::ZERO) == RecalcStatus::Yielded {
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(steps, 4);
        assert_eq!(sheet.get_value(Point::new(0, 4)), num(5.0));
    }

    #[test]
    fn the_evaluation_stack_is_kept_between_formulas() {
        let mut sheet = Sheet::new();
        assert_eq!(sheet.storage.capacity(), 0);
        sheet.set_value_cell(pt("A1"), 1.0).unwrap();
        sheet.set_formula_cell(pt("B1"), "=(A1+(A1+(A1+1)))").unwrap();
        let capacity = sheet.storage.capacity();
        assert!(capacity >= 4);
        sheet.set_formula_cell(pt("C1"), "=B1*2").unwrap();
        assert_eq!(sheet.get_value(pt("C1")), num(8.0));
        assert_eq!(sheet.storage.capacity(), capacity);
    }

    #[test]
    fn edits_restart_a_yielded_pass() {
        let mut sheet = Sheet::new();
        sheet.suspend_recalc();
        sheet.set_value_cell(pt("C1"), 1.0).unwrap();
        sheet.set_formula_cell(pt("A1"), "=C1").unwrap();
        sheet.set_formula_cell(pt("B1"), "=C1").unwrap();
        assert_eq!(sheet.recalculate_step(Duration::ZERO), RecalcStatus::Yielded);
        sheet.set_value_cell(pt("C1"), 7.0).unwrap();
        sheet.recalculate();
        assert_eq!(sheet.get_value(pt("A1")), num(7.0));
        assert_eq!(sheet.get_value(pt("B1")), num(7.0));
    }
}
