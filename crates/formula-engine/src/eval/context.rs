use formula_model::{AnyReference, Array, ErrorCode, Point, Rect, Scalar, Size};
use smallvec::SmallVec;

use crate::{FormulaId, FormulaReferences};

/// A node's result before it is reduced to one scalar per offset.
///
/// Points and rectangles stay unresolved until a consumer asks for a value, so a
/// reference to a large range costs nothing until it is read.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarGenerator {
    Scalar(Scalar),
    Array(Array),
    Point(Point),
    Rect(Rect),
}

impl Default for ScalarGenerator {
    fn default() -> Self {
        ScalarGenerator::Scalar(Scalar::Blank)
    }
}

impl From<Scalar> for ScalarGenerator {
    fn from(value: Scalar) -> Self {
        ScalarGenerator::Scalar(value)
    }
}

/// What a read of one cell found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellLookup<'a> {
    Value(&'a Scalar),
    /// The cell belongs to a formula that has not been evaluated in this pass.
    Stale(FormulaId),
    /// The cell belongs to a formula that is being evaluated or is blocked on a cycle.
    Circular,
}

/// Read access to the grid during evaluation.
pub trait CellSource {
    fn max_size(&self) -> Size;

    /// Bounding size of the cells in use.
    fn used_size(&self) -> Size;

    fn lookup(&self, at: Point) -> CellLookup<'_>;

    /// Visits the stored cells inside `area` in row-major order until `visit` returns
    /// false. Blank cells may be skipped.
    fn visit_range(&self, area: Rect, visit: &mut dyn FnMut(CellLookup<'_>) -> bool);

    /// True if spilling the result of the formula at `owner` over `area` would overwrite
    /// something else.
    fn is_spill_blocked(&self, owner: Point, area: Rect) -> bool;
}

/// Outcome of folding a rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    Success,
    /// The visitor asked to stop.
    Aborted,
    /// Some cells are not evaluated yet; see the recorded dependencies.
    HasDependencies,
}

/// State shared by all nodes of one evaluation; survives pauses.
#[derive(Debug, Default)]
pub struct EvalState {
    /// Set while evaluating arguments whose value is not needed (unchosen `IF` branches).
    /// Nodes still report their extent.
    pub suppress_evaluation: bool,
    pub circular_dependency: bool,
    /// Position inside the result extent being computed.
    pub offset: Point,
    pub returned_value: ScalarGenerator,
    pub returned_extent: Size,
    pub dependencies: SmallVec<[FormulaId; 4]>,
}

impl EvalState {
    /// Advances the offset row-major within `extent`. Returns false, leaving the offset
    /// alone, when the last position has been reached.
    pub fn increment_offset(&mut self, extent: Size) -> bool {
        let offset = &mut self.offset;
        if offset.x + 1 < extent.width {
            offset.x += 1;
            true
        } else if offset.y + 1 < extent.height {
            offset.x = 0;
            offset.y += 1;
            true
        } else {
            false
        }
    }
}

/// Everything a node sees while it executes.
pub struct ExecutionContext<'a> {
    pub state: &'a mut EvalState,
    cells: &'a dyn CellSource,
    references: &'a FormulaReferences,
    at: Point,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        state: &'a mut EvalState,
        cells: &'a dyn CellSource,
        references: &'a FormulaReferences,
        at: Point,
    ) -> Self {
        Self {
            state,
            cells,
            references,
            at,
        }
    }

    /// Location of the formula being evaluated.
    #[inline]
    pub fn at(&self) -> Point {
        self.at
    }

    #[inline]
    pub fn max_size(&self) -> Size {
        self.cells.max_size()
    }

    #[inline]
    pub fn used_size(&self) -> Size {
        self.cells.used_size()
    }

    pub fn reference(&self, index: usize) -> &AnyReference {
        self.references.get(index).unwrap_or(&AnyReference::Illegal)
    }

    pub fn is_spill_blocked(&self, area: Rect) -> bool {
        self.cells.is_spill_blocked(self.at, area)
    }

    pub fn set_returned(&mut self, value: impl Into<ScalarGenerator>, extent: Size) {
        self.state.returned_value = value.into();
        self.state.returned_extent = extent;
    }

    /// Value of the cell at `pt`, or `None` when it must be evaluated first. A
    /// circular read also yields `None` and raises the circular flag.
    pub fn evaluate_cell(&mut self, pt: Point) -> Option<Scalar> {
        match self.cells.lookup(pt) {
            CellLookup::Value(value) => Some(value.clone()),
            CellLookup::Stale(id) => {
                self.state.dependencies.push(id);
                None
            }
            CellLookup::Circular => {
                self.state.circular_dependency = true;
                None
            }
        }
    }

    /// Maps `offset` into `rect`, broadcasting single rows and columns.
    ///
    /// Returns `None` when the offset lies outside the rectangle.
    pub fn generate_point(&self, rect: Rect, offset: Point) -> Option<Point> {
        let size = rect.size;
        if size.is_single() {
            return Some(rect.origin);
        }
        let dx = if size.width == 1 { 0 } else { offset.x };
        let dy = if size.height == 1 { 0 } else { offset.y };
        if !size.contains_offset(Point::new(dx, dy)) {
            return None;
        }
        let max = self.max_size();
        let x = (rect.origin.x as u64 + dx as u64).min(max.width.saturating_sub(1) as u64);
        let y = (rect.origin.y as u64 + dy as u64).min(max.height.saturating_sub(1) as u64);
        Some(Point::new(x as u32, y as u32))
    }

    /// The scalar `generator` yields at the current offset, and whether the generator is a
    /// single value. `None` means the evaluation has to pause.
    pub fn generate_scalar(&mut self, generator: &ScalarGenerator) -> Option<(Scalar, bool)> {
        let offset = self.state.offset;
        match generator {
            ScalarGenerator::Scalar(value) => Some((value.clone(), true)),
            ScalarGenerator::Array(array) => {
                Some((array.eval(broadcast(array.size(), offset)), array.size().is_single()))
            }
            ScalarGenerator::Point(pt) => self.evaluate_cell(*pt).map(|v| (v, true)),
            ScalarGenerator::Rect(rect) => match self.generate_point(*rect, offset) {
                Some(pt) => self
                    .evaluate_cell(pt)
                    .map(|v| (v, rect.size.is_single())),
                None => Some((Scalar::Error(ErrorCode::InvalidArgs), false)),
            },
        }
    }

    /// [`generate_scalar`](Self::generate_scalar) over the last returned value, which is
    /// left in place.
    pub fn generate_returned(&mut self) -> Option<(Scalar, bool)> {
        let generator = std::mem::take(&mut self.state.returned_value);
        let result = self.generate_scalar(&generator);
        self.state.returned_value = generator;
        result
    }

    /// Reduces arrays and rectangles whose size differs from `extent` to the value at the
    /// current offset.
    pub fn singlify(&self, generator: ScalarGenerator, extent: Size) -> ScalarGenerator {
        let offset = self.state.offset;
        match generator {
            ScalarGenerator::Array(array) if array.size() != extent => {
                ScalarGenerator::Scalar(array.eval(broadcast(array.size(), offset)))
            }
            ScalarGenerator::Rect(rect) if rect.size != extent => {
                match self.generate_point(rect, offset) {
                    Some(pt) => ScalarGenerator::Point(pt),
                    None => ScalarGenerator::Scalar(Scalar::Error(ErrorCode::InvalidArgs)),
                }
            }
            other => other,
        }
    }

    /// Feeds every stored value inside `rect` to `visit`.
    ///
    /// Blank cells are skipped; no aggregator changes state on a blank. Every stale cell
    /// in the rectangle is recorded as a dependency before reporting
    /// [`AggregateOutcome::HasDependencies`].
    pub fn aggregate_rect(
        &mut self,
        rect: Rect,
        visit: &mut dyn FnMut(&Scalar) -> bool,
    ) -> AggregateOutcome {
        let rect = rect.clamped_to(self.max_size());
        let state = &mut *self.state;
        let mut outcome = AggregateOutcome::Success;
        self.cells.visit_range(rect, &mut |lookup| match lookup {
            CellLookup::Value(value) => {
                if outcome == AggregateOutcome::Success && !visit(value) {
                    outcome = AggregateOutcome::Aborted;
                    return false;
                }
                true
            }
            CellLookup::Stale(id) => {
                if !state.dependencies.contains(&id) {
                    state.dependencies.push(id);
                }
                outcome = AggregateOutcome::HasDependencies;
                true
            }
            CellLookup::Circular => {
                state.circular_dependency = true;
                outcome = AggregateOutcome::HasDependencies;
                false
            }
        });
        outcome
    }

    #[inline]
    pub fn increment_offset(&mut self, extent: Size) -> bool {
        self.state.increment_offset(extent)
    }
}

fn broadcast(size: Size, offset: Point) -> Point {
    Point::new(
        if size.width == 1 { 0 } else { offset.x },
        if size.height == 1 { 0 } else { offset.y },
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory cells for exercising nodes without a sheet.
    #[derive(Default)]
    pub(crate) struct TestCells {
        pub values: BTreeMap<(u32, u32), Scalar>,
        pub stale: BTreeMap<(u32, u32), FormulaId>,
        pub blocked: Vec<Rect>,
    }

    impl TestCells {
        pub fn with(values: &[(Point, Scalar)]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(pt, v)| ((pt.y, pt.x), v.clone()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl CellSource for TestCells {
        fn max_size(&self) -> Size {
            Size::new(100, 100)
        }

        fn used_size(&self) -> Size {
            let mut size = Size::new(0, 0);
            for &(y, x) in self.values.keys().chain(self.stale.keys()) {
                size.extend_to(Size::new(x + 1, y + 1));
            }
            size
        }

        fn lookup(&self, at: Point) -> CellLookup<'_> {
            if let Some(id) = self.stale.get(&(at.y, at.x)) {
                return CellLookup::Stale(*id);
            }
            static BLANK: Scalar = Scalar::Blank;
            CellLookup::Value(self.values.get(&(at.y, at.x)).unwrap_or(&BLANK))
        }

        fn visit_range(&self, area: Rect, visit: &mut dyn FnMut(CellLookup<'_>) -> bool) {
            for pt in area.points() {
                let key = (pt.y, pt.x);
                if self.values.contains_key(&key) || self.stale.contains_key(&key) {
                    if !visit(self.lookup(pt)) {
                        return;
                    }
                }
            }
        }

        fn is_spill_blocked(&self, _owner: Point, area: Rect) -> bool {
            self.blocked.iter().any(|b| {
                b.origin.x < area.right() as u32
                    && area.origin.x < b.right() as u32
                    && b.origin.y < area.bottom() as u32
                    && area.origin.y < b.bottom() as u32
            })
        }
    }

    fn with_context<R>(cells: &TestCells, f: impl FnOnce(&mut ExecutionContext<'_>) -> R) -> R {
        let mut state = EvalState::default();
        let refs = FormulaReferences::default();
        let mut ctx = ExecutionContext::new(&mut state, cells, &refs, Point::new(0, 0));
        f(&mut ctx)
    }

    #[test]
    fn points_broadcast_along_single_axes() {
        let cells = TestCells::default();
        with_context(&cells, |ctx| {
            let column = Rect::new(Point::new(2, 2), Size::new(1, 3));
            assert_eq!(ctx.generate_point(column, Point::new(5, 1)), Some(Point::new(2, 3)));
            assert_eq!(ctx.generate_point(column, Point::new(0, 3)), None);
            let block = Rect::new(Point::new(0, 0), Size::new(2, 2));
            assert_eq!(ctx.generate_point(block, Point::new(1, 1)), Some(Point::new(1, 1)));
            assert_eq!(ctx.generate_point(block, Point::new(2, 0)), None);
            let single = Rect::single(Point::new(4, 4));
            assert_eq!(ctx.generate_point(single, Point::new(9, 9)), Some(Point::new(4, 4)));
        });
    }

    #[test]
    fn rect_outside_offset_is_na() {
        let cells = TestCells::default();
        with_context(&cells, |ctx| {
            ctx.state.offset = Point::new(0, 5);
            let rect = ScalarGenerator::Rect(Rect::new(Point::new(0, 0), Size::new(1, 2)));
            assert_eq!(
                ctx.generate_scalar(&rect),
                Some((Scalar::Error(ErrorCode::InvalidArgs), false))
            );
        });
    }

    #[test]
    fn stale_cells_are_recorded_as_dependencies() {
        let mut cells = TestCells::with(&[(Point::new(0, 0), Scalar::from(1.0))]);
        cells.stale.insert((1, 0), FormulaId::from_raw(7));
        cells.stale.insert((2, 0), FormulaId::from_raw(9));
        with_context(&cells, |ctx| {
            assert_eq!(ctx.evaluate_cell(Point::new(0, 0)), Some(Scalar::from(1.0)));
            assert_eq!(ctx.evaluate_cell(Point::new(0, 1)), None);
            let mut sum = 0.0;
            let outcome = ctx.aggregate_rect(
                Rect::new(Point::new(0, 0), Size::new(1, 3)),
                &mut |v| {
                    sum += v.coerce_to_number().map_or(0.0, |n| n.value());
                    true
                },
            );
            assert_eq!(outcome, AggregateOutcome::HasDependencies);
            assert_eq!(
                ctx.state.dependencies.as_slice(),
                &[FormulaId::from_raw(7), FormulaId::from_raw(9)]
            );
        });
    }

    #[test]
    fn offsets_advance_row_major() {
        let cells = TestCells::default();
        with_context(&cells, |ctx| {
            let extent = Size::new(2, 2);
            let mut seen = vec![ctx.state.offset];
            while ctx.increment_offset(extent) {
                seen.push(ctx.state.offset);
            }
            assert_eq!(
                seen,
                vec![
                    Point::new(0, 0),
                    Point::new(1, 0),
                    Point::new(0, 1),
                    Point::new(1, 1)
                ]
            );
        });
    }

    #[test]
    fn singlify_keeps_matching_sizes() {
        let cells = TestCells::default();
        with_context(&cells, |ctx| {
            let rect = Rect::new(Point::new(3, 0), Size::new(1, 2));
            assert_eq!(
                ctx.singlify(ScalarGenerator::Rect(rect), Size::new(1, 2)),
                ScalarGenerator::Rect(rect)
            );
            ctx.state.offset = Point::new(0, 1);
            assert_eq!(
                ctx.singlify(ScalarGenerator::Rect(rect), Size::new(2, 2)),
                ScalarGenerator::Point(Point::new(3, 1))
            );
        });
    }
}
