use std::rc::Rc;

use formula_model::{Point, Rect, Scalar, Size};

use crate::{Formula, FormulaReferences};

/// Stable handle of a formula cell within its sheet.
///
/// Handles survive moves and structural edits; a handle is reused only after its cell
/// has been removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormulaId(u32);

impl FormulaId {
    #[inline]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Contents of one grid position.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Cell {
    Value(Scalar),
    /// Top-left cell of a formula result.
    Formula(FormulaId),
    /// One spilled position of a multi-cell formula result.
    Extension { parent: FormulaId, value: Scalar },
}

impl Cell {
    /// The formula owning this position, if any.
    pub fn owner(&self) -> Option<FormulaId> {
        match self {
            Cell::Value(_) => None,
            Cell::Formula(id) | Cell::Extension { parent: id, .. } => Some(*id),
        }
    }

    /// The value stored in the grid itself. A formula's own value lives in its
    /// [`FormulaCell`].
    pub fn stored_value(&self) -> Option<&Scalar> {
        match self {
            Cell::Value(value) | Cell::Extension { value, .. } => Some(value),
            Cell::Formula(_) => None,
        }
    }
}

/// A formula with its location and evaluation state.
#[derive(Debug)]
pub(crate) struct FormulaCell {
    pub formula: Rc<Formula>,
    pub references: Rc<FormulaReferences>,
    pub at: Point,
    /// Size of the last result; never empty.
    pub extent: Size,
    /// Value of the top-left position.
    pub value: Scalar,
    /// Equal to the sheet's generation once evaluated in the current pass.
    pub generation: bool,
    pub in_progress: bool,
    /// The last evaluation hit a circular dependency.
    pub blocked: bool,
    prev: Option<FormulaId>,
    next: Option<FormulaId>,
}

impl FormulaCell {
    pub fn new(
        formula: Rc<Formula>,
        references: Rc<FormulaReferences>,
        at: Point,
        generation: bool,
    ) -> Self {
        Self {
            formula,
            references,
            at,
            extent: Size::ONE,
            value: Scalar::Blank,
            generation,
            in_progress: false,
            blocked: false,
            prev: None,
            next: None,
        }
    }

    /// Whether a pass running at `generation` still has to evaluate this cell.
    #[inline]
    pub fn needs_recalc(&self, generation: bool) -> bool {
        self.generation != generation || self.blocked
    }

    #[inline]
    pub fn area(&self) -> Rect {
        Rect::new(self.at, self.extent)
    }
}

/// All formula cells of a sheet: a slab addressed by [`FormulaId`] whose live entries
/// are also threaded on a doubly-linked list giving the evaluation order.
#[derive(Debug, Default)]
pub(crate) struct FormulaCells {
    slots: Vec<Option<FormulaCell>>,
    free: Vec<FormulaId>,
    head: Option<FormulaId>,
    tail: Option<FormulaId>,
    len: usize,
}

impl FormulaCells {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn first(&self) -> Option<FormulaId> {
        self.head
    }

    pub fn next(&self, id: FormulaId) -> Option<FormulaId> {
        self.get(id).and_then(|cell| cell.next)
    }

    pub fn get(&self, id: FormulaId) -> Option<&FormulaCell> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: FormulaId) -> Option<&mut FormulaCell> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Adds `cell` at the end of the evaluation order.
    pub fn push_back(&mut self, cell: FormulaCell) -> FormulaId {
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(cell);
                id
            }
            None => {
                let raw = u32::try_from(self.slots.len())
                    .unwrap_or_else(|_| unreachable!("more formula cells than grid positions"));
                self.slots.push(Some(cell));
                FormulaId(raw)
            }
        };
        self.len += 1;
        self.link_before(id, None);
        id
    }

    pub fn remove(&mut self, id: FormulaId) -> Option<FormulaCell> {
        self.get(id)?;
        self.unlink(id);
        let cell = self.slots[id.index()].take();
        self.free.push(id);
        self.len -= 1;
        cell
    }

    /// Moves `id` to just before `before` in the evaluation order.
    pub fn move_before(&mut self, id: FormulaId, before: FormulaId) {
        if id == before || self.get(id).is_none() || self.get(before).is_none() {
            return;
        }
        self.unlink(id);
        self.link_before(id, Some(before));
    }

    /// Live cells in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (FormulaId, &FormulaCell)> + '_ {
        std::iter::successors(self.head, move |&id| self.next(id))
            .filter_map(move |id| self.get(id).map(|cell| (id, cell)))
    }

    /// Handles of the live cells in evaluation order.
    pub fn ids(&self) -> Vec<FormulaId> {
        self.iter().map(|(id, _)| id).collect()
    }

    fn links_mut(&mut self, id: FormulaId) -> &mut FormulaCell {
        match self.get_mut(id) {
            Some(cell) => cell,
            None => unreachable!("dangling formula list link"),
        }
    }

    fn unlink(&mut self, id: FormulaId) {
        let cell = self.links_mut(id);
        let (prev, next) = (cell.prev.take(), cell.next.take());
        match prev {
            Some(p) => self.links_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    /// Links a detached `id` before `before`, or at the end.
    fn link_before(&mut self, id: FormulaId, before: Option<FormulaId>) {
        let prev = match before {
            Some(b) => self.links_mut(b).prev,
            None => self.tail,
        };
        {
            let cell = self.links_mut(id);
            cell.prev = prev;
            cell.next = before;
        }
        match prev {
            Some(p) => self.links_mut(p).next = Some(id),
            None => self.head = Some(id),
        }
        match before {
            Some(b) => self.links_mut(b).prev = Some(id),
            None => self.tail = Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_model::MAX_GRID_SIZE;
    use pretty_assertions::assert_eq;

    fn cell(x: u32) -> FormulaCell {
        let at = Point::new(x, 0);
        let (formula, refs) = Formula::parse("=1", at, MAX_GRID_SIZE);
        FormulaCell::new(formula, refs, at, false)
    }

    fn order(cells: &FormulaCells) -> Vec<u32> {
        cells.iter().map(|(_, c)| c.at.x).collect()
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut cells = FormulaCells::default();
        let ids: Vec<_> = (0..4).map(|x| cells.push_back(cell(x))).collect();
        assert_eq!(order(&cells), vec![0, 1, 2, 3]);
        assert_eq!(cells.first(), Some(ids[0]));
        assert_eq!(cells.next(ids[3]), None);

        cells.move_before(ids[3], ids[1]);
        assert_eq!(order(&cells), vec![0, 3, 1, 2]);
        cells.move_before(ids[0], ids[2]);
        assert_eq!(order(&cells), vec![3, 1, 0, 2]);
        cells.move_before(ids[2], ids[3]);
        assert_eq!(order(&cells), vec![2, 3, 1, 0]);
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut cells = FormulaCells::default();
        let a = cells.push_back(cell(0));
        let b = cells.push_back(cell(1));
        let c = cells.push_back(cell(2));
        assert_eq!(cells.remove(b).map(|c| c.at.x), Some(1));
        assert!(cells.remove(b).is_none());
        assert_eq!(order(&cells), vec![0, 2]);
        assert_eq!(cells.len(), 2);

        let d = cells.push_back(cell(3));
        assert_eq!(d, b);
        assert_eq!(order(&cells), vec![0, 2, 3]);
        cells.remove(a);
        cells.remove(d);
        assert_eq!(cells.ids(), vec![c]);
    }

    #[test]
    fn extension_cells_report_their_owner() {
        let id = FormulaId::from_raw(3);
        assert_eq!(Cell::Formula(id).owner(), Some(id));
        let ext = Cell::Extension {
            parent: id,
            value: Scalar::Blank,
        };
        assert_eq!(ext.owner(), Some(id));
        assert_eq!(ext.stored_value(), Some(&Scalar::Blank));
        assert_eq!(Cell::Value(Scalar::from(1.0)).owner(), None);
        assert_eq!(Cell::Formula(id).stored_value(), None);
    }
}
