use std::rc::Rc;

use formula_model::{AnyReference, Axis, Point, Size};

/// The distinct references of one formula, addressed by index from its tree.
///
/// Instances are immutable and shared. Adjustments take the shared handle and return it
/// unchanged when no entry is affected; otherwise they build a fresh instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaReferences {
    items: Box<[AnyReference]>,
}

impl FormulaReferences {
    pub fn new(items: Vec<AnyReference>) -> Self {
        Self {
            items: items.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&AnyReference> {
        self.items.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnyReference> {
        self.items.iter()
    }

    fn adjusted(this: &Rc<Self>, f: impl Fn(&AnyReference) -> AnyReference) -> Rc<Self> {
        let mut changed: Option<Vec<AnyReference>> = None;
        for (idx, item) in this.items.iter().enumerate() {
            let adjusted = f(item);
            match &mut changed {
                Some(items) => items.push(adjusted),
                None if adjusted != *item => {
                    let mut items = Vec::with_capacity(this.items.len());
                    items.extend_from_slice(&this.items[..idx]);
                    items.push(adjusted);
                    changed = Some(items);
                }
                None => {}
            }
        }
        match changed {
            Some(items) => Rc::new(Self::new(items)),
            None => Rc::clone(this),
        }
    }

    /// References as seen from a copy of the formula at `dest`. Entries that no longer
    /// resolve become illegal.
    pub fn adjusted_to_copy(this: &Rc<Self>, dest: Point, max: Size) -> Rc<Self> {
        Self::adjusted(this, |r| r.adjusted_to_copy(dest, max))
    }

    /// References of a formula moved from `from` to `to`; targets stay where they are.
    pub fn adjusted_to_move(this: &Rc<Self>, from: Point, to: Point) -> Rc<Self> {
        let (dx, dy) = from.distance_to(to);
        if dx == 0 && dy == 0 {
            return Rc::clone(this);
        }
        Self::adjusted(this, |r| r.adjusted_to_move(dx, dy))
    }

    /// `at` is the formula's location before the edit.
    pub fn adjusted_to_deletion(
        this: &Rc<Self>,
        axis: Axis,
        at: Point,
        start: u32,
        count: u32,
    ) -> Rc<Self> {
        Self::adjusted(this, |r| r.adjusted_to_deletion(axis, at, start, count))
    }

    /// `at` is the formula's location before the edit.
    pub fn adjusted_to_insertion(
        this: &Rc<Self>,
        axis: Axis,
        at: Point,
        before: u32,
        count: u32,
        max: Size,
    ) -> Rc<Self> {
        Self::adjusted(this, |r| r.adjusted_to_insertion(axis, at, before, count, max))
    }
}
