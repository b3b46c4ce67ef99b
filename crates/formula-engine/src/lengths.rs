//! Row heights, column widths and hidden flags.
//!
//! Lengths are stored per run of equal lines in an [`IntervalMap`], so a sheet with a
//! handful of custom rows costs a handful of entries no matter how tall it is. Structural
//! edits shift the runs along with the cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Display length of one row or column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LengthInfo {
    /// `None` means the default length.
    pub length: Option<u32>,
    pub hidden: bool,
}

impl LengthInfo {
    pub const DEFAULT: LengthInfo = LengthInfo {
        length: None,
        hidden: false,
    };

    pub const fn new(length: Option<u32>, hidden: bool) -> Self {
        Self { length, hidden }
    }
}

/// Values attached to half-open index ranges `[start, end)`.
///
/// Ranges never overlap, are never empty, and adjacent ranges always hold different
/// values; equal neighbours are merged as soon as they touch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalMap<V> {
    /// Keyed by start; the value holds the end.
    intervals: BTreeMap<u32, (u32, V)>,
}

impl<V: Clone + PartialEq> IntervalMap<V> {
    pub fn new() -> Self {
        Self {
            intervals: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// The value covering `index`.
    pub fn get(&self, index: u32) -> Option<&V> {
        self.intervals
            .range(..=index)
            .next_back()
            .filter(|(_, (end, _))| *end > index)
            .map(|(_, (_, value))| value)
    }

    /// Stored ranges in order, as `(start, end, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &V)> + '_ {
        self.intervals
            .iter()
            .map(|(start, (end, value))| (*start, *end, value))
    }

    pub fn set(&mut self, start: u32, end: u32, value: V) {
        self.modify(start, end, |_| Some(value.clone()));
    }

    pub fn clear(&mut self, start: u32, end: u32) {
        self.modify(start, end, |_| None);
    }

    /// Replaces every piece of `[start, end)` by what `f` makes of it. Pieces with no
    /// value, gaps included, are passed `None`; returning `None` leaves a gap.
    pub fn modify(&mut self, start: u32, end: u32, mut f: impl FnMut(Option<&V>) -> Option<V>) {
        if start >= end {
            return;
        }
        self.split_at(start);
        self.split_at(end);

        let inside: Vec<u32> = self.intervals.range(start..end).map(|(s, _)| *s).collect();
        let mut pieces = Vec::with_capacity(inside.len() * 2 + 1);
        let mut pos = start;
        for key in inside {
            let Some((stop, value)) = self.intervals.remove(&key) else {
                continue;
            };
            if pos < key {
                pieces.push((pos, key, f(None)));
            }
            pieces.push((key, stop, f(Some(&value))));
            pos = stop;
        }
        if pos < end {
            pieces.push((pos, end, f(None)));
        }
        for (s, e, value) in pieces {
            if let Some(value) = value {
                self.intervals.insert(s, (e, value));
            }
        }
        self.coalesce(start, end);
    }

    /// Values from `start` to `end` with the gaps filled by `default`.
    pub fn iter_with_default(
        &self,
        start: u32,
        end: u32,
        default: V,
    ) -> impl Iterator<Item = (u32, u32, V)> + '_ {
        let end = end.max(start);
        let first = self
            .intervals
            .range(..start)
            .next_back()
            .filter(|(_, (stop, _))| *stop > start);
        let mut stored = first
            .into_iter()
            .chain(self.intervals.range(start..end))
            .map(|(s, (e, value))| (*s, *e, value))
            .peekable();
        let mut pos = start;
        std::iter::from_fn(move || {
            if pos >= end {
                return None;
            }
            let (stop, value) = match stored.peek() {
                Some(&(s, e, value)) if s <= pos => {
                    stored.next();
                    (e.min(end), value.clone())
                }
                Some(&(s, _, _)) => (s.min(end), default.clone()),
                None => (end, default.clone()),
            };
            let item = (pos, stop, value);
            pos = stop;
            Some(item)
        })
    }

    /// Opens `count` indices before `before`. A range starting at or running across
    /// `before` grows; later ranges move up.
    pub fn insert_indices(&mut self, before: u32, count: u32) {
        if count == 0 {
            return;
        }
        if let Some((_, (end, _))) = self.intervals.range_mut(..before).next_back() {
            if *end > before {
                *end = end.saturating_add(count);
            }
        }
        let later = self.intervals.split_off(&before);
        for (start, (end, value)) in later {
            let start = if start == before {
                start
            } else {
                start.saturating_add(count)
            };
            self.intervals.insert(start, (end.saturating_add(count), value));
        }
    }

    /// Removes the indices `[start, end)`; later ranges move down and ranges inside the
    /// span disappear.
    pub fn erase_indices(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }
        let count = end - start;
        let map = |i: u32| {
            if i <= start {
                i
            } else if i >= end {
                i - count
            } else {
                start
            }
        };
        if let Some((_, (stop, _))) = self.intervals.range_mut(..start).next_back() {
            *stop = map(*stop);
        }
        let later = self.intervals.split_off(&start);
        for (s, (e, value)) in later {
            let (s, e) = (map(s), map(e));
            if s < e {
                self.intervals.insert(s, (e, value));
            }
        }
        self.coalesce(start, start);
    }

    /// Cuts the range running across `index` in two.
    fn split_at(&mut self, index: u32) {
        let Some((_, (end, value))) = self.intervals.range_mut(..index).next_back() else {
            return;
        };
        if *end <= index {
            return;
        }
        let tail = (*end, value.clone());
        *end = index;
        self.intervals.insert(index, tail);
    }

    /// Merges equal neighbours from the range before `from` up to the one starting at `to`.
    fn coalesce(&mut self, from: u32, to: u32) {
        let low = self
            .intervals
            .range(..from)
            .next_back()
            .map_or(from, |(s, _)| *s);
        let keys: Vec<u32> = self.intervals.range(low..=to).map(|(s, _)| *s).collect();
        let mut previous: Option<u32> = None;
        for key in keys {
            let Some((end, value)) = self.intervals.get(&key).cloned() else {
                continue;
            };
            let joins = previous.filter(|p| {
                matches!(self.intervals.get(p), Some((stop, v)) if *stop == key && *v == value)
            });
            match joins {
                Some(p) => {
                    if let Some((stop, _)) = self.intervals.get_mut(&p) {
                        *stop = end;
                    }
                    self.intervals.remove(&key);
                }
                None => previous = Some(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type Map = IntervalMap<u32>;

    fn render(map: &Map) -> String {
        map.iter()
            .map(|(s, e, v)| format!("[{s}, {e}, {v}]"))
            .collect()
    }

    fn lookup(map: &Map, index: u32) -> u32 {
        map.get(index).copied().unwrap_or(42)
    }

    #[test]
    fn empty_map() {
        let mut map = Map::new();
        assert_eq!(render(&map), "");
        assert_eq!(lookup(&map, 0), 42);
        assert_eq!(lookup(&map, 70), 42);
        map.clear(0, 1);
        map.clear(25, 26);
        assert!(map.is_empty());
    }

    #[test]
    fn single_indices() {
        let mut map = Map::new();
        map.set(15, 16, 3);
        map.set(13, 14, 3);
        assert_eq!(render(&map), "[13, 14, 3][15, 16, 3]");
        assert_eq!(lookup(&map, 14), 42);
        map.set(14, 15, 3);
        assert_eq!(render(&map), "[13, 16, 3]");
        map.clear(14, 15);
        assert_eq!(render(&map), "[13, 14, 3][15, 16, 3]");
        map.set(14, 15, 3);
        map.clear(15, 16);
        assert_eq!(render(&map), "[13, 15, 3]");
        map.set(15, 16, 3);
        map.clear(13, 14);
        assert_eq!(render(&map), "[14, 16, 3]");
        assert_eq!(lookup(&map, 13), 42);
        assert_eq!(lookup(&map, 15), 3);
    }

    #[test]
    fn ranges_split_and_merge() {
        let mut map = Map::new();
        map.set(0, 0, 13);
        map.set(10, 10, 13);
        assert_eq!(render(&map), "");

        map.set(5, 10, 13);
        map.set(5, 10, 12);
        assert_eq!(render(&map), "[5, 10, 12]");
        map.set(8, 13, 12);
        map.set(3, 9, 12);
        assert_eq!(render(&map), "[3, 13, 12]");
        map.set(3, 5, 3);
        assert_eq!(render(&map), "[3, 5, 3][5, 13, 12]");
        map.set(10, 13, 8);
        map.set(9, 11, 6);
        assert_eq!(render(&map), "[3, 5, 3][5, 9, 12][9, 11, 6][11, 13, 8]");
        map.clear(9, 11);
        assert_eq!(render(&map), "[3, 5, 3][5, 9, 12][11, 13, 8]");
        map.set(8, 12, 65);
        assert_eq!(render(&map), "[3, 5, 3][5, 8, 12][8, 12, 65][12, 13, 8]");
        map.set(9, 10, 100);
        assert_eq!(
            render(&map),
            "[3, 5, 3][5, 8, 12][8, 9, 65][9, 10, 100][10, 12, 65][12, 13, 8]"
        );
        map.set(3, 13, 4);
        assert_eq!(render(&map), "[3, 13, 4]");
    }

    #[test]
    fn setting_across_several_ranges() {
        let build = || {
            let mut map = Map::new();
            map.set(0, 4, 2);
            map.set(4, 6, 3);
            map.set(6, 8, 4);
            map.set(8, 10, 2);
            map
        };
        let mut map = build();
        map.clear(4, 9);
        assert_eq!(render(&map), "[0, 4, 2][9, 10, 2]");
        for start in [0, 3, 4] {
            let mut map = build();
            map.set(start, 9, 2);
            assert_eq!(render(&map), "[0, 10, 2]");
        }

        let mut map = Map::new();
        map.set(0, 5, 3);
        map.set(5, 7, 4);
        map.set(4, 5, 4);
        assert_eq!(render(&map), "[0, 4, 3][4, 7, 4]");
        map.set(2, 5, 3);
        assert_eq!(render(&map), "[0, 5, 3][5, 7, 4]");
    }

    #[test]
    fn modify_sees_gaps_and_values() {
        let mut map = Map::new();
        map.set(2, 4, 1);
        map.modify(0, 6, |v| Some(v.map_or(0, |v| v + 10)));
        assert_eq!(render(&map), "[0, 2, 0][2, 4, 11][4, 6, 0]");
        map.modify(1, 5, |v| v.filter(|v| **v > 5).copied());
        assert_eq!(render(&map), "[0, 1, 0][2, 4, 11][5, 6, 0]");
    }

    #[test]
    fn iteration_fills_gaps() {
        let map = Map::new();
        let all: Vec<_> = map.iter_with_default(10, 15, 42).collect();
        assert_eq!(all, vec![(10, 15, 42)]);
        assert_eq!(map.iter_with_default(90, 90, 42).count(), 0);

        let mut map = Map::new();
        map.set(0, 7, 12);
        map.set(13, 45, 22);
        let collect = |s, e| map.iter_with_default(s, e, 42).collect::<Vec<_>>();
        assert_eq!(collect(5, 9), vec![(5, 7, 12), (7, 9, 42)]);
        assert_eq!(collect(10, 12), vec![(10, 12, 42)]);
        assert_eq!(collect(10, 27), vec![(10, 13, 42), (13, 27, 22)]);
        assert_eq!(
            collect(10, 48),
            vec![(10, 13, 42), (13, 45, 22), (45, 48, 42)]
        );
    }

    #[test]
    fn inserting_indices() {
        let mut map = Map::new();
        map.insert_indices(0, 10);
        assert!(map.is_empty());

        map.set(4, 6, 5);
        map.insert_indices(3, 7);
        assert_eq!(render(&map), "[11, 13, 5]");
        map.insert_indices(11, 2);
        assert_eq!(render(&map), "[11, 15, 5]");
        map.insert_indices(12, 2);
        assert_eq!(render(&map), "[11, 17, 5]");
        map.insert_indices(17, 2);
        assert_eq!(render(&map), "[11, 17, 5]");

        let mut map = Map::new();
        map.set(2, 5, 16);
        map.set(8, 11, 17);
        map.set(14, 17, 18);
        map.insert_indices(6, 1);
        assert_eq!(render(&map), "[2, 5, 16][9, 12, 17][15, 18, 18]");
        map.insert_indices(9, 1);
        assert_eq!(render(&map), "[2, 5, 16][9, 13, 17][16, 19, 18]");
        map.insert_indices(10, 1);
        assert_eq!(render(&map), "[2, 5, 16][9, 14, 17][17, 20, 18]");
    }

    #[test]
    fn erasing_indices() {
        let mut map = Map::new();
        map.erase_indices(0, 10);
        assert!(map.is_empty());

        map.set(8, 24, 5);
        map.erase_indices(2, 4);
        assert_eq!(render(&map), "[6, 22, 5]");
        map.erase_indices(6, 8);
        assert_eq!(render(&map), "[6, 20, 5]");
        map.erase_indices(10, 18);
        assert_eq!(render(&map), "[6, 12, 5]");

        let mut map = Map::new();
        map.set(8, 16, 5);
        map.set(20, 36, 6);
        map.set(40, 41, 7);
        map.erase_indices(8, 10);
        assert_eq!(render(&map), "[8, 14, 5][18, 34, 6][38, 39, 7]");
        map.erase_indices(12, 19);
        assert_eq!(render(&map), "[8, 12, 5][12, 27, 6][31, 32, 7]");
        map.erase_indices(11, 31);
        assert_eq!(render(&map), "[8, 11, 5][11, 12, 7]");
    }

    #[test]
    fn erasing_joins_equal_neighbours() {
        let mut map = Map::new();
        map.set(0, 2, 1);
        map.set(4, 6, 1);
        map.erase_indices(2, 4);
        assert_eq!(render(&map), "[0, 4, 1]");
    }
}
