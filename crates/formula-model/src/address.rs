//! A1-style names for grid coordinates.

use core::fmt;

use thiserror::Error;

use crate::{Point, Rect, MAX_GRID_SIZE};

/// Errors that can occur when parsing an A1 cell name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// Errors that can occur when parsing an A1 range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty A1 range")]
    Empty,
    #[error("invalid cell reference in range: {0}")]
    Cell(#[from] A1ParseError),
}

/// Column letters for a 0-based column index (`0 -> A`, `26 -> AA`).
pub fn column_name(x: u32) -> String {
    let mut n = x as u64 + 1;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.iter().rev().map(|&b| b as char).collect()
}

/// 0-based column index for column letters; case-insensitive.
pub fn column_index(name: &str) -> Result<u32, A1ParseError> {
    if name.is_empty() {
        return Err(A1ParseError::MissingColumn);
    }
    let mut col: u64 = 0;
    for b in name.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        col = col * 26 + (b.to_ascii_uppercase() - b'A') as u64 + 1;
        if col > MAX_GRID_SIZE.width as u64 {
            return Err(A1ParseError::InvalidColumn);
        }
    }
    Ok((col - 1) as u32)
}

/// 0-based row index for 1-based row digits.
pub fn row_index(digits: &str) -> Result<u32, A1ParseError> {
    if digits.is_empty() {
        return Err(A1ParseError::MissingRow);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(A1ParseError::InvalidRow);
    }
    let row: u64 = digits.parse().map_err(|_| A1ParseError::InvalidRow)?;
    if row == 0 || row > MAX_GRID_SIZE.height as u64 {
        return Err(A1ParseError::InvalidRow);
    }
    Ok((row - 1) as u32)
}

impl Point {
    /// Parses a cell name such as `B3` or `$B$3`. `$` markers are accepted and ignored.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }
        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        let x = column_index(&s[col_start..idx])?;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }
        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx != bytes.len() && idx != row_start {
            return Err(A1ParseError::TrailingCharacters);
        }
        let y = row_index(&s[row_start..])?;
        Ok(Point::new(x, y))
    }

    /// The A1 name of this point.
    pub fn to_a1(self) -> String {
        format!("{}{}", column_name(self.x), self.y as u64 + 1)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

impl Rect {
    /// Parses `A1:B2` (corners in any order) or a single cell name.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }
        match s.split_once(':') {
            None => Ok(Rect::single(Point::from_a1(s)?)),
            Some((a, b)) => Ok(Rect::from_corners(Point::from_a1(a)?, Point::from_a1(b)?)),
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size.is_single() {
            return write!(f, "{}", self.origin);
        }
        let end = Point::new(
            self.origin.x + self.size.width - 1,
            self.origin.y + self.size.height - 1,
        );
        write!(f, "{}:{}", self.origin, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size;

    #[test]
    fn column_names_are_bijective_base_26() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
        assert_eq!(column_name(MAX_GRID_SIZE.width - 1), "CRXO");
        for x in [0, 1, 25, 26, 27, 701, 702, 16383, 65534] {
            assert_eq!(column_index(&column_name(x)), Ok(x));
        }
        assert_eq!(column_index("CRXP"), Err(A1ParseError::InvalidColumn));
    }

    #[test]
    fn parses_cell_names() {
        assert_eq!(Point::from_a1("A1"), Ok(Point::new(0, 0)));
        assert_eq!(Point::from_a1("$c$12"), Ok(Point::new(2, 11)));
        assert_eq!(
            Point::from_a1("CRXO2147483647"),
            Ok(Point::new(65534, 2147483646))
        );
        assert_eq!(Point::from_a1("A0"), Err(A1ParseError::InvalidRow));
        assert_eq!(Point::from_a1("A2147483648"), Err(A1ParseError::InvalidRow));
        assert_eq!(Point::from_a1("12"), Err(A1ParseError::MissingColumn));
        assert_eq!(Point::from_a1("A"), Err(A1ParseError::MissingRow));
        assert_eq!(Point::from_a1("A1B"), Err(A1ParseError::TrailingCharacters));
        assert_eq!(Point::from_a1(""), Err(A1ParseError::Empty));
    }

    #[test]
    fn parses_and_formats_ranges() {
        let r = Rect::from_a1("C4:A1").expect("range");
        assert_eq!(r, Rect::new(Point::new(0, 0), Size::new(3, 4)));
        assert_eq!(r.to_string(), "A1:C4");
        assert_eq!(Rect::from_a1("B2").map(|r| r.to_string()), Ok("B2".to_string()));
        assert_eq!(
            Rect::from_a1("B2:"),
            Err(RangeParseError::Cell(A1ParseError::Empty))
        );
    }
}
