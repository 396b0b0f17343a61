use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EXCEL_MAX_ROWS: u32 = 1_048_576;
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// Zero-based cell position: `CellRef { row: 0, col: 0 }` is `A1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn to_a1(self) -> String {
        let mut letters = Vec::new();
        let mut n = self.col + 1;
        while n > 0 {
            n -= 1;
            letters.push(char::from(b'A' + (n % 26) as u8));
            n /= 26;
        }
        letters.iter().rev().collect::<String>() + &(self.row + 1).to_string()
    }

    /// Parse `B3`, `$B$3` or `b3`.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let (letters, rest) = split_anchor(s, |c| c.is_ascii_alphabetic());
        if letters.is_empty() {
            return Err(A1ParseError::MissingColumn);
        }
        let (digits, trailing) = split_anchor(rest, |c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(A1ParseError::MissingRow);
        }
        if !trailing.is_empty() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = letters
            .bytes()
            .try_fold(0u32, |acc, b| {
                let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
                acc.checked_mul(26)?.checked_add(digit)
            })
            .filter(|col| (1..=EXCEL_MAX_COLS).contains(col))
            .ok_or(A1ParseError::InvalidColumn)?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|row| (1..=EXCEL_MAX_ROWS).contains(row))
            .ok_or(A1ParseError::InvalidRow)?;

        Ok(Self::new(row - 1, col - 1))
    }
}

/// Strip an optional `$` and split off the leading run of characters matching `pred`.
fn split_anchor(s: &str, pred: impl Fn(char) -> bool) -> (&str, &str) {
    let s = s.strip_prefix('$').unwrap_or(s);
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    s.split_at(end)
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// An inclusive rectangle; `start` is always the top-left corner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// The rectangle spanned by two opposite corners, in either order.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Parse `A1:C4` or a lone `B2`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }
        let (a, b) = s.split_once(':').unwrap_or((s, s));
        Ok(Range::new(CellRef::from_a1(a)?, CellRef::from_a1(b)?))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty cell reference")]
    Empty,
    #[error("cell reference has no column letters")]
    MissingColumn,
    #[error("cell reference has no row number")]
    MissingRow,
    #[error("column is outside A..XFD")]
    InvalidColumn,
    #[error("row is outside 1..1048576")]
    InvalidRow,
    #[error("unexpected characters after the row number")]
    TrailingCharacters,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty range reference")]
    Empty,
    #[error("bad range corner: {0}")]
    Cell(#[from] A1ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses_columns_past_z() {
        for (a1, row, col) in [("A1", 0, 0), ("Z9", 8, 25), ("AA10", 9, 26), ("BC32", 31, 54)] {
            let cell = CellRef::new(row, col);
            assert_eq!(cell.to_a1(), a1);
            assert_eq!(CellRef::from_a1(a1), Ok(cell));
        }
        assert_eq!(CellRef::from_a1("$c$7"), Ok(CellRef::new(6, 2)));
    }

    #[test]
    fn ranges_normalize_and_print_compactly() {
        let range = Range::from_a1("D4:B2").unwrap();
        assert_eq!(range.start, CellRef::new(1, 1));
        assert_eq!(range.end, CellRef::new(3, 3));
        assert_eq!(range.to_string(), "B2:D4");

        let single = Range::from_a1("E5").unwrap();
        assert!(single.is_single_cell());
        assert_eq!(single.to_string(), "E5");
    }

    #[test]
    fn rejects_malformed_references() {
        assert!(CellRef::from_a1("XFD1048576").is_ok());
        assert_eq!(CellRef::from_a1(""), Err(A1ParseError::Empty));
        assert_eq!(CellRef::from_a1("12"), Err(A1ParseError::MissingColumn));
        assert_eq!(CellRef::from_a1("AB"), Err(A1ParseError::MissingRow));
        assert_eq!(CellRef::from_a1("XFE1"), Err(A1ParseError::InvalidColumn));
        assert_eq!(CellRef::from_a1("A0"), Err(A1ParseError::InvalidRow));
        assert_eq!(CellRef::from_a1("B2!"), Err(A1ParseError::TrailingCharacters));
        assert_eq!(
            Range::from_a1("A1:"),
            Err(RangeParseError::Cell(A1ParseError::Empty))
        );
    }
}
