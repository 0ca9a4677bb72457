//! A1-style address math
//!
//! Converts between human-readable cell/range addresses and zero-based
//! `(row, col)` pairs. `$` absolute markers are accepted and ignored on input;
//! output is always the plain relative form (`B7`, `A1:C3`).

use regex::Regex;
use thiserror::Error;

/// Largest 0-based column index (`XFD`)
pub const MAX_COL: u32 = 16_383;
/// Largest 0-based row index (row 1048576)
pub const MAX_ROW: u32 = 1_048_575;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid cell address '{input}': {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: String,
}

impl AddressParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Inclusive cell rectangle, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl Bounds {
    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    pub fn to_range(&self) -> String {
        bounds_to_range(self.first_row, self.first_col, self.last_row, self.last_col)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

/// Convert a 0-based column index to letters (0 → `A`, 25 → `Z`, 26 → `AA`)
pub fn column_to_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a 0-based index (`A` → 0, `AA` → 26)
pub fn letters_to_column(letters: &str) -> Result<u32, AddressParseError> {
    if letters.is_empty() {
        return Err(AddressParseError::new(letters, "missing column letters"));
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(AddressParseError::new(letters, "non-letter in column part"));
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .ok_or_else(|| AddressParseError::new(letters, "column out of range"))?;
    }

    let col = col - 1;
    if col > MAX_COL {
        return Err(AddressParseError::new(letters, "column out of range"));
    }
    Ok(col)
}

/// Parse `B7` (or `$B$7`) into a zero-based `(row, col)` pair
pub fn address_to_row_col(address: &str) -> Result<(u32, u32), AddressParseError> {
    let cleaned: String = address.trim().chars().filter(|c| *c != '$').collect();

    let split = cleaned
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() {
        return Err(AddressParseError::new(address, "missing column letters"));
    }
    if digits.is_empty() {
        return Err(AddressParseError::new(address, "missing row number"));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AddressParseError::new(address, "row part is not numeric"));
    }

    let col = letters_to_column(letters).map_err(|e| AddressParseError::new(address, e.reason))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| AddressParseError::new(address, "row out of range"))?;
    if row == 0 {
        return Err(AddressParseError::new(address, "row numbers start at 1"));
    }
    if row - 1 > MAX_ROW {
        return Err(AddressParseError::new(address, "row out of range"));
    }

    Ok((row - 1, col))
}

/// Inverse of [`address_to_row_col`]
pub fn row_col_to_address(row: u32, col: u32) -> String {
    format!("{}{}", column_to_letters(col), row + 1)
}

/// Split `A1:C3` into 0-based bounds. A single cell yields `r0 == r1`,
/// `c0 == c1`. Reversed corners are normalized.
pub fn range_to_bounds(range: &str) -> Result<Bounds, AddressParseError> {
    let trimmed = range.trim();
    let (start, end) = match trimmed.split_once(':') {
        Some((start, end)) => (start, end),
        None => (trimmed, trimmed),
    };
    if end.contains(':') {
        return Err(AddressParseError::new(range, "more than one ':'"));
    }

    let (r0, c0) = address_to_row_col(start).map_err(|e| AddressParseError::new(range, e.reason))?;
    let (r1, c1) = address_to_row_col(end).map_err(|e| AddressParseError::new(range, e.reason))?;

    Ok(Bounds {
        first_row: r0.min(r1),
        first_col: c0.min(c1),
        last_row: r0.max(r1),
        last_col: c0.max(c1),
    })
}

/// Build `A1:C3` (or `A1` for a single cell) from 0-based bounds
pub fn bounds_to_range(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> String {
    if first_row == last_row && first_col == last_col {
        row_col_to_address(first_row, first_col)
    } else {
        format!(
            "{}:{}",
            row_col_to_address(first_row, first_col),
            row_col_to_address(last_row, last_col)
        )
    }
}

/// A reference of the form `Sheet1!$A$1:$B$5` or `'My Sheet'!B2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    /// Unquoted sheet name, `None` when the reference has no sheet part
    pub sheet: Option<String>,
    pub bounds: Bounds,
}

impl SheetReference {
    /// Parse a reference, with or without a leading `=`
    pub fn parse(reference: &str) -> Result<Self, AddressParseError> {
        let pattern = Regex::new(r"^(?:(?:'((?:[^']|'')+)'|([^'!]+))!)?(\$?[A-Za-z]{1,3}\$?\d+(?::\$?[A-Za-z]{1,3}\$?\d+)?)$")
            .map_err(|e| AddressParseError::new(reference, format!("regex error: {e}")))?;

        let text = reference.trim().trim_start_matches('=');
        let captures = pattern
            .captures(text)
            .ok_or_else(|| AddressParseError::new(reference, "not a sheet reference"))?;

        let sheet = captures
            .get(1)
            .map(|m| m.as_str().replace("''", "'"))
            .or_else(|| captures.get(2).map(|m| m.as_str().to_string()));
        let range = captures
            .get(3)
            .map(|m| m.as_str())
            .ok_or_else(|| AddressParseError::new(reference, "missing range part"))?;
        let bounds = range_to_bounds(range).map_err(|e| AddressParseError::new(reference, e.reason))?;

        Ok(Self { sheet, bounds })
    }

    pub fn is_single_cell(&self) -> bool {
        self.bounds.is_single_cell()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_to_letters(0), "A");
        assert_eq!(column_to_letters(25), "Z");
        assert_eq!(column_to_letters(26), "AA");
        assert_eq!(column_to_letters(701), "ZZ");
        assert_eq!(column_to_letters(702), "AAA");
        assert_eq!(column_to_letters(MAX_COL), "XFD");

        assert_eq!(letters_to_column("A").unwrap(), 0);
        assert_eq!(letters_to_column("aa").unwrap(), 26);
        assert_eq!(letters_to_column("XFD").unwrap(), MAX_COL);
        assert!(letters_to_column("XFE").is_err());
    }

    #[test]
    fn test_address_to_row_col() {
        assert_eq!(address_to_row_col("A1").unwrap(), (0, 0));
        assert_eq!(address_to_row_col("B2").unwrap(), (1, 1));
        assert_eq!(address_to_row_col("$C$10").unwrap(), (9, 2));
        assert_eq!(address_to_row_col("AB100").unwrap(), (99, 27));
    }

    #[test]
    fn test_address_parse_errors() {
        for bad in ["", "A", "12", "A0", "A1B", "1A", "A-1"] {
            let err = address_to_row_col(bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn test_address_round_trip() {
        for address in ["A1", "Z99", "AA1", "XFD1048576", "BC42"] {
            let (row, col) = address_to_row_col(address).unwrap();
            assert_eq!(row_col_to_address(row, col), address);
        }
        for row in (0..5000).step_by(37) {
            for col in (0..2000).step_by(53) {
                let address = row_col_to_address(row, col);
                assert_eq!(address_to_row_col(&address).unwrap(), (row, col));
            }
        }
    }

    #[test]
    fn test_range_to_bounds() {
        let b = range_to_bounds("D1:E1").unwrap();
        assert_eq!((b.first_row, b.first_col, b.last_row, b.last_col), (0, 3, 0, 4));

        let single = range_to_bounds("C5").unwrap();
        assert!(single.is_single_cell());
        assert_eq!(single.first_row, single.last_row);
        assert_eq!(single.first_col, single.last_col);

        let reversed = range_to_bounds("C3:A1").unwrap();
        assert_eq!(reversed.to_range(), "A1:C3");

        assert!(range_to_bounds("A1:B2:C3").is_err());
        assert!(range_to_bounds("A1:").is_err());
    }

    #[test]
    fn test_sheet_reference() {
        let r = SheetReference::parse("Sheet1!$B$2:$B$6").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Sheet1"));
        assert_eq!(r.bounds.to_range(), "B2:B6");

        let quoted = SheetReference::parse("='Q1 ''Data'''!A1").unwrap();
        assert_eq!(quoted.sheet.as_deref(), Some("Q1 'Data'"));
        assert!(quoted.is_single_cell());

        let bare = SheetReference::parse("C3").unwrap();
        assert_eq!(bare.sheet, None);

        assert!(SheetReference::parse("Sheet1!").is_err());
        assert!(SheetReference::parse("not a ref").is_err());
    }
}
