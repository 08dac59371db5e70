//! A1-style addressing helpers shared by the reader and the template patcher.

use std::fmt;

use chrono::NaiveDate;

use crate::error::{Result, ToolError};

/// Converts a column letter (`A`, `AB`, ...) into a zero-based column index.
pub fn column_index(letters: &str) -> Result<u32> {
    let trimmed = letters.trim();
    if trimmed.is_empty() || trimmed.len() > 3 {
        return Err(ToolError::InvalidColumn(letters.to_string()));
    }

    let mut index: u32 = 0;
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ToolError::InvalidColumn(letters.to_string()));
        }
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        index = index * 26 + digit;
    }

    Ok(index - 1)
}

/// Converts a zero-based column index into its column letters.
pub fn column_letters(index: u32) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Address of a single cell: 1-based row, zero-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Builds a reference from a row number and a column letter.
    pub fn at(row: u32, column: &str) -> Result<Self> {
        Ok(Self::new(row, column_index(column)?))
    }

    /// Parses an `A1`-style reference such as `E12`.
    pub fn parse(reference: &str) -> Result<Self> {
        let split = reference
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("bad cell reference '{reference}'")))?;
        let (letters, digits) = reference.split_at(split);
        let row = digits
            .parse::<u32>()
            .map_err(|_| ToolError::InvalidWorkbook(format!("bad cell reference '{reference}'")))?;
        Ok(Self::new(row, column_index(letters)?))
    }

    pub fn column_letters(&self) -> String {
        column_letters(self.column)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

/// Index into a workbook's cell format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellStyle(pub u32);

/// Value written into a report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}
