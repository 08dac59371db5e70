use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::io::cell::{CellRef, column_letters};
use crate::io::dates::serial_to_date;

/// Value of a single source cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellData {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Read-only grid of one source sheet, addressed by 1-based row and
/// zero-based column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    cells: HashMap<CellRef, CellData>,
    last_row: u32,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores a cell value, growing the sheet's used range as needed.
    pub fn set(&mut self, cell: CellRef, data: CellData) -> &mut Self {
        self.last_row = self.last_row.max(cell.row);
        self.cells.insert(cell, data);
        self
    }

    /// Last row holding any value, 0 for an empty sheet.
    pub fn last_row(&self) -> u32 {
        self.last_row
    }

    /// Reads a cell as text. Blank cells read as an empty string.
    pub fn text(&self, row: u32, column: u32) -> String {
        match self.cells.get(&CellRef::new(row, column)) {
            Some(CellData::Text(value)) => value.clone(),
            Some(CellData::Number(value)) => value.to_string(),
            Some(CellData::Date(value)) => value.format("%Y-%m-%d").to_string(),
            None => String::new(),
        }
    }

    /// Reads a cell as a number. Blank cells read as zero.
    pub fn number(&self, row: u32, column: u32) -> Result<f64> {
        match self.cells.get(&CellRef::new(row, column)) {
            Some(CellData::Number(value)) if value.is_finite() => Ok(*value),
            Some(CellData::Number(value)) => Err(self.invalid_number(row, column, &value.to_string())),
            None => Ok(0.0),
            Some(CellData::Text(value)) if value.trim().is_empty() => Ok(0.0),
            Some(CellData::Text(value)) => value
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| self.invalid_number(row, column, value)),
            Some(CellData::Date(value)) => Err(self.invalid_number(row, column, &value.to_string())),
        }
    }

    fn invalid_number(&self, row: u32, column: u32, value: &str) -> ToolError {
        ToolError::InvalidNumber {
            sheet: self.name.clone(),
            row,
            column: column_letters(column),
            value: value.to_string(),
        }
    }
}

/// Capability to enumerate and read the sheets of a source workbook.
pub trait SpreadsheetReader {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Loads the named sheet.
    fn read_sheet(&mut self, name: &str) -> Result<Sheet>;
}

/// Workbook held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<Sheet>,
}

impl MemoryWorkbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }
}

impl SpreadsheetReader for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .cloned()
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))
    }
}

/// `.xlsx` workbook read through calamine.
pub struct XlsxReader {
    workbook: Xlsx<BufReader<File>>,
}

impl XlsxReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let workbook: Xlsx<_> = open_workbook(path)?;
        debug!(path = %path.display(), "workbook opened");
        Ok(Self { workbook })
    }
}

impl SpreadsheetReader for XlsxReader {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet> {
        let range = self
            .workbook
            .worksheet_range(name)
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))??;

        let mut sheet = Sheet::new(name);
        let (first_row, first_column) = match range.start() {
            Some(start) => start,
            None => return Ok(sheet),
        };

        for (row, column, value) in range.cells() {
            let cell = CellRef::new(first_row + row as u32 + 1, first_column + column as u32);
            if let Some(data) = convert_cell(value) {
                sheet.set(cell, data);
            }
        }

        Ok(sheet)
    }
}

fn convert_cell(value: &DataType) -> Option<CellData> {
    match value {
        DataType::Empty => None,
        DataType::String(text) => Some(CellData::Text(text.clone())),
        DataType::Float(number) => Some(CellData::Number(*number)),
        DataType::Int(number) => Some(CellData::Number(*number as f64)),
        DataType::DateTime(serial) => Some(
            serial_to_date(*serial)
                .map(CellData::Date)
                .unwrap_or(CellData::Number(*serial)),
        ),
        other => Some(CellData::Text(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        let mut sheet = Sheet::new("KF");
        sheet
            .set(CellRef::new(2, 0), CellData::Text("C1".into()))
            .set(CellRef::new(2, 1), CellData::Number(12.5))
            .set(CellRef::new(2, 2), CellData::Text(" 1,200.75 ".into()))
            .set(CellRef::new(2, 3), CellData::Text("n/a".into()))
            .set(
                CellRef::new(5, 4),
                CellData::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            );
        sheet
    }

    #[test]
    fn tracks_last_used_row() {
        assert_eq!(sheet().last_row(), 5);
        assert_eq!(Sheet::new("empty").last_row(), 0);
    }

    #[test]
    fn reads_text_and_numbers() {
        let sheet = sheet();
        assert_eq!(sheet.text(2, 0), "C1");
        assert_eq!(sheet.text(3, 0), "");
        assert_eq!(sheet.text(5, 4), "2024-02-01");
        assert_eq!(sheet.number(2, 1).unwrap(), 12.5);
        assert_eq!(sheet.number(2, 2).unwrap(), 1200.75);
        assert_eq!(sheet.number(9, 9).unwrap(), 0.0);
    }

    #[test]
    fn non_numeric_text_is_an_error() {
        let error = sheet().number(2, 3).unwrap_err();
        assert!(matches!(
            error,
            ToolError::InvalidNumber { ref column, row: 2, .. } if column == "D"
        ));
    }

    #[test]
    fn non_finite_text_is_an_error() {
        let mut sheet = Sheet::new("KF");
        for (column, text) in ["NaN", "inf", "-Infinity"].iter().enumerate() {
            sheet.set(CellRef::new(2, column as u32), CellData::Text(text.to_string()));
        }
        sheet.set(CellRef::new(3, 0), CellData::Number(f64::NAN));

        for column in 0..3 {
            assert!(matches!(
                sheet.number(2, column),
                Err(ToolError::InvalidNumber { row: 2, .. })
            ));
        }
        assert!(matches!(
            sheet.number(3, 0),
            Err(ToolError::InvalidNumber { ref column, row: 3, .. }) if column == "A"
        ));
    }

    #[test]
    fn memory_workbook_lists_sheets_in_order() {
        let mut workbook = MemoryWorkbook::new(vec![Sheet::new("B"), Sheet::new("A")]);
        assert_eq!(workbook.sheet_names(), ["B", "A"]);
        assert!(workbook.read_sheet("A").is_ok());
        assert!(workbook.read_sheet("C").is_err());
    }

    #[test]
    fn converts_calamine_values() {
        assert_eq!(convert_cell(&DataType::Empty), None);
        assert_eq!(convert_cell(&DataType::Int(3)), Some(CellData::Number(3.0)));
        assert_eq!(
            convert_cell(&DataType::DateTime(45306.0)),
            Some(CellData::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        );
        assert_eq!(
            convert_cell(&DataType::Bool(true)),
            Some(CellData::Text("true".into()))
        );
    }
}
