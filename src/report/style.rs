//! Cell-write protocol that keeps template formatting intact.
//!
//! The first write to a column captures whatever style the template carries
//! at that cell; every write to the column (the first included) re-applies
//! the captured style before the value lands. Each report section owns its
//! own [`StyleCache`] because the same column letter means different things
//! on different sheets. Sections that write each address once, like the
//! invoice header, key the cache by cell instead so every field keeps its
//! own template style.

use std::collections::HashMap;

use tracing::trace;

use crate::error::Result;
use crate::io::cell::{CellRef, CellStyle, CellValue};

/// Mutable view over one sheet of a report being filled.
pub trait ReportSheet {
    /// Style currently effective at `cell`, if any.
    fn style_at(&self, cell: CellRef) -> Option<CellStyle>;

    /// Replaces the style of `cell`; `None` clears it.
    fn set_style(&mut self, cell: CellRef, style: Option<CellStyle>);

    /// Replaces the value of `cell`, leaving its style alone.
    fn set_value(&mut self, cell: CellRef, value: &CellValue) -> Result<()>;

    /// Switches `cell` to a bold variant of its current style.
    fn embolden(&mut self, cell: CellRef) -> Result<()>;
}

impl<T: ReportSheet + ?Sized> ReportSheet for &mut T {
    fn style_at(&self, cell: CellRef) -> Option<CellStyle> {
        (**self).style_at(cell)
    }

    fn set_style(&mut self, cell: CellRef, style: Option<CellStyle>) {
        (**self).set_style(cell, style)
    }

    fn set_value(&mut self, cell: CellRef, value: &CellValue) -> Result<()> {
        (**self).set_value(cell, value)
    }

    fn embolden(&mut self, cell: CellRef) -> Result<()> {
        (**self).embolden(cell)
    }
}

/// A workbook whose sheets can be filled.
pub trait ReportWorkbook {
    type Sheet<'a>: ReportSheet
    where
        Self: 'a;

    /// Opens the named sheet, or `None` when the workbook has no such sheet.
    fn sheet(&mut self, name: &str) -> Result<Option<Self::Sheet<'_>>>;
}

/// One value to place in a report.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub cell: CellRef,
    pub value: CellValue,
    pub bold: bool,
}

impl CellWrite {
    pub fn new(cell: CellRef, value: impl Into<CellValue>) -> Self {
        Self {
            cell,
            value: value.into(),
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// What a [`StyleCache`] entry is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum StyleScope {
    /// Column letter: every row of a column shares the first row's style.
    #[default]
    Column,
    /// Full cell reference: each address keeps its own style.
    Cell,
}

/// Per-section cache of template styles.
#[derive(Debug, Clone, Default)]
pub struct StyleCache {
    scope: StyleScope,
    styles: HashMap<String, Option<CellStyle>>,
}

impl StyleCache {
    /// Cache keyed by column letter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache keyed by full cell reference.
    pub fn per_cell() -> Self {
        Self {
            scope: StyleScope::Cell,
            ..Self::default()
        }
    }

    fn key(&self, cell: CellRef) -> String {
        match self.scope {
            StyleScope::Column => cell.column_letters(),
            StyleScope::Cell => cell.to_string(),
        }
    }

    /// Records the style found at `cell` unless its key was already captured.
    pub fn capture_column_style(&mut self, sheet: &impl ReportSheet, cell: CellRef) {
        let key = self.key(cell);
        self.styles.entry(key).or_insert_with(|| sheet.style_at(cell));
    }

    /// Re-applies the captured style to `cell`. Uncaptured keys are left alone.
    pub fn apply_column_style(&self, sheet: &mut impl ReportSheet, cell: CellRef) {
        if let Some(style) = self.styles.get(&self.key(cell)) {
            sheet.set_style(cell, *style);
        }
    }

    /// Captured style for a column letter or cell reference, depending on the scope.
    pub fn captured(&self, key: &str) -> Option<Option<CellStyle>> {
        self.styles.get(key).copied()
    }

    /// Writes a single value following the capture / apply / set protocol.
    pub fn write_cell(&mut self, sheet: &mut impl ReportSheet, write: &CellWrite) -> Result<()> {
        self.capture_column_style(&*sheet, write.cell);
        self.apply_column_style(&mut *sheet, write.cell);
        sheet.set_value(write.cell, &write.value)?;
        if write.bold {
            sheet.embolden(write.cell)?;
        }
        trace!(cell = %write.cell, value = ?write.value, "cell written");
        Ok(())
    }

    /// Writes a batch of values in order.
    pub fn write_all(&mut self, sheet: &mut impl ReportSheet, writes: &[CellWrite]) -> Result<()> {
        for write in writes {
            self.write_cell(&mut *sheet, write)?;
        }
        Ok(())
    }
}
