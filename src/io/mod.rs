//! Workbook adapters: reading billing sheets and patching report templates.

pub mod cell;
pub mod dates;
pub mod excel_read;
pub mod template;
