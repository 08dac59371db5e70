//! Summary schedule: one row per invoice followed by a bold grand total.

use crate::error::Result;
use crate::io::cell::{CellRef, CellValue};
use crate::io::dates::parse_date;
use crate::model::{AmountTotal, Client};
use crate::report::layout::*;
use crate::report::style::CellWrite;

/// Cell writes of the summary schedule plus the accumulated client total.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySchedule {
    pub writes: Vec<CellWrite>,
    pub total: AmountTotal,
}

/// Lays out one row per invoice in first-seen order, then the grand total
/// row after one blank row.
pub fn summary_schedule(client: &Client) -> Result<SummarySchedule> {
    let mut writes = Vec::with_capacity(client.invoice_count() * 4 + 3);
    let mut total = AmountTotal::default();
    let mut row = SUMMARY_FIRST_ROW;

    for invoice in client.invoices() {
        let invoice_total = invoice.total();
        writes.push(CellWrite::new(
            CellRef::at(row, SUMMARY_DATE_COLUMN)?,
            date_value(&invoice.date),
        ));
        writes.push(CellWrite::new(
            CellRef::at(row, SUMMARY_INVOICE_COLUMN)?,
            CellValue::text(invoice.invoice_id.as_str()),
        ));
        writes.push(CellWrite::new(
            CellRef::at(row, SUMMARY_AMOUNT_COLUMN)?,
            invoice_total.amount,
        ));
        writes.push(CellWrite::new(
            CellRef::at(row, SUMMARY_ASSESSED_COLUMN)?,
            invoice_total.assessed,
        ));
        total += invoice_total;
        row += 1;
    }

    row += 1;
    writes.push(CellWrite::new(CellRef::at(row, SUMMARY_INVOICE_COLUMN)?, CellValue::text(GRAND_TOTAL_LABEL)).bold());
    writes.push(CellWrite::new(CellRef::at(row, SUMMARY_AMOUNT_COLUMN)?, total.amount).bold());
    writes.push(CellWrite::new(CellRef::at(row, SUMMARY_ASSESSED_COLUMN)?, total.assessed).bold());

    Ok(SummarySchedule { writes, total })
}

/// Dates that parse are written as spreadsheet dates, anything else verbatim.
fn date_value(raw: &str) -> CellValue {
    parse_date(raw)
        .map(CellValue::Date)
        .unwrap_or_else(|| CellValue::text(raw))
}
