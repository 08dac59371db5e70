//! Invoice header: client details, dates and the amount due.

use chrono::{Days, NaiveDate};

use crate::error::{Result, ToolError};
use crate::io::cell::{CellRef, CellValue};
use crate::model::Client;
use crate::report::layout::*;
use crate::report::style::CellWrite;

/// Cell writes of the invoice header.
///
/// The amount due comes from the total cached by the summary schedule, so
/// that section must have been composed for `client` first.
pub fn invoice_header(client: &Client, issue_date: NaiveDate) -> Result<Vec<CellWrite>> {
    let total = client
        .summary_total()
        .ok_or_else(|| ToolError::MissingSummaryTotal(client.id.clone()))?;
    let due_date = issue_date
        .checked_add_days(Days::new(PAYMENT_TERM_DAYS))
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("due date overflows after {issue_date}")))?;

    let fields = [
        (HEADER_CLIENT_ID, CellValue::text(client.id.as_str())),
        (HEADER_NAME, CellValue::text(client.name.as_str())),
        (HEADER_ADDRESS, CellValue::text(client.address.as_str())),
        (HEADER_CITY, CellValue::text(client.city.as_str())),
        (HEADER_POSTAL_CODE, CellValue::text(client.postal_code.as_str())),
        (
            HEADER_EXTERNAL_INVOICE_ID,
            CellValue::text(client.external_invoice_id.as_str()),
        ),
        (HEADER_ISSUE_DATE, CellValue::Date(issue_date)),
        (HEADER_DUE_DATE, CellValue::Date(due_date)),
        (HEADER_TOTAL, CellValue::Number(total.assessed)),
        (HEADER_AMOUNT_DUE, CellValue::Number(total.assessed)),
    ];

    fields
        .into_iter()
        .map(|(reference, value)| CellRef::parse(reference).map(|cell| CellWrite::new(cell, value)))
        .collect()
}
