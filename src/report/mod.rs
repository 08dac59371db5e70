//! Report composition: turns a populated [`Client`] into cell writes and
//! applies them to a template through per-section style caches.

pub mod header;
pub mod items;
pub mod layout;
pub mod schedule;
pub mod style;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::model::Client;
use crate::report::style::{CellWrite, ReportWorkbook, StyleCache};

/// Which sections a composition pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposedSections {
    pub summary: bool,
    pub items: bool,
    pub header: bool,
}

/// Fills report templates for one client at a time.
#[derive(Debug, Clone, Copy)]
pub struct ReportComposer {
    issue_date: NaiveDate,
}

impl ReportComposer {
    pub fn new(issue_date: NaiveDate) -> Self {
        Self { issue_date }
    }

    /// Writes the summary and unique-item schedules, caching the client total
    /// for the header.
    #[instrument(level = "info", skip_all, fields(client = %client.id))]
    pub fn compose_schedules<W: ReportWorkbook>(
        &self,
        workbook: &mut W,
        client: &mut Client,
    ) -> Result<ComposedSections> {
        let mut sections = ComposedSections::default();

        let summary = schedule::summary_schedule(client)?;
        client.set_summary_total(summary.total);
        sections.summary = write_section(
            workbook,
            layout::SUMMARY_SHEET,
            StyleCache::new(),
            &summary.writes,
        )?;
        if sections.summary {
            info!(
                invoices = client.invoice_count(),
                amount = summary.total.amount,
                assessed = summary.total.assessed,
                "summary schedule filled"
            );
        }

        let items = items::item_schedule(client)?;
        sections.items =
            write_section(workbook, layout::ITEMS_SHEET, StyleCache::new(), &items)?;
        if sections.items {
            info!(items = items.len() / 3, "unique-item schedule filled");
        }

        Ok(sections)
    }

    /// Writes the invoice header. Requires [`Self::compose_schedules`] to
    /// have run for `client`.
    #[instrument(level = "info", skip_all, fields(client = %client.id))]
    pub fn compose_header<W: ReportWorkbook>(&self, workbook: &mut W, client: &Client) -> Result<bool> {
        let writes = header::invoice_header(client, self.issue_date)?;
        // Header fields share column F but each carries its own format.
        let written =
            write_section(workbook, layout::HEADER_SHEET, StyleCache::per_cell(), &writes)?;
        if written {
            info!(issue_date = %self.issue_date, "invoice header filled");
        }
        Ok(written)
    }
}

/// Applies `writes` to the named sheet through a fresh style cache. Returns
/// `false` when the workbook has no such sheet.
fn write_section<W: ReportWorkbook>(
    workbook: &mut W,
    sheet_name: &str,
    mut styles: StyleCache,
    writes: &[CellWrite],
) -> Result<bool> {
    let Some(mut sheet) = workbook.sheet(sheet_name)? else {
        debug!(sheet = sheet_name, "template has no such sheet; section skipped");
        return Ok(false);
    };
    styles.write_all(&mut sheet, writes)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::io::cell::{CellStyle, CellValue};
    use crate::model::tests::entry;
    use crate::report::style::tests::{BOLD_OFFSET, ScratchSheet, ScratchWorkbook};

    fn composer() -> ReportComposer {
        ReportComposer::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn client() -> Client {
        let mut client = Client::new("C1");
        client.add_entry(entry("C1", "INV-1", 2, 100.0, 90.0)).unwrap();
        client.add_entry(entry("C1", "INV-2", 3, 250.5, 200.0)).unwrap();
        client
    }

    #[test]
    fn schedules_keep_template_styles_and_cache_total() {
        let summary = ScratchSheet::default()
            .with_style("B8", 11)
            .with_style("E8", 12)
            .with_style("H8", 13);
        let items = ScratchSheet::default().with_style("B9", 21);
        let mut workbook = ScratchWorkbook::default()
            .with_sheet(layout::SUMMARY_SHEET, summary)
            .with_sheet(layout::ITEMS_SHEET, items);
        let mut client = client();

        let sections = composer().compose_schedules(&mut workbook, &mut client).unwrap();
        assert_eq!(
            sections,
            ComposedSections { summary: true, items: true, header: false }
        );
        assert_eq!(client.summary_total().unwrap().amount, 350.5);

        let summary = workbook.get(layout::SUMMARY_SHEET);
        assert_eq!(summary.style("E9"), Some(CellStyle(12)));
        assert_eq!(summary.style("E11"), Some(CellStyle(12 + BOLD_OFFSET)));
        assert_eq!(summary.style("H11"), Some(CellStyle(13 + BOLD_OFFSET)));
        assert_eq!(summary.value("H11"), Some(&CellValue::Number(290.0)));
        assert_eq!(summary.style("B9"), Some(CellStyle(11)));
    }

    #[test]
    fn header_uses_total_from_schedules() {
        let mut workbook = ScratchWorkbook::default()
            .with_sheet(layout::SUMMARY_SHEET, ScratchSheet::default())
            .with_sheet(layout::HEADER_SHEET, ScratchSheet::default().with_style("F20", 5));
        let mut client = client();

        composer().compose_schedules(&mut workbook, &mut client).unwrap();
        assert!(composer().compose_header(&mut workbook, &client).unwrap());

        let header = workbook.get(layout::HEADER_SHEET);
        assert_eq!(header.value("F24"), Some(&CellValue::Number(290.0)));
        assert_eq!(header.style("F20"), Some(CellStyle(5)));
        assert_eq!(
            header.value("F8"),
            Some(&CellValue::Date(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()))
        );
    }

    #[test]
    fn header_fields_keep_their_own_styles() {
        let header = ScratchSheet::default()
            .with_style("F7", 31)
            .with_style("F8", 31)
            .with_style("F20", 32)
            .with_style("F24", 33);
        let mut workbook = ScratchWorkbook::default()
            .with_sheet(layout::SUMMARY_SHEET, ScratchSheet::default())
            .with_sheet(layout::HEADER_SHEET, header);
        let mut client = client();

        composer().compose_schedules(&mut workbook, &mut client).unwrap();
        composer().compose_header(&mut workbook, &client).unwrap();

        let header = workbook.get(layout::HEADER_SHEET);
        assert_eq!(header.style("F5"), None);
        assert_eq!(header.style("F6"), None);
        assert_eq!(header.style("F7"), Some(CellStyle(31)));
        assert_eq!(header.style("F8"), Some(CellStyle(31)));
        assert_eq!(header.style("F20"), Some(CellStyle(32)));
        assert_eq!(header.style("F24"), Some(CellStyle(33)));
    }

    #[test]
    fn header_before_schedules_fails() {
        let mut workbook = ScratchWorkbook::default()
            .with_sheet(layout::HEADER_SHEET, ScratchSheet::default());
        let error = composer().compose_header(&mut workbook, &client()).unwrap_err();
        assert!(matches!(error, ToolError::MissingSummaryTotal(_)));
        assert!(workbook.get(layout::HEADER_SHEET).values.is_empty());
    }

    #[test]
    fn missing_sheets_are_skipped() {
        let mut workbook = ScratchWorkbook::default();
        let mut client = client();
        let sections = composer().compose_schedules(&mut workbook, &mut client).unwrap();
        assert_eq!(sections, ComposedSections::default());
        assert!(client.summary_total().is_some());
        assert!(!composer().compose_header(&mut workbook, &client).unwrap());
    }
}
