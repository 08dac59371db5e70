//! Reads billing rows into the client registry and enriches clients with
//! their contact details.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::io::cell::column_index;
use crate::io::excel_read::{Sheet, SpreadsheetReader};
use crate::model::{ClientRegistry, Entry, SourceRow};
use crate::settings::WorksheetColumns;

/// Outcome of a transaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub sheets_processed: usize,
    pub sheets_skipped: usize,
    pub rows: usize,
}

/// Outcome of an enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub clients_updated: usize,
    pub rows_skipped: usize,
}

/// Column mapping resolved to zero-based indexes.
#[derive(Debug, Clone, Copy)]
struct ColumnIndexes {
    first_row: u32,
    sentinel: u32,
    client_id: u32,
    date: u32,
    invoice_id: u32,
    item_id: Option<u32>,
    item_description: Option<u32>,
    amount: u32,
    assessed: u32,
}

impl ColumnIndexes {
    fn resolve(columns: &WorksheetColumns) -> Result<Self> {
        let optional = |column: &Option<String>| column.as_deref().map(column_index).transpose();
        Ok(Self {
            first_row: columns.first_row,
            sentinel: column_index(&columns.sentinel_column)?,
            client_id: column_index(&columns.client_id)?,
            date: column_index(&columns.date)?,
            invoice_id: column_index(&columns.invoice_id)?,
            item_id: optional(&columns.item_id)?,
            item_description: optional(&columns.item_description)?,
            amount: column_index(&columns.amount)?,
            assessed: column_index(&columns.assessed)?,
        })
    }
}

/// Folds billing rows into clients and invoices.
pub struct IngestionEngine<'a> {
    worksheets: &'a HashMap<String, WorksheetColumns>,
}

impl<'a> IngestionEngine<'a> {
    pub fn new(worksheets: &'a HashMap<String, WorksheetColumns>) -> Self {
        Self { worksheets }
    }

    /// Reads every mapped sheet of `reader` in workbook order. Entries are
    /// routed into `registry` and appended to `entries`.
    #[instrument(level = "info", skip_all)]
    pub fn ingest<R: SpreadsheetReader>(
        &self,
        reader: &mut R,
        registry: &mut ClientRegistry,
        entries: &mut Vec<Entry>,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        for name in reader.sheet_names() {
            let Some(columns) = self.worksheets.get(&name) else {
                warn!(sheet = %name, "sheet skipped, not found in settings");
                summary.sheets_skipped += 1;
                continue;
            };

            let columns = ColumnIndexes::resolve(columns)?;
            let sheet = reader.read_sheet(&name)?;
            let rows = ingest_sheet(&sheet, &columns, registry, entries)?;
            info!(sheet = %name, rows, "sheet processed");

            summary.sheets_processed += 1;
            summary.rows += rows;
        }

        info!(
            clients = registry.len(),
            entries = entries.len(),
            sheets = summary.sheets_processed,
            skipped = summary.sheets_skipped,
            "transactions loaded"
        );
        Ok(summary)
    }
}

fn ingest_sheet(
    sheet: &Sheet,
    columns: &ColumnIndexes,
    registry: &mut ClientRegistry,
    entries: &mut Vec<Entry>,
) -> Result<usize> {
    let mut row = columns.first_row;
    let mut count = 0;

    while row <= sheet.last_row() && !sheet.text(row, columns.sentinel).is_empty() {
        debug!(sheet = sheet.name(), row, "processing row");
        let entry = read_entry(sheet, columns, row)?;
        entries.push(entry.clone());
        registry.add_entry(entry)?;
        count += 1;
        row += 1;
    }

    Ok(count)
}

fn read_entry(sheet: &Sheet, columns: &ColumnIndexes, row: u32) -> Result<Entry> {
    let optional_text = |column: Option<u32>| {
        column
            .map(|column| sheet.text(row, column))
            .filter(|value| !value.trim().is_empty())
    };

    Ok(Entry {
        client_id: sheet.text(row, columns.client_id).trim().to_string(),
        invoice_id: sheet.text(row, columns.invoice_id).trim().to_string(),
        date: sheet.text(row, columns.date),
        item_id: optional_text(columns.item_id),
        item_description: optional_text(columns.item_description),
        amount: sheet.number(row, columns.amount)?,
        assessed_amount: sheet.number(row, columns.assessed)?,
        source: SourceRow {
            sheet: sheet.name().to_string(),
            row,
        },
    })
}

/// Fills contact details of already-registered clients from the first sheet
/// of `reader`. Columns A–F hold client id, name, address, city, postal code
/// and external invoice id. Rows for unknown clients are skipped.
#[instrument(level = "info", skip(reader, registry))]
pub fn enrich_clients<R: SpreadsheetReader>(
    reader: &mut R,
    first_row: u32,
    registry: &mut ClientRegistry,
) -> Result<EnrichSummary> {
    let mut summary = EnrichSummary::default();
    let Some(name) = reader.sheet_names().into_iter().next() else {
        warn!("client info workbook has no sheets");
        return Ok(summary);
    };
    let sheet = reader.read_sheet(&name)?;

    let mut row = first_row;
    while row <= sheet.last_row() {
        let client_id = sheet.text(row, 0).trim().to_string();
        if client_id.is_empty() {
            break;
        }

        match registry.get_mut(&client_id) {
            Some(client) => {
                client.name = sheet.text(row, 1);
                client.address = sheet.text(row, 2);
                client.city = sheet.text(row, 3);
                client.postal_code = sheet.text(row, 4);
                client.external_invoice_id = sheet.text(row, 5);
                summary.clients_updated += 1;
                debug!(client = %client_id, row, "client enriched");
            }
            None => {
                warn!(client = %client_id, row, "client info for unknown client skipped");
                summary.rows_skipped += 1;
            }
        }
        row += 1;
    }

    info!(
        updated = summary.clients_updated,
        skipped = summary.rows_skipped,
        "client info loaded"
    );
    Ok(summary)
}
