//! Unique-item schedule: every distinct item id billed to a client, once.

use std::collections::HashSet;

use crate::error::Result;
use crate::io::cell::{CellRef, CellValue};
use crate::model::{Client, Entry};
use crate::report::layout::*;
use crate::report::style::CellWrite;

/// First-seen entry for each distinct non-empty item id, sorted by item
/// description.
///
/// Invoices are walked in stored order and entries within each invoice in
/// stored order. Descriptions compare ordinally (byte-wise); the sort is
/// stable so equal descriptions keep first-seen order.
pub fn unique_items(client: &Client) -> Vec<&Entry> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut items: Vec<&Entry> = Vec::new();
    for invoice in client.invoices() {
        for entry in invoice.entries() {
            let Some(item_id) = entry.item_id.as_deref() else {
                continue;
            };
            if item_id.trim().is_empty() || !seen.insert(item_id) {
                continue;
            }
            items.push(entry);
        }
    }

    items.sort_by(|lhs, rhs| description(lhs).cmp(description(rhs)));
    items
}

fn description(entry: &Entry) -> &str {
    entry.item_description.as_deref().unwrap_or_default()
}

/// Cell writes of the unique-item schedule.
pub fn item_schedule(client: &Client) -> Result<Vec<CellWrite>> {
    let mut writes = Vec::new();
    for (offset, entry) in unique_items(client).into_iter().enumerate() {
        let row = ITEMS_FIRST_ROW + offset as u32;
        writes.push(CellWrite::new(
            CellRef::at(row, ITEMS_CLIENT_COLUMN)?,
            CellValue::text(entry.client_id.as_str()),
        ));
        writes.push(CellWrite::new(
            CellRef::at(row, ITEMS_ID_COLUMN)?,
            CellValue::text(entry.item_id.as_deref().unwrap_or_default()),
        ));
        writes.push(CellWrite::new(
            CellRef::at(row, ITEMS_DESCRIPTION_COLUMN)?,
            CellValue::text(description(entry)),
        ));
    }
    Ok(writes)
}
