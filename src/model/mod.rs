//! In-memory billing model: entries are folded into invoices, invoices into
//! clients, and clients into an insertion-ordered registry.

use std::ops::AddAssign;

use indexmap::IndexMap;
use indexmap::map::Entry as MapEntry;

use crate::error::{Result, ToolError};

/// Where an entry was read from. Part of the entry's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRow {
    pub sheet: String,
    /// 1-based row number.
    pub row: u32,
}

/// One billing transaction row. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub client_id: String,
    pub invoice_id: String,
    /// Free-form date as found in the source sheet.
    pub date: String,
    pub item_id: Option<String>,
    pub item_description: Option<String>,
    pub amount: f64,
    pub assessed_amount: f64,
    pub source: SourceRow,
}

/// Sum of amounts over a set of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AmountTotal {
    pub amount: f64,
    pub assessed: f64,
}

impl AddAssign for AmountTotal {
    fn add_assign(&mut self, rhs: Self) {
        self.amount += rhs.amount;
        self.assessed += rhs.assessed;
    }
}

impl<'a> AddAssign<&'a Entry> for AmountTotal {
    fn add_assign(&mut self, entry: &'a Entry) {
        self.amount += entry.amount;
        self.assessed += entry.assessed_amount;
    }
}

/// Entries sharing one client and invoice id, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub client_id: String,
    pub invoice_id: String,
    /// Date of the first entry seen for this invoice.
    pub date: String,
    entries: Vec<Entry>,
}

impl Invoice {
    pub fn new(
        client_id: impl Into<String>,
        invoice_id: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            invoice_id: invoice_id.into(),
            date: date.into(),
            entries: Vec::new(),
        }
    }

    /// Appends an entry, rejecting one that is already present.
    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        if self.entries.contains(&entry) {
            return Err(ToolError::DuplicateEntry {
                invoice_id: self.invoice_id.clone(),
                sheet: entry.source.sheet,
                row: entry.source.row,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Sums amounts over the current entries in insertion order.
    pub fn total(&self) -> AmountTotal {
        let mut total = AmountTotal::default();
        for entry in &self.entries {
            total += entry;
        }
        total
    }
}

/// A billed client with its invoices keyed by invoice id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    /// Reference number supplied by the client-info workbook.
    pub external_invoice_id: String,
    invoices: IndexMap<String, Invoice>,
    summary_total: Option<AmountTotal>,
}

impl Client {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Routes the entry to its invoice, creating the invoice on first sight.
    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        if entry.client_id != self.id {
            return Err(ToolError::ClientMismatch {
                client: self.id.clone(),
                entry_client: entry.client_id,
            });
        }

        let invoice = match self.invoices.entry(entry.invoice_id.clone()) {
            MapEntry::Occupied(slot) => slot.into_mut(),
            MapEntry::Vacant(slot) => slot.insert(Invoice::new(
                self.id.clone(),
                entry.invoice_id.clone(),
                entry.date.clone(),
            )),
        };
        invoice.add_entry(entry)
    }

    /// Registers a new invoice; the invoice id must not be known yet.
    pub fn add_invoice(&mut self, invoice: Invoice) -> Result<()> {
        match self.invoices.entry(invoice.invoice_id.clone()) {
            MapEntry::Occupied(_) => Err(ToolError::DuplicateInvoice {
                client_id: self.id.clone(),
                invoice_id: invoice.invoice_id,
            }),
            MapEntry::Vacant(slot) => {
                slot.insert(invoice);
                Ok(())
            }
        }
    }

    pub fn invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices.get(invoice_id)
    }

    /// Invoices in the order their ids were first encountered.
    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.len()
    }

    /// Total cached by the most recent summary schedule composition.
    pub fn summary_total(&self) -> Option<AmountTotal> {
        self.summary_total
    }

    pub fn set_summary_total(&mut self, total: AmountTotal) {
        self.summary_total = Some(total);
    }
}

/// Insertion-ordered map from client id to client.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: IndexMap<String, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client; the id must not be known yet.
    pub fn register(&mut self, client: Client) -> Result<&mut Client> {
        match self.clients.entry(client.id.clone()) {
            MapEntry::Occupied(_) => Err(ToolError::DuplicateClient(client.id)),
            MapEntry::Vacant(slot) => Ok(slot.insert(client)),
        }
    }

    pub fn get_or_create(&mut self, client_id: &str) -> &mut Client {
        self.clients
            .entry(client_id.to_string())
            .or_insert_with(|| Client::new(client_id))
    }

    /// Routes an entry to its client, creating the client on first sight.
    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        self.get_or_create(&entry.client_id).add_entry(entry)
    }

    pub fn get(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn get_mut(&mut self, client_id: &str) -> Option<&mut Client> {
        self.clients.get_mut(client_id)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }
}
