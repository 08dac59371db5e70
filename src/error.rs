use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur while the
/// tool ingests billing rows, aggregates them, or fills report templates.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a template workbook cannot be opened or rewritten as a zip archive.
    #[error("template archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Raised when a template part is not well-formed XML.
    #[error("template XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a write would remove the master cell of a shared formula.
    #[error("cell {0} holds a shared formula other cells depend on")]
    SharedFormula(String),

    /// Raised when the settings document is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Raised when a column letter cannot be turned into a column index.
    #[error("invalid column letter '{0}'")]
    InvalidColumn(String),

    /// Raised when an amount cell holds something other than a number.
    #[error("invalid number '{value}' in sheet '{sheet}' at {column}{row}")]
    InvalidNumber {
        sheet: String,
        row: u32,
        column: String,
        value: String,
    },

    /// Raised when a client id is registered twice.
    #[error("client '{0}' is already registered")]
    DuplicateClient(String),

    /// Raised when an invoice id is registered twice for the same client.
    #[error("invoice '{invoice_id}' is already registered for client '{client_id}'")]
    DuplicateInvoice {
        client_id: String,
        invoice_id: String,
    },

    /// Raised when the same entry is added twice to an invoice.
    #[error("entry from sheet '{sheet}' row {row} was already added to invoice '{invoice_id}'")]
    DuplicateEntry {
        invoice_id: String,
        sheet: String,
        row: u32,
    },

    /// Raised when an entry is routed to a client it does not belong to.
    #[error("entry for client '{entry_client}' routed to client '{client}'")]
    ClientMismatch { client: String, entry_client: String },

    /// Raised when the invoice header is composed before the summary schedule.
    #[error("summary total for client '{0}' has not been computed yet")]
    MissingSummaryTotal(String),

    /// Raised when a report would overwrite an existing file in production mode.
    #[error("output file already exists: {0}")]
    OutputExists(PathBuf),

    /// Raised when two client ids map onto the same report file name.
    #[error("clients '{first}' and '{second}' would both be written to {}", path.display())]
    OutputNameClash {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
