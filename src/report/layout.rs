//! Fixed cell addresses of the report templates.

/// Sheet holding the per-invoice summary schedule.
pub const SUMMARY_SHEET: &str = "Schedule 2";
pub const SUMMARY_FIRST_ROW: u32 = 8;
pub const SUMMARY_DATE_COLUMN: &str = "B";
pub const SUMMARY_INVOICE_COLUMN: &str = "C";
pub const SUMMARY_AMOUNT_COLUMN: &str = "E";
pub const SUMMARY_ASSESSED_COLUMN: &str = "H";
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

/// Sheet listing each billed item once.
pub const ITEMS_SHEET: &str = "Schedule 3";
pub const ITEMS_FIRST_ROW: u32 = 9;
pub const ITEMS_CLIENT_COLUMN: &str = "B";
pub const ITEMS_ID_COLUMN: &str = "C";
pub const ITEMS_DESCRIPTION_COLUMN: &str = "D";

/// Sheet carrying the invoice header.
pub const HEADER_SHEET: &str = "Invoice";
pub const HEADER_NAME: &str = "B8";
pub const HEADER_ADDRESS: &str = "B9";
pub const HEADER_CITY: &str = "B10";
pub const HEADER_POSTAL_CODE: &str = "B11";
pub const HEADER_CLIENT_ID: &str = "F5";
pub const HEADER_EXTERNAL_INVOICE_ID: &str = "F6";
pub const HEADER_ISSUE_DATE: &str = "F7";
pub const HEADER_DUE_DATE: &str = "F8";
pub const HEADER_TOTAL: &str = "F20";
pub const HEADER_AMOUNT_DUE: &str = "F24";

/// Days between issue and due date.
pub const PAYMENT_TERM_DAYS: u64 = 30;
