//! Conversions between spreadsheet serial dates and calendar dates.

use chrono::{Days, NaiveDate};

const SUPPORTED_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Converts a spreadsheet serial number (1900 date system) into a date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    epoch().checked_add_days(Days::new(serial.trunc() as u64))
}

/// Converts a date into its spreadsheet serial number.
pub fn date_to_serial(date: NaiveDate) -> f64 {
    date.signed_duration_since(epoch()).num_days() as f64
}

/// Parses the free-form dates found in billing sheets.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    SUPPORTED_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| trimmed.parse::<f64>().ok().and_then(serial_to_date))
}
