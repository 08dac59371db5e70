//! Core library for the invoice-packager command line application.
//!
//! Billing rows are read from an Excel workbook into the [`model`] types by
//! [`ingest`], then each client's report files are produced by copying the
//! configured templates and filling them through [`report`]. Workbook access
//! lives under [`io`] and one end-to-end run is driven by [`pipeline`].

pub mod error;
pub mod ingest;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod settings;

pub use error::{Result, ToolError};
