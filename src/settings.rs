//! Settings document describing where the inputs live and how the billing
//! sheets map onto entry fields.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::io::cell::column_index;

fn default_client_info_first_row() -> u32 {
    2
}

fn default_sentinel_column() -> String {
    "A".to_string()
}

/// Top-level settings loaded once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub input_document_path: PathBuf,

    #[serde(default)]
    pub client_info_document_path: Option<PathBuf>,

    #[serde(default = "default_client_info_first_row")]
    pub client_info_first_row: u32,

    #[serde(alias = "TemplateDocumentPath")]
    pub schedules_template_document_path: PathBuf,

    #[serde(default)]
    pub invoice_template_document_path: Option<PathBuf>,

    pub output_folder: PathBuf,

    #[serde(default)]
    pub worksheets: HashMap<String, WorksheetColumns>,
}

/// Column layout of one transaction sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorksheetColumns {
    pub first_row: u32,
    pub client_id: String,
    pub date: String,
    pub invoice_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_description: Option<String>,
    pub amount: String,
    pub assessed: String,
    /// Column whose first blank cell marks the end of the data.
    #[serde(default = "default_sentinel_column")]
    pub sentinel_column: String,
}

impl Settings {
    /// Reads, parses and validates the settings document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        let mut settings = Self::from_json(&source)?;
        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }
        debug!(path = %path.display(), sheets = settings.worksheets.len(), "settings loaded");
        Ok(settings)
    }

    /// Parses and validates a settings document held in memory.
    pub fn from_json(source: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(source)
            .map_err(|error| ToolError::Config(format!("malformed settings document: {error}")))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.client_info_first_row == 0 {
            return Err(ToolError::Config("ClientInfoFirstRow must be at least 1".into()));
        }
        for (sheet, columns) in &self.worksheets {
            columns
                .validate()
                .map_err(|error| ToolError::Config(format!("worksheet '{sheet}': {error}")))?;
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.input_document_path);
        resolve(&mut self.schedules_template_document_path);
        resolve(&mut self.output_folder);
        if let Some(path) = self.client_info_document_path.as_mut() {
            resolve(path);
        }
        if let Some(path) = self.invoice_template_document_path.as_mut() {
            resolve(path);
        }
    }
}

impl WorksheetColumns {
    fn validate(&self) -> Result<()> {
        if self.first_row == 0 {
            return Err(ToolError::Config("FirstRow must be at least 1".into()));
        }
        let required = [
            &self.client_id,
            &self.date,
            &self.invoice_id,
            &self.amount,
            &self.assessed,
            &self.sentinel_column,
        ];
        for column in required.into_iter().chain(self.item_id.iter()).chain(self.item_description.iter()) {
            column_index(column)?;
        }
        Ok(())
    }
}
