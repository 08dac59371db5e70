//! One packaging run: ingest every billing row, then write each client's
//! reports, strictly in sequence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::error::{Result, ToolError};
use crate::ingest::{self, EnrichSummary, IngestSummary, IngestionEngine};
use crate::io::excel_read::{SpreadsheetReader, XlsxReader};
use crate::io::template::TemplateWorkbook;
use crate::model::{Client, ClientRegistry, Entry};
use crate::report::{ComposedSections, ReportComposer};
use crate::settings::Settings;

/// Whether existing report files may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// An existing report file aborts the run.
    Production,
    /// Existing report files are overwritten.
    Development,
}

impl RunMode {
    /// Development for debug builds, Production otherwise.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            RunMode::Development
        } else {
            RunMode::Production
        }
    }
}

/// Files written for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientReport {
    pub client_id: String,
    pub schedules: PathBuf,
    pub invoice: Option<PathBuf>,
    pub sections: ComposedSections,
}

/// State owned by a single run.
pub struct RunContext {
    settings: Settings,
    mode: RunMode,
    registry: ClientRegistry,
    entries: Vec<Entry>,
}

impl RunContext {
    pub fn new(settings: Settings, mode: RunMode) -> Self {
        Self {
            settings,
            mode,
            registry: ClientRegistry::new(),
            entries: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Every entry read so far, in source order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Runs both ingestion passes against the configured workbooks.
    pub fn load(&mut self) -> Result<IngestSummary> {
        info!(path = %self.settings.input_document_path.display(), "loading billing workbook");
        let mut reader = XlsxReader::open(&self.settings.input_document_path)?;
        let summary = self.ingest_transactions(&mut reader)?;

        if let Some(path) = self.settings.client_info_document_path.clone() {
            let mut reader = XlsxReader::open(&path)?;
            self.enrich_clients(&mut reader)?;
        }
        Ok(summary)
    }

    pub fn ingest_transactions<R: SpreadsheetReader>(&mut self, reader: &mut R) -> Result<IngestSummary> {
        IngestionEngine::new(&self.settings.worksheets).ingest(
            reader,
            &mut self.registry,
            &mut self.entries,
        )
    }

    pub fn enrich_clients<R: SpreadsheetReader>(&mut self, reader: &mut R) -> Result<EnrichSummary> {
        ingest::enrich_clients(reader, self.settings.client_info_first_row, &mut self.registry)
    }

    /// Writes the reports of every client in registry order.
    #[instrument(level = "info", skip(self))]
    pub fn write_reports(&mut self, issue_date: NaiveDate) -> Result<Vec<ClientReport>> {
        check_file_stems(&self.registry, &self.settings.output_folder)?;
        fs::create_dir_all(&self.settings.output_folder)?;
        let composer = ReportComposer::new(issue_date);
        let mut reports = Vec::with_capacity(self.registry.len());

        let Self {
            settings,
            mode,
            registry,
            ..
        } = self;
        for client in registry.iter_mut() {
            reports.push(write_client(settings, *mode, &composer, client)?);
        }

        info!(clients = reports.len(), "reports written");
        Ok(reports)
    }

    /// Loads all inputs and writes all reports.
    pub fn run(&mut self, issue_date: NaiveDate) -> Result<Vec<ClientReport>> {
        self.load()?;
        info!("data loaded, processing each client found");
        self.write_reports(issue_date)
    }
}

#[instrument(level = "info", skip_all, fields(client = %client.id))]
fn write_client(
    settings: &Settings,
    mode: RunMode,
    composer: &ReportComposer,
    client: &mut Client,
) -> Result<ClientReport> {
    let file_stem = file_stem(&client.id);
    let schedules_path = settings.output_folder.join(format!("{file_stem}.xlsx"));
    prepare_output(&schedules_path, mode)?;

    let mut workbook =
        TemplateWorkbook::create_from(&settings.schedules_template_document_path, &schedules_path)?;
    let mut sections = composer.compose_schedules(&mut workbook, client)?;

    let invoice_path = match &settings.invoice_template_document_path {
        Some(template) => {
            let path = settings.output_folder.join(format!("{file_stem} Invoice.xlsx"));
            prepare_output(&path, mode)?;
            let mut invoice = TemplateWorkbook::create_from(template, &path)?;
            sections.header = composer.compose_header(&mut invoice, client)?;
            invoice.save()?;
            Some(path)
        }
        None => {
            sections.header = composer.compose_header(&mut workbook, client)?;
            None
        }
    };
    workbook.save()?;

    info!(path = %schedules_path.display(), "package created");
    Ok(ClientReport {
        client_id: client.id.clone(),
        schedules: schedules_path,
        invoice: invoice_path,
        sections,
    })
}

fn prepare_output(path: &Path, mode: RunMode) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match mode {
        RunMode::Production => Err(ToolError::OutputExists(path.to_path_buf())),
        RunMode::Development => {
            warn!(path = %path.display(), "overwriting existing report");
            Ok(())
        }
    }
}

/// Fails when two clients would share a report file name. Names are compared
/// case-insensitively since common file systems do.
fn check_file_stems(registry: &ClientRegistry, output_folder: &Path) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(registry.len());
    for client in registry.iter() {
        let stem = file_stem(&client.id);
        if let Some(first) = seen.insert(stem.to_lowercase(), &client.id) {
            return Err(ToolError::OutputNameClash {
                path: output_folder.join(format!("{stem}.xlsx")),
                first: first.to_string(),
                second: client.id.clone(),
            });
        }
    }
    Ok(())
}

/// Client id made safe for use as a file name.
fn file_stem(client_id: &str) -> String {
    let stem: String = client_id
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|ch| ch == '.') {
        "client".to_string()
    } else {
        stem
    }
}
