use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use invoice_packager::pipeline::{RunContext, RunMode};
use invoice_packager::settings::Settings;
use invoice_packager::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let outcome = init_logging().and_then(|()| run(cli));
    if let Err(error) = &outcome {
        eprintln!("error: {error}");
    }
    if cfg!(not(debug_assertions)) {
        wait_for_enter();
    }
    if outcome.is_err() {
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.settings)?;
    let mode = RunMode::for_build();
    info!(settings = %cli.settings.display(), ?mode, "starting");

    let mut context = RunContext::new(settings, mode);
    let reports = context.run(Local::now().date_naive())?;
    info!(clients = reports.len(), "all packages created");
    Ok(())
}

/// Logs to stderr at `info` unless `RUST_LOG` says otherwise.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn wait_for_enter() {
    print!("Press Enter to close");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Package billing rows into per-client schedules and invoices."
)]
struct Cli {
    /// JSON settings file describing inputs, templates and column mappings.
    settings: PathBuf,
}
