//! Scan command: emphasize keywords in Markdown or plain-text files.
//!
//! Each file becomes a document tree scanned by its own session. The learned
//! registry is shared across files through the store, so a keyword learned
//! in one file is recognized at sentence starts in the next.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use bolder_core::config::Config;
use bolder_core::markdown::InputFormat;
use bolder_core::report::ScanReport;
use bolder_core::store::{MemoryStore, RegistryStore};
use bolder_core::tree::Style;
use bolder_core::{Highlights, Session, SystemClock};

use super::{file_store, read_input_file};

/// Origin used when neither `--origin` nor the configuration names one.
pub const DEFAULT_ORIGIN: &str = "localhost";

/// Page background assumed by `--dark`.
const DARK_BACKGROUND: &str = "rgb(24, 24, 27)";

/// Arguments for the `scan` subcommand.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Files to scan.
    #[arg(required = true)]
    pub files: Vec<Utf8PathBuf>,

    /// Hostname the documents are treated as coming from.
    #[arg(long)]
    pub origin: Option<String>,

    /// Input format (default: from the file extension).
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,

    /// Treat the page background as dark.
    #[arg(long)]
    pub dark: bool,

    /// Neither load nor save learned keywords on disk.
    #[arg(long)]
    pub no_persist: bool,

    /// Print the highlight stylesheet.
    #[arg(long)]
    pub stylesheet: bool,
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    #[serde(flatten)]
    report: ScanReport,
}

#[derive(Serialize)]
struct ScanOutput {
    files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stylesheet: Option<String>,
}

fn progress_bar(files: usize, global_json: bool) -> ProgressBar {
    if files < 2 || global_json {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(files as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    bar
}

/// Scan every file and print what was emphasized.
#[instrument(name = "cmd_scan", skip_all, fields(files = args.files.len()))]
pub fn cmd_scan(
    args: ScanArgs,
    global_json: bool,
    config: &Config,
    max_input_bytes: usize,
) -> anyhow::Result<()> {
    let origin = args
        .origin
        .clone()
        .or_else(|| config.origin.clone())
        .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
    debug!(%origin, no_persist = args.no_persist, "executing scan command");

    let mut store: Box<dyn RegistryStore> = if args.no_persist {
        Box::new(MemoryStore::new())
    } else {
        Box::new(file_store(config)?)
    };
    let root_style = if args.dark {
        Style::with_background(DARK_BACKGROUND)
    } else {
        Style::default()
    };

    let progress = progress_bar(args.files.len(), global_json);
    let mut files = Vec::with_capacity(args.files.len());
    let mut stylesheet = None;

    for file in &args.files {
        progress.set_message(file.to_string());
        let content = read_input_file(file, max_input_bytes)?;
        let format = args
            .format
            .unwrap_or_else(|| InputFormat::from_extension(file.extension()));
        let doc = format.document(&content, root_style.clone());

        let mut session = Session::new(
            &origin,
            config.engine.clone(),
            config.scheduler,
            Highlights::new(),
            &mut *store,
            SystemClock::new(),
        );
        session
            .start(&doc)
            .with_context(|| format!("failed to scan {file}"))?;
        let drained = session.run_until_idle(&doc);
        if let Err(e) = session.flush() {
            warn!(error = %e, "could not save learned keywords");
        }
        if args.stylesheet && stylesheet.is_none() {
            stylesheet = Some(session.stylesheet());
        }
        files.push(FileReport {
            file: file.to_string(),
            report: ScanReport::collect(&session, &doc, &drained),
        });
        progress.inc(1);
    }
    progress.finish_and_clear();

    let output = ScanOutput { files, stylesheet };
    if global_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for entry in &output.files {
        print_report(entry);
    }
    if let Some(css) = &output.stylesheet {
        println!();
        print!("{css}");
    }
    Ok(())
}

fn print_report(entry: &FileReport) {
    let report = &entry.report;
    println!("{}", entry.file.bold());
    if !report.enabled {
        println!("  {}", format!("disabled for {}", report.origin).yellow());
        return;
    }
    if report.marks.is_empty() {
        println!("  {}", "no keywords".dimmed());
    } else {
        let words: Vec<String> = report
            .marks
            .iter()
            .map(|m| {
                if m.is_custom() {
                    m.word.magenta().to_string()
                } else {
                    m.word.green().to_string()
                }
            })
            .collect();
        println!("  {}", words.join(", "));
    }
    println!(
        "  {}",
        format!(
            "{} marks, {} learned, {} promoted",
            report.marks.len(),
            report.totals.learned,
            report.totals.promoted
        )
        .dimmed()
    );
}
