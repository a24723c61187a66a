//! CLI binary for deck2pdf.
//!
//! A thin shim over the library crate: flags map to `ConverterConfig`, the
//! input files become one task, and a terminal [`Frontend`] answers the
//! orchestrator's dialogs from the command line and renders its status
//! updates as a progress bar.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck2pdf::pipeline::outputs::separate_outputs;
use deck2pdf::task::{sanitize_name, CANCELLED_STATUS, COMPLETED_STATUS};
use deck2pdf::{
    ConverterConfig, Frontend, HostPlatform, NoticeLevel, Orchestrator, PipelineMode, TaskId,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal frontend ────────────────────────────────────────────────────────

/// Answers the orchestrator from CLI flags and draws its status on a bar.
struct CliFrontend {
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    bar: ProgressBar,
    quiet: bool,
    json: bool,
}

impl CliFrontend {
    fn new(cli: &Cli, show_progress: bool) -> Self {
        let bar = if show_progress {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            bar.set_prefix("deck2pdf");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            output: cli.output.clone(),
            output_dir: cli.output_dir.clone(),
            bar,
            quiet: cli.quiet,
            json: cli.json,
        }
    }

    fn println(&self, line: String) {
        if self.bar.is_hidden() {
            eprintln!("{line}");
        } else {
            self.bar.println(line);
        }
    }
}

impl Frontend for CliFrontend {
    fn ask_open_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn ask_save_file(&self, suggested_name: &str) -> Option<PathBuf> {
        Some(
            self.output
                .clone()
                .unwrap_or_else(|| PathBuf::from(suggested_name)),
        )
    }

    fn ask_directory(&self) -> Option<PathBuf> {
        Some(self.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")))
    }

    fn ask_confirm(&self, _title: &str, _message: &str) -> bool {
        true
    }

    fn selected_index(&self) -> Option<usize> {
        None
    }

    fn notify(&self, level: NoticeLevel, title: &str, message: &str) {
        match level {
            NoticeLevel::Info if self.quiet || self.json => {}
            NoticeLevel::Info => self.println(format!("{} {}", green("✔"), message)),
            NoticeLevel::Warning => {
                self.println(format!("{} {}: {}", yellow("⚠"), bold(title), message))
            }
            NoticeLevel::Error => self.println(format!("{} {}", red("✘"), message)),
        }
    }

    fn update_status(&self, message: &str, percent: f64) {
        self.bar.set_position(percent.round() as u64);
        self.bar.set_message(message.to_string());
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge several decks into one PDF
  deck2pdf intro.pptx results.pptx outlook.pptx -o talk.pdf

  # One PDF per deck, written as <stem>_converted_pdf.pdf
  deck2pdf --separate --output-dir pdfs/ *.pptx

  # Which converter would be used on this machine?
  deck2pdf --list-backends

  # Give slow decks more time and keep the per-deck PDFs for inspection
  deck2pdf --timeout 600 --keep-temp big.pptx -o big.pdf

BACKENDS (first available wins):
  Windows   PowerPoint, WPS Office, LibreOffice, ONLYOFFICE
  macOS     Keynote, LibreOffice, ONLYOFFICE
  Linux     LibreOffice, ONLYOFFICE

ENVIRONMENT VARIABLES:
  DECK2PDF_*              Every flag has a DECK2PDF_ equivalent (see --help)
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Override the log filter

Ctrl-C stops the running backend and removes partial output.
"#;

/// Convert presentation decks to PDF using the installed office suite.
#[derive(Parser, Debug)]
#[command(
    name = "deck2pdf",
    version,
    about = "Convert presentation decks to PDF using the installed office suite",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Presentation files, in output order.
    #[arg(required_unless_present = "list_backends")]
    inputs: Vec<PathBuf>,

    /// Merged PDF path. Default: the task name, e.g. Task_1.pdf.
    #[arg(short, long, env = "DECK2PDF_OUTPUT", conflicts_with = "separate")]
    output: Option<PathBuf>,

    /// Write one PDF per input instead of merging.
    #[arg(long, env = "DECK2PDF_SEPARATE")]
    separate: bool,

    /// Directory for --separate outputs. Default: current directory.
    #[arg(long, env = "DECK2PDF_OUTPUT_DIR", requires = "separate")]
    output_dir: Option<PathBuf>,

    /// Keep the per-deck temp PDFs of a merge.
    #[arg(long, env = "DECK2PDF_KEEP_TEMP")]
    keep_temp: bool,

    /// Open the result in the default application when done.
    #[arg(long, env = "DECK2PDF_OPEN")]
    open: bool,

    /// Per-deck backend timeout in seconds.
    #[arg(long, env = "DECK2PDF_TIMEOUT", default_value_t = 180)]
    timeout: u64,

    /// How often a running backend is checked, in milliseconds.
    #[arg(long, env = "DECK2PDF_POLL_INTERVAL_MS", default_value_t = 200)]
    poll_interval_ms: u64,

    /// Seconds between SIGTERM and SIGKILL when stopping a backend.
    #[arg(long, env = "DECK2PDF_KILL_GRACE", default_value_t = 5)]
    kill_grace: u64,

    /// List usable backends on this machine and exit.
    #[arg(long)]
    list_backends: bool,

    /// Print a JSON summary on stdout.
    #[arg(long, env = "DECK2PDF_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECK2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECK2PDF_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "DECK2PDF_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Serialize)]
struct RunSummary {
    task: String,
    mode: PipelineMode,
    status: String,
    outputs: Vec<PathBuf>,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the user-facing feedback; keep library logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_backends;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ConverterConfig::builder()
        .command_timeout_secs(cli.timeout)
        .poll_interval_ms(cli.poll_interval_ms)
        .kill_grace_secs(cli.kill_grace)
        .keep_temp_files(cli.keep_temp)
        .open_after_conversion(cli.open)
        .build()
        .context("Invalid configuration")?;

    let frontend = Arc::new(CliFrontend::new(&cli, show_progress));
    let orchestrator = Orchestrator::with_system(frontend.clone(), config);

    if cli.list_backends {
        return list_backends(&orchestrator, cli.json);
    }

    // ── Backend check ────────────────────────────────────────────────────
    // Probing can spawn PowerShell; keep it off the async hot path.
    if !tokio::task::block_in_place(|| orchestrator.check_backend()) {
        frontend.bar.finish_and_clear();
        bail!("{}", orchestrator.registry().install_message());
    }

    if !cli.separate {
        ensure_pdfium(&frontend.bar, cli.quiet)?;
    }

    // ── Build the task ───────────────────────────────────────────────────
    let inputs = cli
        .inputs
        .iter()
        .map(|p| resolve_input(p))
        .collect::<Result<Vec<_>>>()?;
    orchestrator.add_paths(inputs);

    let store = Arc::clone(orchestrator.store());
    let id: TaskId = store.active_id().context("No active task")?;

    let handle = if cli.separate {
        orchestrator.start_separate_conversion()
    } else {
        orchestrator.start_conversion()
    }
    .context("Conversion did not start")?;

    // ── Wait, forwarding Ctrl-C as a cancel request ──────────────────────
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    tokio::pin!(handle);
    let mut cancelling = false;
    loop {
        tokio::select! {
            joined = &mut handle => {
                joined.context("Conversion task panicked")?;
                break;
            }
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                frontend.println(format!("{} Stopping backend process...", yellow("⚠")));
                orchestrator.cancel_task(id);
            }
        }
    }
    frontend.bar.finish_and_clear();

    // ── Report ───────────────────────────────────────────────────────────
    let task = store.get(id).context("Task vanished")?;
    let mode = if cli.separate {
        PipelineMode::Separate
    } else {
        PipelineMode::Merge
    };
    let outputs = match mode {
        PipelineMode::Merge => vec![frontend.ask_save_file(&format!(
            "{}.pdf",
            sanitize_name(&task.name)
        ))
        .unwrap_or_default()],
        PipelineMode::Separate => {
            separate_outputs(&task.files, &frontend.ask_directory().unwrap_or_default())
        }
    };

    if cli.json {
        let summary = RunSummary {
            task: task.name.clone(),
            mode,
            status: task.status.clone(),
            outputs: if task.status == COMPLETED_STATUS {
                outputs
            } else {
                Vec::new()
            },
            error: task.last_error.clone(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    }

    match task.status.as_str() {
        COMPLETED_STATUS => Ok(()),
        CANCELLED_STATUS => bail!("Conversion cancelled"),
        _ => bail!(
            "Conversion failed: {}",
            task.last_error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Absolute path of an existing input file.
fn resolve_input(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        bail!("Input file not found: {}", path.display());
    }
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Print usable backends, first one marked as the one that will be used.
fn list_backends(orchestrator: &Orchestrator, json: bool) -> Result<()> {
    let available = tokio::task::block_in_place(|| orchestrator.registry().list_available());

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&available).context("Failed to serialise backends")?
        );
        return Ok(());
    }

    let platform = HostPlatform::current();
    println!("Platform: {}", platform.name());
    if available.is_empty() {
        println!("{}", orchestrator.registry().install_message());
        return Ok(());
    }
    for (i, active) in available.iter().enumerate() {
        let marker = if i == 0 { green("●") } else { " ".to_string() };
        let location = active
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("{marker} {:<22} {location}", active.display_name());
    }
    Ok(())
}

/// Make sure the PDFium library is on disk before a merge needs it.
///
/// On first run this downloads it (~30 MB); later runs only check a path.
fn ensure_pdfium(bar: &ProgressBar, quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet || bar.is_hidden() {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    bar.set_prefix("PDF engine");
    bar.set_message("Connecting…");
    let dl = bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                dl.set_position(downloaded.saturating_mul(100) / t.max(1));
            }
            dl.set_message(format!("{} KiB", downloaded / 1024));
        }))
    })
    .context("Failed to download PDFium engine")?;
    bar.set_prefix("deck2pdf");
    bar.set_position(0);
    Ok(())
}
