//! # deck2pdf
//!
//! Convert presentation decks (`.pptx`, `.ppt`, `.odp`, `.key`) to PDF by
//! driving whatever office suite is installed, merging them into one PDF or
//! writing one PDF per deck, with any number of conversion tasks in flight.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Task (ordered file list)
//!  │
//!  ├─ 1. Backend   detect PowerPoint / WPS / LibreOffice / ONLYOFFICE / Keynote
//!  ├─ 2. Convert   one supervised child process per file (cancel + timeout)
//!  ├─ 3. Merge     pdfium page append, in file order (merge mode only)
//!  └─ 4. Output    one PDF, or <dir>/<stem>_converted_pdf.pdf per file
//! ```
//!
//! Office suites are slow, hang, and ignore polite requests. Every backend
//! call therefore runs in its own OS process under a [`ProcessSupervisor`]
//! that polls for exit, cancellation, and timeout, and tears the process down
//! with SIGTERM then SIGKILL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck2pdf::{
//!     BackendRegistry, CancelToken, ConversionPipeline, ConversionWorker, ConverterConfig,
//!     NoopProgress, PdfiumMerger,
//! };
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::default();
//!     let registry = Arc::new(BackendRegistry::system());
//!     let worker = Arc::new(ConversionWorker::new(registry, &config));
//!     let pipeline = ConversionPipeline::new(worker, Arc::new(PdfiumMerger::new()), config);
//!
//!     let inputs: Vec<PathBuf> = vec!["intro.pptx".into(), "results.pptx".into()];
//!     let out = pipeline
//!         .convert_and_merge(&inputs, Path::new("talk.pdf"), &CancelToken::new(), &NoopProgress)
//!         .await?;
//!     println!("{}", out.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deck2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deck2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod frontend;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod supervisor;
pub mod system;
pub mod tabs;
pub mod task;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{ActiveBackend, Backend, BackendKind, BackendRegistry, HostPlatform};
pub use cancel::CancelToken;
pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{
    ConversionOutput, ConversionPipeline, ConversionRequest, PipelineMode, PipelineState,
};
pub use error::{ConvertError, ErrorCategory};
pub use frontend::{Frontend, NoticeLevel};
pub use orchestrator::Orchestrator;
pub use pipeline::{PdfMerger, PdfiumMerger};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback};
pub use supervisor::{CommandOutput, IsolatedRoutine, ProcessSupervisor};
pub use task::{Task, TaskId, TaskStore};
pub use worker::{ConversionWorker, SlideConverter};
