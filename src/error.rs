//! Error types for the deck2pdf library.
//!
//! A single enum, [`ConvertError`], covers every way a conversion can stop.
//! Callers that need the coarse taxonomy (what to show the user, how to set
//! the task status) use [`ConvertError::category`] instead of matching on
//! individual variants:
//!
//! * [`ErrorCategory::BackendUnavailable`] — nothing on this host can convert
//!   presentations; reported before any task starts.
//! * [`ErrorCategory::ExecutionFailure`] — one task's pipeline failed; other
//!   tasks are unaffected.
//! * [`ErrorCategory::Timeout`] — handled like an execution failure but kept
//!   distinct so diagnostics can say the backend hung.
//! * [`ErrorCategory::Cancelled`] — the user asked to stop. Not an error from
//!   the user's point of view.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::Backend;

/// All errors returned by the deck2pdf library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Backend selection ─────────────────────────────────────────────────
    /// No converter backend could be found on this host.
    #[error("{message}")]
    BackendUnavailable { message: String },

    /// The selected backend cannot run on the current operating system.
    #[error("{backend} backend is only supported on {supported}")]
    UnsupportedPlatform {
        backend: Backend,
        supported: &'static str,
    },

    /// The backend was detected earlier but its executable is gone.
    #[error("{backend} executable not found")]
    ExecutableNotFound { backend: Backend },

    // ── Process execution ─────────────────────────────────────────────────
    /// The external program could not be started at all.
    #[error("Failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend ran and reported a failure.
    #[error("{backend} conversion failed: {detail}")]
    ExecutionFailed { backend: Backend, detail: String },

    /// An isolated worker process failed without a more specific reason.
    #[error("{0}")]
    WorkerFailed(String),

    /// The backend exited cleanly but left no PDF behind.
    #[error("{backend} conversion finished but no PDF was generated for '{input}'")]
    NoOutput { backend: Backend, input: PathBuf },

    /// The external program did not finish within the configured timeout.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The user requested cancellation.
    #[error("Conversion cancelled")]
    Cancelled,

    /// A run was started with an empty file list.
    #[error("Add presentation files first.")]
    NoInputs,

    // ── Merge ─────────────────────────────────────────────────────────────
    /// PDFium could not be bound, or a document could not be read/written.
    #[error("Failed to merge PDFs: {0}")]
    MergeFailed(String),

    // ── I/O ───────────────────────────────────────────────────────────────
    /// A filesystem operation on a working or output file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy used for task status and user notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    BackendUnavailable,
    ExecutionFailure,
    Timeout,
    Cancelled,
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::BackendUnavailable { .. } => ErrorCategory::BackendUnavailable,
            ConvertError::Timeout { .. } => ErrorCategory::Timeout,
            ConvertError::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::ExecutionFailure,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled)
    }

    /// Wrap an I/O failure with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}
