//! Progress-callback trait for conversion pipeline events.
//!
//! The pipeline never waits on whoever is watching it. It calls a
//! [`PipelineProgress`] implementation synchronously and moves on; the
//! orchestrator's implementation writes the values into the task record, the
//! CLI's drives a progress bar.
//!
//! # Example
//!
//! ```rust
//! use deck2pdf::PipelineProgress;
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<f64>>,
//! }
//!
//! impl PipelineProgress for Recorder {
//!     fn on_progress(&self, _status: &str, percent: f64) {
//!         self.seen.lock().unwrap().push(percent);
//!     }
//! }
//!
//! let r = Recorder::default();
//! r.on_progress("Merging PDFs...", 90.0);
//! assert_eq!(*r.seen.lock().unwrap(), vec![90.0]);
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::convert::PipelineState;

/// Called by the pipeline as it moves through its files.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgress: Send + Sync {
    /// Phase description and overall completion in `0.0..=100.0`.
    ///
    /// Values are monotonically non-decreasing within one run.
    fn on_progress(&self, status: &str, percent: f64) {
        let _ = (status, percent);
    }

    /// Called when the pipeline enters a new phase.
    fn on_state(&self, state: PipelineState) {
        let _ = state;
    }

    /// Called after file `index` (0-based) of `total` has been converted.
    ///
    /// # Arguments
    /// * `output` — where the converted PDF was written (a temp file in
    ///   merge mode, the final file in separate mode)
    fn on_file_complete(&self, index: usize, total: usize, output: &Path) {
        let _ = (index, total, output);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Convenience alias for a shared progress sink.
pub type ProgressCallback = Arc<dyn PipelineProgress>;
