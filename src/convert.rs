//! The conversion pipeline: many presentations in, one or many PDFs out.
//!
//! A [`ConversionPipeline`] is stateless between runs. Each call to
//! [`ConversionPipeline::convert_and_merge`] or
//! [`ConversionPipeline::convert_separate`] owns its own temp directory and
//! cancel token, so any number of runs can proceed in parallel on separate
//! tokio tasks.
//!
//! ## States
//!
//! ```text
//! Idle ──▶ Converting ──▶ Merging (merge mode) ──▶ Completed
//!              │               │
//!              └──────┬────────┘
//!                     ▼
//!             Cancelled | Error
//! ```
//!
//! Cancellation is checked before and after every file, before each merged
//! document, and before the merged file is written.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::pipeline::outputs::{basename, remove_if_exists, separate_outputs, temp_pdf};
use crate::pipeline::PdfMerger;
use crate::progress::PipelineProgress;
use crate::worker::SlideConverter;

/// Share of the progress bar spent converting in merge mode.
const MERGE_CONVERT_SHARE: f64 = 80.0;
const MERGING_PERCENT: f64 = 90.0;

/// How the results of a run are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// All inputs combined into one PDF, pages in input order.
    Merge,
    /// One PDF per input, next to each other in an output directory.
    Separate,
}

/// Phase of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Converting,
    Merging,
    Completed,
    Cancelled,
    Error,
}

/// Where a run should put its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionRequest {
    Merge { output: PathBuf },
    Separate { output_dir: PathBuf },
}

impl ConversionRequest {
    pub fn mode(&self) -> PipelineMode {
        match self {
            ConversionRequest::Merge { .. } => PipelineMode::Merge,
            ConversionRequest::Separate { .. } => PipelineMode::Separate,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ConversionOutput {
    Merge {
        output: PathBuf,
        /// Set when temp files were kept on request.
        temp_dir: Option<PathBuf>,
    },
    Separate { outputs: Vec<PathBuf> },
}

impl ConversionOutput {
    /// The file (merge) or first file (separate) worth opening afterwards.
    pub fn primary_path(&self) -> Option<&Path> {
        match self {
            ConversionOutput::Merge { output, .. } => Some(output),
            ConversionOutput::Separate { outputs } => outputs.first().map(PathBuf::as_path),
        }
    }

    /// User-facing success message.
    pub fn summary(&self) -> String {
        match self {
            ConversionOutput::Merge { output, .. } => {
                format!("PDF created successfully:\n{}", output.display())
            }
            ConversionOutput::Separate { outputs } => {
                format!("{} PDF files created", outputs.len())
            }
        }
    }
}

/// Drives a [`SlideConverter`] over a file list and optionally merges.
pub struct ConversionPipeline {
    converter: Arc<dyn SlideConverter>,
    merger: Arc<dyn PdfMerger>,
    config: ConverterConfig,
}

impl ConversionPipeline {
    pub fn new(
        converter: Arc<dyn SlideConverter>,
        merger: Arc<dyn PdfMerger>,
        config: ConverterConfig,
    ) -> Self {
        Self {
            converter,
            merger,
            config,
        }
    }

    /// Run in whichever mode `request` names.
    pub async fn run(
        &self,
        inputs: &[PathBuf],
        request: &ConversionRequest,
        cancel: &CancelToken,
        progress: &dyn PipelineProgress,
    ) -> Result<ConversionOutput, ConvertError> {
        let result = match request {
            ConversionRequest::Merge { output } => {
                self.convert_and_merge(inputs, output, cancel, progress).await
            }
            ConversionRequest::Separate { output_dir } => {
                self.convert_separate(inputs, output_dir, cancel, progress)
                    .await
            }
        };
        progress.on_state(match &result {
            Ok(_) => PipelineState::Completed,
            Err(e) if e.is_cancelled() => PipelineState::Cancelled,
            Err(_) => PipelineState::Error,
        });
        result
    }

    /// Convert every input and merge the results into `output`.
    ///
    /// Intermediate PDFs live in a private temp directory that is removed
    /// afterwards unless `keep_temp_files` is set.
    ///
    /// # Errors
    /// [`ConvertError::Cancelled`] if the token fires at any checkpoint. The
    /// `output` path is deleted on cancel, whether or not this run wrote it,
    /// and on merge failure.
    pub async fn convert_and_merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: &CancelToken,
        progress: &dyn PipelineProgress,
    ) -> Result<ConversionOutput, ConvertError> {
        if inputs.is_empty() {
            return Err(ConvertError::NoInputs);
        }
        let started = Instant::now();
        info!(files = inputs.len(), output = %output.display(), "Starting merge conversion");

        let temp_dir = tempfile::Builder::new()
            .prefix("deck2pdf-")
            .tempdir()
            .map_err(|e| ConvertError::io(std::env::temp_dir(), e))?;

        let result = self
            .merge_into(inputs, output, temp_dir.path(), cancel, progress)
            .await;
        if matches!(&result, Err(e) if e.is_cancelled()) {
            remove_if_exists(output);
            info!("Merge conversion cancelled; output removed");
        }

        let kept = if self.config.keep_temp_files {
            let path = temp_dir.keep();
            info!(dir = %path.display(), "Keeping temp files");
            Some(path)
        } else {
            if let Err(e) = temp_dir.close() {
                warn!("Failed to remove temp directory: {e}");
            }
            None
        };

        result?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Merge conversion complete"
        );
        Ok(ConversionOutput::Merge {
            output: output.to_path_buf(),
            temp_dir: kept,
        })
    }

    async fn merge_into(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        temp_dir: &Path,
        cancel: &CancelToken,
        progress: &dyn PipelineProgress,
    ) -> Result<(), ConvertError> {
        let total = inputs.len();
        let mut temps = Vec::with_capacity(total);

        progress.on_state(PipelineState::Converting);
        for (i, input) in inputs.iter().enumerate() {
            cancel.check()?;
            let percent = (i as f64 / total as f64) * MERGE_CONVERT_SHARE;
            progress.on_progress(
                &format!("Converting {}/{}: {}", i + 1, total, basename(input)),
                percent,
            );

            let temp = temp_pdf(temp_dir, i);
            self.converter.convert(input, &temp, cancel).await?;
            cancel.check()?;

            debug!(input = %input.display(), temp = %temp.display(), "Converted");
            progress.on_file_complete(i, total, &temp);
            temps.push(temp);
        }

        progress.on_progress(
            &format!("Converted {total}/{total} files"),
            MERGE_CONVERT_SHARE,
        );

        progress.on_state(PipelineState::Merging);
        progress.on_progress("Merging PDFs...", MERGING_PERCENT);
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
            }
        }

        if let Err(e) = self.merger.merge(&temps, output, cancel).await {
            // Whatever was written is incomplete.
            remove_if_exists(output);
            return Err(e);
        }
        cancel.check()?;

        progress.on_progress("Conversion complete!", 100.0);
        Ok(())
    }

    /// Convert every input to `<output_dir>/<stem>_converted_pdf.pdf`.
    ///
    /// # Errors
    /// [`ConvertError::Cancelled`] if the token fires at any checkpoint. After
    /// a short grace period every expected output is deleted, including ones
    /// finished before the cancel.
    pub async fn convert_separate(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        cancel: &CancelToken,
        progress: &dyn PipelineProgress,
    ) -> Result<ConversionOutput, ConvertError> {
        if inputs.is_empty() {
            return Err(ConvertError::NoInputs);
        }
        info!(files = inputs.len(), dir = %output_dir.display(), "Starting separate conversion");

        std::fs::create_dir_all(output_dir).map_err(|e| ConvertError::io(output_dir, e))?;
        let expected = separate_outputs(inputs, output_dir);

        match self
            .convert_each(inputs, &expected, cancel, progress)
            .await
        {
            Ok(()) => {
                progress.on_progress("All files converted!", 100.0);
                Ok(ConversionOutput::Separate { outputs: expected })
            }
            Err(e) if e.is_cancelled() => {
                // A killed backend may still be flushing its last file.
                tokio::time::sleep(self.config.cancel_cleanup_grace()).await;
                for path in &expected {
                    remove_if_exists(path);
                }
                info!("Separate conversion cancelled; outputs removed");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn convert_each(
        &self,
        inputs: &[PathBuf],
        expected: &[PathBuf],
        cancel: &CancelToken,
        progress: &dyn PipelineProgress,
    ) -> Result<(), ConvertError> {
        let total = inputs.len();
        progress.on_state(PipelineState::Converting);
        for (i, (input, output)) in inputs.iter().zip(expected).enumerate() {
            cancel.check()?;
            let percent = (i as f64 / total as f64) * 100.0;
            progress.on_progress(
                &format!("Converting {}/{}: {}", i + 1, total, basename(input)),
                percent,
            );
            self.converter.convert(input, output, cancel).await?;
            cancel.check()?;
            progress.on_file_complete(i, total, output);
        }
        Ok(())
    }
}
