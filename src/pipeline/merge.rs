//! Merging per-file PDFs into one document via pdfium.
//!
//! pdfium is not async-safe, so all document work runs inside
//! `tokio::task::spawn_blocking`, and the library is bound inside each
//! blocking call.

use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::ConvertError;

/// Concatenates PDFs in order into a single output file.
#[async_trait]
pub trait PdfMerger: Send + Sync {
    /// Append every page of every input, in input order, and write `output`.
    ///
    /// Cancellation is checked before each appended document and before the
    /// final write.
    async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError>;
}

/// [`PdfMerger`] backed by the PDFium library.
///
/// Stateless: the library is bound inside each blocking call, since a bound
/// `Pdfium` cannot cross threads. `pdfium-auto` memoizes the library path, so
/// only the first bind can trigger a download.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumMerger;

impl PdfiumMerger {
    pub fn new() -> Self {
        Self
    }

    /// Number of pages in a PDF.
    pub async fn page_count(&self, path: &Path) -> Result<usize, ConvertError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind()?;
            let doc = pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| ConvertError::MergeFailed(format!("{}: {e:?}", path.display())))?;
            let pages = doc.pages().len() as usize;
            Ok(pages)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Page count task panicked: {e}")))?
    }
}

fn bind() -> Result<Pdfium, ConvertError> {
    let pdfium =
        pdfium_auto::bind_pdfium_silent().map_err(|e| ConvertError::MergeFailed(e.to_string()))?;
    debug!("PDFium bound");
    Ok(pdfium)
}

fn merge_blocking(
    inputs: &[PathBuf],
    output: &Path,
    cancel: &CancelToken,
) -> Result<(), ConvertError> {
    let pdfium = bind()?;
    let mut merged = pdfium
        .create_new_pdf()
        .map_err(|e| ConvertError::MergeFailed(format!("{e:?}")))?;

    for input in inputs {
        cancel.check()?;
        let source = pdfium
            .load_pdf_from_file(input, None)
            .map_err(|e| ConvertError::MergeFailed(format!("{}: {e:?}", input.display())))?;
        merged
            .pages_mut()
            .append(&source)
            .map_err(|e| ConvertError::MergeFailed(format!("{}: {e:?}", input.display())))?;
        debug!(input = %input.display(), pages = merged.pages().len(), "Appended document");
    }

    cancel.check()?;
    merged
        .save_to_file(output)
        .map_err(|e| ConvertError::MergeFailed(format!("{}: {e:?}", output.display())))
}

#[async_trait]
impl PdfMerger for PdfiumMerger {
    async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        let inputs = inputs.to_vec();
        let output = output.to_path_buf();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || merge_blocking(&inputs, &output, &cancel))
            .await
            .map_err(|e| ConvertError::Internal(format!("Merge task panicked: {e}")))?
    }
}
