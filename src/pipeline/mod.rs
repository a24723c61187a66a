//! Building blocks for the conversion pipeline.
//!
//! ## Data Flow
//!
//! ```text
//! merge:    inputs ──▶ convert each ──▶ temp_i.pdf ──▶ merge ──▶ output.pdf
//! separate: inputs ──▶ convert each ──▶ <dir>/<stem>_converted_pdf.pdf
//! ```
//!
//! 1. [`outputs`] — naming of intermediate and final files, and cleanup
//! 2. [`merge`]   — concatenate per-file PDFs; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//!
//! The driver that sequences these lives in [`crate::convert`].

pub mod merge;
pub mod outputs;

pub use merge::{PdfMerger, PdfiumMerger};
