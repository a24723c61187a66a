//! Output path naming and cleanup.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to the input stem in separate mode.
pub const SEPARATE_SUFFIX: &str = "_converted_pdf";

/// `<dir>/<stem>_converted_pdf.pdf` for each input, in input order.
pub fn separate_outputs(inputs: &[PathBuf], dir: &Path) -> Vec<PathBuf> {
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            dir.join(format!("{stem}{SEPARATE_SUFFIX}.pdf"))
        })
        .collect()
}

/// Per-file intermediate name inside the merge temp directory.
pub fn temp_pdf(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("temp_{index}.pdf"))
}

/// File name used in status lines.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Delete `path` if it exists. Failures are logged, never returned, since
/// this only runs while a run is already being torn down.
pub fn remove_if_exists(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed output"),
        Err(e) => warn!(path = %path.display(), "Failed to remove output: {e}"),
    }
}
